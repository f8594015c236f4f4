use async_trait::async_trait;

use crate::types::{IndexFilter, IndexStats, SearchHit, VectorRecord};
use crate::Result;

/// Semantic index over saved articles.
///
/// At most one record exists per article id; inserting again replaces the
/// prior record atomically with respect to concurrent queries. Similarity
/// is cosine, consistent with the embedding provider's metric.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Insert or replace the record for `record.article_id`.
    async fn insert(&self, record: VectorRecord) -> Result<()>;

    /// Top-k similarity query. `filter` is applied before the top-k cut, so
    /// `k` always counts post-filter results. Results are ordered by
    /// descending score, ties broken by ascending article id. An empty index
    /// yields an empty result.
    async fn query(
        &self,
        embedding: &[f32],
        k: usize,
        filter: Option<&IndexFilter>,
    ) -> Result<Vec<SearchHit>>;

    /// Remove the record for an article id. Returns whether one existed.
    async fn remove(&self, article_id: &str) -> Result<bool>;

    /// All indexed article ids, for orphan cleanup.
    async fn ids(&self) -> Result<Vec<String>>;

    async fn stats(&self) -> Result<IndexStats>;
}
