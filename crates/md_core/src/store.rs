use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::types::{Article, StoreStats};
use crate::Result;

/// Durable storage for article metadata, summaries and engagement metrics.
///
/// Implementations must make `upsert` idempotent per article id: a second
/// upsert for the same id refreshes engagement metrics but never duplicates
/// the row, and never replaces an existing summary with an absent one.
#[async_trait]
pub trait ArticleStore: Send + Sync {
    /// Insert or update an article, keyed by `article.id`.
    async fn upsert(&self, article: &Article) -> Result<()>;

    /// Look up a single article by id.
    async fn get(&self, id: &str) -> Result<Option<Article>>;

    /// The `n` most recent articles by published date.
    async fn list_recent(&self, n: usize) -> Result<Vec<Article>>;

    /// Articles carrying the given tag, most recent first.
    async fn list_by_tag(&self, tag: &str) -> Result<Vec<Article>>;

    /// Articles published at or after the given timestamp.
    async fn list_since(&self, ts: DateTime<Utc>) -> Result<Vec<Article>>;

    /// Keyword search over title and tags.
    async fn search_keyword(&self, keyword: &str, n: usize) -> Result<Vec<Article>>;

    /// Flip the saved-to-index flag.
    async fn mark_saved(&self, id: &str, saved: bool) -> Result<()>;

    /// Delete one article. Returns whether a row was removed.
    async fn delete(&self, id: &str) -> Result<bool>;

    /// Prune articles published more than `days` days ago. When `keep_saved`
    /// is set, articles saved to the vector index survive. Returns the ids
    /// of removed articles so the caller can clean up the index.
    async fn delete_older_than(&self, days: i64, keep_saved: bool) -> Result<Vec<String>>;

    async fn stats(&self) -> Result<StoreStats>;
}
