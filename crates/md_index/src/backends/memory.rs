use async_trait::async_trait;
use md_core::{IndexFilter, IndexStats, Result, SearchHit, VectorIndex, VectorRecord};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::rank_records;

/// In-memory vector index. A single write lock makes record replacement
/// atomic with respect to concurrent queries.
pub struct MemoryIndex {
    records: Arc<RwLock<HashMap<String, VectorRecord>>>,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self {
            records: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for MemoryIndex {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VectorIndex for MemoryIndex {
    async fn insert(&self, record: VectorRecord) -> Result<()> {
        let mut records = self.records.write().await;
        records.insert(record.article_id.clone(), record);
        Ok(())
    }

    async fn query(
        &self,
        embedding: &[f32],
        k: usize,
        filter: Option<&IndexFilter>,
    ) -> Result<Vec<SearchHit>> {
        let records = self.records.read().await;
        Ok(rank_records(records.values(), embedding, k, filter))
    }

    async fn remove(&self, article_id: &str) -> Result<bool> {
        Ok(self.records.write().await.remove(article_id).is_some())
    }

    async fn ids(&self) -> Result<Vec<String>> {
        let records = self.records.read().await;
        let mut ids: Vec<String> = records.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }

    async fn stats(&self) -> Result<IndexStats> {
        let records = self.records.read().await;
        let dimension = records.values().next().map(|r| r.embedding.len());
        let size_bytes: u64 = records
            .values()
            .map(|r| (r.embedding.len() * std::mem::size_of::<f32>() + r.indexed_text.len()) as u64)
            .sum();
        Ok(IndexStats {
            records: records.len() as u64,
            dimension,
            size_bytes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn record(id: &str, embedding: Vec<f32>, tags: &[&str]) -> VectorRecord {
        VectorRecord {
            article_id: id.to_string(),
            embedding,
            indexed_text: format!("text for {}", id),
            user_note: None,
            user_tags: tags.iter().map(|t| t.to_string()).collect(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn query_orders_by_descending_similarity() {
        let index = MemoryIndex::new();
        index.insert(record("far", vec![0.0, 1.0], &[])).await.unwrap();
        index.insert(record("near", vec![1.0, 0.1], &[])).await.unwrap();
        index.insert(record("exact", vec![1.0, 0.0], &[])).await.unwrap();

        let hits = index.query(&[1.0, 0.0], 3, None).await.unwrap();
        let ids: Vec<&str> = hits.iter().map(|h| h.article_id.as_str()).collect();
        assert_eq!(ids, vec!["exact", "near", "far"]);
        assert!(hits[0].score > hits[1].score);
    }

    #[tokio::test]
    async fn ties_break_by_ascending_article_id() {
        let index = MemoryIndex::new();
        index.insert(record("b", vec![1.0, 0.0], &[])).await.unwrap();
        index.insert(record("a", vec![1.0, 0.0], &[])).await.unwrap();

        let hits = index.query(&[1.0, 0.0], 2, None).await.unwrap();
        let ids: Vec<&str> = hits.iter().map(|h| h.article_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn filter_applies_before_top_k_cut() {
        let index = MemoryIndex::new();
        for (id, tags) in [
            ("1", vec!["rust"]),
            ("2", vec!["ai"]),
            ("3", vec!["rust"]),
            ("4", vec!["rust"]),
            ("5", vec!["rust"]),
        ] {
            index
                .insert(record(id, vec![1.0, 0.0], &tags))
                .await
                .unwrap();
        }

        let filter = IndexFilter {
            any_tag: vec!["ai".to_string()],
            ..Default::default()
        };
        let hits = index.query(&[1.0, 0.0], 2, Some(&filter)).await.unwrap();
        // Only one record matches the filter; k must not be padded with
        // non-matching entries.
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].article_id, "2");
    }

    #[tokio::test]
    async fn insert_replaces_existing_record() {
        let index = MemoryIndex::new();
        index.insert(record("1", vec![1.0, 0.0], &[])).await.unwrap();
        index.insert(record("1", vec![0.0, 1.0], &["updated"])).await.unwrap();

        let stats = index.stats().await.unwrap();
        assert_eq!(stats.records, 1);
        let hits = index.query(&[0.0, 1.0], 1, None).await.unwrap();
        assert_eq!(hits[0].user_tags, vec!["updated".to_string()]);
        assert!((hits[0].score - 1.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn empty_index_returns_empty_results() {
        let index = MemoryIndex::new();
        let hits = index.query(&[1.0, 0.0], 5, None).await.unwrap();
        assert!(hits.is_empty());
    }
}
