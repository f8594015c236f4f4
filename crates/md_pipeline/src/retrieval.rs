use chrono::{DateTime, Utc};
use md_core::{
    Article, ArticleStore, EmbeddingProvider, Error, IndexFilter, IndexStats, Result,
    RetrievedArticle, SearchHit, StoreStats, VectorIndex, VectorRecord,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Semantic and structured retrieval over the article store and vector
/// index. The index never outlives the store's copy of an article; hits
/// whose article is gone are dropped and cleaned up rather than surfaced.
pub struct RetrievalService {
    store: Arc<dyn ArticleStore>,
    index: Arc<dyn VectorIndex>,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl RetrievalService {
    pub fn new(
        store: Arc<dyn ArticleStore>,
        index: Arc<dyn VectorIndex>,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> Self {
        Self {
            store,
            index,
            embedder,
        }
    }

    /// Semantic search: embed the query, rank against the index, hydrate
    /// against the store. When hydration drops stale hits the count is
    /// backfilled from the next-ranked candidates so `k` is honored while
    /// the index still has matches.
    pub async fn search(
        &self,
        query_text: &str,
        k: usize,
        filter: Option<&IndexFilter>,
    ) -> Result<Vec<RetrievedArticle>> {
        if k == 0 {
            return Ok(Vec::new());
        }

        let vectors = self.embedder.embed(&[query_text.to_string()]).await?;
        let embedding = vectors
            .into_iter()
            .next()
            .ok_or_else(|| Error::Embedding("provider returned no vector for query".to_string()))?;

        let mut fetch = k;
        loop {
            let hits = self.index.query(&embedding, fetch, filter).await?;
            let exhausted = hits.len() < fetch;
            let (results, stale) = self.hydrate(hits).await?;
            self.cleanup_ids(&stale).await;

            if results.len() >= k || exhausted {
                let mut results = results;
                results.truncate(k);
                return Ok(results);
            }
            // Stale hits consumed part of the cut; widen and retry.
            fetch += k - results.len();
            debug!("backfilling search results, widening to {}", fetch);
        }
    }

    async fn hydrate(
        &self,
        hits: Vec<SearchHit>,
    ) -> Result<(Vec<RetrievedArticle>, Vec<String>)> {
        let mut results = Vec::with_capacity(hits.len());
        let mut stale = Vec::new();
        for hit in hits {
            match self.store.get(&hit.article_id).await? {
                Some(article) => results.push(RetrievedArticle {
                    article,
                    score: hit.score,
                    user_note: hit.user_note,
                    user_tags: hit.user_tags,
                }),
                None => {
                    // Store pruning raced ahead of index cleanup. Tolerated;
                    // the stale record is removed, never surfaced.
                    warn!(
                        "index references missing article {}, scheduling cleanup",
                        hit.article_id
                    );
                    stale.push(hit.article_id);
                }
            }
        }
        Ok((results, stale))
    }

    async fn cleanup_ids(&self, ids: &[String]) {
        for id in ids {
            if let Err(e) = self.index.remove(id).await {
                warn!("failed to clean up stale vector record {}: {}", id, e);
            }
        }
    }

    /// Save an article into the vector index. Explicit user action; the
    /// ingestion pipeline never does this automatically. Re-saving replaces
    /// the prior record.
    pub async fn save_to_index(
        &self,
        article_id: &str,
        note: Option<String>,
        tags: Vec<String>,
    ) -> Result<()> {
        let article = self
            .store
            .get(article_id)
            .await?
            .ok_or_else(|| Error::Store(format!("article {} not found", article_id)))?;

        let indexed_text = compose_indexed_text(&article, note.as_deref());
        let vectors = self.embedder.embed(&[indexed_text.clone()]).await?;
        let embedding = vectors
            .into_iter()
            .next()
            .ok_or_else(|| Error::Embedding("provider returned no vector".to_string()))?;

        self.index
            .insert(VectorRecord {
                article_id: article_id.to_string(),
                embedding,
                indexed_text,
                user_note: note,
                user_tags: tags,
                created_at: Utc::now(),
            })
            .await?;
        self.store.mark_saved(article_id, true).await?;
        info!("saved article {} to index", article_id);
        Ok(())
    }

    /// Remove an article's vector record and clear its saved flag.
    pub async fn remove_from_index(&self, article_id: &str) -> Result<bool> {
        let removed = self.index.remove(article_id).await?;
        if removed {
            // The article itself may already be pruned; that is fine.
            if let Err(e) = self.store.mark_saved(article_id, false).await {
                debug!("could not clear saved flag for {}: {}", article_id, e);
            }
        }
        Ok(removed)
    }

    // Structured queries bypass embeddings entirely and work with an empty
    // index.

    pub async fn recent(&self, n: usize) -> Result<Vec<Article>> {
        self.store.list_recent(n).await
    }

    pub async fn by_tag(&self, tag: &str) -> Result<Vec<Article>> {
        self.store.list_by_tag(tag).await
    }

    pub async fn since(&self, ts: DateTime<Utc>) -> Result<Vec<Article>> {
        self.store.list_since(ts).await
    }

    pub async fn search_keyword(&self, keyword: &str, n: usize) -> Result<Vec<Article>> {
        self.store.search_keyword(keyword, n).await
    }

    /// Remove index records whose articles no longer exist in the store.
    /// Returns the number of orphans removed.
    pub async fn cleanup_stale(&self) -> Result<usize> {
        let mut removed = 0;
        for id in self.index.ids().await? {
            if self.store.get(&id).await?.is_none() {
                self.index.remove(&id).await?;
                removed += 1;
            }
        }
        if removed > 0 {
            info!("cleaned up {} orphaned vector records", removed);
        }
        Ok(removed)
    }

    /// Prune old articles from the store, then drop their vector records.
    /// Returns the ids that were pruned.
    pub async fn prune(&self, days: i64, keep_saved: bool) -> Result<Vec<String>> {
        let removed = self.store.delete_older_than(days, keep_saved).await?;
        self.cleanup_ids(&removed).await;
        Ok(removed)
    }

    /// Delete a single article and its vector record.
    pub async fn delete_article(&self, article_id: &str) -> Result<bool> {
        self.index.remove(article_id).await?;
        self.store.delete(article_id).await
    }

    pub async fn stats(&self) -> Result<(StoreStats, IndexStats)> {
        Ok((self.store.stats().await?, self.index.stats().await?))
    }
}

/// The text that gets embedded: title plus summary, digest and note when
/// present, falling back to raw content. Keeps the vector topical rather
/// than diluted by full article text.
fn compose_indexed_text(article: &Article, note: Option<&str>) -> String {
    let mut parts = vec![article.title.clone()];
    if let Some(summary) = &article.summary {
        parts.push(summary.clone());
        if let Some(digest) = &article.digest {
            parts.extend(digest.iter().cloned());
        }
    } else if let Some(raw_text) = &article.raw_text {
        parts.push(raw_text.clone());
    }
    if let Some(note) = note {
        parts.push(note.to_string());
    }
    parts.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use md_core::RawArticle;
    use md_index::MemoryIndex;
    use md_inference::DummyEmbedder;
    use md_store::MemoryStore;

    fn article(id: &str, title: &str, summary: &str) -> Article {
        let raw = RawArticle {
            id: id.to_string(),
            title: title.to_string(),
            author: "Author".to_string(),
            url: format!("https://medium.com/p/{}", id),
            published_at: Utc::now(),
            claps: Some(0),
            responses: Some(0),
            raw_text: Some("body".to_string()),
            tags: vec![],
        };
        let mut article = Article::from_raw(&raw, Utc::now());
        article.summary = Some(summary.to_string());
        article
    }

    fn service() -> (RetrievalService, Arc<dyn ArticleStore>, Arc<dyn VectorIndex>) {
        let store: Arc<dyn ArticleStore> = Arc::new(MemoryStore::new());
        let index: Arc<dyn VectorIndex> = Arc::new(MemoryIndex::new());
        let embedder: Arc<dyn EmbeddingProvider> = Arc::new(DummyEmbedder::default());
        (
            RetrievalService::new(store.clone(), index.clone(), embedder),
            store,
            index,
        )
    }

    #[tokio::test]
    async fn semantic_search_finds_saved_note() {
        let (service, store, _) = service();
        store
            .upsert(&article("1", "Async Rust", "About async executors"))
            .await
            .unwrap();
        store
            .upsert(&article("2", "Databases", "About sqlite internals"))
            .await
            .unwrap();
        service.save_to_index("1", None, vec![]).await.unwrap();
        service
            .save_to_index(
                "2",
                Some("quantum entanglement breakthrough".to_string()),
                vec![],
            )
            .await
            .unwrap();

        let results = service
            .search("quantum entanglement breakthrough", 1, None)
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].article.id, "2");
    }

    #[tokio::test]
    async fn save_to_index_marks_article_saved() {
        let (service, store, index) = service();
        store
            .upsert(&article("1", "Title", "Summary"))
            .await
            .unwrap();
        service
            .save_to_index("1", Some("note".to_string()), vec!["ai".to_string()])
            .await
            .unwrap();

        assert!(store.get("1").await.unwrap().unwrap().saved);
        assert_eq!(index.ids().await.unwrap(), vec!["1".to_string()]);

        // Re-save replaces rather than accumulates.
        service.save_to_index("1", None, vec![]).await.unwrap();
        assert_eq!(index.stats().await.unwrap().records, 1);
    }

    #[tokio::test]
    async fn stale_hits_are_dropped_and_backfilled() {
        let (service, store, index) = service();
        for (id, title) in [
            ("1", "rust article one"),
            ("2", "rust article two"),
            ("3", "rust article three"),
        ] {
            store.upsert(&article(id, title, title)).await.unwrap();
            service.save_to_index(id, None, vec![]).await.unwrap();
        }

        // Prune one article from the store behind the index's back.
        store.delete("1").await.unwrap();

        let results = service.search("rust article", 2, None).await.unwrap();
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.article.id != "1"));

        // The stale record was cleaned up during the search.
        assert!(!index.ids().await.unwrap().contains(&"1".to_string()));
    }

    #[tokio::test]
    async fn structured_queries_work_with_empty_index() {
        let (service, store, _) = service();
        let mut a = article("1", "Tagged", "Summary");
        a.tags = vec!["ai".to_string()];
        store.upsert(&a).await.unwrap();

        assert_eq!(service.recent(5).await.unwrap().len(), 1);
        assert_eq!(service.by_tag("ai").await.unwrap().len(), 1);
        assert_eq!(service.by_tag("other").await.unwrap().len(), 0);
        assert_eq!(
            service
                .since(Utc::now() - chrono::Duration::days(1))
                .await
                .unwrap()
                .len(),
            1
        );
    }

    #[tokio::test]
    async fn prune_removes_vector_records_of_pruned_articles() {
        let (service, store, index) = service();
        let mut old = article("old", "Old article", "Summary");
        old.published_at = Utc::now() - chrono::Duration::days(60);
        store.upsert(&old).await.unwrap();
        service.save_to_index("old", None, vec![]).await.unwrap();

        let removed = service.prune(30, false).await.unwrap();
        assert_eq!(removed, vec!["old".to_string()]);
        assert!(index.ids().await.unwrap().is_empty());

        let results = service.search("Old article", 5, None).await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn cleanup_stale_removes_orphans() {
        let (service, store, index) = service();
        store
            .upsert(&article("1", "Title", "Summary"))
            .await
            .unwrap();
        service.save_to_index("1", None, vec![]).await.unwrap();
        store.delete("1").await.unwrap();

        assert_eq!(service.cleanup_stale().await.unwrap(), 1);
        assert!(index.ids().await.unwrap().is_empty());
    }

    #[test]
    fn indexed_text_prefers_summary_over_raw_content() {
        let a = article("1", "Title", "The summary");
        let text = compose_indexed_text(&a, Some("a note"));
        assert!(text.contains("Title"));
        assert!(text.contains("The summary"));
        assert!(text.contains("a note"));
        assert!(!text.contains("body"));
    }
}
