use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use md_core::{Article, ArticleStore, Result, StoreStats};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::merge_articles;

/// In-memory article store, used in tests and as the fallback backend when
/// no database path is configured.
pub struct MemoryStore {
    articles: Arc<RwLock<HashMap<String, Article>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            articles: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn sort_recent(articles: &mut [Article]) {
    articles.sort_by(|a, b| {
        b.published_at
            .cmp(&a.published_at)
            .then_with(|| a.id.cmp(&b.id))
    });
}

#[async_trait]
impl ArticleStore for MemoryStore {
    async fn upsert(&self, article: &Article) -> Result<()> {
        let mut articles = self.articles.write().await;
        let merged = match articles.get(&article.id) {
            Some(existing) => merge_articles(existing, article),
            None => article.clone(),
        };
        articles.insert(article.id.clone(), merged);
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Article>> {
        Ok(self.articles.read().await.get(id).cloned())
    }

    async fn list_recent(&self, n: usize) -> Result<Vec<Article>> {
        let articles = self.articles.read().await;
        let mut all: Vec<Article> = articles.values().cloned().collect();
        sort_recent(&mut all);
        all.truncate(n);
        Ok(all)
    }

    async fn list_by_tag(&self, tag: &str) -> Result<Vec<Article>> {
        let articles = self.articles.read().await;
        let mut matching: Vec<Article> = articles
            .values()
            .filter(|a| a.tags.iter().any(|t| t == tag))
            .cloned()
            .collect();
        sort_recent(&mut matching);
        Ok(matching)
    }

    async fn list_since(&self, ts: DateTime<Utc>) -> Result<Vec<Article>> {
        let articles = self.articles.read().await;
        let mut matching: Vec<Article> = articles
            .values()
            .filter(|a| a.published_at >= ts)
            .cloned()
            .collect();
        sort_recent(&mut matching);
        Ok(matching)
    }

    async fn search_keyword(&self, keyword: &str, n: usize) -> Result<Vec<Article>> {
        let needle = keyword.to_lowercase();
        let articles = self.articles.read().await;
        let mut matching: Vec<Article> = articles
            .values()
            .filter(|a| {
                a.title.to_lowercase().contains(&needle)
                    || a.tags.iter().any(|t| t.to_lowercase().contains(&needle))
            })
            .cloned()
            .collect();
        sort_recent(&mut matching);
        matching.truncate(n);
        Ok(matching)
    }

    async fn mark_saved(&self, id: &str, saved: bool) -> Result<()> {
        let mut articles = self.articles.write().await;
        match articles.get_mut(id) {
            Some(article) => {
                article.saved = saved;
                Ok(())
            }
            None => Err(md_core::Error::Store(format!("article {} not found", id))),
        }
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        Ok(self.articles.write().await.remove(id).is_some())
    }

    async fn delete_older_than(&self, days: i64, keep_saved: bool) -> Result<Vec<String>> {
        let threshold = Utc::now() - Duration::days(days);
        let mut articles = self.articles.write().await;
        let removed: Vec<String> = articles
            .values()
            .filter(|a| a.published_at < threshold && !(keep_saved && a.saved))
            .map(|a| a.id.clone())
            .collect();
        for id in &removed {
            articles.remove(id);
        }
        Ok(removed)
    }

    async fn stats(&self) -> Result<StoreStats> {
        let articles = self.articles.read().await;
        let size_bytes: u64 = articles
            .values()
            .map(|a| {
                (a.raw_text.as_deref().map_or(0, str::len)
                    + a.summary.as_deref().map_or(0, str::len)
                    + a.title.len()) as u64
            })
            .sum();
        Ok(StoreStats {
            total_articles: articles.len() as u64,
            summarized_articles: articles.values().filter(|a| a.has_summary()).count() as u64,
            saved_articles: articles.values().filter(|a| a.saved).count() as u64,
            newest_article: articles.values().map(|a| a.published_at).max(),
            oldest_article: articles.values().map(|a| a.published_at).min(),
            size_bytes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use md_core::RawArticle;

    fn article(id: &str, claps: u64, days_ago: i64) -> Article {
        let raw = RawArticle {
            id: id.to_string(),
            title: format!("Article {}", id),
            author: "Author".to_string(),
            url: format!("https://medium.com/p/{}", id),
            published_at: Utc::now() - Duration::days(days_ago),
            claps: Some(claps),
            responses: Some(1),
            raw_text: Some("Body text".to_string()),
            tags: vec!["rust".to_string()],
        };
        Article::from_raw(&raw, Utc::now())
    }

    #[tokio::test]
    async fn upsert_is_idempotent_per_id() {
        let store = MemoryStore::new();
        let mut a = article("1", 10, 0);
        a.summary = Some("First summary".to_string());
        store.upsert(&a).await.unwrap();

        // Re-ingest with refreshed metrics and no summary
        let mut again = article("1", 50, 0);
        again.raw_text = None;
        store.upsert(&again).await.unwrap();

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.total_articles, 1);
        let stored = store.get("1").await.unwrap().unwrap();
        assert_eq!(stored.claps, 50);
        assert_eq!(stored.summary.as_deref(), Some("First summary"));
        assert!(stored.raw_text.is_some());
    }

    #[tokio::test]
    async fn list_recent_orders_by_published_date() {
        let store = MemoryStore::new();
        for (id, days) in [("1", 3), ("2", 2), ("3", 1)] {
            store.upsert(&article(id, 0, days)).await.unwrap();
        }
        let recent = store.list_recent(2).await.unwrap();
        let ids: Vec<&str> = recent.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["3", "2"]);
    }

    #[tokio::test]
    async fn delete_older_than_keeps_saved_articles() {
        let store = MemoryStore::new();
        let mut old_saved = article("old-saved", 0, 60);
        old_saved.saved = true;
        store.upsert(&old_saved).await.unwrap();
        store.upsert(&article("old", 0, 60)).await.unwrap();
        store.upsert(&article("new", 0, 1)).await.unwrap();

        let removed = store.delete_older_than(30, true).await.unwrap();
        assert_eq!(removed, vec!["old".to_string()]);
        assert!(store.get("old-saved").await.unwrap().is_some());
        assert!(store.get("new").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn search_keyword_matches_title_and_tags() {
        let store = MemoryStore::new();
        let mut a = article("1", 0, 1);
        a.title = "Understanding async Rust".to_string();
        store.upsert(&a).await.unwrap();
        let mut b = article("2", 0, 2);
        b.title = "Gardening tips".to_string();
        b.tags = vec!["hobby".to_string()];
        store.upsert(&b).await.unwrap();

        let hits = store.search_keyword("async", 10).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "1");

        // Tag match
        let hits = store.search_keyword("hobby", 10).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "2");
    }
}
