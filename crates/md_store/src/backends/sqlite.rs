use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use md_core::{Article, ArticleStore, Error, Result, StoreStats};
use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::Row;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const MIGRATIONS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS articles (
        id TEXT PRIMARY KEY,
        title TEXT NOT NULL,
        author TEXT NOT NULL,
        url TEXT NOT NULL,
        published_at TEXT NOT NULL,
        fetched_at TEXT NOT NULL,
        claps INTEGER NOT NULL DEFAULT 0,
        responses INTEGER NOT NULL DEFAULT 0,
        raw_text TEXT,
        summary TEXT,
        digest TEXT,
        tags TEXT,
        saved INTEGER NOT NULL DEFAULT 0
    )
    "#,
    // Add future migrations here
];

/// SQLite-backed article store.
pub struct SqliteStore {
    pool: Arc<SqlitePool>,
    db_path: PathBuf,
}

impl SqliteStore {
    pub async fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let pool = SqlitePool::connect(&format!("sqlite:{}?mode=rwc", db_path.display()))
            .await
            .map_err(|e| Error::Store(format!("failed to connect to database: {}", e)))?;

        for (i, migration) in MIGRATIONS.iter().enumerate() {
            sqlx::query(migration)
                .execute(&pool)
                .await
                .map_err(|e| Error::Store(format!("failed to run migration {}: {}", i, e)))?;
        }

        Ok(Self {
            pool: Arc::new(pool),
            db_path: db_path.to_path_buf(),
        })
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    async fn fetch_articles<'q>(
        &self,
        query: sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>>,
    ) -> Result<Vec<Article>> {
        let rows = query
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| Error::Store(format!("query failed: {}", e)))?;
        rows.iter().map(article_from_row).collect()
    }
}

fn parse_date(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| Error::Store(format!("failed to parse date {}: {}", raw, e)))
}

fn article_from_row(row: &SqliteRow) -> Result<Article> {
    let tags: Option<String> = row.get("tags");
    let tags = match tags {
        Some(raw) => serde_json::from_str(&raw)?,
        None => Vec::new(),
    };
    let digest: Option<String> = row.get("digest");
    let digest = match digest {
        Some(raw) => Some(serde_json::from_str(&raw)?),
        None => None,
    };

    Ok(Article {
        id: row.get("id"),
        title: row.get("title"),
        author: row.get("author"),
        url: row.get("url"),
        published_at: parse_date(row.get("published_at"))?,
        fetched_at: parse_date(row.get("fetched_at"))?,
        claps: row.get::<i64, _>("claps") as u64,
        responses: row.get::<i64, _>("responses") as u64,
        raw_text: row.get("raw_text"),
        summary: row.get("summary"),
        digest,
        tags,
        saved: row.get::<i64, _>("saved") != 0,
    })
}

#[async_trait]
impl ArticleStore for SqliteStore {
    async fn upsert(&self, article: &Article) -> Result<()> {
        let tags = serde_json::to_string(&article.tags)?;
        let digest = article
            .digest
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        // Metrics are last-writer-wins; an existing summary is never
        // replaced by an absent one; the saved flag survives re-ingestion.
        sqlx::query(
            r#"
            INSERT INTO articles
            (id, title, author, url, published_at, fetched_at, claps, responses, raw_text, summary, digest, tags, saved)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                title = excluded.title,
                author = excluded.author,
                url = excluded.url,
                published_at = excluded.published_at,
                fetched_at = excluded.fetched_at,
                claps = excluded.claps,
                responses = excluded.responses,
                raw_text = COALESCE(excluded.raw_text, articles.raw_text),
                summary = COALESCE(articles.summary, excluded.summary),
                digest = CASE WHEN articles.summary IS NULL THEN excluded.digest ELSE articles.digest END,
                tags = excluded.tags,
                saved = MAX(articles.saved, excluded.saved)
            "#,
        )
        .bind(&article.id)
        .bind(&article.title)
        .bind(&article.author)
        .bind(&article.url)
        .bind(article.published_at.to_rfc3339())
        .bind(article.fetched_at.to_rfc3339())
        .bind(article.claps as i64)
        .bind(article.responses as i64)
        .bind(article.raw_text.as_deref())
        .bind(article.summary.as_deref())
        .bind(digest.as_deref())
        .bind(tags)
        .bind(article.saved as i64)
        .execute(&*self.pool)
        .await
        .map_err(|e| Error::Store(format!("failed to upsert article: {}", e)))?;

        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Article>> {
        let row = sqlx::query("SELECT * FROM articles WHERE id = ?")
            .bind(id)
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| Error::Store(format!("failed to get article: {}", e)))?;
        row.as_ref().map(article_from_row).transpose()
    }

    async fn list_recent(&self, n: usize) -> Result<Vec<Article>> {
        self.fetch_articles(
            sqlx::query("SELECT * FROM articles ORDER BY published_at DESC, id ASC LIMIT ?")
                .bind(n as i64),
        )
        .await
    }

    async fn list_by_tag(&self, tag: &str) -> Result<Vec<Article>> {
        // Tags are a JSON array; match the quoted element.
        self.fetch_articles(
            sqlx::query(
                "SELECT * FROM articles WHERE tags LIKE ? ORDER BY published_at DESC, id ASC",
            )
            .bind(format!("%\"{}\"%", tag)),
        )
        .await
    }

    async fn list_since(&self, ts: DateTime<Utc>) -> Result<Vec<Article>> {
        self.fetch_articles(
            sqlx::query(
                "SELECT * FROM articles WHERE published_at >= ? ORDER BY published_at DESC, id ASC",
            )
            .bind(ts.to_rfc3339()),
        )
        .await
    }

    async fn search_keyword(&self, keyword: &str, n: usize) -> Result<Vec<Article>> {
        let pattern = format!("%{}%", keyword);
        self.fetch_articles(
            sqlx::query(
                r#"
                SELECT * FROM articles
                WHERE title LIKE ? OR tags LIKE ?
                ORDER BY published_at DESC, id ASC
                LIMIT ?
                "#,
            )
            .bind(&pattern)
            .bind(&pattern)
            .bind(n as i64),
        )
        .await
    }

    async fn mark_saved(&self, id: &str, saved: bool) -> Result<()> {
        let result = sqlx::query("UPDATE articles SET saved = ? WHERE id = ?")
            .bind(saved as i64)
            .bind(id)
            .execute(&*self.pool)
            .await
            .map_err(|e| Error::Store(format!("failed to mark saved: {}", e)))?;
        if result.rows_affected() == 0 {
            return Err(Error::Store(format!("article {} not found", id)));
        }
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM articles WHERE id = ?")
            .bind(id)
            .execute(&*self.pool)
            .await
            .map_err(|e| Error::Store(format!("failed to delete article: {}", e)))?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_older_than(&self, days: i64, keep_saved: bool) -> Result<Vec<String>> {
        let threshold = (Utc::now() - Duration::days(days)).to_rfc3339();

        // One statement, so a concurrent upsert can never land between the
        // id scan and the deletes.
        let query = if keep_saved {
            sqlx::query("DELETE FROM articles WHERE published_at < ? AND saved = 0 RETURNING id")
        } else {
            sqlx::query("DELETE FROM articles WHERE published_at < ? RETURNING id")
        };
        let rows = query
            .bind(&threshold)
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| Error::Store(format!("failed to delete old articles: {}", e)))?;

        Ok(rows.iter().map(|r| r.get("id")).collect())
    }

    async fn stats(&self) -> Result<StoreStats> {
        let row = sqlx::query(
            r#"
            SELECT
                COUNT(*) AS total,
                SUM(CASE WHEN summary IS NOT NULL THEN 1 ELSE 0 END) AS summarized,
                SUM(saved) AS saved,
                MAX(published_at) AS newest,
                MIN(published_at) AS oldest
            FROM articles
            "#,
        )
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| Error::Store(format!("failed to get stats: {}", e)))?;

        let newest: Option<String> = row.get("newest");
        let oldest: Option<String> = row.get("oldest");
        let size_bytes = std::fs::metadata(&self.db_path).map(|m| m.len()).unwrap_or(0);

        Ok(StoreStats {
            total_articles: row.get::<i64, _>("total") as u64,
            summarized_articles: row.get::<Option<i64>, _>("summarized").unwrap_or(0) as u64,
            saved_articles: row.get::<Option<i64>, _>("saved").unwrap_or(0) as u64,
            newest_article: newest.as_deref().map(parse_date).transpose()?,
            oldest_article: oldest.as_deref().map(parse_date).transpose()?,
            size_bytes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use md_core::RawArticle;
    use tempfile::tempdir;

    fn article(id: &str, claps: u64) -> Article {
        let raw = RawArticle {
            id: id.to_string(),
            title: format!("Article {}", id),
            author: "Author".to_string(),
            url: format!("https://medium.com/p/{}", id),
            published_at: Utc::now(),
            claps: Some(claps),
            responses: Some(0),
            raw_text: Some("Body text".to_string()),
            tags: vec!["rust".to_string()],
        };
        Article::from_raw(&raw, Utc::now())
    }

    #[tokio::test]
    async fn upsert_refreshes_metrics_and_keeps_summary() {
        let temp_dir = tempdir().unwrap();
        let store = SqliteStore::open(&temp_dir.path().join("test.db"))
            .await
            .unwrap();

        let mut a = article("1", 10);
        a.summary = Some("Original summary".to_string());
        a.digest = Some(vec!["point".to_string()]);
        store.upsert(&a).await.unwrap();

        let mut again = article("1", 50);
        again.raw_text = None;
        store.upsert(&again).await.unwrap();

        let stored = store.get("1").await.unwrap().unwrap();
        assert_eq!(stored.claps, 50);
        assert_eq!(stored.summary.as_deref(), Some("Original summary"));
        assert_eq!(stored.digest, Some(vec!["point".to_string()]));
        assert_eq!(stored.raw_text.as_deref(), Some("Body text"));

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.total_articles, 1);
        assert_eq!(stats.summarized_articles, 1);
    }

    #[tokio::test]
    async fn list_by_tag_matches_json_element() {
        let temp_dir = tempdir().unwrap();
        let store = SqliteStore::open(&temp_dir.path().join("test.db"))
            .await
            .unwrap();

        let mut a = article("1", 0);
        a.tags = vec!["ai".to_string()];
        store.upsert(&a).await.unwrap();
        let mut b = article("2", 0);
        b.tags = vec!["maintainability".to_string()];
        store.upsert(&b).await.unwrap();

        // "ai" is a substring of "maintainability"; quoted matching must
        // not pick it up.
        let hits = store.list_by_tag("ai").await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "1");
    }

    #[tokio::test]
    async fn delete_older_than_returns_removed_ids() {
        let temp_dir = tempdir().unwrap();
        let store = SqliteStore::open(&temp_dir.path().join("test.db"))
            .await
            .unwrap();

        let mut old = article("old", 0);
        old.published_at = Utc::now() - Duration::days(60);
        store.upsert(&old).await.unwrap();
        let mut old_saved = article("old-saved", 0);
        old_saved.published_at = Utc::now() - Duration::days(60);
        old_saved.saved = true;
        store.upsert(&old_saved).await.unwrap();
        store.upsert(&article("new", 0)).await.unwrap();

        let removed = store.delete_older_than(30, true).await.unwrap();
        assert_eq!(removed, vec!["old".to_string()]);
        assert!(store.get("old").await.unwrap().is_none());
        assert!(store.get("old-saved").await.unwrap().is_some());
        assert!(store.get("new").await.unwrap().is_some());

        let removed = store.delete_older_than(30, false).await.unwrap();
        assert_eq!(removed, vec!["old-saved".to_string()]);
    }
}
