use async_trait::async_trait;
use chrono::{DateTime, Utc};
use md_core::{Error, IndexFilter, IndexStats, Result, SearchHit, VectorIndex, VectorRecord};
use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::Row;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::rank_records;

const MIGRATIONS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS vector_records (
        article_id TEXT PRIMARY KEY,
        embedding TEXT NOT NULL,
        indexed_text TEXT NOT NULL,
        user_note TEXT,
        user_tags TEXT,
        created_at TEXT NOT NULL
    )
    "#,
];

/// SQLite-persisted vector index. Embeddings are stored as JSON arrays;
/// similarity is computed in process after the metadata filter, which is
/// fine at digest-agent scale (hundreds of saved articles, not millions).
pub struct SqliteIndex {
    pool: Arc<SqlitePool>,
    db_path: PathBuf,
}

impl SqliteIndex {
    pub async fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let pool = SqlitePool::connect(&format!("sqlite:{}?mode=rwc", db_path.display()))
            .await
            .map_err(|e| Error::Index(format!("failed to connect to index database: {}", e)))?;

        for (i, migration) in MIGRATIONS.iter().enumerate() {
            sqlx::query(migration)
                .execute(&pool)
                .await
                .map_err(|e| Error::Index(format!("failed to run migration {}: {}", i, e)))?;
        }

        Ok(Self {
            pool: Arc::new(pool),
            db_path: db_path.to_path_buf(),
        })
    }
}

fn record_from_row(row: &SqliteRow) -> Result<VectorRecord> {
    let embedding: Vec<f32> = serde_json::from_str(row.get("embedding"))?;
    let user_tags: Option<String> = row.get("user_tags");
    let user_tags = match user_tags {
        Some(raw) => serde_json::from_str(&raw)?,
        None => Vec::new(),
    };
    let created_at: String = row.get("created_at");
    let created_at = DateTime::parse_from_rfc3339(&created_at)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| Error::Index(format!("failed to parse created_at: {}", e)))?;

    Ok(VectorRecord {
        article_id: row.get("article_id"),
        embedding,
        indexed_text: row.get("indexed_text"),
        user_note: row.get("user_note"),
        user_tags,
        created_at,
    })
}

#[async_trait]
impl VectorIndex for SqliteIndex {
    async fn insert(&self, record: VectorRecord) -> Result<()> {
        let embedding = serde_json::to_string(&record.embedding)?;
        let user_tags = serde_json::to_string(&record.user_tags)?;

        // Single-statement replace keeps the embedding and its metadata
        // atomic with respect to concurrent queries.
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO vector_records
            (article_id, embedding, indexed_text, user_note, user_tags, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.article_id)
        .bind(embedding)
        .bind(&record.indexed_text)
        .bind(record.user_note.as_deref())
        .bind(user_tags)
        .bind(record.created_at.to_rfc3339())
        .execute(&*self.pool)
        .await
        .map_err(|e| Error::Index(format!("failed to insert vector record: {}", e)))?;

        Ok(())
    }

    async fn query(
        &self,
        embedding: &[f32],
        k: usize,
        filter: Option<&IndexFilter>,
    ) -> Result<Vec<SearchHit>> {
        let rows = sqlx::query("SELECT * FROM vector_records")
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| Error::Index(format!("failed to load vector records: {}", e)))?;
        let records: Vec<VectorRecord> = rows
            .iter()
            .map(record_from_row)
            .collect::<Result<Vec<_>>>()?;
        Ok(rank_records(records.iter(), embedding, k, filter))
    }

    async fn remove(&self, article_id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM vector_records WHERE article_id = ?")
            .bind(article_id)
            .execute(&*self.pool)
            .await
            .map_err(|e| Error::Index(format!("failed to remove vector record: {}", e)))?;
        Ok(result.rows_affected() > 0)
    }

    async fn ids(&self) -> Result<Vec<String>> {
        let rows = sqlx::query("SELECT article_id FROM vector_records ORDER BY article_id ASC")
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| Error::Index(format!("failed to list index ids: {}", e)))?;
        Ok(rows.iter().map(|r| r.get("article_id")).collect())
    }

    async fn stats(&self) -> Result<IndexStats> {
        let row = sqlx::query("SELECT COUNT(*) AS records, MIN(embedding) AS sample FROM vector_records")
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| Error::Index(format!("failed to get index stats: {}", e)))?;

        let sample: Option<String> = row.get("sample");
        let dimension = match sample {
            Some(raw) => Some(serde_json::from_str::<Vec<f32>>(&raw)?.len()),
            None => None,
        };
        let size_bytes = std::fs::metadata(&self.db_path).map(|m| m.len()).unwrap_or(0);

        Ok(IndexStats {
            records: row.get::<i64, _>("records") as u64,
            dimension,
            size_bytes,
        })
    }
}
