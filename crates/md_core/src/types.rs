use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A raw article record as returned by the external fetch capability.
///
/// Engagement metrics and content are optional: upstream scraping may fail
/// partway through a record, and pipeline logic must handle absence
/// explicitly rather than assume the fields are present.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawArticle {
    pub id: String,
    pub title: String,
    pub author: String,
    pub url: String,
    pub published_at: DateTime<Utc>,
    #[serde(default)]
    pub claps: Option<u64>,
    #[serde(default)]
    pub responses: Option<u64>,
    #[serde(default)]
    pub raw_text: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// A persisted article with its summarization results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Article {
    pub id: String,
    pub title: String,
    pub author: String,
    pub url: String,
    pub published_at: DateTime<Utc>,
    pub fetched_at: DateTime<Utc>,
    pub claps: u64,
    pub responses: u64,
    pub raw_text: Option<String>,
    pub summary: Option<String>,
    pub digest: Option<Vec<String>>,
    pub tags: Vec<String>,
    /// Set when the article has been saved into the vector index.
    pub saved: bool,
}

impl Article {
    pub fn from_raw(raw: &RawArticle, fetched_at: DateTime<Utc>) -> Self {
        Self {
            id: raw.id.clone(),
            title: raw.title.clone(),
            author: raw.author.clone(),
            url: raw.url.clone(),
            published_at: raw.published_at,
            fetched_at,
            claps: raw.claps.unwrap_or(0),
            responses: raw.responses.unwrap_or(0),
            raw_text: raw.raw_text.clone(),
            summary: None,
            digest: None,
            tags: raw.tags.clone(),
            saved: false,
        }
    }

    pub fn has_summary(&self) -> bool {
        self.summary.is_some()
    }
}

/// Summarization output: a short summary plus ordered bullet points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArticleDigest {
    pub summary: String,
    pub bullets: Vec<String>,
}

impl ArticleDigest {
    /// Render as display text, matching the digest format sent to chat
    /// collaborators.
    pub fn to_display_text(&self) -> String {
        let mut text = self.summary.clone();
        if !self.bullets.is_empty() {
            text.push_str("\n\nKey points:\n");
            for bullet in &self.bullets {
                text.push_str(&format!("• {}\n", bullet));
            }
        }
        text
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum GenerationMode {
    #[default]
    Standard,
    /// Higher latency/cost budget with extended reasoning enabled.
    Extended,
}

#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub title: String,
    pub author: String,
    pub text: String,
    pub mode: GenerationMode,
}

/// One entry in the vector index. References an article by id; the article
/// store keeps the authoritative copy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorRecord {
    pub article_id: String,
    pub embedding: Vec<f32>,
    /// The exact text that was embedded. Summary, digest and note rather
    /// than raw content, to keep the vector topical.
    pub indexed_text: String,
    pub user_note: Option<String>,
    pub user_tags: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// Metadata filter applied to index queries before the top-k cut.
#[derive(Debug, Clone, Default)]
pub struct IndexFilter {
    /// Match records carrying at least one of these tags. Empty means no
    /// tag constraint.
    pub any_tag: Vec<String>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

impl IndexFilter {
    pub fn is_empty(&self) -> bool {
        self.any_tag.is_empty() && self.since.is_none() && self.until.is_none()
    }

    pub fn matches(&self, record: &VectorRecord) -> bool {
        if !self.any_tag.is_empty()
            && !self.any_tag.iter().any(|t| record.user_tags.contains(t))
        {
            return false;
        }
        if let Some(since) = self.since {
            if record.created_at < since {
                return false;
            }
        }
        if let Some(until) = self.until {
            if record.created_at > until {
                return false;
            }
        }
        true
    }
}

/// A single similarity hit from the vector index.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub article_id: String,
    pub score: f32,
    pub user_note: Option<String>,
    pub user_tags: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// A semantic search result hydrated against the article store.
#[derive(Debug, Clone)]
pub struct RetrievedArticle {
    pub article: Article,
    pub score: f32,
    pub user_note: Option<String>,
    pub user_tags: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreStats {
    pub total_articles: u64,
    pub summarized_articles: u64,
    pub saved_articles: u64,
    pub newest_article: Option<DateTime<Utc>>,
    pub oldest_article: Option<DateTime<Utc>>,
    pub size_bytes: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndexStats {
    pub records: u64,
    pub dimension: Option<usize>,
    pub size_bytes: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn record(id: &str, tags: &[&str]) -> VectorRecord {
        VectorRecord {
            article_id: id.to_string(),
            embedding: vec![0.0; 4],
            indexed_text: String::new(),
            user_note: None,
            user_tags: tags.iter().map(|t| t.to_string()).collect(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn filter_matches_any_tag() {
        let filter = IndexFilter {
            any_tag: vec!["ai".to_string()],
            ..Default::default()
        };
        assert!(filter.matches(&record("1", &["ai", "rust"])));
        assert!(!filter.matches(&record("2", &["golang"])));
    }

    #[test]
    fn filter_matches_date_range() {
        let mut rec = record("1", &[]);
        rec.created_at = Utc::now() - chrono::Duration::days(10);
        let filter = IndexFilter {
            since: Some(Utc::now() - chrono::Duration::days(5)),
            ..Default::default()
        };
        assert!(!filter.matches(&rec));
        let filter = IndexFilter {
            since: Some(Utc::now() - chrono::Duration::days(30)),
            ..Default::default()
        };
        assert!(filter.matches(&rec));
    }

    #[test]
    fn digest_display_text_includes_bullets() {
        let digest = ArticleDigest {
            summary: "A summary.".to_string(),
            bullets: vec!["first".to_string(), "second".to_string()],
        };
        let text = digest.to_display_text();
        assert!(text.starts_with("A summary."));
        assert!(text.contains("• first"));
        assert!(text.contains("• second"));
    }
}
