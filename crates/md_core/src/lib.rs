pub mod error;
pub mod index;
pub mod providers;
pub mod store;
pub mod types;

pub use error::Error;
pub use index::VectorIndex;
pub use providers::{ArticleFetcher, EmbeddingProvider, GenerationProvider};
pub use store::ArticleStore;
pub use types::{
    Article, ArticleDigest, GenerationMode, GenerationRequest, IndexFilter, IndexStats,
    RawArticle, RetrievedArticle, SearchHit, StoreStats, VectorRecord,
};

pub type Result<T> = std::result::Result<T, Error>;

/// Cosine similarity between two vectors. Mismatched or zero-length inputs
/// score 0.0 rather than erroring, so a bad vector ranks last instead of
/// failing the whole query.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Deterministic left-truncation to at most `max_chars` characters,
/// respecting char boundaries. Same input always truncates the same way.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

pub mod prelude {
    pub use super::{
        Article, ArticleDigest, ArticleStore, EmbeddingProvider, Error, GenerationMode,
        GenerationProvider, IndexFilter, RawArticle, Result, SearchHit, VectorIndex,
        VectorRecord,
    };
}
