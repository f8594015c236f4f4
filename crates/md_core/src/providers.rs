use async_trait::async_trait;

use crate::types::{ArticleDigest, GenerationRequest, RawArticle};
use crate::Result;

/// External generative-text capability producing a summary plus bullet
/// digest from article text.
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    fn name(&self) -> &str;

    /// One summarization call. Implementations truncate the request text to
    /// their context limit deterministically before calling out, and fail
    /// with `Error::Generation` on unreachable, rate-limited or malformed
    /// responses.
    async fn generate(&self, request: &GenerationRequest) -> Result<ArticleDigest>;
}

/// External embedding capability mapping text to fixed-length vectors.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Dimension of every vector this provider returns.
    fn dimension(&self) -> usize;

    /// Embed a batch. The output is parallel to the input: one vector per
    /// text, same order. A partial provider failure is a whole-batch
    /// `Error::Embedding`; callers never see misaligned results.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// External fetch capability returning raw trending-article records. The
/// pipeline never scrapes content itself.
#[async_trait]
pub trait ArticleFetcher: Send + Sync {
    async fn fetch_trending(&self, count: usize) -> Result<Vec<RawArticle>>;
}
