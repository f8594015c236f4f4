pub mod providers;
pub mod retry;

pub use md_core::{EmbeddingProvider, GenerationProvider};
pub use providers::{
    AnthropicConfig, AnthropicGenerator, DummyEmbedder, DummyGenerator, VoyageConfig,
    VoyageEmbedder,
};
pub use retry::RetryPolicy;

pub mod prelude {
    pub use super::providers::*;
    pub use super::retry::RetryPolicy;
    pub use md_core::{
        ArticleDigest, EmbeddingProvider, Error, GenerationMode, GenerationProvider,
        GenerationRequest, Result,
    };
}
