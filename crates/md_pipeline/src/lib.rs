pub mod ingest;
pub mod retrieval;

pub use ingest::{CancelFlag, IngestConfig, IngestReport, IngestionPipeline};
pub use retrieval::RetrievalService;

pub mod prelude {
    pub use super::ingest::{CancelFlag, IngestConfig, IngestReport, IngestionPipeline};
    pub use super::retrieval::RetrievalService;
    pub use md_core::{
        Article, ArticleStore, EmbeddingProvider, GenerationProvider, IndexFilter, RawArticle,
        Result, VectorIndex,
    };
}
