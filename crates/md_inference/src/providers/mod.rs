pub mod anthropic;
pub mod dummy;
pub mod voyage;

pub use anthropic::{AnthropicConfig, AnthropicGenerator};
pub use dummy::{DummyEmbedder, DummyGenerator};
pub use voyage::{VoyageConfig, VoyageEmbedder};
