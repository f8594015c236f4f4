use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Fetch error: {0}")]
    Fetch(String),

    #[error("Generation error: {0}")]
    Generation(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Index error: {0}")]
    Index(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("External error: {0}")]
    External(#[from] anyhow::Error),
}

impl Error {
    /// Provider failures (generation, embedding, fetch) are retryable; local
    /// persistence failures are not.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::Fetch(_) | Error::Generation(_) | Error::Embedding(_) | Error::Http(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
