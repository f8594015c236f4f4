use async_trait::async_trait;
use md_core::{truncate_chars, Error, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::retry::RetryPolicy;
use crate::EmbeddingProvider;

#[derive(Debug, Clone)]
pub struct VoyageConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub dimension: usize,
    /// Per-text truncation limit before the call.
    pub max_input_chars: usize,
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for VoyageConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: "voyage-large-2".to_string(),
            base_url: "https://api.voyageai.com/v1".to_string(),
            dimension: 1536,
            max_input_chars: 8_000,
            timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
        }
    }
}

#[derive(Serialize)]
struct EmbeddingRequest {
    input: Vec<String>,
    model: String,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

/// Batch embedding adapter over the Voyage AI REST API.
pub struct VoyageEmbedder {
    client: Arc<Client>,
    config: VoyageConfig,
}

impl VoyageEmbedder {
    pub fn new(config: VoyageConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::Embedding(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client: Arc::new(client),
            config,
        })
    }

    async fn call_once(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let input: Vec<String> = texts
            .iter()
            .map(|t| truncate_chars(t, self.config.max_input_chars).to_string())
            .collect();

        let response = self
            .client
            .post(format!("{}/embeddings", self.config.base_url))
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .json(&EmbeddingRequest {
                input,
                model: self.config.model.clone(),
            })
            .send()
            .await
            .map_err(|e| Error::Embedding(format!("provider unreachable: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(Error::Embedding(format!(
                "provider returned {}: {}",
                status, detail
            )));
        }

        let parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| Error::Embedding(format!("malformed provider response: {}", e)))?;

        align_batch(parsed.data, texts.len(), self.config.dimension)
    }
}

impl fmt::Debug for VoyageEmbedder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VoyageEmbedder")
            .field("client", &"<reqwest::Client>")
            .field("api_key", &"<redacted>")
            .field("model", &self.config.model)
            .finish()
    }
}

/// Restore request order from the provider's `index` field and verify the
/// batch is complete and dimensionally consistent. Any mismatch fails the
/// whole batch; misaligned partial results would corrupt the index.
fn align_batch(
    mut data: Vec<EmbeddingData>,
    expected: usize,
    dimension: usize,
) -> Result<Vec<Vec<f32>>> {
    if data.len() != expected {
        return Err(Error::Embedding(format!(
            "provider returned {} vectors for {} inputs",
            data.len(),
            expected
        )));
    }
    data.sort_by_key(|d| d.index);
    for (position, entry) in data.iter().enumerate() {
        if entry.index != position {
            return Err(Error::Embedding(format!(
                "provider batch is missing index {}",
                position
            )));
        }
        if entry.embedding.len() != dimension {
            return Err(Error::Embedding(format!(
                "vector {} has dimension {}, expected {}",
                position,
                entry.embedding.len(),
                dimension
            )));
        }
    }
    Ok(data.into_iter().map(|d| d.embedding).collect())
}

#[async_trait]
impl EmbeddingProvider for VoyageEmbedder {
    fn name(&self) -> &str {
        "Voyage"
    }

    fn dimension(&self) -> usize {
        self.config.dimension
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.config
            .retry
            .clone()
            .run("embedding call", || self.call_once(texts))
            .await
    }
}
