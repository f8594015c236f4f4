use async_trait::async_trait;
use md_core::{ArticleDigest, GenerationRequest, Result};
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::{EmbeddingProvider, GenerationProvider};

/// Offline generation provider for tests and dry runs: summary is the first
/// 20 words, bullets are the first sentences.
pub struct DummyGenerator;

impl fmt::Debug for DummyGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DummyGenerator").finish()
    }
}

#[async_trait]
impl GenerationProvider for DummyGenerator {
    fn name(&self) -> &str {
        "Dummy"
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<ArticleDigest> {
        let words: Vec<&str> = request.text.split_whitespace().take(20).collect();
        let bullets = request
            .text
            .split('.')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .take(3)
            .map(|s| s.to_string())
            .collect();
        Ok(ArticleDigest {
            summary: words.join(" "),
            bullets,
        })
    }
}

/// Offline embedding provider: hashes words into a fixed number of buckets,
/// so texts sharing vocabulary come out similar under cosine similarity.
pub struct DummyEmbedder {
    dimension: usize,
}

impl DummyEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut embedding = vec![0.0f32; self.dimension];
        for word in text.to_lowercase().split_whitespace() {
            let mut hasher = DefaultHasher::new();
            word.hash(&mut hasher);
            let bucket = (hasher.finish() as usize) % self.dimension;
            embedding[bucket] += 1.0;
        }
        embedding
    }
}

impl Default for DummyEmbedder {
    fn default() -> Self {
        Self::new(64)
    }
}

impl fmt::Debug for DummyEmbedder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DummyEmbedder")
            .field("dimension", &self.dimension)
            .finish()
    }
}

#[async_trait]
impl EmbeddingProvider for DummyEmbedder {
    fn name(&self) -> &str {
        "Dummy"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }
}
