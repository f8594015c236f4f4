use async_trait::async_trait;
use md_core::{truncate_chars, ArticleDigest, Error, GenerationMode, GenerationRequest, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::retry::RetryPolicy;
use crate::GenerationProvider;

const SUMMARY_MARKER: &str = "Summary:";
const BULLETS_MARKER: &str = "Key points:";

const SYSTEM_PROMPT: &str = "You are a professional article analyst. Provide clear, \
concise, structured summaries and key points.";

#[derive(Debug, Clone)]
pub struct AnthropicConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    /// Deterministic truncation limit applied to article text before the call.
    pub max_input_chars: usize,
    pub retry: RetryPolicy,
}

impl Default for AnthropicConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: "claude-3-7-sonnet-latest".to_string(),
            base_url: "https://api.anthropic.com/v1".to_string(),
            max_input_chars: 100_000,
            retry: RetryPolicy::default(),
        }
    }
}

#[derive(Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Serialize)]
struct ThinkingConfig {
    #[serde(rename = "type")]
    kind: String,
    budget_tokens: u32,
}

#[derive(Serialize)]
struct MessagesRequest {
    model: String,
    max_tokens: u32,
    temperature: f32,
    system: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    thinking: Option<ThinkingConfig>,
    messages: Vec<ChatMessage>,
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

/// Generation adapter over the Anthropic messages API. Extended mode enables
/// a thinking budget with a larger token and latency budget.
pub struct AnthropicGenerator {
    client: Arc<Client>,
    config: AnthropicConfig,
}

impl AnthropicGenerator {
    pub fn new(config: AnthropicConfig) -> Result<Self> {
        let client = Client::builder()
            .build()
            .map_err(|e| Error::Generation(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client: Arc::new(client),
            config,
        })
    }

    fn build_prompt(&self, request: &GenerationRequest) -> String {
        let text = truncate_chars(&request.text, self.config.max_input_chars);
        format!(
            "Article title: {}\nAuthor: {}\n\nArticle content: {}\n\n\
            Please provide:\n\
            1. A concise summary of the article (2-3 sentences)\n\
            2. 3-5 key points highlighting the article's main ideas\n\n\
            Answer in this format:\n\
            {} [summary text]\n\n\
            {}\n\
            - [first point]\n\
            - [second point]\n\
            - [and so on...]",
            request.title, request.author, text, SUMMARY_MARKER, BULLETS_MARKER
        )
    }

    async fn call_once(&self, request: &GenerationRequest) -> Result<ArticleDigest> {
        let (max_tokens, thinking, timeout) = match request.mode {
            GenerationMode::Standard => (1_024, None, Duration::from_secs(60)),
            GenerationMode::Extended => (
                20_000,
                Some(ThinkingConfig {
                    kind: "enabled".to_string(),
                    budget_tokens: 10_000,
                }),
                Duration::from_secs(300),
            ),
        };

        let body = MessagesRequest {
            model: self.config.model.clone(),
            max_tokens,
            temperature: 1.0,
            system: SYSTEM_PROMPT.to_string(),
            thinking,
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: self.build_prompt(request),
            }],
        };

        let response = self
            .client
            .post(format!("{}/messages", self.config.base_url))
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", "2023-06-01")
            .timeout(timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Generation(format!("provider unreachable: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(Error::Generation(format!(
                "provider returned {}: {}",
                status, detail
            )));
        }

        let parsed: MessagesResponse = response
            .json()
            .await
            .map_err(|e| Error::Generation(format!("malformed provider response: {}", e)))?;

        // Thinking blocks are interleaved with text blocks; only text counts.
        let text: String = parsed
            .content
            .iter()
            .filter(|block| block.kind == "text")
            .filter_map(|block| block.text.as_deref())
            .collect();

        parse_digest(&text)
    }
}

impl fmt::Debug for AnthropicGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnthropicGenerator")
            .field("client", &"<reqwest::Client>")
            .field("api_key", &"<redacted>")
            .field("model", &self.config.model)
            .field("base_url", &self.config.base_url)
            .finish()
    }
}

/// Parse the delimited summary/bullets format. A missing summary marker or
/// an empty summary is a malformed response.
pub(crate) fn parse_digest(text: &str) -> Result<ArticleDigest> {
    let after_summary = text
        .split(SUMMARY_MARKER)
        .nth(1)
        .ok_or_else(|| Error::Generation("response missing summary marker".to_string()))?;

    let (summary_part, bullets_part) = match after_summary.split_once(BULLETS_MARKER) {
        Some((summary, bullets)) => (summary, Some(bullets)),
        None => (after_summary, None),
    };

    let summary = summary_part.trim().to_string();
    if summary.is_empty() {
        return Err(Error::Generation("response has empty summary".to_string()));
    }

    let bullets = bullets_part
        .map(|raw| {
            raw.lines()
                .map(str::trim)
                .filter(|line| line.starts_with("- "))
                .map(|line| line[2..].trim().to_string())
                .collect()
        })
        .unwrap_or_default();

    Ok(ArticleDigest { summary, bullets })
}

#[async_trait]
impl GenerationProvider for AnthropicGenerator {
    fn name(&self) -> &str {
        "Anthropic"
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<ArticleDigest> {
        debug!(
            "generating digest for '{}' (mode {:?})",
            request.title, request.mode
        );
        self.config
            .retry
            .clone()
            .run("generation call", || self.call_once(request))
            .await
    }
}
