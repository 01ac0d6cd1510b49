
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

use super::{HttpTransport, ensure_batch_len};
use crate::config::Config;

/// Client for the OpenAI HTTP API (or a compatible server)
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    transport: HttpTransport,
    has_api_key: bool,
}

#[derive(Debug, Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ModelsResponse {
    data: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
struct ModelEntry {
    id: String,
}

impl OpenAiClient {
    #[inline]
    pub fn new(config: &Config) -> Result<Self> {
        let base_url = config
            .openai_url()
            .context("Failed to generate OpenAI URL from config")?;

        let mut transport =
            HttpTransport::new(base_url, Duration::from_secs(config.timeout_seconds));
        transport.set_bearer_token(config.openai.api_key.clone());

        Ok(Self {
            transport,
            has_api_key: config.openai.api_key.is_some(),
        })
    }

    #[inline]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.transport.set_timeout(timeout);
        self
    }

    #[inline]
    pub fn with_retry_attempts(mut self, attempts: u32) -> Self {
        self.transport.set_retry_attempts(attempts);
        self
    }

    #[inline]
    pub fn base_url(&self) -> &url::Url {
        self.transport.base_url()
    }

    fn require_api_key(&self) -> Result<()> {
        if self.has_api_key {
            Ok(())
        } else {
            Err(anyhow::anyhow!(
                "OpenAI API key is not configured (set OPENAI_API_KEY)"
            ))
        }
    }

    /// Verify the key is accepted and `model` is visible to it
    #[inline]
    pub fn health_check(&self, model: &str) -> Result<()> {
        let models = self.list_models().context("Failed to list models")?;

        if !models.iter().any(|m| m == model) {
            return Err(anyhow::anyhow!("Model '{}' is not available", model));
        }

        info!("Health check passed for OpenAI API with model {}", model);
        Ok(())
    }

    /// List model ids visible to the configured key
    #[inline]
    pub fn list_models(&self) -> Result<Vec<String>> {
        self.require_api_key()?;

        let response_text = self
            .transport
            .get("models")
            .context("Failed to fetch models")?;
        let response: ModelsResponse =
            serde_json::from_str(&response_text).context("Failed to parse models response")?;

        Ok(response.data.into_iter().map(|m| m.id).collect())
    }

    /// Embed one batch of texts with `model`, preserving input order
    #[inline]
    pub fn embed(&self, model: &str, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.require_api_key()?;

        debug!("Generating {} embeddings with {}", texts.len(), model);

        let request = EmbeddingsRequest {
            model,
            input: texts,
        };

        let response_text = self
            .transport
            .post_json("embeddings", &request)
            .context("Failed to generate embeddings")?;

        let mut response: EmbeddingsResponse = serde_json::from_str(&response_text)
            .context("Failed to parse embedding response")?;

        ensure_batch_len(texts.len(), response.data.len())?;
        response.data.sort_by_key(|d| d.index);

        Ok(response.data.into_iter().map(|d| d.embedding).collect())
    }

    /// Run a single chat completion at temperature 0
    #[inline]
    pub fn chat(&self, model: &str, system: &str, user: &str) -> Result<String> {
        self.require_api_key()?;

        debug!("Requesting chat completion from OpenAI ({})", model);

        let request = ChatCompletionRequest {
            model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            temperature: 0.0,
        };

        let response_text = self
            .transport
            .post_json("chat/completions", &request)
            .context("Failed to generate chat completion")?;

        let response: ChatCompletionResponse = serde_json::from_str(&response_text)
            .context("Failed to parse chat completion response")?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| anyhow::anyhow!("Chat completion returned no content"))
    }
}
