// Answer generation
// Builds the grounded system prompt and asks the selected chat model for an
// answer drawn only from retrieved context.


use std::sync::Arc;
use tracing::{debug, error};

use crate::backends::{OllamaClient, OpenAiClient};
use crate::config::{Config, Provider};
use crate::{DocMindError, Result};

/// Exact reply expected when the context does not contain the answer
pub const FALLBACK_ANSWER: &str =
    "I don't have enough information in the provided documents to answer that.";

/// Build the system instruction that confines the model to `context`
#[inline]
pub fn build_system_prompt(context: &str) -> String {
    format!(
        "You are DocMind AI, a helpful enterprise assistant.\n\
         Use ONLY the following context to answer the user's question.\n\
         If the answer is not in the context, say \"{}\"\n\n\
         Context:\n{}",
        FALLBACK_ANSWER, context
    )
}

/// A chat model that completes one system + user exchange
pub trait ChatBackend: Send + Sync {
    fn complete(&self, system: &str, user: &str) -> Result<String>;
}

#[derive(Debug, Clone)]
pub struct OllamaChat {
    client: OllamaClient,
    model: String,
}

impl OllamaChat {
    #[inline]
    pub fn new(client: OllamaClient, model: String) -> Self {
        Self { client, model }
    }
}

impl ChatBackend for OllamaChat {
    #[inline]
    fn complete(&self, system: &str, user: &str) -> Result<String> {
        self.client
            .chat(&self.model, system, user)
            .map_err(|e| DocMindError::Generation(format!("{:#}", e)))
    }
}

#[derive(Debug, Clone)]
pub struct OpenAiChat {
    client: OpenAiClient,
    model: String,
}

impl OpenAiChat {
    #[inline]
    pub fn new(client: OpenAiClient, model: String) -> Self {
        Self { client, model }
    }
}

impl ChatBackend for OpenAiChat {
    #[inline]
    fn complete(&self, system: &str, user: &str) -> Result<String> {
        self.client
            .chat(&self.model, system, user)
            .map_err(|e| DocMindError::Generation(format!("{:#}", e)))
    }
}

/// Routes grounded questions to the chat model chosen per request
#[derive(Clone)]
pub struct AnswerGenerator {
    openai: Arc<dyn ChatBackend>,
    ollama: Arc<dyn ChatBackend>,
}

impl std::fmt::Debug for AnswerGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnswerGenerator").finish_non_exhaustive()
    }
}

impl AnswerGenerator {
    #[inline]
    pub fn new(openai: Arc<dyn ChatBackend>, ollama: Arc<dyn ChatBackend>) -> Self {
        Self { openai, ollama }
    }

    /// Both backends are built up front; a missing OpenAI key only fails
    /// when OpenAI is actually asked
    #[inline]
    pub fn from_config(config: &Config) -> Result<Self> {
        let openai = OpenAiChat::new(
            OpenAiClient::new(config)?,
            config.chat_model(Provider::OpenAi).to_string(),
        );
        let ollama = OllamaChat::new(
            OllamaClient::new(config)?,
            config.chat_model(Provider::Ollama).to_string(),
        );

        Ok(Self::new(Arc::new(openai), Arc::new(ollama)))
    }

    fn backend(&self, provider: Provider) -> &dyn ChatBackend {
        match provider {
            Provider::OpenAi => self.openai.as_ref(),
            Provider::Ollama => self.ollama.as_ref(),
        }
    }

    /// Answer `question` from `context` with the chosen model
    #[inline]
    pub fn generate(&self, context: &str, question: &str, provider: Provider) -> Result<String> {
        debug!(
            "Generating answer with {} ({} context chars)",
            provider,
            context.chars().count()
        );

        let system = build_system_prompt(context);
        self.backend(provider)
            .complete(&system, question)
            .inspect_err(|e| error!("Answer generation failed: {}", e))
    }
}
