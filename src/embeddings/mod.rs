// Embeddings module
// Chunking of page text and the embedding providers that vectorize it

pub mod chunking;


use std::sync::Arc;
use tracing::{debug, info};

pub use chunking::{Chunk, ChunkingConfig, chunk_pages, format_citation, split_text};

use crate::backends::{OllamaClient, OpenAiClient};
use crate::config::{Config, Provider};
use crate::{DocMindError, Result};

/// Maps text to fixed-dimension vectors
///
/// Implementations block on network I/O; async callers should go through
/// `tokio::task::spawn_blocking`.
pub trait EmbeddingProvider: Send + Sync {
    /// Identifier of the embedding model
    fn model(&self) -> &str;

    /// Length of every vector this provider returns
    fn dimension(&self) -> usize;

    /// Embed `texts`, returning one vector per input in the same order
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Embed a single text
    #[inline]
    fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        self.embed(&[text.to_string()])?
            .pop()
            .ok_or_else(|| DocMindError::Embedding("Provider returned no vector".to_string()))
    }
}

/// Embeds through a local Ollama server
#[derive(Debug, Clone)]
pub struct OllamaEmbedder {
    client: OllamaClient,
    model: String,
    dimension: usize,
    batch_size: usize,
}

impl OllamaEmbedder {
    #[inline]
    pub fn new(client: OllamaClient, model: String, dimension: usize, batch_size: usize) -> Self {
        Self {
            client,
            model,
            dimension,
            batch_size: batch_size.max(1),
        }
    }

    #[inline]
    pub fn from_config(config: &Config) -> Result<Self> {
        let client = OllamaClient::new(config)?;
        Ok(Self::new(
            client,
            config.ollama.embedding_model.clone(),
            config.ollama.embedding_dimension as usize,
            config.ollama.batch_size as usize,
        ))
    }
}

impl EmbeddingProvider for OllamaEmbedder {
    #[inline]
    fn model(&self) -> &str {
        &self.model
    }

    #[inline]
    fn dimension(&self) -> usize {
        self.dimension
    }

    #[inline]
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        embed_in_batches(texts, self.batch_size, self.dimension, |batch| {
            self.client.embed(&self.model, batch)
        })
    }
}

/// Embeds through the OpenAI embeddings endpoint
#[derive(Debug, Clone)]
pub struct OpenAiEmbedder {
    client: OpenAiClient,
    model: String,
    dimension: usize,
    batch_size: usize,
}

impl OpenAiEmbedder {
    #[inline]
    pub fn new(client: OpenAiClient, model: String, dimension: usize, batch_size: usize) -> Self {
        Self {
            client,
            model,
            dimension,
            batch_size: batch_size.max(1),
        }
    }

    #[inline]
    pub fn from_config(config: &Config) -> Result<Self> {
        let client = OpenAiClient::new(config)?;
        Ok(Self::new(
            client,
            config.openai.embedding_model.clone(),
            config.openai.embedding_dimension as usize,
            config.openai.batch_size as usize,
        ))
    }
}

impl EmbeddingProvider for OpenAiEmbedder {
    #[inline]
    fn model(&self) -> &str {
        &self.model
    }

    #[inline]
    fn dimension(&self) -> usize {
        self.dimension
    }

    #[inline]
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        embed_in_batches(texts, self.batch_size, self.dimension, |batch| {
            self.client.embed(&self.model, batch)
        })
    }
}

/// Build the process-wide embedding provider selected by `config.provider`
#[inline]
pub fn build_embedding_provider(config: &Config) -> Result<Arc<dyn EmbeddingProvider>> {
    let provider: Arc<dyn EmbeddingProvider> = match config.provider {
        Provider::OpenAi => Arc::new(OpenAiEmbedder::from_config(config)?),
        Provider::Ollama => Arc::new(OllamaEmbedder::from_config(config)?),
    };

    info!(
        "Using {} embeddings: {} ({} dimensions)",
        config.provider,
        provider.model(),
        provider.dimension()
    );
    Ok(provider)
}

/// Send `texts` through `embed_batch` in slices of `batch_size`, checking
/// every returned vector against `dimension`
fn embed_in_batches<F>(
    texts: &[String],
    batch_size: usize,
    dimension: usize,
    mut embed_batch: F,
) -> Result<Vec<Vec<f32>>>
where
    F: FnMut(&[String]) -> anyhow::Result<Vec<Vec<f32>>>,
{
    let mut vectors = Vec::with_capacity(texts.len());

    for (batch_index, batch) in texts.chunks(batch_size.max(1)).enumerate() {
        debug!(
            "Embedding batch {} ({} texts)",
            batch_index + 1,
            batch.len()
        );

        let embedded =
            embed_batch(batch).map_err(|e| DocMindError::Embedding(format!("{:#}", e)))?;

        if embedded.len() != batch.len() {
            return Err(DocMindError::Embedding(format!(
                "Expected {} vectors, got {}",
                batch.len(),
                embedded.len()
            )));
        }

        if let Some(bad) = embedded.iter().find(|v| v.len() != dimension) {
            return Err(DocMindError::Embedding(format!(
                "Expected vectors of dimension {}, got {}",
                dimension,
                bad.len()
            )));
        }

        vectors.extend(embedded);
    }

    Ok(vectors)
}
