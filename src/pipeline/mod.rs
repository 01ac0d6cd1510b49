// Document pipeline
// Orchestrates upload ingestion (load, chunk, embed, store) and grounded
// question answering over the stored chunks.


use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::config::{Config, Provider};
use crate::database::{CollectionStats, EmbeddedChunk, StoredDocument, VectorStore};
use crate::embeddings::{
    ChunkingConfig, EmbeddingProvider, build_embedding_provider, chunk_pages,
};
use crate::generation::{AnswerGenerator, FALLBACK_ANSWER};
use crate::loader::{LoadedDocument, Page, load_pdf_file};
use crate::{DocMindError, Result};

/// Outcome of ingesting one document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestReport {
    pub filename: String,
    pub chunks_count: usize,
    /// Why the document produced no text, when it did not
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

/// A grounded answer and the citations it was drawn from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatAnswer {
    pub answer: String,
    pub sources: Vec<String>,
}

/// Shared, read-only service handles for ingestion and chat
#[derive(Clone)]
pub struct DocumentPipeline {
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<VectorStore>,
    generator: AnswerGenerator,
    chunking: ChunkingConfig,
    top_k: usize,
}

impl DocumentPipeline {
    #[inline]
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        store: Arc<VectorStore>,
        generator: AnswerGenerator,
        chunking: ChunkingConfig,
        top_k: usize,
    ) -> Self {
        Self {
            embedder,
            store,
            generator,
            chunking,
            top_k,
        }
    }

    /// Build every handle from configuration
    #[inline]
    pub async fn from_config(config: &Config) -> Result<Self> {
        let embedder = build_embedding_provider(config)?;
        let store = VectorStore::new(config, embedder.model(), embedder.dimension()).await?;
        let generator = AnswerGenerator::from_config(config)?;

        Ok(Self::new(
            embedder,
            Arc::new(store),
            generator,
            config.chunking.clone(),
            config.vector_store.top_k,
        ))
    }

    #[inline]
    pub fn embedder(&self) -> &dyn EmbeddingProvider {
        self.embedder.as_ref()
    }

    #[inline]
    pub fn store(&self) -> &VectorStore {
        &self.store
    }

    #[inline]
    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// Ingest an uploaded PDF
    ///
    /// The bytes are staged in a temporary file that is removed whether or
    /// not ingestion succeeds.
    #[inline]
    pub async fn ingest_upload(&self, filename: &str, bytes: &[u8]) -> Result<IngestReport> {
        validate_upload(filename, bytes)?;

        let temp_file = stage_upload(bytes)?;
        debug!(
            "Saved upload {} to {} ({} bytes)",
            filename,
            temp_file.path().display(),
            bytes.len()
        );

        let result = self.ingest_file(filename, temp_file.path()).await;

        let temp_path = temp_file.path().to_path_buf();
        match temp_file.close() {
            Ok(()) => debug!("Removed temp file {}", temp_path.display()),
            Err(e) => warn!(
                "Failed to remove temp file {}: {}",
                temp_path.display(),
                e
            ),
        }

        result
    }

    async fn ingest_file(&self, filename: &str, path: &Path) -> Result<IngestReport> {
        let path = path.to_path_buf();
        let document = run_blocking(move || Ok(load_pdf_file(&path))).await?;
        self.ingest_document(filename, document).await
    }

    /// Ingest pages that were already extracted
    #[inline]
    pub async fn ingest_pages(&self, filename: &str, pages: Vec<Page>) -> Result<IngestReport> {
        self.ingest_document(
            filename,
            LoadedDocument {
                pages,
                warning: None,
            },
        )
        .await
    }

    async fn ingest_document(
        &self,
        filename: &str,
        document: LoadedDocument,
    ) -> Result<IngestReport> {
        let chunks = chunk_pages(&document.pages, filename, &self.chunking);
        debug!(
            "Split {} into {} chunks across {} pages",
            filename,
            chunks.len(),
            document.pages.len()
        );

        if chunks.is_empty() {
            let warning = document
                .warning
                .unwrap_or_else(|| format!("No text could be extracted from {}", filename));
            warn!("{}: {}", filename, warning);
            return Ok(IngestReport {
                filename: filename.to_string(),
                chunks_count: 0,
                warning: Some(warning),
            });
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let embedder = Arc::clone(&self.embedder);
        let vectors = run_blocking(move || embedder.embed(&texts)).await?;

        let embedded: Vec<EmbeddedChunk> = chunks
            .into_iter()
            .zip(vectors)
            .map(|(chunk, vector)| EmbeddedChunk::new(chunk, vector))
            .collect();

        let chunks_count = self.store.upsert(embedded).await?;
        info!("Ingested {} ({} chunks)", filename, chunks_count);

        Ok(IngestReport {
            filename: filename.to_string(),
            chunks_count,
            warning: document.warning,
        })
    }

    /// Answer `question` from the stored documents using `provider`'s chat model
    #[inline]
    pub async fn answer(&self, question: &str, provider: Provider) -> Result<ChatAnswer> {
        if question.trim().is_empty() {
            return Err(DocMindError::InvalidInput(
                "Question must not be empty".to_string(),
            ));
        }

        let embedder = Arc::clone(&self.embedder);
        let query_text = question.to_string();
        let query_vector = run_blocking(move || embedder.embed_one(&query_text)).await?;

        let retrieved = self.store.query(&query_vector, self.top_k).await?;
        debug!("Retrieved {} chunks for question", retrieved.len());

        if retrieved.is_empty() {
            info!("No stored chunks matched; returning fallback answer");
            return Ok(ChatAnswer {
                answer: FALLBACK_ANSWER.to_string(),
                sources: Vec::new(),
            });
        }

        let context = retrieved.iter().map(|r| r.content.as_str()).join("\n\n");
        let sources: Vec<String> = retrieved
            .iter()
            .map(|r| r.metadata.citation())
            .unique()
            .collect();

        let generator = self.generator.clone();
        let question = question.to_string();
        let answer =
            run_blocking(move || generator.generate(&context, &question, provider)).await?;

        Ok(ChatAnswer { answer, sources })
    }

    #[inline]
    pub async fn stats(&self) -> CollectionStats {
        self.store.stats().await
    }

    #[inline]
    pub async fn sample(&self, limit: usize) -> Vec<StoredDocument> {
        self.store.sample(limit).await
    }

    /// Clear the collection; failures are logged and reported as `false`
    #[inline]
    pub async fn reset(&self) -> bool {
        match self.store.reset().await {
            Ok(()) => true,
            Err(e) => {
                warn!("Reset failed: {}", e);
                false
            }
        }
    }
}

/// Reject uploads that are not non-empty `.pdf` files
#[inline]
pub fn validate_upload(filename: &str, bytes: &[u8]) -> Result<()> {
    let is_pdf = Path::new(filename)
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));

    if !is_pdf {
        return Err(DocMindError::InvalidInput(
            "Only PDF files are supported".to_string(),
        ));
    }

    if bytes.is_empty() {
        return Err(DocMindError::InvalidInput(
            "Uploaded file is empty".to_string(),
        ));
    }

    Ok(())
}

fn stage_upload(bytes: &[u8]) -> Result<NamedTempFile> {
    let mut temp_file = tempfile::Builder::new()
        .prefix("docmind-")
        .suffix(".pdf")
        .tempfile()?;
    temp_file.write_all(bytes)?;
    temp_file.flush()?;
    Ok(temp_file)
}

/// Run blocking work (HTTP calls, PDF parsing) off the async workers
async fn run_blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| DocMindError::Other(anyhow::anyhow!("Blocking task failed: {}", e)))?
}
