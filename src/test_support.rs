// Deterministic stand-ins for the model backends, shared by unit tests

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

use crate::config::Config;
use crate::database::VectorStore;
use crate::embeddings::{ChunkingConfig, EmbeddingProvider};
use crate::generation::{AnswerGenerator, ChatBackend};
use crate::pipeline::DocumentPipeline;
use crate::{DocMindError, Result};

#[path = "../tests/common/keyword.rs"]
mod keyword;

use keyword::{KEYWORD_DIMENSION, keyword_vector};

pub(crate) struct KeywordEmbedder;

impl EmbeddingProvider for KeywordEmbedder {
    fn model(&self) -> &str {
        "keyword-embed"
    }

    fn dimension(&self) -> usize {
        KEYWORD_DIMENSION
    }

    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|text| keyword_vector(text)).collect())
    }
}

pub(crate) struct FailingEmbedder;

impl EmbeddingProvider for FailingEmbedder {
    fn model(&self) -> &str {
        "keyword-embed"
    }

    fn dimension(&self) -> usize {
        KEYWORD_DIMENSION
    }

    fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Err(DocMindError::Embedding("embedding service unavailable".to_string()))
    }
}

pub(crate) struct ScriptedChat {
    reply: String,
    calls: AtomicUsize,
    last_system: Mutex<String>,
}

impl ScriptedChat {
    pub(crate) fn replying(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: reply.to_string(),
            calls: AtomicUsize::new(0),
            last_system: Mutex::new(String::new()),
        })
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn last_system(&self) -> String {
        self.last_system
            .lock()
            .expect("lock should not be poisoned")
            .clone()
    }
}

impl ChatBackend for ScriptedChat {
    fn complete(&self, system: &str, _user: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self
            .last_system
            .lock()
            .expect("lock should not be poisoned") = system.to_string();
        Ok(self.reply.clone())
    }
}

pub(crate) struct Fixture {
    pub(crate) pipeline: DocumentPipeline,
    pub(crate) chat: Arc<ScriptedChat>,
    _temp_dir: TempDir,
}

pub(crate) async fn fixture_with(embedder: Arc<dyn EmbeddingProvider>, top_k: usize) -> Fixture {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config = Config {
        base_dir: temp_dir.path().to_path_buf(),
        ..Config::default()
    };

    let store = VectorStore::new(&config, embedder.model(), embedder.dimension())
        .await
        .expect("should create vector store");
    let chat = ScriptedChat::replying("The payment terms are net 30 days.");
    let generator = AnswerGenerator::new(
        Arc::clone(&chat) as Arc<dyn ChatBackend>,
        Arc::clone(&chat) as Arc<dyn ChatBackend>,
    );

    let pipeline = DocumentPipeline::new(
        embedder,
        Arc::new(store),
        generator,
        ChunkingConfig {
            chunk_size: 100,
            chunk_overlap: 20,
        },
        top_k,
    );

    Fixture {
        pipeline,
        chat,
        _temp_dir: temp_dir,
    }
}

pub(crate) async fn fixture(top_k: usize) -> Fixture {
    fixture_with(Arc::new(KeywordEmbedder), top_k).await
}

mod tests {
    use super::*;

    #[test]
    fn keyword_embedder_counts_vocabulary_words() {
        let vectors = KeywordEmbedder
            .embed(&[
                "Payment terms: net 30 days, payment due on receipt.".to_string(),
                "Nothing relevant here".to_string(),
            ])
            .expect("keyword embedding should succeed");

        assert_eq!(vectors.len(), 2);
        assert_eq!(vectors[0].len(), KeywordEmbedder.dimension());
        assert_eq!(vectors[0][..4], [2.0, 1.0, 1.0, 1.0]);
        assert_eq!(vectors[1], keyword_vector("unrelated words"));
        assert_eq!(vectors[1].iter().sum::<f32>(), 1.0);
    }
}
