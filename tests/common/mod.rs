// Shared helpers for integration tests: a tiny PDF writer and deterministic
// model stand-ins
#![allow(dead_code, reason = "not every test binary uses every helper")]

use docmind::config::Config;
use docmind::database::VectorStore;
use docmind::embeddings::{ChunkingConfig, EmbeddingProvider};
use docmind::generation::{AnswerGenerator, ChatBackend};
use docmind::pipeline::DocumentPipeline;
use std::fmt::Write as _;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::TempDir;

mod keyword;

use keyword::{KEYWORD_DIMENSION, keyword_vector};

pub const CANNED_ANSWER: &str = "The payment terms are net 30 days.";

/// Bag-of-words embedder over a fixed vocabulary
pub struct KeywordEmbedder;

impl EmbeddingProvider for KeywordEmbedder {
    fn model(&self) -> &str {
        "keyword-embed"
    }

    fn dimension(&self) -> usize {
        KEYWORD_DIMENSION
    }

    fn embed(&self, texts: &[String]) -> docmind::Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|text| keyword_vector(text)).collect())
    }
}

/// Chat backend that always gives the same reply and counts calls
#[derive(Default)]
pub struct CannedChat {
    calls: AtomicUsize,
}

impl CannedChat {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ChatBackend for CannedChat {
    fn complete(&self, _system: &str, _user: &str) -> docmind::Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(CANNED_ANSWER.to_string())
    }
}

pub struct TestService {
    pub config: Config,
    pub pipeline: DocumentPipeline,
    pub chat: Arc<CannedChat>,
    _temp_dir: TempDir,
}

/// Pipeline over a fresh store in a temporary directory
pub async fn service(top_k: usize) -> TestService {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config = Config {
        base_dir: temp_dir.path().to_path_buf(),
        ..Config::default()
    };
    let (pipeline, chat) = pipeline_for(&config, top_k).await;

    TestService {
        config,
        pipeline,
        chat,
        _temp_dir: temp_dir,
    }
}

/// Build a pipeline over whatever store `config` points at
pub async fn pipeline_for(config: &Config, top_k: usize) -> (DocumentPipeline, Arc<CannedChat>) {
    let embedder: Arc<dyn EmbeddingProvider> = Arc::new(KeywordEmbedder);
    let store = VectorStore::new(config, embedder.model(), embedder.dimension())
        .await
        .expect("should open vector store");

    let chat = Arc::new(CannedChat::default());
    let generator = AnswerGenerator::new(
        Arc::clone(&chat) as Arc<dyn ChatBackend>,
        Arc::clone(&chat) as Arc<dyn ChatBackend>,
    );

    let pipeline = DocumentPipeline::new(
        embedder,
        Arc::new(store),
        generator,
        ChunkingConfig {
            chunk_size: 200,
            chunk_overlap: 40,
        },
        top_k,
    );
    (pipeline, chat)
}

fn escape_pdf_text(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace('(', "\\(")
        .replace(')', "\\)")
}

/// Write a minimal PDF with one page per entry, each line set in Helvetica
pub fn build_pdf(pages: &[&[&str]]) -> Vec<u8> {
    // 1: catalog, 2: page tree, 3: font, then (page, contents) pairs
    let page_ids: Vec<usize> = (0..pages.len()).map(|i| 4 + i * 2).collect();

    let mut objects: Vec<String> = vec![
        "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
        format!(
            "<< /Type /Pages /Kids [{}] /Count {} >>",
            page_ids
                .iter()
                .map(|id| format!("{} 0 R", id))
                .collect::<Vec<_>>()
                .join(" "),
            pages.len()
        ),
        "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica /Encoding /WinAnsiEncoding >>"
            .to_string(),
    ];

    for (lines, page_id) in pages.iter().zip(&page_ids) {
        let mut stream = String::from("BT\n/F1 12 Tf\n14 TL\n72 720 Td\n");
        for line in *lines {
            let _ = writeln!(stream, "({}) Tj T*", escape_pdf_text(line));
        }
        stream.push_str("ET");

        objects.push(format!(
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] \
             /Resources << /Font << /F1 3 0 R >> >> /Contents {} 0 R >>",
            page_id + 1
        ));
        objects.push(format!(
            "<< /Length {} >>\nstream\n{}\nendstream",
            stream.len(),
            stream
        ));
    }

    let mut pdf = String::from("%PDF-1.4\n");
    let mut offsets = Vec::with_capacity(objects.len());
    for (i, object) in objects.iter().enumerate() {
        offsets.push(pdf.len());
        let _ = write!(pdf, "{} 0 obj\n{}\nendobj\n", i + 1, object);
    }

    let xref_offset = pdf.len();
    let _ = write!(pdf, "xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1);
    for offset in offsets {
        let _ = write!(pdf, "{:010} 00000 n \n", offset);
    }
    let _ = write!(
        pdf,
        "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
        objects.len() + 1,
        xref_offset
    );

    pdf.into_bytes()
}

/// Two-page contract: renewal on page 1, payment terms on page 2
pub fn contract_pdf() -> Vec<u8> {
    build_pdf(&[
        &[
            "Master Services Agreement",
            "This agreement renews on an annual basis.",
        ],
        &[
            "Payment Terms",
            "Payment terms are net 30 days from the invoice date.",
        ],
    ])
}
