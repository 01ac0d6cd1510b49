// PDF loader
// Turns PDF bytes into ordered per-page text. Unreadable input degrades to an
// empty page list carrying a warning instead of failing the upload.


use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use tracing::{debug, warn};

const PDF_MAGIC: &[u8] = b"%PDF-";

/// Text of a single PDF page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    /// Zero-based page number
    pub number: u32,
    pub text: String,
}

/// Result of loading a document
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadedDocument {
    pub pages: Vec<Page>,
    /// Set when the document could not be read, or yielded no text
    pub warning: Option<String>,
}

impl LoadedDocument {
    fn degraded(warning: String) -> Self {
        warn!("{}", warning);
        Self {
            pages: Vec::new(),
            warning: Some(warning),
        }
    }

    /// True when no page carries any text
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.pages.iter().all(|p| p.text.trim().is_empty())
    }
}

/// Load a PDF from disk
#[inline]
pub fn load_pdf_file(path: &Path) -> LoadedDocument {
    debug!("Loading PDF from {}", path.display());

    match std::fs::read(path) {
        Ok(bytes) => load_pdf(&bytes),
        Err(e) => LoadedDocument::degraded(format!(
            "Failed to read PDF at {}: {}",
            path.display(),
            e
        )),
    }
}

/// Load a PDF from memory
#[inline]
pub fn load_pdf(bytes: &[u8]) -> LoadedDocument {
    if bytes.is_empty() {
        return LoadedDocument::degraded("PDF is empty".to_string());
    }

    if !bytes.starts_with(PDF_MAGIC) {
        return LoadedDocument::degraded("File does not look like a PDF document".to_string());
    }

    // pdf-extract panics on some malformed inputs
    let extracted = panic::catch_unwind(AssertUnwindSafe(|| {
        pdf_extract::extract_text_from_mem_by_pages(bytes)
    }));

    let page_texts = match extracted {
        Ok(Ok(pages)) => pages,
        Ok(Err(e)) => {
            return LoadedDocument::degraded(format!("Failed to parse PDF: {}", e));
        }
        Err(_) => {
            return LoadedDocument::degraded("PDF parser aborted on malformed input".to_string());
        }
    };

    let pages: Vec<Page> = page_texts
        .into_iter()
        .enumerate()
        .map(|(i, text)| Page {
            number: u32::try_from(i).unwrap_or(u32::MAX),
            text,
        })
        .collect();

    debug!("Loaded {} page(s) from PDF", pages.len());

    if pages.is_empty() {
        return LoadedDocument::degraded("PDF contains no pages".to_string());
    }

    let mut document = LoadedDocument {
        pages,
        warning: None,
    };

    if document.is_empty() {
        let warning = "PDF contains no extractable text (it may be scanned images)".to_string();
        warn!("{}", warning);
        document.warning = Some(warning);
    }

    document
}
