
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::ConfigError;
use crate::loader::Page;

/// Break points tried, in order of preference, when a window has to be cut
const SEPARATORS: [&str; 3] = ["\n\n", "\n", " "];

/// A bounded span of document text tagged with its provenance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// The chunk text
    pub content: String,
    /// Name of the uploaded document
    pub source: String,
    /// Zero-based page number the text came from
    pub page: u32,
    /// Position of this chunk within its document
    pub chunk_index: usize,
}

impl Chunk {
    /// Citation shown to users, with a one-based page number
    #[inline]
    pub fn citation(&self) -> String {
        format_citation(&self.source, self.page)
    }
}

/// Format `"<document> (Page <n>)"` from a zero-based page number
#[inline]
pub fn format_citation(source: &str, page: u32) -> String {
    format!("{} (Page {})", source, page.saturating_add(1))
}

/// Configuration for content chunking, measured in characters
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Maximum characters per chunk
    pub chunk_size: usize,
    /// Characters shared by consecutive chunks of the same page
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    #[inline]
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
        }
    }
}

impl ChunkingConfig {
    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(100..=8000).contains(&self.chunk_size) {
            return Err(ConfigError::InvalidChunkSize(self.chunk_size));
        }

        if self.chunk_overlap >= self.chunk_size {
            return Err(ConfigError::OverlapTooLarge(
                self.chunk_overlap,
                self.chunk_size,
            ));
        }

        Ok(())
    }
}

/// Split every page of a document into overlapping chunks
///
/// Chunks never span pages. An empty page list yields no chunks.
#[inline]
pub fn chunk_pages(pages: &[Page], source: &str, config: &ChunkingConfig) -> Vec<Chunk> {
    let mut chunks = Vec::new();

    for page in pages {
        for content in split_text(&page.text, config) {
            chunks.push(Chunk {
                content,
                source: source.to_string(),
                page: page.number,
                chunk_index: chunks.len(),
            });
        }
    }

    debug!(
        "Chunked '{}' ({} pages) into {} chunks",
        source,
        pages.len(),
        chunks.len()
    );

    chunks
}

/// Split text into windows of at most `chunk_size` characters
///
/// Consecutive windows share exactly `chunk_overlap` characters. A window that
/// does not reach the end of the text is cut after the last paragraph break,
/// line break or space in its second half, when there is one.
#[inline]
pub fn split_text(text: &str, config: &ChunkingConfig) -> Vec<String> {
    if text.trim().is_empty() {
        return Vec::new();
    }

    // offsets[i] is the byte offset of character i; the last entry is text.len()
    let offsets: Vec<usize> = text
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .collect();
    let total_chars = offsets.len() - 1;

    if total_chars <= config.chunk_size {
        return vec![text.to_string()];
    }

    let mut pieces = Vec::new();
    let mut start = 0;

    loop {
        let hard_end = (start + config.chunk_size).min(total_chars);
        let end = if hard_end == total_chars {
            total_chars
        } else {
            find_break(text, &offsets, start, hard_end, config)
        };

        let piece = &text[offsets[start]..offsets[end]];
        if !piece.trim().is_empty() {
            pieces.push(piece.to_string());
        }

        if end == total_chars {
            break;
        }
        start = end - config.chunk_overlap;
    }

    pieces
}

/// Pick the end (in characters) of the window starting at `start`
///
/// The result is always greater than `start + chunk_overlap`, so the next
/// window makes progress.
fn find_break(
    text: &str,
    offsets: &[usize],
    start: usize,
    hard_end: usize,
    config: &ChunkingConfig,
) -> usize {
    let floor = start + (config.chunk_overlap + 1).max(config.chunk_size / 2);
    if floor >= hard_end {
        return hard_end;
    }

    let window_start = offsets[floor];
    let window = &text[window_start..offsets[hard_end]];

    for separator in SEPARATORS {
        if let Some(pos) = window.rfind(separator) {
            let byte_end = window_start + pos + separator.len();
            if let Ok(char_end) = offsets.binary_search(&byte_end) {
                return char_end;
            }
        }
    }

    hard_end
}
