// LanceDB vector database module
// Record types for stored chunks and the collection summaries built from them


pub mod vector_store;

use serde::{Deserialize, Serialize};

use crate::embeddings::{Chunk, format_citation};

/// A chunk paired with its embedding, ready to be written
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddedChunk {
    pub chunk: Chunk,
    pub vector: Vec<f32>,
}

impl EmbeddedChunk {
    #[inline]
    pub fn new(chunk: Chunk, vector: Vec<f32>) -> Self {
        Self { chunk, vector }
    }
}

/// Provenance stored alongside each chunk
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChunkMetadata {
    /// Uploaded file name
    pub source: String,
    /// Zero-based page number
    pub page: u32,
    /// Position of the chunk within its document
    pub chunk_index: u32,
    /// RFC 3339 timestamp of when the chunk was written
    pub created_at: String,
}

impl ChunkMetadata {
    #[inline]
    pub fn citation(&self) -> String {
        format_citation(&self.source, self.page)
    }
}

/// A retrieved chunk and how close it was to the query
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredChunk {
    pub content: String,
    pub metadata: ChunkMetadata,
    /// `1 - distance`; higher is closer
    pub similarity: f32,
    /// Cosine distance reported by LanceDB
    pub distance: f32,
}

/// Embedding configuration a collection was created with
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CollectionMetadata {
    pub embedding_model: String,
    pub dimension: usize,
}

/// Summary of the collection
///
/// A missing collection serializes as `{"count": 0, "status": "empty"}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CollectionStats {
    pub count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<CollectionMetadata>,
}

impl CollectionStats {
    /// Sentinel for a collection that does not exist
    #[inline]
    pub fn empty() -> Self {
        Self {
            count: 0,
            name: None,
            status: "empty".to_string(),
            metadata: None,
        }
    }

    #[inline]
    pub fn active(count: usize, name: String, metadata: Option<CollectionMetadata>) -> Self {
        Self {
            count,
            name: Some(name),
            status: "active".to_string(),
            metadata,
        }
    }
}

/// A stored row as returned by the document browser
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoredDocument {
    pub id: String,
    pub content: String,
    pub metadata: ChunkMetadata,
}
