// Database module
// LanceDB holds chunk text, provenance and vectors for similarity search

pub mod lancedb;

pub use self::lancedb::{
    ChunkMetadata, CollectionMetadata, CollectionStats, EmbeddedChunk, ScoredChunk,
    StoredDocument, vector_store::VectorStore,
};
