//! Core data models shared by ingestion, storage, and retrieval.
//!
//! A document is never stored as a row of its own: it exists only as the set
//! of [`ChunkRecord`]s that carry its `doc_id` in their [`ChunkMetadata`].
//! [`DocumentSummary`] is derived from those records on demand.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Build the storage identifier for a chunk: `{doc_id}_chunk_{index}`.
pub fn chunk_id(doc_id: &str, chunk_index: usize) -> String {
    format!("{}_chunk_{}", doc_id, chunk_index)
}

/// A contiguous piece of a document's extracted text.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    /// `{doc_id}_chunk_{chunk_index}`.
    pub id: String,
    pub doc_id: String,
    /// Zero-based position within the document.
    pub chunk_index: usize,
    pub text: String,
    /// SHA-256 of `text`, hex encoded.
    pub hash: String,
}

/// Metadata attached to every stored chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub doc_id: String,
    pub filename: String,
    pub chunk_index: usize,
    pub upload_date: DateTime<Utc>,
}

/// The unit written to a [`VectorStore`](crate::store::VectorStore).
#[derive(Debug, Clone)]
pub struct ChunkRecord {
    pub id: String,
    pub embedding: Vec<f32>,
    pub text: String,
    pub hash: String,
    pub metadata: ChunkMetadata,
}

/// A stored chunk as returned by a metadata scan (no vector).
#[derive(Debug, Clone)]
pub struct StoredChunk {
    pub id: String,
    pub text: String,
    pub metadata: ChunkMetadata,
}

/// A nearest-neighbor hit, carrying the store's native distance.
#[derive(Debug, Clone)]
pub struct QueryHit {
    pub id: String,
    pub text: String,
    pub metadata: ChunkMetadata,
    /// Cosine distance: `0.0` is identical, larger is less similar.
    pub distance: f32,
}

/// A retrieved passage presented to callers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Source {
    /// Original filename of the owning document.
    pub document: String,
    pub chunk_text: String,
    /// `1 - distance`, clamped to `[0, 1]`. Higher is more relevant.
    pub relevance_score: f64,
}

/// One entry of the document catalog.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentSummary {
    pub doc_id: String,
    pub filename: String,
    /// Earliest `upload_date` across the document's chunks.
    pub upload_date: DateTime<Utc>,
    pub chunk_count: usize,
}
