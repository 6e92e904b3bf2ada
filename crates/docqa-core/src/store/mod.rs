//! Vector store abstraction.
//!
//! The [`VectorStore`] trait is the usage contract the pipelines rely on.
//! The engine behind it is opaque; what matters is:
//!
//! | Method | Contract |
//! |--------|----------|
//! | [`upsert`](VectorStore::upsert) | Whole batch or nothing. Existing ids are replaced. |
//! | [`query`](VectorStore::query) | Up to `k` hits, ascending cosine distance. Empty store → empty result. |
//! | [`get`](VectorStore::get) | Metadata scan, in no particular order. |
//! | [`delete`](VectorStore::delete) | Remove by id; unknown ids are ignored. |
//! | [`delete_where`](VectorStore::delete_where) | Remove by filter, returning the ids removed. |
//!
//! Concurrency discipline (read-your-writes, per-id atomicity) belongs to
//! the implementation. Callers never hold locks across calls.

pub mod memory;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::models::{ChunkRecord, QueryHit, StoredChunk};

/// Metadata filter for scans and deletes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkFilter {
    All,
    DocId(String),
}

impl ChunkFilter {
    pub fn doc_id(doc_id: impl Into<String>) -> Self {
        ChunkFilter::DocId(doc_id.into())
    }

    pub fn matches(&self, doc_id: &str) -> bool {
        match self {
            ChunkFilter::All => true,
            ChunkFilter::DocId(wanted) => wanted == doc_id,
        }
    }
}

#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Insert or replace a batch of records atomically.
    async fn upsert(&self, records: &[ChunkRecord]) -> Result<(), StoreError>;

    /// Nearest neighbours of `vector`, closest first.
    async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<QueryHit>, StoreError>;

    /// Scan stored chunks matching `filter`.
    async fn get(&self, filter: &ChunkFilter) -> Result<Vec<StoredChunk>, StoreError>;

    /// Delete records by id. Returns how many existed.
    async fn delete(&self, ids: &[String]) -> Result<usize, StoreError>;

    /// Delete every record matching `filter`, returning their ids.
    async fn delete_where(&self, filter: &ChunkFilter) -> Result<Vec<String>, StoreError>;

    /// Number of stored chunks.
    async fn count(&self) -> Result<usize, StoreError>;
}

/// Check that every record in a batch shares one non-zero dimensionality,
/// and that it matches `existing` when the store already holds vectors.
pub fn validate_batch(records: &[ChunkRecord], existing: Option<usize>) -> Result<(), StoreError> {
    let Some(first) = records.first() else {
        return Ok(());
    };
    let expected = existing.unwrap_or(first.embedding.len());
    if expected == 0 {
        return Err(StoreError::Backend(format!(
            "record {} has an empty embedding",
            first.id
        )));
    }
    for record in records {
        if record.embedding.len() != expected {
            return Err(StoreError::DimensionMismatch {
                expected,
                actual: record.embedding.len(),
            });
        }
    }
    Ok(())
}
