//! Document catalog derived from stored chunk metadata.
//!
//! There is no document table. Listing scans every chunk and groups by
//! `doc_id`; deleting removes every chunk carrying that `doc_id`.

use std::collections::HashMap;

use tracing::info;

use crate::error::StoreError;
use crate::models::{DocumentSummary, StoredChunk};
use crate::store::{ChunkFilter, VectorStore};

/// Result of a delete request. Not-found is an expected outcome, not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted { chunks_removed: usize },
    NotFound,
}

impl DeleteOutcome {
    pub fn is_deleted(&self) -> bool {
        matches!(self, DeleteOutcome::Deleted { .. })
    }
}

/// Group chunks into one summary per document.
///
/// Input order does not matter. `upload_date` is the minimum across the
/// document's chunks and `filename` comes from its lowest-index chunk.
/// Output is sorted newest first, then by `doc_id`.
pub fn summarize_documents(chunks: &[StoredChunk]) -> Vec<DocumentSummary> {
    let mut grouped: HashMap<&str, (DocumentSummary, usize)> = HashMap::new();

    for chunk in chunks {
        let meta = &chunk.metadata;
        let (summary, lowest_index) = grouped.entry(meta.doc_id.as_str()).or_insert_with(|| {
            (
                DocumentSummary {
                    doc_id: meta.doc_id.clone(),
                    filename: meta.filename.clone(),
                    upload_date: meta.upload_date,
                    chunk_count: 0,
                },
                meta.chunk_index,
            )
        });
        summary.chunk_count += 1;
        if meta.upload_date < summary.upload_date {
            summary.upload_date = meta.upload_date;
        }
        if meta.chunk_index < *lowest_index {
            *lowest_index = meta.chunk_index;
            summary.filename = meta.filename.clone();
        }
    }

    let mut summaries: Vec<DocumentSummary> = grouped.into_values().map(|(s, _)| s).collect();
    summaries.sort_by(|a, b| {
        b.upload_date
            .cmp(&a.upload_date)
            .then_with(|| a.doc_id.cmp(&b.doc_id))
    });
    summaries
}

/// List every document in the store.
pub async fn list_documents(store: &dyn VectorStore) -> Result<Vec<DocumentSummary>, StoreError> {
    let chunks = store.get(&ChunkFilter::All).await?;
    Ok(summarize_documents(&chunks))
}

/// Remove every chunk of `doc_id` from the index.
///
/// Looks the chunk ids up first and reports [`DeleteOutcome::NotFound`]
/// without touching the store when there are none.
pub async fn delete_document_chunks(
    store: &dyn VectorStore,
    doc_id: &str,
) -> Result<DeleteOutcome, StoreError> {
    let ids: Vec<String> = store
        .get(&ChunkFilter::doc_id(doc_id))
        .await?
        .into_iter()
        .map(|c| c.id)
        .collect();
    if ids.is_empty() {
        return Ok(DeleteOutcome::NotFound);
    }

    let removed = store.delete(&ids).await?;
    info!(doc_id, chunks = removed, "deleted document chunks");
    Ok(DeleteOutcome::Deleted {
        chunks_removed: removed,
    })
}
