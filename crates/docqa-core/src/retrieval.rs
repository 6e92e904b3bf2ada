//! Question → ranked passages.
//!
//! 1. Embed the question in [`EmbedMode::Query`].
//! 2. Ask the store for the `top_k` nearest chunks.
//! 3. Map each hit to a [`Source`] with `relevance_score = 1 - distance`.
//!
//! An empty index is not an error: it yields an empty list. Any embedding or
//! store failure fails the whole call.

use std::sync::Arc;

use tracing::debug;

use crate::embedding::{EmbedMode, EmbeddingClient};
use crate::error::RetrievalError;
use crate::models::{QueryHit, Source};
use crate::store::VectorStore;

/// Convert a cosine distance into a relevance score in `[0, 1]`.
///
/// Monotonic (non-increasing) in `distance`, so ordering by score never
/// contradicts ordering by distance.
pub fn score_from_distance(distance: f32) -> f64 {
    (1.0 - f64::from(distance)).clamp(0.0, 1.0)
}

fn to_source(hit: QueryHit) -> Source {
    Source {
        document: hit.metadata.filename,
        chunk_text: hit.text,
        relevance_score: score_from_distance(hit.distance),
    }
}

#[derive(Clone)]
pub struct Retriever {
    embedder: EmbeddingClient,
    store: Arc<dyn VectorStore>,
}

impl Retriever {
    pub fn new(embedder: EmbeddingClient, store: Arc<dyn VectorStore>) -> Self {
        Self { embedder, store }
    }

    /// Retrieve up to `top_k` passages, most relevant first.
    pub async fn retrieve(&self, question: &str, top_k: usize) -> Result<Vec<Source>, RetrievalError> {
        if top_k == 0 {
            return Ok(Vec::new());
        }

        let vector = self.embedder.embed_one(question, EmbedMode::Query).await?;
        let hits = self.store.query(&vector, top_k).await?;
        if hits.is_empty() {
            debug!("no chunks in index");
            return Ok(Vec::new());
        }

        let mut sources: Vec<Source> = hits.into_iter().map(to_source).collect();
        sources.sort_by(|a, b| {
            b.relevance_score
                .partial_cmp(&a.relevance_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        debug!(count = sources.len(), "retrieved passages");
        Ok(sources)
    }
}
