//! In-memory [`VectorStore`] for tests and embedded use.
//!
//! Records live in a `HashMap` behind a `std::sync::RwLock`. Queries are
//! brute-force cosine distance over every stored vector.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use crate::embedding::cosine_distance;
use crate::error::StoreError;
use crate::models::{ChunkRecord, QueryHit, StoredChunk};

use super::{validate_batch, ChunkFilter, VectorStore};

pub struct InMemoryStore {
    records: RwLock<HashMap<String, ChunkRecord>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<String, ChunkRecord>>, StoreError> {
        self.records
            .read()
            .map_err(|_| StoreError::Backend("store lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<String, ChunkRecord>>, StoreError> {
        self.records
            .write()
            .map_err(|_| StoreError::Backend("store lock poisoned".to_string()))
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn to_stored(record: &ChunkRecord) -> StoredChunk {
    StoredChunk {
        id: record.id.clone(),
        text: record.text.clone(),
        metadata: record.metadata.clone(),
    }
}

#[async_trait]
impl VectorStore for InMemoryStore {
    async fn upsert(&self, records: &[ChunkRecord]) -> Result<(), StoreError> {
        let mut stored = self.write()?;
        let existing = stored.values().next().map(|r| r.embedding.len());
        validate_batch(records, existing)?;
        for record in records {
            stored.insert(record.id.clone(), record.clone());
        }
        Ok(())
    }

    async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<QueryHit>, StoreError> {
        let stored = self.read()?;
        let mut hits: Vec<QueryHit> = stored
            .values()
            .map(|r| QueryHit {
                id: r.id.clone(),
                text: r.text.clone(),
                metadata: r.metadata.clone(),
                distance: cosine_distance(vector, &r.embedding),
            })
            .collect();
        hits.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        hits.truncate(k);
        Ok(hits)
    }

    async fn get(&self, filter: &ChunkFilter) -> Result<Vec<StoredChunk>, StoreError> {
        let stored = self.read()?;
        Ok(stored
            .values()
            .filter(|r| filter.matches(&r.metadata.doc_id))
            .map(to_stored)
            .collect())
    }

    async fn delete(&self, ids: &[String]) -> Result<usize, StoreError> {
        let mut stored = self.write()?;
        Ok(ids.iter().filter(|id| stored.remove(*id).is_some()).count())
    }

    async fn delete_where(&self, filter: &ChunkFilter) -> Result<Vec<String>, StoreError> {
        let mut stored = self.write()?;
        let ids: Vec<String> = stored
            .values()
            .filter(|r| filter.matches(&r.metadata.doc_id))
            .map(|r| r.id.clone())
            .collect();
        for id in &ids {
            stored.remove(id);
        }
        Ok(ids)
    }

    async fn count(&self) -> Result<usize, StoreError> {
        Ok(self.read()?.len())
    }
}
