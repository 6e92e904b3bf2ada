//! SQLite-backed [`VectorStore`] implementation.
//!
//! Every chunk is one row of the `chunks` table with its embedding stored as
//! a little-endian `f32` BLOB. Nearest-neighbour queries are brute force:
//! all vectors are loaded and ranked by cosine distance in process, which is
//! fine for the single-user document collections this service targets.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use docqa_core::embedding::{blob_to_vec, cosine_distance, vec_to_blob};
use docqa_core::error::StoreError;
use docqa_core::models::{ChunkMetadata, ChunkRecord, QueryHit, StoredChunk};
use docqa_core::store::{validate_batch, ChunkFilter, VectorStore};

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn stored_dims(&self) -> Result<Option<usize>, StoreError> {
        let dims: Option<i64> = sqlx::query_scalar("SELECT dims FROM chunks LIMIT 1")
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;
        Ok(dims.map(|d| d as usize))
    }
}

fn backend(e: sqlx::Error) -> StoreError {
    StoreError::Backend(e.to_string())
}

fn parse_date(id: &str, raw: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt {
            id: id.to_string(),
            reason: format!("bad upload_date '{}': {}", raw, e),
        })
}

fn metadata_from_row(row: &SqliteRow) -> Result<(String, ChunkMetadata), StoreError> {
    let id: String = row.get("id");
    let upload_date: String = row.get("upload_date");
    let chunk_index: i64 = row.get("chunk_index");
    let metadata = ChunkMetadata {
        doc_id: row.get("doc_id"),
        filename: row.get("filename"),
        chunk_index: chunk_index as usize,
        upload_date: parse_date(&id, &upload_date)?,
    };
    Ok((id, metadata))
}

#[async_trait]
impl VectorStore for SqliteStore {
    async fn upsert(&self, records: &[ChunkRecord]) -> Result<(), StoreError> {
        if records.is_empty() {
            return Ok(());
        }
        validate_batch(records, self.stored_dims().await?)?;

        // Single transaction: either every record lands or none does.
        let mut tx = self.pool.begin().await.map_err(backend)?;
        for record in records {
            let meta = &record.metadata;
            sqlx::query(
                r#"
                INSERT INTO chunks (id, doc_id, filename, chunk_index, upload_date,
                                    text, hash, embedding, dims)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(id) DO UPDATE SET
                    doc_id = excluded.doc_id,
                    filename = excluded.filename,
                    chunk_index = excluded.chunk_index,
                    upload_date = excluded.upload_date,
                    text = excluded.text,
                    hash = excluded.hash,
                    embedding = excluded.embedding,
                    dims = excluded.dims
                "#,
            )
            .bind(&record.id)
            .bind(&meta.doc_id)
            .bind(&meta.filename)
            .bind(meta.chunk_index as i64)
            .bind(meta.upload_date.to_rfc3339())
            .bind(&record.text)
            .bind(&record.hash)
            .bind(vec_to_blob(&record.embedding))
            .bind(record.embedding.len() as i64)
            .execute(&mut *tx)
            .await
            .map_err(backend)?;
        }
        tx.commit().await.map_err(backend)?;
        Ok(())
    }

    async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<QueryHit>, StoreError> {
        if k == 0 {
            return Ok(Vec::new());
        }

        let rows = sqlx::query(
            "SELECT id, doc_id, filename, chunk_index, upload_date, text, embedding, dims FROM chunks",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        let mut hits = Vec::with_capacity(rows.len());
        for row in &rows {
            let (id, metadata) = metadata_from_row(row)?;
            let dims: i64 = row.get("dims");
            if dims as usize != vector.len() {
                return Err(StoreError::DimensionMismatch {
                    expected: dims as usize,
                    actual: vector.len(),
                });
            }
            let blob: Vec<u8> = row.get("embedding");
            let stored = blob_to_vec(&blob);
            if stored.len() != dims as usize {
                return Err(StoreError::Corrupt {
                    id,
                    reason: format!("embedding has {} values, expected {}", stored.len(), dims),
                });
            }
            hits.push(QueryHit {
                distance: cosine_distance(vector, &stored),
                text: row.get("text"),
                id,
                metadata,
            });
        }

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
        let rows = match filter {
            ChunkFilter::All => {
                sqlx::query("SELECT id, doc_id, filename, chunk_index, upload_date, text FROM chunks")
                    .fetch_all(&self.pool)
                    .await
            }
            ChunkFilter::DocId(doc_id) => {
                sqlx::query(
                    "SELECT id, doc_id, filename, chunk_index, upload_date, text FROM chunks WHERE doc_id = ?",
                )
                .bind(doc_id)
                .fetch_all(&self.pool)
                .await
            }
        }
        .map_err(backend)?;

        rows.iter()
            .map(|row| {
                let (id, metadata) = metadata_from_row(row)?;
                Ok(StoredChunk {
                    id,
                    text: row.get("text"),
                    metadata,
                })
            })
            .collect()
    }

    async fn delete(&self, ids: &[String]) -> Result<usize, StoreError> {
        if ids.is_empty() {
            return Ok(0);
        }
        let mut tx = self.pool.begin().await.map_err(backend)?;
        let mut removed = 0u64;
        for id in ids {
            let result = sqlx::query("DELETE FROM chunks WHERE id = ?")
                .bind(id)
                .execute(&mut *tx)
                .await
                .map_err(backend)?;
            removed += result.rows_affected();
        }
        tx.commit().await.map_err(backend)?;
        Ok(removed as usize)
    }

    async fn delete_where(&self, filter: &ChunkFilter) -> Result<Vec<String>, StoreError> {
        let mut tx = self.pool.begin().await.map_err(backend)?;
        let ids: Vec<String> = match filter {
            ChunkFilter::All => {
                let ids = sqlx::query_scalar::<_, String>("SELECT id FROM chunks")
                    .fetch_all(&mut *tx)
                    .await
                    .map_err(backend)?;
                sqlx::query("DELETE FROM chunks")
                    .execute(&mut *tx)
                    .await
                    .map_err(backend)?;
                ids
            }
            ChunkFilter::DocId(doc_id) => {
                let ids = sqlx::query_scalar::<_, String>("SELECT id FROM chunks WHERE doc_id = ?")
                    .bind(doc_id)
                    .fetch_all(&mut *tx)
                    .await
                    .map_err(backend)?;
                sqlx::query("DELETE FROM chunks WHERE doc_id = ?")
                    .bind(doc_id)
                    .execute(&mut *tx)
                    .await
                    .map_err(backend)?;
                ids
            }
        };
        tx.commit().await.map_err(backend)?;
        Ok(ids)
    }

    async fn count(&self) -> Result<usize, StoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chunks")
            .fetch_one(&self.pool)
            .await
            .map_err(backend)?;
        Ok(count as usize)
    }
}
