//! Ingestion pipeline orchestration.
//!
//! One upload moves through a fixed sequence of states:
//!
//! ```text
//! Received → Saved → Extracted → Chunked → Embedded → Stored → Committed
//!     └──────────┴────────┴──────────┴─────────┴─────────┴──→ Failed
//! ```
//!
//! Each step needs the previous step's output, so they run strictly in
//! order. Any failure after the file is written triggers cleanup: the
//! upload file is removed and, if the store step was reached, every record
//! for the `doc_id` is deleted again. Cleanup never raises, only logs. The
//! caller sees one [`IngestError`] naming the stage that failed.
//!
//! Format and filename validation happen before a `doc_id` is even
//! generated, so a rejected upload never touches the disk, the embedding
//! provider, or the store.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use docqa_core::chunk::{chunk_document, ChunkParams};
use docqa_core::embedding::{EmbedMode, EmbeddingClient};
use docqa_core::error::{EmbedError, ExtractError, StoreError};
use docqa_core::models::{ChunkMetadata, ChunkRecord};
use docqa_core::store::{ChunkFilter, VectorStore};

use crate::config::Config;
use crate::extract::{extract_text_blocking, FileKind};
use crate::services::Services;

/// Position of an upload in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IngestState {
    Received,
    Saved,
    Extracted,
    Chunked,
    Embedded,
    Stored,
    Committed,
    Failed,
}

impl IngestState {
    /// The work performed to leave this state, phrased for error messages.
    pub fn next_action(&self) -> &'static str {
        match self {
            IngestState::Received => "saving the file",
            IngestState::Saved => "extracting text",
            IngestState::Extracted => "chunking text",
            IngestState::Chunked => "generating embeddings",
            IngestState::Embedded => "storing chunks",
            IngestState::Stored => "committing",
            IngestState::Committed | IngestState::Failed => "finishing",
        }
    }
}

/// Why a pipeline step failed.
#[derive(Error, Debug)]
pub enum IngestFailure {
    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Extraction(ExtractError),

    #[error("document contains no extractable text")]
    EmptyDocument,

    #[error("{0}")]
    Embedding(#[from] EmbedError),

    #[error("{0}")]
    Store(#[from] StoreError),
}

#[derive(Error, Debug)]
pub enum IngestError {
    /// Rejected before any processing began.
    #[error("unsupported file type: {0}. Allowed: txt, md, pdf")]
    UnsupportedFormat(String),

    /// Rejected before any processing began.
    #[error("invalid filename: {0:?}")]
    InvalidFilename(String),

    /// A pipeline step failed. `state` is the last state reached.
    #[error("Upload failed while {}: {}", .state.next_action(), .failure)]
    Failed {
        state: IngestState,
        failure: IngestFailure,
    },
}

impl IngestError {
    /// True for errors caused by the request rather than the pipeline.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            IngestError::UnsupportedFormat(_) | IngestError::InvalidFilename(_)
        )
    }
}

/// Result of a committed upload.
#[derive(Debug, Clone, Serialize)]
pub struct IngestReceipt {
    pub doc_id: String,
    pub filename: String,
    pub chunk_count: usize,
    pub status: IngestState,
}

/// Reduce a client-supplied name to a bare file name.
///
/// Directory components (either separator style) are dropped. Empty names,
/// `.`/`..`, and names with control characters are rejected.
pub fn sanitize_filename(raw: &str) -> Result<String, IngestError> {
    let base = raw.rsplit(['/', '\\']).next().unwrap_or("").trim();
    if base.is_empty() || base == "." || base == ".." || base.chars().any(char::is_control) {
        return Err(IngestError::InvalidFilename(raw.to_string()));
    }
    Ok(base.to_string())
}

/// Uploaded bytes → committed, queryable chunk records.
#[derive(Clone)]
pub struct IngestionPipeline {
    upload_dir: PathBuf,
    chunking: ChunkParams,
    embedder: EmbeddingClient,
    store: Arc<dyn VectorStore>,
}

impl IngestionPipeline {
    pub fn new(
        upload_dir: impl Into<PathBuf>,
        chunking: ChunkParams,
        embedder: EmbeddingClient,
        store: Arc<dyn VectorStore>,
    ) -> Self {
        Self {
            upload_dir: upload_dir.into(),
            chunking,
            embedder,
            store,
        }
    }

    /// Where the upload for `doc_id` is kept: `{upload_dir}/{doc_id}_{filename}`.
    pub fn upload_path(&self, doc_id: &str, filename: &str) -> PathBuf {
        self.upload_dir.join(format!("{}_{}", doc_id, filename))
    }

    /// Run one upload through the pipeline.
    ///
    /// On success the whole chunk set is in the store and the file is on
    /// disk. On failure neither is.
    pub async fn ingest(&self, filename: &str, bytes: &[u8]) -> Result<IngestReceipt, IngestError> {
        let filename = sanitize_filename(filename)?;
        let kind = FileKind::from_filename(&filename).map_err(|e| match e {
            ExtractError::UnsupportedFormat(ext) => IngestError::UnsupportedFormat(ext),
            ExtractError::Extraction(msg) => IngestError::InvalidFilename(msg),
        })?;

        let doc_id = Uuid::new_v4().to_string();
        let path = self.upload_path(&doc_id, &filename);
        let mut state = IngestState::Received;
        debug!(%doc_id, %filename, ?kind, "upload received");

        match self
            .run(&doc_id, &filename, kind, bytes, &path, &mut state)
            .await
        {
            Ok(chunk_count) => {
                info!(%doc_id, %filename, chunk_count, "document committed");
                Ok(IngestReceipt {
                    doc_id,
                    filename,
                    chunk_count,
                    status: IngestState::Committed,
                })
            }
            Err(failure) => {
                warn!(%doc_id, %filename, stage = state.next_action(), error = %failure, "ingestion failed");
                let store_touched = matches!(failure, IngestFailure::Store(_));
                self.cleanup(&doc_id, &path, store_touched).await;
                Err(IngestError::Failed { state, failure })
            }
        }
    }

    async fn run(
        &self,
        doc_id: &str,
        filename: &str,
        kind: FileKind,
        bytes: &[u8],
        path: &Path,
        state: &mut IngestState,
    ) -> Result<usize, IngestFailure> {
        tokio::fs::create_dir_all(&self.upload_dir).await?;
        tokio::fs::write(path, bytes).await?;
        advance(state, IngestState::Saved, doc_id);

        let text = extract_text_blocking(bytes.to_vec(), kind)
            .await
            .map_err(IngestFailure::Extraction)?;
        if text.trim().is_empty() {
            return Err(IngestFailure::EmptyDocument);
        }
        advance(state, IngestState::Extracted, doc_id);

        let chunks = chunk_document(doc_id, &text, self.chunking);
        if chunks.is_empty() {
            return Err(IngestFailure::EmptyDocument);
        }
        advance(state, IngestState::Chunked, doc_id);

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = self.embedder.embed_many(&texts, EmbedMode::Document).await?;
        advance(state, IngestState::Embedded, doc_id);

        let upload_date = Utc::now();
        let records: Vec<ChunkRecord> = chunks
            .into_iter()
            .zip(vectors)
            .map(|(chunk, embedding)| ChunkRecord {
                id: chunk.id,
                embedding,
                text: chunk.text,
                hash: chunk.hash,
                metadata: ChunkMetadata {
                    doc_id: doc_id.to_string(),
                    filename: filename.to_string(),
                    chunk_index: chunk.chunk_index,
                    upload_date,
                },
            })
            .collect();
        let count = records.len();
        self.store.upsert(&records).await?;
        advance(state, IngestState::Stored, doc_id);

        Ok(count)
    }

    /// Best-effort removal of everything a failed upload left behind.
    async fn cleanup(&self, doc_id: &str, path: &Path, store_touched: bool) {
        match tokio::fs::remove_file(path).await {
            Ok(()) => debug!(path = %path.display(), "removed upload file"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %path.display(), error = %e, "failed to remove upload file"),
        }

        if store_touched {
            match self.store.delete_where(&ChunkFilter::doc_id(doc_id)).await {
                Ok(ids) if !ids.is_empty() => {
                    warn!(doc_id, removed = ids.len(), "rolled back partially stored chunks")
                }
                Ok(_) => {}
                Err(e) => warn!(doc_id, error = %e, "failed to roll back stored chunks"),
            }
        }
    }
}

fn advance(state: &mut IngestState, next: IngestState, doc_id: &str) {
    debug!(doc_id, from = ?state, to = ?next, "ingest state");
    *state = next;
}

/// `docqa upload <file>`
pub async fn run_upload(config: &Config, file: &Path) -> Result<()> {
    let bytes = std::fs::read(file)
        .with_context(|| format!("Failed to read file: {}", file.display()))?;
    let filename = file
        .file_name()
        .and_then(|n| n.to_str())
        .with_context(|| format!("Invalid file name: {}", file.display()))?;

    let services = Services::from_config(config).await?;
    let receipt = services.pipeline.ingest(filename, &bytes).await?;

    println!("upload {}", receipt.filename);
    println!("  doc_id: {}", receipt.doc_id);
    println!("  chunks: {}", receipt.chunk_count);
    println!("ok");

    services.close().await;
    Ok(())
}
