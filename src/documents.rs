//! Document catalog: listing and whole-document deletion.
//!
//! The index is the source of truth. Deleting a document removes its chunk
//! records first; the upload file is removed afterwards by `{doc_id}_`
//! prefix match. A failed file removal is logged and the document still
//! counts as deleted.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, warn};
use walkdir::WalkDir;

use docqa_core::catalog::{delete_document_chunks, list_documents, DeleteOutcome};
use docqa_core::error::StoreError;
use docqa_core::models::DocumentSummary;
use docqa_core::store::VectorStore;

use crate::config::Config;
use crate::services::Services;

#[derive(Clone)]
pub struct DocumentCatalog {
    store: Arc<dyn VectorStore>,
    upload_dir: PathBuf,
}

impl DocumentCatalog {
    pub fn new(store: Arc<dyn VectorStore>, upload_dir: impl Into<PathBuf>) -> Self {
        Self {
            store,
            upload_dir: upload_dir.into(),
        }
    }

    /// One summary per stored document, newest first.
    pub async fn list(&self) -> Result<Vec<DocumentSummary>, StoreError> {
        list_documents(self.store.as_ref()).await
    }

    /// Delete every chunk of `doc_id`, then its upload file.
    pub async fn delete_document(&self, doc_id: &str) -> Result<DeleteOutcome, StoreError> {
        let outcome = delete_document_chunks(self.store.as_ref(), doc_id).await?;
        if outcome.is_deleted() {
            remove_upload_files_in_background(self.upload_dir.clone(), doc_id.to_string()).await;
        }
        Ok(outcome)
    }
}

/// [`remove_upload_files`] on the blocking thread pool. Never fails.
async fn remove_upload_files_in_background(upload_dir: PathBuf, doc_id: String) {
    let result = tokio::task::spawn_blocking(move || remove_upload_files(&upload_dir, &doc_id)).await;
    if let Err(e) = result {
        warn!(error = %e, "upload file cleanup task failed");
    }
}

/// Remove files in `upload_dir` named `{doc_id}_*`. Never fails.
fn remove_upload_files(upload_dir: &Path, doc_id: &str) {
    if doc_id.is_empty() {
        return;
    }
    let prefix = format!("{}_", doc_id);

    for entry in WalkDir::new(upload_dir).min_depth(1).max_depth(1) {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                warn!(dir = %upload_dir.display(), error = %e, "failed to scan upload directory");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let matches = entry
            .file_name()
            .to_str()
            .is_some_and(|name| name.starts_with(&prefix));
        if !matches {
            continue;
        }
        match std::fs::remove_file(entry.path()) {
            Ok(()) => debug!(path = %entry.path().display(), "removed upload file"),
            Err(e) => warn!(path = %entry.path().display(), error = %e, "failed to remove upload file"),
        }
    }
}

/// `docqa documents`
pub async fn run_list(config: &Config) -> Result<()> {
    let services = Services::from_config(config).await?;
    let documents = services.catalog.list().await?;

    if documents.is_empty() {
        println!("No documents.");
    } else {
        for doc in &documents {
            println!(
                "{}  {}  chunks={}  uploaded={}",
                doc.doc_id,
                doc.filename,
                doc.chunk_count,
                doc.upload_date.format("%Y-%m-%dT%H:%M:%SZ")
            );
        }
    }

    services.close().await;
    Ok(())
}

/// `docqa delete <doc_id>`
pub async fn run_delete(config: &Config, doc_id: &str) -> Result<()> {
    let services = Services::from_config(config).await?;
    let outcome = services.catalog.delete_document(doc_id).await?;
    services.close().await;

    match outcome {
        DeleteOutcome::Deleted { chunks_removed } => {
            println!("deleted {}", doc_id);
            println!("  chunks removed: {}", chunks_removed);
            println!("ok");
            Ok(())
        }
        DeleteOutcome::NotFound => anyhow::bail!("Document not found: {}", doc_id),
    }
}
