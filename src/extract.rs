//! Text extraction for uploaded documents.
//!
//! Uploads are accepted by extension only: `txt`, `md`, and `pdf`. Anything
//! else is rejected by [`FileKind::from_filename`] before a single byte is
//! processed. Extraction itself is synchronous and CPU-bound; async callers
//! go through [`extract_text_blocking`].

use std::path::Path;

use docqa_core::error::ExtractError;
use tracing::debug;

/// The document formats the service accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Txt,
    Md,
    Pdf,
}

impl FileKind {
    /// Resolve a lowercase extension (without the dot).
    pub fn from_extension(ext: &str) -> Result<Self, ExtractError> {
        match ext.to_ascii_lowercase().as_str() {
            "txt" => Ok(FileKind::Txt),
            "md" => Ok(FileKind::Md),
            "pdf" => Ok(FileKind::Pdf),
            other => Err(ExtractError::UnsupportedFormat(if other.is_empty() {
                "(none)".to_string()
            } else {
                other.to_string()
            })),
        }
    }

    /// Resolve the kind from an uploaded file's name.
    pub fn from_filename(filename: &str) -> Result<Self, ExtractError> {
        let ext = Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("");
        Self::from_extension(ext)
    }

    pub fn extension(&self) -> &'static str {
        match self {
            FileKind::Txt => "txt",
            FileKind::Md => "md",
            FileKind::Pdf => "pdf",
        }
    }
}

/// Convert raw bytes of the given kind to plain text.
///
/// `txt` and `md` are decoded as UTF-8 verbatim. PDFs are extracted page by
/// page and joined in page order with a blank line; a page without
/// extractable text contributes an empty string.
pub fn extract_text(bytes: &[u8], kind: FileKind) -> Result<String, ExtractError> {
    match kind {
        FileKind::Txt | FileKind::Md => String::from_utf8(bytes.to_vec())
            .map_err(|e| ExtractError::Extraction(format!("file is not valid UTF-8: {}", e))),
        FileKind::Pdf => extract_pdf(bytes),
    }
}

/// [`extract_text`] on the blocking thread pool.
pub async fn extract_text_blocking(bytes: Vec<u8>, kind: FileKind) -> Result<String, ExtractError> {
    tokio::task::spawn_blocking(move || extract_text(&bytes, kind))
        .await
        .map_err(|e| ExtractError::Extraction(format!("extraction task failed: {}", e)))?
}

fn extract_pdf(bytes: &[u8]) -> Result<String, ExtractError> {
    // pdf-extract panics on some malformed inputs instead of returning an error.
    let result = std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem_by_pages(bytes));
    let pages = match result {
        Ok(Ok(pages)) => pages,
        Ok(Err(e)) => return Err(ExtractError::Extraction(format!("PDF extraction failed: {}", e))),
        Err(_) => {
            return Err(ExtractError::Extraction(
                "PDF extraction failed: parser panicked".to_string(),
            ))
        }
    };
    debug!(pages = pages.len(), "extracted pdf");

    Ok(pages
        .iter()
        .map(|page| page.trim())
        .collect::<Vec<_>>()
        .join("\n\n"))
}
