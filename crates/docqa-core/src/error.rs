//! Error taxonomy for docqa-core.
//!
//! Each pipeline stage has its own error type so callers can tell an
//! extraction problem from a provider outage without string matching.
//! Ingestion wraps these in `IngestError` in the application crate.

use thiserror::Error;

/// Text extraction errors.
#[derive(Error, Debug)]
pub enum ExtractError {
    /// Extension outside `{txt, md, pdf}`. Raised before any processing.
    #[error("unsupported file type: {0}. Allowed: txt, md, pdf")]
    UnsupportedFormat(String),

    /// The byte stream could not be decoded or parsed at all.
    #[error("could not extract text: {0}")]
    Extraction(String),
}

/// Embedding provider errors. A failed call never yields partial output.
#[derive(Error, Debug)]
pub enum EmbedError {
    #[error("embedding provider is disabled")]
    Disabled,

    /// Transport, authentication, quota, or server-side failure.
    #[error("embedding service error: {0}")]
    Service(String),

    /// The provider answered but the payload does not line up with the request.
    #[error("invalid embedding response: {0}")]
    InvalidResponse(String),
}

/// Vector store errors.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("vector store error: {0}")]
    Backend(String),

    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// A stored row could not be decoded.
    #[error("corrupt record {id}: {reason}")]
    Corrupt { id: String, reason: String },
}

/// Retrieval errors. Retrieval is all-or-nothing per call.
#[derive(Error, Debug)]
pub enum RetrievalError {
    #[error("retrieval failed while embedding the question: {0}")]
    Embedding(#[from] EmbedError),

    #[error("retrieval failed while querying the index: {0}")]
    Store(#[from] StoreError),
}

/// Language-model errors.
#[derive(Error, Debug)]
pub enum GenerateError {
    #[error("language model is disabled")]
    Disabled,

    #[error("language model error: {0}")]
    Service(String),
}

/// Errors from the full question-answering flow.
#[derive(Error, Debug)]
pub enum AskError {
    #[error("question cannot be empty")]
    EmptyQuestion,

    #[error(transparent)]
    Retrieval(#[from] RetrievalError),

    #[error("error generating answer: {0}")]
    Generation(#[from] GenerateError),
}
