//! HTTP API.
//!
//! A thin JSON mapping over [`Services`]; all behavior lives in the
//! pipelines.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/` | Service banner |
//! | `GET`  | `/api` | Endpoint index |
//! | `POST` | `/api/documents/upload` | Multipart upload (field `file`) |
//! | `GET`  | `/api/documents` | Document catalog |
//! | `DELETE` | `/api/documents/{doc_id}` | Delete a document and its file |
//! | `POST` | `/api/chat/ask` | `{"question": "..."}` → answer with sources |
//! | `GET`  | `/api/health` | Database and provider health |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "question cannot be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `unsupported_format` (400),
//! `embeddings_disabled` (400), `not_found` (404), `ingestion_failed` (500),
//! `retrieval_failed` (500), `generation_failed` (500), `internal` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so a browser frontend on
//! another port can call the API.

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use docqa_core::answer::Answer;
use docqa_core::catalog::DeleteOutcome;
use docqa_core::error::{AskError, EmbedError, RetrievalError, StoreError};
use docqa_core::models::DocumentSummary;

use crate::config::Config;
use crate::ingest::{IngestError, IngestReceipt};
use crate::services::Services;

/// Largest accepted request body (uploads included).
const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

/// Starts the HTTP server on `[server].bind` and runs until terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let services = Services::from_config(config).await?;
    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    info!(addr = %listener.local_addr()?, "listening");
    println!("docqa listening on http://{}", listener.local_addr()?);
    serve(listener, services).await
}

/// Serve the API on an already-bound listener.
pub async fn serve(listener: tokio::net::TcpListener, services: Services) -> anyhow::Result<()> {
    axum::serve(listener, router(services)).await?;
    Ok(())
}

pub fn router(services: Services) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(handle_root))
        .route("/api", get(handle_index))
        .route("/api/documents/upload", post(handle_upload))
        .route("/api/documents", get(handle_list))
        .route("/api/documents/", get(handle_list))
        .route("/api/documents/{doc_id}", delete(handle_delete))
        .route("/api/chat/ask", post(handle_ask))
        .route("/api/health", get(handle_health))
        .route("/api/health/", get(handle_health))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(services)
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    /// Machine-readable error code (e.g., `"bad_request"`, `"not_found"`).
    code: String,
    message: String,
}

/// Internal error type that converts into an Axum HTTP response.
#[derive(Debug)]
struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl AppError {
    fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError::new(StatusCode::BAD_REQUEST, "bad_request", message)
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        AppError::new(StatusCode::INTERNAL_SERVER_ERROR, "internal", e.to_string())
    }
}

impl From<IngestError> for AppError {
    fn from(e: IngestError) -> Self {
        match e {
            IngestError::UnsupportedFormat(_) => {
                AppError::new(StatusCode::BAD_REQUEST, "unsupported_format", e.to_string())
            }
            IngestError::InvalidFilename(_) => bad_request(e.to_string()),
            IngestError::Failed { .. } => AppError::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "ingestion_failed",
                e.to_string(),
            ),
        }
    }
}

impl From<AskError> for AppError {
    fn from(e: AskError) -> Self {
        match &e {
            AskError::EmptyQuestion => bad_request(e.to_string()),
            AskError::Retrieval(RetrievalError::Embedding(EmbedError::Disabled)) => {
                AppError::new(StatusCode::BAD_REQUEST, "embeddings_disabled", e.to_string())
            }
            AskError::Retrieval(_) => AppError::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "retrieval_failed",
                e.to_string(),
            ),
            AskError::Generation(_) => AppError::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "generation_failed",
                e.to_string(),
            ),
        }
    }
}

// ============ GET / and /api ============

async fn handle_root() -> Json<serde_json::Value> {
    Json(json!({
        "message": "docqa document Q&A API",
        "version": env!("CARGO_PKG_VERSION"),
        "docs": "/api",
    }))
}

async fn handle_index() -> Json<serde_json::Value> {
    Json(json!({
        "endpoints": {
            "upload": "POST /api/documents/upload",
            "documents": "GET /api/documents",
            "delete": "DELETE /api/documents/{doc_id}",
            "ask": "POST /api/chat/ask",
            "health": "GET /api/health",
        }
    }))
}

// ============ Documents ============

#[derive(Serialize)]
struct UploadResponse {
    message: &'static str,
    #[serde(flatten)]
    receipt: IngestReceipt,
}

async fn handle_upload(
    State(services): State<Services>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_request(format!("invalid multipart body: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field
            .file_name()
            .map(str::to_string)
            .ok_or_else(|| bad_request("file field has no filename"))?;
        let bytes = field
            .bytes()
            .await
            .map_err(|e| bad_request(format!("failed to read upload: {}", e)))?;

        let receipt = services.pipeline.ingest(&filename, &bytes).await?;
        return Ok(Json(UploadResponse {
            message: "Document uploaded successfully",
            receipt,
        }));
    }

    Err(bad_request("multipart field 'file' is required"))
}

async fn handle_list(
    State(services): State<Services>,
) -> Result<Json<Vec<DocumentSummary>>, AppError> {
    Ok(Json(services.catalog.list().await?))
}

async fn handle_delete(
    State(services): State<Services>,
    Path(doc_id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    match services.catalog.delete_document(&doc_id).await? {
        DeleteOutcome::Deleted { chunks_removed } => Ok(Json(json!({
            "message": "Document deleted successfully",
            "doc_id": doc_id,
            "chunks_removed": chunks_removed,
        }))),
        DeleteOutcome::NotFound => Err(AppError::new(
            StatusCode::NOT_FOUND,
            "not_found",
            format!("document not found: {}", doc_id),
        )),
    }
}

// ============ POST /api/chat/ask ============

#[derive(Deserialize)]
struct AskRequest {
    #[serde(default)]
    question: String,
}

async fn handle_ask(
    State(services): State<Services>,
    Json(req): Json<AskRequest>,
) -> Result<Json<Answer>, AppError> {
    Ok(Json(services.assistant.ask(&req.question).await?))
}

// ============ GET /api/health ============

async fn handle_health(
    State(services): State<Services>,
) -> Result<Json<crate::health::HealthReport>, AppError> {
    Ok(Json(services.health().await?))
}
