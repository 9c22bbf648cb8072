//! HTTP server exposing the document QA pipeline.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/api/upload` | Multipart upload; extracts, chunks, embeds and indexes one document |
//! | `POST` | `/api/query` | Answer a question grounded in the indexed documents |
//! | `GET`  | `/api/documents` | List the distinct filenames in the index |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! Every error response carries the same JSON envelope:
//!
//! ```json
//! { "success": false, "message": "Query cannot be empty." }
//! ```
//!
//! Statuses are derived from the pipeline error kind: invalid input → 400
//! with its own message, store unavailable → 503, embedding failure → 500.
//! Generation failures never fail a request; the composer replaces them
//! with a fallback answer and the query still returns 200.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so the browser frontend
//! can be served from anywhere.

use axum::{
    extract::multipart::{Field, MultipartRejection},
    extract::rejection::JsonRejection,
    extract::{DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use anyhow::Context;

use crate::answer::compose_answer;
use crate::config::Config;
use crate::embedding::{Embedder, LocalEmbedder};
use crate::error::PipelineError;
use crate::extract::DocumentFormat;
use crate::generate::{build_generator, Generator};
use crate::ingest::ingest_document;
use crate::retrieve::retrieve_context;
use crate::store::sqlite::SqliteVectorStore;
use crate::store::VectorStore;

/// Shared application state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
struct AppState {
    /// Application configuration (wrapped in `Arc` for cheap cloning across handlers).
    config: Arc<Config>,
    /// Vector index the documents live in.
    store: Arc<dyn VectorStore>,
    /// Embedding backend shared by ingestion and retrieval.
    embedder: Arc<dyn Embedder>,
    /// Answer generation backend.
    generator: Arc<dyn Generator>,
}

/// Starts the document QA HTTP server.
///
/// Opens the vector store, prepares the embedding and generation backends,
/// and binds to the address configured in `[server].bind`. The server runs
/// until the process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let store = SqliteVectorStore::open(&config.store.path, &config.store.collection).await?;
    let embedder = LocalEmbedder::new(&config.embedding)?;
    let generator = build_generator(&config.generation)?;

    std::fs::create_dir_all(&config.uploads.dir).with_context(|| {
        format!(
            "Failed to create upload directory: {}",
            config.uploads.dir.display()
        )
    })?;

    let bind_addr = config.server.bind.clone();
    let max_upload_bytes = config.uploads.max_upload_bytes;
    let state = AppState {
        config: Arc::new(config.clone()),
        store: Arc::new(store),
        embedder: Arc::new(embedder),
        generator,
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/api/upload", post(handle_upload))
        .route("/api/query", post(handle_query))
        .route("/api/documents", get(handle_documents))
        .route("/health", get(handle_health))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(cors)
        .with_state(state);

    println!("Document QA server listening on http://{}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

/// JSON envelope shared by error responses and the upload success response.
#[derive(Serialize)]
struct ApiMessage {
    success: bool,
    message: String,
}

/// Internal error type that converts into an Axum HTTP response.
struct AppError {
    status: StatusCode,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ApiMessage {
            success: false,
            message: self.message,
        };
        (self.status, Json(body)).into_response()
    }
}

/// Constructs a 400 Bad Request error.
fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        message: message.into(),
    }
}

/// Constructs the catch-all 500 error.
fn internal_error() -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        message: "An unexpected error occurred.".to_string(),
    }
}

/// Maps pipeline errors to HTTP responses by kind. Operational detail is
/// logged server-side; clients get the stable user-facing message.
impl From<PipelineError> for AppError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::InvalidInput(message) => AppError {
                status: StatusCode::BAD_REQUEST,
                message,
            },
            PipelineError::StoreUnavailable(detail) => {
                tracing::error!(detail = %detail, "document store unavailable");
                AppError {
                    status: StatusCode::SERVICE_UNAVAILABLE,
                    message: "Failed to connect to the document database.".to_string(),
                }
            }
            PipelineError::EmbeddingFailed(detail) => {
                tracing::error!(detail = %detail, "embedding failed");
                AppError {
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                    message: "Failed to generate document embeddings.".to_string(),
                }
            }
            PipelineError::GenerationFailed(detail) => {
                // The composer recovers generation failures; reaching this
                // arm means one escaped a layer that should have handled it.
                tracing::error!(detail = %detail, "unhandled generation error");
                internal_error()
            }
        }
    }
}

// ============ GET /health ============

/// JSON response body for `GET /health`.
#[derive(Serialize)]
struct HealthResponse {
    /// Always `"ok"` when the server is running.
    status: String,
    /// The crate version from `Cargo.toml`.
    version: String,
}

/// Handler for `GET /health`.
async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /api/upload ============

/// Handler for `POST /api/upload`.
///
/// Expects a multipart form with a `file` field. The upload is spooled to
/// a scoped temp file in the configured upload directory, run through the
/// ingestion pipeline, and the temp file is removed on every path when the
/// guard drops.
async fn handle_upload(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<ApiMessage>, AppError> {
    let mut multipart = multipart.map_err(|_| bad_request("No file provided."))?;

    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|_| bad_request("Could not read request data."))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let filename = field.file_name().unwrap_or_default().to_string();
        if filename.is_empty() {
            return Err(bad_request("No file selected."));
        }

        // Reject unsupported types before touching the disk
        DocumentFormat::from_filename(&filename)?;

        let temp = spool_to_temp(&state.config.uploads.dir, &filename, &mut field).await?;
        let outcome = ingest_document(
            state.store.as_ref(),
            state.embedder.as_ref(),
            &state.config.chunking,
            &filename,
            temp.path(),
        )
        .await?;

        tracing::info!(
            filename = %outcome.filename,
            chunks = outcome.chunks,
            "upload indexed"
        );
        return Ok(Json(ApiMessage {
            success: true,
            message: format!("File '{}' processed and stored successfully.", filename),
        }));
    }

    Err(bad_request("No file provided."))
}

/// Write the multipart field to a temp file carrying the original
/// extension. The file is deleted when the returned guard drops.
async fn spool_to_temp(
    dir: &std::path::Path,
    filename: &str,
    field: &mut Field<'_>,
) -> Result<tempfile::NamedTempFile, AppError> {
    let suffix = std::path::Path::new(filename)
        .extension()
        .map(|ext| format!(".{}", ext.to_string_lossy()))
        .unwrap_or_default();

    let mut temp = tempfile::Builder::new()
        .prefix("upload-")
        .suffix(&suffix)
        .tempfile_in(dir)
        .map_err(|e| {
            tracing::error!(error = %e, "failed to create upload temp file");
            internal_error()
        })?;

    while let Some(bytes) = field
        .chunk()
        .await
        .map_err(|_| bad_request("Could not read request data."))?
    {
        temp.write_all(&bytes).map_err(|e| {
            tracing::error!(error = %e, "failed to spool upload to disk");
            internal_error()
        })?;
    }

    Ok(temp)
}

// ============ POST /api/query ============

/// JSON request body for `POST /api/query`.
#[derive(Deserialize)]
struct QueryRequest {
    #[serde(default)]
    query: String,
    /// Optional allow-list restricting retrieval to these documents.
    #[serde(default)]
    document_names: Vec<String>,
}

/// JSON response body for `POST /api/query`.
#[derive(Serialize)]
struct QueryResponse {
    success: bool,
    /// The query as answered (trimmed).
    query: String,
    response: String,
}

/// Handler for `POST /api/query`.
///
/// Retrieves the most similar chunks (optionally scoped to
/// `document_names`) and composes a grounded answer. Once retrieval
/// succeeds the request returns 200 even when the answer is a fallback
/// sentinel.
async fn handle_query(
    State(state): State<AppState>,
    payload: Result<Json<QueryRequest>, JsonRejection>,
) -> Result<Json<QueryResponse>, AppError> {
    let Json(request) = payload.map_err(|rejection| {
        bad_request(match rejection {
            JsonRejection::BytesRejection(_) => "Could not read request data.",
            _ => "Invalid JSON format in request body.",
        })
    })?;

    let query = request.query.trim().to_string();
    let chunks = retrieve_context(
        state.store.as_ref(),
        state.embedder.as_ref(),
        &query,
        state.config.retrieval.top_k,
        &request.document_names,
    )
    .await?;

    let response = compose_answer(state.generator.as_ref(), &query, &chunks).await;
    Ok(Json(QueryResponse {
        success: true,
        query,
        response,
    }))
}

// ============ GET /api/documents ============

/// JSON response body for `GET /api/documents`.
#[derive(Serialize)]
struct DocumentsResponse {
    success: bool,
    /// Distinct indexed filenames, sorted.
    documents: Vec<String>,
}

/// Handler for `GET /api/documents`.
async fn handle_documents(
    State(state): State<AppState>,
) -> Result<Json<DocumentsResponse>, AppError> {
    let filenames = state.store.distinct_filenames().await?;
    Ok(Json(DocumentsResponse {
        success: true,
        documents: filenames.into_iter().collect(),
    }))
}
