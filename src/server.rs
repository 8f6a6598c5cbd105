//! HTTP service: upload a document, get chapters, chunks or an archive back.
//!
//! Nothing is persisted; every request carries the whole document as its
//! body and the response carries the whole result.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (returns version) |
//! | `GET`  | `/separators` | Separator table per content kind |
//! | `POST` | `/chapters` | Chapter list for the uploaded document |
//! | `POST` | `/split` | Chunks as JSON |
//! | `POST` | `/archive` | Chunks as a zip archive |
//!
//! The `POST` endpoints take the raw document bytes as the body and accept
//! `format`, `name`, `strategy`, `chunk_size`, `chunk_overlap`, `mode`,
//! `content`, `metric`, `prefix`, `no_prefix`, `whole` and `chapter` as
//! query parameters, overriding the server's configuration for that
//! request.
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "chunk_overlap (100) must be smaller than chunk_size (100)" } }
//! ```
//!
//! Error codes: `bad_request` (400), `measurement_failed` (422),
//! `internal` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so a browser page can
//! upload directly.

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use folio_core::{ContentKind, SplitError};

use crate::chunk::{load_shared_tokenizer, SharedTokenizer};
use crate::commands::separator_entry;
use crate::config::Config;
use crate::extract::ExtractError;
use crate::job::{self, Document, JobOptions, Overrides, SplitReport};
use crate::package::archive_name;
use crate::pipeline::ChapterOutOfRange;
use crate::progress::NoProgress;

/// Shared application state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
struct AppState {
    config: Arc<Config>,
    /// Loaded once at startup when the configured metric is `tokens`.
    tokens: Option<Arc<SharedTokenizer>>,
}

/// Start the HTTP server on `[server].bind`. Runs until the process exits.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let tokens = load_shared_tokenizer(&config.chunking)?.map(Arc::new);
    let state = AppState {
        config: Arc::new(config.clone()),
        tokens,
    };
    let app = router(state, config.server.max_upload_bytes);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(bind = %bind_addr, "server started");
    println!("folio server listening on http://{}", bind_addr);
    axum::serve(listener, app).await?;
    Ok(())
}

fn router(state: AppState, max_upload_bytes: usize) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/separators", get(handle_separators))
        .route("/chapters", post(handle_chapters))
        .route("/split", post(handle_split))
        .route("/archive", post(handle_archive))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(cors)
        .with_state(state)
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

/// Internal error type that converts into an Axum HTTP response.
struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

fn measurement_failed(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::UNPROCESSABLE_ENTITY,
        code: "measurement_failed".to_string(),
        message: message.into(),
    }
}

fn internal(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal".to_string(),
        message: message.into(),
    }
}

/// Map a pipeline error to a status by the typed error somewhere in its
/// chain: bad input or settings are the client's fault, a failing metric is
/// unprocessable, anything else is ours.
fn classify(err: anyhow::Error) -> AppError {
    let message = format!("{:#}", err);
    for cause in err.chain() {
        if let Some(split) = cause.downcast_ref::<SplitError>() {
            return match split {
                SplitError::InvalidConfiguration(_) => bad_request(message),
                SplitError::Measurement(_) => measurement_failed(message),
            };
        }
        if cause.downcast_ref::<ExtractError>().is_some()
            || cause.downcast_ref::<ChapterOutOfRange>().is_some()
        {
            return bad_request(message);
        }
    }
    tracing::error!(error = %message, "request failed");
    internal(message)
}

// ============ Request parameters ============

/// Query parameters shared by the `POST` endpoints.
#[derive(Debug, Default, Deserialize)]
struct RunParams {
    format: Option<String>,
    /// Uploaded file name, used for format detection and the archive name.
    name: Option<String>,
    strategy: Option<String>,
    chunk_size: Option<usize>,
    chunk_overlap: Option<usize>,
    mode: Option<String>,
    content: Option<String>,
    metric: Option<String>,
    prefix: Option<String>,
    #[serde(default)]
    no_prefix: bool,
    #[serde(default)]
    whole: bool,
    chapter: Option<usize>,
}

impl RunParams {
    fn overrides(&self) -> Overrides {
        Overrides {
            strategy: self.strategy.clone(),
            chunk_size: self.chunk_size,
            chunk_overlap: self.chunk_overlap,
            mode: self.mode.clone(),
            content: self.content.clone(),
            metric: self.metric.clone(),
            tokenizer: None,
            prefix: self.prefix.clone(),
            no_prefix: self.no_prefix,
        }
    }

    fn job_options(&self) -> JobOptions {
        JobOptions {
            chapter: self.chapter,
            whole: self.whole,
        }
    }
}

/// Resolve the effective config and the uploaded document.
fn prepare(state: &AppState, params: &RunParams, body: Bytes) -> Result<(Config, Document), AppError> {
    if body.is_empty() {
        return Err(bad_request("request body must contain the document"));
    }
    let config = params
        .overrides()
        .apply(&state.config)
        .map_err(|e| bad_request(format!("{:#}", e)))?;
    let name = params.name.clone().unwrap_or_else(|| "upload".to_string());
    let doc = Document::new(name, body.to_vec(), params.format.as_deref()).map_err(classify)?;
    Ok((config, doc))
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ GET /separators ============

async fn handle_separators() -> Json<serde_json::Value> {
    let kinds: Vec<_> = ContentKind::ALL.iter().map(|k| separator_entry(*k)).collect();
    Json(serde_json::json!({ "kinds": kinds }))
}

// ============ POST /chapters ============

async fn handle_chapters(
    State(state): State<AppState>,
    Query(params): Query<RunParams>,
    body: Bytes,
) -> Result<Json<serde_json::Value>, AppError> {
    let (config, doc) = prepare(&state, &params, body)?;
    let chapters = job::extract(&doc, &config).await.map_err(classify)?;
    Ok(Json(serde_json::json!({
        "source": doc.name,
        "format": doc.format.as_str(),
        "chapters": chapters,
    })))
}

// ============ POST /split ============

async fn handle_split(
    State(state): State<AppState>,
    Query(params): Query<RunParams>,
    body: Bytes,
) -> Result<Json<serde_json::Value>, AppError> {
    let (config, doc) = prepare(&state, &params, body)?;
    let chapters = job::run(
        &doc,
        &config,
        state.tokens.as_deref(),
        params.job_options(),
        &NoProgress,
    )
    .await
    .map_err(classify)?;
    let report = SplitReport {
        source: &doc.name,
        format: doc.format.as_str(),
        chapters: &chapters,
    };
    let value = serde_json::to_value(&report).map_err(|e| internal(e.to_string()))?;
    Ok(Json(value))
}

// ============ POST /archive ============

async fn handle_archive(
    State(state): State<AppState>,
    Query(params): Query<RunParams>,
    body: Bytes,
) -> Result<Response, AppError> {
    let (config, doc) = prepare(&state, &params, body)?;
    let options = params.job_options();
    let chapters = job::run(&doc, &config, state.tokens.as_deref(), options, &NoProgress)
        .await
        .map_err(classify)?;
    let archive = job::package(&doc, &config, options, &chapters, &NoProgress).map_err(classify)?;

    let filename = archive_name(&doc.name).replace(['"', '\\'], "");
    let disposition = format!("attachment; filename=\"{}\"", filename);
    Ok((
        [
            (header::CONTENT_TYPE, "application/zip".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        archive,
    )
        .into_response())
}
