//! HTTP server for Passage.
//!
//! Exposes the search engine as a small JSON API.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (returns version) |
//! | `GET`  | `/sources` | Configured sources and their status |
//! | `POST` | `/search` | Run a search to completion |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "query must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `no_reference` (422).
//!
//! # Concurrency
//!
//! Each request gets its own engine handle sharing the cache and sources;
//! searches from different clients do not cancel each other.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use passage_core::models::ParsedQuery;

use crate::config::Config;
use crate::engine::{SearchEngine, SearchOutcome, SearchResult};
use crate::sources::{get_sources, SourceStatus};

#[derive(Clone)]
struct AppState {
    config: Arc<Config>,
    engine: SearchEngine,
}

/// Bind to `[server].bind` and serve until the process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let engine = SearchEngine::from_config(config).await?;
    let bind_addr = config.server.bind.clone();
    let app = router(config.clone(), engine);

    info!(bind = %bind_addr, "server listening");
    println!("Passage server listening on http://{}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// The route table, separate from binding so it can be served in tests.
pub fn router(config: Config, engine: SearchEngine) -> Router {
    let state = AppState {
        config: Arc::new(config),
        engine,
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/sources", get(handle_sources))
        .route("/search", post(handle_search))
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

fn no_reference(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::UNPROCESSABLE_ENTITY,
        code: "no_reference".to_string(),
        message: message.into(),
    }
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

// ============ GET /sources ============

#[derive(Serialize)]
struct SourcesResponse {
    sources: Vec<SourceStatus>,
}

async fn handle_sources(State(state): State<AppState>) -> Json<SourcesResponse> {
    Json(SourcesResponse {
        sources: get_sources(&state.config),
    })
}

// ============ POST /search ============

#[derive(Deserialize)]
struct SearchRequest {
    query: String,
    #[serde(default)]
    book_type: Option<String>,
}

#[derive(Serialize)]
struct SearchResponse {
    query: String,
    phase: &'static str,
    search_id: uuid::Uuid,
    parsed: ParsedQuery,
    book_type: String,
    fallback: bool,
    sources_failed: Vec<String>,
    results: Vec<SearchResult>,
}

impl SearchResponse {
    fn new(query: String, outcome: SearchOutcome) -> Self {
        Self {
            query,
            phase: "ranked",
            search_id: outcome.search_id,
            parsed: outcome.query,
            book_type: outcome.book_type,
            fallback: outcome.fallback,
            sources_failed: outcome.attempt.sources_failed,
            results: outcome.results,
        }
    }
}

async fn handle_search(
    State(state): State<AppState>,
    Json(req): Json<SearchRequest>,
) -> Result<Json<SearchResponse>, AppError> {
    if req.query.trim().is_empty() {
        return Err(bad_request("query must not be empty"));
    }

    // A fresh engine handle per request keeps concurrent clients independent.
    let engine = state.engine.detached();
    let outcome = engine
        .search(&req.query, req.book_type.as_deref())
        .outcome()
        .await
        .ok_or_else(|| no_reference(format!("no recognizable reference in '{}'", req.query)))?;

    Ok(Json(SearchResponse::new(req.query, outcome)))
}
