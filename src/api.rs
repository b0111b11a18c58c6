//! HTTP surface for docdex.
//!
//! This module exposes a compact Axum router with a handful of endpoints:
//!
//! - `POST /ingest` – Adapt a document's segmented blocks, enrich each unit, and
//!   upsert the results into the vector index. Returns the batch report
//!   (`succeeded`, `failed`, `skipped`, per-unit `failures`).
//! - `GET /search` – Embed the query text and return normalized results in backend
//!   rank order. The `k` parameter is clamped to `SEARCH_MAX_RESULTS` here, at the
//!   caller-facing layer, not in the core.
//! - `GET /metrics` – Observe ingestion counters.
//! - `GET /health` – Vector index reachability snapshot.
//!
//! The HTTP surface shares the pipeline with the CLI, so behavior is identical
//! across interfaces.

use crate::config::get_config;
use crate::pipeline::{PipelineApi, RawBlock, UpsertReport};
use crate::query::{SearchError, SearchResult};
use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const DEFAULT_SEARCH_LIMIT: usize = 5;

/// Build the HTTP router exposing the ingestion and search API surface.
pub fn create_router<S>(service: Arc<S>) -> Router
where
    S: PipelineApi + 'static,
{
    Router::new()
        .route("/ingest", post(ingest_document::<S>))
        .route("/search", get(search::<S>))
        .route("/metrics", get(get_metrics::<S>))
        .route("/health", get(get_health::<S>))
        .with_state(service)
}

/// Request body for the `POST /ingest` endpoint.
#[derive(Deserialize)]
struct IngestRequest {
    /// Logical document identifier stored with every unit.
    source_name: String,
    /// Ordered block output of the upstream segmenter.
    blocks: Vec<RawBlock>,
}

/// Ingest a segmented document into the vector index.
///
/// Unit-level failures are reported in the body rather than as an error status; the
/// batch report is the single artifact of a run.
async fn ingest_document<S>(
    State(service): State<Arc<S>>,
    Json(request): Json<IngestRequest>,
) -> Json<UpsertReport>
where
    S: PipelineApi,
{
    let IngestRequest {
        source_name,
        blocks,
    } = request;
    let report = service.ingest(&source_name, blocks).await;
    tracing::info!(
        source = source_name,
        succeeded = report.succeeded,
        failed = report.failed,
        skipped = report.skipped,
        "Ingest request completed"
    );
    Json(report)
}

/// Query parameters for the `GET /search` endpoint.
#[derive(Deserialize)]
struct SearchParams {
    /// Natural-language query text.
    q: String,
    /// Requested number of results (defaults to 5, clamped to the configured maximum).
    #[serde(default)]
    k: Option<usize>,
}

/// Response body for the `GET /search` endpoint.
#[derive(Serialize)]
struct SearchResponse {
    results: Vec<SearchResult>,
}

/// Run a similarity search and return normalized results.
async fn search<S>(
    State(service): State<Arc<S>>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>, AppError>
where
    S: PipelineApi,
{
    let max_results = get_config().search_max_results;
    let limit = params
        .k
        .unwrap_or(DEFAULT_SEARCH_LIMIT)
        .clamp(1, max_results);
    let results = service.search(&params.q, limit).await?;
    Ok(Json(SearchResponse { results }))
}

/// Return the ingestion counters snapshot.
async fn get_metrics<S>(State(service): State<Arc<S>>) -> Json<crate::metrics::MetricsSnapshot>
where
    S: PipelineApi,
{
    Json(service.metrics_snapshot())
}

/// Return the vector index health snapshot.
async fn get_health<S>(State(service): State<Arc<S>>) -> Json<crate::index::IndexHealthSnapshot>
where
    S: PipelineApi,
{
    Json(service.index_health().await)
}

struct AppError(SearchError);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (StatusCode::BAD_GATEWAY, self.0.to_string()).into_response()
    }
}

impl From<SearchError> for AppError {
    fn from(inner: SearchError) -> Self {
        Self(inner)
    }
}
