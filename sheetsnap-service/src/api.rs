//! HTTP API for the sheetsnap service.
//!
//! This module provides the REST API endpoints for:
//! - Health and metrics monitoring
//! - Spreadsheet conversion and worksheet analysis

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, State},
    http::{StatusCode, header},
    response::IntoResponse,
    routing::{get, post},
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::service::SheetService;

pub mod convert;
use convert::{analyze_handler, convert_all_handler, convert_handler};

/// Room for multipart boundaries and part headers on top of the file itself
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

/// Application state
pub struct AppState {
    pub service: Arc<SheetService>,
    pub start_time: Instant,
    pub metrics: PrometheusHandle,
}

/// Build the API router
pub fn router(service: Arc<SheetService>, metrics: PrometheusHandle) -> Router {
    // The upload limit itself is enforced on the file field so oversized
    // files get a 413 with a JSON body rather than a bare rejection.
    let max_body_size =
        service.config.limits.max_upload_bytes as usize + MULTIPART_OVERHEAD_BYTES;

    let state = Arc::new(AppState {
        service,
        start_time: Instant::now(),
        metrics,
    });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let upload_routes = Router::new()
        .route("/convert", post(convert_handler))
        .route("/convert-all", post(convert_all_handler))
        .route("/analyze", post(analyze_handler))
        .layer(DefaultBodyLimit::max(max_body_size));

    Router::new()
        .route("/", get(health_handler))
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .merge(upload_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// === Health & Metrics ===

async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        service: "sheetsnap",
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds: state.start_time.elapsed().as_secs(),
    })
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    service: &'static str,
    version: &'static str,
    uptime_seconds: u64,
}

async fn metrics_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}
