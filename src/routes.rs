use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Extension;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::json;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use crew_match::error::AppError;
use crew_match::infra::{MemoryMatchRepository, MemoryRegistrationRepository};
use crew_match::matching::{MatchBatchSummary, ProactiveMatchingJob};

pub(crate) type MatchingJob = ProactiveMatchingJob<MemoryMatchRepository, MemoryRegistrationRepository>;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

pub(crate) fn with_service_routes(registrations: axum::Router, matching: Arc<MatchingJob>) -> axum::Router {
    registrations
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
        .route(
            "/api/v1/matching/runs",
            axum::routing::post(matching_run_endpoint),
        )
        .layer(Extension(matching))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

/// Optional batch parameters. Schedulers replaying a window pass `as_of`;
/// an empty body runs against the current time.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct MatchRunRequest {
    #[serde(default)]
    pub(crate) as_of: Option<DateTime<Utc>>,
}

pub(crate) async fn matching_run_endpoint(
    Extension(job): Extension<Arc<MatchingJob>>,
    body: Option<Json<MatchRunRequest>>,
) -> Result<Json<MatchBatchSummary>, AppError> {
    let as_of = body
        .and_then(|Json(request)| request.as_of)
        .unwrap_or_else(Utc::now);
    let summary = job.run(as_of).await?;
    Ok(Json(summary))
}
