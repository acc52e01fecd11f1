use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use chrono::{DateTime, Utc};
use pushjob_core::{Lifecycle, LifecycleState};
use pushjob_metrics::{
    MetricSample, MetricsRegistry, PrometheusExporter, PushStats, PushStatsSnapshot, CONTENT_TYPE,
};
use serde::Serialize;
use std::time::Instant;
use tracing::error;

#[derive(Clone)]
pub struct AppState {
    registry: MetricsRegistry,
    push_stats: PushStats,
    lifecycle: Lifecycle,
    start_time: Instant,
}

impl AppState {
    pub fn new(registry: MetricsRegistry, push_stats: PushStats, lifecycle: Lifecycle) -> Self {
        Self {
            registry,
            push_stats,
            lifecycle,
            start_time: Instant::now(),
        }
    }
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    lifecycle: LifecycleState,
    uptime_seconds: u64,
    timestamp: DateTime<Utc>,
    push: PushStatsSnapshot,
    jobs: Vec<MetricSample>,
}

/// Pull endpoint: `/metrics` serves the registry, `/health` reports state and
/// every other path redirects to `/metrics`.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(redirect_to_metrics))
        .route("/metrics", get(metrics))
        .route("/health", get(health_check))
        .fallback(redirect_to_metrics)
        .with_state(state)
}

async fn redirect_to_metrics() -> impl IntoResponse {
    (
        StatusCode::MOVED_PERMANENTLY,
        [(header::LOCATION, "/metrics")],
    )
}

async fn metrics(State(state): State<AppState>) -> Response {
    match PrometheusExporter::format(&state.registry) {
        Ok(body) => ([(header::CONTENT_TYPE, CONTENT_TYPE)], body).into_response(),
        Err(e) => {
            error!("Failed to encode metrics: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let lifecycle = state.lifecycle.state();
    let (code, status) = match lifecycle {
        LifecycleState::Running => (StatusCode::OK, "healthy"),
        _ => (StatusCode::SERVICE_UNAVAILABLE, "unavailable"),
    };

    (
        code,
        Json(HealthResponse {
            status,
            lifecycle,
            uptime_seconds: state.start_time.elapsed().as_secs(),
            timestamp: Utc::now(),
            push: state.push_stats.snapshot().await,
            jobs: state.registry.samples(),
        }),
    )
}
