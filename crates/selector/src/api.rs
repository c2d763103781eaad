//! HTTP API for health checks, Prometheus metrics and round reports

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use prometheus::{Encoder, TextEncoder};
use selector_lib::{
    health::{ComponentStatus, HealthRegistry},
    observability::SelectorMetrics,
    report::{ReportHandle, SeriesPoint, ServerSummary, SessionInfo},
    ServerId,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub health_registry: HealthRegistry,
    pub metrics: SelectorMetrics,
    pub report: ReportHandle,
}

impl AppState {
    pub fn new(health_registry: HealthRegistry, metrics: SelectorMetrics, report: ReportHandle) -> Self {
        Self {
            health_registry,
            metrics,
            report,
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

fn not_found(message: impl Into<String>) -> (StatusCode, Json<ErrorBody>) {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorBody {
            error: message.into(),
        }),
    )
}

#[derive(Debug, Serialize)]
struct ServersResponse {
    session: SessionInfo,
    servers: Vec<ServerSummary>,
}

#[derive(Debug, Serialize)]
struct SeriesResponse {
    server: ServerId,
    points: Vec<SeriesPoint>,
}

/// Returns 200 while operational, 503 when unhealthy
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_registry.health().await;

    let status_code = match health.status {
        ComponentStatus::Healthy | ComponentStatus::Degraded => StatusCode::OK,
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(health))
}

/// Ready once a round has completed with at least one reachable server
async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.health_registry.readiness().await;

    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(readiness))
}

async fn metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = state.metrics.gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        warn!(error = %e, "Failed to encode metrics");
        return (StatusCode::INTERNAL_SERVER_ERROR, Vec::new()).into_response();
    }

    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        buffer,
    )
        .into_response()
}

async fn latest_round(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.report.latest_round().await {
        Some(record) => Json(record).into_response(),
        None => not_found("no round completed yet").into_response(),
    }
}

async fn servers(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(ServersResponse {
        session: state.report.session().await,
        servers: state.report.servers().await,
    })
}

async fn server_series(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let server = ServerId::new(id);
    match state.report.series(&server).await {
        Some(points) => Json(SeriesResponse { server, points }).into_response(),
        None => not_found(format!("unknown server '{}'", server)).into_response(),
    }
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .route("/api/v1/rounds/latest", get(latest_round))
        .route("/api/v1/servers", get(servers))
        .route("/api/v1/servers/:id/series", get(server_series))
        .with_state(state)
}

/// Start the API server
pub async fn serve(port: u16, state: Arc<AppState>) -> anyhow::Result<()> {
    let app = create_router(state);

    let addr = format!("0.0.0.0:{}", port);
    info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
