//! Health Check Endpoints
//!
//! - /health/live  - process is up
//! - /health/ready - the cart store answers its liveness probe
//!
//! No authentication required for health endpoints.

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use cartkeep_core::{HealthCheck, ServingStatus};
use serde::{Deserialize, Serialize};

use crate::state::AppState;

// ============================================================================
// TYPES
// ============================================================================

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: ServingStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store: Option<HealthCheck>,
    pub version: String,
    pub uptime_seconds: u64,
}

// ============================================================================
// HANDLERS
// ============================================================================

/// GET /health/live
pub async fn liveness(State(state): State<AppState>) -> impl IntoResponse {
    let response = HealthResponse {
        status: ServingStatus::Serving,
        store: None,
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
    };
    (StatusCode::OK, Json(response))
}

/// GET /health/ready
pub async fn readiness(State(state): State<AppState>) -> impl IntoResponse {
    let ctx = state.request_context();
    let start = std::time::Instant::now();
    let alive = state.store.ping(&ctx).await;
    let latency_ms = start.elapsed().as_millis() as u64;

    let status = ServingStatus::from_ping(alive);
    let check = HealthCheck::new(state.store.backend_name(), status).with_response_time(latency_ms);

    let response = HealthResponse {
        status,
        store: Some(check),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
    };

    let status_code = if status.is_serving() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(response))
}

// ============================================================================
// ROUTER
// ============================================================================

/// Create health check router (no auth required)
pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/live", get(liveness))
        .route("/ready", get(readiness))
}
