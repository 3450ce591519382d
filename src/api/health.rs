//! Health check endpoint
//!
//! Reports whether a usable credential is available, for monitoring and
//! container orchestration.

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;

use crate::server::state::AppState;

/// Response for the health check endpoint
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub mode: String,
    pub uptime_seconds: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_credentials: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub healthy_credentials: Option<usize>,
}

/// GET /health
///
/// 503 when the pool has no healthy entry left or no credential is set.
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let (healthy, mode, total, available) = match state.facade.pool() {
        Some(pool) => {
            let stats = pool.stats();
            (
                stats.is_healthy(),
                "pool",
                Some(stats.total),
                Some(stats.available),
            )
        }
        None => (state.facade.primary().is_some(), "single", None, None),
    };

    if !healthy {
        tracing::warn!(mode, "Health check failed, no usable credential");
    }

    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(HealthResponse {
            status: if healthy { "healthy" } else { "unhealthy" }.to_string(),
            version: state.settings.app_version.clone(),
            mode: mode.to_string(),
            uptime_seconds: state.uptime_seconds(),
            total_credentials: total,
            healthy_credentials: available,
        }),
    )
}
