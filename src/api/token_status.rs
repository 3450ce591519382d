//! Credential pool status and control endpoints

use axum::{extract::State, Json};
use serde::Serialize;

use crate::error::ApiError;
use crate::server::state::AppState;
use crate::services::{rotate_token, token_status, EntryStatus, PoolStats};

#[derive(Debug, Serialize)]
pub struct TokenStatusResponse {
    /// `pool` or `single`
    pub mode: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<PoolStats>,
    pub entries: Vec<EntryStatus>,
    pub has_derived: bool,
}

/// GET /token-status
pub async fn get_status(State(state): State<AppState>) -> Json<TokenStatusResponse> {
    let facade = state.facade.as_ref();
    let entries = facade.pool().map(|pool| pool.status()).unwrap_or_default();

    Json(TokenStatusResponse {
        mode: if facade.is_pooled() { "pool" } else { "single" }.to_string(),
        stats: token_status(facade),
        entries,
        has_derived: facade.derived().is_some(),
    })
}

/// POST /token-status/rotate
///
/// Round-robin step to the next entry. Refused while no entry is healthy.
pub async fn rotate(State(state): State<AppState>) -> Result<Json<PoolStats>, ApiError> {
    let facade = state.facade.as_ref();
    let before = token_status(facade).ok_or(ApiError::PoolNotConfigured)?;
    if !before.is_healthy() {
        return Err(ApiError::NoHealthyCredentials);
    }

    rotate_token(facade);
    let stats = token_status(facade).ok_or(ApiError::PoolNotConfigured)?;
    tracing::info!(
        position = stats.current_position,
        total = stats.total,
        "Manually rotated credential"
    );
    Ok(Json(stats))
}

/// POST /token-status/reset
///
/// Mark every entry healthy again.
pub async fn reset(State(state): State<AppState>) -> Result<Json<PoolStats>, ApiError> {
    let pool = state.facade.pool().ok_or(ApiError::PoolNotConfigured)?;
    pool.reset_all();
    tracing::info!("Credential health reset");

    Ok(Json(pool.stats()))
}
