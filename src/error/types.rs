//! Error type definitions

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::utils::truncate_with_suffix;

/// Maximum number of characters of an upstream error body kept in messages
const MAX_BODY_CHARS: usize = 512;

// ============================================================================
// Pool Errors
// ============================================================================

/// Errors raised while building the credential pool
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    /// No usable primary credential was supplied
    #[error("Credential pool requires at least one credential")]
    EmptyCredentialList,
}

// ============================================================================
// Upstream Errors
// ============================================================================

/// Failures talking to the upstream service
#[derive(Error, Debug)]
pub enum UpstreamError {
    /// Upstream answered with a non-success status
    #[error("Upstream request failed with status {status}: {message}")]
    Status { status: u16, message: String },

    /// The request never produced a response
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The response could not be decoded
    #[error("Invalid upstream response: {0}")]
    InvalidResponse(String),
}

impl UpstreamError {
    /// Build a status error, truncating long response bodies
    pub fn status(status: u16, body: &str) -> Self {
        UpstreamError::Status {
            status,
            message: truncate_with_suffix(body.trim(), MAX_BODY_CHARS, "..."),
        }
    }

    /// HTTP status attached to this error, if any
    pub fn status_code(&self) -> Option<u16> {
        match self {
            UpstreamError::Status { status, .. } => Some(*status),
            UpstreamError::Transport(err) => err.status().map(|s| s.as_u16()),
            UpstreamError::InvalidResponse(_) => None,
        }
    }

    /// Whether retrying the same request with the same credential may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            UpstreamError::Status { status, .. } => *status >= 500,
            UpstreamError::Transport(err) => {
                err.is_timeout()
                    || err.is_connect()
                    || err.status().is_some_and(|s| s.is_server_error())
            }
            UpstreamError::InvalidResponse(_) => false,
        }
    }
}

/// Errors from a single-credential refresh run
#[derive(Error, Debug)]
pub enum RefreshError {
    #[error("No primary credential configured")]
    MissingPrimary,

    #[error("Failed to get session token: {0}")]
    Exchange(#[from] UpstreamError),
}

// ============================================================================
// Rotation Classification
// ============================================================================

/// Errors the resilient executor can inspect when deciding whether to rotate
///
/// The message axis of the classification uses `Display`; implementors only
/// report the HTTP status they carry.
pub trait RotationSignal: std::fmt::Display {
    /// Status of the HTTP response attached to this error
    fn http_status(&self) -> Option<u16> {
        None
    }

    /// Text matched against the rotation patterns
    fn rotation_message(&self) -> String {
        self.to_string()
    }
}

impl RotationSignal for UpstreamError {
    fn http_status(&self) -> Option<u16> {
        self.status_code()
    }
}

impl RotationSignal for reqwest::Error {
    fn http_status(&self) -> Option<u16> {
        self.status().map(|s| s.as_u16())
    }
}

impl RotationSignal for anyhow::Error {
    fn http_status(&self) -> Option<u16> {
        self.chain().find_map(|cause| {
            if let Some(upstream) = cause.downcast_ref::<UpstreamError>() {
                return upstream.status_code();
            }
            cause
                .downcast_ref::<reqwest::Error>()
                .and_then(|err| err.status())
                .map(|s| s.as_u16())
        })
    }

    /// Every cause in the chain, joined by `": "`
    fn rotation_message(&self) -> String {
        format!("{self:#}")
    }
}

// ============================================================================
// API Errors
// ============================================================================

/// Errors returned by the status API
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("No healthy credentials available")]
    NoHealthyCredentials,

    #[error("Credential pool is not enabled (single credential mode)")]
    PoolNotConfigured,

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type) = match &self {
            ApiError::NoHealthyCredentials => {
                (StatusCode::SERVICE_UNAVAILABLE, "credentials_exhausted")
            }
            ApiError::PoolNotConfigured => (StatusCode::CONFLICT, "pool_not_configured"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "api_error"),
        };

        let body = Json(ErrorResponse {
            type_: "error".to_string(),
            error: ErrorDetail {
                type_: error_type.to_string(),
                message: self.to_string(),
            },
        });

        (status, body).into_response()
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    #[serde(rename = "type")]
    type_: String,
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    #[serde(rename = "type")]
    type_: String,
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_error_truncates_body() {
        let body = "x".repeat(2000);
        let err = UpstreamError::status(500, &body);
        match err {
            UpstreamError::Status { status, message } => {
                assert_eq!(status, 500);
                assert_eq!(message.chars().count(), MAX_BODY_CHARS + 3);
                assert!(message.ends_with("..."));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_transient_statuses() {
        assert!(UpstreamError::status(502, "bad gateway").is_transient());
        assert!(!UpstreamError::status(401, "bad credentials").is_transient());
        assert!(!UpstreamError::InvalidResponse("eof".to_string()).is_transient());
    }

    #[test]
    fn test_anyhow_exposes_wrapped_status() {
        let err = anyhow::Error::new(UpstreamError::status(429, "slow down"))
            .context("chat completion failed");
        assert_eq!(err.http_status(), Some(429));

        let plain = anyhow::anyhow!("connection reset");
        assert_eq!(plain.http_status(), None);
    }

    #[test]
    fn test_api_error_status_codes() {
        assert_eq!(
            ApiError::NoHealthyCredentials.into_response().status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            ApiError::PoolNotConfigured.into_response().status(),
            StatusCode::CONFLICT
        );
    }
}
