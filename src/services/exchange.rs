//! Session-token exchange
//!
//! Trades a primary GitHub credential for a short-lived Copilot session
//! token. The refresh scheduler only sees the [`CredentialExchange`] trait;
//! [`GithubTokenExchange`] is the HTTP implementation.

use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::Client;
use serde::Deserialize;
use std::fmt;
use std::time::Duration;

use crate::error::UpstreamError;
use crate::utils::retry::{presets, retry_with_backoff, RetryConfig};
use crate::utils::mask_secret;

// ============================================================================
// Constants
// ============================================================================

pub const GITHUB_API_BASE: &str = "https://api.github.com";
const TOKEN_PATH: &str = "/copilot_internal/v2/token";
const COPILOT_CHAT_VERSION: &str = "0.26.7";
const GITHUB_API_VERSION: &str = "2025-04-01";

// ============================================================================
// Types
// ============================================================================

/// A derived session credential and when to refresh it
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct DerivedCredential {
    pub token: String,
    /// Seconds until the credential should be refreshed
    pub refresh_in: u64,
    /// Absolute expiry as a unix timestamp, when the upstream reports one
    #[serde(default)]
    pub expires_at: Option<i64>,
}

impl fmt::Debug for DerivedCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DerivedCredential")
            .field("token", &mask_secret(&self.token))
            .field("refresh_in", &self.refresh_in)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Exchanges a primary credential for a derived session credential
#[async_trait]
pub trait CredentialExchange: Send + Sync {
    async fn exchange(&self, primary: &str) -> Result<DerivedCredential, UpstreamError>;
}

// ============================================================================
// GitHub Exchange
// ============================================================================

/// Copilot token endpoint client
#[derive(Debug, Clone)]
pub struct GithubTokenExchange {
    client: Client,
    base_url: String,
    vscode_version: String,
    retry: RetryConfig,
}

impl GithubTokenExchange {
    pub fn new(
        base_url: impl Into<String>,
        vscode_version: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, UpstreamError> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            vscode_version: vscode_version.into(),
            retry: presets::token_exchange(),
        })
    }

    /// Override the backoff used for transient failures
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    fn token_url(&self) -> String {
        format!("{}{}", self.base_url, TOKEN_PATH)
    }

    async fn fetch_once(&self, primary: &str) -> Result<DerivedCredential, UpstreamError> {
        let response = self
            .client
            .get(self.token_url())
            .header(AUTHORIZATION, format!("token {primary}"))
            .header(ACCEPT, "application/json")
            .header(USER_AGENT, format!("GitHubCopilotChat/{COPILOT_CHAT_VERSION}"))
            .header("editor-version", format!("vscode/{}", self.vscode_version))
            .header(
                "editor-plugin-version",
                format!("copilot-chat/{COPILOT_CHAT_VERSION}"),
            )
            .header("x-github-api-version", GITHUB_API_VERSION)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(UpstreamError::status(status.as_u16(), &body));
        }

        response
            .json::<DerivedCredential>()
            .await
            .map_err(|e| UpstreamError::InvalidResponse(e.to_string()))
    }
}

#[async_trait]
impl CredentialExchange for GithubTokenExchange {
    async fn exchange(&self, primary: &str) -> Result<DerivedCredential, UpstreamError> {
        let outcome = retry_with_backoff(&self.retry, UpstreamError::is_transient, || {
            self.fetch_once(primary)
        })
        .await;

        if outcome.attempts > 1 {
            tracing::debug!(
                attempts = outcome.attempts,
                succeeded = outcome.result.is_ok(),
                "Session token exchange needed retries"
            );
        }
        outcome.result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{extract::State, http::HeaderMap, http::StatusCode, routing::get, Json, Router};
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[derive(Clone)]
    struct Upstream {
        calls: Arc<AtomicU32>,
        failures_before_success: u32,
        failure_status: StatusCode,
    }

    async fn token_handler(
        State(upstream): State<Upstream>,
        headers: HeaderMap,
    ) -> (StatusCode, Json<serde_json::Value>) {
        let call = upstream.calls.fetch_add(1, Ordering::SeqCst);
        if call < upstream.failures_before_success {
            return (
                upstream.failure_status,
                Json(json!({ "message": "Bad credentials" })),
            );
        }

        let auth = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        (
            StatusCode::OK,
            Json(json!({
                "token": format!("session-for-{}", auth.trim_start_matches("token ")),
                "refresh_in": 1500,
                "expires_at": 1_900_000_000i64,
            })),
        )
    }

    async fn spawn_upstream(failures: u32, failure_status: StatusCode) -> (String, Arc<AtomicU32>) {
        let calls = Arc::new(AtomicU32::new(0));
        let state = Upstream {
            calls: calls.clone(),
            failures_before_success: failures,
            failure_status,
        };
        let app = Router::new()
            .route(TOKEN_PATH, get(token_handler))
            .with_state(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        (format!("http://{addr}/"), calls)
    }

    fn exchange_for(base_url: &str) -> GithubTokenExchange {
        GithubTokenExchange::new(base_url, "1.99.3", Duration::from_secs(5))
            .unwrap()
            .with_retry(
                RetryConfig::new()
                    .with_max_retries(2)
                    .with_initial_delay(Duration::from_millis(1))
                    .with_jitter(false),
            )
    }

    #[test]
    fn test_token_url_trims_trailing_slash() {
        let exchange =
            GithubTokenExchange::new("https://ghe.example.com/api/", "1.99.3", Duration::from_secs(1))
                .unwrap();
        assert_eq!(
            exchange.token_url(),
            "https://ghe.example.com/api/copilot_internal/v2/token"
        );
    }

    #[test]
    fn test_derived_credential_debug_is_masked() {
        let derived = DerivedCredential {
            token: "tid=abcdef;exp=1900000000;sku=secret".to_string(),
            refresh_in: 1500,
            expires_at: None,
        };
        assert!(!format!("{derived:?}").contains("sku=secret"));
    }

    #[tokio::test]
    async fn test_exchange_success() {
        let (base_url, calls) = spawn_upstream(0, StatusCode::OK).await;
        let derived = exchange_for(&base_url).exchange("ghu_primary").await.unwrap();

        assert_eq!(derived.token, "session-for-ghu_primary");
        assert_eq!(derived.refresh_in, 1500);
        assert_eq!(derived.expires_at, Some(1_900_000_000));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_rejected_credential_is_not_retried() {
        let (base_url, calls) = spawn_upstream(10, StatusCode::UNAUTHORIZED).await;
        let err = exchange_for(&base_url).exchange("ghu_revoked").await.unwrap_err();

        assert_eq!(err.status_code(), Some(401));
        assert!(err.to_string().contains("Bad credentials"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_transient_failures_are_retried() {
        let (base_url, calls) = spawn_upstream(2, StatusCode::BAD_GATEWAY).await;
        let derived = exchange_for(&base_url).exchange("ghu_primary").await.unwrap();

        assert_eq!(derived.refresh_in, 1500);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_persistent_server_error_gives_up() {
        let (base_url, calls) = spawn_upstream(10, StatusCode::SERVICE_UNAVAILABLE).await;
        let err = exchange_for(&base_url).exchange("ghu_primary").await.unwrap_err();

        assert_eq!(err.status_code(), Some(503));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
