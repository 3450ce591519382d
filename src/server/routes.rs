//! Application routing

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::api::{health, token_status};
use crate::server::state::AppState;

/// Create the status router
pub fn create_router(state: AppState) -> Router {
    let token_routes = Router::new()
        .route("/", get(token_status::get_status))
        .route("/rotate", post(token_status::rotate))
        .route("/reset", post(token_status::reset));

    Router::new()
        .route("/health", get(health::health_check))
        .nest("/token-status", token_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::services::build_facade;
    use axum::{
        body::{to_bytes, Body},
        http::{Method, Request, StatusCode},
    };
    use serde_json::Value;
    use tower::ServiceExt;

    fn state(tokens: &[&str]) -> AppState {
        let settings = Settings::default();
        let tokens = tokens.iter().map(|t| t.to_string()).collect();
        let facade = build_facade(tokens, settings.derived_ttl()).unwrap();
        AppState::new(settings, facade)
    }

    async fn call(state: AppState, method: Method, uri: &str) -> (StatusCode, Value) {
        let response = create_router(state)
            .oneshot(
                Request::builder()
                    .method(method)
                    .uri(uri)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn test_health_pool_mode() {
        let (status, body) = call(state(&["a", "b"]), Method::GET, "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["mode"], "pool");
        assert_eq!(body["total_credentials"], 2);
        assert_eq!(body["healthy_credentials"], 2);
    }

    #[tokio::test]
    async fn test_health_unavailable_when_exhausted() {
        let state = state(&["a", "b"]);
        let pool = state.facade.pool().unwrap().clone();
        pool.mark_current_unhealthy();
        pool.mark_current_unhealthy();

        let (status, body) = call(state, Method::GET, "/health").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["status"], "unhealthy");
        assert_eq!(body["healthy_credentials"], 0);
    }

    #[tokio::test]
    async fn test_health_single_mode() {
        let (status, body) = call(state(&["only"]), Method::GET, "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["mode"], "single");
        assert!(body.get("total_credentials").is_none());
    }

    #[tokio::test]
    async fn test_token_status_lists_entries() {
        let state = state(&["a", "b", "c"]);
        state.facade.set_derived("session-a".to_string());

        let (status, body) = call(state, Method::GET, "/token-status").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["mode"], "pool");
        assert_eq!(body["stats"]["total"], 3);
        assert_eq!(body["has_derived"], true);

        let entries = body["entries"].as_array().unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0]["position"], 1);
        assert_eq!(entries[0]["is_current"], true);
        assert_eq!(entries[0]["has_derived"], true);
        assert_eq!(entries[1]["has_derived"], false);
        assert!(!body.to_string().contains("\"a\""));
    }

    #[tokio::test]
    async fn test_rotate_advances_current() {
        let state = state(&["a", "b"]);
        let (status, body) = call(state.clone(), Method::POST, "/token-status/rotate").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["current_position"], 2);
        assert_eq!(state.facade.primary().as_deref(), Some("b"));
    }

    #[tokio::test]
    async fn test_rotate_requires_pool() {
        let (status, body) = call(state(&["only"]), Method::POST, "/token-status/rotate").await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"]["type"], "pool_not_configured");
    }

    #[tokio::test]
    async fn test_rotate_refused_without_healthy_credentials() {
        let state = state(&["a", "b", "c"]);
        let pool = state.facade.pool().unwrap().clone();
        for _ in 0..3 {
            pool.mark_current_unhealthy();
        }
        let position = pool.current_index();

        let (status, body) = call(state, Method::POST, "/token-status/rotate").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error"]["type"], "credentials_exhausted");
        assert_eq!(pool.current_index(), position);
    }

    #[tokio::test]
    async fn test_reset_restores_health() {
        let state = state(&["a", "b"]);
        let pool = state.facade.pool().unwrap().clone();
        pool.mark_current_unhealthy();
        pool.mark_current_unhealthy();

        let (status, body) = call(state, Method::POST, "/token-status/reset").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["available"], 2);
        assert_eq!(pool.available_count(), 2);
    }
}
