//! HTTP endpoint handlers for the exporter.
//!
//! This module provides handlers for all HTTP endpoints:
//! - `/`: Empty success response
//! - `/metrics`: Prometheus metrics endpoint
//! - `/health`: Poll health endpoint

use axum::{routing::get, Router};
use tracing::debug;

use crate::state::SharedState;

pub mod health;
pub mod metrics;
pub mod root;

// Re-export handlers
pub use health::health_handler;
pub use metrics::metrics_handler;
pub use root::root_handler;

/// Builds the exporter router.
pub fn router(state: SharedState) -> Router {
    let mut app = Router::new()
        .route("/", get(root_handler))
        .route("/metrics", get(metrics_handler));

    // Conditionally add health endpoint
    if state.config.enable_health.unwrap_or(true) {
        app = app.route("/health", get(health_handler));
    } else {
        debug!("/health endpoint disabled");
    }

    app.with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::state::AppState;
    use axum::{
        body::{self, Body},
        http::{header, Request, StatusCode},
        response::Response,
    };
    use std::sync::Arc;
    use tower::ServiceExt;

    fn app(config: Config) -> Router {
        router(Arc::new(AppState::new(config).unwrap()))
    }

    async fn send_get(app: Router, uri: &str) -> Response {
        app.oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    async fn body_text(response: Response) -> String {
        let bytes = body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_root_is_empty_ok() {
        let response = send_get(app(Config::default()), "/").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response).await.is_empty());
    }

    #[tokio::test]
    async fn test_metrics_route() {
        let response = send_get(app(Config::default()), "/metrics").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            prometheus::TEXT_FORMAT
        );
        assert!(body_text(response).await.contains("kemp_up 0"));
    }

    #[tokio::test]
    async fn test_health_route_enabled_by_default() {
        let response = send_get(app(Config::default()), "/health").await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(body_text(response).await.starts_with("Waiting for first poll"));
    }

    #[tokio::test]
    async fn test_health_route_disabled() {
        let config = Config {
            enable_health: Some(false),
            ..Default::default()
        };
        let response = send_get(app(config.clone()), "/health").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        // The other routes stay mounted
        let response = send_get(app(config), "/metrics").await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_unknown_path_not_found() {
        let response = send_get(app(Config::default()), "/stats").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
