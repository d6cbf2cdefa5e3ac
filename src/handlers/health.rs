//! Health check endpoint handler.
//!
//! This module provides the `/health` endpoint handler that reports
//! whether the last poll of the appliance succeeded.

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use tracing::{debug, instrument};

use crate::state::SharedState;

/// Handler for the /health endpoint.
#[instrument(skip(state))]
pub async fn health_handler(State(state): State<SharedState>) -> impl IntoResponse {
    debug!("Processing /health request");

    let stats = &state.health_stats;

    // Derive HTTP status from the last poll
    let (status, message) = if stats.last_poll_ok() {
        (StatusCode::OK, "OK")
    } else if stats.total_polls() == 0 {
        (StatusCode::SERVICE_UNAVAILABLE, "Waiting for first poll")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "Last poll failed")
    };

    let table = stats.render_table();

    debug!("Health check: {} - {}", status, message);
    (
        status,
        [("Content-Type", "text/plain; charset=utf-8")],
        format!("{message}\n\n{table}"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::state::AppState;
    use axum::body;
    use std::sync::Arc;

    async fn body_text(response: axum::response::Response) -> String {
        let bytes = body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_health_before_first_poll() {
        let state = Arc::new(AppState::new(Config::default()).unwrap());
        let response = health_handler(State(state)).await.into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(body_text(response).await.starts_with("Waiting for first poll"));
    }

    #[tokio::test]
    async fn test_health_follows_last_poll() {
        let state = Arc::new(AppState::new(Config::default()).unwrap());

        state.health_stats.record_success(0.1, 2, 4);
        let response = health_handler(State(state.clone())).await.into_response();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response).await.contains("number of polls: 1"));

        state.health_stats.record_failure(0.2);
        let response = health_handler(State(state)).await.into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(body_text(response).await.starts_with("Last poll failed"));
    }
}
