//! Metrics endpoint handler for Prometheus scraping.
//!
//! This module provides the `/metrics` endpoint handler that encodes the
//! whole gauge registry in Prometheus text format.

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
};
use prometheus::{Encoder, Registry, TextEncoder, TEXT_FORMAT};
use std::time::Instant;
use tracing::{debug, error, instrument};

use crate::state::SharedState;

/// Buffer capacity for metrics encoding.
const BUFFER_CAP: usize = 64 * 1024;

/// Error type for metrics endpoint failures.
#[derive(Debug)]
pub enum MetricsError {
    EncodingFailed,
}

impl IntoResponse for MetricsError {
    fn into_response(self) -> axum::response::Response {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to encode metrics",
        )
            .into_response()
    }
}

/// Encodes every metric family of `registry` in text exposition format.
pub fn encode_registry(registry: &Registry) -> Result<String, MetricsError> {
    let families = registry.gather();

    let mut buffer = Vec::with_capacity(BUFFER_CAP);
    let encoder = TextEncoder::new();

    if encoder.encode(&families, &mut buffer).is_err() {
        error!("Failed to encode Prometheus metrics");
        return Err(MetricsError::EncodingFailed);
    }

    String::from_utf8(buffer).map_err(|_| MetricsError::EncodingFailed)
}

/// Handler for the /metrics endpoint.
#[instrument(skip(state))]
pub async fn metrics_handler(
    State(state): State<SharedState>,
) -> Result<impl IntoResponse, MetricsError> {
    let start = Instant::now();
    debug!("Processing /metrics request");

    let body = encode_registry(&state.registry)?;

    debug!(
        "Metrics request completed: {} bytes, {:.3}ms",
        body.len(),
        start.elapsed().as_secs_f64() * 1000.0
    );

    Ok(([(header::CONTENT_TYPE, TEXT_FORMAT)], body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ResourceCounters;
    use crate::config::Config;
    use crate::state::AppState;
    use axum::body;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_metrics_handler_renders_registry() {
        let state = Arc::new(AppState::new(Config::default()).unwrap());
        state.metrics.set_up(true);
        state.metrics.set_virtual_service(
            "web-vip",
            "10.0.0.1",
            443,
            &ResourceCounters {
                total_connections: 4.0,
                ..Default::default()
            },
        );

        let response = metrics_handler(State(state)).await.into_response();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            TEXT_FORMAT
        );

        let bytes = body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(text.contains("# TYPE kemp_up gauge"));
        assert!(text.lines().any(|l| l == "kemp_up 1"));
        assert!(text.contains("kemp_totals_connections_per_second 0"));
        assert!(text
            .lines()
            .any(|l| l.starts_with("kemp_virtual_service_total_connections{")
                && l.contains(r#"name="web-vip""#)
                && l.ends_with(" 4")));
    }

    #[test]
    fn test_encode_empty_registry() {
        let registry = Registry::new();
        assert_eq!(encode_registry(&registry).unwrap(), "");
    }
}
