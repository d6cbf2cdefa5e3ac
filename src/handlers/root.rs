//! Root endpoint handler.

use axum::http::StatusCode;

/// Handler for `/`: always an empty 200.
pub async fn root_handler() -> StatusCode {
    StatusCode::OK
}
