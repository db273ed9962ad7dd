use axum::http::StatusCode;

/// Liveness probe for the host.
pub async fn health() -> StatusCode {
    StatusCode::OK
}
