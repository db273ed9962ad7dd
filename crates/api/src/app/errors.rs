use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::error;

use fnapp_core::{ApiError, ApiResponse};

/// Success envelope with the given status.
pub fn success<T: Serialize>(status: StatusCode, data: T) -> Response {
    (status, Json(ApiResponse::success(data))).into_response()
}

/// Error envelope with the given status.
pub fn json_error(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(ApiResponse::error(message))).into_response()
}

pub fn status_for(err: &ApiError) -> StatusCode {
    match err {
        ApiError::Validation(_) | ApiError::InvalidBody { .. } => StatusCode::BAD_REQUEST,
        ApiError::NotFound(_) => StatusCode::NOT_FOUND,
        ApiError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
    }
}

pub fn api_error_to_response(err: ApiError) -> Response {
    if let ApiError::InvalidBody { detail } = &err {
        error!(error = %detail, "failed to decode request body");
    }
    json_error(status_for(&err), err.to_string())
}
