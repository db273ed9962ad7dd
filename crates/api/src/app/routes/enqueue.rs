use axum::http::StatusCode;
use axum::response::Response;
use serde_json::json;
use tracing::info;

use fnapp_core::ApiResult;
use fnapp_triggers::QueueMessage;

use crate::app::dispatch::RouteRequest;
use crate::app::errors;
use crate::app::AppState;

/// Echo an order message without sending it.
pub async fn enqueue(_state: AppState, req: RouteRequest) -> ApiResult<Response> {
    info!("enqueue endpoint called");

    let message: QueueMessage = req.json()?;
    Ok(errors::success(
        StatusCode::OK,
        json!({
            "message": "Message would be enqueued",
            "data": message,
            "note": "This is a mock response. Implement queue client to actually enqueue messages.",
        }),
    ))
}
