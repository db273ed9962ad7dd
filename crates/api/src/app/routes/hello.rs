use axum::http::StatusCode;
use axum::response::Response;
use serde_json::json;
use tracing::info;

use fnapp_core::ApiResult;

use crate::app::dispatch::RouteRequest;
use crate::app::errors;
use crate::app::AppState;

pub async fn hello(_state: AppState, req: RouteRequest) -> ApiResult<Response> {
    info!("hello function processed a request");

    let name = req.query("name").filter(|n| !n.is_empty()).unwrap_or("World");
    Ok(errors::success(
        StatusCode::OK,
        json!({
            "message": format!("Hello, {name}!"),
            "method": req.method.as_str(),
        }),
    ))
}
