use axum::http::StatusCode;
use axum::response::Response;
use chrono::Utc;
use serde_json::{json, Value};
use tracing::{error, info};

use fnapp_core::{iso_timestamp, ApiResult};

use crate::app::dispatch::RouteRequest;
use crate::app::errors;
use crate::app::AppState;

/// JSON truthiness: null, false, 0 and "" are all "no value".
fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64() != Some(0.0),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(_) | Value::Object(_)) => true,
    }
}

pub async fn receive(_state: AppState, req: RouteRequest) -> ApiResult<Response> {
    info!("data function processed a request");

    let body: Value = match serde_json::from_slice(&req.body) {
        Ok(body) => body,
        Err(e) => {
            error!(error = %e, "failed to parse request body");
            return Ok(errors::json_error(
                StatusCode::BAD_REQUEST,
                "Invalid JSON in request body",
            ));
        }
    };

    if !is_truthy(body.get("name")) {
        return Ok(errors::json_error(
            StatusCode::BAD_REQUEST,
            "Please provide a name in the request body",
        ));
    }

    Ok(errors::success(
        StatusCode::CREATED,
        json!({
            "message": "Data received successfully",
            "receivedData": body,
            "processedAt": iso_timestamp(Utc::now()),
        }),
    ))
}
