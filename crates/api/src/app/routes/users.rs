//! User management over the injected store.

use axum::http::StatusCode;
use axum::response::Response;
use chrono::Utc;
use serde_json::{json, Value};
use tracing::info;

use fnapp_core::{ApiError, ApiResult, UserPatch};

use crate::app::dispatch::RouteRequest;
use crate::app::errors;
use crate::app::AppState;

fn required_id(req: &RouteRequest) -> ApiResult<&str> {
    req.param("id")
        .ok_or_else(|| ApiError::validation("User ID is required"))
}

pub async fn get(state: AppState, req: RouteRequest) -> ApiResult<Response> {
    info!("GET users request received");

    match req.param("id") {
        Some(id) => Ok(errors::success(StatusCode::OK, state.users.get(id)?)),
        None => Ok(errors::success(StatusCode::OK, state.users.list())),
    }
}

pub async fn create(state: AppState, req: RouteRequest) -> ApiResult<Response> {
    info!("POST user request received");

    let body: Value = req.json()?;
    let user = state.users.create(&body, Utc::now())?;
    Ok(errors::success(StatusCode::CREATED, user))
}

pub async fn update(state: AppState, req: RouteRequest) -> ApiResult<Response> {
    info!("PUT user request received");

    let id = required_id(&req)?;
    // A missing user is reported even when the body is malformed.
    state.users.ensure_exists(id)?;

    let patch: UserPatch = req.json()?;
    let user = state.users.update(id, &patch, Utc::now())?;
    Ok(errors::success(StatusCode::OK, user))
}

pub async fn delete(state: AppState, req: RouteRequest) -> ApiResult<Response> {
    info!("DELETE user request received");

    let id = required_id(&req)?;
    state.users.delete(id)?;
    Ok(errors::success(
        StatusCode::OK,
        json!({ "message": "User deleted successfully", "id": id }),
    ))
}
