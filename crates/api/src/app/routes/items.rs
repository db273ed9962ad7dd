//! Sample item collection. Nothing is persisted.

use axum::http::StatusCode;
use axum::response::Response;
use chrono::Utc;
use serde_json::{json, Map, Value};
use tracing::info;

use fnapp_core::{generate_id, iso_timestamp, ApiError, ApiResult, Item, Page};

use crate::app::dispatch::RouteRequest;
use crate::app::errors;
use crate::app::AppState;

pub const ITEM_ID_PREFIX: &str = "item";

fn sample(id: &str, name: String, description: Option<&str>) -> Item {
    Item {
        id: id.to_string(),
        name,
        description: description.map(str::to_string),
        price: None,
        created_at: Utc::now(),
        updated_at: None,
    }
}

pub async fn get(_state: AppState, req: RouteRequest) -> ApiResult<Response> {
    info!(method = "GET", "items function processed a request");

    if let Some(id) = req.param("id") {
        let item = sample(id, format!("Item {id}"), Some("This is a sample item"));
        return Ok(errors::success(StatusCode::OK, item));
    }

    let items = ["1", "2", "3"]
        .into_iter()
        .map(|id| sample(id, format!("Item {id}"), None))
        .collect();
    Ok(errors::success(StatusCode::OK, Page::single(items)))
}

pub async fn create(_state: AppState, req: RouteRequest) -> ApiResult<Response> {
    info!(method = "POST", "items function processed a request");

    let mut item: Map<String, Value> = req.json()?;
    item.insert(
        "id".to_string(),
        Value::String(generate_id(Some(ITEM_ID_PREFIX))),
    );
    item.insert(
        "createdAt".to_string(),
        Value::String(iso_timestamp(Utc::now())),
    );
    Ok(errors::success(StatusCode::CREATED, Value::Object(item)))
}

pub async fn update(_state: AppState, req: RouteRequest) -> ApiResult<Response> {
    info!(method = "PUT", "items function processed a request");

    let id = req
        .param("id")
        .ok_or_else(|| ApiError::validation("ID is required for PUT requests"))?;
    let mut patch: Map<String, Value> = req.json()?;

    patch.insert("id".to_string(), Value::String(id.to_string()));
    patch.insert(
        "updatedAt".to_string(),
        Value::String(iso_timestamp(Utc::now())),
    );
    Ok(errors::success(StatusCode::OK, Value::Object(patch)))
}

pub async fn delete(_state: AppState, req: RouteRequest) -> ApiResult<Response> {
    info!(method = "DELETE", "items function processed a request");

    let id = req
        .param("id")
        .ok_or_else(|| ApiError::validation("ID is required for DELETE requests"))?;
    Ok(errors::success(
        StatusCode::OK,
        json!({
            "message": format!("Item {id} deleted successfully"),
            "id": id,
            "deletedAt": iso_timestamp(Utc::now()),
        }),
    ))
}
