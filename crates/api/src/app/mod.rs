//! HTTP application wiring (Axum router + function dispatch).
//!
//! - `dispatch.rs`: route templates and the per-method dispatcher
//! - `routes/`: one file per HTTP function
//! - `errors.rs`: envelope responses and error-to-status mapping

use std::sync::Arc;

use axum::{routing::get, Router};
use tower::ServiceBuilder;

use fnapp_core::{InMemoryStore, User, UserDirectory};

pub mod dispatch;
pub mod errors;
pub mod routes;

pub use dispatch::RouteError;

/// Shared state handed to every HTTP function.
#[derive(Clone)]
pub struct AppState {
    pub users: UserDirectory,
}

impl AppState {
    /// State backed by fresh in-memory stores.
    pub fn in_memory() -> Self {
        Self {
            users: UserDirectory::new(Arc::new(InMemoryStore::<User>::new())),
        }
    }
}

/// Build the full HTTP router (public entrypoint used by `main.rs`).
pub fn build_app(state: AppState, route_prefix: &str) -> Result<Router, RouteError> {
    let functions = routes::dispatcher(state, route_prefix)?.into_router();

    Ok(Router::new()
        .route("/health", get(routes::system::health))
        .merge(functions)
        .layer(ServiceBuilder::new()))
}

#[cfg(test)]
mod tests {
    use axum::body::{to_bytes, Body};
    use axum::http::{Method, Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::*;

    fn app() -> Router {
        build_app(AppState::in_memory(), "api").unwrap()
    }

    async fn call(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let body = match body {
            Some(v) => Body::from(v.to_string()),
            None => Body::empty(),
        };
        let req = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(body)
            .unwrap();

        let res = app.clone().oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    async fn call_raw(app: &Router, method: Method, uri: &str, body: &'static str) -> (StatusCode, Value) {
        let req = Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::from(body))
            .unwrap();
        let res = app.clone().oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn health_is_plain_ok() {
        let (status, body) = call(&app(), Method::GET, "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, Value::Null);
    }

    #[tokio::test]
    async fn hello_uses_query_name() {
        let app = app();
        let (status, body) = call(&app, Method::GET, "/api/hello?name=Ada", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["message"], "Hello, Ada!");
        assert_eq!(body["data"]["method"], "GET");

        let (_, body) = call(&app, Method::GET, "/api/hello", None).await;
        assert_eq!(body["data"]["message"], "Hello, World!");

        let (status, body) = call(&app, Method::POST, "/api/hello", None).await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(body["error"], "Method not allowed");
    }

    #[tokio::test]
    async fn data_requires_name_and_valid_json() {
        let app = app();
        let (status, body) =
            call(&app, Method::POST, "/api/data", Some(json!({"name": "x", "data": [1]}))).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["data"]["message"], "Data received successfully");
        assert_eq!(body["data"]["receivedData"]["data"], json!([1]));
        assert!(body["data"]["processedAt"].is_string());

        for missing in [json!({"data": 1}), json!({"name": false}), json!({"name": 0}), json!("x")] {
            let (status, body) = call(&app, Method::POST, "/api/data", Some(missing)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(body["error"], "Please provide a name in the request body");
        }

        let (status, body) = call_raw(&app, Method::POST, "/api/data", "{not json").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid JSON in request body");
    }

    #[tokio::test]
    async fn items_are_mocked() {
        let app = app();

        let (status, body) = call(&app, Method::GET, "/api/items/7", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["name"], "Item 7");

        let (_, body) = call(&app, Method::GET, "/api/items", None).await;
        assert_eq!(body["data"]["total"], 3);
        assert_eq!(body["data"]["items"].as_array().unwrap().len(), 3);

        let (status, body) =
            call(&app, Method::POST, "/api/items", Some(json!({"name": "Lamp", "price": 12.5}))).await;
        assert_eq!(status, StatusCode::CREATED);
        assert!(body["data"]["id"].as_str().unwrap().starts_with("item_"));
        assert_eq!(body["data"]["price"], 12.5);

        let (status, body) =
            call(&app, Method::PUT, "/api/items/9", Some(json!({"description": "new"}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["id"], "9");
        assert_eq!(body["data"]["description"], "new");
        assert!(body["data"]["updatedAt"].is_string());

        let (status, body) = call(&app, Method::PUT, "/api/items", Some(json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "ID is required for PUT requests");

        let (status, body) = call(&app, Method::DELETE, "/api/items/9", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["message"], "Item 9 deleted successfully");
    }

    #[tokio::test]
    async fn item_post_echoes_every_field() {
        let app = app();

        let (status, body) =
            call(&app, Method::POST, "/api/items", Some(json!({"description": "desk lamp", "color": "red"}))).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["data"]["description"], "desk lamp");
        assert_eq!(body["data"]["color"], "red");
        assert!(body["data"]["id"].as_str().unwrap().starts_with("item_"));
        assert!(body["data"]["createdAt"].is_string());

        let (status, body) = call(&app, Method::POST, "/api/items", Some(json!([1, 2]))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid request body");
    }

    #[tokio::test]
    async fn enqueue_echoes_message() {
        let app = app();
        let (status, body) = call(
            &app,
            Method::POST,
            "/api/enqueue",
            Some(json!({"orderId": "12345", "status": "pending"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["message"], "Message would be enqueued");
        assert_eq!(body["data"]["data"]["orderId"], "12345");

        let (status, body) = call_raw(&app, Method::POST, "/api/enqueue", "oops").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid request body");
    }

    #[tokio::test]
    async fn users_crud_round() {
        let app = app();

        let (status, body) = call(
            &app,
            Method::POST,
            "/api/users",
            Some(json!({"name": "Ada", "email": "ada@example.com"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let id = body["data"]["id"].as_str().unwrap().to_string();

        let (status, body) = call(&app, Method::GET, "/api/users", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"].as_array().unwrap().len(), 1);

        let (status, body) = call(
            &app,
            Method::PUT,
            &format!("/api/users/{id}"),
            Some(json!({"name": "Ada L."})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["name"], "Ada L.");
        assert_eq!(body["data"]["email"], "ada@example.com");

        let (status, _) = call(&app, Method::DELETE, &format!("/api/users/{id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        let (status, body) = call(&app, Method::GET, &format!("/api/users/{id}"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "User not found");
    }

    #[tokio::test]
    async fn put_checks_existence_before_body() {
        let (status, body) = call_raw(&app(), Method::PUT, "/api/users/user_missing", "garbage").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "User not found");
    }

    #[tokio::test]
    async fn malformed_put_body_leaves_user_unchanged() {
        let app = app();
        let (_, body) = call(
            &app,
            Method::POST,
            "/api/users",
            Some(json!({"name": "Ada", "email": "ada@example.com"})),
        )
        .await;
        let id = body["data"]["id"].as_str().unwrap().to_string();

        let (status, body) = call_raw(&app, Method::PUT, &format!("/api/users/{id}"), "garbage").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid request body");

        let (status, body) = call(&app, Method::GET, &format!("/api/users/{id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["name"], "Ada");
        assert!(body["data"].get("updatedAt").is_none());
    }

    #[tokio::test]
    async fn percent_encoded_ids_are_decoded() {
        let app = app();
        let (_, body) = call(
            &app,
            Method::POST,
            "/api/users",
            Some(json!({"name": "Ada", "email": "ada@example.com"})),
        )
        .await;
        let id = body["data"]["id"].as_str().unwrap().to_string();
        let encoded = id.replacen('_', "%5F", 1);

        let (status, body) = call(&app, Method::GET, &format!("/api/users/{encoded}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["id"], id.as_str());
    }

    #[tokio::test]
    async fn missing_user_id_is_400() {
        let app = app();
        for method in [Method::PUT, Method::DELETE] {
            let (status, body) = call(&app, method, "/api/users", Some(json!({}))).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(body["error"], "User ID is required");
        }
    }

    #[tokio::test]
    async fn unknown_routes_are_404_envelopes() {
        let (status, body) = call(&app(), Method::GET, "/api/nope", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "Route not found");
    }

    #[tokio::test]
    async fn custom_prefix_moves_functions() {
        let app = build_app(AppState::in_memory(), "").unwrap();
        let (status, _) = call(&app, Method::GET, "/hello", None).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = call(&app, Method::GET, "/api/hello", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
