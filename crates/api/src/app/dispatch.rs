//! Function-style routing: one handler per (route template, method).
//!
//! A template is a `/`-separated list of literal segments that may end in a
//! single parameter, `{id}` (required) or `{id?}` (optional). Every template is
//! matched below the dispatcher's prefix (`api` by default).

use std::borrow::Cow;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::Query;
use axum::http::{Method, StatusCode, Uri};
use axum::response::Response;
use axum::Router;
use percent_encoding::percent_decode_str;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::debug;

use fnapp_core::{ApiError, ApiResult};

use super::errors;

/// Template registration failure.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RouteError {
    #[error("route template is empty")]
    Empty,

    #[error("malformed segment '{segment}' in route '{template}'")]
    MalformedSegment { template: String, segment: String },

    #[error("parameter must be the last segment of route '{0}'")]
    ParamNotTrailing(String),

    #[error("route '{0}' overlaps an existing route")]
    Duplicate(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Param {
    name: String,
    optional: bool,
}

/// Parsed route template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteTemplate {
    raw: String,
    literals: Vec<String>,
    param: Option<Param>,
}

impl RouteTemplate {
    pub fn parse(template: &str) -> Result<Self, RouteError> {
        let raw = template.trim().trim_matches('/');
        if raw.is_empty() {
            return Err(RouteError::Empty);
        }

        let malformed = |segment: &str| RouteError::MalformedSegment {
            template: raw.to_string(),
            segment: segment.to_string(),
        };

        let mut literals = Vec::new();
        let mut param = None;
        for segment in raw.split('/') {
            if param.is_some() {
                return Err(RouteError::ParamNotTrailing(raw.to_string()));
            }
            if let Some(inner) = segment.strip_prefix('{') {
                let inner = inner.strip_suffix('}').ok_or_else(|| malformed(segment))?;
                let (name, optional) = match inner.strip_suffix('?') {
                    Some(name) => (name, true),
                    None => (inner, false),
                };
                if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
                    return Err(malformed(segment));
                }
                param = Some(Param {
                    name: name.to_string(),
                    optional,
                });
            } else if segment.is_empty() || segment.contains(['{', '}']) {
                return Err(malformed(segment));
            } else {
                literals.push(segment.to_string());
            }
        }

        Ok(Self {
            raw: raw.to_string(),
            literals,
            param,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Match path segments, returning the captured parameter if any.
    pub fn matches(&self, segments: &[&str]) -> Option<HashMap<String, String>> {
        let n = self.literals.len();
        if segments.len() < n || !self.literals.iter().zip(segments).all(|(l, s)| l == s) {
            return None;
        }

        match (&self.param, &segments[n..]) {
            (None, []) => Some(HashMap::new()),
            (Some(p), []) if p.optional => Some(HashMap::new()),
            (Some(p), [value]) => Some(HashMap::from([(p.name.clone(), (*value).to_string())])),
            _ => None,
        }
    }

    /// Segment counts this template accepts.
    fn arities(&self) -> Vec<usize> {
        let n = self.literals.len();
        match &self.param {
            None => vec![n],
            Some(p) if p.optional => vec![n, n + 1],
            Some(_) => vec![n + 1],
        }
    }

    fn overlaps(&self, other: &Self) -> bool {
        self.literals == other.literals
            && self.arities().iter().any(|a| other.arities().contains(a))
    }
}

/// Everything a handler sees of one request.
#[derive(Debug, Clone)]
pub struct RouteRequest {
    pub method: Method,
    pub params: HashMap<String, String>,
    pub query: HashMap<String, String>,
    pub body: Bytes,
}

impl RouteRequest {
    /// Path parameter; an empty value counts as absent.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str).filter(|v| !v.is_empty())
    }

    pub fn query(&self, name: &str) -> Option<&str> {
        self.query.get(name).map(String::as_str)
    }

    /// Decode the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> ApiResult<T> {
        serde_json::from_slice(&self.body).map_err(ApiError::from)
    }
}

type BoxFuture = Pin<Box<dyn Future<Output = ApiResult<Response>> + Send>>;
type Handler<S> = Arc<dyn Fn(S, RouteRequest) -> BoxFuture + Send + Sync>;

/// Handlers for one route, keyed by method.
pub struct Methods<S> {
    handlers: Vec<(Method, Handler<S>)>,
}

impl<S> Default for Methods<S> {
    fn default() -> Self {
        Self {
            handlers: Vec::new(),
        }
    }
}

impl<S> Clone for Methods<S> {
    fn clone(&self) -> Self {
        Self {
            handlers: self.handlers.clone(),
        }
    }
}

impl<S: Send + 'static> Methods<S> {
    pub fn on<F, Fut>(mut self, method: Method, handler: F) -> Self
    where
        F: Fn(S, RouteRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ApiResult<Response>> + Send + 'static,
    {
        let boxed: Handler<S> = Arc::new(move |state: S, req: RouteRequest| -> BoxFuture {
            Box::pin(handler(state, req))
        });
        self.handlers.retain(|(m, _)| *m != method);
        self.handlers.push((method, boxed));
        self
    }

    pub fn get<F, Fut>(self, handler: F) -> Self
    where
        F: Fn(S, RouteRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ApiResult<Response>> + Send + 'static,
    {
        self.on(Method::GET, handler)
    }

    pub fn post<F, Fut>(self, handler: F) -> Self
    where
        F: Fn(S, RouteRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ApiResult<Response>> + Send + 'static,
    {
        self.on(Method::POST, handler)
    }

    pub fn put<F, Fut>(self, handler: F) -> Self
    where
        F: Fn(S, RouteRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ApiResult<Response>> + Send + 'static,
    {
        self.on(Method::PUT, handler)
    }

    pub fn delete<F, Fut>(self, handler: F) -> Self
    where
        F: Fn(S, RouteRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ApiResult<Response>> + Send + 'static,
    {
        self.on(Method::DELETE, handler)
    }

    fn handler(&self, method: &Method) -> Option<&Handler<S>> {
        self.handlers.iter().find(|(m, _)| m == method).map(|(_, h)| h)
    }
}

struct Route<S> {
    template: RouteTemplate,
    methods: Methods<S>,
}

/// Routes requests to handlers by path template and method.
pub struct Dispatcher<S> {
    state: S,
    prefix: Vec<String>,
    routes: Vec<Route<S>>,
}

impl<S: Clone + Send + Sync + 'static> Dispatcher<S> {
    pub fn new(state: S) -> Self {
        Self {
            state,
            prefix: Vec::new(),
            routes: Vec::new(),
        }
    }

    /// Path prefix for every route; `""` removes it.
    pub fn with_prefix(mut self, prefix: &str) -> Self {
        self.prefix = prefix
            .split('/')
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        self
    }

    pub fn route(mut self, template: &str, methods: Methods<S>) -> Result<Self, RouteError> {
        let template = RouteTemplate::parse(template)?;
        if self.routes.iter().any(|r| r.template.overlaps(&template)) {
            return Err(RouteError::Duplicate(template.raw));
        }
        self.routes.push(Route { template, methods });
        Ok(self)
    }

    /// Run the handler for `method` on `path`.
    pub async fn dispatch(
        &self,
        method: Method,
        path: &str,
        query: HashMap<String, String>,
        body: Bytes,
    ) -> Response {
        let decoded: Vec<Cow<'_, str>> = path
            .split('/')
            .filter(|s| !s.is_empty())
            .map(|s| percent_decode_str(s).decode_utf8_lossy())
            .collect();
        let segments: Vec<&str> = decoded.iter().map(|s| s.as_ref()).collect();

        let Some(rest) = strip_prefix(&segments, &self.prefix) else {
            return route_not_found(&method, path);
        };

        // Prefer the route with the most literal segments.
        let matched = self
            .routes
            .iter()
            .filter_map(|r| r.template.matches(rest).map(|params| (r, params)))
            .max_by_key(|(r, _)| r.template.literals.len());

        let Some((route, params)) = matched else {
            return route_not_found(&method, path);
        };

        let Some(handler) = route.methods.handler(&method) else {
            debug!(route = %route.template.as_str(), method = %method, "method not allowed");
            return errors::api_error_to_response(ApiError::MethodNotAllowed);
        };

        debug!(route = %route.template.as_str(), method = %method, "dispatching request");
        let req = RouteRequest {
            method,
            params,
            query,
            body,
        };
        match handler(self.state.clone(), req).await {
            Ok(res) => res,
            Err(err) => errors::api_error_to_response(err),
        }
    }

    /// Mount the dispatcher as the router's fallback so unmatched paths still get an envelope.
    pub fn into_router(self) -> Router {
        let dispatcher = Arc::new(self);
        Router::new().fallback(move |method: Method, uri: Uri, body: Bytes| {
            let dispatcher = dispatcher.clone();
            async move {
                let query = Query::<HashMap<String, String>>::try_from_uri(&uri)
                    .map(|Query(q)| q)
                    .unwrap_or_default();
                dispatcher.dispatch(method, uri.path(), query, body).await
            }
        })
    }
}

fn strip_prefix<'a, 'b>(segments: &'a [&'b str], prefix: &[String]) -> Option<&'a [&'b str]> {
    if segments.len() < prefix.len() || !prefix.iter().zip(segments).all(|(p, s)| p == s) {
        return None;
    }
    Some(&segments[prefix.len()..])
}

fn route_not_found(method: &Method, path: &str) -> Response {
    debug!(method = %method, path, "no route matched");
    errors::json_error(StatusCode::NOT_FOUND, "Route not found")
}
