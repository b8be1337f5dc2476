use std::io::{Cursor, Read};
use std::panic::{self, AssertUnwindSafe};
use std::time::Instant;

use ferrite_classify::ServeError;
use serde_json::{json, Value};
use tiny_http::{Header, Method, Request, Response, StatusCode};
use tracing::{error, info};

use crate::handlers;
use crate::state::SharedState;

// ---------------------------------------------------------------------------
// Request / response values
// ---------------------------------------------------------------------------

/// The parts of an HTTP request the handlers look at, detached from the
/// socket so routing can be exercised without a live server.
#[derive(Debug)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    /// `None` for bodyless responses (CORS preflight).
    pub body: Option<Value>,
}

impl ApiResponse {
    pub fn json(status: u16, body: Value) -> ApiResponse {
        ApiResponse { status, body: Some(body) }
    }

    pub fn error(status: u16, message: impl Into<String>) -> ApiResponse {
        ApiResponse::json(status, json!({ "error": message.into() }))
    }

    pub fn no_content() -> ApiResponse {
        ApiResponse { status: 204, body: None }
    }
}

// ---------------------------------------------------------------------------
// Response helpers
// ---------------------------------------------------------------------------

fn header(name: &str, value: &str) -> Option<Header> {
    Header::from_bytes(name.as_bytes(), value.as_bytes()).ok()
}

/// Headers sent on every response; any origin may call the API.
fn cors_headers(preflight: bool) -> Vec<Header> {
    let mut headers = vec![header("Access-Control-Allow-Origin", "*")];
    if preflight {
        headers.push(header("Access-Control-Allow-Methods", "GET, POST, OPTIONS"));
        headers.push(header("Access-Control-Allow-Headers", "Content-Type"));
        headers.push(header("Access-Control-Max-Age", "86400"));
    }
    headers.into_iter().flatten().collect()
}

pub fn into_http(resp: ApiResponse, preflight: bool) -> Response<Cursor<Vec<u8>>> {
    let mut headers = cors_headers(preflight);
    let bytes = match resp.body {
        Some(body) => {
            headers.extend(header("Content-Type", "application/json"));
            body.to_string().into_bytes()
        }
        None => Vec::new(),
    };
    let len = bytes.len();
    Response::new(StatusCode(resp.status), headers, Cursor::new(bytes), Some(len), None)
}

// ---------------------------------------------------------------------------
// Routing
// ---------------------------------------------------------------------------

/// Picks a handler for `request`. Pure apart from logging and the model load.
pub fn route(request: &ApiRequest, state: &SharedState) -> ApiResponse {
    match (&request.method, request.path.as_str()) {
        (Method::Options, _) => ApiResponse::no_content(),

        (Method::Get, "/health") => handlers::health::handle(state),
        (Method::Post, "/predict") => handlers::predict::handle(request, state),

        (_, "/health") | (_, "/predict") => ApiResponse::error(405, "Method not allowed"),
        _ => ApiResponse::error(404, "Not found"),
    }
}

/// Like `route`, but a panicking handler becomes a 500 instead of a dropped
/// connection.
pub fn route_guarded(request: &ApiRequest, state: &SharedState) -> ApiResponse {
    match panic::catch_unwind(AssertUnwindSafe(|| route(request, state))) {
        Ok(resp) => resp,
        Err(cause) => {
            let detail = cause.downcast_ref::<&str>().map(|s| s.to_string())
                .or_else(|| cause.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "handler panicked".to_owned());
            error!(path = %request.path, panic = %detail, "handler panicked");
            let e = ServeError::Prediction(detail);
            ApiResponse::error(e.status_code(), e.client_message())
        }
    }
}

/// Reads at most `limit` bytes of body; a larger body is rejected whole.
fn read_body(request: &mut Request, limit: usize) -> Result<Vec<u8>, ServeError> {
    let declared = request.body_length();
    read_limited(request.as_reader(), declared, limit)
}

/// Reads `reader` to the end, failing once more than `limit` bytes arrive.
///
/// A `declared` length over the limit is rejected before anything is read;
/// the streamed length is checked too since clients may omit or lie about it.
fn read_limited(reader: impl Read, declared: Option<usize>, limit: usize) -> Result<Vec<u8>, ServeError> {
    if declared.is_some_and(|len| len > limit) {
        return Err(ServeError::PayloadTooLarge { limit });
    }
    let mut body = Vec::new();
    reader
        .take(limit as u64 + 1)
        .read_to_end(&mut body)
        .map_err(|e| ServeError::Validation(format!("cannot read request body: {}", e)))?;
    if body.len() > limit {
        return Err(ServeError::PayloadTooLarge { limit });
    }
    Ok(body)
}

/// Entry point for one connection: reads the request, routes it, responds.
pub fn dispatch(mut request: Request, state: SharedState) {
    let started = Instant::now();
    let method = request.method().clone();
    let url = request.url().to_owned();
    let path = url.split('?').next().unwrap_or("").to_owned();

    let content_type = request.headers().iter()
        .find(|h| h.field.equiv("Content-Type"))
        .map(|h| h.value.as_str().to_owned());

    let preflight = method == Method::Options;
    let response = match read_body(&mut request, state.config.max_upload_bytes) {
        Ok(body) => {
            let api_request = ApiRequest { method: method.clone(), path: path.clone(), content_type, body };
            route_guarded(&api_request, &state)
        }
        Err(e) => handlers::predict::error_response(&e),
    };

    info!(
        method = %method,
        path = %path,
        status = response.status,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "request"
    );

    if let Err(e) = request.respond(into_http(response, preflight)) {
        error!(error = %e, "failed to write response");
    }
}
