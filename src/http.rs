//! HTTP utilities for request/response handling and CORS

use base64::{Engine as _, engine::general_purpose};
use lambda_http::{Body, Request, Response};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use crate::error::ApiError;

/// CORS origin header for all responses
pub fn get_cors_origin_header() -> (&'static str, &'static str) {
    ("Access-Control-Allow-Origin", "*")
}

/// Full CORS headers for OPTIONS preflight responses only
pub fn get_cors_preflight_headers() -> Vec<(&'static str, &'static str)> {
    vec![
        ("Access-Control-Allow-Origin", "*"),
        (
            "Access-Control-Allow-Headers",
            "Content-Type,Authorization,X-Amz-Date,X-Api-Key,X-Amz-Security-Token",
        ),
        ("Access-Control-Allow-Methods", "GET,POST,PUT,DELETE,OPTIONS"),
        ("Access-Control-Max-Age", "86400"),
    ]
}

/// Build an error response. The body is always `{"error": message}`.
pub fn error_response(status: u16, message: &str) -> Response<Body> {
    error_response_with(status, json!({ "error": message }))
}

/// Build an error response around a prepared JSON body
pub fn error_response_with(status: u16, body: Value) -> Response<Body> {
    let (key, value) = get_cors_origin_header();
    Response::builder()
        .status(status)
        .header(key, value)
        .header("Content-Type", "application/json")
        .body(body.to_string().into())
        .expect("Couldn't create error response")
}

/// Build a successful response with CORS headers
pub fn success_response(status: u16, body: &str) -> Response<Body> {
    let (key, value) = get_cors_origin_header();
    Response::builder()
        .status(status)
        .header(key, value)
        .header("Content-Type", "application/json")
        .body(body.to_string().into())
        .expect("Couldn't create success response")
}

pub fn json_response(status: u16, body: &Value) -> Response<Body> {
    success_response(status, &body.to_string())
}

/// Handle CORS preflight requests
pub fn handle_options() -> Response<Body> {
    let mut response = Response::builder().status(200);

    for (key, value) in get_cors_preflight_headers() {
        response = response.header(key, value);
    }

    response
        .header("Content-Type", "application/json")
        .body(Body::Empty)
        .expect("Couldn't handle CORS request")
}

/// Strip the API Gateway stage prefix (`/Prod`, `/prod`) if present
pub fn strip_stage_prefix(path: &str) -> &str {
    for prefix in ["/Prod", "/prod"] {
        if let Some(rest) = path.strip_prefix(prefix)
            && (rest.is_empty() || rest.starts_with('/'))
        {
            return if rest.is_empty() { "/" } else { rest };
        }
    }
    path
}

pub fn header_value<'a>(event: &'a Request, name: &str) -> Option<&'a str> {
    event.headers().get(name).and_then(|h| h.to_str().ok())
}

pub fn parse_json_body(body: &Body) -> Result<Value, ApiError> {
    let body_str = match body {
        Body::Empty => "{}",
        Body::Text(s) => s,
        Body::Binary(b) => std::str::from_utf8(b)
            .map_err(|_| ApiError::bad_request("Could not parse request body as UTF-8"))?,
        _ => "{}",
    };
    let body_str = if body_str.trim().is_empty() { "{}" } else { body_str };

    serde_json::from_str(body_str).map_err(|_| ApiError::bad_request("Could not parse request body as JSON"))
}

pub fn get_value_in_json<T>(body: &Value, key: &str) -> Result<T, ApiError>
where
    T: DeserializeOwned,
{
    match body.get(key) {
        Some(Value::Null) | None => Err(ApiError::bad_request(format!("{} is required", key))),
        Some(v) => serde_json::from_value(v.clone())
            .map_err(|_| ApiError::bad_request(format!("{} is not a valid value", key))),
    }
}

/// Non-empty string field, if present
pub fn optional_str(body: &Value, key: &str) -> Option<String> {
    body.get(key)
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Decode an inline image given either as raw base64 or as a data URL.
///
/// Returns the bytes and, for data URLs, the declared content type.
pub fn decode_inline_image(data: &str) -> Result<(Vec<u8>, Option<String>), ApiError> {
    let (content_type, payload) = match data.strip_prefix("data:") {
        // Format: data:image/png;base64,xxxx
        Some(rest) => {
            let (meta, payload) = rest
                .split_once(',')
                .ok_or_else(|| ApiError::bad_request("Could not extract base64 from data URL"))?;
            let content_type = meta.split(';').next().filter(|m| !m.is_empty()).map(str::to_string);
            (content_type, payload)
        }
        None => (None, data),
    };

    let bytes = general_purpose::STANDARD
        .decode(payload.trim())
        .map_err(|e| ApiError::bad_request(format!("Could not decode base64 data: {}", e)))?;
    Ok((bytes, content_type))
}

/// File extension for an image content type, defaulting to `jpg`
pub fn image_extension(content_type: Option<&str>) -> &'static str {
    match content_type.map(|c| c.to_ascii_lowercase()).as_deref() {
        Some("image/png") => "png",
        Some("image/gif") => "gif",
        Some("image/webp") => "webp",
        _ => "jpg",
    }
}
