//! Middleware for logging requests and responses.

use axum::{
    body::Body,
    extract::Request,
    http::{HeaderMap, HeaderValue, StatusCode, header::AUTHORIZATION},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::Value;

/// Bodies longer than this many characters are truncated in `info` logs.
pub const LOG_BODY_LENGTH_LIMIT: usize = 64;

const REDACTED: &str = "********";
const SECRET_FIELDS: [&str; 2] = ["password", "accessToken"];

/// Log the request and response for each request.
///
/// Both the request and response are logged at the `info` level. Passwords
/// and access tokens in JSON bodies are redacted, and the `authorization`
/// header is never logged. If a body is longer than [LOG_BODY_LENGTH_LIMIT]
/// characters, it is truncated and logged in full at the `debug` level.
pub async fn logging_middleware(request: Request, next: Next) -> Response {
    let (parts, body) = request.into_parts();
    let body_text = match read_body(body).await {
        Ok(body_text) => body_text,
        Err(error) => {
            tracing::warn!("could not read request body: {error}");
            return StatusCode::BAD_REQUEST.into_response();
        }
    };

    log_body(
        &format!("Received request: {} {}", parts.method, parts.uri),
        &parts.headers,
        &redact_secrets(&body_text),
    );

    let request = Request::from_parts(parts, body_text.into());
    let response = next.run(request).await;

    let (parts, body) = response.into_parts();
    let body_text = match read_body(body).await {
        Ok(body_text) => body_text,
        Err(error) => {
            tracing::error!("could not read response body: {error}");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    log_body(
        &format!("Sending response: {}", parts.status),
        &parts.headers,
        &redact_secrets(&body_text),
    );

    Response::from_parts(parts, body_text.into())
}

async fn read_body(body: Body) -> Result<String, axum::Error> {
    let body_bytes = axum::body::to_bytes(body, usize::MAX).await?;

    Ok(String::from_utf8_lossy(&body_bytes).to_string())
}

/// Replace the values of secret fields in a JSON object body.
///
/// Bodies that are not JSON objects are returned unchanged.
fn redact_secrets(body_text: &str) -> String {
    let Ok(Value::Object(mut object)) = serde_json::from_str::<Value>(body_text) else {
        return body_text.to_owned();
    };

    let mut redacted = false;
    for field in SECRET_FIELDS {
        if let Some(value) = object.get_mut(field) {
            *value = Value::String(REDACTED.to_owned());
            redacted = true;
        }
    }

    if redacted {
        Value::Object(object).to_string()
    } else {
        body_text.to_owned()
    }
}

fn loggable_headers(headers: &HeaderMap) -> HeaderMap {
    let mut headers = headers.clone();

    if headers.contains_key(AUTHORIZATION) {
        headers.insert(AUTHORIZATION, HeaderValue::from_static(REDACTED));
    }

    headers
}

fn log_body(summary: &str, headers: &HeaderMap, body: &str) {
    let headers = loggable_headers(headers);

    match body.char_indices().nth(LOG_BODY_LENGTH_LIMIT) {
        Some((cutoff, _)) => {
            tracing::info!("{summary}\nheaders: {headers:#?}\nbody: {}...", &body[..cutoff]);
            tracing::debug!("Full body: {body:?}");
        }
        None => tracing::info!("{summary}\nheaders: {headers:#?}\nbody: {body:?}"),
    }
}
