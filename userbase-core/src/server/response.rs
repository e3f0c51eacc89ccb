//! Response builders

use bytes::Bytes;
use http_body_util::Full;
use hyper::header::{HeaderValue, ALLOW, CONTENT_TYPE, LOCATION};
use hyper::{Response, StatusCode};
use serde::Serialize;
use tracing::error;

use crate::domain::result::Error;

pub type HttpResponse = Response<Full<Bytes>>;

/// Methods accepted on `/users`
pub const USERS_ALLOW: &str = "GET, POST, PUT, DELETE";

fn with_body(status: StatusCode, content_type: &'static str, body: Bytes) -> HttpResponse {
    let mut response = Response::new(Full::new(body));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    response
}

/// Plain-text response
pub fn text(status: StatusCode, body: &str) -> HttpResponse {
    with_body(
        status,
        "text/plain; charset=utf-8",
        Bytes::copy_from_slice(body.as_bytes()),
    )
}

/// JSON response; serialization failures become a 500
pub fn json<T: Serialize>(status: StatusCode, value: &T) -> HttpResponse {
    match serde_json::to_vec(value) {
        Ok(body) => with_body(status, "application/json", Bytes::from(body)),
        Err(e) => {
            error!("Failed to serialize response: {}", e);
            text(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
        }
    }
}

/// 201 with a Location header pointing at the new record
pub fn created<T: Serialize>(value: &T, location: &str) -> HttpResponse {
    let mut response = json(StatusCode::CREATED, value);
    if let Ok(location) = HeaderValue::from_str(location) {
        response.headers_mut().insert(LOCATION, location);
    }
    response
}

pub fn no_content() -> HttpResponse {
    let mut response = Response::new(Full::new(Bytes::new()));
    *response.status_mut() = StatusCode::NO_CONTENT;
    response
}

pub fn not_found() -> HttpResponse {
    text(StatusCode::NOT_FOUND, "Not found")
}

pub fn method_not_allowed() -> HttpResponse {
    let mut response = text(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed");
    response
        .headers_mut()
        .insert(ALLOW, HeaderValue::from_static(USERS_ALLOW));
    response
}

pub fn bad_request(message: &str) -> HttpResponse {
    error_body(StatusCode::BAD_REQUEST, message)
}

/// JSON `{ "error": message }`
pub fn error_body(status: StatusCode, message: &str) -> HttpResponse {
    json(status, &serde_json::json!({ "error": message }))
}

/// Status code a domain error maps to
pub fn status_for(err: &Error) -> StatusCode {
    match err {
        Error::Validation(_) | Error::Json(_) => StatusCode::BAD_REQUEST,
        Error::NotFound(_) => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Render a domain error; internal details stay out of 500 bodies
pub fn from_error(err: &Error) -> HttpResponse {
    let status = status_for(err);
    if status == StatusCode::INTERNAL_SERVER_ERROR {
        error_body(status, "Internal server error")
    } else {
        error_body(status, &err.to_string())
    }
}
