//! HTTP route handlers
//!
//! Each module owns one slice of the API surface. Shared response and
//! body helpers live here.

pub mod auth_routes;
pub mod billing_routes;
pub mod coprocess_routes;
pub mod feed_routes;
pub mod health;
pub mod mentor_routes;
pub mod messaging_routes;
pub mod moderation_routes;
pub mod process_routes;
pub mod profile_routes;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::{Request, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::auth::extract_token_from_header;
use crate::error::{AtelierError, Result};
use crate::server::AppState;

pub type BoxBody = http_body_util::combinators::BoxBody<Bytes, hyper::Error>;

const MAX_BODY_BYTES: usize = 65536;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

pub fn full_body(data: impl Into<Bytes>) -> BoxBody {
    Full::new(data.into())
        .map_err(|never| match never {})
        .boxed()
}

pub fn empty_body() -> BoxBody {
    Full::new(Bytes::new())
        .map_err(|never| match never {})
        .boxed()
}

pub fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<BoxBody> {
    let json = serde_json::to_string(body).unwrap_or_else(|_| "{}".to_string());

    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", "*")
        .header("Access-Control-Allow-Methods", "GET, POST, PATCH, DELETE, OPTIONS")
        .header("Access-Control-Allow-Headers", "Content-Type, Authorization")
        .body(full_body(json))
        .unwrap_or_else(|_| Response::new(empty_body()))
}

/// Map an error to its wire shape.
pub fn error_response(err: &AtelierError) -> Response<BoxBody> {
    json_response(
        err.status(),
        &ErrorResponse {
            error: err.to_string(),
        },
    )
}

pub fn cors_preflight() -> Response<BoxBody> {
    Response::builder()
        .status(StatusCode::NO_CONTENT)
        .header("Access-Control-Allow-Origin", "*")
        .header("Access-Control-Allow-Methods", "GET, POST, PATCH, DELETE, OPTIONS")
        .header("Access-Control-Allow-Headers", "Content-Type, Authorization")
        .header("Access-Control-Max-Age", "86400")
        .body(empty_body())
        .unwrap_or_else(|_| Response::new(empty_body()))
}

pub fn not_found(path: &str) -> Response<BoxBody> {
    json_response(
        StatusCode::NOT_FOUND,
        &serde_json::json!({ "error": "Not Found", "path": path }),
    )
}

pub async fn parse_json_body<T: for<'de> Deserialize<'de>>(req: Request<Incoming>) -> Result<T> {
    let body = req
        .collect()
        .await
        .map_err(|e| AtelierError::Http(format!("Failed to read body: {}", e)))?;

    let bytes = body.to_bytes();
    if bytes.len() > MAX_BODY_BYTES {
        return Err(AtelierError::Http("Request body too large".into()));
    }

    serde_json::from_slice(&bytes).map_err(|e| AtelierError::Http(format!("Invalid JSON: {}", e)))
}

/// Collect the raw body without parsing, for signature verification.
pub async fn read_raw_body(req: Request<Incoming>) -> Result<Bytes> {
    let body = req
        .collect()
        .await
        .map_err(|e| AtelierError::Http(format!("Failed to read body: {}", e)))?;
    Ok(body.to_bytes())
}

pub fn get_auth_header(req: &Request<Incoming>) -> Option<&str> {
    req.headers()
        .get(hyper::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
}

/// Resolve the authenticated account id, or Unauthorized.
pub fn authenticate(state: &Arc<AppState>, req: &Request<Incoming>) -> Result<String> {
    let header = get_auth_header(req)
        .ok_or_else(|| AtelierError::Unauthorized("Missing Authorization header".into()))?;
    let token = extract_token_from_header(header)
        .ok_or_else(|| AtelierError::Unauthorized("Malformed Authorization header".into()))?;
    let claims = state.jwt.validate(token)?;
    Ok(claims.sub)
}

/// Resolve the account id when a token is present and valid; anonymous
/// callers get None instead of an error.
pub fn maybe_authenticate(state: &Arc<AppState>, req: &Request<Incoming>) -> Option<String> {
    authenticate(state, req).ok()
}

/// Single query parameter, form-decoded (`+` for space, then percent
/// escapes).
pub fn query_param(req: &Request<Incoming>, name: &str) -> Option<String> {
    find_query_param(req.uri().query()?, name)
}

fn find_query_param(query: &str, name: &str) -> Option<String> {
    for pair in query.split('&') {
        if let Some((key, value)) = pair.split_once('=') {
            if key == name {
                let value = value.replace('+', " ");
                return Some(urlencoding::decode(&value).unwrap_or_default().into_owned());
            }
        }
    }
    None
}

/// Comma-separated list parameter, empty when absent.
pub fn query_list(req: &Request<Incoming>, name: &str) -> Vec<String> {
    query_param(req, name)
        .map(|v| {
            v.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_values_are_form_decoded() {
        assert_eq!(
            find_query_param("q=%C3%A9cole", "q").as_deref(),
            Some("école")
        );
        assert_eq!(
            find_query_param("view=following&q=night+pages", "q").as_deref(),
            Some("night pages")
        );
        // An encoded plus survives the space substitution
        assert_eq!(find_query_param("q=a%2Bb", "q").as_deref(), Some("a+b"));
    }

    #[test]
    fn missing_and_valueless_params_are_none() {
        assert_eq!(find_query_param("view=following", "q"), None);
        assert_eq!(find_query_param("refresh&q=x", "refresh"), None);
        assert_eq!(find_query_param("q=x", "refresh"), None);
    }
}
