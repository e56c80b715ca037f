//! Request inspection helpers.
//!
//! # Responsibilities
//! - Resolve the request ID (propagated header or fresh UUID v4)
//! - Decode the query string into a JSON object
//! - Buffer the request body under a size limit
//!
//! # Design Decisions
//! - Query decoding is last-value-wins on repeated keys
//! - Oversized bodies are rejected before buffering when `Content-Length` says so

use axum::body::{Body, Bytes};
use axum::http::header::CONTENT_LENGTH;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use http_body_util::{BodyExt, LengthLimitError, Limited};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::RpcError;

pub const X_REQUEST_ID: &str = "x-request-id";

/// The inbound request ID, or a freshly generated one.
pub fn request_id(headers: &HeaderMap) -> String {
    headers
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

/// Decode a query string into string-valued fields.
pub fn parse_query(query: Option<&str>) -> Map<String, Value> {
    query
        .map(|q| {
            url::form_urlencoded::parse(q.as_bytes())
                .map(|(k, v)| (k.into_owned(), Value::String(v.into_owned())))
                .collect()
        })
        .unwrap_or_default()
}

/// Buffer the body, failing with `PAYLOAD_TOO_LARGE` beyond `limit` bytes.
pub async fn read_body(head: &Parts, body: Body, limit: usize) -> Result<Bytes, RpcError> {
    let declared = head
        .headers
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok());

    if declared.is_some_and(|len| len > limit) {
        return Err(too_large(limit));
    }

    match Limited::new(body, limit).collect().await {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(err) if err.downcast_ref::<LengthLimitError>().is_some() => Err(too_large(limit)),
        Err(err) => Err(RpcError::bad_request(format!("Failed to read request body: {err}"))),
    }
}

fn too_large(limit: usize) -> RpcError {
    RpcError::payload_too_large(format!("Request body exceeds {limit} bytes"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;
    use serde_json::json;

    #[test]
    fn test_request_id_propagated_or_generated() {
        let mut headers = HeaderMap::new();
        headers.insert(X_REQUEST_ID, "abc-123".parse().unwrap());
        assert_eq!(request_id(&headers), "abc-123");

        let generated = request_id(&HeaderMap::new());
        assert!(Uuid::parse_str(&generated).is_ok());
    }

    #[test]
    fn test_parse_query() {
        let query = parse_query(Some("a=1&b=hello%20world&a=2"));
        assert_eq!(Value::Object(query), json!({ "a": "2", "b": "hello world" }));
        assert!(parse_query(None).is_empty());
        assert!(parse_query(Some("")).is_empty());
    }

    #[tokio::test]
    async fn test_read_body_limits() {
        let (head, body) = Request::builder()
            .method("POST")
            .uri("/x")
            .body(Body::from("0123456789"))
            .unwrap()
            .into_parts();
        let err = read_body(&head, body, 4).await.unwrap_err();
        assert_eq!(err.status(), 413);

        let (head, body) = Request::builder()
            .method("POST")
            .uri("/x")
            .body(Body::from("0123"))
            .unwrap()
            .into_parts();
        assert_eq!(read_body(&head, body, 4).await.unwrap(), Bytes::from_static(b"0123"));
    }

    #[tokio::test]
    async fn test_declared_length_rejected_early() {
        let (head, body) = Request::builder()
            .method("POST")
            .uri("/x")
            .header(CONTENT_LENGTH, "1000000")
            .body(Body::empty())
            .unwrap()
            .into_parts();
        let err = read_body(&head, body, 1024).await.unwrap_err();
        assert_eq!(err.status(), 413);
    }
}
