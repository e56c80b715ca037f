//! Response descriptors and their fluent builder.
//!
//! # Responsibilities
//! - Describe a response (status, headers, body) as an immutable value
//! - Derive variations without touching the original (`base.status(201)`)
//! - Materialize the descriptor into an `http::Response`
//!
//! # Design Decisions
//! - Every mutator clones; no header map is ever shared between descriptors
//! - Header keys compare case-insensitively; the latest value wins
//! - Header values are stringified on insertion
//! - Invalid statuses and headers are logged and dropped at materialization

use std::fmt::Display;

use axum::body::{Body, Bytes};
use axum::http::{header, HeaderName, HeaderValue, Response, StatusCode};
use axum::response::IntoResponse;
use serde::Serialize;

use crate::error::RpcError;

pub const APPLICATION_JSON: &str = "application/json";
pub const TEXT_PLAIN: &str = "text/plain; charset=utf-8";

/// Default status for `redirect`.
pub const TEMPORARY_REDIRECT: u16 = 307;

/// Response payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseBody {
    Text(String),
    Bytes(Bytes),
}

impl ResponseBody {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            ResponseBody::Text(text) => text.as_bytes(),
            ResponseBody::Bytes(bytes) => bytes,
        }
    }
}

impl From<String> for ResponseBody {
    fn from(text: String) -> Self {
        ResponseBody::Text(text)
    }
}

impl From<&str> for ResponseBody {
    fn from(text: &str) -> Self {
        ResponseBody::Text(text.to_string())
    }
}

impl From<Bytes> for ResponseBody {
    fn from(bytes: Bytes) -> Self {
        ResponseBody::Bytes(bytes)
    }
}

impl From<Vec<u8>> for ResponseBody {
    fn from(bytes: Vec<u8>) -> Self {
        ResponseBody::Bytes(Bytes::from(bytes))
    }
}

/// Start a descriptor with the given status.
pub fn status(code: u16) -> ResponseDescriptor {
    ResponseDescriptor::new(code)
}

/// An immutable HTTP response description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseDescriptor {
    status: u16,
    headers: Vec<(String, String)>,
    body: Option<ResponseBody>,
}

impl ResponseDescriptor {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn status(&self, code: u16) -> Self {
        self.update(|next| next.status = code)
    }

    pub fn header(&self, key: impl Into<String>, value: impl Display) -> Self {
        let key = key.into();
        let value = value.to_string();
        self.update(|next| next.set_header(key, value))
    }

    /// Set several headers at once.
    pub fn headers<I, K, V>(&self, headers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Display,
    {
        self.update(|next| {
            for (key, value) in headers {
                next.set_header(key.into(), value.to_string());
            }
        })
    }

    pub fn remove_header(&self, key: &str) -> Self {
        self.update(|next| next.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(key)))
    }

    /// Set the body and its `Content-Type`.
    pub fn body(&self, content: impl Into<ResponseBody>, content_type: impl Display) -> Self {
        let content = content.into();
        self.header(header::CONTENT_TYPE.as_str(), content_type)
            .update(|next| next.body = Some(content))
    }

    /// Set the body without touching `Content-Type`.
    pub fn raw_body(&self, content: impl Into<ResponseBody>) -> Self {
        let content = content.into();
        self.update(|next| next.body = Some(content))
    }

    /// Serialize `value` as the JSON body.
    pub fn json<T: Serialize + ?Sized>(&self, value: &T) -> Result<Self, RpcError> {
        let encoded = serde_json::to_string(value)
            .map_err(|e| RpcError::internal(format!("failed to serialize response body: {e}")))?;
        Ok(self.body(encoded, APPLICATION_JSON))
    }

    pub fn redirect_to(&self, location: impl Display, code: u16) -> Self {
        self.header(header::LOCATION.as_str(), location).status(code)
    }

    pub fn redirect(&self, location: impl Display) -> Self {
        self.redirect_to(location, TEMPORARY_REDIRECT)
    }

    pub fn status_code(&self) -> u16 {
        self.status
    }

    pub fn header_value(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    pub fn header_entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.headers.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn body_ref(&self) -> Option<&ResponseBody> {
        self.body.as_ref()
    }

    /// Materialize into a transport response.
    pub fn to_response(&self) -> Response<Body> {
        self.clone().into_response()
    }

    fn update(&self, apply: impl FnOnce(&mut Self)) -> Self {
        let mut next = self.clone();
        apply(&mut next);
        next
    }

    fn set_header(&mut self, key: String, value: String) {
        match self.headers.iter_mut().find(|(k, _)| k.eq_ignore_ascii_case(&key)) {
            Some(slot) => *slot = (key, value),
            None => self.headers.push((key, value)),
        }
    }
}

impl IntoResponse for ResponseDescriptor {
    fn into_response(self) -> axum::response::Response {
        let status = match StatusCode::from_u16(self.status) {
            Ok(code) if (100..=599).contains(&self.status) => code,
            _ => {
                tracing::warn!(status = self.status, "Invalid response status, using 500");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = match self.body {
            Some(ResponseBody::Text(text)) => Body::from(text),
            Some(ResponseBody::Bytes(bytes)) => Body::from(bytes),
            None => Body::empty(),
        };

        let mut response = Response::new(body);
        *response.status_mut() = status;

        for (key, value) in self.headers {
            match (
                HeaderName::from_bytes(key.as_bytes()),
                HeaderValue::from_str(&value),
            ) {
                (Ok(name), Ok(value)) => {
                    response.headers_mut().insert(name, value);
                }
                _ => tracing::warn!(header = %key, "Skipping invalid response header"),
            }
        }

        response
    }
}
