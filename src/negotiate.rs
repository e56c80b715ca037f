//! Content negotiation for request bodies.
//!
//! # Responsibilities
//! - Decide, from the declared media type, how a body is parsed
//! - Keep caller-supplied parsers ahead of the built-in ones
//! - Optionally reject bodies no parser understands (strict mode)
//!
//! # Design Decisions
//! - First matching parser wins
//! - No match means "no body contribution", not an error, unless strict
//! - Parsers see the fully buffered body; reading is the resolver's job

use std::fmt;
use std::sync::Arc;

use axum::body::Bytes;
use axum::http::header::CONTENT_TYPE;
use axum::http::request::Parts;
use serde_json::{Map, Value};

use crate::error::RpcError;

/// A strategy for recognizing and parsing a request body.
pub trait ContentParser: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Returns true if this parser handles the request's body.
    fn is_match(&self, head: &Parts) -> bool;

    /// Parse the body. `Ok(None)` means the body contributes nothing.
    fn parse(&self, head: &Parts, body: Bytes) -> Result<Option<Value>, RpcError>;
}

/// The request's `Content-Type`, if present and readable.
pub fn content_type(head: &Parts) -> Option<&str> {
    head.headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok())
}

fn media_type_is(head: &Parts, expected: &str) -> bool {
    content_type(head)
        .map(|ct| ct.trim_start().to_ascii_lowercase().starts_with(expected))
        .unwrap_or(false)
}

/// `application/json` bodies, parsed as JSON.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonParser;

impl ContentParser for JsonParser {
    fn name(&self) -> &str {
        "json"
    }

    fn is_match(&self, head: &Parts) -> bool {
        media_type_is(head, "application/json")
    }

    fn parse(&self, _head: &Parts, body: Bytes) -> Result<Option<Value>, RpcError> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(None);
        }
        serde_json::from_slice(&body)
            .map(Some)
            .map_err(|e| RpcError::bad_request(format!("Invalid JSON body: {e}")))
    }
}

/// `text/plain` bodies, passed through as a string.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextPlainParser;

impl ContentParser for TextPlainParser {
    fn name(&self) -> &str {
        "text"
    }

    fn is_match(&self, head: &Parts) -> bool {
        media_type_is(head, "text/plain")
    }

    fn parse(&self, _head: &Parts, body: Bytes) -> Result<Option<Value>, RpcError> {
        if body.is_empty() {
            return Ok(None);
        }
        String::from_utf8(body.to_vec())
            .map(|text| Some(Value::String(text)))
            .map_err(|_| RpcError::bad_request("Text body is not valid UTF-8"))
    }
}

/// `application/x-www-form-urlencoded` bodies, parsed into an object.
/// Not enabled by default.
#[derive(Debug, Clone, Copy, Default)]
pub struct FormUrlEncodedParser;

impl ContentParser for FormUrlEncodedParser {
    fn name(&self) -> &str {
        "form"
    }

    fn is_match(&self, head: &Parts) -> bool {
        media_type_is(head, "application/x-www-form-urlencoded")
    }

    fn parse(&self, _head: &Parts, body: Bytes) -> Result<Option<Value>, RpcError> {
        if body.is_empty() {
            return Ok(None);
        }
        let fields: Map<String, Value> = url::form_urlencoded::parse(&body)
            .map(|(k, v)| (k.into_owned(), Value::String(v.into_owned())))
            .collect();
        Ok(Some(Value::Object(fields)))
    }
}

/// The built-in parsers, in priority order.
pub fn default_parsers() -> Vec<Arc<dyn ContentParser>> {
    vec![Arc::new(JsonParser), Arc::new(TextPlainParser)]
}

/// Ordered parser list used by the resolver.
#[derive(Clone)]
pub struct Negotiator {
    parsers: Vec<Arc<dyn ContentParser>>,
    strict: bool,
}

impl Negotiator {
    /// Caller parsers first, then the defaults.
    pub fn new(custom: Vec<Arc<dyn ContentParser>>, strict: bool) -> Self {
        let mut parsers = custom;
        parsers.extend(default_parsers());
        Self { parsers, strict }
    }

    pub fn select(&self, head: &Parts) -> Option<&dyn ContentParser> {
        self.parsers
            .iter()
            .find(|parser| parser.is_match(head))
            .map(|parser| parser.as_ref())
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }
}

impl Default for Negotiator {
    fn default() -> Self {
        Self::new(Vec::new(), false)
    }
}

impl fmt::Debug for Negotiator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.parsers.iter().map(|p| p.name()).collect();
        f.debug_struct("Negotiator")
            .field("parsers", &names)
            .field("strict", &self.strict)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;
    use serde_json::json;

    fn head(content_type: Option<&str>) -> Parts {
        let mut builder = Request::builder().method("POST").uri("/x");
        if let Some(ct) = content_type {
            builder = builder.header(CONTENT_TYPE, ct);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn test_json_matching() {
        assert!(JsonParser.is_match(&head(Some("application/json"))));
        assert!(JsonParser.is_match(&head(Some("Application/JSON; charset=utf-8"))));
        assert!(!JsonParser.is_match(&head(Some("text/plain"))));
        assert!(!JsonParser.is_match(&head(None)));
    }

    #[test]
    fn test_json_parse() {
        let h = head(Some("application/json"));
        assert_eq!(
            JsonParser.parse(&h, Bytes::from_static(b"{\"a\":1}")).unwrap(),
            Some(json!({ "a": 1 }))
        );
        assert_eq!(JsonParser.parse(&h, Bytes::new()).unwrap(), None);

        let err = JsonParser.parse(&h, Bytes::from_static(b"{oops")).unwrap_err();
        assert_eq!(err.status(), 400);
    }

    #[test]
    fn test_text_parse() {
        let h = head(Some("text/plain"));
        assert_eq!(
            TextPlainParser.parse(&h, Bytes::from_static(b"hello")).unwrap(),
            Some(json!("hello"))
        );
        assert_eq!(TextPlainParser.parse(&h, Bytes::new()).unwrap(), None);
        assert!(TextPlainParser
            .parse(&h, Bytes::from_static(&[0xff, 0xfe]))
            .is_err());
    }

    #[test]
    fn test_form_parse_last_value_wins() {
        let h = head(Some("application/x-www-form-urlencoded"));
        let parsed = FormUrlEncodedParser
            .parse(&h, Bytes::from_static(b"a=1&b=two+words&a=3"))
            .unwrap();
        assert_eq!(parsed, Some(json!({ "a": "3", "b": "two words" })));
    }

    struct Everything;

    impl ContentParser for Everything {
        fn name(&self) -> &str {
            "everything"
        }

        fn is_match(&self, _head: &Parts) -> bool {
            true
        }

        fn parse(&self, _head: &Parts, _body: Bytes) -> Result<Option<Value>, RpcError> {
            Ok(Some(json!("custom")))
        }
    }

    #[test]
    fn test_custom_parsers_take_priority() {
        let negotiator = Negotiator::new(vec![Arc::new(Everything)], false);
        let selected = negotiator.select(&head(Some("application/json"))).unwrap();
        assert_eq!(selected.name(), "everything");

        let defaults = Negotiator::default();
        assert_eq!(defaults.select(&head(Some("application/json"))).unwrap().name(), "json");
        assert!(defaults.select(&head(Some("image/png"))).is_none());
    }
}
