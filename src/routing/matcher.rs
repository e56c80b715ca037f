//! Path pattern compilation and matching helpers.
//!
//! # Responsibilities
//! - Normalize paths (single leading slash, no duplicate or trailing slashes)
//! - Translate `:name` patterns into the matcher's `{name}` syntax
//! - Recover parameter values from the original-case request path
//!
//! # Design Decisions
//! - Matching is case-insensitive: static segments are registered lowercased
//!   and lookups are lowercased, but captured values keep their original case
//! - Parameters always span exactly one segment
//! - Captured values are percent-decoded

use std::collections::{BTreeMap, HashSet};

/// Path parameters captured for one request.
pub type Params = BTreeMap<String, String>;

/// Collapse duplicate slashes and strip the trailing slash.
pub fn normalize_path(path: &str) -> String {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    format!("/{}", segments.join("/"))
}

/// Check that every `:name` segment is well formed and unique.
pub fn validate_pattern(path: &str) -> Result<(), String> {
    let mut seen = HashSet::new();
    for segment in path.split('/').filter(|s| !s.is_empty()) {
        if segment.contains(['{', '}']) {
            return Err(format!("segment `{segment}` contains a reserved brace"));
        }
        if let Some(name) = segment.strip_prefix(':') {
            if name.is_empty() {
                return Err("path parameter without a name".to_string());
            }
            if !seen.insert(name) {
                return Err(format!("path parameter `{name}` declared twice"));
            }
        }
    }
    Ok(())
}

/// A compiled route pattern.
#[derive(Debug, Clone)]
pub struct PathPattern {
    /// Matcher syntax, lowercased static segments, e.g. `/echo/{name}`.
    route: String,
    /// Pattern with parameter names erased, e.g. `/echo/:`; two patterns
    /// with the same shape always match the same requests.
    shape: String,
    /// Segment index and name of each parameter.
    params: Vec<(usize, String)>,
}

impl PathPattern {
    /// Compile a normalized `:name` pattern.
    pub fn parse(path: &str) -> Result<Self, String> {
        validate_pattern(path)?;

        let mut route = String::new();
        let mut shape = String::new();
        let mut params = Vec::new();

        for (index, segment) in path.split('/').filter(|s| !s.is_empty()).enumerate() {
            route.push('/');
            shape.push('/');
            match segment.strip_prefix(':') {
                Some(name) => {
                    route.push('{');
                    route.push_str(name);
                    route.push('}');
                    shape.push(':');
                    params.push((index, name.to_string()));
                }
                None => {
                    let lowered = segment.to_lowercase();
                    route.push_str(&lowered);
                    shape.push_str(&lowered);
                }
            }
        }

        if route.is_empty() {
            route.push('/');
            shape.push('/');
        }

        Ok(Self { route, shape, params })
    }

    pub fn route(&self) -> &str {
        &self.route
    }

    pub fn shape(&self) -> &str {
        &self.shape
    }

    /// Extract parameters from a normalized request path this pattern matched.
    pub fn capture(&self, normalized: &str) -> Params {
        let segments: Vec<&str> = normalized.split('/').filter(|s| !s.is_empty()).collect();
        self.params
            .iter()
            .filter_map(|(index, name)| {
                segments.get(*index).map(|raw| {
                    let value = urlencoding::decode(raw)
                        .map(|decoded| decoded.into_owned())
                        .unwrap_or_else(|_| (*raw).to_string());
                    (name.clone(), value)
                })
            })
            .collect()
    }
}
