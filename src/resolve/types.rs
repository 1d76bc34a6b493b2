//! Core types shared by the contract, the dispatcher and the collection.

use crate::geo::CoordinateError;
use serde::Serialize;
use std::collections::BTreeMap;
use url::Url;

/// Input that matched a resolver's shape but is not a valid location.
/// Shown to the user verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, thiserror::Error)]
#[error("{message}")]
pub struct ResolverError {
    pub resolver: &'static str,
    pub message: String,
}

impl ResolverError {
    pub fn new(resolver: &'static str, message: impl Into<String>) -> Self {
        Self { resolver, message: message.into() }
    }
}

/// Why `Resolver::resolve` produced nothing.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ResolveFailure {
    /// Recognized but invalid; becomes a visible collection entry.
    #[error(transparent)]
    Invalid(#[from] ResolverError),
    /// Network or parsing trouble on otherwise valid input. Logged only.
    #[error("transient fault: {0}")]
    Transient(String),
    /// The resolver cannot work at all (missing credentials and the like).
    #[error("configuration fault: {0}")]
    Configuration(String),
}

impl ResolveFailure {
    /// Wrap a coordinate validation failure as a user-visible error.
    pub fn invalid_coordinate(resolver: &'static str, err: CoordinateError) -> Self {
        Self::Invalid(ResolverError::new(resolver, err.to_string()))
    }
}

/// A reverse operation the service has no concept of.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{resolver} does not support {operation}")]
pub struct NotSupported {
    pub resolver: &'static str,
    pub operation: &'static str,
}

/// What `can_handle` found, handed explicitly to `resolve`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MatchContext {
    pub input: String,
    pub url: Option<Url>,
    pub fields: BTreeMap<&'static str, String>,
    /// Shortened form of the resolver's own scheme; needs one redirect hop.
    pub short: bool,
}

impl MatchContext {
    pub fn text(input: impl Into<String>) -> Self {
        Self { input: input.into(), ..Self::default() }
    }

    pub fn for_url(input: impl Into<String>, url: Url) -> Self {
        Self { input: input.into(), url: Some(url), ..Self::default() }
    }

    pub fn with_field(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.fields.insert(name, value.into());
        self
    }

    pub fn shortened(mut self) -> Self {
        self.short = true;
        self
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    /// Parse a captured field as a float.
    pub fn number(&self, name: &str) -> Option<f64> {
        self.field(name)?.trim().parse().ok()
    }
}

/// Byte range of a link inside a message, `start..end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, serde::Deserialize)]
pub struct LinkSpan {
    pub start: usize,
    pub end: usize,
}

impl LinkSpan {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// The spanned text, or `None` when the span is out of bounds or not on
    /// char boundaries.
    pub fn slice<'a>(&self, text: &'a str) -> Option<&'a str> {
        if self.start >= self.end {
            return None;
        }
        text.get(self.start..self.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_from_resolver_error() {
        let failure: ResolveFailure = ResolverError::new("osm", "Zoom out of range").into();
        assert_eq!(failure.to_string(), "Zoom out of range");
    }

    #[test]
    fn test_invalid_coordinate() {
        let err = crate::geo::Coordinate::new(91.0, 0.0).unwrap_err();
        match ResolveFailure::invalid_coordinate("geo", err) {
            ResolveFailure::Invalid(e) => {
                assert_eq!(e.resolver, "geo");
                assert!(e.message.contains("91"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_match_context_fields() {
        let ctx = MatchContext::text("1.5,2").with_field("lat", " 1.5 ").with_field("lon", "x");
        assert_eq!(ctx.number("lat"), Some(1.5));
        assert_eq!(ctx.number("lon"), None);
        assert_eq!(ctx.number("missing"), None);
        assert!(!ctx.short);
        assert!(ctx.shortened().short);
    }

    #[test]
    fn test_span_slice() {
        let text = "Here: https://a.b/ ok";
        assert_eq!(LinkSpan::new(6, 18).slice(text), Some("https://a.b/"));
        assert_eq!(LinkSpan::new(6, 100).slice(text), None);
        assert_eq!(LinkSpan::new(5, 5).slice(text), None);
        assert_eq!(LinkSpan::new(1, 2).slice("é"), None);
    }
}
