//! Response envelope
//!
//! A successful handler produces either an [`Envelope`] keyed by the
//! resource's logical name, or [`Reply::NoContent`] when the operation's
//! response policy says not to echo the document.
//!
//! # Example
//!
//! ```rust
//! use resource_handlers::config::PaginationConfig;
//! use resource_handlers::handlers::{Envelope, PaginationMeta};
//! use serde_json::json;
//!
//! let meta = PaginationMeta::new(20, Some(10));
//! let envelope = Envelope::list("Admin", vec![json!({"name": "a"})], meta, &PaginationConfig::default());
//!
//! assert_eq!(envelope.get("meta"), Some(&json!({"totalPages": 2, "totalDocs": 20})));
//! ```

use axum::{
    body::Body,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::PaginationConfig;

/// Pagination figures for a list response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationMeta {
    /// `ceil(total_docs / limit)`, never less than 1; 1 without a limit
    pub total_pages: u64,
    /// Documents matching the filter, ignoring paging
    pub total_docs: u64,
}

impl PaginationMeta {
    /// Compute from the match count and the effective page size
    ///
    /// # Example
    ///
    /// ```rust
    /// use resource_handlers::handlers::PaginationMeta;
    ///
    /// assert_eq!(PaginationMeta::new(13, None).total_pages, 1);
    /// assert_eq!(PaginationMeta::new(21, Some(10)).total_pages, 3);
    /// assert_eq!(PaginationMeta::new(0, Some(10)).total_pages, 1);
    /// ```
    #[must_use]
    pub fn new(total_docs: u64, limit: Option<u64>) -> Self {
        let total_pages = match limit {
            Some(limit) if limit > 0 => total_docs.div_ceil(limit).max(1),
            _ => 1,
        };
        Self {
            total_pages,
            total_docs,
        }
    }

    /// Render under the configured key names
    #[must_use]
    pub fn to_value(&self, keys: &PaginationConfig) -> Value {
        let mut meta = Map::new();
        meta.insert(keys.total_pages.clone(), Value::from(self.total_pages));
        meta.insert(keys.total_docs.clone(), Value::from(self.total_docs));
        Value::Object(meta)
    }
}

/// Response body: resource name to document(s), plus meta for lists
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Envelope(Map<String, Value>);

impl Envelope {
    /// Single document envelope (by-id find, create, update, remove)
    pub fn single(name: &str, doc: Value) -> Self {
        let mut entries = Map::new();
        entries.insert(name.to_string(), doc);
        Self(entries)
    }

    /// List envelope with pagination metadata
    pub fn list(name: &str, docs: Vec<Value>, meta: PaginationMeta, keys: &PaginationConfig) -> Self {
        let mut entries = Map::new();
        entries.insert(name.to_string(), Value::Array(docs));
        entries.insert(keys.meta.clone(), meta.to_value(keys));
        Self(entries)
    }

    /// Entry under `key`
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Plain JSON value
    #[must_use]
    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

/// Success outcome of a handler
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// JSON envelope
    Envelope(Envelope),
    /// Empty body
    NoContent,
}

impl Reply {
    /// The envelope, if any
    #[must_use]
    pub fn envelope(&self) -> Option<&Envelope> {
        match self {
            Self::Envelope(envelope) => Some(envelope),
            Self::NoContent => None,
        }
    }
}

impl From<Envelope> for Reply {
    fn from(envelope: Envelope) -> Self {
        Self::Envelope(envelope)
    }
}

impl IntoResponse for Reply {
    fn into_response(self) -> Response {
        match self {
            Self::Envelope(envelope) => (StatusCode::OK, Json(envelope)).into_response(),
            Self::NoContent => (StatusCode::OK, Body::empty()).into_response(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_total_pages() {
        assert_eq!(PaginationMeta::new(20, Some(10)).total_pages, 2);
        assert_eq!(PaginationMeta::new(13, Some(30)).total_pages, 1);
        assert_eq!(PaginationMeta::new(20, None).total_pages, 1);
        assert_eq!(PaginationMeta::new(0, None).total_pages, 1);
    }

    #[test]
    fn test_single_has_no_meta() {
        let envelope = Envelope::single("Admin", json!({"id": "1"}));
        assert_eq!(envelope.clone().into_value(), json!({"Admin": {"id": "1"}}));
        assert!(envelope.get("meta").is_none());
    }

    #[test]
    fn test_list_uses_configured_keys() {
        let keys = PaginationConfig {
            meta: "paging".to_string(),
            total_pages: "pages".to_string(),
            total_docs: "count".to_string(),
            default_limit: 30,
        };
        let envelope = Envelope::list("Admin", vec![], PaginationMeta::new(5, Some(2)), &keys);
        assert_eq!(
            envelope.into_value(),
            json!({"Admin": [], "paging": {"pages": 3, "count": 5}})
        );
    }

    #[test]
    fn test_reply_statuses() {
        let response = Reply::NoContent.into_response();
        assert_eq!(response.status(), StatusCode::OK);
        let response = Reply::from(Envelope::single("Admin", json!({}))).into_response();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
