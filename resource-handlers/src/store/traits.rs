//! Store capability traits
//!
//! The handlers never talk to a database directly. They see a resolved
//! [`Model`] (the query capability set of one collection) and the
//! [`Document`]s it hands out for mutation.
//!
//! Both traits are object safe: the model a request addresses is only known
//! once the path has been bound, so handlers hold an `Arc<dyn Model>`.
//!
//! # Example
//!
//! ```rust,ignore
//! use resource_handlers::store::{Model, Query};
//!
//! async fn newest(model: &dyn Model) -> StoreResult<Option<Found>> {
//!     let query = Query::find(Default::default())
//!         .sort(SortSpec::Fields("-createdAt".into()))
//!         .limit(1);
//!     model.exec(&query).await
//! }
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::error::StoreError;
use super::query::{Filter, Populate, Query};
use super::schema::Schema;

/// Result type for store operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Identity of the caller, as established by the authentication layer
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Credentials {
    /// Subject identifier
    pub subject: String,
    /// Any further claims
    #[serde(default, flatten)]
    pub claims: Map<String, Value>,
}

impl Credentials {
    /// Credentials for `subject` with no extra claims
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            claims: Map::new(),
        }
    }
}

/// Executed query result, as plain values
#[derive(Debug, Clone, PartialEq)]
pub enum Found {
    /// Single document (by-id queries)
    One(Value),
    /// Document list (collection queries); may be empty
    Many(Vec<Value>),
}

impl Found {
    /// Number of documents held
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::One(_) => 1,
            Self::Many(docs) => docs.len(),
        }
    }

    /// Whether no documents are held
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Mutable access to every held document
    pub fn documents_mut(&mut self) -> Box<dyn Iterator<Item = &mut Value> + '_> {
        match self {
            Self::One(doc) => Box::new(std::iter::once(doc)),
            Self::Many(docs) => Box::new(docs.iter_mut()),
        }
    }

    /// Unwrap into a single JSON value (object or array)
    #[must_use]
    pub fn into_value(self) -> Value {
        match self {
            Self::One(doc) => doc,
            Self::Many(docs) => Value::Array(docs),
        }
    }
}

/// Optional document capability invoked before every save
///
/// Typically stamps audit fields from the caller's credentials.
pub trait Touch {
    /// Record that `credentials` modified the document
    fn touch(&mut self, credentials: Option<&Credentials>);
}

/// A single document loaded from or destined for a model
#[async_trait]
pub trait Document: Send + Sync {
    /// Identity of the document
    fn id(&self) -> &str;

    /// Apply `fields` onto the document; fields not supplied are left alone
    fn set(&mut self, fields: Map<String, Value>);

    /// The touch hook, when this document type supports one
    fn touch_hook(&mut self) -> Option<&mut dyn Touch> {
        None
    }

    /// Plain value view of the document
    fn to_value(&self) -> Value;

    /// Persist the document
    async fn save(&mut self) -> StoreResult<()>;

    /// Delete the document
    async fn remove(&mut self) -> StoreResult<()>;
}

/// Query capability set of one collection
#[async_trait]
pub trait Model: Send + Sync {
    /// Logical name of the model (e.g. "Admin")
    fn name(&self) -> &str;

    /// Declared fields
    fn schema(&self) -> &Schema;

    /// Another model registered with the same store
    fn model(&self, name: &str) -> StoreResult<Arc<dyn Model>>;

    /// Count documents matching `filter`
    async fn count(&self, filter: &Filter) -> StoreResult<u64>;

    /// Execute `query`
    ///
    /// `None` means the store produced no result: a missing document for a
    /// by-id query, or a null result for a collection query. An empty
    /// collection is `Some(Found::Many(vec![]))`.
    async fn exec(&self, query: &Query) -> StoreResult<Option<Found>>;

    /// Expand references in already fetched documents
    async fn populate(&self, found: Found, populate: &Populate) -> StoreResult<Found>;

    /// Load one document for mutation
    async fn find_by_id(&self, id: &str) -> StoreResult<Option<Box<dyn Document>>>;

    /// Construct an unsaved document from `fields`
    fn new_document(&self, fields: Map<String, Value>) -> StoreResult<Box<dyn Document>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_found_len() {
        assert_eq!(Found::One(json!({})).len(), 1);
        assert_eq!(Found::Many(vec![]).len(), 0);
        assert!(Found::Many(vec![]).is_empty());
    }

    #[test]
    fn test_found_into_value() {
        assert_eq!(Found::One(json!({"a": 1})).into_value(), json!({"a": 1}));
        assert_eq!(
            Found::Many(vec![json!(1), json!(2)]).into_value(),
            json!([1, 2])
        );
    }

    #[test]
    fn test_found_documents_mut() {
        let mut found = Found::Many(vec![json!({"n": 1}), json!({"n": 2})]);
        for doc in found.documents_mut() {
            doc["seen"] = json!(true);
        }
        assert_eq!(
            found,
            Found::Many(vec![
                json!({"n": 1, "seen": true}),
                json!({"n": 2, "seen": true})
            ])
        );
    }

    #[test]
    fn test_credentials_flatten_claims() {
        let creds: Credentials =
            serde_json::from_value(json!({"subject": "u1", "scope": "admin"})).unwrap();
        assert_eq!(creds.subject, "u1");
        assert_eq!(creds.claims.get("scope"), Some(&json!("admin")));
    }
}
