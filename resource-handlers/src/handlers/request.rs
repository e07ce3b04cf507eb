//! Inbound request descriptor

use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};

use super::error::{ApiError, ApiOperation};
use super::query::ListQuery;
use crate::store::{Credentials, Model};

/// The collection a request addresses, as resolved by a resource binder
#[derive(Clone)]
pub struct ResourceBinding {
    model: Arc<dyn Model>,
}

impl ResourceBinding {
    /// Bind `model`
    pub fn new(model: Arc<dyn Model>) -> Self {
        Self { model }
    }

    /// Logical name; the envelope key
    #[must_use]
    pub fn name(&self) -> &str {
        self.model.name()
    }

    /// Key a client may nest its payload under (the lower-cased name)
    #[must_use]
    pub fn payload_key(&self) -> String {
        self.name().to_lowercase()
    }

    /// Query and document capabilities of the bound collection
    #[must_use]
    pub fn model(&self) -> &Arc<dyn Model> {
        &self.model
    }
}

impl fmt::Debug for ResourceBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceBinding")
            .field("name", &self.name())
            .finish()
    }
}

/// Base filter supplied by an outer layer (e.g. tenant scoping)
///
/// Insert it as a request extension and the find handler starts from these
/// conditions instead of matching every document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Conditions(pub Map<String, Value>);

/// Everything a handler needs from the inbound request
///
/// # Example
///
/// ```rust
/// use resource_handlers::handlers::{ListQuery, ResourceRequest};
/// use serde_json::json;
///
/// let request = ResourceRequest::new("/v1/admins")
///     .with_query(ListQuery::new().with_limit(10))
///     .with_payload(json!({"admin": {"name": "Ann"}}));
///
/// assert!(request.binding.is_none());
/// assert_eq!(request.query.limit, Some(10));
/// ```
#[derive(Debug, Clone, Default)]
pub struct ResourceRequest {
    /// Request path, for diagnostics
    pub path: String,
    /// `id` path parameter
    pub id: Option<String>,
    /// Parsed query parameters
    pub query: ListQuery,
    /// Request body
    pub payload: Option<Value>,
    /// Caller identity, when authenticated
    pub credentials: Option<Credentials>,
    /// Base filter for collection finds
    pub conditions: Option<Map<String, Value>>,
    /// Resolved collection
    pub binding: Option<ResourceBinding>,
}

impl ResourceRequest {
    /// Request for `path` with nothing else set
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    /// Bind the request to `model`
    #[must_use]
    pub fn with_model(mut self, model: Arc<dyn Model>) -> Self {
        self.binding = Some(ResourceBinding::new(model));
        self
    }

    /// Set the `id` path parameter
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Set the query parameters
    #[must_use]
    pub fn with_query(mut self, query: ListQuery) -> Self {
        self.query = query;
        self
    }

    /// Set the body
    #[must_use]
    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = Some(payload);
        self
    }

    /// Set the caller identity
    #[must_use]
    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Set the base filter
    #[must_use]
    pub fn with_conditions(mut self, conditions: Map<String, Value>) -> Self {
        self.conditions = Some(conditions);
        self
    }

    /// The binding, checked for a usable name
    ///
    /// # Errors
    ///
    /// `NotFound` when nothing is bound, `BadBinding` when the bound model
    /// has an empty name.
    pub fn resolve(&self, operation: ApiOperation) -> Result<&ResourceBinding, ApiError> {
        let binding = self
            .binding
            .as_ref()
            .ok_or_else(|| ApiError::unbound(operation, &self.path))?;
        if binding.name().trim().is_empty() {
            tracing::error!(path = %self.path, "Resource binding has no logical name");
            return Err(ApiError::bad_binding(operation, &self.path));
        }
        Ok(binding)
    }

    /// Fields to write for `binding`
    ///
    /// The whole body, unless it holds an object under the binding's
    /// lower-cased name, in which case that object. A missing or non-object
    /// body yields no fields.
    #[must_use]
    pub fn payload_for(&self, binding: &ResourceBinding) -> Map<String, Value> {
        let Some(Value::Object(body)) = &self.payload else {
            return Map::new();
        };
        match body.get(&binding.payload_key()) {
            Some(Value::Object(nested)) => nested.clone(),
            _ => body.clone(),
        }
    }
}
