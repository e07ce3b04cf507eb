//! Store error types
//!
//! Structured errors raised by a document store while counting, fetching,
//! expanding, saving or removing documents.
//!
//! # Example
//!
//! ```rust
//! use resource_handlers::store::{StoreError, StoreErrorKind};
//!
//! let error = StoreError::invalid_id("Admin", "not-an-id");
//! assert!(matches!(error.kind, StoreErrorKind::InvalidId));
//! assert_eq!(error.entity_id, Some("not-an-id".to_string()));
//! ```

use std::fmt;

/// Store call that was running when the error occurred
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOperation {
    /// Loading a single document by identity
    FindById,
    /// Executing a compiled query
    Find,
    /// Counting documents matching a filter
    Count,
    /// Persisting a new or modified document
    Save,
    /// Deleting a document
    Remove,
    /// Expanding relationship references
    Populate,
    /// Resolving a model by name
    Model,
}

impl fmt::Display for StoreOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FindById => write!(f, "find_by_id"),
            Self::Find => write!(f, "find"),
            Self::Count => write!(f, "count"),
            Self::Save => write!(f, "save"),
            Self::Remove => write!(f, "remove"),
            Self::Populate => write!(f, "populate"),
            Self::Model => write!(f, "model"),
        }
    }
}

/// Category of store error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreErrorKind {
    /// Document does not exist
    NotFound,
    /// Identifier is not in the store's id format
    InvalidId,
    /// No model registered under the requested name
    MissingModel,
    /// A sort, select, or populate path cannot be applied
    InvalidPath,
    /// Document failed the store's own validation on save
    ValidationFailed,
    /// Any other failure inside the store
    Backend,
}

impl fmt::Display for StoreErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "not_found"),
            Self::InvalidId => write!(f, "invalid_id"),
            Self::MissingModel => write!(f, "missing_model"),
            Self::InvalidPath => write!(f, "invalid_path"),
            Self::ValidationFailed => write!(f, "validation_failed"),
            Self::Backend => write!(f, "backend"),
        }
    }
}

/// Structured store error with operation context
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreError {
    /// The store call being performed when the error occurred
    pub operation: StoreOperation,
    /// The category of error
    pub kind: StoreErrorKind,
    /// Human-readable error message
    pub message: String,
    /// The model involved (e.g., "Admin")
    pub entity_type: Option<String>,
    /// The identifier involved
    pub entity_id: Option<String>,
}

impl StoreError {
    /// Create a new store error
    pub fn new(operation: StoreOperation, kind: StoreErrorKind, message: impl Into<String>) -> Self {
        Self {
            operation,
            kind,
            message: message.into(),
            entity_type: None,
            entity_id: None,
        }
    }

    /// Create a "not found" error with entity context
    ///
    /// For a document that disappeared between load and write.
    /// [`Model::find_by_id`](crate::store::Model::find_by_id) reports a plain
    /// miss as `Ok(None)` instead. Other [`Model`](crate::store::Model)
    /// implementations may return it from any call; handlers answer 404.
    pub fn not_found(entity_type: impl Into<String>, entity_id: impl Into<String>) -> Self {
        Self::new(
            StoreOperation::FindById,
            StoreErrorKind::NotFound,
            "Document not found",
        )
        .with_entity(entity_type, entity_id)
    }

    /// Create an error for an identifier the store cannot parse
    ///
    /// # Example
    ///
    /// ```rust
    /// use resource_handlers::store::{StoreError, StoreOperation};
    ///
    /// let error = StoreError::invalid_id("User", "abc33");
    /// assert_eq!(error.operation, StoreOperation::FindById);
    /// ```
    pub fn invalid_id(entity_type: impl Into<String>, entity_id: impl Into<String>) -> Self {
        let entity_id = entity_id.into();
        Self::new(
            StoreOperation::FindById,
            StoreErrorKind::InvalidId,
            format!("Cast to id failed for value \"{}\"", entity_id),
        )
        .with_entity(entity_type, entity_id)
    }

    /// Create an error for a model name with no registered schema
    pub fn missing_model(name: impl Into<String>) -> Self {
        let name = name.into();
        Self::new(
            StoreOperation::Model,
            StoreErrorKind::MissingModel,
            format!("Schema hasn't been registered for model \"{}\"", name),
        )
    }

    /// Create an error for a path that cannot be applied
    pub fn invalid_path(operation: StoreOperation, message: impl Into<String>) -> Self {
        Self::new(operation, StoreErrorKind::InvalidPath, message)
    }

    /// Create a validation error raised while saving
    pub fn validation_failed(message: impl Into<String>) -> Self {
        Self::new(StoreOperation::Save, StoreErrorKind::ValidationFailed, message)
    }

    /// Create a generic backend error
    pub fn backend(operation: StoreOperation, message: impl Into<String>) -> Self {
        Self::new(operation, StoreErrorKind::Backend, message)
    }

    /// Add entity context to an existing error
    #[must_use]
    pub fn with_entity(
        mut self,
        entity_type: impl Into<String>,
        entity_id: impl Into<String>,
    ) -> Self {
        self.entity_type = Some(entity_type.into());
        self.entity_id = Some(entity_id.into());
        self
    }

    /// Set the store call that caused the error
    #[must_use]
    pub fn with_operation(mut self, operation: StoreOperation) -> Self {
        self.operation = operation;
        self
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Store {} error during {}: {}",
            self.kind, self.operation, self.message
        )?;
        if let (Some(ref entity_type), Some(ref entity_id)) = (&self.entity_type, &self.entity_id) {
            write!(f, " [{}: {}]", entity_type, entity_id)?;
        }
        Ok(())
    }
}

impl std::error::Error for StoreError {}
