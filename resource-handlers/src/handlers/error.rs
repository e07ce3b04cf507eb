//! API error types for resource handlers
//!
//! Every failure a handler can produce is an [`ApiError`]. It renders itself
//! as a JSON error body with a status derived from its kind.
//!
//! # Example
//!
//! ```rust
//! use resource_handlers::handlers::{ApiError, ApiErrorKind, ApiOperation};
//!
//! let error = ApiError::not_found(ApiOperation::Get, "Admin", "5f2c");
//! assert!(matches!(error.kind, ApiErrorKind::NotFound));
//! assert_eq!(error.entity_id, Some("5f2c".to_string()));
//! ```

use std::fmt;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::store::{StoreError, StoreErrorKind, StoreOperation};

/// Handler that was running when the error occurred
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiOperation {
    /// Listing a collection
    List,
    /// Fetching a single document by id
    Get,
    /// Creating a document
    Create,
    /// Updating a document
    Update,
    /// Removing a document
    Remove,
}

impl fmt::Display for ApiOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::List => write!(f, "list"),
            Self::Get => write!(f, "get"),
            Self::Create => write!(f, "create"),
            Self::Update => write!(f, "update"),
            Self::Remove => write!(f, "remove"),
        }
    }
}

/// Category of API error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiErrorKind {
    /// No resource binding, or no document for the request
    NotFound,
    /// The resource binding is structurally invalid (configuration error)
    BadBinding,
    /// A parameter passed validation but cannot be used (e.g. a bad pattern)
    BadRequest,
    /// The request shape was rejected before the handler ran
    ValidationFailed,
    /// A store call failed
    StoreFailure,
}

impl fmt::Display for ApiErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "not_found"),
            Self::BadBinding => write!(f, "bad_binding"),
            Self::BadRequest => write!(f, "bad_request"),
            Self::ValidationFailed => write!(f, "validation_failed"),
            Self::StoreFailure => write!(f, "store_failure"),
        }
    }
}

impl ApiErrorKind {
    /// HTTP status code for this error kind
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::BadRequest | Self::ValidationFailed => StatusCode::BAD_REQUEST,
            Self::BadBinding | Self::StoreFailure => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Error code string for this error kind
    #[must_use]
    pub fn error_code(&self) -> String {
        format!("{}", self).to_uppercase()
    }
}

/// Structured API error with operation context
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    /// The handler running when the error occurred
    pub operation: ApiOperation,
    /// The category of error
    pub kind: ApiErrorKind,
    /// Human-readable error message
    pub message: String,
    /// The resource involved (e.g. "Admin")
    pub entity_type: Option<String>,
    /// The document id involved
    pub entity_id: Option<String>,
    /// Store classification, for errors raised by the store
    pub store_kind: Option<StoreErrorKind>,
}

impl ApiError {
    /// Create a new API error
    pub fn new(operation: ApiOperation, kind: ApiErrorKind, message: impl Into<String>) -> Self {
        Self {
            operation,
            kind,
            message: message.into(),
            entity_type: None,
            entity_id: None,
            store_kind: None,
        }
    }

    /// No document `entity_id` exists for `entity_type`
    pub fn not_found(
        operation: ApiOperation,
        entity_type: impl Into<String>,
        entity_id: impl Into<String>,
    ) -> Self {
        Self::new(operation, ApiErrorKind::NotFound, "Not Found").with_entity(entity_type, entity_id)
    }

    /// The request names no resource the binder knows
    pub fn unbound(operation: ApiOperation, path: impl Into<String>) -> Self {
        let path = path.into();
        Self::new(
            operation,
            ApiErrorKind::NotFound,
            format!("No resource bound for path `{}`", path),
        )
    }

    /// The binding has no usable logical name
    ///
    /// # Example
    ///
    /// ```rust
    /// use resource_handlers::handlers::{ApiError, ApiOperation};
    ///
    /// let error = ApiError::bad_binding(ApiOperation::List, "/v1/things");
    /// assert_eq!(error.kind.status_code().as_u16(), 500);
    /// ```
    pub fn bad_binding(operation: ApiOperation, path: impl Into<String>) -> Self {
        Self::new(
            operation,
            ApiErrorKind::BadBinding,
            format!("Model in route with path `{}` is not valid", path.into()),
        )
    }

    /// A parameter cannot be applied
    pub fn bad_request(operation: ApiOperation, message: impl Into<String>) -> Self {
        Self::new(operation, ApiErrorKind::BadRequest, message)
    }

    /// The request was rejected by route validation
    pub fn validation_failed(operation: ApiOperation, message: impl Into<String>) -> Self {
        Self::new(operation, ApiErrorKind::ValidationFailed, message)
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

    /// Set the handler that caused the error
    #[must_use]
    pub fn with_operation(mut self, operation: ApiOperation) -> Self {
        self.operation = operation;
        self
    }

    /// Whether this error reports a missing resource or document
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self.kind, ApiErrorKind::NotFound)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "API {} error during {}: {}",
            self.kind, self.operation, self.message
        )?;
        if let (Some(ref entity_type), Some(ref entity_id)) = (&self.entity_type, &self.entity_id) {
            write!(f, " [{}: {}]", entity_type, entity_id)?;
        }
        Ok(())
    }
}

impl std::error::Error for ApiError {}

/// Response body for API errors
#[derive(Debug, Serialize, Deserialize)]
struct ApiErrorResponse {
    error: String,
    code: String,
    status: u16,
    operation: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    entity_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    entity_id: Option<String>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.kind.status_code();
        let code = self.kind.error_code();

        tracing::error!(
            operation = %self.operation,
            kind = %self.kind,
            store_kind = ?self.store_kind,
            entity_type = ?self.entity_type,
            entity_id = ?self.entity_id,
            "API error: {}", self.message
        );

        let response = ApiErrorResponse {
            error: self.message,
            code,
            status: status.as_u16(),
            operation: self.operation.to_string(),
            entity_type: self.entity_type,
            entity_id: self.entity_id,
        };

        (status, Json(response)).into_response()
    }
}

fn store_operation_to_api_operation(op: StoreOperation) -> ApiOperation {
    match op {
        StoreOperation::FindById => ApiOperation::Get,
        StoreOperation::Find
        | StoreOperation::Count
        | StoreOperation::Populate
        | StoreOperation::Model => ApiOperation::List,
        StoreOperation::Save => ApiOperation::Create,
        StoreOperation::Remove => ApiOperation::Remove,
    }
}

/// Store errors keep their message; only a store-level not-found stays
/// `NotFound`, everything else (malformed ids included) is a `StoreFailure`.
impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        let kind = match err.kind {
            StoreErrorKind::NotFound => ApiErrorKind::NotFound,
            StoreErrorKind::InvalidId
            | StoreErrorKind::MissingModel
            | StoreErrorKind::InvalidPath
            | StoreErrorKind::ValidationFailed
            | StoreErrorKind::Backend => ApiErrorKind::StoreFailure,
        };

        Self {
            operation: store_operation_to_api_operation(err.operation),
            kind,
            message: err.message,
            entity_type: err.entity_type,
            entity_id: err.entity_id,
            store_kind: Some(err.kind),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_operation_display() {
        assert_eq!(format!("{}", ApiOperation::List), "list");
        assert_eq!(format!("{}", ApiOperation::Get), "get");
        assert_eq!(format!("{}", ApiOperation::Create), "create");
        assert_eq!(format!("{}", ApiOperation::Update), "update");
        assert_eq!(format!("{}", ApiOperation::Remove), "remove");
    }

    #[test]
    fn test_api_error_kind_status_codes() {
        assert_eq!(ApiErrorKind::NotFound.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            ApiErrorKind::BadBinding.status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(ApiErrorKind::BadRequest.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ApiErrorKind::ValidationFailed.status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiErrorKind::StoreFailure.status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_api_error_kind_error_codes() {
        assert_eq!(ApiErrorKind::NotFound.error_code(), "NOT_FOUND");
        assert_eq!(ApiErrorKind::BadBinding.error_code(), "BAD_BINDING");
        assert_eq!(ApiErrorKind::StoreFailure.error_code(), "STORE_FAILURE");
    }

    #[test]
    fn test_not_found_carries_entity() {
        let error = ApiError::not_found(ApiOperation::Update, "Admin", "42");
        assert!(error.is_not_found());
        assert_eq!(error.operation, ApiOperation::Update);
        assert_eq!(error.entity_type, Some("Admin".to_string()));
    }

    #[test]
    fn test_unbound_is_not_found() {
        let error = ApiError::unbound(ApiOperation::List, "/v1/ghosts");
        assert!(error.is_not_found());
        assert!(error.message.contains("/v1/ghosts"));
    }

    #[test]
    fn test_display_with_entity() {
        let display = ApiError::not_found(ApiOperation::Get, "User", "usr_123").to_string();
        assert!(display.contains("not_found"));
        assert!(display.contains("get"));
        assert!(display.contains("[User: usr_123]"));
    }

    #[test]
    fn test_display_without_entity() {
        let display = ApiError::bad_request(ApiOperation::List, "bad pattern").to_string();
        assert!(display.contains("bad_request"));
        assert!(!display.contains('['));
    }

    #[test]
    fn test_from_store_not_found() {
        let api_err: ApiError = StoreError::not_found("User", "usr_123").into();
        assert_eq!(api_err.kind, ApiErrorKind::NotFound);
        assert_eq!(api_err.operation, ApiOperation::Get);
        assert_eq!(api_err.store_kind, Some(StoreErrorKind::NotFound));
    }

    #[test]
    fn test_from_store_invalid_id_is_store_failure() {
        let api_err: ApiError = StoreError::invalid_id("User", "abc33").into();
        assert_eq!(api_err.kind, ApiErrorKind::StoreFailure);
        assert_eq!(api_err.kind.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(api_err.message.contains("abc33"));
        assert_eq!(api_err.store_kind, Some(StoreErrorKind::InvalidId));
    }

    #[test]
    fn test_from_store_backend_keeps_message() {
        let api_err: ApiError = StoreError::backend(StoreOperation::Save, "disk full").into();
        assert_eq!(api_err.kind, ApiErrorKind::StoreFailure);
        assert_eq!(api_err.operation, ApiOperation::Create);
        assert_eq!(api_err.message, "disk full");
    }

    #[test]
    fn test_into_response_status() {
        let response = ApiError::unbound(ApiOperation::List, "/x").into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
