//! Route validation rules
//!
//! Each operation has default rules checked before its handler runs. Operators
//! may shallow-merge a [`RouteDefaultsPatch`] into them at startup.

use serde::{Deserialize, Serialize};

use super::error::{ApiError, ApiOperation};
use super::request::ResourceRequest;

/// Checks applied to a request before the handler sees it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ValidationRules {
    /// The `id` path parameter must be present
    pub require_id: bool,
    /// `deepPopulate` is rejected unless `populate` is also given
    pub deep_populate_requires_populate: bool,
    /// Largest accepted `limit`
    pub max_limit: Option<u64>,
}

impl ValidationRules {
    /// No checks beyond positive paging values
    #[must_use]
    pub const fn permissive() -> Self {
        Self {
            require_id: false,
            deep_populate_requires_populate: false,
            max_limit: None,
        }
    }

    /// Defaults for find: optional id, deep expansion needs a primary one
    #[must_use]
    pub const fn find() -> Self {
        Self {
            require_id: false,
            deep_populate_requires_populate: true,
            max_limit: None,
        }
    }

    /// Defaults for create
    #[must_use]
    pub const fn create() -> Self {
        Self::permissive()
    }

    /// Defaults for update and remove: id required
    #[must_use]
    pub const fn by_id() -> Self {
        Self {
            require_id: true,
            deep_populate_requires_populate: false,
            max_limit: None,
        }
    }

    /// Shallow-merge `patch`; fields it sets replace ours
    #[must_use]
    pub fn merge(self, patch: &RouteDefaultsPatch) -> Self {
        Self {
            require_id: patch.require_id.unwrap_or(self.require_id),
            deep_populate_requires_populate: patch
                .deep_populate_requires_populate
                .unwrap_or(self.deep_populate_requires_populate),
            max_limit: patch.max_limit.or(self.max_limit),
        }
    }

    /// Check `request`
    ///
    /// # Errors
    ///
    /// `ValidationFailed` naming the first violated rule.
    pub fn check(&self, operation: ApiOperation, request: &ResourceRequest) -> Result<(), ApiError> {
        let fail = |message: String| Err(ApiError::validation_failed(operation, message));
        let query = &request.query;

        if self.require_id && request.id.as_deref().map_or(true, str::is_empty) {
            return fail("\"id\" is required".to_string());
        }
        if query.page == Some(0) {
            return fail("\"page\" must be a positive number".to_string());
        }
        if query.limit == Some(0) {
            return fail("\"limit\" must be a positive number".to_string());
        }
        if let (Some(max), Some(limit)) = (self.max_limit, query.limit) {
            if limit > max {
                return fail(format!("\"limit\" must be less than or equal to {}", max));
            }
        }
        if self.deep_populate_requires_populate
            && !query.deep_populate.is_empty()
            && query.populate.is_none()
        {
            return fail("\"deepPopulate\" missing required peer \"populate\"".to_string());
        }
        Ok(())
    }
}

/// Partial rules merged into an operation's defaults
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RouteDefaultsPatch {
    /// Replace `require_id`
    #[serde(default)]
    pub require_id: Option<bool>,
    /// Replace `deep_populate_requires_populate`
    #[serde(default)]
    pub deep_populate_requires_populate: Option<bool>,
    /// Set `max_limit`
    #[serde(default)]
    pub max_limit: Option<u64>,
}

impl RouteDefaultsPatch {
    /// Empty patch
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cap `limit`
    #[must_use]
    pub fn with_max_limit(mut self, max: u64) -> Self {
        self.max_limit = Some(max);
        self
    }

    /// Require or relax the `id` parameter
    #[must_use]
    pub fn with_require_id(mut self, required: bool) -> Self {
        self.require_id = Some(required);
        self
    }
}
