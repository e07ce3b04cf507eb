//! Query parameters for find operations
//!
//! [`ListQuery`] is the parsed, normalized form of the query string: paging,
//! ordering, raw filter, search, projection and relationship expansion.
//! [`RawListQuery`] is what arrives on the wire, where structured values
//! (`where`, `deepPopulate`, list or object forms of `sort`, `populate` and
//! `select`) are JSON-encoded.
//!
//! # Example
//!
//! ```rust
//! use resource_handlers::handlers::{ListQuery, RawListQuery};
//!
//! let raw = RawListQuery {
//!     page: Some("2".to_string()),
//!     sort: Some("-age".to_string()),
//!     where_clause: Some(r#"{"age":{"$gte":17}}"#.to_string()),
//!     ..Default::default()
//! };
//! let query = ListQuery::try_from(raw).unwrap();
//!
//! assert_eq!(query.page, Some(2));
//! assert!(query.where_clause.is_some());
//! ```

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::error::{ApiError, ApiOperation};
use crate::store::{Populate, Select, SortSpec};

/// One deep expansion step: expand `populate` through model `model_name`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeepPopulate {
    /// Model whose expansion capability runs this step
    #[serde(rename = "modelName")]
    pub model_name: String,
    /// Expansion directive
    pub populate: Populate,
}

impl DeepPopulate {
    /// Expand `populate` through `model_name`
    pub fn new(model_name: impl Into<String>, populate: Populate) -> Self {
        Self {
            model_name: model_name.into(),
            populate,
        }
    }
}

/// Normalized find parameters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListQuery {
    /// Page number (1-based)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u64>,

    /// Page size
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,

    /// Ordering
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<SortSpec>,

    /// Raw store filter; honored only when the `where` policy is enabled
    #[serde(rename = "where", default, skip_serializing_if = "Option::is_none")]
    pub where_clause: Option<Map<String, Value>>,

    /// Case-insensitive pattern matched against every text field
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,

    /// Primary relationship expansion
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub populate: Option<Populate>,

    /// Ordered deep expansion steps, applied after the fetch
    #[serde(rename = "deepPopulate", default, skip_serializing_if = "Vec::is_empty")]
    pub deep_populate: Vec<DeepPopulate>,

    /// Field projection
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub select: Option<Select>,
}

impl ListQuery {
    /// Empty query
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the page number
    #[must_use]
    pub fn with_page(mut self, page: u64) -> Self {
        self.page = Some(page);
        self
    }

    /// Set the page size
    #[must_use]
    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Set the ordering
    #[must_use]
    pub fn with_sort(mut self, sort: SortSpec) -> Self {
        self.sort = Some(sort);
        self
    }

    /// Set the raw filter
    #[must_use]
    pub fn with_where(mut self, conditions: Map<String, Value>) -> Self {
        self.where_clause = Some(conditions);
        self
    }

    /// Set the search term
    #[must_use]
    pub fn with_search(mut self, term: impl Into<String>) -> Self {
        self.search = Some(term.into());
        self
    }

    /// Set the primary expansion
    #[must_use]
    pub fn with_populate(mut self, populate: Populate) -> Self {
        self.populate = Some(populate);
        self
    }

    /// Append a deep expansion step
    #[must_use]
    pub fn with_deep_populate(mut self, step: DeepPopulate) -> Self {
        self.deep_populate.push(step);
        self
    }

    /// Set the projection
    #[must_use]
    pub fn with_select(mut self, select: Select) -> Self {
        self.select = Some(select);
        self
    }
}

/// Query string as received
///
/// Every value is the raw string from the URL. Structured values are JSON
/// encoded; plain strings are taken as-is for `sort`, `populate` and `select`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawListQuery {
    /// Page number
    pub page: Option<String>,
    /// Page size
    pub limit: Option<String>,
    /// `-age name` or a JSON list
    pub sort: Option<String>,
    /// JSON object
    #[serde(rename = "where")]
    pub where_clause: Option<String>,
    /// Search term
    pub search: Option<String>,
    /// Path string, JSON list or JSON options object
    pub populate: Option<String>,
    /// JSON list of `{modelName, populate}`
    #[serde(rename = "deepPopulate")]
    pub deep_populate: Option<String>,
    /// Field string or JSON projection object
    pub select: Option<String>,
}

fn rejected(field: &str, reason: impl std::fmt::Display) -> ApiError {
    ApiError::validation_failed(
        ApiOperation::List,
        format!("Invalid query parameter `{}`: {}", field, reason),
    )
}

fn number(field: &str, raw: Option<String>) -> Result<Option<u64>, ApiError> {
    raw.map(|value| value.trim().parse::<u64>().map_err(|e| rejected(field, e)))
        .transpose()
}

fn json<T: DeserializeOwned>(field: &str, raw: &str) -> Result<T, ApiError> {
    serde_json::from_str(raw).map_err(|e| rejected(field, e))
}

fn looks_structured(raw: &str) -> bool {
    matches!(raw.trim_start().chars().next(), Some('[' | '{'))
}

impl TryFrom<RawListQuery> for ListQuery {
    type Error = ApiError;

    fn try_from(raw: RawListQuery) -> Result<Self, Self::Error> {
        let sort = raw
            .sort
            .map(|s| {
                if looks_structured(&s) {
                    json("sort", &s)
                } else {
                    Ok(SortSpec::Fields(s))
                }
            })
            .transpose()?;

        let populate = raw
            .populate
            .map(|p| {
                if looks_structured(&p) {
                    json("populate", &p)
                } else {
                    Ok(Populate::Paths(p))
                }
            })
            .transpose()?;

        let select = raw
            .select
            .map(|s| {
                if looks_structured(&s) {
                    json("select", &s)
                } else {
                    Ok(Select::Fields(s))
                }
            })
            .transpose()?;

        Ok(Self {
            page: number("page", raw.page)?,
            limit: number("limit", raw.limit)?,
            sort,
            where_clause: raw.where_clause.map(|w| json("where", &w)).transpose()?,
            search: raw.search,
            populate,
            deep_populate: raw
                .deep_populate
                .map(|d| json("deepPopulate", &d))
                .transpose()?
                .unwrap_or_default(),
            select,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::ApiErrorKind;
    use crate::store::PopulateOptions;
    use serde_json::json;

    #[test]
    fn test_plain_strings() {
        let raw = RawListQuery {
            sort: Some("-age name".to_string()),
            populate: Some("user".to_string()),
            select: Some("name -password".to_string()),
            search: Some("10".to_string()),
            ..Default::default()
        };
        let query = ListQuery::try_from(raw).unwrap();
        assert_eq!(query.sort, Some(SortSpec::Fields("-age name".to_string())));
        assert_eq!(query.populate, Some(Populate::Paths("user".to_string())));
        assert_eq!(query.select, Some(Select::Fields("name -password".to_string())));
        assert_eq!(query.search.as_deref(), Some("10"));
    }

    #[test]
    fn test_structured_values() {
        let raw = RawListQuery {
            sort: Some(r#"["-age","name"]"#.to_string()),
            populate: Some(r#"{"path":"user","select":"username"}"#.to_string()),
            select: Some(r#"{"name":1}"#.to_string()),
            deep_populate: Some(r#"[{"modelName":"Role","populate":"user.role"}]"#.to_string()),
            ..Default::default()
        };
        let query = ListQuery::try_from(raw).unwrap();
        assert!(matches!(query.sort, Some(SortSpec::List(ref l)) if l.len() == 2));
        assert!(matches!(
            query.populate,
            Some(Populate::Options(PopulateOptions { ref path, .. })) if path == "user"
        ));
        assert!(matches!(query.select, Some(Select::Projection(_))));
        assert_eq!(
            query.deep_populate,
            vec![DeepPopulate::new("Role", Populate::Paths("user.role".to_string()))]
        );
    }

    #[test]
    fn test_bad_number_rejected() {
        let raw = RawListQuery {
            page: Some("two".to_string()),
            ..Default::default()
        };
        let err = ListQuery::try_from(raw).unwrap_err();
        assert_eq!(err.kind, ApiErrorKind::ValidationFailed);
        assert!(err.message.contains("page"));
    }

    #[test]
    fn test_bad_where_rejected() {
        let raw = RawListQuery {
            where_clause: Some("[1,2]".to_string()),
            ..Default::default()
        };
        assert!(ListQuery::try_from(raw).is_err());
    }

    #[test]
    fn test_list_query_serde_names() {
        let query: ListQuery = serde_json::from_value(json!({
            "page": 1,
            "where": {"age": 3},
            "populate": "user",
            "deepPopulate": [{"modelName": "Role", "populate": "user.role"}]
        }))
        .unwrap();
        assert_eq!(query.page, Some(1));
        assert_eq!(query.where_clause.unwrap().get("age"), Some(&json!(3)));
        assert_eq!(query.deep_populate[0].model_name, "Role");
    }

    #[test]
    fn test_builders() {
        let query = ListQuery::new()
            .with_page(2)
            .with_limit(5)
            .with_search("x")
            .with_populate(Populate::Paths("user".to_string()))
            .with_deep_populate(DeepPopulate::new(
                "Role",
                Populate::Paths("user.role".to_string()),
            ));
        assert_eq!(query.page, Some(2));
        assert_eq!(query.limit, Some(5));
        assert_eq!(query.deep_populate.len(), 1);
    }
}
