//! Query values handed to a document store
//!
//! A [`Query`] is the store-facing form of a compiled request: which documents
//! to target, how to filter them, and how to page, order, project and expand
//! the result. The store decides how to execute it.
//!
//! # Example
//!
//! ```rust
//! use resource_handlers::store::{Query, SortSpec};
//! let query = Query::find(serde_json::Map::new())
//!     .skip(10)
//!     .limit(10)
//!     .sort(SortSpec::Fields("-name".to_string()));
//!
//! assert_eq!(query.skip, Some(10));
//! assert!(!query.is_by_id());
//! ```

use std::fmt;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::error::{StoreError, StoreOperation};

/// Marker prefix for descending sort fields and excluded select fields
pub const NEGATION_MARKER: char = '-';

/// Key used for document identity in filter conditions
pub const ID_CONDITION: &str = "_id";

/// Direction for ordering results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrderDirection {
    /// Sort in ascending order (A-Z, 0-9)
    #[default]
    Ascending,
    /// Sort in descending order (Z-A, 9-0)
    Descending,
}

impl fmt::Display for OrderDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ascending => write!(f, "asc"),
            Self::Descending => write!(f, "desc"),
        }
    }
}

/// One field of an ordering
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    /// Dotted field path
    pub field: String,
    /// Sort direction
    pub direction: OrderDirection,
}

impl SortKey {
    fn parse(token: &str) -> Option<Self> {
        let token = token.trim();
        let (field, direction) = match token.strip_prefix(NEGATION_MARKER) {
            Some(rest) => (rest, OrderDirection::Descending),
            None => (token.strip_prefix('+').unwrap_or(token), OrderDirection::Ascending),
        };
        (!field.is_empty()).then(|| Self {
            field: field.to_string(),
            direction,
        })
    }
}

/// Ordering as supplied by the client
///
/// Either a space separated string (`"-age name"`) or a list of fields
/// (`["-age", "name"]`). A leading `-` sorts that field descending.
///
/// # Example
///
/// ```rust
/// use resource_handlers::store::{OrderDirection, SortSpec};
///
/// let keys = SortSpec::Fields("-age name".to_string()).keys();
/// assert_eq!(keys[0].field, "age");
/// assert_eq!(keys[0].direction, OrderDirection::Descending);
/// assert_eq!(keys[1].direction, OrderDirection::Ascending);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SortSpec {
    /// Space separated field list
    Fields(String),
    /// One field per entry
    List(Vec<String>),
}

impl SortSpec {
    /// Sort keys in priority order
    #[must_use]
    pub fn keys(&self) -> Vec<SortKey> {
        match self {
            Self::Fields(fields) => fields.split_whitespace().filter_map(SortKey::parse).collect(),
            Self::List(list) => list.iter().filter_map(|f| SortKey::parse(f)).collect(),
        }
    }
}

/// Field projection as supplied by the client
///
/// Either a string (`"name age"` to include, `"-password"` to exclude) or a
/// projection object (`{"name": 1}`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Select {
    /// Space separated field list
    Fields(String),
    /// Field to flag object
    Projection(Map<String, Value>),
}

/// Normalized field projection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Projection {
    /// Keep only these fields (identity is always kept)
    Include(Vec<String>),
    /// Drop these fields
    Exclude(Vec<String>),
}

impl Select {
    /// Normalize into an inclusion or exclusion list
    ///
    /// # Errors
    ///
    /// Mixing included and excluded fields is rejected, as is a projection
    /// flag that is neither a number nor a boolean.
    pub fn projection(&self) -> Result<Projection, StoreError> {
        let flagged: Vec<(String, bool)> = match self {
            Self::Fields(fields) => fields
                .split_whitespace()
                .map(|token| match token.strip_prefix(NEGATION_MARKER) {
                    Some(rest) => (rest.to_string(), false),
                    None => (token.strip_prefix('+').unwrap_or(token).to_string(), true),
                })
                .filter(|(field, _)| !field.is_empty())
                .collect(),
            Self::Projection(map) => map
                .iter()
                .map(|(field, flag)| {
                    let include = match flag {
                        Value::Bool(b) => *b,
                        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
                        other => {
                            return Err(StoreError::invalid_path(
                                StoreOperation::Find,
                                format!("Invalid projection value for '{}': {}", field, other),
                            ))
                        }
                    };
                    Ok((field.clone(), include))
                })
                .collect::<Result<_, _>>()?,
        };

        let include_count = flagged.iter().filter(|(_, include)| *include).count();
        if include_count > 0 && include_count < flagged.len() {
            return Err(StoreError::invalid_path(
                StoreOperation::Find,
                "Projection cannot mix inclusion and exclusion",
            ));
        }

        let fields = flagged.into_iter().map(|(field, _)| field).collect();
        if include_count > 0 {
            Ok(Projection::Include(fields))
        } else {
            Ok(Projection::Exclude(fields))
        }
    }
}

/// One relationship to expand
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PopulateOptions {
    /// Dotted path holding the reference(s)
    pub path: String,
    /// Projection applied to the referenced documents
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub select: Option<Select>,
    /// Referenced model, when the schema does not declare it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl PopulateOptions {
    /// Expand `path` with no projection or model override
    pub fn path(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            select: None,
            model: None,
        }
    }
}

/// Relationship expansion directive
///
/// Accepts a space separated path string, an options object, or a list of
/// either.
///
/// # Example
///
/// ```rust
/// use resource_handlers::store::Populate;
///
/// let populate: Populate = serde_json::from_str(r#""user user.role""#).unwrap();
/// let paths: Vec<_> = populate.directives().into_iter().map(|d| d.path).collect();
/// assert_eq!(paths, vec!["user", "user.role"]);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Populate {
    /// Space separated paths
    Paths(String),
    /// A single path with options
    Options(PopulateOptions),
    /// Several directives applied in order
    Many(Vec<Populate>),
}

impl Populate {
    /// Flatten into individual path directives, preserving order
    #[must_use]
    pub fn directives(&self) -> Vec<PopulateOptions> {
        match self {
            Self::Paths(paths) => paths.split_whitespace().map(PopulateOptions::path).collect(),
            Self::Options(options) => vec![options.clone()],
            Self::Many(list) => list.iter().flat_map(Populate::directives).collect(),
        }
    }
}

/// A textual field that must match a pattern
#[derive(Debug, Clone)]
pub struct FieldPattern {
    /// Dotted field path
    pub path: String,
    /// Pattern the field value must match
    pub pattern: Regex,
}

/// Document filter
///
/// `conditions` uses the store's raw condition syntax (field to value or
/// operator object). `any_of` holds pattern conditions of which at least one
/// must match; an empty list imposes nothing.
#[derive(Debug, Clone, Default)]
pub struct Filter {
    /// Field conditions, all of which must hold
    pub conditions: Map<String, Value>,
    /// Pattern alternatives, one of which must hold when non-empty
    pub any_of: Vec<FieldPattern>,
}

impl Filter {
    /// Filter from raw conditions
    pub fn new(conditions: Map<String, Value>) -> Self {
        Self {
            conditions,
            any_of: Vec::new(),
        }
    }

    /// Shallow-merge `conditions`; later keys replace earlier ones
    pub fn merge(&mut self, conditions: &Map<String, Value>) {
        for (key, value) in conditions {
            self.conditions.insert(key.clone(), value.clone());
        }
    }

    /// Whether the filter matches every document
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty() && self.any_of.is_empty()
    }
}

/// What the query addresses
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// Exactly one document by identity
    ById(String),
    /// Every document matching the filter
    Collection,
}

/// Fully specified store query
#[derive(Debug, Clone)]
pub struct Query {
    /// Single document or collection
    pub target: Target,
    /// Filter shared with the count query
    pub filter: Filter,
    /// Documents to skip
    pub skip: Option<u64>,
    /// Maximum documents to return
    pub limit: Option<u64>,
    /// Ordering
    pub sort: Option<SortSpec>,
    /// Relationship expansion
    pub populate: Option<Populate>,
    /// Field projection
    pub select: Option<Select>,
}

impl Query {
    /// Query the collection with base `conditions`
    pub fn find(conditions: Map<String, Value>) -> Self {
        Self {
            target: Target::Collection,
            filter: Filter::new(conditions),
            skip: None,
            limit: None,
            sort: None,
            populate: None,
            select: None,
        }
    }

    /// Query a single document by identity
    pub fn find_by_id(id: impl Into<String>) -> Self {
        let id = id.into();
        let mut conditions = Map::new();
        conditions.insert(ID_CONDITION.to_string(), Value::String(id.clone()));
        Self {
            target: Target::ById(id),
            ..Self::find(conditions)
        }
    }

    /// Skip the first `n` documents
    #[must_use]
    pub fn skip(mut self, n: u64) -> Self {
        self.skip = Some(n);
        self
    }

    /// Return at most `n` documents
    #[must_use]
    pub fn limit(mut self, n: u64) -> Self {
        self.limit = Some(n);
        self
    }

    /// Order the result
    #[must_use]
    pub fn sort(mut self, sort: SortSpec) -> Self {
        self.sort = Some(sort);
        self
    }

    /// Merge raw conditions into the filter
    #[must_use]
    pub fn merge_where(mut self, conditions: &Map<String, Value>) -> Self {
        self.filter.merge(conditions);
        self
    }

    /// Expand relationships in the result
    #[must_use]
    pub fn populate(mut self, populate: Populate) -> Self {
        self.populate = Some(populate);
        self
    }

    /// Project fields in the result
    #[must_use]
    pub fn select(mut self, select: Select) -> Self {
        self.select = Some(select);
        self
    }

    /// Require at least one of `patterns` to match
    #[must_use]
    pub fn or(mut self, patterns: Vec<FieldPattern>) -> Self {
        self.filter.any_of = patterns;
        self
    }

    /// Whether this query addresses a single document
    #[must_use]
    pub fn is_by_id(&self) -> bool {
        matches!(self.target, Target::ById(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_sort_spec_string() {
        let keys = SortSpec::Fields("-name  age".to_string()).keys();
        assert_eq!(
            keys,
            vec![
                SortKey {
                    field: "name".to_string(),
                    direction: OrderDirection::Descending
                },
                SortKey {
                    field: "age".to_string(),
                    direction: OrderDirection::Ascending
                },
            ]
        );
    }

    #[test]
    fn test_sort_spec_list_skips_empty() {
        let keys = SortSpec::List(vec!["-".to_string(), "+age".to_string()]).keys();
        assert_eq!(keys.len(), 1);
        assert_eq!(keys[0].field, "age");
    }

    #[test]
    fn test_sort_spec_deserializes_both_forms() {
        let spec: SortSpec = serde_json::from_value(json!("-name")).unwrap();
        assert_eq!(spec, SortSpec::Fields("-name".to_string()));
        let spec: SortSpec = serde_json::from_value(json!(["-name", "age"])).unwrap();
        assert!(matches!(spec, SortSpec::List(ref l) if l.len() == 2));
    }

    #[test]
    fn test_select_inclusion_string() {
        let projection = Select::Fields("name age".to_string()).projection().unwrap();
        assert_eq!(
            projection,
            Projection::Include(vec!["name".to_string(), "age".to_string()])
        );
    }

    #[test]
    fn test_select_exclusion_string() {
        let projection = Select::Fields("-password".to_string()).projection().unwrap();
        assert_eq!(projection, Projection::Exclude(vec!["password".to_string()]));
    }

    #[test]
    fn test_select_projection_object() {
        let projection = Select::Projection(object(json!({"name": 1})))
            .projection()
            .unwrap();
        assert_eq!(projection, Projection::Include(vec!["name".to_string()]));

        let projection = Select::Projection(object(json!({"password": false})))
            .projection()
            .unwrap();
        assert_eq!(projection, Projection::Exclude(vec!["password".to_string()]));
    }

    #[test]
    fn test_select_rejects_mixed_projection() {
        let err = Select::Fields("name -password".to_string())
            .projection()
            .unwrap_err();
        assert!(err.message.contains("mix"));
    }

    #[test]
    fn test_select_rejects_bad_flag() {
        assert!(Select::Projection(object(json!({"name": "yes"})))
            .projection()
            .is_err());
    }

    #[test]
    fn test_populate_forms() {
        let populate: Populate = serde_json::from_value(json!("user")).unwrap();
        assert_eq!(populate.directives(), vec![PopulateOptions::path("user")]);

        let populate: Populate =
            serde_json::from_value(json!({"path": "user", "select": "username"})).unwrap();
        let directives = populate.directives();
        assert_eq!(directives[0].path, "user");
        assert_eq!(
            directives[0].select,
            Some(Select::Fields("username".to_string()))
        );

        let populate: Populate =
            serde_json::from_value(json!(["user", {"path": "role", "model": "Role"}])).unwrap();
        let directives = populate.directives();
        assert_eq!(directives.len(), 2);
        assert_eq!(directives[1].model.as_deref(), Some("Role"));
    }

    #[test]
    fn test_find_by_id_sets_identity_condition() {
        let query = Query::find_by_id("abc");
        assert!(query.is_by_id());
        assert_eq!(query.filter.conditions.get(ID_CONDITION), Some(&json!("abc")));
    }

    #[test]
    fn test_merge_where_replaces_keys() {
        let query = Query::find(object(json!({"age": 1, "name": "x"})))
            .merge_where(&object(json!({"age": {"$gte": 17}})));
        assert_eq!(query.filter.conditions.get("age"), Some(&json!({"$gte": 17})));
        assert_eq!(query.filter.conditions.get("name"), Some(&json!("x")));
    }

    #[test]
    fn test_builder_sets_paging() {
        let query = Query::find(Map::new()).skip(20).limit(10);
        assert_eq!(query.skip, Some(20));
        assert_eq!(query.limit, Some(10));
        assert!(query.filter.is_empty());
    }
}
