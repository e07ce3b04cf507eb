//! Declared field types of a model

use serde::{Deserialize, Serialize};

/// Declared type of a schema path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    /// Text; the only type searched by the `search` parameter
    String,
    /// Integer or floating point number
    Number,
    /// Boolean flag
    Boolean,
    /// Timestamp
    Date,
    /// List of values
    Array,
    /// Reference to a document of the named model
    Ref(String),
    /// Anything
    Mixed,
}

/// Ordered list of field paths and their types
///
/// # Example
///
/// ```rust
/// use resource_handlers::store::{FieldType, Schema};
///
/// let schema = Schema::new()
///     .field("name", FieldType::String)
///     .field("age", FieldType::Number)
///     .field("user", FieldType::Ref("User".to_string()));
///
/// let text: Vec<_> = schema.text_paths().collect();
/// assert_eq!(text, vec!["name"]);
/// assert_eq!(schema.reference("user"), Some("User"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    paths: Vec<SchemaPath>,
}

/// One declared path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaPath {
    /// Dotted path
    pub path: String,
    /// Declared type
    pub field_type: FieldType,
    /// Whether a saved document must carry a non-null value here
    #[serde(default)]
    pub required: bool,
}

impl Schema {
    /// Empty schema
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare an optional path; redeclaring a path replaces it
    #[must_use]
    pub fn field(self, path: impl Into<String>, field_type: FieldType) -> Self {
        self.declare(path.into(), field_type, false)
    }

    /// Declare a path that must be present on save
    #[must_use]
    pub fn required_field(self, path: impl Into<String>, field_type: FieldType) -> Self {
        self.declare(path.into(), field_type, true)
    }

    fn declare(mut self, path: String, field_type: FieldType, required: bool) -> Self {
        let entry = SchemaPath {
            path,
            field_type,
            required,
        };
        match self.paths.iter_mut().find(|p| p.path == entry.path) {
            Some(existing) => *existing = entry,
            None => self.paths.push(entry),
        }
        self
    }

    /// Every declared path with its type, in declaration order
    pub fn paths(&self) -> impl Iterator<Item = (&str, &FieldType)> {
        self.paths.iter().map(|p| (p.path.as_str(), &p.field_type))
    }

    /// Paths that must be present on save
    pub fn required_paths(&self) -> impl Iterator<Item = &str> {
        self.paths
            .iter()
            .filter(|p| p.required)
            .map(|p| p.path.as_str())
    }

    /// Type of a single path
    #[must_use]
    pub fn path_type(&self, path: &str) -> Option<&FieldType> {
        self.paths
            .iter()
            .find(|p| p.path == path)
            .map(|p| &p.field_type)
    }

    /// Paths declared as text
    pub fn text_paths(&self) -> impl Iterator<Item = &str> {
        self.paths()
            .filter(|(_, t)| matches!(t, FieldType::String))
            .map(|(p, _)| p)
    }

    /// Model referenced by `path`, if it is declared as a reference
    #[must_use]
    pub fn reference(&self, path: &str) -> Option<&str> {
        match self.path_type(path) {
            Some(FieldType::Ref(model)) => Some(model.as_str()),
            _ => None,
        }
    }
}
