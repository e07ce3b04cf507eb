//! In-process document store
//!
//! [`MemoryStore`] keeps every registered model's documents in memory and
//! implements the full [`Model`]/[`Document`] contract: Mongo-style filter
//! conditions, ordering, paging, projection and reference expansion. It backs
//! the crate's tests and is a reasonable store for prototypes and demos.
//!
//! Identities are UUIDs held in the `id` field; the `_id` filter key reads it.
//! A condition or lookup with an identity that does not parse as a UUID fails
//! with [`StoreErrorKind::InvalidId`](crate::store::StoreErrorKind::InvalidId).
//!
//! # Example
//!
//! ```rust
//! use resource_handlers::store::{FieldType, MemoryStore, Model, Query, Schema};
//! use serde_json::json;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let store = MemoryStore::new();
//! let roles = store.register("Role", Schema::new().field("name", FieldType::String))?;
//! store.insert("Role", json!({"name": "Admin"}))?;
//!
//! let found = roles.exec(&Query::find(Default::default())).await?;
//! assert_eq!(found.map(|f| f.len()), Some(1));
//! # Ok(())
//! # }
//! ```

mod matcher;
mod populate;
mod shape;

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Map, Value};
use uuid::Uuid;

use self::matcher::ID_FIELD;
use super::error::{StoreError, StoreOperation};
use super::query::{Filter, Populate, Query, Select, Target, ID_CONDITION};
use super::schema::{FieldType, Schema};
use super::traits::{Credentials, Document, Found, Model, StoreResult, Touch};

/// Field stamped with the caller's subject by the touch hook
pub const UPDATED_BY_FIELD: &str = "updatedBy";

/// Field stamped with the modification time by the touch hook
pub const UPDATED_AT_FIELD: &str = "updatedAt";

fn document_id(doc: &Value) -> Option<&str> {
    doc.get(ID_FIELD).and_then(Value::as_str)
}

/// Merge `incoming` into `fields` path by path
///
/// Nested objects merge key by key so unsent siblings survive. `Mixed` and
/// `Ref` paths hold opaque values and are replaced whole.
fn merge_fields(
    schema: &Schema,
    prefix: &str,
    fields: &mut Map<String, Value>,
    incoming: Map<String, Value>,
) {
    for (key, value) in incoming {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{}.{}", prefix, key)
        };
        let opaque = matches!(
            schema.path_type(&path),
            Some(FieldType::Mixed | FieldType::Ref(_))
        );
        match value {
            Value::Object(nested) if !opaque => match fields.get_mut(&key) {
                Some(Value::Object(existing)) => merge_fields(schema, &path, existing, nested),
                _ => {
                    fields.insert(key, Value::Object(nested));
                }
            },
            value => {
                fields.insert(key, value);
            }
        }
    }
}

/// Documents of one registered model
pub(crate) struct Collection {
    name: String,
    schema: Schema,
    touch: bool,
    docs: RwLock<Vec<Value>>,
}

impl Collection {
    fn read(&self, operation: StoreOperation) -> StoreResult<RwLockReadGuard<'_, Vec<Value>>> {
        self.docs
            .read()
            .map_err(|_| StoreError::backend(operation, format!("Collection {} is poisoned", self.name)))
    }

    fn write(&self, operation: StoreOperation) -> StoreResult<RwLockWriteGuard<'_, Vec<Value>>> {
        self.docs
            .write()
            .map_err(|_| StoreError::backend(operation, format!("Collection {} is poisoned", self.name)))
    }

    fn parse_id(&self, id: &str, operation: StoreOperation) -> StoreResult<()> {
        Uuid::parse_str(id)
            .map(|_| ())
            .map_err(|_| StoreError::invalid_id(&self.name, id).with_operation(operation))
    }

    fn check_filter(&self, filter: &Filter, operation: StoreOperation) -> StoreResult<()> {
        match filter.conditions.get(ID_CONDITION) {
            Some(Value::String(id)) => self.parse_id(id, operation),
            _ => Ok(()),
        }
    }

    fn matching(&self, filter: &Filter, operation: StoreOperation) -> StoreResult<Vec<Value>> {
        self.check_filter(filter, operation)?;
        let docs = self.read(operation)?;
        let mut matched = Vec::new();
        for doc in docs.iter() {
            if matcher::matches(doc, filter).map_err(|e| e.with_operation(operation))? {
                matched.push(doc.clone());
            }
        }
        Ok(matched)
    }

    /// Reject documents whose declared paths hold the wrong kind of value
    fn validate(&self, doc: &Value) -> StoreResult<()> {
        for path in self.schema.required_paths() {
            if matcher::lookup(doc, path).map_or(true, Value::is_null) {
                return Err(StoreError::validation_failed(format!(
                    "Path `{}` is required.",
                    path
                ))
                .with_entity(&self.name, document_id(doc).unwrap_or_default()));
            }
        }

        for (path, field_type) in self.schema.paths() {
            let Some(value) = matcher::lookup(doc, path).filter(|v| !v.is_null()) else {
                continue;
            };
            let fits = match field_type {
                FieldType::String | FieldType::Date => value.is_string(),
                FieldType::Number => value.is_number(),
                FieldType::Boolean => value.is_boolean(),
                FieldType::Array => value.is_array(),
                FieldType::Ref(_) => value.is_string() || value.is_object(),
                FieldType::Mixed => true,
            };
            if !fits {
                return Err(StoreError::validation_failed(format!(
                    "Cast to {:?} failed for value {} at path \"{}\"",
                    field_type, value, path
                ))
                .with_entity(&self.name, document_id(doc).unwrap_or_default()));
            }
        }
        Ok(())
    }
}

/// Shared in-memory store; clones address the same models
#[derive(Clone, Default)]
pub struct MemoryStore {
    collections: Arc<RwLock<HashMap<String, Arc<Collection>>>>,
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<String> = self
            .collections
            .read()
            .map(|c| c.keys().cloned().collect())
            .unwrap_or_default();
        f.debug_struct("MemoryStore").field("models", &names).finish()
    }
}

impl MemoryStore {
    /// Empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register model `name`; re-registering replaces the schema and drops
    /// its documents
    pub fn register(&self, name: impl Into<String>, schema: Schema) -> StoreResult<Arc<dyn Model>> {
        self.define(name.into(), schema, false)
    }

    /// Register model `name` with documents that stamp
    /// `updatedBy`/`updatedAt` before every save
    pub fn register_with_touch(
        &self,
        name: impl Into<String>,
        schema: Schema,
    ) -> StoreResult<Arc<dyn Model>> {
        self.define(name.into(), schema, true)
    }

    fn define(&self, name: String, schema: Schema, touch: bool) -> StoreResult<Arc<dyn Model>> {
        let collection = Arc::new(Collection {
            name: name.clone(),
            schema,
            touch,
            docs: RwLock::new(Vec::new()),
        });
        self.collections
            .write()
            .map_err(|_| StoreError::backend(StoreOperation::Model, "Model registry is poisoned"))?
            .insert(name.clone(), Arc::clone(&collection));

        tracing::debug!(model = %name, touch, "Registered model");
        Ok(self.handle(collection))
    }

    fn handle(&self, collection: Arc<Collection>) -> Arc<dyn Model> {
        Arc::new(MemoryModel {
            store: self.clone(),
            collection,
        })
    }

    pub(crate) fn collection(&self, name: &str) -> StoreResult<Arc<Collection>> {
        self.collections
            .read()
            .map_err(|_| StoreError::backend(StoreOperation::Model, "Model registry is poisoned"))?
            .get(name)
            .cloned()
            .ok_or_else(|| StoreError::missing_model(name))
    }

    /// Resolve a registered model
    ///
    /// # Errors
    ///
    /// [`StoreErrorKind::MissingModel`](crate::store::StoreErrorKind::MissingModel)
    /// when no model is registered under `name`.
    pub fn model(&self, name: &str) -> StoreResult<Arc<dyn Model>> {
        self.collection(name).map(|c| self.handle(c))
    }

    /// Names of every registered model
    pub fn model_names(&self) -> Vec<String> {
        self.collections
            .read()
            .map(|c| c.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Store `doc` as-is, assigning an identity when it has none
    ///
    /// Seeding bypasses validation and the touch hook. Returns the stored
    /// document.
    pub fn insert(&self, name: &str, doc: Value) -> StoreResult<Value> {
        let collection = self.collection(name)?;
        let Value::Object(mut fields) = doc else {
            return Err(StoreError::validation_failed("Documents must be objects")
                .with_operation(StoreOperation::Save));
        };
        let existing = fields.get(ID_FIELD).and_then(Value::as_str).map(str::to_string);
        match existing {
            Some(id) => collection.parse_id(&id, StoreOperation::Save)?,
            None => {
                fields.insert(ID_FIELD.to_string(), Value::String(Uuid::new_v4().to_string()));
            }
        }
        let doc = Value::Object(fields);
        collection.write(StoreOperation::Save)?.push(doc.clone());
        Ok(doc)
    }

    /// Number of documents stored for `name`
    pub fn document_count(&self, name: &str) -> StoreResult<usize> {
        let collection = self.collection(name)?;
        let count = collection.read(StoreOperation::Count)?.len();
        Ok(count)
    }
}

/// [`Model`] handle over one collection of a [`MemoryStore`]
pub struct MemoryModel {
    store: MemoryStore,
    collection: Arc<Collection>,
}

impl MemoryModel {
    fn shape(&self, mut docs: Vec<Value>, query: &Query) -> StoreResult<Vec<Value>> {
        if let Some(sort) = &query.sort {
            shape::sort_documents(&mut docs, &sort.keys());
        }

        let skip = usize::try_from(query.skip.unwrap_or(0)).unwrap_or(usize::MAX);
        let limit = query
            .limit
            .map_or(usize::MAX, |l| usize::try_from(l).unwrap_or(usize::MAX));
        let mut docs: Vec<Value> = docs.into_iter().skip(skip).take(limit).collect();

        if let Some(projection) = query.select.as_ref().map(Select::projection).transpose()? {
            for doc in &mut docs {
                shape::project(doc, &projection);
            }
        }
        Ok(docs)
    }
}

#[async_trait]
impl Model for MemoryModel {
    fn name(&self) -> &str {
        &self.collection.name
    }

    fn schema(&self) -> &Schema {
        &self.collection.schema
    }

    fn model(&self, name: &str) -> StoreResult<Arc<dyn Model>> {
        self.store.model(name)
    }

    async fn count(&self, filter: &Filter) -> StoreResult<u64> {
        let matched = self.collection.matching(filter, StoreOperation::Count)?;
        Ok(matched.len() as u64)
    }

    async fn exec(&self, query: &Query) -> StoreResult<Option<Found>> {
        let operation = match query.target {
            Target::ById(_) => StoreOperation::FindById,
            Target::Collection => StoreOperation::Find,
        };
        if let Target::ById(id) = &query.target {
            self.collection.parse_id(id, operation)?;
        }

        let matched = self.collection.matching(&query.filter, operation)?;
        let docs = self.shape(matched, query)?;

        let found = match query.target {
            Target::ById(_) => match docs.into_iter().next() {
                Some(doc) => Found::One(doc),
                None => return Ok(None),
            },
            Target::Collection => Found::Many(docs),
        };

        match &query.populate {
            Some(populate) => self.populate(found, populate).await.map(Some),
            None => Ok(Some(found)),
        }
    }

    async fn populate(&self, found: Found, populate: &Populate) -> StoreResult<Found> {
        populate::populate_found(&self.store, &self.collection, found, populate)
    }

    async fn find_by_id(&self, id: &str) -> StoreResult<Option<Box<dyn Document>>> {
        self.collection.parse_id(id, StoreOperation::FindById)?;
        let docs = self.collection.read(StoreOperation::FindById)?;
        let found = docs
            .iter()
            .find(|doc| document_id(doc) == Some(id))
            .and_then(|doc| doc.as_object().cloned());

        Ok(found.map(|fields| {
            Box::new(MemoryDocument {
                collection: Arc::clone(&self.collection),
                id: id.to_string(),
                fields,
                persisted: true,
            }) as Box<dyn Document>
        }))
    }

    fn new_document(&self, mut fields: Map<String, Value>) -> StoreResult<Box<dyn Document>> {
        fields.remove(ID_FIELD);
        fields.remove(ID_CONDITION);
        let id = Uuid::new_v4().to_string();
        fields.insert(ID_FIELD.to_string(), Value::String(id.clone()));
        Ok(Box::new(MemoryDocument {
            collection: Arc::clone(&self.collection),
            id,
            fields,
            persisted: false,
        }))
    }
}

/// Document loaded from or bound for a [`MemoryStore`] collection
pub struct MemoryDocument {
    collection: Arc<Collection>,
    id: String,
    fields: Map<String, Value>,
    persisted: bool,
}

impl MemoryDocument {
    /// The stored copy was removed after this document was loaded
    fn vanished(&self, operation: StoreOperation) -> StoreError {
        StoreError::not_found(&self.collection.name, &self.id).with_operation(operation)
    }
}

impl Touch for MemoryDocument {
    fn touch(&mut self, credentials: Option<&Credentials>) {
        let subject = credentials.map_or(Value::Null, |c| Value::String(c.subject.clone()));
        self.fields.insert(UPDATED_BY_FIELD.to_string(), subject);
        self.fields.insert(
            UPDATED_AT_FIELD.to_string(),
            Value::String(Utc::now().to_rfc3339()),
        );
    }
}

#[async_trait]
impl Document for MemoryDocument {
    fn id(&self) -> &str {
        &self.id
    }

    fn set(&mut self, mut fields: Map<String, Value>) {
        fields.remove(ID_FIELD);
        fields.remove(ID_CONDITION);
        merge_fields(&self.collection.schema, "", &mut self.fields, fields);
    }

    fn touch_hook(&mut self) -> Option<&mut dyn Touch> {
        if self.collection.touch {
            Some(self)
        } else {
            None
        }
    }

    fn to_value(&self) -> Value {
        Value::Object(self.fields.clone())
    }

    async fn save(&mut self) -> StoreResult<()> {
        let doc = self.to_value();
        self.collection.validate(&doc)?;

        let mut docs = self.collection.write(StoreOperation::Save)?;
        match docs.iter_mut().find(|d| document_id(d) == Some(self.id.as_str())) {
            Some(existing) => *existing = doc,
            None if self.persisted => {
                return Err(self.vanished(StoreOperation::Save));
            }
            None => docs.push(doc),
        }
        self.persisted = true;
        Ok(())
    }

    async fn remove(&mut self) -> StoreResult<()> {
        let mut docs = self.collection.write(StoreOperation::Remove)?;
        let before = docs.len();
        docs.retain(|d| document_id(d) != Some(self.id.as_str()));
        if docs.len() == before {
            return Err(self.vanished(StoreOperation::Remove));
        }
        self.persisted = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::query::{PopulateOptions, SortSpec};
    use crate::store::StoreErrorKind;
    use serde_json::json;

    fn seeded() -> (MemoryStore, Value, Value) {
        let store = MemoryStore::new();
        store
            .register("Role", Schema::new().field("name", FieldType::String))
            .unwrap();
        store
            .register(
                "User",
                Schema::new()
                    .required_field("username", FieldType::String)
                    .field("role", FieldType::Ref("Role".to_string())),
            )
            .unwrap();
        store
            .register_with_touch(
                "Admin",
                Schema::new()
                    .field("name", FieldType::String)
                    .field("age", FieldType::Number)
                    .field("user", FieldType::Ref("User".to_string())),
            )
            .unwrap();

        let role = store.insert("Role", json!({"name": "Admin"})).unwrap();
        let user = store
            .insert("User", json!({"username": "jo", "role": role["id"]}))
            .unwrap();
        for i in 0..5 {
            store
                .insert(
                    "Admin",
                    json!({"name": format!("Administrator {}", i), "age": i, "user": user["id"]}),
                )
                .unwrap();
        }
        (store, role, user)
    }

    #[tokio::test]
    async fn test_exec_collection_paging_and_sort() {
        let (store, _, _) = seeded();
        let admins = store.model("Admin").unwrap();
        let query = Query::find(Map::new())
            .sort(SortSpec::Fields("-age".to_string()))
            .skip(1)
            .limit(2);
        let Some(Found::Many(docs)) = admins.exec(&query).await.unwrap() else {
            panic!("expected a list");
        };
        let ages: Vec<_> = docs.iter().map(|d| d["age"].as_i64().unwrap()).collect();
        assert_eq!(ages, vec![3, 2]);
    }

    #[tokio::test]
    async fn test_count_uses_filter() {
        let (store, _, _) = seeded();
        let admins = store.model("Admin").unwrap();
        let filter = Filter::new(json!({"age": {"$gte": 3}}).as_object().cloned().unwrap());
        assert_eq!(admins.count(&filter).await.unwrap(), 2);
        assert_eq!(admins.count(&Filter::default()).await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_exec_by_id_and_missing() {
        let (store, _, user) = seeded();
        let users = store.model("User").unwrap();
        let id = user["id"].as_str().unwrap();

        let found = users.exec(&Query::find_by_id(id)).await.unwrap();
        assert!(matches!(found, Some(Found::One(ref doc)) if doc["username"] == "jo"));

        let missing = Uuid::new_v4().to_string();
        assert!(users.exec(&Query::find_by_id(missing)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_bad_id_is_invalid_id() {
        let (store, _, _) = seeded();
        let users = store.model("User").unwrap();
        let err = users.exec(&Query::find_by_id("abc33")).await.unwrap_err();
        assert_eq!(err.kind, StoreErrorKind::InvalidId);
        let err = users.find_by_id("abc33").await.err().unwrap();
        assert_eq!(err.kind, StoreErrorKind::InvalidId);
    }

    #[tokio::test]
    async fn test_select_on_exec() {
        let (store, _, _) = seeded();
        let admins = store.model("Admin").unwrap();
        let query = Query::find(Map::new()).select(Select::Fields("name".to_string()));
        let found = admins.exec(&query).await.unwrap().unwrap().into_value();
        let first = found[0].as_object().unwrap();
        assert!(first.contains_key("id"));
        assert!(first.contains_key("name"));
        assert!(!first.contains_key("age"));
    }

    #[tokio::test]
    async fn test_populate_follows_schema_references() {
        let (store, role, user) = seeded();
        let admins = store.model("Admin").unwrap();
        let query = Query::find(Map::new()).populate(Populate::Paths("user".to_string()));
        let found = admins.exec(&query).await.unwrap().unwrap();

        let roles = store.model("Role").unwrap();
        let deep = roles
            .populate(found, &Populate::Paths("user.role".to_string()))
            .await
            .unwrap()
            .into_value();
        assert_eq!(deep[0]["user"]["id"], user["id"]);
        assert_eq!(deep[0]["user"]["role"]["name"], role["name"]);
    }

    #[tokio::test]
    async fn test_populate_with_select_and_missing_reference() {
        let (store, _, _) = seeded();
        store
            .insert("Admin", json!({"name": "orphan", "user": Uuid::new_v4().to_string()}))
            .unwrap();
        let admins = store.model("Admin").unwrap();
        let populate = Populate::Options(PopulateOptions {
            path: "user".to_string(),
            select: Some(Select::Fields("-role".to_string())),
            model: None,
        });
        let query = Query::find(json!({"name": "orphan"}).as_object().cloned().unwrap());
        let found = admins.exec(&query).await.unwrap().unwrap();
        let found = admins.populate(found, &populate).await.unwrap().into_value();
        assert_eq!(found[0]["user"], Value::Null);

        let query = Query::find(json!({"age": 0}).as_object().cloned().unwrap()).populate(populate);
        let found = admins.exec(&query).await.unwrap().unwrap().into_value();
        assert_eq!(found[0]["user"]["username"], "jo");
        assert!(found[0]["user"].get("role").is_none());
    }

    #[tokio::test]
    async fn test_missing_model() {
        let store = MemoryStore::new();
        let err = store.model("Ghost").err().unwrap();
        assert_eq!(err.kind, StoreErrorKind::MissingModel);
    }

    #[tokio::test]
    async fn test_document_lifecycle_with_touch() {
        let (store, _, _) = seeded();
        let admins = store.model("Admin").unwrap();

        let mut doc = admins
            .new_document(json!({"id": "ignored", "name": "new"}).as_object().cloned().unwrap())
            .unwrap();
        assert_ne!(doc.id(), "ignored");
        let creds = Credentials::new("u-1");
        doc.touch_hook().unwrap().touch(Some(&creds));
        doc.save().await.unwrap();
        assert_eq!(store.document_count("Admin").unwrap(), 6);

        let mut loaded = admins.find_by_id(doc.id()).await.unwrap().unwrap();
        assert_eq!(loaded.to_value()[UPDATED_BY_FIELD], "u-1");
        loaded.set(json!({"name": "renamed"}).as_object().cloned().unwrap());
        loaded.save().await.unwrap();
        assert_eq!(store.document_count("Admin").unwrap(), 6);

        loaded.remove().await.unwrap();
        assert_eq!(store.document_count("Admin").unwrap(), 5);
    }

    #[tokio::test]
    async fn test_set_merges_nested_paths() {
        let store = MemoryStore::new();
        let people = store
            .register(
                "Person",
                Schema::new()
                    .field("profile.city", FieldType::String)
                    .field("profile.phone", FieldType::String)
                    .field("extra", FieldType::Mixed),
            )
            .unwrap();
        let seeded = store
            .insert(
                "Person",
                json!({
                    "profile": {"city": "Paris", "phone": "123"},
                    "extra": {"a": 1, "b": 2},
                }),
            )
            .unwrap();

        let mut doc = people
            .find_by_id(seeded["id"].as_str().unwrap())
            .await
            .unwrap()
            .unwrap();
        doc.set(
            json!({"profile": {"city": "Rome"}, "extra": {"a": 3}})
                .as_object()
                .cloned()
                .unwrap(),
        );
        let value = doc.to_value();
        assert_eq!(value["profile"], json!({"city": "Rome", "phone": "123"}));
        assert_eq!(value["extra"], json!({"a": 3}));
    }

    #[tokio::test]
    async fn test_vanished_document_is_not_found() {
        let (store, _, user) = seeded();
        let users = store.model("User").unwrap();
        let id = user["id"].as_str().unwrap();

        let mut first = users.find_by_id(id).await.unwrap().unwrap();
        let mut second = users.find_by_id(id).await.unwrap().unwrap();
        first.remove().await.unwrap();

        let err = second.save().await.unwrap_err();
        assert_eq!(err.kind, StoreErrorKind::NotFound);
        assert_eq!(err.operation, StoreOperation::Save);
        let err = second.remove().await.unwrap_err();
        assert_eq!(err.kind, StoreErrorKind::NotFound);
        assert_eq!(store.document_count("User").unwrap(), 0);
    }

    #[tokio::test]
    async fn test_touch_hook_absent_without_touch() {
        let (store, _, _) = seeded();
        let roles = store.model("Role").unwrap();
        let mut doc = roles.new_document(Map::new()).unwrap();
        assert!(doc.touch_hook().is_none());
    }

    #[tokio::test]
    async fn test_save_validates_schema() {
        let (store, _, _) = seeded();
        let users = store.model("User").unwrap();
        let mut doc = users.new_document(Map::new()).unwrap();
        let err = doc.save().await.unwrap_err();
        assert_eq!(err.kind, StoreErrorKind::ValidationFailed);

        let mut doc = users
            .new_document(json!({"username": 5}).as_object().cloned().unwrap())
            .unwrap();
        assert!(doc.save().await.is_err());
    }
}
