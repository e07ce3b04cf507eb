//! Axum wiring
//!
//! [`routes`] mounts the handler table on five routes:
//!
//! | method | path | operation |
//! |---|---|---|
//! | GET | `/{model}` | find (list) |
//! | GET | `/{model}/{id}` | find (one) |
//! | POST | `/{model}` | create |
//! | PUT | `/{model}/{id}` | update |
//! | DELETE | `/{model}/{id}` | remove |
//!
//! The `{model}` segment is resolved by a [`ResourceBinder`]. Caller
//! credentials and base conditions are read from request extensions, so an
//! authentication layer only has to insert [`Credentials`] (and, if it scopes
//! data, [`Conditions`]).
//!
//! Structured query parameters (`where`, `sort`, `populate`, `select` and
//! `deepPopulate`) are JSON-encoded values, for example
//! `deepPopulate=[{"modelName":"Role","populate":"user.role"}]`. Bracketed
//! keys such as `deepPopulate[0][modelName]=Role` are rejected with 400.
//!
//! # Example
//!
//! ```rust,no_run
//! use resource_handlers::prelude::*;
//!
//! # #[cfg(feature = "memory-store")]
//! # async fn run() -> Result<()> {
//! let config = Config::load()?;
//! let store = MemoryStore::new();
//! store.register("Admin", Schema::new().field("name", FieldType::String))?;
//!
//! let table = HandlerTable::new(config.handlers.clone())?;
//! let app = axum::Router::new().nest("/v1", routes(table, store));
//! # let _ = app;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::Uri,
    routing::get,
    Extension, Router,
};
use serde_json::Value;

use super::error::{ApiError, ApiOperation};
use super::query::{ListQuery, RawListQuery};
use super::registry::{HandlerTable, Operation};
use super::request::{Conditions, ResourceBinding, ResourceRequest};
use super::response::Reply;
use crate::store::{Credentials, Model};

/// Resolves the `{model}` path segment to a collection
pub trait ResourceBinder: Send + Sync + 'static {
    /// The model addressed by `segment`, if any
    fn bind(&self, segment: &str) -> Option<Arc<dyn Model>>;
}

/// Conventional model name for a path segment: singular, capitalized
///
/// # Example
///
/// ```rust
/// use resource_handlers::handlers::model_name_for;
///
/// assert_eq!(model_name_for("admins"), "Admin");
/// assert_eq!(model_name_for("categories"), "Category");
/// assert_eq!(model_name_for("status"), "Status");
/// ```
#[must_use]
pub fn model_name_for(segment: &str) -> String {
    let singular = if let Some(stem) = segment.strip_suffix("ies") {
        format!("{}y", stem)
    } else if segment.ends_with("ss") || segment.ends_with("us") {
        segment.to_string()
    } else if let Some(stem) = segment.strip_suffix('s') {
        stem.to_string()
    } else {
        segment.to_string()
    };

    let mut chars = singular.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(feature = "memory-store")]
impl ResourceBinder for crate::store::MemoryStore {
    fn bind(&self, segment: &str) -> Option<Arc<dyn Model>> {
        self.model(segment)
            .or_else(|_| self.model(&model_name_for(segment)))
            .ok()
    }
}

#[derive(Clone)]
struct RouteState {
    table: Arc<HandlerTable>,
    binder: Arc<dyn ResourceBinder>,
}

/// Everything the extractors collected, before parsing
struct Inbound {
    uri: Uri,
    model: String,
    id: Option<String>,
    raw: RawListQuery,
    body: Option<Bytes>,
    credentials: Option<Extension<Credentials>>,
    conditions: Option<Extension<Conditions>>,
}

/// Whether the query string spells `deepPopulate` with bracketed keys
fn bracketed_deep_populate(uri: &Uri) -> bool {
    uri.query().is_some_and(|query| {
        query.split('&').any(|pair| {
            let key = pair.split('=').next().unwrap_or_default();
            key.strip_prefix("deepPopulate").is_some_and(|rest| {
                rest.starts_with('[') || rest.get(..3).is_some_and(|s| s.eq_ignore_ascii_case("%5b"))
            })
        })
    })
}

impl Inbound {
    fn into_request(self, state: &RouteState, operation: ApiOperation) -> Result<ResourceRequest, ApiError> {
        if bracketed_deep_populate(&self.uri) {
            return Err(ApiError::validation_failed(
                operation,
                "deepPopulate must be a JSON-encoded array",
            ));
        }
        let query = ListQuery::try_from(self.raw).map_err(|e| e.with_operation(operation))?;
        let payload = match self.body.filter(|b| !b.is_empty()) {
            Some(bytes) => Some(serde_json::from_slice::<Value>(&bytes).map_err(|e| {
                ApiError::validation_failed(operation, format!("Invalid JSON payload: {}", e))
            })?),
            None => None,
        };

        Ok(ResourceRequest {
            path: self.uri.path().to_string(),
            id: self.id,
            query,
            payload,
            credentials: self.credentials.map(|Extension(c)| c),
            conditions: self.conditions.map(|Extension(Conditions(c))| c),
            binding: state.binder.bind(&self.model).map(ResourceBinding::new),
        })
    }
}

async fn run(state: RouteState, operation: Operation, inbound: Inbound) -> Result<Reply, ApiError> {
    let api_operation = match operation {
        Operation::Find if inbound.id.is_some() => ApiOperation::Get,
        Operation::Find => ApiOperation::List,
        Operation::Create => ApiOperation::Create,
        Operation::Update => ApiOperation::Update,
        Operation::Remove => ApiOperation::Remove,
    };
    let request = inbound.into_request(&state, api_operation)?;
    state.table.dispatch(operation, request).await
}

async fn find_many(
    State(state): State<RouteState>,
    uri: Uri,
    Path(model): Path<String>,
    credentials: Option<Extension<Credentials>>,
    conditions: Option<Extension<Conditions>>,
    Query(raw): Query<RawListQuery>,
) -> Result<Reply, ApiError> {
    let inbound = Inbound {
        uri,
        model,
        id: None,
        raw,
        body: None,
        credentials,
        conditions,
    };
    run(state, Operation::Find, inbound).await
}

async fn find_one(
    State(state): State<RouteState>,
    uri: Uri,
    Path((model, id)): Path<(String, String)>,
    credentials: Option<Extension<Credentials>>,
    conditions: Option<Extension<Conditions>>,
    Query(raw): Query<RawListQuery>,
) -> Result<Reply, ApiError> {
    let inbound = Inbound {
        uri,
        model,
        id: Some(id),
        raw,
        body: None,
        credentials,
        conditions,
    };
    run(state, Operation::Find, inbound).await
}

async fn create(
    State(state): State<RouteState>,
    uri: Uri,
    Path(model): Path<String>,
    credentials: Option<Extension<Credentials>>,
    body: Bytes,
) -> Result<Reply, ApiError> {
    let inbound = Inbound {
        uri,
        model,
        id: None,
        raw: RawListQuery::default(),
        body: Some(body),
        credentials,
        conditions: None,
    };
    run(state, Operation::Create, inbound).await
}

async fn update(
    State(state): State<RouteState>,
    uri: Uri,
    Path((model, id)): Path<(String, String)>,
    credentials: Option<Extension<Credentials>>,
    body: Bytes,
) -> Result<Reply, ApiError> {
    let inbound = Inbound {
        uri,
        model,
        id: Some(id),
        raw: RawListQuery::default(),
        body: Some(body),
        credentials,
        conditions: None,
    };
    run(state, Operation::Update, inbound).await
}

async fn remove(
    State(state): State<RouteState>,
    uri: Uri,
    Path((model, id)): Path<(String, String)>,
    credentials: Option<Extension<Credentials>>,
) -> Result<Reply, ApiError> {
    let inbound = Inbound {
        uri,
        model,
        id: Some(id),
        raw: RawListQuery::default(),
        body: None,
        credentials,
        conditions: None,
    };
    run(state, Operation::Remove, inbound).await
}

/// Router serving `table` for every model `binder` knows
pub fn routes(table: HandlerTable, binder: impl ResourceBinder) -> Router {
    let state = RouteState {
        table: Arc::new(table),
        binder: Arc::new(binder),
    };

    Router::new()
        .route("/{model}", get(find_many).post(create))
        .route("/{model}/{id}", get(find_one).put(update).delete(remove))
        .with_state(state)
}
