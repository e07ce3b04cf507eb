//! Generic resource handlers
//!
//! Four operations serve any number of similar collections:
//!
//! - **find**: compiles the query string into a store [`Query`](crate::store::Query)
//!   ([`compile`]), runs the count and the fetch concurrently, applies the
//!   `deepPopulate` steps in order ([`deep_populate`]) and wraps the result in
//!   an [`Envelope`] with [`PaginationMeta`]
//! - **create / update / remove**: resolve, apply the payload, call the
//!   document's optional touch hook, persist, and echo the document or reply
//!   with an empty body according to the configured [`ResponsePolicy`](crate::config::ResponsePolicy)
//!
//! A [`HandlerTable`] resolves operator overrides once at startup and
//! validates each request against its route's [`ValidationRules`] before
//! dispatching. [`routes`] mounts the table on an axum router.
//!
//! # Example
//!
//! ```rust
//! use resource_handlers::prelude::*;
//! use serde_json::json;
//!
//! # #[cfg(feature = "memory-store")]
//! # #[tokio::main]
//! # async fn main() -> Result<()> {
//! let store = MemoryStore::new();
//! let admins = store.register("Admin", Schema::new().field("name", FieldType::String))?;
//! store.insert("Admin", json!({"name": "Administrator 1"}))?;
//!
//! let table = HandlerTable::new(HandlerSettings::default())?;
//! let request = ResourceRequest::new("/v1/admins")
//!     .with_model(admins)
//!     .with_query(ListQuery::new().with_limit(10));
//!
//! let reply = table.dispatch(Operation::Find, request).await.unwrap();
//! let envelope = reply.envelope().unwrap();
//! assert_eq!(envelope.get("meta"), Some(&json!({"totalPages": 1, "totalDocs": 1})));
//! # Ok(())
//! # }
//! # #[cfg(not(feature = "memory-store"))]
//! # fn main() {}
//! ```

mod compiler;
mod error;
mod find;
mod mutate;
mod query;
mod registry;
mod request;
mod response;
mod routes;
mod validate;

pub use compiler::{compile, CompiledQuery};
pub use error::{ApiError, ApiErrorKind, ApiOperation};
pub use find::{deep_populate, find};
pub use mutate::{create, remove, update};
pub use query::{DeepPopulate, ListQuery, RawListQuery};
pub use registry::{
    handler, Handler, HandlerFuture, HandlerTable, HandlerTableBuilder, Operation, Override,
};
pub use request::{Conditions, ResourceBinding, ResourceRequest};
pub use response::{Envelope, PaginationMeta, Reply};
pub use routes::{model_name_for, routes, ResourceBinder};
pub use validate::{RouteDefaultsPatch, ValidationRules};
