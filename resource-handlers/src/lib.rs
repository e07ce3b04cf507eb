//! # resource-handlers
//!
//! Declarative REST handlers for document-store collections. One set of
//! handlers serves many similar resources: each request is compiled into a
//! store query, executed, and shaped into a consistent JSON envelope.
//!
//! ## Features
//!
//! - **Query compilation**: `page`, `limit`, `sort`, `where`, `search`,
//!   `populate` and `select` query parameters become one store [`Query`](store::Query)
//! - **Concurrent count/fetch**: list responses carry `totalDocs` and
//!   `totalPages` computed alongside the page itself
//! - **Deep population**: ordered `deepPopulate` steps expand references
//!   brought in by earlier steps
//! - **Mutations**: create, update and remove with an optional touch hook
//!   and per-operation response policy
//! - **Overrides**: replace any handler or patch its validation rules at
//!   startup
//! - **Configuration**: layered TOML and environment config via figment
//! - **Observability**: structured JSON logging via tracing
//!
//! ## Example
//!
//! ```rust,no_run
//! use resource_handlers::prelude::*;
//!
//! # #[cfg(feature = "memory-store")]
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     // Load configuration
//!     let config = Config::load()?;
//!
//!     // Initialize tracing
//!     init_tracing(&config)?;
//!
//!     // Register collections
//!     let store = MemoryStore::new();
//!     store.register("Role", Schema::new().field("name", FieldType::String))?;
//!     store.register_with_touch(
//!         "Admin",
//!         Schema::new()
//!             .required_field("name", FieldType::String)
//!             .field("age", FieldType::Number)
//!             .field("role", FieldType::Ref("Role".to_string())),
//!     )?;
//!
//!     // Resolve handlers and mount them
//!     let table = HandlerTable::new(config.handlers.clone())?;
//!     let app = Router::new().nest("/v1", routes(table, store));
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:8080")
//!         .await
//!         .map_err(|e| Error::InvalidConfig(e.to_string()))?;
//!     axum::serve(listener, app)
//!         .await
//!         .map_err(|e| Error::InvalidConfig(e.to_string()))?;
//!
//!     Ok(())
//! }
//! # #[cfg(not(feature = "memory-store"))]
//! # fn main() {}
//! ```

pub mod config;
pub mod error;
pub mod handlers;
pub mod observability;
pub mod store;

pub use error::{Error, Result};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::{Config, HandlerSettings, PaginationConfig, ResponsePolicy, ServiceConfig};
    pub use crate::error::{Error, Result};
    pub use crate::observability::init_tracing;

    pub use crate::store::{
        Credentials, Document, FieldType, Filter, Found, Model, Populate, PopulateOptions, Query,
        Schema, Select, SortSpec, StoreError, StoreErrorKind, Target,
    };

    #[cfg(feature = "memory-store")]
    pub use crate::store::MemoryStore;

    pub use crate::handlers::{
        handler, routes, ApiError, ApiErrorKind, ApiOperation, Conditions, DeepPopulate, Envelope,
        HandlerTable, ListQuery, Operation, Override, Reply, ResourceBinder, ResourceRequest,
        RouteDefaultsPatch,
    };

    pub use axum::{routing::get, Router};
}
