//! Document store abstraction
//!
//! Handlers compile requests into [`Query`] values and run them against a
//! [`Model`]. Anything that implements the traits in this module can back the
//! handlers; [`MemoryStore`] is the in-process implementation.

pub mod error;
#[cfg(feature = "memory-store")]
pub mod memory;
pub mod query;
pub mod schema;
pub mod traits;

pub use error::{StoreError, StoreErrorKind, StoreOperation};
#[cfg(feature = "memory-store")]
pub use memory::{MemoryDocument, MemoryModel, MemoryStore, UPDATED_AT_FIELD, UPDATED_BY_FIELD};
pub use query::{
    FieldPattern, Filter, OrderDirection, Populate, PopulateOptions, Projection, Query, Select,
    SortKey, SortSpec, Target, ID_CONDITION, NEGATION_MARKER,
};
pub use schema::{FieldType, Schema, SchemaPath};
pub use traits::{Credentials, Document, Found, Model, StoreResult, Touch};
