//! Startup error types
//!
//! Request-time failures are reported through [`ApiError`](crate::handlers::ApiError);
//! this module covers what can go wrong before the first request is served:
//! loading and validating configuration, and registering models.

use thiserror::Error;

use crate::store::StoreError;

/// Result type alias for startup operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the crate
///
/// Large error variants are boxed to reduce stack size
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration could not be loaded or deserialized
    #[error("Configuration error: {0}")]
    Config(Box<figment::Error>),

    /// Configuration was loaded but holds values the handlers cannot work with
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A store rejected a startup call, such as registering a model
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Error::Config(Box::new(err))
    }
}
