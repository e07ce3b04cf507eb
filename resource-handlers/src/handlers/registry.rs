//! Handler table
//!
//! The four operations are resolved once at startup into an immutable
//! [`HandlerTable`]. Each entry is either the built-in handler with its
//! default validation rules (optionally patched), or a replacement handler
//! supplied by the operator. Replacements run without route validation.
//!
//! # Example
//!
//! ```rust
//! use resource_handlers::config::HandlerSettings;
//! use resource_handlers::handlers::{HandlerTable, Operation, Override, RouteDefaultsPatch};
//!
//! let table = HandlerTable::builder(HandlerSettings::default())
//!     .with_override(Operation::Find, Override::Patch(RouteDefaultsPatch::new().with_max_limit(100)))
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(table.rules(Operation::Find).max_limit, Some(100));
//! ```

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;

use crate::config::HandlerSettings;
use crate::error::Result;

use super::error::{ApiError, ApiOperation};
use super::request::ResourceRequest;
use super::response::Reply;
use super::validate::{RouteDefaultsPatch, ValidationRules};
use super::{find, mutate};

/// Future returned by a [`Handler`]
pub type HandlerFuture = BoxFuture<'static, std::result::Result<Reply, ApiError>>;

/// Request handler; receives the process-wide settings
pub type Handler = Arc<dyn Fn(ResourceRequest, Arc<HandlerSettings>) -> HandlerFuture + Send + Sync>;

/// Wrap an async function as a [`Handler`]
///
/// # Example
///
/// ```rust
/// use resource_handlers::handlers::{handler, Reply};
///
/// let always_empty = handler(|_request, _settings| async { Ok(Reply::NoContent) });
/// ```
pub fn handler<F, Fut>(f: F) -> Handler
where
    F: Fn(ResourceRequest, Arc<HandlerSettings>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = std::result::Result<Reply, ApiError>> + Send + 'static,
{
    Arc::new(move |request, settings| f(request, settings).boxed())
}

/// Named operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// List or fetch by id
    Find,
    /// Create
    Create,
    /// Update by id
    Update,
    /// Remove by id
    Remove,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Find => write!(f, "find"),
            Self::Create => write!(f, "create"),
            Self::Update => write!(f, "update"),
            Self::Remove => write!(f, "remove"),
        }
    }
}

impl Operation {
    /// Every operation, in registration order
    pub const ALL: [Self; 4] = [Self::Find, Self::Create, Self::Update, Self::Remove];

    fn api_operation(self, request: &ResourceRequest) -> ApiOperation {
        match self {
            Self::Find if request.id.is_some() => ApiOperation::Get,
            Self::Find => ApiOperation::List,
            Self::Create => ApiOperation::Create,
            Self::Update => ApiOperation::Update,
            Self::Remove => ApiOperation::Remove,
        }
    }

    fn default_rules(self) -> ValidationRules {
        match self {
            Self::Find => ValidationRules::find(),
            Self::Create => ValidationRules::create(),
            Self::Update | Self::Remove => ValidationRules::by_id(),
        }
    }

    fn builtin(self) -> Handler {
        match self {
            Self::Find => handler(|request, settings| async move { find::find(request, &settings).await }),
            Self::Create => {
                handler(|request, settings| async move { mutate::create(request, &settings).await })
            }
            Self::Update => {
                handler(|request, settings| async move { mutate::update(request, &settings).await })
            }
            Self::Remove => {
                handler(|request, settings| async move { mutate::remove(request, &settings).await })
            }
        }
    }
}

/// Operator customization of one operation
#[derive(Clone)]
pub enum Override {
    /// Use this handler instead of the built-in one
    Replace(Handler),
    /// Keep the built-in handler; merge these rules into its defaults
    Patch(RouteDefaultsPatch),
}

impl fmt::Debug for Override {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Replace(_) => f.write_str("Replace(..)"),
            Self::Patch(patch) => f.debug_tuple("Patch").field(patch).finish(),
        }
    }
}

#[derive(Clone)]
struct Route {
    handler: Handler,
    rules: ValidationRules,
    replaced: bool,
}

/// Resolved handlers for every operation
#[derive(Clone)]
pub struct HandlerTable {
    settings: Arc<HandlerSettings>,
    find: Route,
    create: Route,
    update: Route,
    remove: Route,
}

impl fmt::Debug for HandlerTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("HandlerTable");
        s.field("settings", &self.settings);
        for operation in Operation::ALL {
            let route = self.route(operation);
            s.field(
                match operation {
                    Operation::Find => "find",
                    Operation::Create => "create",
                    Operation::Update => "update",
                    Operation::Remove => "remove",
                },
                &(route.replaced, route.rules),
            );
        }
        s.finish()
    }
}

impl HandlerTable {
    /// Start a table over `settings`
    pub fn builder(settings: HandlerSettings) -> HandlerTableBuilder {
        HandlerTableBuilder {
            settings,
            overrides: HashMap::new(),
        }
    }

    /// Table with built-in handlers and default rules
    ///
    /// # Errors
    ///
    /// `InvalidConfig` when `settings` do not validate.
    pub fn new(settings: HandlerSettings) -> Result<Self> {
        Self::builder(settings).build()
    }

    /// Process-wide settings
    #[must_use]
    pub fn settings(&self) -> &HandlerSettings {
        &self.settings
    }

    /// Validation rules in force for `operation`
    #[must_use]
    pub fn rules(&self, operation: Operation) -> &ValidationRules {
        &self.route(operation).rules
    }

    /// Whether `operation` runs a replacement handler
    #[must_use]
    pub fn is_replaced(&self, operation: Operation) -> bool {
        self.route(operation).replaced
    }

    fn route(&self, operation: Operation) -> &Route {
        match operation {
            Operation::Find => &self.find,
            Operation::Create => &self.create,
            Operation::Update => &self.update,
            Operation::Remove => &self.remove,
        }
    }

    /// Validate `request` and run the handler for `operation`
    ///
    /// # Errors
    ///
    /// `ValidationFailed` from the route rules, or whatever the handler
    /// returns.
    pub async fn dispatch(
        &self,
        operation: Operation,
        request: ResourceRequest,
    ) -> std::result::Result<Reply, ApiError> {
        let route = self.route(operation);
        route
            .rules
            .check(operation.api_operation(&request), &request)?;
        (route.handler)(request, Arc::clone(&self.settings)).await
    }
}

/// Collects overrides, then resolves them into a [`HandlerTable`]
pub struct HandlerTableBuilder {
    settings: HandlerSettings,
    overrides: HashMap<Operation, Override>,
}

impl HandlerTableBuilder {
    /// Override `operation`; a later override for the same operation wins
    #[must_use]
    pub fn with_override(mut self, operation: Operation, custom: Override) -> Self {
        self.overrides.insert(operation, custom);
        self
    }

    /// Validate the settings and resolve every operation
    ///
    /// # Errors
    ///
    /// `InvalidConfig` when the settings do not validate.
    pub fn build(mut self) -> Result<HandlerTable> {
        self.settings.validate()?;

        let mut resolve = |operation: Operation| match self.overrides.remove(&operation) {
            Some(Override::Replace(handler)) => Route {
                handler,
                rules: ValidationRules::permissive(),
                replaced: true,
            },
            Some(Override::Patch(patch)) => Route {
                handler: operation.builtin(),
                rules: operation.default_rules().merge(&patch),
                replaced: false,
            },
            None => Route {
                handler: operation.builtin(),
                rules: operation.default_rules(),
                replaced: false,
            },
        };

        let find = resolve(Operation::Find);
        let create = resolve(Operation::Create);
        let update = resolve(Operation::Update);
        let remove = resolve(Operation::Remove);

        tracing::debug!(
            where_enabled = self.settings.allow_where,
            default_limit = self.settings.pagination.default_limit,
            "Handler table resolved"
        );

        Ok(HandlerTable {
            settings: Arc::new(self.settings),
            find,
            create,
            update,
            remove,
        })
    }
}
