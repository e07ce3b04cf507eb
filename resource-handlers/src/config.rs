//! Configuration management using Figment
//!
//! Configuration is loaded from multiple sources with the following precedence (highest to lowest):
//! 1. Environment variables (prefix: `RESOURCE_HANDLERS_`, nesting separator: `__`)
//! 2. Current working directory: ./config.toml
//! 3. XDG config directory: ~/.config/resource-handlers/{service_name}/config.toml
//! 4. System directory: /etc/resource-handlers/{service_name}/config.toml
//! 5. Default values
//!
//! The handler settings are read once at startup, validated, and then shared
//! read-only by every handler for the lifetime of the process.
//!
//! ```toml
//! [service]
//! name = "admin-api"
//! log_level = "debug"
//!
//! [handlers]
//! on_create = "object"
//! on_update = "object"
//! where = true
//!
//! [handlers.pagination]
//! meta = "meta"
//! total_pages = "totalPages"
//! total_docs = "totalDocs"
//! default_limit = 30
//! ```

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

const ENV_PREFIX: &str = "RESOURCE_HANDLERS_";
const CONFIG_DIR_PREFIX: &str = "resource-handlers";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Service configuration
    #[serde(default)]
    pub service: ServiceConfig,

    /// Settings shared by the find/create/update/remove handlers
    #[serde(default)]
    pub handlers: HandlerSettings,
}

/// Service-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Service name
    #[serde(default = "default_service_name")]
    pub name: String,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            log_level: default_log_level(),
        }
    }
}

/// What a mutation handler sends back once the store has accepted the change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResponsePolicy {
    /// Echo the mutated document under the resource name
    Object,
    /// Reply with an empty body
    #[default]
    NoContent,
}

impl ResponsePolicy {
    /// Whether the mutated document should be returned to the caller
    #[must_use]
    pub const fn echoes(&self) -> bool {
        matches!(self, Self::Object)
    }
}

/// Envelope key names and page sizing for list responses
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationConfig {
    /// Key the pagination metadata is nested under
    #[serde(default = "default_meta_key")]
    pub meta: String,

    /// Key holding the number of pages
    #[serde(default = "default_total_pages_key")]
    pub total_pages: String,

    /// Key holding the number of matching documents
    #[serde(default = "default_total_docs_key")]
    pub total_docs: String,

    /// Page size used when `page` is requested without `limit`
    #[serde(default = "default_limit")]
    pub default_limit: u64,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            meta: default_meta_key(),
            total_pages: default_total_pages_key(),
            total_docs: default_total_docs_key(),
            default_limit: default_limit(),
        }
    }
}

/// Process-wide handler settings
///
/// Immutable after [`HandlerSettings::validate`] succeeds.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct HandlerSettings {
    /// Response policy for create
    #[serde(default)]
    pub on_create: ResponsePolicy,

    /// Response policy for update
    #[serde(default)]
    pub on_update: ResponsePolicy,

    /// Response policy for remove
    #[serde(default)]
    pub on_remove: ResponsePolicy,

    /// Pagination envelope configuration
    #[serde(default)]
    pub pagination: PaginationConfig,

    /// Allow raw store filters from the `where` query parameter.
    ///
    /// Off by default: it exposes the store's filter syntax to clients.
    #[serde(default, rename = "where")]
    pub allow_where: bool,
}

impl HandlerSettings {
    /// Check the settings before any handler is bound
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] when an envelope key is empty, two
    /// envelope keys collide, or the default limit is zero.
    pub fn validate(&self) -> Result<()> {
        let pagination = &self.pagination;
        let keys = [
            ("pagination.meta", &pagination.meta),
            ("pagination.total_pages", &pagination.total_pages),
            ("pagination.total_docs", &pagination.total_docs),
        ];

        for (name, value) in keys {
            if value.trim().is_empty() {
                return Err(Error::InvalidConfig(format!("{} must not be empty", name)));
            }
        }

        if pagination.total_pages == pagination.total_docs {
            return Err(Error::InvalidConfig(format!(
                "pagination.total_pages and pagination.total_docs both use key '{}'",
                pagination.total_pages
            )));
        }

        if pagination.default_limit == 0 {
            return Err(Error::InvalidConfig(
                "pagination.default_limit must be at least 1".to_string(),
            ));
        }

        Ok(())
    }

    /// Builder-style setter for the create response policy
    #[must_use]
    pub fn with_on_create(mut self, policy: ResponsePolicy) -> Self {
        self.on_create = policy;
        self
    }

    /// Builder-style setter for the update response policy
    #[must_use]
    pub fn with_on_update(mut self, policy: ResponsePolicy) -> Self {
        self.on_update = policy;
        self
    }

    /// Builder-style setter for the remove response policy
    #[must_use]
    pub fn with_on_remove(mut self, policy: ResponsePolicy) -> Self {
        self.on_remove = policy;
        self
    }

    /// Builder-style setter for the `where` policy flag
    #[must_use]
    pub fn with_where(mut self, allow: bool) -> Self {
        self.allow_where = allow;
        self
    }

    /// Builder-style setter for the pagination block
    #[must_use]
    pub fn with_pagination(mut self, pagination: PaginationConfig) -> Self {
        self.pagination = pagination;
        self
    }
}

fn default_service_name() -> String {
    "resource-handlers".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_meta_key() -> String {
    "meta".to_string()
}

fn default_total_pages_key() -> String {
    "totalPages".to_string()
}

fn default_total_docs_key() -> String {
    "totalDocs".to_string()
}

fn default_limit() -> u64 {
    30
}

impl Config {
    /// Load configuration from all sources
    ///
    /// The service name is inferred from the running binary.
    ///
    /// # Errors
    ///
    /// Fails if a source cannot be parsed or the handler settings are invalid.
    pub fn load() -> Result<Self> {
        let service_name = std::env::current_exe()
            .ok()
            .and_then(|p| p.file_stem().map(|s| s.to_string_lossy().into_owned()))
            .unwrap_or_else(default_service_name);

        Self::load_for_service(&service_name)
    }

    /// Load configuration for a specific service name
    ///
    /// # Errors
    ///
    /// Fails if a source cannot be parsed or the handler settings are invalid.
    pub fn load_for_service(service_name: &str) -> Result<Self> {
        let config_paths = Self::find_config_paths(service_name);

        tracing::debug!("Searching for config files in order:");
        for path in &config_paths {
            tracing::debug!("  - {}", path.display());
        }

        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));

        // Lowest priority first, so later merges win
        for path in config_paths.iter().rev() {
            if path.exists() {
                tracing::info!("Loading configuration from: {}", path.display());
                figment = figment.merge(Toml::file(path));
            }
        }

        figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));

        Self::finish(figment)
    }

    /// Load configuration from a specific file
    ///
    /// Bypasses the XDG and system directories. Environment variables still
    /// override the file.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be parsed or the handler settings are invalid.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"));

        Self::finish(figment)
    }

    fn finish(figment: Figment) -> Result<Self> {
        let config: Config = figment.extract()?;
        config.handlers.validate()?;
        Ok(config)
    }

    /// Config file paths in priority order (highest first)
    fn find_config_paths(service_name: &str) -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("config.toml")];

        let xdg_dirs = xdg::BaseDirectories::with_prefix(CONFIG_DIR_PREFIX);
        let config_file_path = Path::new(service_name).join("config.toml");
        if let Some(path) = xdg_dirs.find_config_file(&config_file_path) {
            paths.push(path);
        }

        paths.push(
            PathBuf::from("/etc")
                .join(CONFIG_DIR_PREFIX)
                .join(service_name)
                .join("config.toml"),
        );

        paths
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.service.log_level, "info");
        assert_eq!(config.handlers.on_create, ResponsePolicy::NoContent);
        assert_eq!(config.handlers.on_update, ResponsePolicy::NoContent);
        assert_eq!(config.handlers.on_remove, ResponsePolicy::NoContent);
        assert_eq!(config.handlers.pagination.meta, "meta");
        assert_eq!(config.handlers.pagination.total_pages, "totalPages");
        assert_eq!(config.handlers.pagination.total_docs, "totalDocs");
        assert_eq!(config.handlers.pagination.default_limit, 30);
        assert!(!config.handlers.allow_where);
    }

    #[test]
    fn test_response_policy_serde() {
        let policy: ResponsePolicy = serde_json::from_str("\"no-content\"").unwrap();
        assert_eq!(policy, ResponsePolicy::NoContent);
        let policy: ResponsePolicy = serde_json::from_str("\"object\"").unwrap();
        assert_eq!(policy, ResponsePolicy::Object);
        assert!(serde_json::from_str::<ResponsePolicy>("\"full\"").is_err());
    }

    #[test]
    fn test_response_policy_echoes() {
        assert!(ResponsePolicy::Object.echoes());
        assert!(!ResponsePolicy::NoContent.echoes());
    }

    #[test]
    fn test_validate_defaults() {
        assert!(HandlerSettings::default().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_empty_key() {
        let mut settings = HandlerSettings::default();
        settings.pagination.meta = "  ".to_string();
        let err = settings.validate().unwrap_err();
        assert!(err.to_string().contains("pagination.meta"));
    }

    #[test]
    fn test_validate_rejects_colliding_keys() {
        let mut settings = HandlerSettings::default();
        settings.pagination.total_docs = "totalPages".to_string();
        assert!(matches!(settings.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_validate_rejects_zero_limit() {
        let mut settings = HandlerSettings::default();
        settings.pagination.default_limit = 0;
        assert!(matches!(settings.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[service]
name = "admin-api"

[handlers]
on_create = "object"
where = true

[handlers.pagination]
meta = "page_info"
default_limit = 10
"#
        )
        .unwrap();

        let config = Config::load_from(file.path()).unwrap();
        assert_eq!(config.service.name, "admin-api");
        assert_eq!(config.handlers.on_create, ResponsePolicy::Object);
        assert_eq!(config.handlers.on_update, ResponsePolicy::NoContent);
        assert!(config.handlers.allow_where);
        assert_eq!(config.handlers.pagination.meta, "page_info");
        assert_eq!(config.handlers.pagination.total_pages, "totalPages");
        assert_eq!(config.handlers.pagination.default_limit, 10);
    }

    #[test]
    fn test_load_from_file_rejects_invalid_settings() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[handlers.pagination]\ndefault_limit = 0").unwrap();

        let err = Config::load_from(file.path()).unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[test]
    fn test_load_from_file_rejects_unknown_policy() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[handlers]\non_remove = \"everything\"").unwrap();

        let err = Config::load_from(file.path()).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
