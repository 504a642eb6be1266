//! Database configuration.

use std::env;

/// Defaults applied to every table opened through a [`crate::Database`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    /// Joins sort-key segments (default `/`).
    pub separator: String,
    /// Skip provisioning on open; the table is known to exist.
    pub assume_exists: bool,
    /// Provision the table with expiry on the `ttl` column. Queries filter on
    /// ttl only when asked per call.
    pub ttl: bool,
}

impl DatabaseConfig {
    /// Create configuration from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            separator: env::var("RAZIEL_SEPARATOR").unwrap_or_else(|_| "/".to_owned()),
            assume_exists: env_bool("RAZIEL_ASSUME_EXISTS", false),
            ttl: env_bool("RAZIEL_TTL", false),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            separator: "/".to_owned(),
            assume_exists: false,
            ttl: false,
        }
    }
}

/// Per-table overrides of [`DatabaseConfig`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OpenOptions {
    /// Sort-key segment separator.
    pub separator: Option<String>,
    /// Skip provisioning.
    pub assume_exists: Option<bool>,
    /// Provision the table with expiry enabled.
    pub ttl: Option<bool>,
}

impl OpenOptions {
    pub(crate) fn resolve(&self, base: &DatabaseConfig) -> DatabaseConfig {
        DatabaseConfig {
            separator: self
                .separator
                .clone()
                .unwrap_or_else(|| base.separator.clone()),
            assume_exists: self.assume_exists.unwrap_or(base.assume_exists),
            ttl: self.ttl.unwrap_or(base.ttl),
        }
    }
}

fn env_bool(key: &str, default: bool) -> bool {
    env::var(key).map_or(default, |v| {
        matches!(v.as_str(), "1" | "true" | "yes" | "TRUE" | "YES")
    })
}
