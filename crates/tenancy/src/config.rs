//! Tenancy configuration.
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `STRATA_ANCHOR_TABLE` | users | Table whose presence marks a tenant usable |
//! | `STRATA_SCHEMA_PREFIX` | t_ | Prefix of derived tenant schema names |
//! | `STRATA_LOCK_TIMEOUT` | 5s | Bound on one advisory lock round-trip |
//! | `STRATA_WARN_ON_NESTED_BINDING` | true | Warn when a binding is nested |
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use strata_tenancy::TenancyConfig;
//!
//! let config: TenancyConfig = serde_json::from_str(r#"{"lock_timeout": "750ms"}"#).unwrap();
//! assert_eq!(config.lock_timeout, Duration::from_millis(750));
//! assert_eq!(config.anchor_table, "users");
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::StorageResult;
use crate::schema::{SchemaNaming, TableName};

/// Configuration shared by the provisioner, readiness gate and binder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenancyConfig {
    /// Table whose existence defines a minimally usable tenant schema.
    #[serde(default = "default_anchor_table")]
    pub anchor_table: String,

    /// Prefix for schema names derived from account records.
    #[serde(default = "default_schema_prefix")]
    pub schema_prefix: String,

    /// Upper bound on a single advisory lock attempt.
    #[serde(default = "default_lock_timeout", with = "humantime_serde")]
    pub lock_timeout: Duration,

    /// Log a warning when a schema is bound on a context that already has one.
    #[serde(default = "default_warn_on_nested_binding")]
    pub warn_on_nested_binding: bool,
}

fn default_anchor_table() -> String {
    "users".to_string()
}

fn default_schema_prefix() -> String {
    "t_".to_string()
}

fn default_lock_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_warn_on_nested_binding() -> bool {
    true
}

impl Default for TenancyConfig {
    fn default() -> Self {
        Self {
            anchor_table: default_anchor_table(),
            schema_prefix: default_schema_prefix(),
            lock_timeout: default_lock_timeout(),
            warn_on_nested_binding: default_warn_on_nested_binding(),
        }
    }
}

impl TenancyConfig {
    /// Reads the configuration from `STRATA_*` environment variables.
    ///
    /// Unset or unparsable values fall back to their defaults.
    pub fn from_env() -> Self {
        Self {
            anchor_table: std::env::var("STRATA_ANCHOR_TABLE")
                .unwrap_or_else(|_| default_anchor_table()),
            schema_prefix: std::env::var("STRATA_SCHEMA_PREFIX")
                .unwrap_or_else(|_| default_schema_prefix()),
            lock_timeout: std::env::var("STRATA_LOCK_TIMEOUT")
                .ok()
                .and_then(|v| humantime::parse_duration(&v).ok())
                .unwrap_or_else(default_lock_timeout),
            warn_on_nested_binding: std::env::var("STRATA_WARN_ON_NESTED_BINDING")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(default_warn_on_nested_binding),
        }
    }

    /// Checks the configured identifiers against the naming rules.
    pub fn validate(&self) -> StorageResult<()> {
        self.anchor()?;
        self.naming()?;
        Ok(())
    }

    /// The anchor table as a validated name.
    pub fn anchor(&self) -> StorageResult<TableName> {
        TableName::parse(&self.anchor_table)
    }

    /// Schema naming built from the configured prefix.
    pub fn naming(&self) -> StorageResult<SchemaNaming> {
        SchemaNaming::new(self.schema_prefix.clone())
    }
}
