//! PostgreSQL backend implementation.
//!
//! Implements every outbound contract on top of a deadpool-postgres pool:
//!
//! - Dedicated sessions for advisory locks and schema DDL
//! - Catalog lookups over `information_schema` with bound parameters
//! - Tenant transactions that `SET LOCAL search_path` to the tenant schema
//!
//! # Example
//!
//! ```no_run
//! use strata_tenancy::backends::postgres::{PostgresBackend, PostgresConfig};
//! use strata_tenancy::core::Catalog;
//! use strata_tenancy::schema::TenantSchema;
//!
//! # async fn main_example() -> Result<(), Box<dyn std::error::Error>> {
//! let backend = PostgresBackend::new(PostgresConfig::from_env()).await?;
//!
//! let schema = TenantSchema::parse("t_acme_ab12cd")?;
//! let exists = backend.schema_exists(&schema).await?;
//! # Ok(())
//! # }
//! ```

mod backend;
mod session;
mod transaction;

pub use backend::{PostgresBackend, PostgresConfig, PostgresSslMode};
pub use session::PostgresSession;
pub use transaction::PostgresTransaction;
