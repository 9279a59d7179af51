//! Tenant schema identifiers.
//!
//! Every raw string that names a schema or table passes through this module
//! before it is used anywhere else:
//!
//! - [`TenantSchema`] - validated tenant schema identifier
//! - [`TableName`] - validated table name for readiness probes
//! - [`SchemaNaming`] - derives schema names from account records
//! - [`sql`] - PostgreSQL statement rendering for validated identifiers
//!
//! # Naming Rules
//!
//! Identifiers are lowercase, start with a letter, contain only `[a-z0-9_]`
//! and are at most 63 characters long. The control-plane schema
//! ([`CONTROL_PLANE_SCHEMA`]) is never a valid tenant schema.
//!
//! ```
//! use strata_tenancy::schema::{TenantSchema, TableName};
//!
//! let schema = TenantSchema::parse("t_acme_ab12cd").unwrap();
//! let table = TableName::parse("users").unwrap();
//! assert_eq!(format!("{}.{}", schema, table), "t_acme_ab12cd.users");
//! ```

mod identifier;
mod naming;
pub mod sql;

pub use identifier::{
    CONTROL_PLANE_SCHEMA, IDENTIFIER_PATTERN, MAX_IDENTIFIER_LENGTH, TableName, TenantSchema,
};
pub use naming::SchemaNaming;
