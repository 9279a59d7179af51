//! Outbound contracts the subsystem consumes.
//!
//! The tenancy components never talk to a driver directly. They are written
//! against these traits, which each backend implements:
//!
//! - [`SessionProvider`] / [`Session`] - dedicated connections for locking and DDL
//! - [`Catalog`] - schema and table existence lookups
//! - [`MigrationRunner`] - the external versioned-migration engine
//! - [`TransactionProvider`] / [`TenantTransaction`] - tenant-scoped transactions
//!
//! ```text
//! SchemaProvisioner ──► SessionProvider ──► Session ──► MigrationRunner
//! SchemaProber ───────► Catalog
//! UnitOfWorkDispatcher ► TransactionProvider ──► TenantTransaction
//! ```

pub mod catalog;
pub mod migration;
pub mod session;
pub mod transaction;

pub use catalog::Catalog;
pub use migration::{MigrationReport, MigrationRunner};
pub use session::{Session, SessionProvider};
pub use transaction::{TenantTransaction, TransactionKind, TransactionProvider};
