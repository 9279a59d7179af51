//! Strata Tenancy
//!
//! Schema-per-tenant lifecycle and execution context for the Strata platform.
//! Each tenant's business tables live in their own database schema. This
//! crate provisions those schemas exactly once under concurrent requests,
//! binds a tenant schema to a unit of work, and gates access to tenants whose
//! schema is missing or only partly migrated.
//!
//! # Features
//!
//! - **Provisioning**: create-and-migrate under a per-schema advisory lock,
//!   holding the lock on one session for the whole critical section
//! - **Readiness**: best-effort, asserting and conditional access modes
//! - **Execution context**: explicit per-request context with scoped binding
//! - **Units of work**: four transaction kinds with reverse-order teardown
//!
//! # Backend Features
//!
//! ```toml
//! [dependencies]
//! strata-tenancy = { version = "0.1", features = ["postgres"] }
//! ```
//!
//! - `memory` (default) - process-local store, used by the test suites
//! - `postgres` - PostgreSQL via deadpool-postgres
//!
//! # Architecture
//!
//! - [`schema`] - identifier validation, naming and SQL rendering
//! - [`error`] - error types for all operations
//! - [`config`] - tenancy configuration
//! - [`core`] - outbound contracts implemented by the backends
//! - [`lock`] - advisory lock keys and the owned lock guard
//! - [`provisioning`] - the schema provisioner
//! - [`probe`] - schema and table existence checks
//! - [`readiness`] - the readiness gate
//! - [`context`] - the execution context and schema binder
//! - [`unit_of_work`] - the transaction dispatcher
//! - [`backends`] - backend implementations
//!
//! # Quick Start
//!
//! ```
//! use strata_tenancy::backends::memory::MemoryBackend;
//! use strata_tenancy::context::{ExecutionContext, SchemaBinder};
//! use strata_tenancy::core::{MigrationReport, MigrationRunner, Session};
//! use strata_tenancy::error::{StorageError, StorageResult};
//! use strata_tenancy::provisioning::SchemaProvisioner;
//! use strata_tenancy::schema::TenantSchema;
//! use strata_tenancy::unit_of_work::UnitOfWorkDispatcher;
//!
//! struct NoMigrations;
//!
//! #[async_trait::async_trait]
//! impl MigrationRunner for NoMigrations {
//!     async fn migrate(
//!         &self,
//!         _session: &mut dyn Session,
//!         _schema: &TenantSchema,
//!     ) -> StorageResult<MigrationReport> {
//!         Ok(MigrationReport::default())
//!     }
//! }
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let backend = MemoryBackend::new();
//!
//! let provisioner = SchemaProvisioner::new(backend.clone(), backend.clone(), NoMigrations);
//! let outcome = provisioner
//!     .ensure_schema_exists_and_migrate("t_acme_ab12cd")
//!     .await
//!     .unwrap();
//! assert!(outcome.created);
//!
//! let dispatcher = UnitOfWorkDispatcher::new(backend, SchemaBinder::new());
//! let mut ctx = ExecutionContext::new();
//! dispatcher
//!     .tx(&mut ctx, "t_acme_ab12cd", |_uow| Box::pin(async move { Ok::<_, StorageError>(()) }))
//!     .await
//!     .unwrap();
//! # });
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod backends;
pub mod config;
pub mod context;
pub mod core;
pub mod error;
pub mod lock;
pub mod probe;
pub mod provisioning;
pub mod readiness;
pub mod schema;
pub mod unit_of_work;

// Re-export commonly used types at crate root
pub use config::TenancyConfig;
pub use context::{ExecutionContext, SchemaBinder, SchemaBinding};
pub use error::{StorageError, StorageResult};
pub use lock::{AdvisoryLockKey, LockCoordinator, SchemaLock};
pub use probe::{Readiness, ReadinessRequirement, SchemaProber};
pub use provisioning::{ProvisioningOutcome, SchemaMigrationResult, SchemaProvisioner};
pub use readiness::ReadinessGate;
pub use schema::{SchemaNaming, TableName, TenantSchema};
pub use unit_of_work::{UnitOfWork, UnitOfWorkDispatcher};

// Re-export core traits
pub use core::{
    Catalog, MigrationReport, MigrationRunner, Session, SessionProvider, TenantTransaction,
    TransactionKind, TransactionProvider,
};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
