//! In-memory backend.
//!
//! Keeps schemas, tables, advisory locks and committed rows in process memory
//! and counts every call it serves. It implements all outbound contracts, so
//! the full provisioning, readiness and unit-of-work stack runs against it
//! without a database.
//!
//! # Example
//!
//! ```
//! use strata_tenancy::backends::memory::MemoryBackend;
//! use strata_tenancy::core::Catalog;
//! use strata_tenancy::schema::TenantSchema;
//!
//! # tokio_test_block(async {
//! let backend = MemoryBackend::new();
//! let schema = TenantSchema::parse("t_acme").unwrap();
//! assert!(!backend.schema_exists(&schema).await.unwrap());
//! # });
//! # fn tokio_test_block<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Runtime::new().unwrap().block_on(f)
//! # }
//! ```

mod backend;
mod session;
mod transaction;

pub use backend::{MemoryBackend, MemoryStats};
pub use session::MemorySession;
pub use transaction::MemoryTransaction;
