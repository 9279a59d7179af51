//! Schema provisioning under advisory locks.
//!
//! [`SchemaProvisioner`] creates and migrates tenant schemas. For one schema
//! at most one provisioning or drop runs at a time across every process that
//! shares the database:
//!
//! ```text
//! validate ─► acquire session ─► SchemaLock::acquire ─┬─► CREATE SCHEMA IF NOT EXISTS
//!                                   │                  └─► MigrationRunner::migrate
//!                                   │                         (same session)
//!                                   └─ held elsewhere ─► SchemaLockTimeout (retryable)
//!                                                       ▼
//!                                              SchemaLock::release (always)
//! ```
//!
//! The lock attempt is a single non-blocking try. Retry policy belongs to the
//! caller. DDL already applied is not rolled back on failure; a retry resumes
//! thanks to `IF NOT EXISTS` and the runner skipping applied versions.

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::TenancyConfig;
use crate::core::{Catalog, MigrationReport, MigrationRunner, SessionProvider};
use crate::error::{ProvisioningError, StorageError, StorageResult};
use crate::lock::SchemaLock;
use crate::schema::TenantSchema;

/// Result of a successful [`SchemaProvisioner::ensure_schema_exists_and_migrate`].
///
/// Failures are errors, never an outcome, so an outcome always means the
/// schema exists and is migrated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProvisioningOutcome {
    /// The provisioned schema.
    pub schema: TenantSchema,
    /// `true` if this call created the schema.
    pub created: bool,
    /// What the migration runner did.
    pub migrations: MigrationReport,
    /// When provisioning finished.
    pub completed_at: DateTime<Utc>,
}

impl ProvisioningOutcome {
    /// Returns `true` if the call changed nothing.
    pub fn is_noop(&self) -> bool {
        !self.created && self.migrations.is_noop()
    }
}

/// Per-schema entry of [`SchemaProvisioner::migrate_all`].
#[derive(Debug)]
pub struct SchemaMigrationResult {
    /// The schema name as listed by the catalog.
    pub schema: String,
    /// The provisioning result for that schema.
    pub result: StorageResult<ProvisioningOutcome>,
}

#[derive(Clone, Copy)]
enum Operation {
    Provision,
    Drop,
}

impl Operation {
    fn fail(self, schema: &TenantSchema, stage: &str, cause: StorageError) -> StorageError {
        // A lock conflict keeps its own retryable kind.
        if matches!(
            cause,
            StorageError::Provisioning(ProvisioningError::SchemaLockTimeout { .. })
        ) {
            return cause;
        }

        let schema = schema.to_string();
        let message = format!("{}: {}", stage, cause);
        let source = Some(Box::new(cause));
        StorageError::Provisioning(match self {
            Operation::Provision => ProvisioningError::SchemaProvisioningFailed {
                schema,
                message,
                source,
            },
            Operation::Drop => ProvisioningError::SchemaDropFailed {
                schema,
                message,
                source,
            },
        })
    }
}

/// Creates, migrates and drops tenant schemas.
#[derive(Debug, Clone)]
pub struct SchemaProvisioner<S, C, M> {
    sessions: S,
    catalog: C,
    migrations: M,
    lock_timeout: Duration,
}

impl<S, C, M> SchemaProvisioner<S, C, M>
where
    S: SessionProvider,
    C: Catalog,
    M: MigrationRunner,
{
    /// Creates a provisioner with the default lock timeout.
    pub fn new(sessions: S, catalog: C, migrations: M) -> Self {
        Self {
            sessions,
            catalog,
            migrations,
            lock_timeout: TenancyConfig::default().lock_timeout,
        }
    }

    /// Creates a provisioner using the configured lock timeout.
    pub fn from_config(sessions: S, catalog: C, migrations: M, config: &TenancyConfig) -> Self {
        Self::new(sessions, catalog, migrations).with_lock_timeout(config.lock_timeout)
    }

    /// Sets the bound on a single lock attempt.
    pub fn with_lock_timeout(mut self, lock_timeout: Duration) -> Self {
        self.lock_timeout = lock_timeout;
        self
    }

    /// The bound on a single lock attempt.
    pub fn lock_timeout(&self) -> Duration {
        self.lock_timeout
    }

    /// The migration runner.
    pub fn migrations(&self) -> &M {
        &self.migrations
    }

    async fn lock(&self, schema: &TenantSchema, op: Operation) -> StorageResult<SchemaLock> {
        let session = self
            .sessions
            .acquire()
            .await
            .map_err(|e| op.fail(schema, "could not acquire a session", e))?;

        SchemaLock::acquire(session, schema, self.lock_timeout)
            .await
            .map_err(|e| op.fail(schema, "could not take the schema lock", e))
    }

    /// Creates `schema` if absent and migrates it, holding the schema lock
    /// on one session throughout.
    ///
    /// # Errors
    ///
    /// - [`SchemaError::InvalidSchema`] for a malformed name, before any I/O
    /// - [`ProvisioningError::SchemaLockTimeout`] if another caller holds the lock
    /// - [`ProvisioningError::SchemaProvisioningFailed`] wrapping any other failure
    ///
    /// [`SchemaError::InvalidSchema`]: crate::error::SchemaError::InvalidSchema
    pub async fn ensure_schema_exists_and_migrate(
        &self,
        schema: &str,
    ) -> StorageResult<ProvisioningOutcome> {
        let schema = TenantSchema::parse(schema)?;
        let started = Instant::now();

        let mut lock = self.lock(&schema, Operation::Provision).await?;
        let result = self.create_and_migrate(&mut lock).await;
        lock.release().await;

        let (created, migrations) =
            result.map_err(|e| Operation::Provision.fail(&schema, "provisioning aborted", e))?;

        tracing::info!(
            schema = %schema,
            created,
            applied = migrations.applied.len(),
            skipped = migrations.skipped,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Tenant schema provisioned"
        );

        Ok(ProvisioningOutcome {
            schema,
            created,
            migrations,
            completed_at: Utc::now(),
        })
    }

    async fn create_and_migrate(&self, lock: &mut SchemaLock) -> StorageResult<(bool, MigrationReport)> {
        let schema = lock.schema().clone();
        let session = lock.session()?;

        let created = session.create_schema(&schema).await?;
        if created {
            tracing::info!(schema = %schema, "Tenant schema created");
        }

        let report = self.migrations.migrate(session, &schema).await?;
        Ok((created, report))
    }

    /// Drops `schema` and everything in it under the schema lock.
    ///
    /// Returns `true` if the schema existed. Callers are responsible for
    /// restricting this to administrative flows.
    pub async fn try_drop_schema(&self, schema: &str) -> StorageResult<bool> {
        let schema = TenantSchema::parse(schema)?;

        let mut lock = self.lock(&schema, Operation::Drop).await?;
        let result = match lock.session() {
            Ok(session) => session.drop_schema(&schema).await,
            Err(e) => Err(e),
        };
        lock.release().await;

        let existed = result.map_err(|e| Operation::Drop.fail(&schema, "drop aborted", e))?;
        if existed {
            tracing::info!(schema = %schema, "Tenant schema dropped");
        } else {
            tracing::debug!(schema = %schema, "Tenant schema already absent");
        }
        Ok(existed)
    }

    /// Provisions every schema whose name starts with `prefix`, one after
    /// another.
    ///
    /// A failing schema does not stop the batch; each result is reported.
    /// Only a failure to list schemas fails the call.
    pub async fn migrate_all(&self, prefix: &str) -> StorageResult<Vec<SchemaMigrationResult>> {
        let schemas = self.catalog.list_schemas(prefix).await?;
        tracing::info!(prefix = prefix, count = schemas.len(), "Migrating tenant schemas");

        let mut results = Vec::with_capacity(schemas.len());
        for schema in schemas {
            let result = self.ensure_schema_exists_and_migrate(&schema).await;
            if let Err(e) = &result {
                tracing::warn!(schema = %schema, error = %e, "Tenant schema migration failed");
            }
            results.push(SchemaMigrationResult { schema, result });
        }

        let failed = results.iter().filter(|r| r.result.is_err()).count();
        tracing::info!(
            prefix = prefix,
            succeeded = results.len() - failed,
            failed,
            "Tenant schema migration finished"
        );
        Ok(results)
    }
}
