//! Test infrastructure for the tenancy crate.
//!
//! Migration runners and fault-injecting collaborators shared by the
//! integration suites.

#![allow(dead_code)]

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;

use strata_tenancy::backends::memory::MemoryBackend;
use strata_tenancy::core::{Catalog, MigrationReport, MigrationRunner, Session};
use strata_tenancy::error::{BackendError, StorageError, StorageResult};
use strata_tenancy::schema::{TableName, TenantSchema};

/// Versioned tenant migrations: (version, table created by it).
pub const MIGRATIONS: &[(&str, &str)] = &[("V1__users", "users"), ("V2__orders", "orders")];

#[derive(Default)]
struct Counters {
    runs: AtomicUsize,
    runs_with_changes: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

/// A resumable migration runner for the memory backend.
///
/// Applies [`MIGRATIONS`] in order through the provisioning session, records
/// applied versions per schema and tracks how many runs overlap.
#[derive(Clone)]
pub struct RecordingMigrations {
    backend: MemoryBackend,
    history: Arc<Mutex<HashMap<String, BTreeSet<String>>>>,
    counters: Arc<Counters>,
    fail_at: Arc<Mutex<Option<String>>>,
}

impl RecordingMigrations {
    pub fn new(backend: MemoryBackend) -> Self {
        Self {
            backend,
            history: Arc::new(Mutex::new(HashMap::new())),
            counters: Arc::new(Counters::default()),
            fail_at: Arc::new(Mutex::new(None)),
        }
    }

    /// Makes the next run fail when it reaches `version`.
    pub fn fail_at(&self, version: &str) {
        *self.fail_at.lock() = Some(version.to_string());
    }

    pub fn runs(&self) -> usize {
        self.counters.runs.load(Ordering::SeqCst)
    }

    /// Runs that applied at least one version.
    pub fn runs_with_changes(&self) -> usize {
        self.counters.runs_with_changes.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.counters.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn applied(&self, schema: &str) -> Vec<String> {
        self.history
            .lock()
            .get(schema)
            .map(|versions| versions.iter().cloned().collect())
            .unwrap_or_default()
    }

    async fn apply(
        &self,
        session: &mut dyn Session,
        schema: &TenantSchema,
    ) -> StorageResult<MigrationReport> {
        let mut report = MigrationReport::default();

        for (version, table) in MIGRATIONS {
            let done = self
                .history
                .lock()
                .get(schema.as_str())
                .is_some_and(|versions| versions.contains(*version));
            if done {
                report.skipped += 1;
                continue;
            }

            let should_fail = {
                let mut fail_at = self.fail_at.lock();
                if fail_at.as_deref() == Some(*version) {
                    fail_at.take();
                    true
                } else {
                    false
                }
            };
            if should_fail {
                return Err(StorageError::Backend(BackendError::QueryError {
                    message: format!("migration {} failed", version),
                }));
            }

            session
                .batch_execute(&format!("CREATE TABLE \"{}\".\"{}\" (id BIGINT)", schema, table))
                .await?;
            self.backend
                .create_table(schema, &TableName::parse(table)?)?;

            self.history
                .lock()
                .entry(schema.to_string())
                .or_default()
                .insert(version.to_string());
            report.applied.push(version.to_string());

            tokio::task::yield_now().await;
        }

        Ok(report)
    }
}

#[async_trait]
impl MigrationRunner for RecordingMigrations {
    async fn migrate(
        &self,
        session: &mut dyn Session,
        schema: &TenantSchema,
    ) -> StorageResult<MigrationReport> {
        let c = &self.counters;
        c.runs.fetch_add(1, Ordering::SeqCst);
        let now = c.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        c.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let result = self.apply(session, schema).await;

        c.in_flight.fetch_sub(1, Ordering::SeqCst);
        if result.as_ref().is_ok_and(|report| !report.is_noop()) {
            c.runs_with_changes.fetch_add(1, Ordering::SeqCst);
        }
        result
    }
}

/// Two-sided gate: the runner signals `entered` and then waits for `release`.
#[derive(Default)]
pub struct Gate {
    pub entered: Notify,
    pub release: Notify,
}

/// Blocks the first migration run inside the critical section until the
/// test opens the gate. Later runs pass straight through.
#[derive(Clone)]
pub struct GatedMigrations {
    pub inner: RecordingMigrations,
    pub gate: Arc<Gate>,
    armed: Arc<AtomicBool>,
}

impl GatedMigrations {
    pub fn new(inner: RecordingMigrations) -> Self {
        Self {
            inner,
            gate: Arc::new(Gate::default()),
            armed: Arc::new(AtomicBool::new(true)),
        }
    }
}

#[async_trait]
impl MigrationRunner for GatedMigrations {
    async fn migrate(
        &self,
        session: &mut dyn Session,
        schema: &TenantSchema,
    ) -> StorageResult<MigrationReport> {
        if self.armed.swap(false, Ordering::SeqCst) {
            self.gate.entered.notify_one();
            self.gate.release.notified().await;
        }
        self.inner.migrate(session, schema).await
    }
}

/// A catalog whose every query fails with a connection error.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnreachableCatalog;

fn unreachable() -> StorageError {
    StorageError::Backend(BackendError::ConnectionFailed {
        backend_name: "test".to_string(),
        message: "connection refused".to_string(),
    })
}

#[async_trait]
impl Catalog for UnreachableCatalog {
    async fn schema_exists(&self, _schema: &TenantSchema) -> StorageResult<bool> {
        Err(unreachable())
    }

    async fn table_exists(&self, _schema: &TenantSchema, _table: &TableName) -> StorageResult<bool> {
        Err(unreachable())
    }

    async fn list_schemas(&self, _prefix: &str) -> StorageResult<Vec<String>> {
        Err(unreachable())
    }
}

/// Shorthand for a validated schema.
pub fn schema(name: &str) -> TenantSchema {
    TenantSchema::parse(name).unwrap()
}

/// Shorthand for a validated table.
pub fn table(name: &str) -> TableName {
    TableName::parse(name).unwrap()
}
