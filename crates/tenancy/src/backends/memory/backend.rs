//! In-memory backend state.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt::Debug;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use crate::core::{Catalog, Session, SessionProvider};
use crate::error::{BackendError, StorageError, StorageResult};
use crate::schema::{CONTROL_PLANE_SCHEMA, TableName, TenantSchema};

use super::session::MemorySession;

pub(super) fn query_error(message: impl Into<String>) -> StorageError {
    StorageError::Backend(BackendError::QueryError {
        message: message.into(),
    })
}

/// Counters describing every call the backend has served.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoryStats {
    /// Sessions handed out by [`SessionProvider::acquire`].
    pub sessions_acquired: u64,
    /// Sessions ended through [`Session::terminate`].
    pub sessions_terminated: u64,
    /// Advisory lock attempts, granted or not.
    pub lock_attempts: u64,
    /// `CREATE SCHEMA` / `DROP SCHEMA` statements issued.
    pub ddl_statements: u64,
    /// Schemas that did not exist before a `CREATE SCHEMA`.
    pub schemas_created: u64,
    /// Schemas that existed before a `DROP SCHEMA`.
    pub schemas_dropped: u64,
    /// Statements passed to [`Session::batch_execute`].
    pub batch_statements: u64,
    /// Catalog lookups.
    pub catalog_queries: u64,
    /// Transactions begun.
    pub transactions_begun: u64,
    /// Transactions committed.
    pub commits: u64,
    /// Transactions rolled back, explicitly or by being dropped.
    pub rollbacks: u64,
}

impl MemoryStats {
    /// Total number of calls that reached the store.
    pub fn total_calls(&self) -> u64 {
        self.sessions_acquired
            + self.lock_attempts
            + self.ddl_statements
            + self.batch_statements
            + self.catalog_queries
            + self.transactions_begun
    }
}

#[derive(Default)]
struct Counters {
    sessions_acquired: AtomicU64,
    sessions_terminated: AtomicU64,
    lock_attempts: AtomicU64,
    ddl_statements: AtomicU64,
    schemas_created: AtomicU64,
    schemas_dropped: AtomicU64,
    batch_statements: AtomicU64,
    catalog_queries: AtomicU64,
    transactions_begun: AtomicU64,
    commits: AtomicU64,
    rollbacks: AtomicU64,
}

#[derive(Debug, Clone, Copy)]
struct LockHolder {
    session_id: u64,
    depth: u32,
}

#[derive(Default)]
struct State {
    /// schema -> tables
    schemas: BTreeMap<String, BTreeSet<String>>,
    /// (schema, table) -> committed rows
    rows: HashMap<(String, String), Vec<Value>>,
    locks: HashMap<i64, LockHolder>,
    /// batch statements, oldest first
    executed: Vec<String>,
    fail_next_ddl: Option<String>,
}

/// Shared state behind a [`MemoryBackend`] and the sessions it hands out.
pub(super) struct MemoryStore {
    state: Mutex<State>,
    counters: Counters,
    next_session_id: AtomicU64,
}

impl MemoryStore {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::SeqCst);
    }

    pub(super) fn try_lock(&self, session_id: u64, key: i64) -> bool {
        Self::bump(&self.counters.lock_attempts);
        let mut state = self.state.lock();
        match state.locks.get_mut(&key) {
            Some(holder) if holder.session_id == session_id => {
                holder.depth += 1;
                true
            }
            Some(_) => false,
            None => {
                state.locks.insert(
                    key,
                    LockHolder {
                        session_id,
                        depth: 1,
                    },
                );
                true
            }
        }
    }

    pub(super) fn unlock(&self, session_id: u64, key: i64) -> bool {
        let mut state = self.state.lock();
        match state.locks.get_mut(&key) {
            Some(holder) if holder.session_id == session_id => {
                holder.depth -= 1;
                if holder.depth == 0 {
                    state.locks.remove(&key);
                }
                true
            }
            _ => false,
        }
    }

    /// Drops every lock owned by a session, as the server does when a
    /// connection closes.
    pub(super) fn release_session(&self, session_id: u64) {
        self.state
            .lock()
            .locks
            .retain(|_, holder| holder.session_id != session_id);
    }

    pub(super) fn record_terminated(&self) {
        Self::bump(&self.counters.sessions_terminated);
    }

    fn take_ddl_fault(state: &mut State) -> StorageResult<()> {
        match state.fail_next_ddl.take() {
            Some(message) => Err(query_error(message)),
            None => Ok(()),
        }
    }

    pub(super) fn create_schema(&self, schema: &TenantSchema) -> StorageResult<bool> {
        Self::bump(&self.counters.ddl_statements);
        let mut state = self.state.lock();
        Self::take_ddl_fault(&mut state)?;

        if state.schemas.contains_key(schema.as_str()) {
            return Ok(false);
        }
        state.schemas.insert(schema.to_string(), BTreeSet::new());
        Self::bump(&self.counters.schemas_created);
        Ok(true)
    }

    pub(super) fn drop_schema(&self, schema: &TenantSchema) -> StorageResult<bool> {
        Self::bump(&self.counters.ddl_statements);
        let mut state = self.state.lock();
        Self::take_ddl_fault(&mut state)?;

        if state.schemas.remove(schema.as_str()).is_none() {
            return Ok(false);
        }
        state.rows.retain(|(s, _), _| s != schema.as_str());
        Self::bump(&self.counters.schemas_dropped);
        Ok(true)
    }

    pub(super) fn batch_execute(&self, sql: &str) {
        Self::bump(&self.counters.batch_statements);
        self.state.lock().executed.push(sql.to_string());
    }

    pub(super) fn record_begin(&self) {
        Self::bump(&self.counters.transactions_begun);
    }

    pub(super) fn table_known(&self, schema: &str, table: &str) -> bool {
        self.state
            .lock()
            .schemas
            .get(schema)
            .is_some_and(|tables| tables.contains(table))
    }

    pub(super) fn committed_rows(&self, schema: &str, table: &str) -> Vec<Value> {
        self.state
            .lock()
            .rows
            .get(&(schema.to_string(), table.to_string()))
            .cloned()
            .unwrap_or_default()
    }

    /// Applies buffered writes atomically. Tables dropped since the write was
    /// buffered fail the whole commit.
    pub(super) fn commit(
        &self,
        schema: &str,
        pending: Vec<(String, Value)>,
    ) -> StorageResult<()> {
        let mut state = self.state.lock();

        for (table, _) in &pending {
            let exists = state
                .schemas
                .get(schema)
                .is_some_and(|tables| tables.contains(table));
            if !exists {
                return Err(query_error(format!(
                    "relation \"{}.{}\" does not exist",
                    schema, table
                )));
            }
        }

        for (table, row) in pending {
            state
                .rows
                .entry((schema.to_string(), table))
                .or_default()
                .push(row);
        }
        drop(state);

        Self::bump(&self.counters.commits);
        Ok(())
    }

    pub(super) fn record_rollback(&self) {
        Self::bump(&self.counters.rollbacks);
    }
}

/// A process-local backend that keeps schemas, tables and rows in memory.
///
/// It implements every outbound contract ([`SessionProvider`], [`Catalog`],
/// [`TransactionProvider`](crate::core::TransactionProvider)) and counts each
/// call, which makes it the store of choice for tests and embedded use.
/// Advisory locks are shared by all sessions of one backend and are dropped
/// when the owning session is dropped or terminated. Sessions are not pooled.
///
/// # Example
///
/// ```
/// use strata_tenancy::backends::memory::MemoryBackend;
///
/// let backend = MemoryBackend::new();
/// assert_eq!(backend.stats().total_calls(), 0);
/// ```
#[derive(Clone)]
pub struct MemoryBackend {
    pub(super) store: Arc<MemoryStore>,
}

impl Debug for MemoryBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.store.state.lock();
        f.debug_struct("MemoryBackend")
            .field("schemas", &state.schemas.len())
            .field("locks_held", &state.locks.len())
            .finish_non_exhaustive()
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    /// Creates an empty backend containing only the control-plane schema.
    pub fn new() -> Self {
        let mut state = State::default();
        state
            .schemas
            .insert(CONTROL_PLANE_SCHEMA.to_string(), BTreeSet::new());

        Self {
            store: Arc::new(MemoryStore {
                state: Mutex::new(state),
                counters: Counters::default(),
                next_session_id: AtomicU64::new(1),
            }),
        }
    }

    /// Creates a table inside an existing schema. Idempotent.
    ///
    /// Migration runners targeting this backend use it to materialize tables.
    pub fn create_table(&self, schema: &TenantSchema, table: &TableName) -> StorageResult<()> {
        let mut state = self.store.state.lock();
        match state.schemas.get_mut(schema.as_str()) {
            Some(tables) => {
                tables.insert(table.to_string());
                Ok(())
            }
            None => Err(query_error(format!(
                "schema \"{}\" does not exist",
                schema
            ))),
        }
    }

    /// Drops a table and its rows. Returns `true` if it existed.
    pub fn drop_table(&self, schema: &TenantSchema, table: &TableName) -> bool {
        let mut state = self.store.state.lock();
        let removed = state
            .schemas
            .get_mut(schema.as_str())
            .is_some_and(|tables| tables.remove(table.as_str()));
        if removed {
            state
                .rows
                .remove(&(schema.to_string(), table.to_string()));
        }
        removed
    }

    /// Makes the next `CREATE SCHEMA` or `DROP SCHEMA` fail with `message`.
    pub fn fail_next_ddl(&self, message: impl Into<String>) {
        self.store.state.lock().fail_next_ddl = Some(message.into());
    }

    /// Statements received through [`Session::batch_execute`], in order.
    ///
    /// The journal grows until [`MemoryBackend::clear_executed`] is called.
    pub fn executed_statements(&self) -> Vec<String> {
        self.store.state.lock().executed.clone()
    }

    /// Empties the statement journal.
    pub fn clear_executed(&self) {
        self.store.state.lock().executed.clear();
    }

    /// Number of advisory locks currently held.
    pub fn held_locks(&self) -> usize {
        self.store.state.lock().locks.len()
    }

    /// Committed rows of a table.
    pub fn rows(&self, schema: &TenantSchema, table: &TableName) -> Vec<Value> {
        self.store.committed_rows(schema.as_str(), table.as_str())
    }

    /// Snapshot of the call counters.
    pub fn stats(&self) -> MemoryStats {
        let c = &self.store.counters;
        let load = |counter: &AtomicU64| counter.load(Ordering::SeqCst);
        MemoryStats {
            sessions_acquired: load(&c.sessions_acquired),
            sessions_terminated: load(&c.sessions_terminated),
            lock_attempts: load(&c.lock_attempts),
            ddl_statements: load(&c.ddl_statements),
            schemas_created: load(&c.schemas_created),
            schemas_dropped: load(&c.schemas_dropped),
            batch_statements: load(&c.batch_statements),
            catalog_queries: load(&c.catalog_queries),
            transactions_begun: load(&c.transactions_begun),
            commits: load(&c.commits),
            rollbacks: load(&c.rollbacks),
        }
    }
}

#[async_trait]
impl SessionProvider for MemoryBackend {
    async fn acquire(&self) -> StorageResult<Box<dyn Session>> {
        MemoryStore::bump(&self.store.counters.sessions_acquired);
        let id = self.store.next_session_id.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MemorySession::new(id, Arc::clone(&self.store))))
    }
}

#[async_trait]
impl Catalog for MemoryBackend {
    async fn schema_exists(&self, schema: &TenantSchema) -> StorageResult<bool> {
        MemoryStore::bump(&self.store.counters.catalog_queries);
        Ok(self.store.state.lock().schemas.contains_key(schema.as_str()))
    }

    async fn table_exists(&self, schema: &TenantSchema, table: &TableName) -> StorageResult<bool> {
        MemoryStore::bump(&self.store.counters.catalog_queries);
        Ok(self.store.table_known(schema.as_str(), table.as_str()))
    }

    async fn list_schemas(&self, prefix: &str) -> StorageResult<Vec<String>> {
        MemoryStore::bump(&self.store.counters.catalog_queries);
        Ok(self
            .store
            .state
            .lock()
            .schemas
            .keys()
            .filter(|name| name.starts_with(prefix))
            .cloned()
            .collect())
    }
}
