//! Dedicated database sessions.

use async_trait::async_trait;

use crate::error::StorageResult;
use crate::lock::AdvisoryLockKey;
use crate::schema::TenantSchema;

/// A single physical connection to the relational store.
///
/// Advisory locks taken through a session are tied to it: they stay held until
/// released on the same session, or until the session ends. Schema DDL and the
/// migration run for one provisioning call all go through the session that
/// holds the lock.
#[async_trait]
pub trait Session: Send {
    /// Returns a short backend name for logs and errors.
    fn backend_name(&self) -> &'static str;

    /// Makes a single non-blocking attempt to take the advisory lock.
    ///
    /// Returns `false` when another session holds it.
    async fn try_advisory_lock(&mut self, key: AdvisoryLockKey) -> StorageResult<bool>;

    /// Releases an advisory lock held by this session.
    ///
    /// Returns `false` when this session did not hold the lock.
    async fn advisory_unlock(&mut self, key: AdvisoryLockKey) -> StorageResult<bool>;

    /// Creates the schema if it is absent. Returns `true` if it was created.
    async fn create_schema(&mut self, schema: &TenantSchema) -> StorageResult<bool>;

    /// Drops the schema and everything in it. Returns `true` if it existed.
    async fn drop_schema(&mut self, schema: &TenantSchema) -> StorageResult<bool>;

    /// Executes one or more SQL statements with no parameters and no results.
    ///
    /// This is the facility migration runners use to apply their scripts.
    async fn batch_execute(&mut self, sql: &str) -> StorageResult<()>;

    /// Ends the session without handing the connection back for reuse.
    ///
    /// Session-scoped state on the server, advisory locks included, goes away
    /// with it.
    fn terminate(self: Box<Self>);
}

/// Hands out dedicated sessions.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    /// Acquires a session that no other caller uses until it is dropped.
    async fn acquire(&self) -> StorageResult<Box<dyn Session>>;
}
