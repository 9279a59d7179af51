//! Sessions against the in-memory store.

use std::sync::Arc;

use async_trait::async_trait;

use crate::core::Session;
use crate::error::StorageResult;
use crate::lock::AdvisoryLockKey;
use crate::schema::TenantSchema;

use super::backend::MemoryStore;

/// A dedicated session on a [`MemoryBackend`](super::MemoryBackend).
///
/// Advisory locks belong to the session id. Dropping or terminating the
/// session releases every lock it still holds.
pub struct MemorySession {
    id: u64,
    store: Arc<MemoryStore>,
}

impl MemorySession {
    pub(super) fn new(id: u64, store: Arc<MemoryStore>) -> Self {
        Self { id, store }
    }

    /// The session id used as lock owner.
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl std::fmt::Debug for MemorySession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemorySession").field("id", &self.id).finish()
    }
}

#[async_trait]
impl Session for MemorySession {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn try_advisory_lock(&mut self, key: AdvisoryLockKey) -> StorageResult<bool> {
        Ok(self.store.try_lock(self.id, key.value()))
    }

    async fn advisory_unlock(&mut self, key: AdvisoryLockKey) -> StorageResult<bool> {
        Ok(self.store.unlock(self.id, key.value()))
    }

    async fn create_schema(&mut self, schema: &TenantSchema) -> StorageResult<bool> {
        self.store.create_schema(schema)
    }

    async fn drop_schema(&mut self, schema: &TenantSchema) -> StorageResult<bool> {
        self.store.drop_schema(schema)
    }

    async fn batch_execute(&mut self, sql: &str) -> StorageResult<()> {
        self.store.batch_execute(sql);
        Ok(())
    }

    fn terminate(self: Box<Self>) {
        tracing::debug!(session_id = self.id, "Terminating memory session");
        self.store.record_terminated();
        // Drop releases the locks.
    }
}

impl Drop for MemorySession {
    fn drop(&mut self) {
        self.store.release_session(self.id);
    }
}
