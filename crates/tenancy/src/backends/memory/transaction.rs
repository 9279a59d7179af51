//! Buffered transactions against the in-memory store.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::core::{TenantTransaction, TransactionKind, TransactionProvider};
use crate::error::{StorageError, StorageResult, TenantError, TransactionError};
use crate::schema::{TableName, TenantSchema};

use super::backend::{MemoryBackend, MemoryStore, query_error};

/// A transaction buffering row inserts until commit.
///
/// Reads see committed rows plus this transaction's own pending writes.
/// Writes are rejected in read-only transactions. Dropping the transaction
/// discards the buffer.
pub struct MemoryTransaction {
    store: Arc<MemoryStore>,
    schema: TenantSchema,
    kind: TransactionKind,
    pending: Vec<(String, Value)>,
    finished: bool,
}

impl std::fmt::Debug for MemoryTransaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryTransaction")
            .field("schema", &self.schema)
            .field("kind", &self.kind)
            .field("pending", &self.pending.len())
            .finish()
    }
}

impl MemoryTransaction {
    /// Inserts a row into `table` of the bound schema.
    pub fn insert(&mut self, table: &TableName, row: Value) -> StorageResult<()> {
        if self.kind.is_read_only() {
            return Err(StorageError::Transaction(
                TransactionError::ReadOnlyViolation {
                    schema: self.schema.to_string(),
                },
            ));
        }
        if !self.store.table_known(self.schema.as_str(), table.as_str()) {
            return Err(query_error(format!(
                "relation \"{}.{}\" does not exist",
                self.schema, table
            )));
        }
        self.pending.push((table.to_string(), row));
        Ok(())
    }

    /// Rows of `table` visible inside this transaction.
    pub fn rows(&self, table: &TableName) -> StorageResult<Vec<Value>> {
        if !self.store.table_known(self.schema.as_str(), table.as_str()) {
            return Err(StorageError::Tenant(TenantError::TenantTableNotFound {
                schema: self.schema.to_string(),
                table: table.to_string(),
            }));
        }
        let mut rows = self.store.committed_rows(self.schema.as_str(), table.as_str());
        rows.extend(
            self.pending
                .iter()
                .filter(|(t, _)| t == table.as_str())
                .map(|(_, row)| row.clone()),
        );
        Ok(rows)
    }
}

#[async_trait]
impl TenantTransaction for MemoryTransaction {
    fn schema(&self) -> &TenantSchema {
        &self.schema
    }

    fn kind(&self) -> TransactionKind {
        self.kind
    }

    async fn commit(mut self) -> StorageResult<()> {
        self.finished = true;
        let pending = std::mem::take(&mut self.pending);
        self.store
            .commit(self.schema.as_str(), pending)
            .map_err(|e| {
                self.store.record_rollback();
                StorageError::Transaction(TransactionError::CommitFailed {
                    message: e.to_string(),
                })
            })
    }

    async fn rollback(mut self) -> StorageResult<()> {
        self.finished = true;
        self.pending.clear();
        self.store.record_rollback();
        Ok(())
    }
}

impl Drop for MemoryTransaction {
    fn drop(&mut self) {
        if !self.finished {
            tracing::warn!(schema = %self.schema, "Transaction dropped without commit, rolling back");
            self.store.record_rollback();
        }
    }
}

#[async_trait]
impl TransactionProvider for MemoryBackend {
    type Transaction = MemoryTransaction;

    async fn begin(
        &self,
        schema: &TenantSchema,
        kind: TransactionKind,
    ) -> StorageResult<Self::Transaction> {
        self.store.record_begin();
        Ok(MemoryTransaction {
            store: Arc::clone(&self.store),
            schema: schema.clone(),
            kind,
            pending: Vec::new(),
            finished: false,
        })
    }
}
