//! Transaction kinds and the transactional-resource contract.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::StorageResult;
use crate::schema::TenantSchema;

/// Propagation and access policy for a unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    /// Read-write transaction (the default).
    #[default]
    Required,
    /// Read-write transaction that must be independent of any caller transaction.
    RequiresNew,
    /// Read-only transaction.
    ReadOnly,
    /// Read-only transaction independent of any caller transaction.
    RequiresNewReadOnly,
}

impl TransactionKind {
    /// All kinds, in declaration order.
    pub const ALL: [TransactionKind; 4] = [
        TransactionKind::Required,
        TransactionKind::RequiresNew,
        TransactionKind::ReadOnly,
        TransactionKind::RequiresNewReadOnly,
    ];

    /// Returns `true` if writes must be rejected.
    pub fn is_read_only(self) -> bool {
        matches!(
            self,
            TransactionKind::ReadOnly | TransactionKind::RequiresNewReadOnly
        )
    }

    /// Returns `true` if the transaction must not share a caller's transaction.
    pub fn requires_new(self) -> bool {
        matches!(
            self,
            TransactionKind::RequiresNew | TransactionKind::RequiresNewReadOnly
        )
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionKind::Required => write!(f, "required"),
            TransactionKind::RequiresNew => write!(f, "requires-new"),
            TransactionKind::ReadOnly => write!(f, "read-only"),
            TransactionKind::RequiresNewReadOnly => write!(f, "requires-new-read-only"),
        }
    }
}

/// An open transaction against one tenant schema.
///
/// The implementation enforces the access policy of its [`TransactionKind`]:
/// a write inside a read-only transaction must fail, never succeed silently.
/// A transaction dropped before `commit` or `rollback` must not leave
/// uncommitted work visible or reusable.
#[async_trait]
pub trait TenantTransaction: Send {
    /// The schema this transaction resolves against.
    fn schema(&self) -> &TenantSchema;

    /// The kind this transaction was opened with.
    fn kind(&self) -> TransactionKind;

    /// Commits the transaction.
    async fn commit(self) -> StorageResult<()>;

    /// Rolls the transaction back.
    async fn rollback(self) -> StorageResult<()>;
}

/// Opens tenant-scoped transactions.
#[async_trait]
pub trait TransactionProvider: Send + Sync {
    /// The transaction type returned by this provider.
    type Transaction: TenantTransaction;

    /// Begins a transaction of `kind` that resolves against `schema`.
    async fn begin(
        &self,
        schema: &TenantSchema,
        kind: TransactionKind,
    ) -> StorageResult<Self::Transaction>;
}
