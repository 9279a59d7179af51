//! Tenant-scoped PostgreSQL transactions.

use async_trait::async_trait;
use deadpool_postgres::Client;
use tokio_postgres::error::SqlState;
use tokio_postgres::types::ToSql;
use tokio_postgres::Row;

use crate::core::{TenantTransaction, TransactionKind, TransactionProvider};
use crate::error::{StorageError, StorageResult, TransactionError};
use crate::schema::TenantSchema;
use crate::schema::sql;

use super::PostgresBackend;

/// A PostgreSQL transaction whose search path is the tenant schema.
///
/// Unqualified table names inside the transaction resolve against the tenant
/// schema. A transaction dropped while active detaches its connection from
/// the pool, so the server rolls it back and the connection is never reused
/// mid-transaction.
pub struct PostgresTransaction {
    /// Option so we can take it during commit/rollback.
    client: Option<Client>,
    schema: TenantSchema,
    kind: TransactionKind,
}

impl std::fmt::Debug for PostgresTransaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresTransaction")
            .field("active", &self.client.is_some())
            .field("schema", &self.schema)
            .field("kind", &self.kind)
            .finish()
    }
}

fn begin_statement(kind: TransactionKind) -> &'static str {
    if kind.is_read_only() {
        "BEGIN READ ONLY"
    } else {
        "BEGIN"
    }
}

impl PostgresTransaction {
    async fn start(client: Client, schema: &TenantSchema, kind: TransactionKind) -> StorageResult<Self> {
        let script = format!("{}; {}", begin_statement(kind), sql::set_local_search_path(schema));
        if let Err(e) = client.batch_execute(&script).await {
            drop(Client::take(client));
            return Err(StorageError::Transaction(TransactionError::BeginFailed {
                kind,
                message: e.to_string(),
            }));
        }

        Ok(Self {
            client: Some(client),
            schema: schema.clone(),
            kind,
        })
    }

    /// The client running this transaction.
    pub fn client(&self) -> StorageResult<&Client> {
        self.client
            .as_ref()
            .ok_or(StorageError::Transaction(TransactionError::InvalidTransaction))
    }

    /// Executes a statement, returning the number of rows affected.
    pub async fn execute(&self, statement: &str, params: &[&(dyn ToSql + Sync)]) -> StorageResult<u64> {
        self.client()?
            .execute(statement, params)
            .await
            .map_err(|e| self.map_error(e))
    }

    /// Runs a query and returns its rows.
    pub async fn query(&self, statement: &str, params: &[&(dyn ToSql + Sync)]) -> StorageResult<Vec<Row>> {
        self.client()?
            .query(statement, params)
            .await
            .map_err(|e| self.map_error(e))
    }

    fn map_error(&self, err: tokio_postgres::Error) -> StorageError {
        if err.code() == Some(&SqlState::READ_ONLY_SQL_TRANSACTION) {
            return StorageError::Transaction(TransactionError::ReadOnlyViolation {
                schema: self.schema.to_string(),
            });
        }
        StorageError::from(err)
    }
}

#[async_trait]
impl TenantTransaction for PostgresTransaction {
    fn schema(&self) -> &TenantSchema {
        &self.schema
    }

    fn kind(&self) -> TransactionKind {
        self.kind
    }

    async fn commit(mut self) -> StorageResult<()> {
        let client = self
            .client
            .take()
            .ok_or(StorageError::Transaction(TransactionError::InvalidTransaction))?;

        if let Err(e) = client.batch_execute("COMMIT").await {
            drop(Client::take(client));
            return Err(StorageError::Transaction(TransactionError::CommitFailed {
                message: e.to_string(),
            }));
        }
        Ok(())
    }

    async fn rollback(mut self) -> StorageResult<()> {
        let client = self
            .client
            .take()
            .ok_or(StorageError::Transaction(TransactionError::InvalidTransaction))?;

        if let Err(e) = client.batch_execute("ROLLBACK").await {
            drop(Client::take(client));
            return Err(StorageError::Transaction(TransactionError::RolledBack {
                reason: format!("Rollback failed: {}", e),
            }));
        }
        Ok(())
    }
}

impl Drop for PostgresTransaction {
    fn drop(&mut self) {
        if let Some(client) = self.client.take() {
            tracing::warn!(
                schema = %self.schema,
                "PostgreSQL transaction dropped without commit or rollback, closing its connection"
            );
            drop(Client::take(client));
        }
    }
}

#[async_trait]
impl TransactionProvider for PostgresBackend {
    type Transaction = PostgresTransaction;

    async fn begin(
        &self,
        schema: &TenantSchema,
        kind: TransactionKind,
    ) -> StorageResult<Self::Transaction> {
        let client = self.get_client().await?;
        PostgresTransaction::start(client, schema, kind).await
    }
}
