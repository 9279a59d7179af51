//! Dedicated PostgreSQL sessions.

use async_trait::async_trait;
use deadpool_postgres::Client;

use crate::core::Session;
use crate::error::StorageResult;
use crate::lock::AdvisoryLockKey;
use crate::schema::TenantSchema;
use crate::schema::sql::{
    self, ADVISORY_UNLOCK_SQL, SCHEMA_EXISTS_SQL, TRY_ADVISORY_LOCK_SQL,
};

use super::backend::BACKEND_NAME;

/// A pooled connection used as a dedicated session.
///
/// Dropping the session returns the connection to the pool, which resets
/// its session state before handing it out again.
/// [`Session::terminate`] detaches it from the pool and closes it, which
/// ends every advisory lock it holds.
pub struct PostgresSession {
    client: Client,
}

impl PostgresSession {
    pub(super) fn new(client: Client) -> Self {
        Self { client }
    }

    /// The underlying client.
    pub fn client(&self) -> &Client {
        &self.client
    }
}

impl std::fmt::Debug for PostgresSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresSession")
            .field("closed", &self.client.is_closed())
            .finish()
    }
}

#[async_trait]
impl Session for PostgresSession {
    fn backend_name(&self) -> &'static str {
        BACKEND_NAME
    }

    async fn try_advisory_lock(&mut self, key: AdvisoryLockKey) -> StorageResult<bool> {
        let row = self
            .client
            .query_one(TRY_ADVISORY_LOCK_SQL, &[&key.value()])
            .await?;
        Ok(row.get(0))
    }

    async fn advisory_unlock(&mut self, key: AdvisoryLockKey) -> StorageResult<bool> {
        let row = self
            .client
            .query_one(ADVISORY_UNLOCK_SQL, &[&key.value()])
            .await?;
        Ok(row.get(0))
    }

    async fn create_schema(&mut self, schema: &TenantSchema) -> StorageResult<bool> {
        // Callers hold the schema lock, so the check and the create cannot race.
        let row = self
            .client
            .query_one(SCHEMA_EXISTS_SQL, &[&schema.as_str()])
            .await?;
        let existed: bool = row.get(0);
        self.client.batch_execute(&sql::create_schema(schema)).await?;
        Ok(!existed)
    }

    async fn drop_schema(&mut self, schema: &TenantSchema) -> StorageResult<bool> {
        let row = self
            .client
            .query_one(SCHEMA_EXISTS_SQL, &[&schema.as_str()])
            .await?;
        let existed: bool = row.get(0);
        self.client.batch_execute(&sql::drop_schema(schema)).await?;
        Ok(existed)
    }

    async fn batch_execute(&mut self, sql: &str) -> StorageResult<()> {
        self.client.batch_execute(sql).await?;
        Ok(())
    }

    fn terminate(self: Box<Self>) {
        tracing::debug!("Terminating PostgreSQL session");
        let this = *self;
        drop(Client::take(this.client));
    }
}
