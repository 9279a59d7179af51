//! The versioned-migration runner contract.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::session::Session;
use crate::error::StorageResult;
use crate::schema::TenantSchema;

/// What a migration run did to one schema.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationReport {
    /// Versions applied by this run, in order.
    pub applied: Vec<String>,
    /// Number of versions found already applied and skipped.
    pub skipped: usize,
}

impl MigrationReport {
    /// Returns `true` if nothing was applied.
    pub fn is_noop(&self) -> bool {
        self.applied.is_empty()
    }
}

/// Applies tenant migrations to one schema.
///
/// The runner is handed the same session that holds the provisioning lock
/// and must not acquire other connections for the migration itself. Runs must
/// be resumable: already-applied versions are skipped, so a retry after a
/// partial failure continues where the previous run stopped.
#[async_trait]
pub trait MigrationRunner: Send + Sync {
    /// Brings `schema` up to the latest version.
    async fn migrate(
        &self,
        session: &mut dyn Session,
        schema: &TenantSchema,
    ) -> StorageResult<MigrationReport>;
}
