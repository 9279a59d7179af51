//! Read-only catalog queries.

use async_trait::async_trait;

use crate::error::StorageResult;
use crate::schema::{TableName, TenantSchema};

/// Metadata lookups against the store's schema catalog.
///
/// Implementations must treat both arguments as values (bound parameters),
/// never as SQL text.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Returns `true` if the schema exists.
    async fn schema_exists(&self, schema: &TenantSchema) -> StorageResult<bool>;

    /// Returns `true` if `table` exists inside `schema`.
    async fn table_exists(&self, schema: &TenantSchema, table: &TableName) -> StorageResult<bool>;

    /// Lists the names of all schemas starting with `prefix`, sorted.
    ///
    /// Names are returned raw; callers validate them before use.
    async fn list_schemas(&self, prefix: &str) -> StorageResult<Vec<String>>;
}
