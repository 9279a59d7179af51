//! Schema and table existence probes.

use crate::core::Catalog;
use crate::error::StorageResult;
use crate::schema::{TableName, TenantSchema};

/// What a tenant schema needs in order to count as usable.
///
/// Without a table the schema only has to exist.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReadinessRequirement {
    /// The tenant schema.
    pub schema: TenantSchema,
    /// A table that must exist inside the schema.
    pub table: Option<TableName>,
}

impl ReadinessRequirement {
    /// Validates both names and builds the requirement.
    pub fn new(schema: &str, table: Option<&str>) -> StorageResult<Self> {
        Ok(Self {
            schema: TenantSchema::parse(schema)?,
            table: table.map(TableName::parse).transpose()?,
        })
    }

    /// A requirement satisfied by the schema existing.
    pub fn schema_only(schema: TenantSchema) -> Self {
        Self {
            schema,
            table: None,
        }
    }

    /// A requirement on one table inside the schema.
    pub fn with_table(schema: TenantSchema, table: TableName) -> Self {
        Self {
            schema,
            table: Some(table),
        }
    }
}

/// Result of evaluating a [`ReadinessRequirement`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Readiness {
    /// Schema and required table exist.
    Ready,
    /// The schema does not exist.
    SchemaMissing,
    /// The schema exists but the required table does not.
    TableMissing(TableName),
}

impl Readiness {
    /// Returns `true` for [`Readiness::Ready`].
    pub fn is_ready(&self) -> bool {
        matches!(self, Readiness::Ready)
    }
}

/// Read-only existence checks against the catalog.
///
/// Raw names are validated before the catalog is touched, so a malformed
/// name never reaches the store.
#[derive(Debug, Clone)]
pub struct SchemaProber<C> {
    catalog: C,
}

impl<C: Catalog> SchemaProber<C> {
    /// Creates a prober over a catalog.
    pub fn new(catalog: C) -> Self {
        Self { catalog }
    }

    /// The underlying catalog.
    pub fn catalog(&self) -> &C {
        &self.catalog
    }

    /// Returns `true` if the schema exists.
    pub async fn schema_exists(&self, schema: &str) -> StorageResult<bool> {
        let schema = TenantSchema::parse(schema)?;
        self.catalog.schema_exists(&schema).await
    }

    /// Returns `true` if `table` exists inside `schema`.
    pub async fn table_exists(&self, schema: &str, table: &str) -> StorageResult<bool> {
        let schema = TenantSchema::parse(schema)?;
        let table = TableName::parse(table)?;
        self.catalog.table_exists(&schema, &table).await
    }

    /// Evaluates a requirement. The table is only probed if the schema exists.
    pub async fn check(&self, requirement: &ReadinessRequirement) -> StorageResult<Readiness> {
        if !self.catalog.schema_exists(&requirement.schema).await? {
            return Ok(Readiness::SchemaMissing);
        }

        match &requirement.table {
            Some(table) if !self.catalog.table_exists(&requirement.schema, table).await? => {
                Ok(Readiness::TableMissing(table.clone()))
            }
            _ => Ok(Readiness::Ready),
        }
    }
}
