//! Readiness gating for tenant schemas.
//!
//! A tenant is ready once its schema exists and, where a table is named, that
//! table exists too. With no table named, the schema existing is enough.
//! [`ReadinessGate::is_usable`] and [`ReadinessGate::run_if_usable`] check the
//! configured anchor table (the tenant's user table by default) instead.
//!
//! | Mode | Not ready | Ready |
//! |------|-----------|-------|
//! | [`ReadinessGate::run_if_ready`] | returns the default, `f` not called | runs `f` bound to the schema |
//! | [`ReadinessGate::assert_ready`] | `TenantSchemaNotFound` / `TenantTableNotFound` | `Ok(())` |
//! | [`ReadinessGate::run_or_throw`] | same errors as `assert_ready` | runs `f` bound to the schema |

use futures::future::BoxFuture;

use crate::config::TenancyConfig;
use crate::context::{ExecutionContext, SchemaBinder};
use crate::core::Catalog;
use crate::error::{StorageError, StorageResult, TenantError};
use crate::probe::{Readiness, ReadinessRequirement, SchemaProber};
use crate::schema::{TableName, TenantSchema};

/// Gates tenant work on schema readiness.
#[derive(Debug, Clone)]
pub struct ReadinessGate<C> {
    prober: SchemaProber<C>,
    binder: SchemaBinder,
    anchor: TableName,
}

impl<C: Catalog> ReadinessGate<C> {
    /// Creates a gate with an explicit anchor table.
    pub fn new(catalog: C, binder: SchemaBinder, anchor: TableName) -> Self {
        Self {
            prober: SchemaProber::new(catalog),
            binder,
            anchor,
        }
    }

    /// Creates a gate from configuration.
    pub fn from_config(catalog: C, config: &TenancyConfig) -> StorageResult<Self> {
        Ok(Self::new(
            catalog,
            SchemaBinder::from_config(config),
            config.anchor()?,
        ))
    }

    /// The table that marks a tenant minimally usable.
    pub fn anchor(&self) -> &TableName {
        &self.anchor
    }

    /// The underlying prober.
    pub fn prober(&self) -> &SchemaProber<C> {
        &self.prober
    }

    fn requirement(&self, schema: &str, table: Option<&str>) -> StorageResult<ReadinessRequirement> {
        let schema = SchemaBinder::validate(schema)?;
        Ok(match table {
            Some(table) => ReadinessRequirement::with_table(schema, TableName::parse(table)?),
            None => ReadinessRequirement::schema_only(schema),
        })
    }

    /// Best-effort readiness check.
    ///
    /// Malformed names still fail. A catalog failure is logged and reported
    /// as not ready.
    pub async fn is_ready(&self, schema: &str, table: Option<&str>) -> StorageResult<bool> {
        let requirement = self.requirement(schema, table)?;
        Ok(self.probe_best_effort(&requirement).await)
    }

    /// Returns `true` if the schema and its anchor table exist.
    pub async fn is_usable(&self, schema: &str) -> StorageResult<bool> {
        let schema = SchemaBinder::validate(schema)?;
        let requirement = ReadinessRequirement::with_table(schema, self.anchor.clone());
        Ok(self.probe_best_effort(&requirement).await)
    }

    async fn probe_best_effort(&self, requirement: &ReadinessRequirement) -> bool {
        match self.prober.check(requirement).await {
            Ok(readiness) => readiness.is_ready(),
            Err(e) => {
                tracing::warn!(
                    schema = %requirement.schema,
                    error = %e,
                    "Readiness probe failed, treating tenant as not ready"
                );
                false
            }
        }
    }

    /// Runs `f` bound to `schema` if it is ready, otherwise returns `default`
    /// without calling `f`.
    pub async fn run_if_ready<T, F>(
        &self,
        ctx: &mut ExecutionContext,
        schema: &str,
        table: Option<&str>,
        f: F,
        default: T,
    ) -> StorageResult<T>
    where
        F: for<'c> FnOnce(&'c mut ExecutionContext) -> BoxFuture<'c, StorageResult<T>> + Send,
    {
        let requirement = self.requirement(schema, table)?;
        if !self.probe_best_effort(&requirement).await {
            tracing::debug!(schema = %requirement.schema, "Tenant not ready, returning default");
            return Ok(default);
        }
        self.run_bound(ctx, requirement.schema, f).await
    }

    /// [`run_if_ready`](Self::run_if_ready) against the anchor table.
    pub async fn run_if_usable<T, F>(
        &self,
        ctx: &mut ExecutionContext,
        schema: &str,
        f: F,
        default: T,
    ) -> StorageResult<T>
    where
        F: for<'c> FnOnce(&'c mut ExecutionContext) -> BoxFuture<'c, StorageResult<T>> + Send,
    {
        let anchor = self.anchor.clone();
        self.run_if_ready(ctx, schema, Some(anchor.as_str()), f, default)
            .await
    }

    /// Fails unless the schema, and `table` if given, exist.
    ///
    /// Catalog failures propagate.
    pub async fn assert_ready(&self, schema: &str, table: Option<&str>) -> StorageResult<()> {
        let requirement = self.requirement(schema, table)?;
        self.assert_requirement(&requirement).await
    }

    async fn assert_requirement(&self, requirement: &ReadinessRequirement) -> StorageResult<()> {
        match self.prober.check(requirement).await? {
            Readiness::Ready => Ok(()),
            Readiness::SchemaMissing => {
                Err(StorageError::Tenant(TenantError::TenantSchemaNotFound {
                    schema: requirement.schema.to_string(),
                }))
            }
            Readiness::TableMissing(table) => {
                Err(StorageError::Tenant(TenantError::TenantTableNotFound {
                    schema: requirement.schema.to_string(),
                    table: table.to_string(),
                }))
            }
        }
    }

    /// Asserts readiness, then runs `f` bound to the schema.
    pub async fn run_or_throw<T, F>(
        &self,
        ctx: &mut ExecutionContext,
        schema: &str,
        table: Option<&str>,
        f: F,
    ) -> StorageResult<T>
    where
        F: for<'c> FnOnce(&'c mut ExecutionContext) -> BoxFuture<'c, StorageResult<T>> + Send,
    {
        let requirement = self.requirement(schema, table)?;
        self.assert_requirement(&requirement).await?;
        self.run_bound(ctx, requirement.schema, f).await
    }

    async fn run_bound<T, F>(
        &self,
        ctx: &mut ExecutionContext,
        schema: TenantSchema,
        f: F,
    ) -> StorageResult<T>
    where
        F: for<'c> FnOnce(&'c mut ExecutionContext) -> BoxFuture<'c, StorageResult<T>> + Send,
    {
        let mut binding = self.binder.bind_schema(ctx, schema);
        f(&mut *binding).await
    }
}
