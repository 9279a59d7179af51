//! Explicit execution context and the schema binder.
//!
//! An [`ExecutionContext`] is owned by one request or task and threaded
//! explicitly through every call that needs the current tenant schema. There
//! is no thread-local or task-local state: a context can only be observed by
//! whoever holds a reference to it.
//!
//! [`SchemaBinder`] scopes a tenant schema onto a context. Binding returns a
//! [`SchemaBinding`] guard that restores the previous state when dropped, on
//! every exit path including errors, panics and cancelled futures.
//!
//! ```
//! use strata_tenancy::context::{ExecutionContext, SchemaBinder};
//!
//! let binder = SchemaBinder::new();
//! let mut ctx = ExecutionContext::new();
//! {
//!     let binding = binder.bind(&mut ctx, "t_acme_ab12cd").unwrap();
//!     assert_eq!(binding.current_schema().unwrap().as_str(), "t_acme_ab12cd");
//! }
//! assert!(ctx.current_schema().is_none());
//! ```

use std::ops::{Deref, DerefMut};

use futures::future::BoxFuture;

use crate::config::TenancyConfig;
use crate::core::TransactionKind;
use crate::error::{StorageError, StorageResult};
use crate::schema::{CONTROL_PLANE_SCHEMA, TenantSchema};

/// Per-request holder of at most one bound tenant schema.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionContext {
    request_id: Option<String>,
    schema: Option<TenantSchema>,
    transaction: Option<TransactionKind>,
}

impl ExecutionContext {
    /// Creates an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty context tagged with a request id for log correlation.
    pub fn with_request_id(request_id: impl Into<String>) -> Self {
        Self {
            request_id: Some(request_id.into()),
            ..Default::default()
        }
    }

    /// The request id, if any.
    pub fn request_id(&self) -> Option<&str> {
        self.request_id.as_deref()
    }

    /// The schema currently bound, if any.
    pub fn current_schema(&self) -> Option<&TenantSchema> {
        self.schema.as_ref()
    }

    /// The schema currently bound, or [`TenantError::InvalidTenant`] if none is.
    ///
    /// [`TenantError::InvalidTenant`]: crate::error::TenantError::InvalidTenant
    pub fn require_schema(&self) -> StorageResult<&TenantSchema> {
        self.schema
            .as_ref()
            .ok_or_else(|| StorageError::invalid_tenant("", "no tenant schema is bound"))
    }

    /// The kind of the transaction open on this context, if any.
    pub fn active_transaction(&self) -> Option<TransactionKind> {
        self.transaction
    }

    /// Returns `true` if a unit of work holds a transaction on this context.
    pub fn in_transaction(&self) -> bool {
        self.transaction.is_some()
    }
}

/// Binds tenant schemas onto execution contexts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchemaBinder {
    warn_on_nested: bool,
}

impl Default for SchemaBinder {
    fn default() -> Self {
        Self::new()
    }
}

impl SchemaBinder {
    /// Creates a binder that warns on nested binding.
    pub fn new() -> Self {
        Self {
            warn_on_nested: true,
        }
    }

    /// Creates a binder from configuration.
    pub fn from_config(config: &TenancyConfig) -> Self {
        Self {
            warn_on_nested: config.warn_on_nested_binding,
        }
    }

    /// Validates `raw` for tenant execution.
    ///
    /// Blank input and the control-plane schema fail with
    /// [`TenantError::InvalidTenant`]; anything else malformed fails with
    /// [`SchemaError::InvalidSchema`].
    ///
    /// [`TenantError::InvalidTenant`]: crate::error::TenantError::InvalidTenant
    /// [`SchemaError::InvalidSchema`]: crate::error::SchemaError::InvalidSchema
    pub fn validate(raw: &str) -> StorageResult<TenantSchema> {
        let candidate = raw.trim();
        if candidate.is_empty() {
            return Err(StorageError::invalid_tenant(
                raw,
                "tenant schema must not be blank",
            ));
        }
        if candidate == CONTROL_PLANE_SCHEMA {
            return Err(StorageError::invalid_tenant(
                raw,
                "the control-plane schema cannot run tenant work",
            ));
        }
        TenantSchema::parse(candidate)
    }

    /// Validates `raw` and binds it onto `ctx` until the guard is dropped.
    pub fn bind<'a>(
        &self,
        ctx: &'a mut ExecutionContext,
        raw: &str,
    ) -> StorageResult<SchemaBinding<'a>> {
        let schema = Self::validate(raw)?;
        Ok(self.bind_schema(ctx, schema))
    }

    /// Binds an already validated schema onto `ctx`.
    ///
    /// Binding over an existing binding is allowed but logged, since work
    /// left in the outer scope after the inner scope ends runs against the
    /// restored outer schema.
    pub fn bind_schema<'a>(
        &self,
        ctx: &'a mut ExecutionContext,
        schema: TenantSchema,
    ) -> SchemaBinding<'a> {
        if self.warn_on_nested {
            if let Some(current) = ctx.schema.as_ref() {
                tracing::warn!(
                    current = %current,
                    requested = %schema,
                    request_id = ctx.request_id.as_deref().unwrap_or("-"),
                    "Tenant schema already bound on this execution context"
                );
            }
        }

        let previous_schema = ctx.schema.replace(schema.clone());
        let previous_transaction = ctx.transaction;
        tracing::debug!(schema = %schema, "Tenant schema bound");

        SchemaBinding {
            context: ctx,
            schema,
            previous_schema,
            previous_transaction,
        }
    }

    /// Runs `f` with `raw` bound as the current schema.
    ///
    /// The previous binding is restored when `f` finishes, whether it
    /// succeeded, failed or panicked.
    pub async fn run_in_schema<T, F>(
        &self,
        ctx: &mut ExecutionContext,
        raw: &str,
        f: F,
    ) -> StorageResult<T>
    where
        F: for<'c> FnOnce(&'c mut ExecutionContext) -> BoxFuture<'c, StorageResult<T>> + Send,
    {
        let mut binding = self.bind(ctx, raw)?;
        f(&mut *binding).await
    }
}

/// Guard keeping a schema bound on an [`ExecutionContext`].
///
/// Dereferences to the context. Dropping the guard restores the schema and
/// transaction state that was in place before binding.
#[derive(Debug)]
pub struct SchemaBinding<'a> {
    context: &'a mut ExecutionContext,
    schema: TenantSchema,
    previous_schema: Option<TenantSchema>,
    previous_transaction: Option<TransactionKind>,
}

impl SchemaBinding<'_> {
    /// The schema this guard bound.
    pub fn schema(&self) -> &TenantSchema {
        &self.schema
    }

    pub(crate) fn mark_transaction(&mut self, kind: TransactionKind) {
        self.context.transaction = Some(kind);
    }
}

impl Deref for SchemaBinding<'_> {
    type Target = ExecutionContext;

    fn deref(&self) -> &ExecutionContext {
        self.context
    }
}

impl DerefMut for SchemaBinding<'_> {
    fn deref_mut(&mut self) -> &mut ExecutionContext {
        self.context
    }
}

impl Drop for SchemaBinding<'_> {
    fn drop(&mut self) {
        self.context.schema = self.previous_schema.take();
        self.context.transaction = self.previous_transaction;
        tracing::debug!(
            schema = %self.schema,
            restored = self.context.schema.as_ref().map(TenantSchema::as_str).unwrap_or("-"),
            "Tenant schema unbound"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{SchemaError, TenantError};

    #[test]
    fn test_bind_and_restore() {
        let binder = SchemaBinder::new();
        let mut ctx = ExecutionContext::with_request_id("req-1");

        {
            let binding = binder.bind(&mut ctx, "t_acme").unwrap();
            assert_eq!(binding.schema().as_str(), "t_acme");
            assert_eq!(binding.current_schema().map(TenantSchema::as_str), Some("t_acme"));
            assert_eq!(binding.request_id(), Some("req-1"));
        }

        assert!(ctx.current_schema().is_none());
        assert_eq!(ctx.request_id(), Some("req-1"));
    }

    #[test]
    fn test_nested_binding_restores_outer() {
        let binder = SchemaBinder::new();
        let mut ctx = ExecutionContext::new();

        let mut outer = binder.bind(&mut ctx, "t_outer").unwrap();
        {
            let inner = binder.bind(&mut outer, "t_inner").unwrap();
            assert_eq!(inner.current_schema().unwrap().as_str(), "t_inner");
        }
        assert_eq!(outer.current_schema().unwrap().as_str(), "t_outer");
        drop(outer);
        assert!(ctx.current_schema().is_none());
    }

    #[test]
    fn test_transaction_marker_restored() {
        let binder = SchemaBinder::new();
        let mut ctx = ExecutionContext::new();
        {
            let mut binding = binder.bind(&mut ctx, "t_acme").unwrap();
            binding.mark_transaction(TransactionKind::ReadOnly);
            assert_eq!(binding.active_transaction(), Some(TransactionKind::ReadOnly));
        }
        assert!(!ctx.in_transaction());
    }

    #[test]
    fn test_control_plane_is_invalid_tenant() {
        let binder = SchemaBinder::new();
        let mut ctx = ExecutionContext::new();
        let err = binder.bind(&mut ctx, "public").unwrap_err();
        assert!(matches!(err, StorageError::Tenant(TenantError::InvalidTenant { .. })));
        assert_eq!(err.status_code(), 404);
    }

    #[test]
    fn test_blank_is_invalid_tenant() {
        for raw in ["", "   "] {
            let err = SchemaBinder::validate(raw).unwrap_err();
            assert!(matches!(err, StorageError::Tenant(TenantError::InvalidTenant { .. })));
        }
    }

    #[test]
    fn test_malformed_is_invalid_schema() {
        let err = SchemaBinder::validate("Bad-Name!").unwrap_err();
        assert!(matches!(err, StorageError::Schema(SchemaError::InvalidSchema { .. })));
    }

    #[test]
    fn test_require_schema() {
        let binder = SchemaBinder::new();
        let mut ctx = ExecutionContext::new();
        assert!(ctx.require_schema().is_err());
        let binding = binder.bind(&mut ctx, "t_acme").unwrap();
        assert_eq!(binding.require_schema().unwrap().as_str(), "t_acme");
    }

    #[tokio::test]
    async fn test_run_in_schema_observes_schema() {
        let binder = SchemaBinder::new();
        let mut ctx = ExecutionContext::new();

        let seen = binder
            .run_in_schema(&mut ctx, "t_acme_ab12cd", |ctx| {
                Box::pin(async move {
                    let schema = ctx.require_schema()?;
                    Ok::<_, StorageError>(schema.to_string())
                })
            })
            .await
            .unwrap();

        assert_eq!(seen, "t_acme_ab12cd");
        assert!(ctx.current_schema().is_none());
    }

    #[tokio::test]
    async fn test_run_in_schema_restores_after_error() {
        let binder = SchemaBinder::new();
        let mut ctx = ExecutionContext::new();

        let result: StorageResult<()> = binder
            .run_in_schema(&mut ctx, "t_acme", |_ctx| {
                Box::pin(async move { Err(StorageError::invalid_tenant("t_acme", "boom")) })
            })
            .await;

        assert!(result.is_err());
        assert!(ctx.current_schema().is_none());
    }
}
