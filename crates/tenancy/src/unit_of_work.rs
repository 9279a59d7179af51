//! Transaction demarcation around schema-bound work.
//!
//! [`UnitOfWorkDispatcher`] is the surface business services call. Every
//! dispatch binds the target schema on the caller's [`ExecutionContext`],
//! opens a transaction of the requested [`TransactionKind`], runs the
//! callback, commits on `Ok` or rolls back on `Err`, and unbinds the schema.
//! Teardown runs in reverse order of acquisition.
//!
//! Each kind has one method generic over the result type. Work that returns
//! nothing uses `T = ()`.
//!
//! ```
//! use strata_tenancy::backends::memory::MemoryBackend;
//! use strata_tenancy::context::{ExecutionContext, SchemaBinder};
//! use strata_tenancy::core::TenantTransaction;
//! use strata_tenancy::error::StorageError;
//! use strata_tenancy::unit_of_work::UnitOfWorkDispatcher;
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let dispatcher = UnitOfWorkDispatcher::new(MemoryBackend::new(), SchemaBinder::new());
//! let mut ctx = ExecutionContext::new();
//!
//! let schema = dispatcher
//!     .read_only(&mut ctx, "t_acme", |uow| {
//!         Box::pin(async move { Ok::<_, StorageError>(uow.transaction().schema().to_string()) })
//!     })
//!     .await
//!     .unwrap();
//! assert_eq!(schema, "t_acme");
//! # });
//! ```

use futures::future::BoxFuture;

use crate::context::{ExecutionContext, SchemaBinder};
use crate::core::{TenantTransaction, TransactionKind, TransactionProvider};
use crate::error::StorageResult;
use crate::schema::TenantSchema;

/// Schema-bound context and open transaction handed to a unit of work.
#[derive(Debug)]
pub struct UnitOfWork<'a, Tx> {
    context: &'a mut ExecutionContext,
    transaction: Tx,
}

impl<Tx: TenantTransaction> UnitOfWork<'_, Tx> {
    /// The bound schema.
    pub fn schema(&self) -> &TenantSchema {
        self.transaction.schema()
    }

    /// The kind of the open transaction.
    pub fn kind(&self) -> TransactionKind {
        self.transaction.kind()
    }

    /// The execution context, with the schema bound.
    pub fn context(&self) -> &ExecutionContext {
        self.context
    }

    /// Mutable access to the execution context, for nested dispatches.
    pub fn context_mut(&mut self) -> &mut ExecutionContext {
        self.context
    }

    /// The open transaction.
    pub fn transaction(&self) -> &Tx {
        &self.transaction
    }

    /// Mutable access to the open transaction.
    pub fn transaction_mut(&mut self) -> &mut Tx {
        &mut self.transaction
    }
}

/// Runs units of work inside a schema binding and a transaction.
#[derive(Debug, Clone)]
pub struct UnitOfWorkDispatcher<P> {
    provider: P,
    binder: SchemaBinder,
}

impl<P: TransactionProvider> UnitOfWorkDispatcher<P> {
    /// Creates a dispatcher over a transaction provider.
    pub fn new(provider: P, binder: SchemaBinder) -> Self {
        Self { provider, binder }
    }

    /// The transaction provider.
    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Runs `f` in a read-write transaction.
    pub async fn tx<T, F>(&self, ctx: &mut ExecutionContext, schema: &str, f: F) -> StorageResult<T>
    where
        F: for<'c> FnOnce(&'c mut UnitOfWork<'_, P::Transaction>) -> BoxFuture<'c, StorageResult<T>>
            + Send,
    {
        self.dispatch(ctx, schema, TransactionKind::Required, f).await
    }

    /// Runs `f` in a read-only transaction.
    pub async fn read_only<T, F>(
        &self,
        ctx: &mut ExecutionContext,
        schema: &str,
        f: F,
    ) -> StorageResult<T>
    where
        F: for<'c> FnOnce(&'c mut UnitOfWork<'_, P::Transaction>) -> BoxFuture<'c, StorageResult<T>>
            + Send,
    {
        self.dispatch(ctx, schema, TransactionKind::ReadOnly, f).await
    }

    /// Runs `f` in a new read-write transaction.
    pub async fn requires_new<T, F>(
        &self,
        ctx: &mut ExecutionContext,
        schema: &str,
        f: F,
    ) -> StorageResult<T>
    where
        F: for<'c> FnOnce(&'c mut UnitOfWork<'_, P::Transaction>) -> BoxFuture<'c, StorageResult<T>>
            + Send,
    {
        self.dispatch(ctx, schema, TransactionKind::RequiresNew, f).await
    }

    /// Runs `f` in a new read-only transaction.
    pub async fn requires_new_read_only<T, F>(
        &self,
        ctx: &mut ExecutionContext,
        schema: &str,
        f: F,
    ) -> StorageResult<T>
    where
        F: for<'c> FnOnce(&'c mut UnitOfWork<'_, P::Transaction>) -> BoxFuture<'c, StorageResult<T>>
            + Send,
    {
        self.dispatch(ctx, schema, TransactionKind::RequiresNewReadOnly, f)
            .await
    }

    /// Runs `f` in a transaction of `kind`.
    ///
    /// Every kind opens its own physical transaction, because the context is
    /// passed explicitly and there is no ambient transaction to join. A
    /// transaction already recorded on `ctx` is logged as unintended nesting.
    pub async fn dispatch<T, F>(
        &self,
        ctx: &mut ExecutionContext,
        schema: &str,
        kind: TransactionKind,
        f: F,
    ) -> StorageResult<T>
    where
        F: for<'c> FnOnce(&'c mut UnitOfWork<'_, P::Transaction>) -> BoxFuture<'c, StorageResult<T>>
            + Send,
    {
        if let Some(active) = ctx.active_transaction() {
            tracing::warn!(
                active = %active,
                requested = %kind,
                schema = schema,
                request_id = ctx.request_id().unwrap_or("-"),
                "Transaction already active on this execution context"
            );
        }

        let mut binding = self.binder.bind(ctx, schema)?;
        let transaction = self.provider.begin(binding.schema(), kind).await?;
        binding.mark_transaction(kind);
        tracing::debug!(schema = %binding.schema(), kind = %kind, "Unit of work started");

        let mut work = UnitOfWork {
            context: &mut *binding,
            transaction,
        };
        let result = f(&mut work).await;
        let UnitOfWork { transaction, .. } = work;

        let outcome = match result {
            Ok(value) => transaction.commit().await.map(|()| value),
            Err(e) => {
                if let Err(rollback_error) = transaction.rollback().await {
                    tracing::warn!(
                        schema = %binding.schema(),
                        kind = %kind,
                        error = %rollback_error,
                        "Rollback after failed unit of work also failed"
                    );
                }
                Err(e)
            }
        };

        drop(binding);
        outcome
    }
}
