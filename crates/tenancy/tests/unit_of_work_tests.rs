//! Execution context and unit-of-work tests against the memory backend.

#![cfg(feature = "memory")]

mod common;

use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use serde_json::json;

use strata_tenancy::backends::memory::MemoryBackend;
use strata_tenancy::context::{ExecutionContext, SchemaBinder};
use strata_tenancy::core::{SessionProvider, TransactionKind};
use strata_tenancy::error::{SchemaError, StorageError, TenantError, TransactionError};
use strata_tenancy::unit_of_work::UnitOfWorkDispatcher;

use common::{schema, table};

async fn setup() -> (MemoryBackend, UnitOfWorkDispatcher<MemoryBackend>) {
    let backend = MemoryBackend::new();
    let mut session = backend.acquire().await.unwrap();
    session.create_schema(&schema("t_acme")).await.unwrap();
    drop(session);
    backend.create_table(&schema("t_acme"), &table("users")).unwrap();

    let dispatcher = UnitOfWorkDispatcher::new(backend.clone(), SchemaBinder::new());
    (backend, dispatcher)
}

// ============================================================================
// Schema binding
// ============================================================================

#[tokio::test]
async fn test_run_in_schema_binds_and_restores() {
    let binder = SchemaBinder::new();
    let mut ctx = ExecutionContext::with_request_id("req-42");

    let seen = binder
        .run_in_schema(&mut ctx, "t_acme_ab12cd", |ctx| {
            Box::pin(async move {
                let schema = ctx.require_schema()?.to_string();
                Ok::<_, StorageError>((schema, ctx.request_id().map(str::to_string)))
            })
        })
        .await
        .unwrap();

    assert_eq!(seen.0, "t_acme_ab12cd");
    assert_eq!(seen.1.as_deref(), Some("req-42"));
    assert!(ctx.current_schema().is_none());
}

#[tokio::test]
async fn test_run_in_schema_restores_outer_binding() {
    let binder = SchemaBinder::new();
    let mut ctx = ExecutionContext::new();
    let mut outer = binder.bind(&mut ctx, "t_outer").unwrap();

    let inner = binder
        .run_in_schema(&mut outer, "t_inner", |ctx| {
            Box::pin(async move { Ok::<_, StorageError>(ctx.require_schema()?.to_string()) })
        })
        .await
        .unwrap();

    assert_eq!(inner, "t_inner");
    assert_eq!(outer.current_schema().unwrap().as_str(), "t_outer");
    drop(outer);
    assert!(ctx.current_schema().is_none());
}

#[tokio::test]
async fn test_run_in_schema_restores_after_panic() {
    let binder = SchemaBinder::new();
    let mut ctx = ExecutionContext::new();

    let outcome = AssertUnwindSafe(binder.run_in_schema(&mut ctx, "t_acme", |_ctx| {
        Box::pin(async move {
            if true {
                panic!("unit of work blew up");
            }
            Ok::<_, StorageError>(())
        })
    }))
    .catch_unwind()
    .await;

    assert!(outcome.is_err());
    assert!(ctx.current_schema().is_none());
}

#[tokio::test]
async fn test_run_in_schema_rejects_control_plane() {
    let binder = SchemaBinder::new();
    let mut ctx = ExecutionContext::new();

    let err = binder
        .run_in_schema(&mut ctx, "public", |_ctx| {
            Box::pin(async move { Ok::<_, StorageError>(()) })
        })
        .await
        .unwrap_err();

    assert!(matches!(err, StorageError::Tenant(TenantError::InvalidTenant { .. })));
    assert_eq!(err.status_code(), 404);
}

#[tokio::test]
async fn test_run_in_schema_rejects_malformed() {
    let binder = SchemaBinder::new();
    let mut ctx = ExecutionContext::new();

    let err = binder
        .run_in_schema(&mut ctx, "Bad-Name!", |_ctx| {
            Box::pin(async move { Ok::<_, StorageError>(()) })
        })
        .await
        .unwrap_err();

    assert!(matches!(err, StorageError::Schema(SchemaError::InvalidSchema { .. })));
}

// ============================================================================
// Dispatch
// ============================================================================

#[tokio::test]
async fn test_tx_commits_writes() {
    let (backend, dispatcher) = setup().await;
    let mut ctx = ExecutionContext::new();

    dispatcher
        .tx(&mut ctx, "t_acme", |uow| {
            Box::pin(async move {
                uow.transaction_mut()
                    .insert(&table("users"), json!({"id": 1, "name": "ada"}))?;
                Ok::<_, StorageError>(())
            })
        })
        .await
        .unwrap();

    assert_eq!(backend.rows(&schema("t_acme"), &table("users")).len(), 1);
    assert_eq!(backend.stats().commits, 1);
}

#[tokio::test]
async fn test_failed_work_rolls_back() {
    let (backend, dispatcher) = setup().await;
    let mut ctx = ExecutionContext::new();

    let result = dispatcher
        .tx(&mut ctx, "t_acme", |uow| {
            Box::pin(async move {
                uow.transaction_mut().insert(&table("users"), json!({"id": 1}))?;
                Err::<(), _>(StorageError::Tenant(TenantError::TenantTableNotFound {
                    schema: "t_acme".to_string(),
                    table: "orders".to_string(),
                }))
            })
        })
        .await;

    assert!(matches!(
        result,
        Err(StorageError::Tenant(TenantError::TenantTableNotFound { .. }))
    ));
    assert!(backend.rows(&schema("t_acme"), &table("users")).is_empty());
    assert_eq!(backend.stats().rollbacks, 1);
    assert!(ctx.current_schema().is_none());
    assert!(!ctx.in_transaction());
}

#[tokio::test]
async fn test_read_only_rejects_writes() {
    let (backend, dispatcher) = setup().await;
    let mut ctx = ExecutionContext::new();

    for kind in [TransactionKind::ReadOnly, TransactionKind::RequiresNewReadOnly] {
        let err = dispatcher
            .dispatch(&mut ctx, "t_acme", kind, |uow| {
                Box::pin(async move {
                    uow.transaction_mut().insert(&table("users"), json!({"id": 1}))?;
                    Ok::<_, StorageError>(())
                })
            })
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            StorageError::Transaction(TransactionError::ReadOnlyViolation { ref schema })
                if schema == "t_acme"
        ));
        assert_eq!(err.status_code(), 409);
    }

    assert!(backend.rows(&schema("t_acme"), &table("users")).is_empty());
}

#[tokio::test]
async fn test_read_only_sees_committed_rows() {
    let (_, dispatcher) = setup().await;
    let mut ctx = ExecutionContext::new();

    dispatcher
        .tx(&mut ctx, "t_acme", |uow| {
            Box::pin(async move {
                uow.transaction_mut().insert(&table("users"), json!({"id": 7}))?;
                Ok::<_, StorageError>(())
            })
        })
        .await
        .unwrap();

    let rows = dispatcher
        .read_only(&mut ctx, "t_acme", |uow| {
            Box::pin(async move { uow.transaction().rows(&table("users")) })
        })
        .await
        .unwrap();
    assert_eq!(rows, vec![json!({"id": 7})]);
}

#[tokio::test]
async fn test_nested_dispatch_is_independent() {
    let (backend, dispatcher) = setup().await;
    let dispatcher = std::sync::Arc::new(dispatcher);
    let inner_dispatcher = dispatcher.clone();
    let mut ctx = ExecutionContext::new();

    let (outer_schema, inner_kind) = dispatcher
        .tx(&mut ctx, "t_acme", move |uow| {
            Box::pin(async move {
                let inner_kind = inner_dispatcher
                    .requires_new(uow.context_mut(), "t_acme", |inner| {
                        Box::pin(async move {
                            inner
                                .transaction_mut()
                                .insert(&table("users"), json!({"id": 2}))?;
                            Ok::<_, StorageError>(inner.context().active_transaction())
                        })
                    })
                    .await?;

                // The outer binding and transaction marker are back in place.
                let outer_schema = uow.context().require_schema()?.to_string();
                assert_eq!(
                    uow.context().active_transaction(),
                    Some(TransactionKind::Required)
                );
                Ok::<_, StorageError>((outer_schema, inner_kind))
            })
        })
        .await
        .unwrap();

    assert_eq!(outer_schema, "t_acme");
    assert_eq!(inner_kind, Some(TransactionKind::RequiresNew));
    assert_eq!(backend.stats().transactions_begun, 2);
    assert_eq!(backend.stats().commits, 2);
    assert_eq!(backend.rows(&schema("t_acme"), &table("users")).len(), 1);
    assert!(!ctx.in_transaction());
}

#[tokio::test]
async fn test_fire_and_forget_form() {
    let (backend, dispatcher) = setup().await;
    let mut ctx = ExecutionContext::new();

    dispatcher
        .requires_new(&mut ctx, "t_acme", |uow| {
            Box::pin(async move {
                uow.transaction_mut().insert(&table("users"), json!({"id": 3}))?;
                Ok::<(), StorageError>(())
            })
        })
        .await
        .unwrap();

    assert_eq!(backend.rows(&schema("t_acme"), &table("users")).len(), 1);
}

#[tokio::test]
async fn test_malformed_schema_touches_nothing() {
    let (backend, dispatcher) = setup().await;
    let before = backend.stats();
    let mut ctx = ExecutionContext::new();

    let err = dispatcher
        .read_only(&mut ctx, "Bad-Name!", |_uow| {
            Box::pin(async move { Ok::<_, StorageError>(()) })
        })
        .await
        .unwrap_err();

    assert!(matches!(err, StorageError::Schema(SchemaError::InvalidSchema { .. })));
    assert_eq!(backend.stats(), before);
}
