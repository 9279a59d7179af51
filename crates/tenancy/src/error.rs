//! Error types for the tenancy subsystem.
//!
//! Errors are grouped by the component that raises them: identifier
//! validation, tenant readiness, schema provisioning, transactions and the
//! storage backend. Every error maps to an HTTP-like status through
//! [`StorageError::status_code`] so the surrounding API layer can translate it
//! without inspecting variants.

// Error enum variant fields are self-documenting via their #[error(...)] messages
#![allow(missing_docs)]

use thiserror::Error;

use crate::core::TransactionKind;

/// The primary error type for all tenancy operations.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Malformed schema or table identifiers.
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// Tenant targeting and readiness errors.
    #[error(transparent)]
    Tenant(#[from] TenantError),

    /// Schema creation, migration and removal errors.
    #[error(transparent)]
    Provisioning(#[from] ProvisioningError),

    /// Transaction demarcation errors.
    #[error(transparent)]
    Transaction(#[from] TransactionError),

    /// Backend-specific errors.
    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Errors raised while validating identifiers.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    /// The schema identifier is missing or malformed.
    #[error("invalid schema '{value}': {reason}")]
    InvalidSchema { value: String, reason: String },

    /// A table name was required but none (or a blank one) was given.
    #[error("table name is required")]
    TableRequired,

    /// The table name is malformed.
    #[error("invalid table '{value}': {reason}")]
    TableInvalid { value: String, reason: String },
}

/// Errors related to tenant targeting and readiness.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TenantError {
    /// Tenant-scoped work was aimed at the control-plane schema or at nothing.
    #[error("invalid tenant '{value}': {reason}")]
    InvalidTenant { value: String, reason: String },

    /// The tenant schema does not exist.
    #[error("tenant schema not found: {schema}")]
    TenantSchemaNotFound { schema: String },

    /// The tenant schema exists but the required table does not.
    #[error("tenant table not found: {schema}.{table}")]
    TenantTableNotFound { schema: String, table: String },
}

/// Errors raised while provisioning or removing tenant schemas.
#[derive(Error, Debug)]
pub enum ProvisioningError {
    /// Another session holds the provisioning lock for this schema.
    #[error("schema lock for '{schema}' not acquired within {timeout_ms}ms")]
    SchemaLockTimeout { schema: String, timeout_ms: u64 },

    /// Creating or migrating the schema failed.
    #[error("provisioning of schema '{schema}' failed: {message}")]
    SchemaProvisioningFailed {
        schema: String,
        message: String,
        #[source]
        source: Option<Box<StorageError>>,
    },

    /// Dropping the schema failed.
    #[error("dropping schema '{schema}' failed: {message}")]
    SchemaDropFailed {
        schema: String,
        message: String,
        #[source]
        source: Option<Box<StorageError>>,
    },
}

/// Errors related to transactions.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransactionError {
    /// The transaction could not be started.
    #[error("failed to begin {kind} transaction: {message}")]
    BeginFailed {
        kind: TransactionKind,
        message: String,
    },

    /// The transaction could not be committed.
    #[error("commit failed: {message}")]
    CommitFailed { message: String },

    /// Transaction was rolled back.
    #[error("transaction rolled back: {reason}")]
    RolledBack { reason: String },

    /// A write was attempted inside a read-only transaction.
    #[error("write rejected: transaction on schema '{schema}' is read-only")]
    ReadOnlyViolation { schema: String },

    /// Transaction is no longer valid (already committed or rolled back).
    #[error("transaction no longer valid")]
    InvalidTransaction,
}

/// Errors originating from the database backend.
#[derive(Error, Debug)]
pub enum BackendError {
    /// Connection to the backend failed.
    #[error("connection failed to {backend_name}: {message}")]
    ConnectionFailed {
        backend_name: String,
        message: String,
    },

    /// Connection pool exhausted.
    #[error("connection pool exhausted for {backend_name}")]
    PoolExhausted { backend_name: String },

    /// Query execution error.
    #[error("query execution failed: {message}")]
    QueryError { message: String },

    /// Internal backend error.
    #[error("internal error in {backend_name}: {message}")]
    Internal {
        backend_name: String,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

/// Result type alias for tenancy operations.
pub type StorageResult<T> = Result<T, StorageError>;

impl StorageError {
    /// Returns the HTTP-like status the API layer should answer with.
    pub fn status_code(&self) -> u16 {
        match self {
            StorageError::Schema(_) => 400,
            StorageError::Tenant(_) => 404,
            StorageError::Provisioning(ProvisioningError::SchemaLockTimeout { .. }) => 409,
            StorageError::Provisioning(_) => 500,
            StorageError::Transaction(TransactionError::ReadOnlyViolation { .. }) => 409,
            StorageError::Transaction(_) => 500,
            StorageError::Backend(
                BackendError::ConnectionFailed { .. } | BackendError::PoolExhausted { .. },
            ) => 503,
            StorageError::Backend(_) => 500,
        }
    }

    /// Returns `true` if the caller may retry the same call with backoff.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            StorageError::Provisioning(ProvisioningError::SchemaLockTimeout { .. })
        )
    }

    pub(crate) fn invalid_schema(value: impl Into<String>, reason: impl Into<String>) -> Self {
        StorageError::Schema(SchemaError::InvalidSchema {
            value: value.into(),
            reason: reason.into(),
        })
    }

    pub(crate) fn invalid_table(value: impl Into<String>, reason: impl Into<String>) -> Self {
        StorageError::Schema(SchemaError::TableInvalid {
            value: value.into(),
            reason: reason.into(),
        })
    }

    pub(crate) fn invalid_tenant(value: impl Into<String>, reason: impl Into<String>) -> Self {
        StorageError::Tenant(TenantError::InvalidTenant {
            value: value.into(),
            reason: reason.into(),
        })
    }
}

#[cfg(feature = "postgres")]
impl From<tokio_postgres::Error> for StorageError {
    fn from(err: tokio_postgres::Error) -> Self {
        StorageError::Backend(BackendError::Internal {
            backend_name: "postgres".to_string(),
            message: err.to_string(),
            source: Some(Box::new(err)),
        })
    }
}

#[cfg(feature = "postgres")]
impl From<deadpool_postgres::PoolError> for StorageError {
    fn from(err: deadpool_postgres::PoolError) -> Self {
        match err {
            deadpool_postgres::PoolError::Timeout(_) => {
                StorageError::Backend(BackendError::PoolExhausted {
                    backend_name: "postgres".to_string(),
                })
            }
            other => StorageError::Backend(BackendError::ConnectionFailed {
                backend_name: "postgres".to_string(),
                message: other.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_error_display() {
        let err = StorageError::invalid_schema("Bad-Name!", "must match ^[a-z][a-z0-9_]*$");
        assert_eq!(
            err.to_string(),
            "invalid schema 'Bad-Name!': must match ^[a-z][a-z0-9_]*$"
        );
    }

    #[test]
    fn test_tenant_table_not_found_display() {
        let err = TenantError::TenantTableNotFound {
            schema: "t_acme".to_string(),
            table: "users".to_string(),
        };
        assert_eq!(err.to_string(), "tenant table not found: t_acme.users");
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(StorageError::invalid_schema("x", "y").status_code(), 400);
        assert_eq!(StorageError::Schema(SchemaError::TableRequired).status_code(), 400);
        assert_eq!(StorageError::invalid_tenant("public", "reserved").status_code(), 404);
        assert_eq!(
            StorageError::Tenant(TenantError::TenantSchemaNotFound {
                schema: "t_a".to_string()
            })
            .status_code(),
            404
        );

        let lock = StorageError::Provisioning(ProvisioningError::SchemaLockTimeout {
            schema: "t_a".to_string(),
            timeout_ms: 5000,
        });
        assert_eq!(lock.status_code(), 409);

        let failed = StorageError::Provisioning(ProvisioningError::SchemaProvisioningFailed {
            schema: "t_a".to_string(),
            message: "boom".to_string(),
            source: None,
        });
        assert_eq!(failed.status_code(), 500);

        let pool = StorageError::Backend(BackendError::PoolExhausted {
            backend_name: "postgres".to_string(),
        });
        assert_eq!(pool.status_code(), 503);
    }

    #[test]
    fn test_only_lock_timeout_is_retryable() {
        let lock = StorageError::Provisioning(ProvisioningError::SchemaLockTimeout {
            schema: "t_a".to_string(),
            timeout_ms: 10,
        });
        assert!(lock.is_retryable());

        let drop_failed = StorageError::Provisioning(ProvisioningError::SchemaDropFailed {
            schema: "t_a".to_string(),
            message: "boom".to_string(),
            source: None,
        });
        assert!(!drop_failed.is_retryable());
        assert!(!StorageError::invalid_schema("x", "y").is_retryable());
    }

    #[test]
    fn test_provisioning_failure_keeps_source() {
        use std::error::Error as _;

        let cause = StorageError::Backend(BackendError::QueryError {
            message: "relation already exists".to_string(),
        });
        let err = ProvisioningError::SchemaProvisioningFailed {
            schema: "t_a".to_string(),
            message: cause.to_string(),
            source: Some(Box::new(cause)),
        };
        assert!(err.to_string().contains("relation already exists"));
        assert!(err.source().is_some());
    }
}
