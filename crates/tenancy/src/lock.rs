//! Advisory locks serializing schema provisioning.
//!
//! A provisioning lock is a server-side advisory lock owned by one session.
//! [`SchemaLock`] models it as an owned guard: acquiring the lock moves the
//! session into the guard, all DDL and the migration run borrow the session
//! from the guard, and [`SchemaLock::release`] unlocks and hands the
//! connection back. A guard dropped without `release` terminates its session,
//! which makes the server drop the lock.

use std::fmt;
use std::time::Duration;

use sha2::{Digest, Sha256};

use crate::core::Session;
use crate::error::{BackendError, ProvisioningError, StorageError, StorageResult};
use crate::schema::TenantSchema;

/// Namespace mixed into every key so tenant locks do not share a key space
/// with other advisory locks taken by the application.
const KEY_NAMESPACE: &[u8] = b"strata.tenant-schema:";

/// 64-bit advisory lock key derived from a schema identifier.
///
/// The key is the first eight bytes of SHA-256 over the namespaced identifier,
/// read big-endian. It is stable across processes and builds, so every
/// instance sharing a database converges on the same key for the same schema.
/// Two different schemas may still collide; they then serialize against each
/// other, which costs throughput but never correctness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AdvisoryLockKey(i64);

impl AdvisoryLockKey {
    /// Derives the key for a schema.
    pub fn for_schema(schema: &TenantSchema) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(KEY_NAMESPACE);
        hasher.update(schema.as_str().as_bytes());
        let digest = hasher.finalize();

        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&digest[..8]);
        Self(i64::from_be_bytes(bytes))
    }

    /// Returns the raw key as passed to the store.
    pub fn value(self) -> i64 {
        self.0
    }
}

impl fmt::Display for AdvisoryLockKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Outcome of a single lock attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Attempt {
    Granted,
    Refused,
    /// The round-trip did not finish in time; the server may still grant it.
    Elapsed,
}

async fn attempt(
    session: &mut dyn Session,
    key: AdvisoryLockKey,
    timeout: Duration,
) -> StorageResult<Attempt> {
    match tokio::time::timeout(timeout, session.try_advisory_lock(key)).await {
        Ok(Ok(true)) => Ok(Attempt::Granted),
        Ok(Ok(false)) => Ok(Attempt::Refused),
        Ok(Err(e)) => Err(e),
        Err(_) => Ok(Attempt::Elapsed),
    }
}

/// Single-attempt acquisition and best-effort release of advisory locks.
#[derive(Debug, Clone, Copy, Default)]
pub struct LockCoordinator;

impl LockCoordinator {
    /// Makes one non-blocking attempt to take `key` on `session`.
    ///
    /// `timeout` bounds the round-trip, not a wait for the holder: a lock held
    /// elsewhere is refused immediately. A `false` caused by the timeout leaves
    /// the attempt's outcome unknown, so the session must then be terminated
    /// rather than reused. [`SchemaLock::acquire`] does that.
    pub async fn try_acquire(
        session: &mut dyn Session,
        key: AdvisoryLockKey,
        timeout: Duration,
    ) -> StorageResult<bool> {
        Ok(attempt(session, key, timeout).await? == Attempt::Granted)
    }

    /// Releases `key` on `session`.
    ///
    /// Failures are logged and swallowed. Returns `true` if the store confirmed
    /// the release; on `false` the caller should terminate the session so the
    /// lock dies with it.
    pub async fn release(session: &mut dyn Session, key: AdvisoryLockKey) -> bool {
        match session.advisory_unlock(key).await {
            Ok(true) => {
                tracing::debug!(key = %key, "Advisory lock released");
                true
            }
            Ok(false) => {
                tracing::warn!(key = %key, "Advisory lock was not held at release time");
                false
            }
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Failed to release advisory lock");
                false
            }
        }
    }
}

/// An advisory lock on one tenant schema, owning the session that holds it.
pub struct SchemaLock {
    schema: TenantSchema,
    key: AdvisoryLockKey,
    session: Option<Box<dyn Session>>,
}

impl fmt::Debug for SchemaLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaLock")
            .field("schema", &self.schema)
            .field("key", &self.key)
            .field("held", &self.session.is_some())
            .finish()
    }
}

impl SchemaLock {
    /// Takes the provisioning lock for `schema` on `session`.
    ///
    /// Fails with [`ProvisioningError::SchemaLockTimeout`] if the lock is held
    /// elsewhere or the attempt did not complete within `timeout`. The session
    /// is consumed either way.
    pub async fn acquire(
        mut session: Box<dyn Session>,
        schema: &TenantSchema,
        timeout: Duration,
    ) -> StorageResult<Self> {
        let key = AdvisoryLockKey::for_schema(schema);

        let outcome = match attempt(session.as_mut(), key, timeout).await {
            Ok(outcome) => outcome,
            Err(e) => {
                session.terminate();
                return Err(e);
            }
        };

        match outcome {
            Attempt::Granted => {
                tracing::debug!(schema = %schema, key = %key, "Schema lock acquired");
                Ok(Self {
                    schema: schema.clone(),
                    key,
                    session: Some(session),
                })
            }
            Attempt::Refused | Attempt::Elapsed => {
                if outcome == Attempt::Elapsed {
                    session.terminate();
                }
                tracing::warn!(
                    schema = %schema,
                    key = %key,
                    timeout_ms = timeout.as_millis() as u64,
                    "Schema lock held by another session"
                );
                Err(StorageError::Provisioning(
                    ProvisioningError::SchemaLockTimeout {
                        schema: schema.to_string(),
                        timeout_ms: timeout.as_millis() as u64,
                    },
                ))
            }
        }
    }

    /// The locked schema.
    pub fn schema(&self) -> &TenantSchema {
        &self.schema
    }

    /// The lock key.
    pub fn key(&self) -> AdvisoryLockKey {
        self.key
    }

    /// The session holding the lock.
    pub fn session(&mut self) -> StorageResult<&mut dyn Session> {
        match self.session.as_deref_mut() {
            Some(session) => Ok(session),
            None => Err(StorageError::Backend(BackendError::Internal {
                backend_name: "lock".to_string(),
                message: format!("lock session for '{}' already released", self.schema),
                source: None,
            })),
        }
    }

    /// Releases the lock and returns the session to its provider.
    ///
    /// Release is best-effort: if the store does not confirm it, the session
    /// is terminated instead so the lock cannot outlive this call.
    pub async fn release(mut self) {
        if let Some(mut session) = self.session.take() {
            if LockCoordinator::release(session.as_mut(), self.key).await {
                drop(session);
            } else {
                session.terminate();
            }
        }
    }
}

impl Drop for SchemaLock {
    fn drop(&mut self) {
        if let Some(session) = self.session.take() {
            tracing::warn!(
                schema = %self.schema,
                key = %self.key,
                "Schema lock dropped without release, terminating its session"
            );
            session.terminate();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_is_deterministic() {
        let schema = TenantSchema::parse("t_acme_ab12cd").unwrap();
        assert_eq!(
            AdvisoryLockKey::for_schema(&schema),
            AdvisoryLockKey::for_schema(&schema.clone())
        );
    }

    #[test]
    fn test_keys_differ_between_schemas() {
        let a = TenantSchema::parse("t_acme").unwrap();
        let b = TenantSchema::parse("t_globex").unwrap();
        assert_ne!(AdvisoryLockKey::for_schema(&a), AdvisoryLockKey::for_schema(&b));
    }

    #[test]
    fn test_key_matches_digest_prefix() {
        let schema = TenantSchema::parse("t_acme").unwrap();
        let digest = Sha256::digest(b"strata.tenant-schema:t_acme");
        let expected = i64::from_be_bytes([
            digest[0], digest[1], digest[2], digest[3], digest[4], digest[5], digest[6], digest[7],
        ]);
        assert_eq!(AdvisoryLockKey::for_schema(&schema).value(), expected);
    }
}
