//! Lock backend trait and error types

use std::future::Future;

use async_trait::async_trait;
use log::warn;
use thiserror::Error;

use crate::lock::LockInfo;

/// Errors that can occur when interacting with a lock backend
#[derive(Debug, Error)]
pub enum LockError {
    /// The key is locked by another holder
    #[error("{key} is locked by {who} (lock ID: {lock_id}, operation: {operation})")]
    Locked {
        key: String,
        lock_id: String,
        who: String,
        operation: String,
    },

    /// The lock was not found (for release/force-unlock operations)
    #[error("Lock not found: {0}")]
    LockNotFound(String),

    /// Lock ID mismatch when trying to release
    #[error("Lock ID mismatch: expected {expected}, got {actual}")]
    LockMismatch { expected: String, actual: String },

    /// The backend type is not supported
    #[error("Unsupported lock backend type: {0}")]
    UnsupportedBackend(String),

    /// Configuration error
    #[error("Lock backend configuration error: {0}")]
    Configuration(String),

    /// Lock file is corrupted or invalid
    #[error("Invalid lock file: {0}")]
    InvalidLock(String),

    /// Network or I/O error
    #[error("I/O error: {0}")]
    Io(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl LockError {
    /// Create a Locked error from a LockInfo
    pub fn locked(lock: &LockInfo) -> Self {
        Self::Locked {
            key: lock.key.clone(),
            lock_id: lock.id.clone(),
            who: lock.who.clone(),
            operation: lock.operation.clone(),
        }
    }

    /// Create an unsupported backend error
    pub fn unsupported_backend(backend_type: impl Into<String>) -> Self {
        Self::UnsupportedBackend(backend_type.into())
    }

    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }
}

/// Result type for lock operations
pub type LockResult<T> = Result<T, LockError>;

/// Advisory locks keyed by name
///
/// Callers take the lock keyed on the primary resource ID before a
/// read-modify-write of one of its list fields, and hold it until the
/// operation (convergence wait included) has finished.
#[async_trait]
pub trait LockBackend: Send + Sync {
    /// Acquire the lock on `key`, waiting while another holder has it
    async fn acquire(&self, key: &str, operation: &str) -> LockResult<LockInfo>;

    /// Acquire the lock on `key`, failing with [`LockError::Locked`] if it is held
    async fn try_acquire(&self, key: &str, operation: &str) -> LockResult<LockInfo>;

    /// Release a previously acquired lock
    ///
    /// This verifies that the lock being released matches the provided lock info
    async fn release(&self, lock: &LockInfo) -> LockResult<()>;

    /// Force release the lock on `key` by its ID
    ///
    /// This is an administrative operation that should be used with caution
    async fn force_unlock(&self, key: &str, lock_id: &str) -> LockResult<()>;
}

/// Run `f` while holding the lock on `key`
///
/// The lock is released whether or not the operation succeeds.
pub async fn with_lock<B, F, T, E>(backend: &B, key: &str, operation: &str, f: F) -> Result<T, E>
where
    B: LockBackend + ?Sized,
    F: Future<Output = Result<T, E>>,
    E: From<LockError>,
{
    let lock = backend.acquire(key, operation).await?;
    let result = f.await;
    let released = backend.release(&lock).await;

    match (result, released) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(e)) => Err(e.into()),
        (Err(e), released) => {
            if let Err(release_error) = released {
                warn!("releasing lock on {} after failure: {}", key, release_error);
            }
            Err(e)
        }
    }
}

/// Configuration for a lock backend
#[derive(Debug, Clone)]
pub struct LockConfig {
    /// Backend type ("memory" or "local")
    pub backend_type: String,
    /// Backend-specific attributes
    pub attributes: std::collections::HashMap<String, cirrus_core::resource::Value>,
}

impl LockConfig {
    /// Get a string attribute value
    pub fn get_string(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).and_then(|v| v.as_str())
    }

    /// Get an integer attribute value
    pub fn get_int(&self, key: &str) -> Option<i64> {
        match self.attributes.get(key) {
            Some(cirrus_core::resource::Value::Int(i)) => Some(*i),
            _ => None,
        }
    }
}
