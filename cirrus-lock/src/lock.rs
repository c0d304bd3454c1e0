//! Lock information for advisory locks

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Default lock lifetime in seconds (2 hours)
///
/// A lock older than this is considered abandoned and may be taken over.
pub const DEFAULT_LOCK_TIMEOUT_SECS: i64 = 7200;

/// Information about a held lock
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockInfo {
    /// Unique identifier for this lock
    pub id: String,
    /// Key the lock serializes on (usually the primary resource ID)
    pub key: String,
    /// The operation holding the lock (e.g., "attach managed disk")
    pub operation: String,
    /// Who acquired the lock (username@hostname)
    pub who: String,
    /// When the lock was created
    pub created: DateTime<Utc>,
    /// When the lock expires
    pub expires: DateTime<Utc>,
}

impl LockInfo {
    /// Create a new lock on `key`
    pub fn new(key: impl Into<String>, operation: impl Into<String>) -> Self {
        Self::with_timeout(key, operation, DEFAULT_LOCK_TIMEOUT_SECS)
    }

    /// Create a new lock with a custom timeout
    pub fn with_timeout(
        key: impl Into<String>,
        operation: impl Into<String>,
        timeout_secs: i64,
    ) -> Self {
        let now = Utc::now();

        Self {
            id: uuid::Uuid::new_v4().to_string(),
            key: key.into(),
            operation: operation.into(),
            who: get_lock_owner(),
            created: now,
            expires: now + Duration::seconds(timeout_secs),
        }
    }

    /// Check if the lock has expired
    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires
    }

    /// Get the remaining time until expiration
    pub fn time_remaining(&self) -> Duration {
        self.expires - Utc::now()
    }
}

/// Get the lock owner string (username@hostname)
fn get_lock_owner() -> String {
    let username = std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "unknown".to_string());

    let hostname = hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown".to_string());

    format!("{}@{}", username, hostname)
}

#[cfg(test)]
mod tests {
    use super::*;

    const POOL: &str = "/subscriptions/s/resourceGroups/rg/providers/Microsoft.StoragePool/diskPools/p1";

    #[test]
    fn test_lock_info_new() {
        let lock = LockInfo::new(POOL, "attach managed disk");
        assert_eq!(lock.key, POOL);
        assert_eq!(lock.operation, "attach managed disk");
        assert!(!lock.id.is_empty());
        assert!(lock.who.contains('@'));
        assert!(!lock.is_expired());
    }

    #[test]
    fn test_lock_info_with_timeout() {
        let lock = LockInfo::with_timeout(POOL, "detach managed disk", 60);
        let remaining = lock.time_remaining();
        assert!(remaining.num_seconds() > 55);
        assert!(remaining.num_seconds() <= 60);

        let expired = LockInfo::with_timeout(POOL, "detach managed disk", -1);
        assert!(expired.is_expired());
    }

    #[test]
    fn test_lock_ids_are_unique() {
        assert_ne!(LockInfo::new(POOL, "a").id, LockInfo::new(POOL, "a").id);
    }

    #[test]
    fn test_lock_info_serialization() {
        let lock = LockInfo::new(POOL, "attach managed disk");
        let json = serde_json::to_string_pretty(&lock).unwrap();
        let deserialized: LockInfo = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized, lock);
    }
}
