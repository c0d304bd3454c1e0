//! In-process lock backend
//!
//! Each key maps to a tokio mutex. `acquire` queues behind the current
//! holder; `try_acquire` reports the holder instead of waiting.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use log::debug;
use tokio::sync::OwnedMutexGuard;

use crate::backend::{LockBackend, LockError, LockResult};
use crate::lock::LockInfo;

struct Held {
    info: LockInfo,
    _guard: OwnedMutexGuard<()>,
}

#[derive(Default)]
struct Table {
    keys: HashMap<String, Arc<tokio::sync::Mutex<()>>>,
    held: HashMap<String, Held>,
}

impl Table {
    /// Drop the holder of `key`, and the key's mutex once nobody waits on it
    fn unlock(&mut self, key: &str) {
        self.held.remove(key);
        if self
            .keys
            .get(key)
            .is_some_and(|mutex| Arc::strong_count(mutex) == 1)
        {
            self.keys.remove(key);
        }
    }
}

/// Lock backend shared by tasks of a single process
#[derive(Default)]
pub struct MemoryLockBackend {
    table: Mutex<Table>,
}

impl MemoryLockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current holder of the lock on `key`, if any
    pub fn holder(&self, key: &str) -> Option<LockInfo> {
        self.table().held.get(key).map(|held| held.info.clone())
    }

    fn table(&self) -> std::sync::MutexGuard<'_, Table> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn mutex_for(&self, key: &str) -> Arc<tokio::sync::Mutex<()>> {
        self.table()
            .keys
            .entry(key.to_string())
            .or_default()
            .clone()
    }

    fn record(&self, guard: OwnedMutexGuard<()>, key: &str, operation: &str) -> LockInfo {
        let info = LockInfo::new(key, operation);
        debug!("lock {} on {} taken for {}", info.id, key, operation);
        self.table().held.insert(
            key.to_string(),
            Held {
                info: info.clone(),
                _guard: guard,
            },
        );
        info
    }
}

#[async_trait]
impl LockBackend for MemoryLockBackend {
    async fn acquire(&self, key: &str, operation: &str) -> LockResult<LockInfo> {
        let guard = self.mutex_for(key).lock_owned().await;
        Ok(self.record(guard, key, operation))
    }

    async fn try_acquire(&self, key: &str, operation: &str) -> LockResult<LockInfo> {
        match self.mutex_for(key).try_lock_owned() {
            Ok(guard) => Ok(self.record(guard, key, operation)),
            Err(_) => Err(match self.holder(key) {
                Some(info) => LockError::locked(&info),
                // The holder has the mutex but has not recorded itself yet
                None => LockError::Locked {
                    key: key.to_string(),
                    lock_id: "unknown".to_string(),
                    who: "unknown".to_string(),
                    operation: "unknown".to_string(),
                },
            }),
        }
    }

    async fn release(&self, lock: &LockInfo) -> LockResult<()> {
        let mut table = self.table();
        let current = table
            .held
            .get(&lock.key)
            .ok_or_else(|| LockError::LockNotFound(lock.id.clone()))?;
        if current.info.id != lock.id {
            return Err(LockError::LockMismatch {
                expected: lock.id.clone(),
                actual: current.info.id.clone(),
            });
        }
        table.unlock(&lock.key);
        debug!("lock {} on {} released", lock.id, lock.key);
        Ok(())
    }

    async fn force_unlock(&self, key: &str, lock_id: &str) -> LockResult<()> {
        let mut table = self.table();
        let current = table
            .held
            .get(key)
            .ok_or_else(|| LockError::LockNotFound(lock_id.to_string()))?;
        if current.info.id != lock_id {
            return Err(LockError::LockMismatch {
                expected: lock_id.to_string(),
                actual: current.info.id.clone(),
            });
        }
        table.unlock(key);
        Ok(())
    }
}
