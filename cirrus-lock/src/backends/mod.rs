//! Lock backend implementations

mod local;
mod memory;

pub use local::LocalLockBackend;
pub use memory::MemoryLockBackend;

use crate::backend::{LockBackend, LockConfig, LockError, LockResult};

/// Create a lock backend from configuration
///
/// This function dispatches to the appropriate backend implementation
/// based on the backend_type in the configuration.
pub fn create_backend(config: &LockConfig) -> LockResult<Box<dyn LockBackend>> {
    match config.backend_type.as_str() {
        "memory" => Ok(Box::new(MemoryLockBackend::new())),
        "local" => Ok(Box::new(LocalLockBackend::from_config(config)?)),
        other => Err(LockError::unsupported_backend(other)),
    }
}
