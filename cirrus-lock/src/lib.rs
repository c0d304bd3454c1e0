//! Cirrus Lock
//!
//! Advisory locks keyed on a resource ID. Resource handlers that update one
//! element of a list stored on a shared parent resource take the lock on the
//! parent before reading it and release it after the update has converged.
//!
//! # Example
//!
//! ```ignore
//! use cirrus_lock::{MemoryLockBackend, with_lock};
//!
//! let locks = MemoryLockBackend::new();
//! with_lock(&locks, &pool_id, "attach managed disk", async {
//!     // read the pool, append the disk, submit, poll, converge
//!     Ok::<_, MyError>(())
//! })
//! .await?;
//! ```

pub mod backend;
pub mod backends;
pub mod lock;

// Re-export main types for convenience
pub use backend::{LockBackend, LockConfig, LockError, LockResult, with_lock};
pub use backends::{LocalLockBackend, MemoryLockBackend, create_backend};
pub use lock::LockInfo;
