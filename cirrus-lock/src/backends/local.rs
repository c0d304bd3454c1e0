//! Local file backend for advisory locks
//!
//! Every key gets its own JSON lock file inside a directory (default:
//! `.cirrus-locks`). A lock is written to a staging file and hard-linked into
//! place, which fails if the lock file exists, so separate processes sharing
//! the directory exclude each other and never see a half-written lock.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use log::{debug, warn};
use uuid::Uuid;

use crate::backend::{LockBackend, LockConfig, LockError, LockResult};
use crate::lock::{DEFAULT_LOCK_TIMEOUT_SECS, LockInfo};

/// File-based lock backend for development and single-host use
pub struct LocalLockBackend {
    /// Directory holding the lock files
    dir: PathBuf,
    /// Lifetime of newly created locks
    timeout_secs: i64,
}

impl LocalLockBackend {
    /// Default lock directory name
    pub const DEFAULT_LOCK_DIR: &'static str = ".cirrus-locks";

    /// Create a new LocalLockBackend in the default directory
    pub fn new() -> Self {
        Self::with_dir(PathBuf::from(Self::DEFAULT_LOCK_DIR))
    }

    /// Create a new LocalLockBackend with a specific lock directory
    pub fn with_dir(dir: PathBuf) -> Self {
        Self {
            dir,
            timeout_secs: DEFAULT_LOCK_TIMEOUT_SECS,
        }
    }

    /// Set the lifetime of newly created locks
    pub fn with_timeout_secs(mut self, timeout_secs: i64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// Create a LocalLockBackend from configuration
    ///
    /// Recognized attributes: `path` (lock directory) and `timeout_secs`.
    pub fn from_config(config: &LockConfig) -> LockResult<Self> {
        let dir = config
            .get_string("path")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(Self::DEFAULT_LOCK_DIR));

        let mut backend = Self::with_dir(dir);
        if let Some(timeout) = config.get_int("timeout_secs") {
            if timeout <= 0 {
                return Err(LockError::configuration(format!(
                    "timeout_secs must be positive, got {}",
                    timeout
                )));
            }
            backend = backend.with_timeout_secs(timeout);
        }
        Ok(backend)
    }

    /// Get the lock directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the lock file for `key`
    pub fn lock_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.lock", encode_key(key)))
    }

    fn read_lock(&self, path: &Path) -> LockResult<Option<LockInfo>> {
        match read_raw(path)? {
            Some(content) => serde_json::from_str(&content)
                .map(Some)
                .map_err(|e| LockError::InvalidLock(format!("Failed to parse lock file: {}", e))),
            None => Ok(None),
        }
    }

    /// Publish `lock` at `path` unless a lock file is already there
    ///
    /// The content is written to a staging file first and hard-linked into
    /// place, so readers never observe a partially written lock.
    fn write_new_lock(&self, path: &Path, lock: &LockInfo) -> LockResult<bool> {
        let content = serde_json::to_string_pretty(lock)
            .map_err(|e| LockError::Serialization(format!("Failed to serialize lock: {}", e)))?;

        let staging = sibling(path, &format!("{}.tmp", Uuid::new_v4()));
        std::fs::write(&staging, content)
            .map_err(|e| LockError::Io(format!("Failed to write lock file: {}", e)))?;

        let published = std::fs::hard_link(&staging, path);
        if let Err(e) = std::fs::remove_file(&staging) {
            warn!("leaving staging file {}: {}", staging.display(), e);
        }

        match published {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(false),
            Err(e) => Err(LockError::Io(format!("Failed to create lock file: {}", e))),
        }
    }

    fn publish(&self, path: &Path, lock: LockInfo) -> LockResult<LockInfo> {
        if self.write_new_lock(path, &lock)? {
            debug!("lock {} on {} written to {}", lock.id, lock.key, path.display());
            Ok(lock)
        } else {
            Err(self.holder_error(path))
        }
    }

    fn holder_error(&self, path: &Path) -> LockError {
        match self.read_lock(path) {
            Ok(Some(existing)) => LockError::locked(&existing),
            Ok(None) => LockError::Io(format!(
                "Lock file {} changed hands while acquiring",
                path.display()
            )),
            Err(e) => e,
        }
    }

    /// Replace the lock file whose content was `observed` with `lock`
    ///
    /// Contenders serialize on a takeover marker. The winner moves the old file
    /// aside and only discards it if it still holds `observed`.
    fn take_over(&self, path: &Path, observed: &str, lock: LockInfo) -> LockResult<LockInfo> {
        let marker = sibling(path, "takeover");
        match std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&marker)
        {
            Ok(_) => {}
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                if modified_age(&marker) >= STALE_GRACE {
                    warn!("removing abandoned takeover marker {}", marker.display());
                    let _ = std::fs::remove_file(&marker);
                }
                return Err(match serde_json::from_str::<LockInfo>(observed) {
                    Ok(existing) => LockError::locked(&existing),
                    Err(_) => LockError::InvalidLock(format!(
                        "{} is being replaced by another process",
                        path.display()
                    )),
                });
            }
            Err(e) => {
                return Err(LockError::Io(format!(
                    "Failed to create takeover marker: {}",
                    e
                )));
            }
        }

        let result = self.replace(path, observed, lock);
        if let Err(e) = std::fs::remove_file(&marker) {
            warn!("leaving takeover marker {}: {}", marker.display(), e);
        }
        result
    }

    fn replace(&self, path: &Path, observed: &str, lock: LockInfo) -> LockResult<LockInfo> {
        match read_raw(path)? {
            Some(current) if current == observed => {}
            Some(_) => return Err(self.holder_error(path)),
            None => return self.publish(path, lock),
        }

        let Some(aside) = set_aside(path)? else {
            return self.publish(path, lock);
        };
        if read_raw(&aside).ok().flatten().as_deref() != Some(observed) {
            restore(&aside, path);
            return Err(self.holder_error(path));
        }
        if let Err(e) = std::fs::remove_file(&aside) {
            warn!("leaving replaced lock file {}: {}", aside.display(), e);
        }
        self.publish(path, lock)
    }

    /// Remove the lock file at `path` if it still carries `lock_id`
    ///
    /// With `unreadable_ok`, a lock file that does not parse is removed too.
    fn remove_matching(&self, path: &Path, lock_id: &str, unreadable_ok: bool) -> LockResult<()> {
        let aside = set_aside(path)?.ok_or_else(|| LockError::LockNotFound(lock_id.to_string()))?;

        let verdict = match self.read_lock(&aside) {
            Ok(Some(existing)) if existing.id == lock_id => Ok(()),
            Ok(Some(existing)) => Err(LockError::LockMismatch {
                expected: lock_id.to_string(),
                actual: existing.id,
            }),
            Ok(None) => Err(LockError::LockNotFound(lock_id.to_string())),
            Err(LockError::InvalidLock(_)) if unreadable_ok => Ok(()),
            Err(e) => Err(e),
        };

        match verdict {
            Ok(()) => std::fs::remove_file(&aside)
                .map_err(|e| LockError::Io(format!("Failed to remove lock file: {}", e))),
            Err(e) => {
                restore(&aside, path);
                Err(e)
            }
        }
    }
}

impl Default for LocalLockBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LockBackend for LocalLockBackend {
    /// Same as `try_acquire`: a file lock held elsewhere is reported, not awaited
    async fn acquire(&self, key: &str, operation: &str) -> LockResult<LockInfo> {
        self.try_acquire(key, operation).await
    }

    async fn try_acquire(&self, key: &str, operation: &str) -> LockResult<LockInfo> {
        std::fs::create_dir_all(&self.dir)
            .map_err(|e| LockError::Io(format!("Failed to create lock directory: {}", e)))?;

        let path = self.lock_path(key);
        let lock = LockInfo::with_timeout(key, operation, self.timeout_secs);

        if self.write_new_lock(&path, &lock)? {
            debug!("lock {} on {} written to {}", lock.id, key, path.display());
            return Ok(lock);
        }

        let Some(observed) = read_raw(&path)? else {
            // Released in between
            return self.publish(&path, lock);
        };

        match serde_json::from_str::<LockInfo>(&observed) {
            Ok(existing) if !existing.is_expired() => return Err(LockError::locked(&existing)),
            Ok(existing) => {
                warn!(
                    "taking over expired lock {} on {} held by {}",
                    existing.id, key, existing.who
                );
            }
            Err(e) => {
                let age = modified_age(&path);
                if age < STALE_GRACE {
                    return Err(LockError::InvalidLock(format!(
                        "{} does not parse ({}) and was modified {}s ago",
                        path.display(),
                        e,
                        age.as_secs()
                    )));
                }
                warn!("replacing unreadable lock file {}: {}", path.display(), e);
            }
        }

        self.take_over(&path, &observed, lock)
    }

    async fn release(&self, lock: &LockInfo) -> LockResult<()> {
        let path = self.lock_path(&lock.key);
        self.remove_matching(&path, &lock.id, false)?;
        debug!("lock {} on {} released", lock.id, lock.key);
        Ok(())
    }

    async fn force_unlock(&self, key: &str, lock_id: &str) -> LockResult<()> {
        self.remove_matching(&self.lock_path(key), lock_id, true)
    }
}

/// Age below which an unreadable lock file or a takeover marker is left alone
const STALE_GRACE: Duration = Duration::from_secs(60);

fn read_raw(path: &Path) -> LockResult<Option<String>> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(LockError::Io(format!("Failed to read lock file: {}", e))),
    }
}

/// `path` with `.suffix` appended to its file name
fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".");
    name.push(suffix);
    PathBuf::from(name)
}

/// Move the file at `path` to a unique name next to it
fn set_aside(path: &Path) -> LockResult<Option<PathBuf>> {
    let aside = sibling(path, &format!("{}.stale", Uuid::new_v4()));
    match std::fs::rename(path, &aside) {
        Ok(()) => Ok(Some(aside)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(LockError::Io(format!("Failed to move lock file: {}", e))),
    }
}

/// Put a file moved by [`set_aside`] back, unless `path` was taken meanwhile
fn restore(aside: &Path, path: &Path) {
    match std::fs::hard_link(aside, path) {
        Ok(()) => {
            let _ = std::fs::remove_file(aside);
        }
        Err(e) => warn!(
            "could not restore lock file {} from {}: {}",
            path.display(),
            aside.display(),
            e
        ),
    }
}

/// Time since `path` was last modified; zero if unknown
fn modified_age(path: &Path) -> Duration {
    std::fs::metadata(path)
        .and_then(|metadata| metadata.modified())
        .ok()
        .and_then(|modified| SystemTime::now().duration_since(modified).ok())
        .unwrap_or(Duration::ZERO)
}

/// Encode a key into a file name
///
/// ASCII alphanumerics, `.` and `-` are kept; every other byte becomes `_xx`.
fn encode_key(key: &str) -> String {
    let mut encoded = String::with_capacity(key.len());
    for byte in key.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'.' || byte == b'-' {
            encoded.push(byte as char);
        } else {
            encoded.push_str(&format!("_{:02x}", byte));
        }
    }
    encoded
}
