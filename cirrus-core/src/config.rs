//! Config - Poll intervals and per-resource operation timeouts

use std::time::Duration;

use serde::Deserialize;
use tokio::time::Instant;

/// Environment variable overriding [`PollSettings::poll_interval_secs`]
pub const POLL_INTERVAL_ENV: &str = "CIRRUS_POLL_INTERVAL_SECS";

/// Environment variable overriding [`PollSettings::convergence_interval_secs`]
pub const CONVERGENCE_INTERVAL_ENV: &str = "CIRRUS_CONVERGENCE_INTERVAL_SECS";

/// Shortest wait between two status checks or two resource reads
pub const MIN_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Errors loading poll settings
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid poll settings: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid value {value:?} for {key}: expected a number of seconds")]
    InvalidEnv { key: String, value: String },

    #[error("{key} must be at least one second")]
    ZeroInterval { key: String },
}

impl ConfigError {
    fn zero_interval(key: &str) -> Self {
        Self::ZeroInterval {
            key: key.to_string(),
        }
    }
}

/// How often operations and resources are re-read while waiting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PollSettings {
    /// Delay between operation status checks when the provider gives no hint
    pub poll_interval_secs: u64,
    /// Minimum delay between resource reads during a convergence wait
    pub convergence_interval_secs: u64,
}

impl PollSettings {
    pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 10;
    pub const DEFAULT_CONVERGENCE_INTERVAL_SECS: u64 = 15;

    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        let settings: Self = serde_json::from_str(content)?;
        settings.validate()
    }

    /// Defaults, overridden by any `CIRRUS_*` variables that are set
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().with_overrides(|key| std::env::var(key).ok())
    }

    fn with_overrides(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        if let Some(secs) = parse_secs(POLL_INTERVAL_ENV, lookup(POLL_INTERVAL_ENV))? {
            self.poll_interval_secs = secs;
        }
        if let Some(secs) = parse_secs(CONVERGENCE_INTERVAL_ENV, lookup(CONVERGENCE_INTERVAL_ENV))?
        {
            self.convergence_interval_secs = secs;
        }
        self.validate()
    }

    fn validate(self) -> Result<Self, ConfigError> {
        if self.poll_interval_secs == 0 {
            return Err(ConfigError::zero_interval("poll_interval_secs"));
        }
        if self.convergence_interval_secs == 0 {
            return Err(ConfigError::zero_interval("convergence_interval_secs"));
        }
        Ok(self)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn convergence_interval(&self) -> Duration {
        Duration::from_secs(self.convergence_interval_secs)
    }
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            poll_interval_secs: Self::DEFAULT_POLL_INTERVAL_SECS,
            convergence_interval_secs: Self::DEFAULT_CONVERGENCE_INTERVAL_SECS,
        }
    }
}

fn parse_secs(key: &str, value: Option<String>) -> Result<Option<u64>, ConfigError> {
    let Some(value) = value else {
        return Ok(None);
    };
    let parsed = value.trim().parse::<u64>();
    match parsed {
        Ok(0) => Err(ConfigError::zero_interval(key)),
        Ok(secs) => Ok(Some(secs)),
        Err(_) => Err(ConfigError::InvalidEnv {
            key: key.to_string(),
            value,
        }),
    }
}

/// Kind of resource operation a deadline is derived for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Create,
    Read,
    Update,
    Delete,
}

/// Overall timeouts a resource declares for its operations
///
/// No `Default`: every resource states its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub create: Duration,
    pub read: Duration,
    pub update: Duration,
    pub delete: Duration,
}

impl Timeouts {
    pub const fn from_minutes(create: u64, read: u64, update: u64, delete: u64) -> Self {
        Self {
            create: Duration::from_secs(create * 60),
            read: Duration::from_secs(read * 60),
            update: Duration::from_secs(update * 60),
            delete: Duration::from_secs(delete * 60),
        }
    }

    pub fn get(&self, operation: Operation) -> Duration {
        match operation {
            Operation::Create => self.create,
            Operation::Read => self.read,
            Operation::Update => self.update,
            Operation::Delete => self.delete,
        }
    }

    /// Absolute deadline for an operation starting now
    pub fn deadline(&self, operation: Operation) -> Instant {
        Instant::now() + self.get(operation)
    }
}
