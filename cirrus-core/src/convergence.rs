//! Convergence - Wait for a status field to settle after an operation completes
//!
//! The provider acknowledges some mutations before their side effect has taken
//! hold, so the operation handle reports success while the resource itself is
//! still moving. The waiter re-reads the resource until a discrete status reaches
//! its target. Statuses outside the pending set mean the resource diverged and
//! are reported immediately; read failures are never retried here.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use log::{debug, trace};
use tokio::time::Instant;

use crate::config::MIN_POLL_INTERVAL;
use crate::error::{BoxError, Error, Result};

/// How a read with no status field is treated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AbsentStatus {
    /// The status is expected on every read; absence is a divergence
    #[default]
    Diverged,
    /// The status field appears eventually; keep waiting, up to
    /// [`ConvergenceTarget::not_found_checks`] consecutive absent reads
    Pending,
}

/// Acceptable pending values and the required target for one wait
#[derive(Debug, Clone, PartialEq)]
pub struct ConvergenceTarget<S> {
    pub pending: Vec<S>,
    pub target: S,
    pub absent: AbsentStatus,
    /// Consecutive reads that must report the target
    pub continuous_target_occurrence: u32,
    /// Consecutive absent reads tolerated under [`AbsentStatus::Pending`];
    /// `None` waits until the deadline
    pub not_found_checks: Option<u32>,
    /// Wait before the first read
    pub initial_delay: Duration,
    pub description: String,
}

impl<S> ConvergenceTarget<S> {
    pub fn new(pending: impl IntoIterator<Item = S>, target: S) -> Self {
        Self {
            pending: pending.into_iter().collect(),
            target,
            absent: AbsentStatus::default(),
            continuous_target_occurrence: 1,
            not_found_checks: None,
            initial_delay: Duration::ZERO,
            description: "state convergence".to_string(),
        }
    }

    pub fn with_absent(mut self, absent: AbsentStatus) -> Self {
        self.absent = absent;
        self
    }

    pub fn with_continuous_target_occurrence(mut self, occurrences: u32) -> Self {
        self.continuous_target_occurrence = occurrences.max(1);
        self
    }

    pub fn with_not_found_checks(mut self, checks: u32) -> Self {
        self.not_found_checks = Some(checks);
        self
    }

    /// Give the status time to show up before the first read
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub fn described_as(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    fn diverged(&self, status: Option<&S>) -> Error
    where
        S: fmt::Display,
    {
        Error::DivergedState {
            status: status.map_or_else(|| "<absent>".to_string(), ToString::to_string),
            target: self.target.to_string(),
            pending: self.pending.iter().map(ToString::to_string).collect(),
        }
    }
}

/// Result of a successful wait
#[derive(Debug, Clone, PartialEq)]
pub struct Converged<S> {
    pub status: S,
    /// Number of reads performed
    pub reads: u32,
}

/// Re-read a resource until its status reaches `target.target`
///
/// `read` returns `Ok(None)` when the status field is absent. The first read
/// happens after `target.initial_delay`; between reads the waiter sleeps
/// `interval` (at least [`MIN_POLL_INTERVAL`]). No sleep runs past `deadline`.
pub async fn wait<S, F, Fut, E>(
    mut read: F,
    target: &ConvergenceTarget<S>,
    deadline: Instant,
    interval: Duration,
) -> Result<Converged<S>>
where
    S: PartialEq + fmt::Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<S>, E>>,
    E: Into<BoxError>,
{
    let start = Instant::now();
    let mut reads = 0;
    let mut target_seen = 0;
    let mut absent_seen = 0;

    if !target.initial_delay.is_zero() {
        let remaining = deadline.saturating_duration_since(start);
        tokio::time::sleep(target.initial_delay.min(remaining)).await;
        if Instant::now() >= deadline {
            return Err(Error::DeadlineExceeded {
                operation: target.description.clone(),
                elapsed: start.elapsed(),
                last_error: None,
            });
        }
    }

    loop {
        reads += 1;
        let status = read().await.map_err(|e| Error::ReadFailed(e.into()))?;

        let observed = match status {
            Some(status) if status == target.target => {
                absent_seen = 0;
                target_seen += 1;
                if target_seen >= target.continuous_target_occurrence {
                    debug!(
                        "{}: reached {} after {} reads",
                        target.description, status, reads
                    );
                    return Ok(Converged { status, reads });
                }
                status.to_string()
            }
            Some(status) if target.pending.contains(&status) => {
                absent_seen = 0;
                target_seen = 0;
                status.to_string()
            }
            None if target.absent == AbsentStatus::Pending => {
                absent_seen += 1;
                if target.not_found_checks.is_some_and(|limit| absent_seen > limit) {
                    debug!(
                        "{}: status absent on {} consecutive reads",
                        target.description, absent_seen
                    );
                    return Err(target.diverged(None));
                }
                target_seen = 0;
                "<absent>".to_string()
            }
            other => return Err(target.diverged(other.as_ref())),
        };
        trace!("{}: observed {}", target.description, observed);

        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(Error::DeadlineExceeded {
                operation: target.description.clone(),
                elapsed: start.elapsed(),
                last_error: Some(format!("last observed state {}", observed)),
            });
        }
        tokio::time::sleep(interval.max(MIN_POLL_INTERVAL).min(remaining)).await;
    }
}
