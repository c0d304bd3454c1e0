//! Retry - Classify provider errors as transient or permanent
//!
//! The provider's control plane races with itself: two sequential updates of
//! the same list field can collide while the first is still being applied.
//! Errors carrying one of the known transient codes are retried; everything
//! else (bad input, authorization, quota) fails immediately.

use std::fmt;

/// Another mutation of the same resource is still running
pub const ANOTHER_OPERATION_IN_PROGRESS: &str = "AnotherOperationInProgress";

/// The control plane timed out applying the resource's goal state
pub const GOAL_STATE_APPLICATION_TIMEOUT: &str = "GoalStateApplicationTimeoutError";

/// A dependent resource has not propagated yet
pub const RESOURCE_NOT_YET_SYNCED: &str = "ResourceNotYetSynced";

/// Outcome of classifying an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Retryable,
    Fatal,
}

/// Decides whether an error is worth retrying
///
/// Matching is a substring search of the error's text against a fixed list of codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryClassifier {
    codes: &'static [&'static str],
}

impl RetryClassifier {
    pub const fn new(codes: &'static [&'static str]) -> Self {
        Self { codes }
    }

    /// A classifier that never retries
    pub const fn never() -> Self {
        Self { codes: &[] }
    }

    pub fn codes(&self) -> &'static [&'static str] {
        self.codes
    }

    /// Classify an error; `None` and errors with no text are [`Verdict::Fatal`]
    pub fn classify<E>(&self, error: Option<&E>) -> Verdict
    where
        E: fmt::Display + ?Sized,
    {
        match error {
            Some(e) => self.classify_message(&e.to_string()),
            None => Verdict::Fatal,
        }
    }

    pub fn classify_message(&self, message: &str) -> Verdict {
        let matched = self
            .codes
            .iter()
            .any(|code| !code.is_empty() && message.contains(code));
        if matched {
            Verdict::Retryable
        } else {
            Verdict::Fatal
        }
    }
}

impl Default for RetryClassifier {
    fn default() -> Self {
        Self::new(&[ANOTHER_OPERATION_IN_PROGRESS])
    }
}
