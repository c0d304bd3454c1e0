//! Poller - Drive an accepted long-running operation to a terminal state
//!
//! ```text
//! Submitted -> Polling -> Polling -> ... -> Succeeded | Failed | Canceled
//! ```
//!
//! Each polling step waits, then asks the transport for the operation's status.
//! Transport errors are handed to the [`RetryClassifier`]; provider-reported
//! failures are returned as they are. Reaching the deadline while still polling
//! is reported as [`Error::DeadlineExceeded`].

use std::time::Duration;

use async_trait::async_trait;
use log::{debug, trace, warn};
use tokio::time::Instant;

use crate::config::{MIN_POLL_INTERVAL, PollSettings};
use crate::error::{BoxError, Error, ProviderFailure, Result};
use crate::retry::{RetryClassifier, Verdict};

/// Continuation of an accepted mutation
#[derive(Debug, Clone, PartialEq)]
pub struct OperationHandle {
    /// HTTP status of the acceptance response
    pub status_code: u16,
    /// Where the operation's status is polled; `None` when it completed synchronously
    pub location: Option<String>,
    /// Body of the acceptance response
    pub body: Option<serde_json::Value>,
    /// Polling interval requested by the provider
    pub retry_after: Option<Duration>,
}

impl OperationHandle {
    /// A `202 Accepted` response pointing at `location`
    pub fn accepted(location: impl Into<String>) -> Self {
        Self {
            status_code: 202,
            location: Some(location.into()),
            body: None,
            retry_after: None,
        }
    }

    /// A response that finished the mutation without an operation to poll
    pub fn completed(status_code: u16, body: Option<serde_json::Value>) -> Self {
        Self {
            status_code,
            location: None,
            body,
            retry_after: None,
        }
    }

    pub fn with_retry_after(mut self, retry_after: Duration) -> Self {
        self.retry_after = Some(retry_after);
        self
    }

    pub fn with_body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }
}

/// Status reported for an operation
#[derive(Debug, Clone, PartialEq)]
pub enum OperationStatus {
    InProgress,
    Succeeded(Option<serde_json::Value>),
    Failed(ProviderFailure),
    Canceled,
}

/// Submits mutations and reads operation status
///
/// Implemented by the transport layer of each resource family.
#[async_trait]
pub trait OperationTransport: Send + Sync {
    type Request: Send + Sync;

    async fn submit(&self, request: &Self::Request) -> Result<OperationHandle, BoxError>;

    async fn status(&self, handle: &OperationHandle) -> Result<OperationStatus, BoxError>;
}

/// Result of a successful poll
#[derive(Debug, Clone, PartialEq)]
pub struct PollOutcome {
    /// Final payload returned by the operation, if any
    pub payload: Option<serde_json::Value>,
    /// Number of status requests made
    pub status_checks: u32,
    /// Number of transient errors that were retried (submission included)
    pub retries: u32,
}

/// Drives one mutation through an [`OperationTransport`]
pub struct OperationPoller<'a, T: OperationTransport + ?Sized> {
    transport: &'a T,
    classifier: RetryClassifier,
    interval: Duration,
    description: String,
}

impl<'a, T: OperationTransport + ?Sized> OperationPoller<'a, T> {
    pub fn new(transport: &'a T, settings: &PollSettings) -> Self {
        Self {
            transport,
            classifier: RetryClassifier::default(),
            interval: settings.poll_interval(),
            description: "operation".to_string(),
        }
    }

    pub fn with_classifier(mut self, classifier: RetryClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    /// Name used in logs and timeout errors (e.g., "updating Disk Pool p1")
    pub fn described_as(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Submit `request` and wait for the resulting operation
    pub async fn submit_and_wait(
        &self,
        request: &T::Request,
        deadline: Instant,
    ) -> Result<PollOutcome> {
        let start = Instant::now();
        let mut retries = 0;

        let handle = loop {
            match self.transport.submit(request).await {
                Ok(handle) => break handle,
                Err(e) => {
                    if self.classifier.classify(Some(&e)) == Verdict::Fatal {
                        return Err(Error::transport(Verdict::Fatal, e));
                    }
                    warn!("{}: retrying submission after transient error: {}", self.description, e);
                    if !self.pause(self.interval, deadline).await {
                        return Err(self.deadline_exceeded(start, Some(e.to_string())));
                    }
                    retries += 1;
                }
            }
        };

        debug!(
            "{}: submitted (status {}, location {:?})",
            self.description, handle.status_code, handle.location
        );
        let mut outcome = self.poll(handle, start, deadline).await?;
        outcome.retries += retries;
        Ok(outcome)
    }

    /// Wait for an operation that has already been accepted
    pub async fn wait(&self, handle: OperationHandle, deadline: Instant) -> Result<PollOutcome> {
        self.poll(handle, Instant::now(), deadline).await
    }

    async fn poll(
        &self,
        handle: OperationHandle,
        start: Instant,
        deadline: Instant,
    ) -> Result<PollOutcome> {
        if handle.location.is_none() {
            debug!("{}: completed synchronously", self.description);
            return Ok(PollOutcome {
                payload: handle.body,
                status_checks: 0,
                retries: 0,
            });
        }

        let interval = handle.retry_after.unwrap_or(self.interval);
        let mut status_checks = 0;
        let mut retries = 0;
        let mut last_error = None;

        loop {
            if !self.pause(interval, deadline).await {
                return Err(self.deadline_exceeded(start, last_error));
            }

            status_checks += 1;
            match self.transport.status(&handle).await {
                Ok(OperationStatus::InProgress) => {
                    trace!("{}: still in progress", self.description);
                }
                Ok(OperationStatus::Succeeded(payload)) => {
                    debug!(
                        "{}: succeeded after {} status checks",
                        self.description, status_checks
                    );
                    return Ok(PollOutcome {
                        payload: payload.or(handle.body),
                        status_checks,
                        retries,
                    });
                }
                Ok(OperationStatus::Failed(failure)) => {
                    debug!("{}: failed: {}", self.description, failure);
                    return Err(Error::ProviderFailure(failure));
                }
                Ok(OperationStatus::Canceled) => {
                    debug!("{}: canceled", self.description);
                    return Err(Error::Canceled);
                }
                Err(e) => {
                    if self.classifier.classify(Some(&e)) == Verdict::Fatal {
                        return Err(Error::transport(Verdict::Fatal, e));
                    }
                    warn!("{}: retrying after transient error: {}", self.description, e);
                    retries += 1;
                    last_error = Some(e.to_string());
                }
            }
        }
    }

    /// Sleep for `interval` (at least [`MIN_POLL_INTERVAL`]), cut short at
    /// `deadline`; false once the deadline has passed
    async fn pause(&self, interval: Duration, deadline: Instant) -> bool {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return false;
        }
        tokio::time::sleep(interval.max(MIN_POLL_INTERVAL).min(remaining)).await;
        true
    }

    fn deadline_exceeded(&self, start: Instant, last_error: Option<String>) -> Error {
        Error::DeadlineExceeded {
            operation: self.description.clone(),
            elapsed: start.elapsed(),
            last_error,
        }
    }
}
