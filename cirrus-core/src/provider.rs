//! Provider - Trait the host tool drives resource operations through
//!
//! Each resource family implements the plugin-facing operations on top of the
//! identifier codecs, the operation poller and the convergence waiter.

use std::future::Future;
use std::pin::Pin;

use crate::config::Timeouts;
use crate::error::{Error, ParseError};
use crate::resource::{Resource, ResourceId, State};

/// Error reported to the host tool
#[derive(Debug)]
pub struct ProviderError {
    pub message: String,
    pub resource_id: Option<ResourceId>,
    /// True when the operation may still be running on the provider side
    pub timed_out: bool,
    pub cause: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl std::fmt::Display for ProviderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(ref id) = self.resource_id {
            write!(f, "[{}.{}] {}", id.resource_type, id.name, self.message)
        } else {
            write!(f, "{}", self.message)
        }
    }
}

impl std::error::Error for ProviderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause
            .as_ref()
            .map(|e| e.as_ref() as &dyn std::error::Error)
    }
}

impl ProviderError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            resource_id: None,
            timed_out: false,
            cause: None,
        }
    }

    pub fn for_resource(mut self, id: ResourceId) -> Self {
        self.resource_id = Some(id);
        self
    }

    pub fn with_cause(mut self, cause: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    /// Wrap a core error with context, e.g. `ProviderError::wrap("creating p1", e)`
    pub fn wrap(context: impl std::fmt::Display, error: Error) -> Self {
        let timed_out = error.is_deadline_exceeded();
        let mut wrapped = Self::new(format!("{}: {}", context, error)).with_cause(error);
        wrapped.timed_out = timed_out;
        wrapped
    }
}

impl From<ParseError> for ProviderError {
    fn from(error: ParseError) -> Self {
        Self::new(error.to_string()).with_cause(error)
    }
}

pub type ProviderResult<T> = Result<T, ProviderError>;

/// Return type for async operations
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Definition of a resource type a Provider can handle
pub trait ResourceType: Send + Sync {
    /// Resource type name (e.g., "disk_pool_managed_disk_attachment")
    fn name(&self) -> &'static str;

    /// Overall timeouts for each operation on this resource type
    fn timeouts(&self) -> Timeouts;
}

/// Main Provider trait
///
/// All operations are async and involve side effects.
pub trait Provider: Send + Sync {
    /// Name of this Provider (e.g., "azurerm")
    fn name(&self) -> &'static str;

    /// List of resource types this Provider can handle
    fn resource_types(&self) -> Vec<Box<dyn ResourceType>>;

    /// Get the current state of a resource
    ///
    /// Returns `State::not_found()` if the resource does not exist.
    fn read(&self, id: &ResourceId, identifier: &str) -> BoxFuture<'_, ProviderResult<State>>;

    /// Create a resource
    ///
    /// Returns State with identifier set to the provider resource ID
    fn create(&self, resource: &Resource) -> BoxFuture<'_, ProviderResult<State>>;

    /// Update a resource in place
    fn update(
        &self,
        id: &ResourceId,
        identifier: &str,
        from: &State,
        to: &Resource,
    ) -> BoxFuture<'_, ProviderResult<State>>;

    /// Delete a resource
    fn delete(&self, id: &ResourceId, identifier: &str) -> BoxFuture<'_, ProviderResult<()>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_display_with_resource() {
        let error = ProviderError::new("disk already attached")
            .for_resource(ResourceId::new("disk_pool_managed_disk_attachment", "data"));
        assert_eq!(
            error.to_string(),
            "[disk_pool_managed_disk_attachment.data] disk already attached"
        );
    }

    #[test]
    fn test_wrap_marks_timeouts() {
        let error = ProviderError::wrap(
            "waiting for p1",
            Error::DeadlineExceeded {
                operation: "updating p1".to_string(),
                elapsed: Duration::from_secs(5),
                last_error: None,
            },
        );
        assert!(error.timed_out);
        assert!(error.message.starts_with("waiting for p1: timeout"));
        assert!(std::error::Error::source(&error).is_some());

        let error = ProviderError::wrap("updating p1", Error::Canceled);
        assert!(!error.timed_out);
    }

    #[test]
    fn test_from_parse_error() {
        let error: ProviderError = ParseError::MissingSegment("diskName".to_string()).into();
        assert_eq!(error.to_string(), "resource ID is missing the segment \"diskName\"");
    }
}
