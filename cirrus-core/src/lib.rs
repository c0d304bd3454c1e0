//! Cirrus Core
//!
//! Hierarchical resource identifiers and the operation convergence engine
//! shared by every Cirrus resource family.
//!
//! - `resource_id` / `composite_id` - parse and format resource IDs
//! - `poller` - drive a long-running operation to a terminal state
//! - `retry` - classify transient provider errors
//! - `convergence` - wait for a status field to reach its target

pub mod composite_id;
pub mod config;
pub mod convergence;
pub mod error;
pub mod poller;
pub mod provider;
pub mod resource;
pub mod resource_id;
pub mod retry;

pub use composite_id::{CompositeId, Separator, TypedCompositeId};
pub use error::{Error, ParseError, ProviderFailure};
pub use resource_id::{HierarchicalId, IdFormat, Segment, TypedResourceId};
