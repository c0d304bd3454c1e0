//! Microsoft.StoragePool disk pools
//!
//! - `ids` - disk pool, managed disk and attachment identifiers
//! - `client` - API models and the `DiskPoolsClient` transport trait
//! - `attachment` - the `disk_pool_managed_disk_attachment` resource

pub mod attachment;
pub mod client;
pub mod ids;

#[cfg(test)]
pub(crate) mod fake;

pub use attachment::{AttachmentError, ManagedDiskAttachment, ManagedDiskAttachmentResource};
pub use client::{Disk, DiskPool, DiskPoolUpdate, DiskPoolsClient};
pub use ids::{DiskPoolId, DiskPoolManagedDiskAttachmentId, ManagedDiskId};
