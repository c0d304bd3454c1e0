//! Resource type definitions exposed to the host tool

use cirrus_core::config::Timeouts;
use cirrus_core::provider::ResourceType;

use crate::storagepool::attachment::ATTACHMENT_TIMEOUTS;

pub const DISK_POOL_MANAGED_DISK_ATTACHMENT: &str = "disk_pool_managed_disk_attachment";

/// Attribute holding the disk pool ID of an attachment
pub const DISK_POOL_ID: &str = "disk_pool_id";
/// Attribute holding the managed disk ID of an attachment
pub const MANAGED_DISK_ID: &str = "managed_disk_id";

pub struct DiskPoolManagedDiskAttachmentType;

impl ResourceType for DiskPoolManagedDiskAttachmentType {
    fn name(&self) -> &'static str {
        DISK_POOL_MANAGED_DISK_ATTACHMENT
    }

    fn timeouts(&self) -> Timeouts {
        ATTACHMENT_TIMEOUTS
    }
}

/// Returns all resource types supported by this provider
pub fn resource_types() -> Vec<Box<dyn ResourceType>> {
    vec![Box::new(DiskPoolManagedDiskAttachmentType)]
}
