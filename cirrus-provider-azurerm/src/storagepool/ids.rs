//! Identifiers of the disk pool family

use std::fmt;

use cirrus_core::composite_id::{Separator, TypedCompositeId};
use cirrus_core::error::ParseError;
use cirrus_core::resource_id::{HierarchicalId, IdFormat, Segment, TypedResourceId};

/// `/subscriptions/{s}/resourceGroups/{rg}/providers/Microsoft.StoragePool/diskPools/{name}`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DiskPoolId(HierarchicalId);

impl DiskPoolId {
    pub fn new(
        subscription_id: impl Into<String>,
        resource_group_name: impl Into<String>,
        disk_pool_name: impl Into<String>,
    ) -> Result<Self, ParseError> {
        HierarchicalId::new(
            &Self::FORMAT,
            subscription_id,
            resource_group_name,
            vec![disk_pool_name.into()],
        )
        .map(Self)
    }

    pub fn subscription_id(&self) -> &str {
        self.0.subscription_id()
    }

    pub fn resource_group_name(&self) -> &str {
        self.0.resource_group_name()
    }

    pub fn disk_pool_name(&self) -> &str {
        self.0.name()
    }
}

impl TypedResourceId for DiskPoolId {
    const FORMAT: IdFormat = IdFormat::new(
        "Disk Pool",
        "Microsoft.StoragePool",
        &[Segment::new("diskPools", "diskPoolName")],
    );

    fn from_hierarchical(id: HierarchicalId) -> Self {
        Self(id)
    }

    fn as_hierarchical(&self) -> &HierarchicalId {
        &self.0
    }
}

impl fmt::Display for DiskPoolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// `/subscriptions/{s}/resourceGroups/{rg}/providers/Microsoft.Compute/disks/{name}`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ManagedDiskId(HierarchicalId);

impl ManagedDiskId {
    pub fn new(
        subscription_id: impl Into<String>,
        resource_group_name: impl Into<String>,
        disk_name: impl Into<String>,
    ) -> Result<Self, ParseError> {
        HierarchicalId::new(
            &Self::FORMAT,
            subscription_id,
            resource_group_name,
            vec![disk_name.into()],
        )
        .map(Self)
    }

    pub fn disk_name(&self) -> &str {
        self.0.name()
    }
}

impl TypedResourceId for ManagedDiskId {
    const FORMAT: IdFormat = IdFormat::new(
        "Managed Disk",
        "Microsoft.Compute",
        &[Segment::new("disks", "diskName")],
    );

    fn from_hierarchical(id: HierarchicalId) -> Self {
        Self(id)
    }

    fn as_hierarchical(&self) -> &HierarchicalId {
        &self.0
    }
}

impl fmt::Display for ManagedDiskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// A managed disk listed in a disk pool's `disks` field
///
/// Formatted as `{disk pool id}/managedDisks|{managed disk id}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DiskPoolManagedDiskAttachmentId {
    pub disk_pool_id: DiskPoolId,
    pub managed_disk_id: ManagedDiskId,
}

impl DiskPoolManagedDiskAttachmentId {
    pub fn new(disk_pool_id: DiskPoolId, managed_disk_id: ManagedDiskId) -> Self {
        Self {
            disk_pool_id,
            managed_disk_id,
        }
    }
}

impl TypedCompositeId for DiskPoolManagedDiskAttachmentId {
    type Primary = DiskPoolId;
    type Secondary = ManagedDiskId;

    const SEPARATOR: Separator = Separator::new("/managedDisks|");

    fn from_parts(primary: DiskPoolId, secondary: ManagedDiskId) -> Self {
        Self::new(primary, secondary)
    }

    fn primary(&self) -> &DiskPoolId {
        &self.disk_pool_id
    }

    fn secondary(&self) -> &ManagedDiskId {
        &self.managed_disk_id
    }
}

impl fmt::Display for DiskPoolManagedDiskAttachmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}{}",
            self.disk_pool_id,
            Self::SEPARATOR,
            self.managed_disk_id
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cirrus_core::error::Half;

    const POOL: &str = "/subscriptions/12345678-1234-9876-4563-123456789012/resourceGroups/group1/providers/Microsoft.StoragePool/diskPools/pool1";
    const DISK: &str = "/subscriptions/12345678-1234-9876-4563-123456789012/resourceGroups/group1/providers/Microsoft.Compute/disks/disk1";

    #[test]
    fn test_disk_pool_id() {
        let id = DiskPoolId::parse(POOL).unwrap();
        assert_eq!(id.subscription_id(), "12345678-1234-9876-4563-123456789012");
        assert_eq!(id.resource_group_name(), "group1");
        assert_eq!(id.disk_pool_name(), "pool1");
        assert_eq!(id.to_string(), POOL);
        assert_eq!(
            DiskPoolId::new("12345678-1234-9876-4563-123456789012", "group1", "pool1").unwrap(),
            id
        );
    }

    #[test]
    fn test_managed_disk_id_rejects_pool() {
        assert!(ManagedDiskId::parse(DISK).is_ok());
        assert!(matches!(
            ManagedDiskId::parse(POOL),
            Err(ParseError::UnexpectedValue { .. })
        ));
    }

    #[test]
    fn test_attachment_id_round_trip() {
        let input = format!("{}/managedDisks|{}", POOL, DISK);
        let id = DiskPoolManagedDiskAttachmentId::parse(&input).unwrap();
        assert_eq!(id.disk_pool_id.disk_pool_name(), "pool1");
        assert_eq!(id.managed_disk_id.disk_name(), "disk1");
        assert_eq!(id.to_string(), input);
        assert_eq!(id.id(), input);
    }

    #[test]
    fn test_attachment_id_errors() {
        assert!(matches!(
            DiskPoolManagedDiskAttachmentId::parse(POOL),
            Err(ParseError::SeparatorNotFound { .. })
        ));

        // halves swapped
        let swapped = format!("{}/managedDisks|{}", DISK, POOL);
        match DiskPoolManagedDiskAttachmentId::parse(&swapped) {
            Err(ParseError::InHalf { half, .. }) => assert_eq!(half, Half::Primary),
            other => panic!("Expected primary half error, got {:?}", other),
        }
    }
}
