//! Azure Resource Manager provider implementation
//!
//! Dispatches the host tool's resource operations to the resource family
//! handlers.

use std::collections::HashMap;
use std::sync::Arc;

use cirrus_core::composite_id::TypedCompositeId;
use cirrus_core::config::PollSettings;
use cirrus_core::provider::{ProviderError, ProviderResult};
use cirrus_core::resource::{Resource, ResourceId, State, Value};
use cirrus_core::resource_id::TypedResourceId;
use cirrus_lock::LockBackend;

use crate::resources::{DISK_POOL_ID, DISK_POOL_MANAGED_DISK_ATTACHMENT, MANAGED_DISK_ID};
use crate::storagepool::{DiskPoolsClient, ManagedDiskAttachmentResource};

/// Azure Resource Manager Provider
pub struct AzurermProvider {
    disk_pool_attachments: ManagedDiskAttachmentResource<dyn DiskPoolsClient>,
}

impl AzurermProvider {
    pub fn new(
        disk_pools: Arc<dyn DiskPoolsClient>,
        locks: Arc<dyn LockBackend>,
        settings: PollSettings,
    ) -> Self {
        Self {
            disk_pool_attachments: ManagedDiskAttachmentResource::new(disk_pools, locks, settings),
        }
    }

    /// Read a resource by its provider identifier
    pub async fn read_resource(&self, id: &ResourceId, identifier: &str) -> ProviderResult<State> {
        match id.resource_type.as_str() {
            DISK_POOL_MANAGED_DISK_ATTACHMENT => {
                let attachment = self
                    .disk_pool_attachments
                    .read(identifier)
                    .await
                    .map_err(|e| ProviderError::from(e).for_resource(id.clone()))?;

                let Some(attachment) = attachment else {
                    return Ok(State::not_found(id.clone()));
                };

                let mut attributes = HashMap::new();
                attributes.insert(
                    DISK_POOL_ID.to_string(),
                    Value::String(attachment.id.disk_pool_id.id()),
                );
                attributes.insert(
                    MANAGED_DISK_ID.to_string(),
                    Value::String(attachment.id.managed_disk_id.id()),
                );
                Ok(State::existing(id.clone(), attributes).with_identifier(attachment.id.id()))
            }
            other => Err(unknown_type(other).for_resource(id.clone())),
        }
    }

    /// Create a resource and read it back
    pub async fn create_resource(&self, resource: Resource) -> ProviderResult<State> {
        match resource.id.resource_type.as_str() {
            DISK_POOL_MANAGED_DISK_ATTACHMENT => {
                let disk_pool_id = required_str(&resource, DISK_POOL_ID)?;
                let managed_disk_id = required_str(&resource, MANAGED_DISK_ID)?;

                let id = self
                    .disk_pool_attachments
                    .create(disk_pool_id, managed_disk_id)
                    .await
                    .map_err(|e| ProviderError::from(e).for_resource(resource.id.clone()))?;

                self.read_resource(&resource.id, &id.id()).await
            }
            other => Err(unknown_type(other).for_resource(resource.id.clone())),
        }
    }

    /// Update a resource
    ///
    /// Attachments have no mutable attributes; changing either ID replaces them.
    pub async fn update_resource(&self, id: ResourceId) -> ProviderResult<State> {
        Err(ProviderError::new(format!(
            "Update not supported for {}, delete and recreate",
            id.resource_type
        ))
        .for_resource(id))
    }

    /// Delete a resource
    pub async fn delete_resource(&self, id: &ResourceId, identifier: &str) -> ProviderResult<()> {
        match id.resource_type.as_str() {
            DISK_POOL_MANAGED_DISK_ATTACHMENT => self
                .disk_pool_attachments
                .delete(identifier)
                .await
                .map_err(|e| ProviderError::from(e).for_resource(id.clone())),
            other => Err(unknown_type(other).for_resource(id.clone())),
        }
    }
}

fn unknown_type(resource_type: &str) -> ProviderError {
    ProviderError::new(format!("Unknown resource type: {}", resource_type))
}

fn required_str<'a>(resource: &'a Resource, key: &str) -> ProviderResult<&'a str> {
    resource.get_str(key).ok_or_else(|| {
        ProviderError::new(format!("Missing required attribute: {}", key))
            .for_resource(resource.id.clone())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storagepool::fake::FakeDiskPools;
    use crate::storagepool::{DiskPoolId, ManagedDiskId};
    use cirrus_core::provider::Provider;
    use cirrus_lock::MemoryLockBackend;

    const SUB: &str = "12345678-1234-9876-4563-123456789012";

    fn pool_id() -> DiskPoolId {
        DiskPoolId::new(SUB, "group1", "pool1").unwrap()
    }

    fn disk_id() -> String {
        ManagedDiskId::new(SUB, "group1", "disk1").unwrap().id()
    }

    fn provider(client: Arc<FakeDiskPools>) -> AzurermProvider {
        AzurermProvider::new(
            client,
            Arc::new(MemoryLockBackend::new()),
            PollSettings::default(),
        )
    }

    fn attachment() -> Resource {
        Resource::new(DISK_POOL_MANAGED_DISK_ATTACHMENT, "data")
            .with_attribute(DISK_POOL_ID, Value::String(pool_id().id()))
            .with_attribute(MANAGED_DISK_ID, Value::String(disk_id()))
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_read_delete() {
        let client = Arc::new(FakeDiskPools::new().with_pool(&pool_id(), &[]));
        let provider = provider(Arc::clone(&client));
        let resource = attachment();

        let state = provider.create(&resource).await.unwrap();
        assert!(state.exists);
        let identifier = state.identifier.clone().unwrap();
        assert_eq!(identifier, format!("{}/managedDisks|{}", pool_id(), disk_id()));
        assert_eq!(
            state.attributes.get(MANAGED_DISK_ID),
            Some(&Value::String(disk_id()))
        );

        let read = provider.read(&resource.id, &identifier).await.unwrap();
        assert_eq!(read, state);

        provider.delete(&resource.id, &identifier).await.unwrap();
        let gone = provider.read(&resource.id, &identifier).await.unwrap();
        assert!(!gone.exists);
        assert!(client.disks(&pool_id()).is_empty());
    }

    #[tokio::test]
    async fn test_missing_attribute() {
        let provider = provider(Arc::new(FakeDiskPools::new()));
        let mut resource = attachment();
        resource.attributes.remove(MANAGED_DISK_ID);

        let error = provider.create(&resource).await.unwrap_err();
        assert_eq!(
            error.to_string(),
            "[disk_pool_managed_disk_attachment.data] Missing required attribute: managed_disk_id"
        );
    }

    #[tokio::test]
    async fn test_unknown_resource_type() {
        let provider = provider(Arc::new(FakeDiskPools::new()));
        let id = ResourceId::new("virtual_machine", "vm");

        let error = provider.read(&id, "x").await.unwrap_err();
        assert_eq!(
            error.to_string(),
            "[virtual_machine.vm] Unknown resource type: virtual_machine"
        );
    }

    #[tokio::test]
    async fn test_update_not_supported() {
        let provider = provider(Arc::new(FakeDiskPools::new()));
        let resource = attachment();
        let from = State::not_found(resource.id.clone());

        let result = provider.update(&resource.id, "x", &from, &resource).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_parse_error_names_resource() {
        let provider = provider(Arc::new(FakeDiskPools::new()));
        let id = ResourceId::new(DISK_POOL_MANAGED_DISK_ATTACHMENT, "data");

        let error = provider.read(&id, "not-an-id").await.unwrap_err();
        assert_eq!(error.resource_id, Some(id));
        assert!(!error.timed_out);
    }
}
