//! Disk pool API models and client trait

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use cirrus_core::error::BoxError;
use cirrus_core::poller::{OperationHandle, OperationStatus, OperationTransport};

use super::ids::DiskPoolId;

/// Provisioning state reported once an update has been applied
pub const PROVISIONING_SUCCEEDED: &str = "Succeeded";
/// Provisioning states reported while an update is being applied
pub const PROVISIONING_PENDING: [&str; 2] = ["Pending", "Updating"];

/// Reference to a managed disk in a pool's `disks` list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Disk {
    pub id: String,
}

impl Disk {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }

    /// Managed disk IDs come back from the API with normalized casing
    pub fn refers_to(&self, id: &str) -> bool {
        self.id.eq_ignore_ascii_case(id)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiskPoolProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provisioning_state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disks: Option<Vec<Disk>>,
}

/// A disk pool as returned by `GET`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiskPool {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub properties: DiskPoolProperties,
}

impl DiskPool {
    pub fn disks(&self) -> &[Disk] {
        self.properties.disks.as_deref().unwrap_or_default()
    }

    pub fn provisioning_state(&self) -> Option<&str> {
        self.properties.provisioning_state.as_deref()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiskPoolUpdateProperties {
    pub disks: Vec<Disk>,
}

/// `PATCH` body replacing a pool's disk list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiskPoolUpdate {
    pub properties: DiskPoolUpdateProperties,
}

impl DiskPoolUpdate {
    pub fn disks(disks: Vec<Disk>) -> Self {
        Self {
            properties: DiskPoolUpdateProperties { disks },
        }
    }
}

/// Disk pool operations of the storage pool management API
///
/// Implementations own transport and authentication. A missing pool is
/// `Ok(None)` from `get`, not an error.
#[async_trait]
pub trait DiskPoolsClient: Send + Sync {
    async fn get(&self, id: &DiskPoolId) -> Result<Option<DiskPool>, BoxError>;

    /// Start a `PATCH` of the pool, returning the long-running operation handle
    async fn begin_update(
        &self,
        id: &DiskPoolId,
        update: &DiskPoolUpdate,
    ) -> Result<OperationHandle, BoxError>;

    async fn operation_status(&self, handle: &OperationHandle)
    -> Result<OperationStatus, BoxError>;
}

/// A pending update of one pool
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateRequest {
    pub id: DiskPoolId,
    pub update: DiskPoolUpdate,
}

/// Adapts a [`DiskPoolsClient`] to the operation poller
pub struct UpdateTransport<'a, C: ?Sized> {
    client: &'a C,
}

impl<'a, C: ?Sized> UpdateTransport<'a, C> {
    pub fn new(client: &'a C) -> Self {
        Self { client }
    }
}

#[async_trait]
impl<'a, C> OperationTransport for UpdateTransport<'a, C>
where
    C: DiskPoolsClient + ?Sized,
{
    type Request = UpdateRequest;

    async fn submit(&self, request: &UpdateRequest) -> Result<OperationHandle, BoxError> {
        self.client.begin_update(&request.id, &request.update).await
    }

    async fn status(&self, handle: &OperationHandle) -> Result<OperationStatus, BoxError> {
        self.client.operation_status(handle).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_deserialize_disk_pool() {
        let pool: DiskPool = serde_json::from_value(json!({
            "id": "/subscriptions/s/resourceGroups/rg/providers/Microsoft.StoragePool/diskPools/p1",
            "name": "p1",
            "location": "westeurope",
            "properties": {
                "provisioningState": "Succeeded",
                "status": "Running",
                "disks": [
                    {"id": "/subscriptions/s/resourceGroups/rg/providers/Microsoft.Compute/disks/d1"}
                ],
                "availabilityZones": ["1"]
            }
        }))
        .unwrap();

        assert_eq!(pool.name, "p1");
        assert_eq!(pool.provisioning_state(), Some("Succeeded"));
        assert_eq!(pool.disks().len(), 1);
        assert!(pool.disks()[0].refers_to(
            "/subscriptions/s/resourceGroups/rg/providers/microsoft.compute/disks/d1"
        ));
    }

    #[test]
    fn test_pool_without_disks() {
        let pool: DiskPool =
            serde_json::from_value(json!({"name": "p1", "properties": {}})).unwrap();
        assert!(pool.disks().is_empty());
        assert_eq!(pool.provisioning_state(), None);
    }

    #[test]
    fn test_serialize_update() {
        let update = DiskPoolUpdate::disks(vec![Disk::new("d1")]);
        assert_eq!(
            serde_json::to_value(&update).unwrap(),
            json!({"properties": {"disks": [{"id": "d1"}]}})
        );
    }
}
