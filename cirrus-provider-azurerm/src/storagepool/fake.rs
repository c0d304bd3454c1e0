//! In-memory disk pool API used by the tests

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;

use cirrus_core::error::{BoxError, ProviderFailure};
use cirrus_core::poller::{OperationHandle, OperationStatus};
use cirrus_core::resource_id::TypedResourceId;

use super::client::{
    Disk, DiskPool, DiskPoolProperties, DiskPoolUpdate, DiskPoolsClient, PROVISIONING_SUCCEEDED,
};
use super::ids::DiskPoolId;

struct PendingUpdate {
    pool: String,
    disks: Vec<Disk>,
    polls_left: u32,
}

#[derive(Default)]
struct FakeState {
    pools: HashMap<String, DiskPool>,
    operations: HashMap<String, PendingUpdate>,
    submit_errors: VecDeque<String>,
    operation_failure: Option<ProviderFailure>,
    after_update: Vec<String>,
    settling: HashMap<String, VecDeque<String>>,
    next_operation: u32,
    updates: u32,
    gets: u32,
}

/// Fake API applying each update after one in-progress poll
#[derive(Default)]
pub struct FakeDiskPools {
    state: Mutex<FakeState>,
}

impl FakeDiskPools {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pool(self, id: &DiskPoolId, disks: &[&str]) -> Self {
        let pool = DiskPool {
            id: id.id(),
            name: id.disk_pool_name().to_string(),
            properties: DiskPoolProperties {
                provisioning_state: Some(PROVISIONING_SUCCEEDED.to_string()),
                status: Some("Running".to_string()),
                disks: Some(disks.iter().map(|d| Disk::new(*d)).collect()),
            },
        };
        self.state.lock().unwrap().pools.insert(id.id(), pool);
        self
    }

    /// Provisioning states reported by successive reads after an update completes
    pub fn settling_through(self, states: &[&str]) -> Self {
        self.state.lock().unwrap().after_update = states.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn failing_submissions(self, errors: &[&str]) -> Self {
        self.state.lock().unwrap().submit_errors = errors.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn failing_operations(self, failure: ProviderFailure) -> Self {
        self.state.lock().unwrap().operation_failure = Some(failure);
        self
    }

    pub fn remove_pool(&self, id: &DiskPoolId) {
        self.state.lock().unwrap().pools.remove(&id.id());
    }

    pub fn disks(&self, id: &DiskPoolId) -> Vec<String> {
        self.state.lock().unwrap().pools[&id.id()]
            .disks()
            .iter()
            .map(|d| d.id.clone())
            .collect()
    }

    pub fn updates(&self) -> u32 {
        self.state.lock().unwrap().updates
    }

    pub fn gets(&self) -> u32 {
        self.state.lock().unwrap().gets
    }
}

#[async_trait]
impl DiskPoolsClient for FakeDiskPools {
    async fn get(&self, id: &DiskPoolId) -> Result<Option<DiskPool>, BoxError> {
        let mut state = self.state.lock().unwrap();
        state.gets += 1;
        let key = id.id();
        let Some(pool) = state.pools.get(&key).cloned() else {
            return Ok(None);
        };

        if let Some(queue) = state.settling.get_mut(&key) {
            let next = queue.pop_front();
            if next.is_none() {
                state.settling.remove(&key);
            }
            if let Some(pool) = state.pools.get_mut(&key) {
                pool.properties.provisioning_state =
                    Some(next.unwrap_or_else(|| PROVISIONING_SUCCEEDED.to_string()));
            }
        }
        Ok(Some(pool))
    }

    async fn begin_update(
        &self,
        id: &DiskPoolId,
        update: &DiskPoolUpdate,
    ) -> Result<OperationHandle, BoxError> {
        let mut state = self.state.lock().unwrap();
        if let Some(error) = state.submit_errors.pop_front() {
            return Err(error.into());
        }
        let key = id.id();
        let Some(pool) = state.pools.get_mut(&key) else {
            return Err(format!("Code=\"ResourceNotFound\" Message=\"{} was not found\"", key).into());
        };
        pool.properties.provisioning_state = Some("Updating".to_string());

        state.next_operation += 1;
        state.updates += 1;
        let location = format!(
            "https://management.azure.com/providers/Microsoft.StoragePool/operations/{}",
            state.next_operation
        );
        state.operations.insert(
            location.clone(),
            PendingUpdate {
                pool: key,
                disks: update.properties.disks.clone(),
                polls_left: 1,
            },
        );
        Ok(OperationHandle::accepted(location))
    }

    async fn operation_status(
        &self,
        handle: &OperationHandle,
    ) -> Result<OperationStatus, BoxError> {
        let mut state = self.state.lock().unwrap();
        let location = handle.location.clone().unwrap_or_default();
        let Some(operation) = state.operations.get_mut(&location) else {
            return Err(format!("unknown operation {}", location).into());
        };
        if operation.polls_left > 0 {
            operation.polls_left -= 1;
            return Ok(OperationStatus::InProgress);
        }

        let Some(operation) = state.operations.remove(&location) else {
            return Err(format!("unknown operation {}", location).into());
        };
        if let Some(failure) = state.operation_failure.clone() {
            return Ok(OperationStatus::Failed(failure));
        }

        let mut settling: VecDeque<String> = state.after_update.iter().cloned().collect();
        let provisioning_state = settling
            .pop_front()
            .unwrap_or_else(|| PROVISIONING_SUCCEEDED.to_string());
        if !settling.is_empty() || provisioning_state != PROVISIONING_SUCCEEDED {
            state.settling.insert(operation.pool.clone(), settling);
        }
        if let Some(pool) = state.pools.get_mut(&operation.pool) {
            pool.properties.disks = Some(operation.disks);
            pool.properties.provisioning_state = Some(provisioning_state);
        }
        Ok(OperationStatus::Succeeded(None))
    }
}
