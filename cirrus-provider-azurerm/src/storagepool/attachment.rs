//! Managed disk attachments of a disk pool
//!
//! The API has no attachment object: the pool carries the list of its disks.
//! Attaching or detaching one disk is therefore a read-modify-write of that
//! list, serialized by the advisory lock on the pool ID and finished only once
//! the pool's `provisioningState` is back to `Succeeded`.

use std::sync::Arc;

use log::{debug, info};
use thiserror::Error;

use cirrus_core::composite_id::TypedCompositeId;
use cirrus_core::config::{Operation, PollSettings, Timeouts};
use cirrus_core::convergence::{self, ConvergenceTarget};
use cirrus_core::error::{BoxError, ParseError};
use cirrus_core::poller::OperationPoller;
use cirrus_core::provider::ProviderError;
use cirrus_core::resource_id::TypedResourceId;
use cirrus_core::retry::{ANOTHER_OPERATION_IN_PROGRESS, RESOURCE_NOT_YET_SYNCED, RetryClassifier};
use cirrus_lock::{LockBackend, LockError, with_lock};
use tokio::time::Instant;

use super::client::{
    Disk, DiskPool, DiskPoolUpdate, DiskPoolsClient, PROVISIONING_PENDING,
    PROVISIONING_SUCCEEDED, UpdateRequest, UpdateTransport,
};
use super::ids::{DiskPoolId, DiskPoolManagedDiskAttachmentId, ManagedDiskId};

/// Transient errors returned while a pool is busy with another update
pub const DISK_POOL_RETRY: RetryClassifier =
    RetryClassifier::new(&[ANOTHER_OPERATION_IN_PROGRESS, RESOURCE_NOT_YET_SYNCED]);

pub const ATTACHMENT_TIMEOUTS: Timeouts = Timeouts::from_minutes(30, 5, 30, 30);

#[derive(Debug, Error)]
pub enum AttachmentError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Lock(#[from] LockError),

    #[error("retrieving {pool}: {source}")]
    Retrieve {
        pool: String,
        #[source]
        source: BoxError,
    },

    #[error("{0} was not found")]
    PoolNotFound(String),

    #[error("managed disk {disk} is already attached to {pool}")]
    AlreadyAttached { pool: String, disk: String },

    #[error("{context}: {source}")]
    Operation {
        context: String,
        #[source]
        source: cirrus_core::Error,
    },
}

impl AttachmentError {
    /// Whether the provider may still be applying the change
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Operation { source, .. } if source.is_deadline_exceeded())
    }
}

impl From<AttachmentError> for ProviderError {
    fn from(error: AttachmentError) -> Self {
        match error {
            AttachmentError::Operation { context, source } => ProviderError::wrap(context, source),
            other => ProviderError::new(other.to_string()).with_cause(other),
        }
    }
}

/// An existing attachment
#[derive(Debug, Clone, PartialEq)]
pub struct ManagedDiskAttachment {
    pub id: DiskPoolManagedDiskAttachmentId,
}

/// Handler for `disk_pool_managed_disk_attachment`
pub struct ManagedDiskAttachmentResource<C: ?Sized> {
    client: Arc<C>,
    locks: Arc<dyn LockBackend>,
    settings: PollSettings,
    timeouts: Timeouts,
}

impl<C: DiskPoolsClient + ?Sized> ManagedDiskAttachmentResource<C> {
    pub fn new(client: Arc<C>, locks: Arc<dyn LockBackend>, settings: PollSettings) -> Self {
        Self {
            client,
            locks,
            settings,
            timeouts: ATTACHMENT_TIMEOUTS,
        }
    }

    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn timeouts(&self) -> Timeouts {
        self.timeouts
    }

    /// Attach `managed_disk_id` to `disk_pool_id`
    pub async fn create(
        &self,
        disk_pool_id: &str,
        managed_disk_id: &str,
    ) -> Result<DiskPoolManagedDiskAttachmentId, AttachmentError> {
        let deadline = self.timeouts.deadline(Operation::Create);
        let pool_id = DiskPoolId::parse(disk_pool_id)?;
        let disk_id = ManagedDiskId::parse(managed_disk_id)?;
        let id = DiskPoolManagedDiskAttachmentId::new(pool_id, disk_id);

        let key = id.disk_pool_id.id();
        with_lock(self.locks.as_ref(), &key, "attach managed disk", async {
            let pool = self.get_pool(&id.disk_pool_id).await?;
            let disk = id.managed_disk_id.id();
            if pool.disks().iter().any(|d| d.refers_to(&disk)) {
                return Err(AttachmentError::AlreadyAttached {
                    pool: id.disk_pool_id.id(),
                    disk,
                });
            }

            let mut disks = pool.disks().to_vec();
            disks.push(Disk::new(disk));
            self.update_disks(&id.disk_pool_id, disks, "attaching", deadline)
                .await
        })
        .await?;

        info!("attached {}", id);
        Ok(id)
    }

    /// Look up an attachment, `None` when the pool or the disk link is gone
    pub async fn read(
        &self,
        id: &str,
    ) -> Result<Option<ManagedDiskAttachment>, AttachmentError> {
        let id = DiskPoolManagedDiskAttachmentId::parse(id)?;

        let pool = match self.client.get(&id.disk_pool_id).await {
            Ok(Some(pool)) => pool,
            Ok(None) => {
                debug!("{} was not found", id.disk_pool_id);
                return Ok(None);
            }
            Err(source) => {
                return Err(AttachmentError::Retrieve {
                    pool: id.disk_pool_id.id(),
                    source,
                });
            }
        };

        let disk = id.managed_disk_id.id();
        if pool.disks().iter().any(|d| d.refers_to(&disk)) {
            Ok(Some(ManagedDiskAttachment { id }))
        } else {
            debug!("{} is no longer attached to {}", disk, id.disk_pool_id);
            Ok(None)
        }
    }

    /// Detach the managed disk; detaching an absent disk succeeds
    pub async fn delete(&self, id: &str) -> Result<(), AttachmentError> {
        let deadline = self.timeouts.deadline(Operation::Delete);
        let id = DiskPoolManagedDiskAttachmentId::parse(id)?;

        let key = id.disk_pool_id.id();
        with_lock(self.locks.as_ref(), &key, "detach managed disk", async {
            let pool = match self.get_pool(&id.disk_pool_id).await {
                Ok(pool) => pool,
                Err(AttachmentError::PoolNotFound(_)) => return Ok(()),
                Err(e) => return Err(e),
            };

            let disk = id.managed_disk_id.id();
            let remaining: Vec<Disk> = pool
                .disks()
                .iter()
                .filter(|d| !d.refers_to(&disk))
                .cloned()
                .collect();
            if remaining.len() == pool.disks().len() {
                debug!("{} is not attached to {}", disk, id.disk_pool_id);
                return Ok(());
            }

            self.update_disks(&id.disk_pool_id, remaining, "detaching", deadline)
                .await
        })
        .await?;

        info!("detached {}", id);
        Ok(())
    }

    async fn get_pool(&self, id: &DiskPoolId) -> Result<DiskPool, AttachmentError> {
        self.client
            .get(id)
            .await
            .map_err(|source| AttachmentError::Retrieve {
                pool: id.id(),
                source,
            })?
            .ok_or_else(|| AttachmentError::PoolNotFound(id.id()))
    }

    async fn provisioning_state(&self, id: &DiskPoolId) -> Result<Option<String>, BoxError> {
        let pool = self.client.get(id).await?;
        Ok(pool.and_then(|p| p.properties.provisioning_state))
    }

    /// Replace the pool's disk list and wait until the pool has settled
    async fn update_disks(
        &self,
        pool_id: &DiskPoolId,
        disks: Vec<Disk>,
        verb: &str,
        deadline: Instant,
    ) -> Result<(), AttachmentError> {
        let context = format!("{} managed disks of {}", verb, pool_id);
        let operation_error = |source: cirrus_core::Error| AttachmentError::Operation {
            context: context.clone(),
            source,
        };

        let transport = UpdateTransport::new(self.client.as_ref());
        let request = UpdateRequest {
            id: pool_id.clone(),
            update: DiskPoolUpdate::disks(disks),
        };
        OperationPoller::new(&transport, &self.settings)
            .with_classifier(DISK_POOL_RETRY)
            .described_as(context.clone())
            .submit_and_wait(&request, deadline)
            .await
            .map_err(operation_error)?;

        let target = ConvergenceTarget::new(
            PROVISIONING_PENDING.iter().map(|s| s.to_string()),
            PROVISIONING_SUCCEEDED.to_string(),
        )
        .described_as(format!("waiting for {} to finish updating", pool_id));
        convergence::wait(
            || self.provisioning_state(pool_id),
            &target,
            deadline,
            self.settings.convergence_interval(),
        )
        .await
        .map_err(operation_error)?;

        Ok(())
    }
}
