//! Attach and detach rbd volumes.

use std::sync::Arc;

use rbdlxc_common::{ClusterEndpoint, RbdlxcError, RbdlxcResult, VolumeId};
use tokio::sync::Mutex;

use super::bus::RbdBus;

/// Issues attach/detach commands and resolves the device an attach produced.
#[derive(Debug)]
pub struct VolumeController {
    endpoint: ClusterEndpoint,
    bus: Arc<dyn RbdBus>,
    /// Held across the snapshot/add/snapshot window of every attach.
    attach_lock: Mutex<()>,
}

impl VolumeController {
    /// Create a controller talking to `endpoint` through `bus`.
    #[must_use]
    pub fn new(endpoint: ClusterEndpoint, bus: Arc<dyn RbdBus>) -> Self {
        Self {
            endpoint,
            bus,
            attach_lock: Mutex::new(()),
        }
    }

    /// Attach `pool/image` and return the id of the new device.
    ///
    /// Attaches from this process are serialized, so two of them never
    /// share a snapshot window. Attaches made outside this process can still
    /// land inside the window and be picked up instead of ours.
    ///
    /// # Errors
    ///
    /// [`RbdlxcError::Attach`] when the control file is missing or refuses
    /// the command, [`RbdlxcError::DeviceNotResolved`] when no new id
    /// appeared.
    pub async fn attach(&self, pool: &str, image: &str) -> RbdlxcResult<VolumeId> {
        let _window = self.attach_lock.lock().await;

        tracing::info!(pool, image, "Attaching rbd volume");

        let bus = Arc::clone(&self.bus);
        let command = self.endpoint.attach_command(pool, image);
        let (before, written, after) = tokio::task::spawn_blocking(move || {
            let before = bus.snapshot();
            let written = bus.add(&command);
            let after = bus.snapshot();
            (before, written, after)
        })
        .await
        .map_err(|e| RbdlxcError::Internal {
            message: format!("attach task failed: {e}"),
        })?;

        written.map_err(|source| RbdlxcError::Attach {
            pool: pool.to_string(),
            image: image.to_string(),
            source,
        })?;

        let id = before
            .newly_attached(&after)
            .ok_or_else(|| RbdlxcError::DeviceNotResolved {
                pool: pool.to_string(),
                image: image.to_string(),
            })?;

        tracing::info!(pool, image, volume_id = %id, device = %id.device_path(), "Volume attached");
        Ok(id)
    }

    /// Detach the volume behind `device`.
    ///
    /// The device must already be unmounted; the kernel rejects the detach
    /// otherwise.
    ///
    /// # Errors
    ///
    /// [`RbdlxcError::InvalidDevice`] if `device` is not `/dev/rbd<id>`,
    /// [`RbdlxcError::Detach`] if the control file write fails.
    pub async fn detach(&self, device: &str) -> RbdlxcResult<()> {
        let id = VolumeId::from_device_path(device)?;

        tracing::info!(device, volume_id = %id, "Detaching rbd volume");

        let bus = Arc::clone(&self.bus);
        tokio::task::spawn_blocking(move || bus.remove(id))
            .await
            .map_err(|e| RbdlxcError::Internal {
                message: format!("detach task failed: {e}"),
            })?
            .map_err(|source| RbdlxcError::Detach {
                device: device.to_string(),
                source,
            })?;

        tracing::debug!(device, "Volume detached");
        Ok(())
    }

    /// Pool of an attached volume, if the kernel exposes it.
    pub async fn pool_of(&self, id: VolumeId) -> Option<String> {
        let bus = Arc::clone(&self.bus);
        let pool = tokio::task::spawn_blocking(move || bus.pool(id)).await.ok()?;
        match pool {
            Ok(pool) => Some(pool.trim().to_string()).filter(|p| !p.is_empty()),
            Err(e) => {
                tracing::debug!(volume_id = %id, error = %e, "Pool attribute unavailable");
                None
            }
        }
    }

    /// Currently attached volumes.
    pub async fn attached(&self) -> RbdlxcResult<Vec<VolumeId>> {
        let bus = Arc::clone(&self.bus);
        let snapshot = tokio::task::spawn_blocking(move || bus.snapshot())
            .await
            .map_err(|e| RbdlxcError::Internal {
                message: format!("registry task failed: {e}"),
            })?;
        Ok(snapshot.ids().to_vec())
    }
}
