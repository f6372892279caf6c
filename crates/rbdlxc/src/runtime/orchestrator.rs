//! Bring-up, release and migration of rbd-backed containers.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use rbdlxc_common::{ContainerName, HostPaths, RbdlxcError, RbdlxcResult};
use tokio::task::JoinHandle;

use super::config::OrchestratorConfig;
use super::lifecycle::{ContainerRuntime, LifecyclePhase, TransitionLocks};
use super::peer::PeerClient;
use super::record::ContainerRecord;
use super::state::ContainerState;
use crate::filesystem::{MountController, MountTable, Mounter};
use crate::volume::VolumeController;

/// Result of [`Orchestrator::bring_up`].
#[derive(Debug)]
pub struct BringUp {
    /// Device backing the container root.
    pub device: String,
    /// Whether this call attached and mounted the volume.
    pub attached: bool,
    /// Background start, when the container was stopped.
    pub start: Option<JoinHandle<()>>,
}

/// Result of [`Orchestrator::bring_down`].
#[derive(Debug)]
pub enum BringDown {
    /// Release runs in the background.
    Initiated(JoinHandle<RbdlxcResult<()>>),
    /// Nothing to do.
    AlreadyStopped,
}

/// Result of [`Orchestrator::move_to`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Move {
    /// The target is this host.
    AlreadyLocal,
    /// Released here and accepted by the target.
    Relocated,
}

struct Inner {
    runtime: Arc<dyn ContainerRuntime>,
    volumes: VolumeController,
    mounts: MountController,
    peers: PeerClient,
    locks: TransitionLocks,
    local_host: String,
    config: OrchestratorConfig,
}

/// Drives containers through attach, mount, start and back.
///
/// Cheap to clone; clones share the transition locks.
#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<Inner>,
}

impl fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Orchestrator")
            .field("local_host", &self.inner.local_host)
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    /// Create an orchestrator for the host known as `local_host`.
    ///
    /// # Errors
    ///
    /// Returns an error if the peer HTTP client cannot be built.
    pub fn new(
        runtime: Arc<dyn ContainerRuntime>,
        volumes: VolumeController,
        mounter: Arc<dyn Mounter>,
        local_host: impl Into<String>,
        config: OrchestratorConfig,
    ) -> RbdlxcResult<Self> {
        let peers = PeerClient::new(config.peer_timeout)?;
        let mounts = MountController::with_policy(mounter, config.retry);

        Ok(Self {
            inner: Arc::new(Inner {
                runtime,
                volumes,
                mounts,
                peers,
                locks: TransitionLocks::new(),
                local_host: local_host.into(),
                config,
            }),
        })
    }

    /// Name this host answers to.
    #[must_use]
    pub fn local_host(&self) -> &str {
        &self.inner.local_host
    }

    /// Host paths in use.
    #[must_use]
    pub fn paths(&self) -> &HostPaths {
        &self.inner.config.paths
    }

    async fn mount_table(&self) -> MountTable {
        MountTable::load(&self.paths().mounts).await
    }

    async fn compose(&self, name: &str, mounts: &MountTable) -> RbdlxcResult<ContainerRecord> {
        ContainerRecord::compose(
            name,
            self.paths().container_root(name),
            self.inner.runtime.as_ref(),
            mounts,
            &self.inner.volumes,
        )
        .await
    }

    /// Records for every defined container, or only for `filter`.
    ///
    /// # Errors
    ///
    /// Returns an error if the runtime cannot list or inspect containers.
    pub async fn list(&self, filter: Option<&str>) -> RbdlxcResult<Vec<ContainerRecord>> {
        let names = self.inner.runtime.list().await?;
        let mounts = self.mount_table().await;

        let mut records = Vec::with_capacity(names.len());
        for name in names.iter().filter(|n| filter.is_none_or(|f| f == n.as_str())) {
            records.push(self.compose(name, &mounts).await?);
        }
        Ok(records)
    }

    /// Fresh record for `name`, or `None` if no such container exists.
    ///
    /// # Errors
    ///
    /// Returns an error for an invalid name or a failing runtime.
    pub async fn record(&self, name: &str) -> RbdlxcResult<Option<ContainerRecord>> {
        let name = ContainerName::new(name)?;
        if !self.exists(name.as_str()).await? {
            return Ok(None);
        }
        let mounts = self.mount_table().await;
        self.compose(name.as_str(), &mounts).await.map(Some)
    }

    async fn exists(&self, name: &str) -> RbdlxcResult<bool> {
        Ok(self.inner.runtime.list().await?.iter().any(|n| n == name))
    }

    /// Attach the image `name` from `pool`, mount it as the container root and
    /// start the container if it is stopped.
    ///
    /// A root that is already mounted is reused as is. The start runs in the
    /// background; this returns once the root is mounted. The work runs on
    /// its own task, so dropping the returned future does not interrupt it.
    ///
    /// # Errors
    ///
    /// Attach and mount failures, and [`RbdlxcError::ContainerNotFound`] if
    /// the runtime does not know the container once its root is mounted.
    /// A failed mount detaches the freshly attached volume again.
    pub async fn bring_up(&self, name: &str, pool: &str, fstype: &str) -> RbdlxcResult<BringUp> {
        let name = ContainerName::new(name)?;
        let this = self.clone();
        let (pool, fstype) = (pool.to_string(), fstype.to_string());

        run_detached("bring-up", async move {
            this.bring_up_locked(name.as_str(), &pool, &fstype).await
        })
        .await
    }

    async fn bring_up_locked(&self, name: &str, pool: &str, fstype: &str) -> RbdlxcResult<BringUp> {
        let _guard = self.inner.locks.acquire(name).await;

        let root = self.paths().container_root(name);
        let mounted = self.mount_table().await.device_at(&root).map(String::from);

        let (device, attached) = match mounted {
            Some(device) => {
                tracing::info!(
                    container = name,
                    device = %device,
                    "Container root already mounted, skipping attach"
                );
                (device, false)
            }
            None => (self.attach_and_mount(name, pool, fstype, &root).await?, true),
        };

        // The container definition lives on the volume; only look it up once
        // the root is mounted.
        if !self.exists(name).await? {
            return Err(RbdlxcError::not_found(name));
        }

        let state = self.inner.runtime.state(name).await?;
        let start = if state.is_stopped() {
            Some(self.spawn_start(name))
        } else {
            tracing::debug!(container = name, state = %state, "Container not stopped, not starting");
            None
        };

        Ok(BringUp {
            device,
            attached,
            start,
        })
    }

    async fn attach_and_mount(
        &self,
        name: &str,
        pool: &str,
        fstype: &str,
        root: &Path,
    ) -> RbdlxcResult<String> {
        tracing::info!(container = name, pool, phase = %LifecyclePhase::Attaching, "Bringing container up");
        let id = self.inner.volumes.attach(pool, name).await?;
        let device = id.device_path();

        tracing::info!(container = name, device = %device, phase = %LifecyclePhase::Mounting, "Mounting container root");
        if let Err(e) = self.inner.mounts.mount_root(&device, root, fstype).await {
            if let Err(detach) = self.inner.volumes.detach(&device).await {
                tracing::warn!(device = %device, error = %detach, "Cannot detach after failed mount");
            }
            return Err(e);
        }

        Ok(device)
    }

    /// Start `name` in the background. Failures are logged.
    pub fn spawn_start(&self, name: &str) -> JoinHandle<()> {
        let runtime = Arc::clone(&self.inner.runtime);
        let name = name.to_string();

        tokio::spawn(async move {
            tracing::info!(container = %name, phase = %LifecyclePhase::Starting, "Starting container");
            match runtime.start(&name).await {
                Ok(()) => tracing::info!(container = %name, "Container started"),
                Err(e) => tracing::error!(container = %name, error = %e, "Container start failed"),
            }
        })
    }

    /// Release a running container in the background.
    ///
    /// # Errors
    ///
    /// [`RbdlxcError::ContainerNotFound`] for unknown containers and
    /// [`RbdlxcError::Conflict`] for containers neither running nor stopped.
    pub async fn bring_down(&self, name: &str) -> RbdlxcResult<BringDown> {
        let record = self
            .record(name)
            .await?
            .ok_or_else(|| RbdlxcError::not_found(name))?;

        match record.status {
            ContainerState::Running => Ok(BringDown::Initiated(self.spawn_release(&record.name))),
            ContainerState::Stopped => Ok(BringDown::AlreadyStopped),
            state => Err(RbdlxcError::Conflict {
                name: record.name,
                state: state.to_string(),
            }),
        }
    }

    /// Run [`Orchestrator::release`] in the background. Failures are logged.
    pub fn spawn_release(&self, name: &str) -> JoinHandle<RbdlxcResult<()>> {
        let this = self.clone();
        let name = name.to_string();

        tokio::spawn(async move {
            let result = this.release(&name).await;
            if let Err(e) = &result {
                tracing::error!(container = %name, error = %e, "Container release failed");
            }
            result
        })
    }

    /// Shut `name` down, unmount its root and detach its volume.
    ///
    /// The container is re-inspected after taking its lock; one that is no
    /// longer running is left alone.
    ///
    /// # Errors
    ///
    /// The first failing step; later steps are not attempted.
    pub async fn release(&self, name: &str) -> RbdlxcResult<()> {
        let _guard = self.inner.locks.acquire(name).await;

        match self.record(name).await? {
            Some(record) if record.status.is_running() => self.release_record(&record).await,
            Some(record) => {
                tracing::debug!(container = name, state = %record.status, "Not running, nothing to release");
                Ok(())
            }
            None => Err(RbdlxcError::not_found(name)),
        }
    }

    async fn release_record(&self, record: &ContainerRecord) -> RbdlxcResult<()> {
        let name = record.name.as_str();

        tracing::info!(container = name, phase = %LifecyclePhase::ShuttingDown, "Shutting container down");
        self.inner
            .runtime
            .shutdown(name, self.inner.config.shutdown_timeout)
            .await?;

        let Some(device) = record.device.as_deref() else {
            tracing::warn!(container = name, "No device mounted on container root, nothing to detach");
            return Ok(());
        };

        tracing::info!(container = name, phase = %LifecyclePhase::Unmounting, "Unmounting container root");
        self.inner.mounts.unmount_root(&record.mount).await?;

        tracing::info!(container = name, device, phase = %LifecyclePhase::Detaching, "Detaching volume");
        self.inner.volumes.detach(device).await?;

        tracing::info!(container = name, "Container released");
        Ok(())
    }

    /// Move a running container to `host`.
    ///
    /// Releases it here, then asks the daemon on `host:port` to bring it up
    /// from the same pool. If the peer refuses, the container stays down on
    /// both hosts. Once started, the move runs to completion on its own task
    /// even if the returned future is dropped.
    ///
    /// # Errors
    ///
    /// [`RbdlxcError::ContainerNotFound`] unless the container is running
    /// here, [`RbdlxcError::PoolUnknown`] if its pool cannot be determined,
    /// release failures, and [`RbdlxcError::RemoteRejected`].
    pub async fn move_to(&self, name: &str, host: &str, port: u16) -> RbdlxcResult<Move> {
        if host.eq_ignore_ascii_case(self.local_host()) {
            tracing::info!(container = name, host, "Move target is this host");
            return Ok(Move::AlreadyLocal);
        }

        let name = ContainerName::new(name)?;
        let this = self.clone();
        let host = host.to_string();

        run_detached("move", async move {
            this.move_locked(name.as_str(), &host, port).await
        })
        .await
    }

    async fn move_locked(&self, name: &str, host: &str, port: u16) -> RbdlxcResult<Move> {
        let _guard = self.inner.locks.acquire(name).await;

        let record = self
            .record(name)
            .await?
            .filter(|r| r.status.is_running())
            .ok_or_else(|| RbdlxcError::not_found(name))?;
        let pool = record
            .pool
            .clone()
            .ok_or_else(|| RbdlxcError::PoolUnknown {
                name: name.to_string(),
            })?;

        tracing::info!(container = name, host, port, pool = %pool, phase = %LifecyclePhase::Migrating, "Moving container");
        self.release_record(&record).await?;

        if let Err(e) = self
            .inner
            .peers
            .request_bring_up(host, port, &pool, name)
            .await
        {
            tracing::error!(container = name, host, error = %e, "Peer refused bring-up, container is down");
            return Err(e);
        }

        tracing::info!(container = name, host, "Container moved");
        Ok(Move::Relocated)
    }
}

/// Drive `task` on its own tokio task and wait for it.
async fn run_detached<T, F>(what: &str, task: F) -> RbdlxcResult<T>
where
    T: Send + 'static,
    F: Future<Output = RbdlxcResult<T>> + Send + 'static,
{
    tokio::spawn(task).await.map_err(|e| RbdlxcError::Internal {
        message: format!("{what} task failed: {e}"),
    })?
}
