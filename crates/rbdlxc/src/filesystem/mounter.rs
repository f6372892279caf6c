//! Mount operations for container roots.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rbdlxc_common::{RbdlxcError, RbdlxcResult};
use rustix::io::Errno;

use super::retry::RetryPolicy;

/// Raw mount syscalls.
pub trait Mounter: Send + Sync + fmt::Debug {
    /// Mount `source` of type `fstype` on `target` without access-time
    /// updates.
    fn mount(&self, source: &Path, target: &Path, fstype: &str) -> Result<(), Errno>;

    /// Unmount `target`.
    fn unmount(&self, target: &Path) -> Result<(), Errno>;
}

/// [`Mounter`] issuing real `mount(2)`/`umount2(2)` calls.
#[derive(Debug, Clone, Copy, Default)]
pub struct SyscallMounter;

impl Mounter for SyscallMounter {
    fn mount(&self, source: &Path, target: &Path, fstype: &str) -> Result<(), Errno> {
        use rustix::mount::{MountFlags, mount};

        tracing::debug!(
            source = %source.display(),
            target = %target.display(),
            fstype,
            "Mounting filesystem"
        );

        mount(source, target, fstype, MountFlags::NOATIME, None)
    }

    fn unmount(&self, target: &Path) -> Result<(), Errno> {
        use rustix::mount::{UnmountFlags, unmount};

        tracing::debug!(target = %target.display(), "Unmounting filesystem");

        unmount(target, UnmountFlags::empty())
    }
}

/// Errnos meaning the freshly attached device is not ready yet.
const MOUNT_RETRYABLE: &[Errno] = &[Errno::NODEV];

/// Errnos meaning the container's processes still hold the root.
const UNMOUNT_RETRYABLE: &[Errno] = &[Errno::BUSY];

/// Run one mount syscall on the blocking pool.
async fn blocking<F>(call: F) -> Result<(), Errno>
where
    F: FnOnce() -> Result<(), Errno> + Send + 'static,
{
    tokio::task::spawn_blocking(call).await.unwrap_or_else(|e| {
        tracing::error!(error = %e, "Mount task failed");
        Err(Errno::IO)
    })
}

/// Mounts and unmounts container roots, riding out transient kernel errors.
#[derive(Debug, Clone)]
pub struct MountController {
    mounter: Arc<dyn Mounter>,
    policy: RetryPolicy,
}

impl MountController {
    /// Create a controller with the default retry policy.
    #[must_use]
    pub fn new(mounter: Arc<dyn Mounter>) -> Self {
        Self::with_policy(mounter, RetryPolicy::default())
    }

    /// Create a controller with a custom retry policy.
    #[must_use]
    pub fn with_policy(mounter: Arc<dyn Mounter>, policy: RetryPolicy) -> Self {
        Self { mounter, policy }
    }

    /// Mount `device` on `root`, creating `root` first.
    ///
    /// Each attempt runs on the blocking pool. `ENODEV` right after an attach
    /// means the device is not ready; it is retried at a fixed interval. Any
    /// other errno fails immediately.
    ///
    /// # Errors
    ///
    /// [`RbdlxcError::Mount`] for fatal errors (including failing to create
    /// `root`), [`RbdlxcError::RetryExhausted`] past the retry ceiling.
    pub async fn mount_root(&self, device: &str, root: &Path, fstype: &str) -> RbdlxcResult<()> {
        let mount_error = |source| RbdlxcError::Mount {
            device: device.to_string(),
            target: root.to_path_buf(),
            source,
        };

        tokio::fs::create_dir_all(root).await.map_err(mount_error)?;

        let attempts = self
            .policy
            .run(MOUNT_RETRYABLE, || {
                let mounter = Arc::clone(&self.mounter);
                let source = PathBuf::from(device);
                let target = root.to_path_buf();
                let fstype = fstype.to_string();
                blocking(move || mounter.mount(&source, &target, &fstype))
            })
            .await
            .map_err(|failure| failure.into_error("mount", root, mount_error))?;

        tracing::info!(
            device,
            target = %root.display(),
            fstype,
            attempts,
            "Container root mounted"
        );
        Ok(())
    }

    /// Unmount `root`.
    ///
    /// `EBUSY` while the container is still exiting is retried at a fixed
    /// interval. Any other errno fails immediately.
    ///
    /// # Errors
    ///
    /// [`RbdlxcError::Unmount`] for fatal errors,
    /// [`RbdlxcError::RetryExhausted`] past the retry ceiling.
    pub async fn unmount_root(&self, root: &Path) -> RbdlxcResult<()> {
        let attempts = self
            .policy
            .run(UNMOUNT_RETRYABLE, || {
                let mounter = Arc::clone(&self.mounter);
                let target = root.to_path_buf();
                blocking(move || mounter.unmount(&target))
            })
            .await
            .map_err(|failure| {
                failure.into_error("unmount", root, |source| RbdlxcError::Unmount {
                    target: root.to_path_buf(),
                    source,
                })
            })?;

        tracing::info!(target = %root.display(), attempts, "Container root unmounted");
        Ok(())
    }
}
