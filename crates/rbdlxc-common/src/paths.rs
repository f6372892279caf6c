//! Host paths consumed by rbdlxc.

use std::path::PathBuf;

use once_cell::sync::Lazy;

use crate::id::VolumeId;

/// Default LXC container root (default: /var/lib/lxc).
pub static LXC_ROOT: Lazy<PathBuf> = Lazy::new(|| {
    std::env::var("LXC_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/var/lib/lxc"))
});

/// Default sysfs mount point (default: /sys).
pub static SYSFS_ROOT: Lazy<PathBuf> = Lazy::new(|| {
    std::env::var("RBDLXC_SYSFS_ROOT")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/sys"))
});

/// Live mount table.
pub const PROC_MOUNTS: &str = "/proc/mounts";

/// Paths of the kernel interfaces and directories rbdlxc touches.
#[derive(Debug, Clone)]
pub struct HostPaths {
    /// Directory holding one root per container (default: /var/lib/lxc).
    pub lxc_root: PathBuf,
    /// Sysfs mount point (default: /sys).
    pub sysfs: PathBuf,
    /// Mount table to read (default: /proc/mounts).
    pub mounts: PathBuf,
}

impl HostPaths {
    /// Create paths with default locations.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a different LXC root.
    #[must_use]
    pub fn with_lxc_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.lxc_root = root.into();
        self
    }

    /// Use a different sysfs mount point.
    #[must_use]
    pub fn with_sysfs(mut self, sysfs: impl Into<PathBuf>) -> Self {
        self.sysfs = sysfs.into();
        self
    }

    /// Use a different mount table.
    #[must_use]
    pub fn with_mounts(mut self, mounts: impl Into<PathBuf>) -> Self {
        self.mounts = mounts.into();
        self
    }

    /// Root filesystem mount point of a container.
    #[must_use]
    pub fn container_root(&self, name: &str) -> PathBuf {
        self.lxc_root.join(name)
    }

    /// Kernel rbd bus directory.
    #[must_use]
    pub fn rbd_bus(&self) -> PathBuf {
        self.sysfs.join("bus/rbd")
    }

    /// Attach control file, single-major interface.
    #[must_use]
    pub fn rbd_add_single_major(&self) -> PathBuf {
        self.rbd_bus().join("add_single_major")
    }

    /// Attach control file, legacy interface.
    #[must_use]
    pub fn rbd_add(&self) -> PathBuf {
        self.rbd_bus().join("add")
    }

    /// Detach control file, single-major interface.
    #[must_use]
    pub fn rbd_remove_single_major(&self) -> PathBuf {
        self.rbd_bus().join("remove_single_major")
    }

    /// Detach control file, legacy interface.
    #[must_use]
    pub fn rbd_remove(&self) -> PathBuf {
        self.rbd_bus().join("remove")
    }

    /// Directory listing attached volume ids.
    #[must_use]
    pub fn rbd_devices(&self) -> PathBuf {
        self.rbd_bus().join("devices")
    }

    /// Pool attribute of an attached volume.
    #[must_use]
    pub fn rbd_pool(&self, id: VolumeId) -> PathBuf {
        self.sysfs
            .join("devices/rbd")
            .join(id.to_string())
            .join("pool")
    }
}

impl Default for HostPaths {
    fn default() -> Self {
        Self {
            lxc_root: LXC_ROOT.clone(),
            sysfs: SYSFS_ROOT.clone(),
            mounts: PathBuf::from(PROC_MOUNTS),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kernel_interface_paths() {
        let paths = HostPaths::new().with_sysfs("/sys");
        assert_eq!(
            paths.rbd_add_single_major(),
            PathBuf::from("/sys/bus/rbd/add_single_major")
        );
        assert_eq!(paths.rbd_add(), PathBuf::from("/sys/bus/rbd/add"));
        assert_eq!(
            paths.rbd_remove_single_major(),
            PathBuf::from("/sys/bus/rbd/remove_single_major")
        );
        assert_eq!(paths.rbd_remove(), PathBuf::from("/sys/bus/rbd/remove"));
        assert_eq!(paths.rbd_devices(), PathBuf::from("/sys/bus/rbd/devices"));
        assert_eq!(
            paths.rbd_pool(VolumeId::new(3)),
            PathBuf::from("/sys/devices/rbd/3/pool")
        );
    }

    #[test]
    fn container_root() {
        let paths = HostPaths::new().with_lxc_root("/var/lib/lxc");
        assert_eq!(
            paths.container_root("web1"),
            PathBuf::from("/var/lib/lxc/web1")
        );
    }

    #[test]
    fn custom_roots() {
        let paths = HostPaths::new()
            .with_sysfs("/tmp/sys")
            .with_mounts("/tmp/mounts");
        assert_eq!(paths.rbd_add(), PathBuf::from("/tmp/sys/bus/rbd/add"));
        assert_eq!(paths.mounts, PathBuf::from("/tmp/mounts"));
    }
}
