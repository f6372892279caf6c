//! Kernel rbd bus control interface.

use std::fmt;
use std::io::{self, Write};
use std::path::Path;

use rbdlxc_common::{HostPaths, VolumeId};

use super::registry::RegistrySnapshot;

/// The kernel rbd driver as seen from userspace.
///
/// Attach and detach are opaque writes; the driver reports what it did only
/// through the device listing.
pub trait RbdBus: Send + Sync + fmt::Debug {
    /// Currently attached volume ids.
    fn snapshot(&self) -> RegistrySnapshot;

    /// Hand an attach command to the driver.
    fn add(&self, command: &str) -> io::Result<()>;

    /// Ask the driver to release a volume.
    fn remove(&self, id: VolumeId) -> io::Result<()>;

    /// Raw pool attribute of an attached volume.
    fn pool(&self, id: VolumeId) -> io::Result<String>;
}

/// [`RbdBus`] backed by `/sys/bus/rbd`.
#[derive(Debug, Clone)]
pub struct SysfsBus {
    paths: HostPaths,
}

impl SysfsBus {
    /// Bus rooted at `paths.sysfs`.
    #[must_use]
    pub const fn new(paths: HostPaths) -> Self {
        Self { paths }
    }
}

impl RbdBus for SysfsBus {
    fn snapshot(&self) -> RegistrySnapshot {
        RegistrySnapshot::read(&self.paths.rbd_devices())
    }

    fn add(&self, command: &str) -> io::Result<()> {
        write_control(
            &self.paths.rbd_add_single_major(),
            &self.paths.rbd_add(),
            command,
        )
    }

    fn remove(&self, id: VolumeId) -> io::Result<()> {
        write_control(
            &self.paths.rbd_remove_single_major(),
            &self.paths.rbd_remove(),
            &id.to_string(),
        )
    }

    fn pool(&self, id: VolumeId) -> io::Result<String> {
        std::fs::read_to_string(self.paths.rbd_pool(id))
    }
}

/// Write `payload` to `primary`, or to `fallback` when `primary` does not
/// exist. Any other failure opening `primary` is returned as is.
fn write_control(primary: &Path, fallback: &Path, payload: &str) -> io::Result<()> {
    let open = |path: &Path| std::fs::OpenOptions::new().write(true).open(path);

    let (path, mut file) = match open(primary) {
        Ok(file) => (primary, file),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            tracing::debug!(
                primary = %primary.display(),
                fallback = %fallback.display(),
                "Single-major interface missing, using legacy control file"
            );
            (fallback, open(fallback)?)
        }
        Err(e) => return Err(e),
    };

    tracing::trace!(path = %path.display(), "Writing rbd control command");
    file.write_all(payload.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bus_in(temp: &tempfile::TempDir) -> (SysfsBus, HostPaths) {
        let paths = HostPaths::new().with_sysfs(temp.path());
        std::fs::create_dir_all(paths.rbd_bus()).unwrap();
        (SysfsBus::new(paths.clone()), paths)
    }

    #[test]
    fn prefers_single_major() {
        let temp = tempfile::tempdir().unwrap();
        let (bus, paths) = bus_in(&temp);
        std::fs::write(paths.rbd_add_single_major(), "").unwrap();
        std::fs::write(paths.rbd_add(), "").unwrap();

        bus.add("cmd").unwrap();

        assert_eq!(
            std::fs::read_to_string(paths.rbd_add_single_major()).unwrap(),
            "cmd"
        );
        assert_eq!(std::fs::read_to_string(paths.rbd_add()).unwrap(), "");
    }

    #[test]
    fn falls_back_when_single_major_missing() {
        let temp = tempfile::tempdir().unwrap();
        let (bus, paths) = bus_in(&temp);
        std::fs::write(paths.rbd_remove(), "").unwrap();

        bus.remove(VolumeId::new(7)).unwrap();

        assert_eq!(std::fs::read_to_string(paths.rbd_remove()).unwrap(), "7");
    }

    #[test]
    fn missing_both_interfaces_is_not_found() {
        let temp = tempfile::tempdir().unwrap();
        let (bus, _) = bus_in(&temp);

        let err = bus.add("cmd").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn other_primary_errors_do_not_fall_back() {
        let temp = tempfile::tempdir().unwrap();
        let (bus, paths) = bus_in(&temp);
        // A directory cannot be opened for writing.
        std::fs::create_dir(paths.rbd_add_single_major()).unwrap();
        std::fs::write(paths.rbd_add(), "").unwrap();

        assert!(bus.add("cmd").is_err());
        assert_eq!(std::fs::read_to_string(paths.rbd_add()).unwrap(), "");
    }

    #[test]
    fn reads_pool_attribute() {
        let temp = tempfile::tempdir().unwrap();
        let (bus, paths) = bus_in(&temp);
        let pool = paths.rbd_pool(VolumeId::new(3));
        std::fs::create_dir_all(pool.parent().unwrap()).unwrap();
        std::fs::write(&pool, "rbd\n").unwrap();

        assert_eq!(bus.pool(VolumeId::new(3)).unwrap(), "rbd\n");
        assert!(bus.pool(VolumeId::new(4)).is_err());
    }
}
