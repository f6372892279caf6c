//! Integration tests for volume control against a sysfs tree on disk.
use std::error::Error;
use std::fs;
use std::sync::Arc;

use rbdlxc::filesystem::MountTable;
use rbdlxc::volume::{SysfsBus, VolumeController};
use rbdlxc_common::{ClusterConfig, ClusterEndpoint, HostPaths, Keyring, RbdlxcError, VolumeId};
use tempfile::TempDir;

fn endpoint() -> ClusterEndpoint {
    let config = ClusterConfig::parse(
        "[global]\nfsid = 3f1b\nmon host = 10.0.0.1, 10.0.0.2:3300\n",
    );
    let keyring = Keyring::parse("[client.admin]\n\tkey = c2VjcmV0\n");
    ClusterEndpoint::new(&config, keyring).unwrap()
}

/// Lay out `/sys/bus/rbd` and `/sys/devices/rbd` with the given devices.
fn fake_sysfs(root: &TempDir, single_major: bool, devices: &[(u32, &str)]) -> HostPaths {
    let paths = HostPaths::new()
        .with_sysfs(root.path().join("sys"))
        .with_lxc_root(root.path().join("lxc"))
        .with_mounts(root.path().join("mounts"));

    fs::create_dir_all(paths.rbd_devices()).unwrap();
    fs::write(paths.rbd_add(), "").unwrap();
    fs::write(paths.rbd_remove(), "").unwrap();
    if single_major {
        fs::write(paths.rbd_add_single_major(), "").unwrap();
        fs::write(paths.rbd_remove_single_major(), "").unwrap();
    }

    for (id, pool) in devices {
        let id = VolumeId::new(*id);
        fs::create_dir_all(paths.rbd_devices().join(id.to_string())).unwrap();
        let pool_file = paths.rbd_pool(id);
        fs::create_dir_all(pool_file.parent().unwrap()).unwrap();
        fs::write(pool_file, format!("{pool}\n")).unwrap();
    }
    paths
}

fn controller(paths: &HostPaths) -> VolumeController {
    VolumeController::new(endpoint(), Arc::new(SysfsBus::new(paths.clone())))
}

#[tokio::test]
async fn attach_writes_command_to_single_major() -> Result<(), Box<dyn Error>> {
    let temp = TempDir::new()?;
    let paths = fake_sysfs(&temp, true, &[(0, "rbd")]);

    // Nothing creates a device here, so the attach cannot be resolved.
    let err = controller(&paths).attach("rbd", "web1").await.unwrap_err();
    assert!(matches!(err, RbdlxcError::DeviceNotResolved { .. }));

    let written = fs::read_to_string(paths.rbd_add_single_major())?;
    assert_eq!(
        written,
        "10.0.0.1:6789,10.0.0.2:3300 name=admin,secret=c2VjcmV0 rbd web1 -"
    );
    assert!(fs::read_to_string(paths.rbd_add())?.is_empty());
    Ok(())
}

#[tokio::test]
async fn legacy_control_files_are_used_without_single_major() -> Result<(), Box<dyn Error>> {
    let temp = TempDir::new()?;
    let paths = fake_sysfs(&temp, false, &[(3, "rbd")]);
    let volumes = controller(&paths);

    let _ = volumes.attach("rbd", "web1").await;
    assert!(fs::read_to_string(paths.rbd_add())?.ends_with("rbd web1 -"));

    volumes.detach("/dev/rbd3").await?;
    assert_eq!(fs::read_to_string(paths.rbd_remove())?, "3");
    Ok(())
}

#[tokio::test]
async fn registry_and_pool_reflect_sysfs() -> Result<(), Box<dyn Error>> {
    let temp = TempDir::new()?;
    let paths = fake_sysfs(&temp, true, &[(0, "rbd"), (2, "ssd")]);
    let volumes = controller(&paths);

    let mut attached = volumes.attached().await?;
    attached.sort_by_key(|id| id.get());
    assert_eq!(attached, vec![VolumeId::new(0), VolumeId::new(2)]);

    assert_eq!(volumes.pool_of(VolumeId::new(2)).await.as_deref(), Some("ssd"));
    assert_eq!(volumes.pool_of(VolumeId::new(7)).await, None);
    Ok(())
}

#[tokio::test]
async fn detach_rejects_foreign_devices() -> Result<(), Box<dyn Error>> {
    let temp = TempDir::new()?;
    let paths = fake_sysfs(&temp, true, &[]);

    for device in ["/dev/sda1", "/dev/rbd", "/dev/rbd1p1"] {
        let err = controller(&paths).detach(device).await.unwrap_err();
        assert!(matches!(err, RbdlxcError::InvalidDevice { .. }), "{device}");
    }
    assert!(fs::read_to_string(paths.rbd_remove_single_major())?.is_empty());
    Ok(())
}

#[test]
fn mount_table_resolves_container_roots() -> Result<(), Box<dyn Error>> {
    let temp = TempDir::new()?;
    let paths = fake_sysfs(&temp, true, &[]);
    let root = paths.container_root("web1");

    fs::write(
        &paths.mounts,
        format!(
            "proc /proc proc rw 0 0\n/dev/rbd4 {} xfs rw,noatime 0 0\n",
            root.display()
        ),
    )?;

    let table = MountTable::read(&paths.mounts);
    assert_eq!(table.device_at(&root), Some("/dev/rbd4"));
    assert_eq!(table.device_at(&paths.container_root("db1")), None);
    Ok(())
}
