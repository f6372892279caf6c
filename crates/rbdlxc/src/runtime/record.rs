//! Composed view of one container.

use std::net::IpAddr;
use std::path::PathBuf;

use rbdlxc_common::{RbdlxcResult, VolumeId};
use serde::Serialize;

use super::lifecycle::ContainerRuntime;
use super::state::ContainerState;
use crate::filesystem::MountTable;
use crate::volume::VolumeController;

/// A container joined with its mount and volume state.
///
/// Rebuilt on every query; device and mount state can change between
/// requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContainerRecord {
    /// Container name.
    pub name: String,
    /// Runtime state.
    pub status: ContainerState,
    /// First IPv4 address, when running.
    #[serde(rename = "ipv4address")]
    pub ipv4: Option<String>,
    /// First IPv6 address, when running.
    #[serde(rename = "ipv6address")]
    pub ipv6: Option<String>,
    /// Root mount point.
    pub mount: PathBuf,
    /// Device mounted on the root, if any.
    #[serde(rename = "rbd")]
    pub device: Option<String>,
    /// Pool of that device, if the kernel reports one.
    pub pool: Option<String>,
}

impl ContainerRecord {
    /// Join `name`'s runtime state with `mounts` and the volume registry.
    ///
    /// Failing to fetch addresses is not fatal; the record just lacks them.
    ///
    /// # Errors
    ///
    /// Returns an error if the runtime cannot report the container state.
    pub async fn compose(
        name: &str,
        mount: PathBuf,
        runtime: &dyn ContainerRuntime,
        mounts: &MountTable,
        volumes: &VolumeController,
    ) -> RbdlxcResult<Self> {
        let status = runtime.state(name).await?;

        let (ipv4, ipv6) = if status.is_running() {
            match runtime.addresses(name).await {
                Ok(addrs) => first_of_each_family(&addrs),
                Err(e) => {
                    tracing::debug!(container = name, error = %e, "Cannot list addresses");
                    (None, None)
                }
            }
        } else {
            (None, None)
        };

        let device = mounts.device_at(&mount).map(String::from);
        let pool = match device.as_deref().map(VolumeId::from_device_path) {
            Some(Ok(id)) => volumes.pool_of(id).await,
            _ => None,
        };

        Ok(Self {
            name: name.to_string(),
            status,
            ipv4,
            ipv6,
            mount,
            device,
            pool,
        })
    }
}

fn first_of_each_family(addrs: &[IpAddr]) -> (Option<String>, Option<String>) {
    let ipv4 = addrs.iter().find(|a| a.is_ipv4()).map(ToString::to_string);
    let ipv6 = addrs.iter().find(|a| a.is_ipv6()).map(ToString::to_string);
    (ipv4, ipv6)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_wire_names() {
        let record = ContainerRecord {
            name: "web1".into(),
            status: ContainerState::Running,
            ipv4: Some("10.0.3.15".into()),
            ipv6: None,
            mount: PathBuf::from("/var/lib/lxc/web1"),
            device: Some("/dev/rbd3".into()),
            pool: Some("rbd".into()),
        };

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "name": "web1",
                "status": "RUNNING",
                "ipv4address": "10.0.3.15",
                "ipv6address": null,
                "mount": "/var/lib/lxc/web1",
                "rbd": "/dev/rbd3",
                "pool": "rbd",
            })
        );
    }

    #[test]
    fn picks_first_address_per_family() {
        let addrs: Vec<IpAddr> = ["fd42::2", "10.0.3.2", "10.0.3.3"]
            .iter()
            .map(|a| a.parse().unwrap())
            .collect();
        let (v4, v6) = first_of_each_family(&addrs);
        assert_eq!(v4.as_deref(), Some("10.0.3.2"));
        assert_eq!(v6.as_deref(), Some("fd42::2"));
    }
}
