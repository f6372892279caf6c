//! Ceph cluster descriptor and client keyring.
//!
//! Both files are read once at startup. Only the handful of keys the kernel
//! rbd driver needs are kept: the monitor addresses from `ceph.conf` and the
//! client name and secret from the keyring.

use std::fmt;
use std::path::Path;

use crate::error::{RbdlxcError, RbdlxcResult};

/// Default cluster descriptor location.
pub const DEFAULT_CEPH_CONF: &str = "/etc/ceph/ceph.conf";

/// Default admin keyring location.
pub const DEFAULT_KEYRING: &str = "/etc/ceph/ceph.client.admin.keyring";

/// Monitor port used when `mon_host` omits one.
pub const DEFAULT_MON_PORT: u16 = 6789;

/// Parsed `ceph.conf`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClusterConfig {
    /// Cluster fsid, lowercased.
    pub fsid: Option<String>,
    /// Monitor addresses as `host:port`.
    pub mon_hosts: Vec<String>,
    /// Initial monitor member names.
    pub mon_members: Vec<String>,
    /// `auth_cluster_required`.
    pub auth_cluster: Option<String>,
    /// `auth_service_required`.
    pub auth_service: Option<String>,
    /// `auth_client_required`.
    pub auth_client: Option<String>,
}

impl ClusterConfig {
    /// Read and parse a cluster descriptor.
    ///
    /// # Errors
    ///
    /// Returns [`RbdlxcError::Config`] if the file cannot be read.
    pub fn load(path: impl AsRef<Path>) -> RbdlxcResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            RbdlxcError::config(format!("cannot read {}: {e}", path.display()))
        })?;
        let config = Self::parse(&text);
        tracing::debug!(
            path = %path.display(),
            monitors = ?config.mon_hosts,
            "Loaded cluster descriptor"
        );
        Ok(config)
    }

    /// Parse descriptor text. Sections are flattened; unknown keys ignored.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        let mut config = Self::default();

        for (key, value) in key_values(text) {
            match key.as_str() {
                "fsid" => config.fsid = Some(value.to_lowercase()),
                "mon_initial_members" => config.mon_members = split_list(value),
                "mon_host" => {
                    config.mon_hosts = split_list(value)
                        .into_iter()
                        .map(|host| with_default_port(&host))
                        .collect();
                }
                "auth_cluster_required" => config.auth_cluster = Some(value.to_string()),
                "auth_service_required" => config.auth_service = Some(value.to_string()),
                "auth_client_required" => config.auth_client = Some(value.to_string()),
                _ => {}
            }
        }

        config
    }
}

/// Parsed client keyring.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Keyring {
    /// Client name without the `client.` prefix.
    pub name: String,
    /// Base64 secret.
    pub secret: String,
}

impl Keyring {
    /// Read and parse a keyring file.
    ///
    /// # Errors
    ///
    /// Returns [`RbdlxcError::Config`] if the file cannot be read.
    pub fn load(path: impl AsRef<Path>) -> RbdlxcResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            RbdlxcError::config(format!("cannot read {}: {e}", path.display()))
        })?;
        let keyring = Self::parse(&text);
        tracing::debug!(path = %path.display(), client = %keyring.name, "Loaded keyring");
        Ok(keyring)
    }

    /// Parse keyring text. The last `[client.<name>]` section and the last
    /// `key` entry win.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        let mut keyring = Self::default();

        for line in text.lines().map(str::trim) {
            let header = line
                .strip_prefix('[')
                .and_then(|rest| rest.strip_suffix(']'))
                .filter(|section| section.to_lowercase().starts_with("client."));
            if let Some(section) = header {
                keyring.name = section["client.".len()..].trim().to_string();
                continue;
            }
            if let Some((key, value)) = line.split_once('=') {
                if key.trim().eq_ignore_ascii_case("key") {
                    keyring.secret = value.trim().to_string();
                }
            }
        }

        keyring
    }
}

impl fmt::Debug for Keyring {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Keyring")
            .field("name", &self.name)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// Everything the kernel needs to reach the cluster.
#[derive(Clone, PartialEq, Eq)]
pub struct ClusterEndpoint {
    monitors: Vec<String>,
    keyring: Keyring,
}

impl ClusterEndpoint {
    /// Combine a descriptor and a keyring.
    ///
    /// # Errors
    ///
    /// Returns [`RbdlxcError::Config`] when there are no monitors, or the
    /// keyring lacks a client name or secret.
    pub fn new(config: &ClusterConfig, keyring: Keyring) -> RbdlxcResult<Self> {
        if config.mon_hosts.is_empty() {
            return Err(RbdlxcError::config("cluster descriptor has no mon_host"));
        }
        if keyring.name.is_empty() {
            return Err(RbdlxcError::config("keyring has no [client.<name>] section"));
        }
        if keyring.secret.is_empty() {
            return Err(RbdlxcError::config("keyring has no key"));
        }
        Ok(Self {
            monitors: config.mon_hosts.clone(),
            keyring,
        })
    }

    /// Load both files and combine them.
    ///
    /// # Errors
    ///
    /// Returns [`RbdlxcError::Config`] if either file is missing or
    /// incomplete.
    pub fn load(ceph_conf: impl AsRef<Path>, keyring: impl AsRef<Path>) -> RbdlxcResult<Self> {
        let config = ClusterConfig::load(ceph_conf)?;
        let keyring = Keyring::load(keyring)?;
        Self::new(&config, keyring)
    }

    /// Monitor addresses.
    #[must_use]
    pub fn monitors(&self) -> &[String] {
        &self.monitors
    }

    /// Client name.
    #[must_use]
    pub fn client_name(&self) -> &str {
        &self.keyring.name
    }

    /// Kernel attach command for `pool/image`.
    ///
    /// `<mon1>,<mon2> name=<client>,secret=<secret> <pool> <image> -`
    #[must_use]
    pub fn attach_command(&self, pool: &str, image: &str) -> String {
        format!(
            "{} name={},secret={} {} {} -",
            self.monitors.join(","),
            self.keyring.name,
            self.keyring.secret,
            pool,
            image
        )
    }
}

impl fmt::Debug for ClusterEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClusterEndpoint")
            .field("monitors", &self.monitors)
            .field("keyring", &self.keyring)
            .finish()
    }
}

/// `key = value` pairs with ceph's key normalization: case-insensitive, and
/// spaces equivalent to underscores.
fn key_values(text: &str) -> impl Iterator<Item = (String, &str)> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.starts_with('#') && !line.starts_with(';'))
        .filter_map(|line| line.split_once('='))
        .map(|(key, value)| {
            let key = key
                .trim()
                .to_lowercase()
                .split_whitespace()
                .collect::<Vec<_>>()
                .join("_");
            (key, value.trim())
        })
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(String::from)
        .collect()
}

fn with_default_port(host: &str) -> String {
    let has_port = if host.starts_with('[') {
        host.contains("]:")
    } else {
        host.contains(':')
    };
    if has_port {
        host.to_string()
    } else {
        format!("{host}:{DEFAULT_MON_PORT}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CEPH_CONF: &str = "\
[global]
fsid = 5A3C1E2B-0000-4000-8000-000000000001
mon_initial_members = mon-a, mon-b
mon host = 10.0.0.1,10.0.0.2:3300, [fd00::3]
auth_cluster_required = cephx
auth_service_required = cephx
auth_client_required = cephx
# mon_host = 192.168.0.1
";

    const KEYRING: &str = "\
[client.admin]
\tkey = AQBzc2VjcmV0c2VjcmV0c2VjcmV0==
\tcaps mon = \"allow *\"
";

    #[test]
    fn parses_cluster_descriptor() {
        let config = ClusterConfig::parse(CEPH_CONF);
        assert_eq!(
            config.fsid.as_deref(),
            Some("5a3c1e2b-0000-4000-8000-000000000001")
        );
        assert_eq!(config.mon_members, vec!["mon-a", "mon-b"]);
        assert_eq!(
            config.mon_hosts,
            vec!["10.0.0.1:6789", "10.0.0.2:3300", "[fd00::3]:6789"]
        );
        assert_eq!(config.auth_client.as_deref(), Some("cephx"));
    }

    #[test]
    fn parses_keyring() {
        let keyring = Keyring::parse(KEYRING);
        assert_eq!(keyring.name, "admin");
        assert_eq!(keyring.secret, "AQBzc2VjcmV0c2VjcmV0c2VjcmV0==");
    }

    #[test]
    fn attach_command_layout() {
        let endpoint =
            ClusterEndpoint::new(&ClusterConfig::parse(CEPH_CONF), Keyring::parse(KEYRING))
                .unwrap();
        assert_eq!(
            endpoint.attach_command("rbd", "web1"),
            "10.0.0.1:6789,10.0.0.2:3300,[fd00::3]:6789 \
             name=admin,secret=AQBzc2VjcmV0c2VjcmV0c2VjcmV0== rbd web1 -"
        );
    }

    #[test]
    fn debug_hides_secret() {
        let endpoint =
            ClusterEndpoint::new(&ClusterConfig::parse(CEPH_CONF), Keyring::parse(KEYRING))
                .unwrap();
        let rendered = format!("{endpoint:?}");
        assert!(!rendered.contains("AQBz"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn incomplete_configuration_is_rejected() {
        let no_monitors = ClusterConfig::parse("[global]\nfsid = x\n");
        assert!(matches!(
            ClusterEndpoint::new(&no_monitors, Keyring::parse(KEYRING)),
            Err(RbdlxcError::Config { .. })
        ));

        let config = ClusterConfig::parse(CEPH_CONF);
        assert!(ClusterEndpoint::new(&config, Keyring::parse("[client.admin]\n")).is_err());
        assert!(ClusterEndpoint::new(&config, Keyring::parse("key = abc\n")).is_err());
    }

    #[test]
    fn missing_files_are_config_errors() {
        let temp = tempfile::tempdir().unwrap();
        let err = ClusterEndpoint::load(temp.path().join("ceph.conf"), temp.path().join("k"))
            .unwrap_err();
        assert!(matches!(err, RbdlxcError::Config { .. }));
    }

    #[test]
    fn loads_from_disk() {
        let temp = tempfile::tempdir().unwrap();
        let conf = temp.path().join("ceph.conf");
        let keyring = temp.path().join("ceph.client.admin.keyring");
        std::fs::write(&conf, CEPH_CONF).unwrap();
        std::fs::write(&keyring, KEYRING).unwrap();

        let endpoint = ClusterEndpoint::load(&conf, &keyring).unwrap();
        assert_eq!(endpoint.client_name(), "admin");
        assert_eq!(endpoint.monitors().len(), 3);
    }
}
