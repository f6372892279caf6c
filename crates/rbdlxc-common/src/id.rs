//! Container names and rbd volume ids.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{RbdlxcError, RbdlxcResult};

/// Prefix of every device node created by the kernel rbd driver.
pub const RBD_DEVICE_PREFIX: &str = "/dev/rbd";

/// A validated container name.
///
/// The name doubles as the rbd image name and as a directory under the LXC
/// root, so it must:
/// - Be 1-64 characters long
/// - Contain only alphanumeric characters, dots, hyphens, and underscores
/// - Start with an alphanumeric character
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContainerName(String);

impl ContainerName {
    /// Maximum length of a container name.
    pub const MAX_LENGTH: usize = 64;

    /// Create a new container name, validating the format.
    ///
    /// # Errors
    ///
    /// Returns an error if the name format is invalid.
    pub fn new(name: impl Into<String>) -> RbdlxcResult<Self> {
        let name = name.into();
        Self::validate(&name)?;
        Ok(Self(name))
    }

    /// Get the container name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn validate(name: &str) -> RbdlxcResult<()> {
        let invalid = || RbdlxcError::InvalidContainerName {
            name: name.to_string(),
        };

        if name.is_empty() || name.len() > Self::MAX_LENGTH {
            return Err(invalid());
        }
        if !name.starts_with(|c: char| c.is_ascii_alphanumeric()) {
            return Err(invalid());
        }
        if !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
        {
            return Err(invalid());
        }

        Ok(())
    }
}

impl fmt::Display for ContainerName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ContainerName {
    type Err = RbdlxcError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl AsRef<str> for ContainerName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Id the kernel rbd driver assigned to an attached volume.
///
/// Unique among attached volumes at any instant and reused after detach.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VolumeId(u32);

impl VolumeId {
    /// Wrap a raw id.
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Raw numeric id.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }

    /// Device node for this volume, `/dev/rbd<id>`.
    #[must_use]
    pub fn device_path(self) -> String {
        format!("{RBD_DEVICE_PREFIX}{}", self.0)
    }

    /// Parse the id back out of a `/dev/rbd<id>` device path.
    ///
    /// Partition nodes (`/dev/rbd3p1`) and anything outside `/dev/rbd` are
    /// rejected.
    ///
    /// # Errors
    ///
    /// Returns [`RbdlxcError::InvalidDevice`] if the path is not a whole rbd
    /// device.
    pub fn from_device_path(path: &str) -> RbdlxcResult<Self> {
        path.strip_prefix(RBD_DEVICE_PREFIX)
            .filter(|suffix| !suffix.is_empty() && suffix.bytes().all(|b| b.is_ascii_digit()))
            .and_then(|suffix| suffix.parse().ok())
            .map(Self)
            .ok_or_else(|| RbdlxcError::InvalidDevice {
                path: path.to_string(),
            })
    }
}

impl fmt::Display for VolumeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for VolumeId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(Self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn valid_container_names() {
        assert!(ContainerName::new("web1").is_ok());
        assert!(ContainerName::new("my-container").is_ok());
        assert!(ContainerName::new("db_primary").is_ok());
        assert!(ContainerName::new("app.example").is_ok());
    }

    #[test]
    fn invalid_container_names() {
        assert!(ContainerName::new("").is_err());
        assert!(ContainerName::new("-web").is_err());
        assert!(ContainerName::new("..").is_err());
        assert!(ContainerName::new("web/../etc").is_err());
        assert!(ContainerName::new("web 1").is_err());
        assert!(ContainerName::new("a".repeat(65)).is_err());
    }

    #[test]
    fn device_path_round_trip() {
        let id = VolumeId::new(3);
        assert_eq!(id.device_path(), "/dev/rbd3");
        assert_eq!(VolumeId::from_device_path("/dev/rbd3").unwrap(), id);
    }

    #[test]
    fn rejects_foreign_devices() {
        for path in ["", "/dev/rbd", "/dev/sda1", "/dev/rbd3p1", "rbd3", "/dev/rbd-1"] {
            assert!(
                matches!(
                    VolumeId::from_device_path(path),
                    Err(RbdlxcError::InvalidDevice { .. })
                ),
                "{path} should be rejected"
            );
        }
    }

    proptest! {
        #[test]
        fn any_id_parses_back(raw in any::<u32>()) {
            let id = VolumeId::new(raw);
            prop_assert_eq!(VolumeId::from_device_path(&id.device_path()).unwrap(), id);
        }
    }
}
