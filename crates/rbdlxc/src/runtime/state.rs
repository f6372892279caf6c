//! Container states reported by the runtime.

use std::fmt;
use std::str::FromStr;

use rbdlxc_common::RbdlxcError;
use serde::{Deserialize, Serialize};

/// Container state as the LXC runtime names it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContainerState {
    /// Not running.
    Stopped,
    /// Init is being spawned.
    Starting,
    /// Running.
    Running,
    /// Shutting down.
    Stopping,
    /// Start failed and is being torn down.
    Aborting,
    /// Being frozen.
    Freezing,
    /// Frozen.
    Frozen,
    /// Being thawed.
    Thawed,
}

impl ContainerState {
    /// Returns true if the container is running.
    #[must_use]
    pub const fn is_running(self) -> bool {
        matches!(self, Self::Running)
    }

    /// Returns true if the container is stopped.
    #[must_use]
    pub const fn is_stopped(self) -> bool {
        matches!(self, Self::Stopped)
    }

    /// Runtime spelling of the state.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Stopped => "STOPPED",
            Self::Starting => "STARTING",
            Self::Running => "RUNNING",
            Self::Stopping => "STOPPING",
            Self::Aborting => "ABORTING",
            Self::Freezing => "FREEZING",
            Self::Frozen => "FROZEN",
            Self::Thawed => "THAWED",
        }
    }
}

impl fmt::Display for ContainerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContainerState {
    type Err = RbdlxcError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "STOPPED" => Ok(Self::Stopped),
            "STARTING" => Ok(Self::Starting),
            "RUNNING" => Ok(Self::Running),
            "STOPPING" => Ok(Self::Stopping),
            "ABORTING" => Ok(Self::Aborting),
            "FREEZING" => Ok(Self::Freezing),
            "FROZEN" => Ok(Self::Frozen),
            "THAWED" => Ok(Self::Thawed),
            other => Err(RbdlxcError::runtime(format!("unknown container state {other:?}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_runtime_output() {
        assert_eq!("RUNNING\n".parse::<ContainerState>().unwrap(), ContainerState::Running);
        assert_eq!("stopped".parse::<ContainerState>().unwrap(), ContainerState::Stopped);
        assert!("BOGUS".parse::<ContainerState>().is_err());
    }

    #[test]
    fn serializes_like_the_runtime() {
        let json = serde_json::to_string(&ContainerState::Frozen).unwrap();
        assert_eq!(json, "\"FROZEN\"");
        assert_eq!(ContainerState::Running.to_string(), "RUNNING");
    }
}
