//! Orchestrator configuration.

use std::time::Duration;

use rbdlxc_common::HostPaths;

use crate::filesystem::RetryPolicy;

/// Pool used when a bring-up request names none.
pub const DEFAULT_POOL: &str = "rbd";

/// Filesystem type used when a bring-up request names none.
pub const DEFAULT_FSTYPE: &str = "xfs";

/// Port peers listen on when a move request names none.
pub const DEFAULT_PEER_PORT: u16 = 8000;

/// Orchestrator configuration options.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Host paths for the kernel interfaces and container roots.
    pub paths: HostPaths,
    /// Budget for a container shutdown.
    pub shutdown_timeout: Duration,
    /// Timeout of the remote bring-up request during a move.
    pub peer_timeout: Duration,
    /// Retry policy for mount and unmount.
    pub retry: RetryPolicy,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            paths: HostPaths::new(),
            shutdown_timeout: Duration::from_secs(60),
            peer_timeout: Duration::from_secs(60),
            retry: RetryPolicy::default(),
        }
    }
}

impl OrchestratorConfig {
    /// Set the host paths.
    #[must_use]
    pub fn with_paths(mut self, paths: HostPaths) -> Self {
        self.paths = paths;
        self
    }

    /// Set the shutdown budget.
    #[must_use]
    pub const fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Set the remote bring-up timeout.
    #[must_use]
    pub const fn with_peer_timeout(mut self, timeout: Duration) -> Self {
        self.peer_timeout = timeout;
        self
    }

    /// Set the mount/unmount retry policy.
    #[must_use]
    pub const fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = OrchestratorConfig::default();
        assert_eq!(config.shutdown_timeout, Duration::from_secs(60));
        assert_eq!(config.peer_timeout, Duration::from_secs(60));
        assert_eq!(config.retry.interval, Duration::from_millis(10));
    }

    #[test]
    fn builder_pattern() {
        let config = OrchestratorConfig::default()
            .with_paths(HostPaths::new().with_lxc_root("/srv/lxc"))
            .with_shutdown_timeout(Duration::from_secs(5))
            .with_peer_timeout(Duration::from_secs(2));

        assert_eq!(config.paths.lxc_root, std::path::PathBuf::from("/srv/lxc"));
        assert_eq!(config.shutdown_timeout, Duration::from_secs(5));
        assert_eq!(config.peer_timeout, Duration::from_secs(2));
    }
}
