//! LXC backend driving the `lxc-*` command line tools.

use std::ffi::OsStr;
use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use rbdlxc_common::{RbdlxcError, RbdlxcResult};
use tokio::process::Command;

use super::lifecycle::ContainerRuntime;
use super::state::ContainerState;

/// [`ContainerRuntime`] for containers defined under an LXC path.
#[derive(Debug, Clone)]
pub struct LxcRuntime {
    lxcpath: PathBuf,
}

impl LxcRuntime {
    /// Runtime for containers under `lxcpath`.
    #[must_use]
    pub fn new(lxcpath: impl Into<PathBuf>) -> Self {
        Self {
            lxcpath: lxcpath.into(),
        }
    }

    /// Run an lxc tool with `-P <lxcpath>` and return its stdout.
    async fn run<I, S>(&self, tool: &str, args: I) -> RbdlxcResult<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let output = Command::new(tool)
            .arg("-P")
            .arg(&self.lxcpath)
            .args(args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| RbdlxcError::runtime(format!("cannot run {tool}: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(RbdlxcError::runtime(format!(
                "{tool} exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl ContainerRuntime for LxcRuntime {
    async fn list(&self) -> RbdlxcResult<Vec<String>> {
        let stdout = self.run("lxc-ls", ["-1"]).await?;
        Ok(stdout
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(String::from)
            .collect())
    }

    async fn state(&self, name: &str) -> RbdlxcResult<ContainerState> {
        self.run("lxc-info", ["-n", name, "-s", "-H"])
            .await?
            .parse()
    }

    async fn start(&self, name: &str) -> RbdlxcResult<()> {
        tracing::debug!(container = name, "lxc-start");
        self.run("lxc-start", ["-n", name, "-d"]).await.map(drop)
    }

    async fn shutdown(&self, name: &str, timeout: Duration) -> RbdlxcResult<()> {
        let secs = timeout.as_secs().to_string();
        tracing::debug!(container = name, timeout = %secs, "lxc-stop");
        self.run("lxc-stop", ["-n", name, "-t", secs.as_str()])
            .await
            .map(drop)
    }

    async fn addresses(&self, name: &str) -> RbdlxcResult<Vec<IpAddr>> {
        let stdout = self.run("lxc-info", ["-n", name, "-i", "-H"]).await?;
        Ok(parse_addresses(&stdout))
    }
}

fn parse_addresses(stdout: &str) -> Vec<IpAddr> {
    stdout
        .split_whitespace()
        .filter_map(|word| word.parse().ok())
        .collect()
}
