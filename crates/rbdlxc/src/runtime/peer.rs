//! HTTP client for peer rbdlxc daemons.

use std::time::Duration;

use rbdlxc_common::{RbdlxcError, RbdlxcResult};
use reqwest::{Client, StatusCode};

/// Asks other hosts to bring containers up.
#[derive(Debug, Clone)]
pub struct PeerClient {
    client: Client,
}

impl PeerClient {
    /// Create a client whose requests time out after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(timeout: Duration) -> RbdlxcResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RbdlxcError::Internal {
                message: format!("cannot build peer client: {e}"),
            })?;
        Ok(Self { client })
    }

    /// `GET http://<host>:<port>/lxc/start?pool=<pool>&name=<name>`.
    ///
    /// Only `202 Accepted` counts as success.
    ///
    /// # Errors
    ///
    /// [`RbdlxcError::RemoteRejected`] for any other status or a transport
    /// failure.
    pub async fn request_bring_up(
        &self,
        host: &str,
        port: u16,
        pool: &str,
        name: &str,
    ) -> RbdlxcResult<()> {
        let url = start_url(host, port);
        tracing::debug!(url = %url, pool, container = name, "Requesting remote bring-up");

        let rejected = |reason: String| RbdlxcError::RemoteRejected {
            host: host.to_string(),
            reason,
        };

        let response = self
            .client
            .get(&url)
            .query(&[("pool", pool), ("name", name)])
            .send()
            .await
            .map_err(|e| rejected(format!("request failed: {e}")))?;

        match response.status() {
            StatusCode::ACCEPTED => Ok(()),
            status => Err(rejected(format!("unexpected status {status}"))),
        }
    }
}

/// Bring-up endpoint on `host`, bracketing IPv6 literals.
fn start_url(host: &str, port: u16) -> String {
    if host.contains(':') && !host.starts_with('[') {
        format!("http://[{host}]:{port}/lxc/start")
    } else {
        format!("http://{host}:{port}/lxc/start")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ipv6_hosts_are_bracketed() {
        assert_eq!(start_url("node2", 8000), "http://node2:8000/lxc/start");
        assert_eq!(start_url("10.0.0.2", 9000), "http://10.0.0.2:9000/lxc/start");
        assert_eq!(start_url("fd00::1", 8000), "http://[fd00::1]:8000/lxc/start");
        assert_eq!(start_url("[fd00::1]", 8000), "http://[fd00::1]:8000/lxc/start");
    }

    #[tokio::test]
    async fn unreachable_peer_is_rejected() {
        // Bind then drop to get a port nobody listens on.
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let peers = PeerClient::new(Duration::from_secs(2)).unwrap();

        let err = peers
            .request_bring_up("127.0.0.1", port, "rbd", "web1")
            .await
            .unwrap_err();

        assert!(matches!(err, RbdlxcError::RemoteRejected { .. }));
    }
}
