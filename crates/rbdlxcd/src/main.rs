//! rbdlxcd - rbdlxc daemon.
//!
//! Serves the `/lxc` HTTP API that attaches, mounts, starts, stops and moves
//! rbd-backed LXC containers on this host.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use rbdlxc::Orchestrator;
use rbdlxc::filesystem::SyscallMounter;
use rbdlxc::runtime::{LxcRuntime, OrchestratorConfig};
use rbdlxc::volume::{SysfsBus, VolumeController};
use rbdlxc_common::ceph::{DEFAULT_CEPH_CONF, DEFAULT_KEYRING};
use rbdlxc_common::{ClusterEndpoint, HostPaths};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Address to listen on
    #[arg(long, env = "RBDLXC_LISTEN", default_value = "0.0.0.0:8000")]
    listen: SocketAddr,

    /// Directory holding container roots
    #[arg(long, env = "LXC_PATH", default_value = "/var/lib/lxc")]
    lxcpath: PathBuf,

    /// Ceph cluster descriptor
    #[arg(long, env = "CEPH_CONF", default_value = DEFAULT_CEPH_CONF)]
    ceph_conf: PathBuf,

    /// Ceph client keyring
    #[arg(long, env = "CEPH_KEYRING", default_value = DEFAULT_KEYRING)]
    keyring: PathBuf,

    /// Name this host answers to in move requests (default: FQDN)
    #[arg(long, env = "RBDLXC_HOSTNAME")]
    hostname: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let endpoint = ClusterEndpoint::load(&args.ceph_conf, &args.keyring)
        .context("cannot load ceph configuration")?;
    tracing::info!(
        monitors = ?endpoint.monitors(),
        client = endpoint.client_name(),
        "Cluster configuration loaded"
    );

    let hostname = args
        .hostname
        .unwrap_or_else(rbdlxc::hostname::local_fqdn);

    let paths = HostPaths::new().with_lxc_root(&args.lxcpath);
    let config = OrchestratorConfig::default().with_paths(paths.clone());
    let volumes = VolumeController::new(endpoint, Arc::new(SysfsBus::new(paths)));
    let orchestrator = Orchestrator::new(
        Arc::new(LxcRuntime::new(&args.lxcpath)),
        volumes,
        Arc::new(SyscallMounter),
        hostname,
        config,
    )?;

    let listener = tokio::net::TcpListener::bind(args.listen)
        .await
        .with_context(|| format!("cannot listen on {}", args.listen))?;
    tracing::info!(
        addr = %args.listen,
        server = orchestrator.local_host(),
        lxcpath = %args.lxcpath.display(),
        "rbdlxcd started"
    );

    axum::serve(listener, api::server::app(orchestrator))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    tracing::info!("rbdlxcd stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Cannot listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown requested");
}
