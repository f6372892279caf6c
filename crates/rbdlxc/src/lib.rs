//! # rbdlxc
//!
//! LXC containers whose root filesystem lives on a Ceph rbd image.
//!
//! ## Features
//!
//! - **Volumes**: attach and detach rbd images through the kernel sysfs bus
//! - **Mounts**: mount the image as the container root, retrying transient errors
//! - **Lifecycle**: bring containers up and down in the right order
//! - **Migration**: release a container here and hand it to a peer host
//!
//! ## Usage
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use rbdlxc::filesystem::SyscallMounter;
//! use rbdlxc::runtime::{LxcRuntime, Orchestrator, OrchestratorConfig};
//! use rbdlxc::volume::{SysfsBus, VolumeController};
//! use rbdlxc_common::ClusterEndpoint;
//!
//! # async fn example() -> rbdlxc_common::RbdlxcResult<()> {
//! let config = OrchestratorConfig::default();
//! let endpoint = ClusterEndpoint::load(
//!     "/etc/ceph/ceph.conf",
//!     "/etc/ceph/ceph.client.admin.keyring",
//! )?;
//! let volumes = VolumeController::new(endpoint, Arc::new(SysfsBus::new(config.paths.clone())));
//! let runtime = Arc::new(LxcRuntime::new(config.paths.lxc_root.clone()));
//!
//! let orchestrator = Orchestrator::new(
//!     runtime,
//!     volumes,
//!     Arc::new(SyscallMounter),
//!     rbdlxc::hostname::local_fqdn(),
//!     config,
//! )?;
//!
//! let up = orchestrator.bring_up("web1", "rbd", "xfs").await?;
//! println!("web1 root on {}", up.device);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod filesystem;
pub mod hostname;
pub mod runtime;
#[cfg(any(test, feature = "test-util"))]
pub mod testing;
pub mod volume;

pub use runtime::Orchestrator;
