//! # rbdlxc-common
//!
//! Shared utilities and types for rbdlxc.
//!
//! This crate provides common functionality used across the rbdlxc crates:
//! - Container name and rbd volume id validation
//! - Host paths for the kernel rbd interface and the LXC root
//! - Ceph cluster descriptor and keyring parsing
//! - Common error types

#![warn(missing_docs)]

pub mod ceph;
pub mod error;
pub mod id;
pub mod paths;

pub use ceph::{ClusterConfig, ClusterEndpoint, Keyring};
pub use error::{RbdlxcError, RbdlxcResult};
pub use id::{ContainerName, VolumeId};
pub use paths::HostPaths;
