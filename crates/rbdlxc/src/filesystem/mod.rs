//! Filesystem operations for container roots.
//!
//! This module handles:
//! - Reading the live mount table
//! - Mounting and unmounting rbd devices on container roots
//! - Retrying transient kernel errors around those calls

mod mounter;
mod mounts;
mod retry;

pub use mounter::{MountController, Mounter, SyscallMounter};
pub use mounts::{MountEntry, MountTable};
pub use retry::{RETRY_CEILING, RETRY_INTERVAL, RetryFailure, RetryPolicy};
