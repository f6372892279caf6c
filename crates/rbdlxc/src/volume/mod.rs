//! Ceph rbd volumes attached through the kernel driver.

mod bus;
mod controller;
mod registry;

pub use bus::{RbdBus, SysfsBus};
pub use controller::VolumeController;
pub use registry::RegistrySnapshot;
