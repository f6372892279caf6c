//! Container lifecycle on top of rbd volumes.
//!
//! [`Orchestrator`] sequences volume attach, root mount and runtime start,
//! and the reverse, and hands containers over to peer hosts.

mod config;
mod lifecycle;
mod lxc;
mod orchestrator;
mod peer;
mod record;
mod state;

pub use config::{DEFAULT_FSTYPE, DEFAULT_PEER_PORT, DEFAULT_POOL, OrchestratorConfig};
pub use lifecycle::{ContainerRuntime, LifecyclePhase, TransitionGuard, TransitionLocks};
pub use lxc::LxcRuntime;
pub use orchestrator::{BringDown, BringUp, Move, Orchestrator};
pub use peer::PeerClient;
pub use record::ContainerRecord;
pub use state::ContainerState;
