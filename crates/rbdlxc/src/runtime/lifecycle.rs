//! Container lifecycle management.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use rbdlxc_common::RbdlxcResult;
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::state::ContainerState;

/// Container runtime capability.
///
/// Everything rbdlxc needs from the runtime that actually executes
/// containers. Names are the runtime's container names.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Names of all defined containers.
    async fn list(&self) -> RbdlxcResult<Vec<String>>;

    /// Current state of a container.
    async fn state(&self, name: &str) -> RbdlxcResult<ContainerState>;

    /// Request a start without waiting for boot to complete.
    async fn start(&self, name: &str) -> RbdlxcResult<()>;

    /// Shut the container down, waiting at most `timeout`.
    async fn shutdown(&self, name: &str, timeout: Duration) -> RbdlxcResult<()>;

    /// Addresses assigned to a running container.
    async fn addresses(&self, name: &str) -> RbdlxcResult<Vec<IpAddr>>;
}

/// Container lifecycle phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecyclePhase {
    /// Attaching the rbd volume.
    Attaching,
    /// Mounting the container root.
    Mounting,
    /// Asking the runtime to start the container.
    Starting,
    /// Waiting for the runtime to shut the container down.
    ShuttingDown,
    /// Unmounting the container root.
    Unmounting,
    /// Detaching the rbd volume.
    Detaching,
    /// Asking a peer host to bring the container up.
    Migrating,
}

impl std::fmt::Display for LifecyclePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Attaching => write!(f, "attaching"),
            Self::Mounting => write!(f, "mounting"),
            Self::Starting => write!(f, "starting"),
            Self::ShuttingDown => write!(f, "shutting-down"),
            Self::Unmounting => write!(f, "unmounting"),
            Self::Detaching => write!(f, "detaching"),
            Self::Migrating => write!(f, "migrating"),
        }
    }
}

/// One async mutex per container name.
///
/// Bring-up, release and move of the same container run one at a time;
/// different containers never wait on each other. Entries live only while
/// a transition holds or awaits them.
#[derive(Debug, Default)]
pub struct TransitionLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl TransitionLocks {
    /// Create an empty lock table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive use of `name`.
    pub async fn acquire(&self, name: &str) -> TransitionGuard<'_> {
        let lock = Arc::clone(
            self.locks
                .entry(name.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .value(),
        );
        TransitionGuard {
            guard: Some(lock.lock_owned().await),
            name: name.to_string(),
            locks: &self.locks,
        }
    }

    /// Whether a transition on `name` is in flight.
    #[must_use]
    pub fn is_busy(&self, name: &str) -> bool {
        self.locks
            .get(name)
            .is_some_and(|lock| lock.try_lock().is_err())
    }

    /// Names currently held or awaited.
    #[must_use]
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    /// Whether no transition is held or awaited.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

/// Exclusive use of one container name.
///
/// Dropping it unlocks the name and forgets it unless another transition
/// is waiting.
#[derive(Debug)]
pub struct TransitionGuard<'a> {
    guard: Option<OwnedMutexGuard<()>>,
    name: String,
    locks: &'a DashMap<String, Arc<Mutex<()>>>,
}

impl Drop for TransitionGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        // Waiters hold a clone of the mutex; only the table's copy remains
        // when nobody does.
        self.locks
            .remove_if(&self.name, |_, lock| Arc::strong_count(lock) == 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_display() {
        assert_eq!(LifecyclePhase::ShuttingDown.to_string(), "shutting-down");
        assert_eq!(LifecyclePhase::Attaching.to_string(), "attaching");
    }

    #[tokio::test]
    async fn same_name_is_exclusive() {
        let locks = TransitionLocks::new();

        let guard = locks.acquire("web1").await;
        assert!(locks.is_busy("web1"));
        assert!(!locks.is_busy("db1"));

        let _other = locks.acquire("db1").await;
        drop(guard);
        assert!(!locks.is_busy("web1"));
    }

    #[tokio::test]
    async fn released_names_are_forgotten() {
        let locks = TransitionLocks::new();

        for i in 0..100 {
            drop(locks.acquire(&format!("ct{i}")).await);
        }
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn waiting_transition_keeps_the_entry() {
        let locks = Arc::new(TransitionLocks::new());
        let first = locks.acquire("web1").await;

        let waiter = {
            let locks = Arc::clone(&locks);
            tokio::spawn(async move {
                let _second = locks.acquire("web1").await;
            })
        };
        while Arc::strong_count(locks.locks.get("web1").unwrap().value()) < 3 {
            tokio::task::yield_now().await;
        }

        drop(first);
        assert_eq!(locks.len(), 1);

        waiter.await.unwrap();
        assert!(locks.is_empty());
    }
}
