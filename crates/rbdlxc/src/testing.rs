//! In-memory stand-ins for the kernel, the mount syscalls and the runtime.
//!
//! All doubles can share one [`Journal`] so tests can assert on the order of
//! side effects across them.

#![allow(clippy::missing_panics_doc)]

use std::collections::{HashMap, VecDeque};
use std::io;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use rbdlxc_common::{ClusterConfig, ClusterEndpoint, Keyring, RbdlxcError, RbdlxcResult, VolumeId};
use rustix::io::Errno;

use crate::filesystem::Mounter;
use crate::runtime::{ContainerRuntime, ContainerState};
use crate::volume::{RbdBus, RegistrySnapshot};

/// Endpoint with one monitor and a fixed `admin` secret.
#[must_use]
pub fn test_endpoint() -> ClusterEndpoint {
    let config = ClusterConfig::parse("mon_host = 10.0.0.1\n");
    let keyring = Keyring::parse("[client.admin]\nkey = c2VjcmV0\n");
    ClusterEndpoint::new(&config, keyring).expect("static test configuration")
}

/// Ordered record of side effects shared between doubles.
#[derive(Debug, Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    /// Create an empty journal.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, entry: String) {
        self.0.lock().unwrap().push(entry);
    }

    /// Entries in the order they happened.
    #[must_use]
    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

#[derive(Debug, Default)]
struct BusState {
    attached: Vec<u32>,
    pools: HashMap<u32, String>,
    adds: Vec<String>,
    removed: Vec<VolumeId>,
}

/// [`RbdBus`] that attaches at the lowest free id, like the kernel.
#[derive(Debug, Default)]
pub struct FakeBus {
    state: Mutex<BusState>,
    refuse: Option<io::ErrorKind>,
    silent: bool,
    journal: Journal,
}

impl FakeBus {
    /// Bus with nothing attached.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Pretend `ids` are already attached (pool `rbd`).
    #[must_use]
    pub fn with_attached(self, ids: impl IntoIterator<Item = u32>) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            for id in ids {
                state.attached.push(id);
                state.pools.insert(id, "rbd".to_string());
            }
        }
        self
    }

    /// Fail every add with `kind`.
    #[must_use]
    pub const fn refuse_add(mut self, kind: io::ErrorKind) -> Self {
        self.refuse = Some(kind);
        self
    }

    /// Accept adds without creating a device.
    #[must_use]
    pub const fn without_new_devices(mut self) -> Self {
        self.silent = true;
        self
    }

    /// Record side effects into `journal`.
    #[must_use]
    pub fn with_journal(mut self, journal: &Journal) -> Self {
        self.journal = journal.clone();
        self
    }

    /// Attach commands received.
    #[must_use]
    pub fn add_commands(&self) -> Vec<String> {
        self.state.lock().unwrap().adds.clone()
    }

    /// Ids detached.
    #[must_use]
    pub fn removed(&self) -> Vec<VolumeId> {
        self.state.lock().unwrap().removed.clone()
    }
}

impl RbdBus for FakeBus {
    fn snapshot(&self) -> RegistrySnapshot {
        let state = self.state.lock().unwrap();
        RegistrySnapshot::from_ids(state.attached.iter().copied().map(VolumeId::new))
    }

    fn add(&self, command: &str) -> io::Result<()> {
        if let Some(kind) = self.refuse {
            return Err(io::Error::from(kind));
        }

        let mut state = self.state.lock().unwrap();
        state.adds.push(command.to_string());

        let fields: Vec<&str> = command.split_whitespace().collect();
        let (pool, image) = match fields.as_slice() {
            [_, _, pool, image, ..] => (*pool, *image),
            _ => return Err(io::Error::from(io::ErrorKind::InvalidInput)),
        };
        self.journal.record(format!("add {pool}/{image}"));

        if !self.silent {
            let id = (0..).find(|id| !state.attached.contains(id)).unwrap_or_default();
            state.attached.push(id);
            state.pools.insert(id, pool.to_string());
        }
        Ok(())
    }

    fn remove(&self, id: VolumeId) -> io::Result<()> {
        let mut state = self.state.lock().unwrap();
        let Some(pos) = state.attached.iter().position(|a| *a == id.get()) else {
            return Err(io::Error::from(io::ErrorKind::NotFound));
        };
        state.attached.remove(pos);
        state.pools.remove(&id.get());
        state.removed.push(id);
        self.journal.record(format!("remove {id}"));
        Ok(())
    }

    fn pool(&self, id: VolumeId) -> io::Result<String> {
        self.state
            .lock()
            .unwrap()
            .pools
            .get(&id.get())
            .map(|pool| format!("{pool}\n"))
            .ok_or_else(|| io::Error::from(io::ErrorKind::NotFound))
    }
}

#[derive(Debug, Default)]
struct MounterState {
    mounted: Vec<(String, PathBuf, String)>,
    mount_failures: VecDeque<Errno>,
    unmount_failures: VecDeque<Errno>,
    mount_attempts: usize,
    unmount_attempts: usize,
}

/// [`Mounter`] that keeps a `/proc/mounts` style table file up to date.
#[derive(Debug)]
pub struct FakeMounter {
    table: PathBuf,
    state: Mutex<MounterState>,
    always_busy: bool,
    journal: Journal,
}

impl FakeMounter {
    /// Mounter maintaining the table at `table`.
    pub fn new(table: impl Into<PathBuf>) -> Self {
        Self {
            table: table.into(),
            state: Mutex::default(),
            always_busy: false,
            journal: Journal::default(),
        }
    }

    /// Fail the next mounts with these errnos, in order.
    #[must_use]
    pub fn fail_mount_with(self, errnos: impl IntoIterator<Item = Errno>) -> Self {
        self.state.lock().unwrap().mount_failures.extend(errnos);
        self
    }

    /// Fail the next unmounts with these errnos, in order.
    #[must_use]
    pub fn fail_unmount_with(self, errnos: impl IntoIterator<Item = Errno>) -> Self {
        self.state.lock().unwrap().unmount_failures.extend(errnos);
        self
    }

    /// Every unmount reports `EBUSY`.
    #[must_use]
    pub const fn always_busy(mut self) -> Self {
        self.always_busy = true;
        self
    }

    /// Record side effects into `journal`.
    #[must_use]
    pub fn with_journal(mut self, journal: &Journal) -> Self {
        self.journal = journal.clone();
        self
    }

    /// Mount syscalls issued, failed ones included.
    #[must_use]
    pub fn mount_attempts(&self) -> usize {
        self.state.lock().unwrap().mount_attempts
    }

    /// Unmount syscalls issued, failed ones included.
    #[must_use]
    pub fn unmount_attempts(&self) -> usize {
        self.state.lock().unwrap().unmount_attempts
    }

    /// Currently mounted targets.
    #[must_use]
    pub fn mounted(&self) -> Vec<PathBuf> {
        let state = self.state.lock().unwrap();
        state.mounted.iter().map(|(_, target, _)| target.clone()).collect()
    }

    fn write_table(&self, state: &MounterState) {
        let text: String = state
            .mounted
            .iter()
            .map(|(source, target, fstype)| {
                format!("{source} {} {fstype} rw,noatime 0 0\n", target.display())
            })
            .collect();
        std::fs::write(&self.table, text).expect("writable mount table");
    }
}

impl Mounter for FakeMounter {
    fn mount(&self, source: &Path, target: &Path, fstype: &str) -> Result<(), Errno> {
        let mut state = self.state.lock().unwrap();
        state.mount_attempts += 1;
        if let Some(errno) = state.mount_failures.pop_front() {
            return Err(errno);
        }
        if state.mounted.iter().any(|(_, t, _)| t == target) {
            return Err(Errno::BUSY);
        }

        let source = source.display().to_string();
        self.journal.record(format!("mount {source} {}", target.display()));
        state
            .mounted
            .push((source, target.to_path_buf(), fstype.to_string()));
        self.write_table(&state);
        Ok(())
    }

    fn unmount(&self, target: &Path) -> Result<(), Errno> {
        let mut state = self.state.lock().unwrap();
        state.unmount_attempts += 1;
        if self.always_busy {
            return Err(Errno::BUSY);
        }
        if let Some(errno) = state.unmount_failures.pop_front() {
            return Err(errno);
        }
        let Some(pos) = state.mounted.iter().position(|(_, t, _)| t == target) else {
            return Err(Errno::INVAL);
        };

        state.mounted.remove(pos);
        self.journal.record(format!("unmount {}", target.display()));
        self.write_table(&state);
        Ok(())
    }
}

#[derive(Debug, Clone)]
struct FakeContainer {
    state: ContainerState,
    addresses: Vec<IpAddr>,
}

/// [`ContainerRuntime`] holding containers in memory.
///
/// Start moves a container to `RUNNING`, shutdown to `STOPPED`.
#[derive(Debug, Default)]
pub struct FakeRuntime {
    containers: Mutex<HashMap<String, FakeContainer>>,
    fail_shutdown: bool,
    journal: Journal,
}

impl FakeRuntime {
    /// Runtime with no containers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Define a container in `state`.
    #[must_use]
    pub fn with_container(self, name: &str, state: ContainerState) -> Self {
        self.set_state(name, state);
        self
    }

    /// Give a container addresses.
    #[must_use]
    pub fn with_addresses(self, name: &str, addresses: &[&str]) -> Self {
        {
            let mut containers = self.containers.lock().unwrap();
            let container = containers.get_mut(name).expect("container defined first");
            container.addresses = addresses.iter().map(|a| a.parse().unwrap()).collect();
        }
        self
    }

    /// Fail every shutdown.
    #[must_use]
    pub const fn failing_shutdown(mut self) -> Self {
        self.fail_shutdown = true;
        self
    }

    /// Record side effects into `journal`.
    #[must_use]
    pub fn with_journal(mut self, journal: &Journal) -> Self {
        self.journal = journal.clone();
        self
    }

    /// Define or update a container.
    pub fn set_state(&self, name: &str, state: ContainerState) {
        self.containers
            .lock()
            .unwrap()
            .entry(name.to_string())
            .and_modify(|c| c.state = state)
            .or_insert(FakeContainer {
                state,
                addresses: Vec::new(),
            });
    }

    /// Current state of a defined container.
    #[must_use]
    pub fn current_state(&self, name: &str) -> Option<ContainerState> {
        self.containers.lock().unwrap().get(name).map(|c| c.state)
    }
}

#[async_trait]
impl ContainerRuntime for FakeRuntime {
    async fn list(&self) -> RbdlxcResult<Vec<String>> {
        let mut names: Vec<String> = self.containers.lock().unwrap().keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn state(&self, name: &str) -> RbdlxcResult<ContainerState> {
        self.current_state(name)
            .ok_or_else(|| RbdlxcError::not_found(name))
    }

    async fn start(&self, name: &str) -> RbdlxcResult<()> {
        self.journal.record(format!("start {name}"));
        self.set_state(name, ContainerState::Running);
        Ok(())
    }

    async fn shutdown(&self, name: &str, timeout: Duration) -> RbdlxcResult<()> {
        self.journal
            .record(format!("shutdown {name} {}s", timeout.as_secs()));
        if self.fail_shutdown {
            return Err(RbdlxcError::runtime(format!("{name} did not stop in time")));
        }
        self.set_state(name, ContainerState::Stopped);
        Ok(())
    }

    async fn addresses(&self, name: &str) -> RbdlxcResult<Vec<IpAddr>> {
        Ok(self
            .containers
            .lock()
            .unwrap()
            .get(name)
            .map(|c| c.addresses.clone())
            .unwrap_or_default())
    }
}
