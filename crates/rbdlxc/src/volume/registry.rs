//! Snapshots of attached rbd volume ids.

use std::path::Path;

use rbdlxc_common::VolumeId;

/// Ids listed in the kernel's attached-volume directory at one instant.
///
/// Ids keep the order the directory listing produced. That order is not
/// guaranteed to be stable between two listings, so nothing here sorts or
/// relies on it beyond "first seen".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistrySnapshot {
    ids: Vec<VolumeId>,
}

impl RegistrySnapshot {
    /// Build a snapshot from ids in listing order.
    pub fn from_ids(ids: impl IntoIterator<Item = VolumeId>) -> Self {
        Self {
            ids: ids.into_iter().collect(),
        }
    }

    /// List `dir`, one entry per attached volume.
    ///
    /// An unreadable directory yields an empty snapshot, and entries whose
    /// names are not ids are skipped. Callers must tolerate a registry that
    /// conservatively looks empty.
    pub fn read(dir: &Path) -> Self {
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::debug!(dir = %dir.display(), error = %e, "Cannot list rbd devices");
                return Self::default();
            }
        };

        let ids = entries
            .filter_map(Result::ok)
            .filter_map(|entry| {
                let name = entry.file_name();
                let name = name.to_str()?;
                match name.parse::<VolumeId>() {
                    Ok(id) => Some(id),
                    Err(_) => {
                        tracing::debug!(entry = name, "Skipping non-numeric rbd device entry");
                        None
                    }
                }
            })
            .collect();

        Self { ids }
    }

    /// Ids in listing order.
    #[must_use]
    pub fn ids(&self) -> &[VolumeId] {
        &self.ids
    }

    /// Whether `id` was attached when the snapshot was taken.
    #[must_use]
    pub fn contains(&self, id: VolumeId) -> bool {
        self.ids.contains(&id)
    }

    /// Number of attached volumes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Whether no volume was attached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// First id of `after`, in `after`'s order, that `self` lacks.
    ///
    /// `None` means no volume appeared between the two snapshots.
    #[must_use]
    pub fn newly_attached(&self, after: &Self) -> Option<VolumeId> {
        let mut fresh = after.ids.iter().copied().filter(|id| !self.contains(*id));
        let first = fresh.next()?;

        let others: Vec<VolumeId> = fresh.collect();
        if !others.is_empty() {
            tracing::warn!(
                picked = %first,
                also_new = ?others,
                "Several rbd devices appeared during one attach"
            );
        }

        Some(first)
    }
}
