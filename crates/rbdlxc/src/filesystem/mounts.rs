//! Live mount table snapshots.

use std::path::{Path, PathBuf};

/// One line of the mount table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountEntry {
    /// Mounted device or pseudo-filesystem source.
    pub source: String,
    /// Mount point.
    pub target: PathBuf,
    /// Filesystem type.
    pub fstype: String,
}

/// Mount table read at one instant. Never cached across operations.
#[derive(Debug, Clone, Default)]
pub struct MountTable {
    entries: Vec<MountEntry>,
}

impl MountTable {
    /// Read a `/proc/mounts` style table.
    ///
    /// An unreadable table is treated as "nothing mounted" so listings
    /// degrade instead of failing.
    pub fn read(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(text) => Self::parse(&text),
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "Cannot read mount table");
                Self::default()
            }
        }
    }

    /// [`MountTable::read`] on the blocking pool.
    pub async fn load(path: &Path) -> Self {
        let path = path.to_path_buf();
        tokio::task::spawn_blocking(move || Self::read(&path))
            .await
            .unwrap_or_default()
    }

    /// Parse mount table text, skipping malformed lines.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        let entries = text
            .lines()
            .filter_map(|line| {
                let mut fields = line.split_whitespace();
                let source = unescape(fields.next()?);
                let target = PathBuf::from(unescape(fields.next()?));
                let fstype = fields.next().unwrap_or_default().to_string();
                Some(MountEntry {
                    source,
                    target,
                    fstype,
                })
            })
            .collect();
        Self { entries }
    }

    /// All entries in table order.
    #[must_use]
    pub fn entries(&self) -> &[MountEntry] {
        &self.entries
    }

    /// Entry mounted at `target`. With stacked mounts the topmost wins.
    #[must_use]
    pub fn at(&self, target: &Path) -> Option<&MountEntry> {
        self.entries.iter().rev().find(|entry| entry.target == target)
    }

    /// Device mounted at `target`.
    #[must_use]
    pub fn device_at(&self, target: &Path) -> Option<&str> {
        self.at(target).map(|entry| entry.source.as_str())
    }
}

/// Decode the kernel's octal escapes (`\040` for space and friends).
fn unescape(field: &str) -> String {
    if !field.contains('\\') {
        return field.to_string();
    }

    let bytes = field.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let octal = bytes.get(i + 1..i + 4).filter(|digits| {
            bytes[i] == b'\\' && digits.iter().all(|d| (b'0'..=b'7').contains(d))
        });
        match octal {
            Some(digits) => {
                let value = digits
                    .iter()
                    .fold(0u32, |acc, d| acc * 8 + u32::from(d - b'0'));
                out.push(u8::try_from(value).unwrap_or(b'?'));
                i += 4;
            }
            None => {
                out.push(bytes[i]);
                i += 1;
            }
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}
