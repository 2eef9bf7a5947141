//! Record of previously transferred files and change detection against it.

mod codec;
mod key;
mod store;

pub use codec::{JsonManifestCodec, ManifestCodec, MANIFEST_VERSION};
pub use key::ManifestKey;
pub use store::{ChangeKind, ManifestStore};

use crate::entry::Entry;

/// Entries previously transferred, unique by relative path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    entries: Vec<Entry>,
}

impl Manifest {
    /// Build from persisted entries. A later duplicate path replaces the earlier one.
    pub fn from_entries(entries: Vec<Entry>) -> Self {
        let mut manifest = Self::default();
        for entry in entries {
            manifest.push(entry);
        }
        manifest
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn find(&self, relative_path: &str) -> Option<&Entry> {
        self.entries
            .iter()
            .find(|e| e.relative_path == relative_path)
    }

    /// Remove the entry for `relative_path`, if any.
    pub fn remove(&mut self, relative_path: &str) -> Option<Entry> {
        let idx = self
            .entries
            .iter()
            .position(|e| e.relative_path == relative_path)?;
        Some(self.entries.remove(idx))
    }

    /// Append `entry`, replacing an existing entry with the same path.
    pub fn push(&mut self, entry: Entry) {
        self.remove(&entry.relative_path);
        self.entries.push(entry);
    }
}
