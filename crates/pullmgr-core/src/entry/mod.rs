//! Remote file entries and listing filters.

mod filter;

pub use filter::{AllOf, EntryFilter, ExcludeSuffixes, FilesOnly};

use serde::{Deserialize, Serialize};

/// One remote file: relative path, size, and modification time.
///
/// Identity is the relative path; two entries with the same path but a
/// different length or modification time describe a changed file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Entry {
    pub relative_path: String,
    pub length: u64,
    /// Modification time as Unix milliseconds.
    pub modified: i64,
}

impl Entry {
    pub fn new(relative_path: impl Into<String>, length: u64, modified: i64) -> Self {
        Self {
            relative_path: relative_path.into(),
            length,
            modified,
        }
    }

    /// True when `other` has the same path, length and modification time.
    pub fn is_unchanged(&self, other: &Entry) -> bool {
        self.relative_path == other.relative_path
            && self.length == other.length
            && self.modified == other.modified
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
}

/// An entry as produced by a session listing, before filtering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListedEntry {
    pub entry: Entry,
    pub kind: EntryKind,
}

impl ListedEntry {
    pub fn file(entry: Entry) -> Self {
        Self {
            entry,
            kind: EntryKind::File,
        }
    }

    pub fn directory(entry: Entry) -> Self {
        Self {
            entry,
            kind: EntryKind::Directory,
        }
    }

    pub fn is_file(&self) -> bool {
        self.kind == EntryKind::File
    }
}

/// Ordering requested from a session listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    /// Whatever order the remote produced.
    #[default]
    Natural,
    SizeDescending,
    SizeAscending,
}

impl SortOrder {
    /// Stable sort: entries of equal size keep their natural order.
    pub fn apply(self, entries: &mut [ListedEntry]) {
        match self {
            SortOrder::Natural => {}
            SortOrder::SizeDescending => {
                entries.sort_by(|a, b| b.entry.length.cmp(&a.entry.length))
            }
            SortOrder::SizeAscending => {
                entries.sort_by(|a, b| a.entry.length.cmp(&b.entry.length))
            }
        }
    }
}
