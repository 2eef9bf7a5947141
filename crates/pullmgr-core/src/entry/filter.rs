//! Listing filters: which listed entries are candidates for transfer.

use super::ListedEntry;

/// Decides whether a listed entry is included in a listing.
pub trait EntryFilter: Send + Sync {
    fn include(&self, entry: &ListedEntry) -> bool;
}

/// Regular files only; directories are traversed but never transferred.
#[derive(Debug, Clone, Copy, Default)]
pub struct FilesOnly;

impl EntryFilter for FilesOnly {
    fn include(&self, entry: &ListedEntry) -> bool {
        entry.is_file()
    }
}

/// Skip entries whose file name ends with one of the given suffixes (e.g. `.part`).
#[derive(Debug, Clone, Default)]
pub struct ExcludeSuffixes {
    suffixes: Vec<String>,
}

impl ExcludeSuffixes {
    pub fn new<I, S>(suffixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            suffixes: suffixes
                .into_iter()
                .map(Into::into)
                .filter(|s: &String| !s.is_empty())
                .collect(),
        }
    }
}

impl EntryFilter for ExcludeSuffixes {
    fn include(&self, entry: &ListedEntry) -> bool {
        let path = &entry.entry.relative_path;
        let name = path.rsplit('/').next().unwrap_or(path);
        !self.suffixes.iter().any(|s| name.ends_with(s.as_str()))
    }
}

/// Includes an entry only when every inner filter does.
#[derive(Default)]
pub struct AllOf {
    filters: Vec<Box<dyn EntryFilter>>,
}

impl AllOf {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, filter: impl EntryFilter + 'static) -> Self {
        self.filters.push(Box::new(filter));
        self
    }
}

impl EntryFilter for AllOf {
    fn include(&self, entry: &ListedEntry) -> bool {
        self.filters.iter().all(|f| f.include(entry))
    }
}
