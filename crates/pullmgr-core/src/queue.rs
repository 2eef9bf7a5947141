//! Shared pool of pending relative paths drained by transfer workers.

use std::collections::VecDeque;
use std::sync::Mutex;

use crate::entry::Entry;

/// Concurrent work queue. Filled once before workers start; each path is
/// handed to exactly one caller of `pop`.
#[derive(Debug, Default)]
pub struct WorkQueue {
    paths: Mutex<VecDeque<String>>,
    total_bytes: u64,
    initial_len: usize,
}

impl WorkQueue {
    /// Build from entries in the order given (callers pass them size-descending).
    pub fn from_entries(entries: &[Entry]) -> Self {
        let paths: VecDeque<String> = entries.iter().map(|e| e.relative_path.clone()).collect();
        let total_bytes = entries.iter().map(|e| e.length).sum();
        Self {
            initial_len: paths.len(),
            paths: Mutex::new(paths),
            total_bytes,
        }
    }

    /// Take the next path, or `None` once drained.
    pub fn pop(&self) -> Option<String> {
        self.paths
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .pop_front()
    }

    /// Paths not yet handed out.
    pub fn remaining(&self) -> usize {
        self.paths
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    /// Number of paths the queue was built with.
    pub fn initial_len(&self) -> usize {
        self.initial_len
    }

    /// Sum of the queued entries' lengths at construction.
    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }
}
