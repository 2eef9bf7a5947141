use anyhow::{Context, Result};

use super::{Manifest, ManifestCodec, ManifestKey};
use crate::entry::Entry;

/// How a freshly listed entry relates to the manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    New,
    Changed,
    Unchanged,
}

impl ChangeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ChangeKind::New => "new",
            ChangeKind::Changed => "changed",
            ChangeKind::Unchanged => "unchanged",
        }
    }
}

/// In-memory manifest for one key plus the codec that persists it.
pub struct ManifestStore {
    codec: Box<dyn ManifestCodec>,
    key: ManifestKey,
    manifest: Manifest,
}

impl ManifestStore {
    /// Load the manifest for `key`. A missing, unreadable or corrupt document
    /// yields an empty manifest (a warning is logged), so the next run
    /// re-transfers everything rather than failing.
    pub fn load(codec: Box<dyn ManifestCodec>, key: ManifestKey) -> Self {
        let manifest = match codec.deserialize(&key) {
            Ok(Some(m)) => {
                tracing::debug!(key = %key, entries = m.len(), "loaded manifest");
                m
            }
            Ok(None) => {
                tracing::debug!(key = %key, "no manifest yet; starting empty");
                Manifest::default()
            }
            Err(e) => {
                tracing::warn!(key = %key, "ignoring unreadable manifest: {:#}", e);
                Manifest::default()
            }
        };
        Self {
            codec,
            key,
            manifest,
        }
    }

    pub fn key(&self) -> &ManifestKey {
        &self.key
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    /// Classify each fresh entry without touching the manifest.
    pub fn classify(&self, fresh: &[Entry]) -> Vec<(Entry, ChangeKind)> {
        fresh
            .iter()
            .map(|entry| {
                let kind = match self.manifest.find(&entry.relative_path) {
                    None => ChangeKind::New,
                    Some(known) if known.is_unchanged(entry) => ChangeKind::Unchanged,
                    Some(_) => ChangeKind::Changed,
                };
                (entry.clone(), kind)
            })
            .collect()
    }

    /// Entries of `fresh` that are new or changed, in `fresh` order.
    ///
    /// Stale manifest entries of changed files are dropped from memory so the
    /// entry recorded after the re-transfer replaces them. Nothing is persisted.
    pub fn detect_changes(&mut self, fresh: &[Entry]) -> Vec<Entry> {
        let mut pending = Vec::new();
        for (entry, kind) in self.classify(fresh) {
            match kind {
                ChangeKind::Unchanged => {}
                ChangeKind::Changed => {
                    self.manifest.remove(&entry.relative_path);
                    pending.push(entry);
                }
                ChangeKind::New => pending.push(entry),
            }
        }
        tracing::debug!(
            key = %self.key,
            listed = fresh.len(),
            pending = pending.len(),
            "change detection"
        );
        pending
    }

    /// Append `entry` and persist the whole manifest before returning.
    /// Call only after the file's transfer has succeeded.
    pub fn record(&mut self, entry: Entry) -> Result<()> {
        self.manifest.push(entry);
        self.codec
            .serialize(&self.manifest, &self.key)
            .with_context(|| format!("persist manifest {}", self.key))
    }
}
