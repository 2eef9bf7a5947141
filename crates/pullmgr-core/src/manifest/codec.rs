//! Manifest persistence: versioned JSON documents, one file per key.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};

use super::{Manifest, ManifestKey};
use crate::entry::Entry;

/// Current on-disk format version.
pub const MANIFEST_VERSION: u32 = 1;

/// Persists and restores manifests by key.
pub trait ManifestCodec: Send + Sync {
    /// Durably store `manifest` under `key`, replacing any previous document.
    fn serialize(&self, manifest: &Manifest, key: &ManifestKey) -> Result<()>;

    /// `Ok(None)` when nothing has been stored under `key` yet.
    fn deserialize(&self, key: &ManifestKey) -> Result<Option<Manifest>>;
}

#[derive(Serialize, Deserialize)]
struct ManifestDocument {
    version: u32,
    entries: Vec<Entry>,
}

/// Stores manifests as `<dir>/<key>.json`, written via temp file + rename.
#[derive(Debug, Clone)]
pub struct JsonManifestCodec {
    dir: PathBuf,
}

impl JsonManifestCodec {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, key: &ManifestKey) -> PathBuf {
        self.dir.join(key.file_name())
    }
}

impl ManifestCodec for JsonManifestCodec {
    fn serialize(&self, manifest: &Manifest, key: &ManifestKey) -> Result<()> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("create manifest dir: {}", self.dir.display()))?;
        let doc = ManifestDocument {
            version: MANIFEST_VERSION,
            entries: manifest.entries().to_vec(),
        };
        let json = serde_json::to_vec_pretty(&doc).context("serialize manifest")?;
        let path = self.path_for(key);
        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir)
            .with_context(|| format!("create temp manifest in {}", self.dir.display()))?;
        tmp.write_all(&json).context("write manifest")?;
        tmp.as_file().sync_all().context("sync manifest")?;
        tmp.persist(&path)
            .with_context(|| format!("replace manifest: {}", path.display()))?;
        Ok(())
    }

    fn deserialize(&self, key: &ManifestKey) -> Result<Option<Manifest>> {
        let path = self.path_for(key);
        let bytes = match std::fs::read(&path) {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e).with_context(|| format!("read manifest: {}", path.display())),
        };
        let doc: ManifestDocument = serde_json::from_slice(&bytes)
            .with_context(|| format!("parse manifest: {}", path.display()))?;
        if doc.version > MANIFEST_VERSION {
            anyhow::bail!(
                "manifest {} has unsupported version {} (newest known is {})",
                path.display(),
                doc.version,
                MANIFEST_VERSION
            );
        }
        Ok(Some(Manifest::from_entries(doc.entries)))
    }
}
