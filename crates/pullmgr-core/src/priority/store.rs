//! Key/value option stores backing the priority mode.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigStoreError {
    #[error("read options file {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parse options file {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("write options file {path}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// String options store. `save` is durable when it returns `Ok`.
pub trait ConfigStore: Send {
    fn get(&self, key: &str) -> Option<String>;

    fn set(&mut self, key: &str, value: &str);

    fn save(&mut self) -> Result<(), ConfigStoreError>;
}

/// Options kept as a flat TOML table (`options.toml`).
///
/// Reads always go to the file, and `save` merges unsaved `set`s into what is
/// on disk, so other processes' changes to other keys survive.
#[derive(Debug)]
pub struct TomlConfigStore {
    path: PathBuf,
    pending: BTreeMap<String, String>,
}

fn read_values(path: &Path) -> Result<BTreeMap<String, String>, ConfigStoreError> {
    match std::fs::read_to_string(path) {
        Ok(s) => toml::from_str(&s).map_err(|source| ConfigStoreError::Parse {
            path: path.to_path_buf(),
            source,
        }),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
        Err(source) => Err(ConfigStoreError::Read {
            path: path.to_path_buf(),
            source,
        }),
    }
}

impl TomlConfigStore {
    /// Open the store at `path`; a missing file is an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, ConfigStoreError> {
        let path = path.into();
        read_values(&path)?;
        Ok(Self {
            path,
            pending: BTreeMap::new(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_atomic(&self, values: &BTreeMap<String, String>) -> std::io::Result<()> {
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir)?;
        let body = toml::to_string(values)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
        tmp.write_all(body.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| e.error)?;
        Ok(())
    }
}

impl ConfigStore for TomlConfigStore {
    fn get(&self, key: &str) -> Option<String> {
        if let Some(value) = self.pending.get(key) {
            return Some(value.clone());
        }
        match read_values(&self.path) {
            Ok(mut values) => values.remove(key),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), "options unreadable: {}", e);
                None
            }
        }
    }

    fn set(&mut self, key: &str, value: &str) {
        self.pending.insert(key.to_string(), value.to_string());
    }

    fn save(&mut self) -> Result<(), ConfigStoreError> {
        let mut values = read_values(&self.path)?;
        values.extend(self.pending.iter().map(|(k, v)| (k.clone(), v.clone())));
        self.write_atomic(&values)
            .map_err(|source| ConfigStoreError::Write {
                path: self.path.clone(),
                source,
            })?;
        self.pending.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_empty_and_save_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cfg").join("options.toml");
        let mut store = TomlConfigStore::open(&path).unwrap();
        assert_eq!(store.get("k"), None);

        store.set("k", "90");
        store.save().unwrap();
        let reopened = TomlConfigStore::open(&path).unwrap();
        assert_eq!(reopened.get("k").as_deref(), Some("90"));
    }

    #[test]
    fn reads_and_saves_see_other_writers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("options.toml");
        let mut monitor = TomlConfigStore::open(&path).unwrap();
        let mut cli = TomlConfigStore::open(&path).unwrap();

        monitor.set("k", "90");
        monitor.save().unwrap();
        assert_eq!(cli.get("k").as_deref(), Some("90"));

        cli.set("k", "75");
        cli.save().unwrap();
        assert_eq!(monitor.get("k").as_deref(), Some("75"));

        monitor.set("other", "x");
        monitor.save().unwrap();
        let reopened = TomlConfigStore::open(&path).unwrap();
        assert_eq!(reopened.get("k").as_deref(), Some("75"));
        assert_eq!(reopened.get("other").as_deref(), Some("x"));
    }

    #[test]
    fn garbage_file_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("options.toml");
        std::fs::write(&path, "= = =").unwrap();
        assert!(matches!(
            TomlConfigStore::open(&path),
            Err(ConfigStoreError::Parse { .. })
        ));
    }

    #[test]
    fn save_into_unwritable_location_fails() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        let mut store = TomlConfigStore::open(blocker.join("options.toml")).unwrap();
        std::fs::write(&blocker, b"x").unwrap();
        store.set("k", "75");
        assert!(matches!(
            store.save(),
            Err(ConfigStoreError::Read { .. } | ConfigStoreError::Write { .. })
        ));
        // The unsaved value is still visible to this store.
        assert_eq!(store.get("k").as_deref(), Some("75"));
    }
}
