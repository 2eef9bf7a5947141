//! Throwaway remote outbox, local inbox and state directory for integration tests.

use std::fs;
use std::path::{Path, PathBuf};

use pullmgr_core::config::{ActionConfig, PullConfig};
use tempfile::TempDir;

pub struct PullEnv {
    _root: TempDir,
    pub remote: PathBuf,
    pub inbox: PathBuf,
    pub state: PathBuf,
}

impl PullEnv {
    pub fn new() -> Self {
        let root = tempfile::tempdir().unwrap();
        let remote = root.path().join("outbox");
        let inbox = root.path().join("inbox");
        let state = root.path().join("state");
        for dir in [&remote, &inbox, &state] {
            fs::create_dir_all(dir).unwrap();
        }
        Self {
            _root: root,
            remote,
            inbox,
            state,
        }
    }

    /// Write `len` bytes of a repeating pattern at `relative` under the remote outbox.
    pub fn put(&self, relative: &str, len: usize) {
        let path = self.remote.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        let body: Vec<u8> = (0u8..=250).cycle().take(len).collect();
        fs::write(path, body).unwrap();
    }

    pub fn action(&self) -> ActionConfig {
        ActionConfig {
            host: "partner".into(),
            mailbox: "acme".into(),
            action: "receive".into(),
            source: url::Url::from_directory_path(&self.remote)
                .unwrap()
                .to_string(),
            exclude_suffixes: vec![".part".into()],
        }
    }

    pub fn config(&self) -> PullConfig {
        PullConfig {
            local_root: self.inbox.clone(),
            byte_threshold: 300,
            state_dir: Some(self.state.clone()),
            actions: vec![self.action()],
            ..PullConfig::default()
        }
    }

    pub fn inbox_file(&self, relative: &str) -> PathBuf {
        self.inbox.join(relative)
    }

    pub fn remote_file(&self, relative: &str) -> PathBuf {
        self.remote.join(relative)
    }
}

pub fn file_len(path: &Path) -> u64 {
    fs::metadata(path).unwrap().len()
}
