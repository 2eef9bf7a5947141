//! In-memory `TransferSession` for unit tests.

use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::context::RunFlag;
use crate::entry::{Entry, EntryFilter, ListedEntry, SortOrder};
use crate::session::{
    SessionError, SessionIdentity, TransferOptions, TransferReceipt, TransferSession,
};

/// State shared by a scripted session and every sibling it opens.
#[derive(Default)]
pub(crate) struct Shared {
    pub transfers: Mutex<Vec<(&'static str, String)>>,
    pub fail_paths: Mutex<HashSet<String>>,
    pub siblings_opened: AtomicUsize,
    pub ends: AtomicUsize,
    pub refuse_sibling: AtomicBool,
    pub transfer_delay: Mutex<Duration>,
}

impl Shared {
    pub fn transferred_paths(&self) -> Vec<String> {
        self.transfers
            .lock()
            .unwrap()
            .iter()
            .map(|(_, p)| p.clone())
            .collect()
    }

    pub fn transfers_by(&self, label: &str) -> usize {
        self.transfers
            .lock()
            .unwrap()
            .iter()
            .filter(|(l, _)| *l == label)
            .count()
    }
}

pub(crate) struct ScriptedSession {
    identity: SessionIdentity,
    label: &'static str,
    listing: Option<Vec<Entry>>,
    running: RunFlag,
    shared: Arc<Shared>,
}

impl ScriptedSession {
    pub fn with_listing(entries: Vec<Entry>) -> Self {
        Self {
            identity: SessionIdentity::new("host", "mailbox", "action"),
            label: "primary",
            listing: Some(entries),
            running: RunFlag::new(),
            shared: Arc::new(Shared::default()),
        }
    }

    pub fn unavailable() -> Self {
        Self {
            listing: None,
            ..Self::with_listing(Vec::new())
        }
    }

    pub fn fail_on(self, path: &str) -> Self {
        self.shared.fail_paths.lock().unwrap().insert(path.to_string());
        self
    }

    pub fn refuse_sibling(self) -> Self {
        self.shared.refuse_sibling.store(true, Ordering::SeqCst);
        self
    }

    pub fn transfer_delay(self, delay: Duration) -> Self {
        *self.shared.transfer_delay.lock().unwrap() = delay;
        self
    }

    pub fn shared(&self) -> Arc<Shared> {
        Arc::clone(&self.shared)
    }

    pub fn run_flag(&self) -> RunFlag {
        self.running.clone()
    }
}

impl TransferSession for ScriptedSession {
    fn identity(&self) -> &SessionIdentity {
        &self.identity
    }

    fn is_running(&self) -> bool {
        self.running.is_running()
    }

    fn list(
        &self,
        _path: Option<&str>,
        _recursive: bool,
        filter: &dyn EntryFilter,
        order: SortOrder,
    ) -> Result<Vec<Entry>, SessionError> {
        let Some(entries) = &self.listing else {
            return Err(SessionError::Unavailable("scripted outage".into()));
        };
        let mut listed: Vec<ListedEntry> = entries
            .iter()
            .cloned()
            .map(ListedEntry::file)
            .filter(|e| filter.include(e))
            .collect();
        order.apply(&mut listed);
        Ok(listed.into_iter().map(|l| l.entry).collect())
    }

    fn transfer(
        &self,
        _options: &TransferOptions,
        remote_path: &str,
        local_path: &Path,
    ) -> Result<TransferReceipt, SessionError> {
        let delay = *self.shared.transfer_delay.lock().unwrap();
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
        if self.shared.fail_paths.lock().unwrap().contains(remote_path) {
            return Err(SessionError::Transfer {
                path: remote_path.to_string(),
                source: std::io::Error::new(std::io::ErrorKind::Other, "scripted failure"),
            });
        }
        std::fs::write(local_path, remote_path.as_bytes()).map_err(|source| {
            SessionError::Transfer {
                path: remote_path.to_string(),
                source,
            }
        })?;
        self.shared
            .transfers
            .lock()
            .unwrap()
            .push((self.label, remote_path.to_string()));
        Ok(TransferReceipt {
            local_path: local_path.to_path_buf(),
            bytes: remote_path.len() as u64,
        })
    }

    fn open_sibling(&self) -> Result<Arc<dyn TransferSession>, SessionError> {
        if self.shared.refuse_sibling.load(Ordering::SeqCst) {
            return Err(SessionError::Unavailable("no sibling sessions".into()));
        }
        self.shared.siblings_opened.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(ScriptedSession {
            identity: self.identity.clone(),
            label: "sibling",
            listing: self.listing.clone(),
            running: RunFlag::new(),
            shared: Arc::clone(&self.shared),
        }))
    }

    fn end(&self) {
        if self.running.stop() {
            self.shared.ends.fetch_add(1, Ordering::SeqCst);
        }
    }
}
