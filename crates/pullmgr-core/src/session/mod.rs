//! Transfer sessions: the collaborator that lists and moves remote files.
//!
//! The scheduler only talks to `TransferSession`; protocol details stay
//! behind it. `FsSession` is the built-in implementation whose remote side
//! is a directory (mounted share or staging spool).

mod error;
mod fs;
mod guard;
mod path;

pub use error::SessionError;
pub use fs::FsSession;
pub use guard::SessionGuard;
pub use path::{claim_unique_path, local_path_for};

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::entry::{Entry, EntryFilter, SortOrder};

/// Identity of a configured transfer job.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionIdentity {
    pub host: String,
    pub mailbox: String,
    pub action: String,
}

impl SessionIdentity {
    pub fn new(host: &str, mailbox: &str, action: &str) -> Self {
        Self {
            host: host.to_string(),
            mailbox: mailbox.to_string(),
            action: action.to_string(),
        }
    }
}

impl fmt::Display for SessionIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.host, self.mailbox, self.action)
    }
}

/// Per-transfer options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TransferOptions {
    /// Never overwrite an existing local file; pick a unique name instead.
    pub unique: bool,
    /// Remove the remote file after a successful transfer.
    pub delete_source: bool,
}

impl TransferOptions {
    /// Options used by the change-aware flow: keep the remote copy.
    pub fn incremental() -> Self {
        Self {
            unique: true,
            delete_source: false,
        }
    }

    /// Options used by the multi-session drain: consume the remote copy.
    pub fn drain() -> Self {
        Self {
            unique: true,
            delete_source: true,
        }
    }
}

/// Result of one successful transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferReceipt {
    /// Where the file was actually written (may differ from the request when `unique`).
    pub local_path: PathBuf,
    pub bytes: u64,
}

/// A running transfer job against one remote mailbox.
///
/// Implementations are blocking; the scheduler calls them from the blocking
/// pool. `end` must be safe to call more than once, but callers go through
/// `SessionGuard` so it runs exactly once per acquired session.
pub trait TransferSession: Send + Sync {
    fn identity(&self) -> &SessionIdentity;

    fn is_running(&self) -> bool;

    /// List entries under `path` (the remote root when `None`).
    ///
    /// `Ok(vec![])` means there is nothing to list; `Err(SessionError::Unavailable)`
    /// means the listing could not be obtained.
    fn list(
        &self,
        path: Option<&str>,
        recursive: bool,
        filter: &dyn EntryFilter,
        order: SortOrder,
    ) -> Result<Vec<Entry>, SessionError>;

    /// Transfer `remote_path` to `local_path`. Parent directories must already exist.
    fn transfer(
        &self,
        options: &TransferOptions,
        remote_path: &str,
        local_path: &Path,
    ) -> Result<TransferReceipt, SessionError>;

    /// Open another, independent session for the same identity.
    fn open_sibling(&self) -> Result<Arc<dyn TransferSession>, SessionError>;

    fn end(&self);
}
