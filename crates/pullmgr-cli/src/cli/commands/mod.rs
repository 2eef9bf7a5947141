//! CLI command handlers, one file per subcommand.

mod fetch;
mod list;
mod priority;
mod sync;

pub use fetch::run_fetch;
pub use list::run_list;
pub use priority::run_priority;
pub use sync::run_sync;

use anyhow::Result;
use pullmgr_core::config::{ActionConfig, PullConfig};
use pullmgr_core::entry::{AllOf, ExcludeSuffixes, FilesOnly};
use pullmgr_core::manifest::{JsonManifestCodec, ManifestKey, ManifestStore};
use pullmgr_core::session::{FsSession, SessionError};

/// Files only, minus the action's excluded suffixes.
pub(crate) fn action_filter(action: &ActionConfig) -> AllOf {
    AllOf::new()
        .with(FilesOnly)
        .with(ExcludeSuffixes::new(action.exclude_suffixes.iter().cloned()))
}

/// Open the filesystem session for `action`. A bad source is reported as the
/// remote being unavailable.
pub(crate) fn open_session(action: &ActionConfig) -> Result<FsSession, SessionError> {
    let dir = action
        .source_dir()
        .map_err(|e| SessionError::Unavailable(format!("{:#}", e)))?;
    FsSession::open(action.identity(), dir)
}

pub(crate) fn manifest_store(cfg: &PullConfig, action: &ActionConfig) -> Result<ManifestStore> {
    let codec = JsonManifestCodec::new(cfg.manifest_dir()?);
    Ok(ManifestStore::load(
        Box::new(codec),
        ManifestKey::for_identity(&action.identity()),
    ))
}
