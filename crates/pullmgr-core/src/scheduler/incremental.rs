//! Single-session "only new or changed files" flow.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};

use super::worker::transfer_one;
use super::FAILURE_CODE;
use crate::context::SessionContext;
use crate::entry::EntryFilter;
use crate::lister::list_entries;
use crate::manifest::ManifestStore;
use crate::session::{SessionError, TransferOptions, TransferSession};

#[derive(Debug, Default)]
pub struct SyncOutcome {
    pub listed: usize,
    pub pending: usize,
    pub transferred: usize,
    pub bytes: u64,
    /// Listing or transfer failure that ended the run.
    pub error: Option<SessionError>,
}

impl SyncOutcome {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    pub fn code(&self) -> i32 {
        if self.is_success() {
            0
        } else {
            FAILURE_CODE
        }
    }
}

/// Run `sync_changed` on the blocking pool with the context's local root.
pub async fn run_incremental(
    ctx: &SessionContext,
    session: &Arc<dyn TransferSession>,
    store: ManifestStore,
    filter: Arc<dyn EntryFilter>,
    options: TransferOptions,
) -> Result<SyncOutcome> {
    let config = Arc::clone(ctx.config());
    let session = Arc::clone(session);
    tokio::task::spawn_blocking(move || {
        let mut store = store;
        sync_changed(
            session.as_ref(),
            &mut store,
            filter.as_ref(),
            &config.local_root,
            &options,
        )
    })
    .await
    .context("incremental sync join")?
}

/// List the remote, transfer new or changed entries largest first, and
/// record each in the manifest as soon as its transfer succeeds. Stops at the
/// first failed transfer; files already recorded stay recorded.
///
/// A failed listing or transfer is reported in the outcome. Only a failure to
/// persist the manifest is returned as `Err`.
pub fn sync_changed(
    session: &dyn TransferSession,
    store: &mut ManifestStore,
    filter: &dyn EntryFilter,
    local_root: &Path,
    options: &TransferOptions,
) -> Result<SyncOutcome> {
    let mut outcome = SyncOutcome::default();
    let fresh = match list_entries(session, filter, true) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!(session = %session.identity(), error = ?e, "listing failed");
            outcome.error = Some(e);
            return Ok(outcome);
        }
    };
    outcome.listed = fresh.len();

    let pending = store.detect_changes(&fresh);
    outcome.pending = pending.len();
    if pending.is_empty() {
        tracing::info!(session = %session.identity(), listed = outcome.listed, "nothing new to transfer");
        return Ok(outcome);
    }

    for entry in pending {
        if !session.is_running() {
            tracing::debug!(session = %session.identity(), "session stopped; ending sync");
            break;
        }
        match transfer_one(session, &entry.relative_path, local_root, options) {
            Ok(receipt) => {
                outcome.transferred += 1;
                outcome.bytes += receipt.bytes;
                store.record(entry)?;
            }
            Err(e) => {
                tracing::warn!(
                    session = %session.identity(),
                    path = %entry.relative_path,
                    error = ?e,
                    "transfer failed; stopping sync"
                );
                outcome.error = Some(e);
                break;
            }
        }
    }
    tracing::info!(
        session = %session.identity(),
        listed = outcome.listed,
        pending = outcome.pending,
        transferred = outcome.transferred,
        bytes = outcome.bytes,
        "sync finished"
    );
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PullConfig;
    use crate::entry::{Entry, FilesOnly};
    use crate::manifest::{JsonManifestCodec, ManifestKey};
    use crate::session::SessionIdentity;
    use crate::test_support::ScriptedSession;

    fn store_in(dir: &Path) -> ManifestStore {
        ManifestStore::load(
            Box::new(JsonManifestCodec::new(dir)),
            ManifestKey::for_identity(&SessionIdentity::new("host", "mailbox", "action")),
        )
    }

    #[test]
    fn empty_listing_succeeds_without_touching_manifest() {
        let state = tempfile::tempdir().unwrap();
        let inbox = tempfile::tempdir().unwrap();
        let session = ScriptedSession::with_listing(Vec::new());
        let mut store = store_in(state.path());

        let outcome = sync_changed(
            &session,
            &mut store,
            &FilesOnly,
            inbox.path(),
            &TransferOptions::incremental(),
        )
        .unwrap();
        assert_eq!(outcome.code(), 0);
        assert_eq!(outcome.transferred, 0);
        assert_eq!(std::fs::read_dir(state.path()).unwrap().count(), 0);
    }

    #[test]
    fn single_new_file_is_transferred_and_recorded() {
        let state = tempfile::tempdir().unwrap();
        let inbox = tempfile::tempdir().unwrap();
        let session = ScriptedSession::with_listing(vec![Entry::new("in/report.csv", 42, 7)]);
        let mut store = store_in(state.path());

        let outcome = sync_changed(
            &session,
            &mut store,
            &FilesOnly,
            inbox.path(),
            &TransferOptions::incremental(),
        )
        .unwrap();
        assert_eq!(outcome.transferred, 1);
        assert!(inbox.path().join("in/report.csv").is_file());
        let reloaded = store_in(state.path());
        assert_eq!(reloaded.manifest().entries(), &[Entry::new("in/report.csv", 42, 7)]);
    }

    #[test]
    fn second_run_transfers_nothing() {
        let state = tempfile::tempdir().unwrap();
        let inbox = tempfile::tempdir().unwrap();
        let listing = vec![Entry::new("a", 20, 1), Entry::new("b", 10, 1)];

        let session = ScriptedSession::with_listing(listing.clone());
        let mut store = store_in(state.path());
        let opts = TransferOptions::incremental();
        sync_changed(&session, &mut store, &FilesOnly, inbox.path(), &opts).unwrap();

        let again = ScriptedSession::with_listing(listing);
        let mut store = store_in(state.path());
        let outcome = sync_changed(&again, &mut store, &FilesOnly, inbox.path(), &opts).unwrap();
        assert_eq!(outcome.pending, 0);
        assert!(again.shared().transferred_paths().is_empty());
    }

    #[test]
    fn failure_stops_and_keeps_earlier_records() {
        let state = tempfile::tempdir().unwrap();
        let inbox = tempfile::tempdir().unwrap();
        let session = ScriptedSession::with_listing(vec![
            Entry::new("first", 30, 1),
            Entry::new("second", 20, 1),
            Entry::new("third", 10, 1),
        ])
        .fail_on("second");
        let mut store = store_in(state.path());

        let outcome = sync_changed(
            &session,
            &mut store,
            &FilesOnly,
            inbox.path(),
            &TransferOptions::incremental(),
        )
        .unwrap();
        assert_eq!(outcome.code(), -1);
        assert_eq!(outcome.transferred, 1);
        assert_eq!(session.shared().transferred_paths(), ["first"]);
        let reloaded = store_in(state.path());
        assert_eq!(reloaded.manifest().len(), 1);
        assert!(reloaded.manifest().find("first").is_some());
    }

    #[test]
    fn unavailable_listing_is_failure() {
        let state = tempfile::tempdir().unwrap();
        let inbox = tempfile::tempdir().unwrap();
        let mut store = store_in(state.path());
        let outcome = sync_changed(
            &ScriptedSession::unavailable(),
            &mut store,
            &FilesOnly,
            inbox.path(),
            &TransferOptions::incremental(),
        )
        .unwrap();
        assert!(matches!(outcome.error, Some(SessionError::Unavailable(_))));
        assert_eq!(outcome.code(), -1);
    }

    #[tokio::test]
    async fn run_incremental_uses_context_root() {
        let state = tempfile::tempdir().unwrap();
        let inbox = tempfile::tempdir().unwrap();
        let ctx = SessionContext::new(PullConfig {
            local_root: inbox.path().to_path_buf(),
            ..PullConfig::default()
        });
        let session: Arc<dyn TransferSession> =
            Arc::new(ScriptedSession::with_listing(vec![Entry::new("x.txt", 1, 1)]));

        let outcome = run_incremental(
            &ctx,
            &session,
            store_in(state.path()),
            Arc::new(FilesOnly),
            TransferOptions::incremental(),
        )
        .await
        .unwrap();
        assert_eq!(outcome.transferred, 1);
        assert!(inbox.path().join("x.txt").is_file());
    }
}
