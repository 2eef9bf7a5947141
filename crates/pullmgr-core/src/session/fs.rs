//! Filesystem-backed session: the "remote" is a directory tree.

use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant, UNIX_EPOCH};

use walkdir::WalkDir;

use super::path::{claim_unique_path, local_path_for, temp_path};
use super::{SessionError, SessionIdentity, TransferOptions, TransferReceipt, TransferSession};
use crate::context::RunFlag;
use crate::entry::{Entry, EntryFilter, ListedEntry, SortOrder};
use crate::metrics::{TransferEvent, TransferLogSender};

const COPY_BUF_BYTES: usize = 64 * 1024;
const PROGRESS_EVERY: Duration = Duration::from_millis(250);

/// Process-wide transfer ids for transfer log events.
static NEXT_TRANSFER_ID: AtomicU64 = AtomicU64::new(1);

/// A session whose remote side is the directory `root`.
pub struct FsSession {
    identity: SessionIdentity,
    root: PathBuf,
    running: RunFlag,
    log: Option<TransferLogSender>,
}

impl FsSession {
    /// Open a session over `root`. Fails with `Unavailable` if `root` is not a directory.
    pub fn open(identity: SessionIdentity, root: impl Into<PathBuf>) -> Result<Self, SessionError> {
        let root = root.into();
        if !root.is_dir() {
            return Err(SessionError::Unavailable(format!(
                "source is not a directory: {}",
                root.display()
            )));
        }
        tracing::debug!(session = %identity, root = %root.display(), "opened filesystem session");
        Ok(Self {
            identity,
            root,
            running: RunFlag::new(),
            log: None,
        })
    }

    /// Emit transfer events to the transfer log writer.
    pub fn with_transfer_log(mut self, log: TransferLogSender) -> Self {
        self.log = Some(log);
        self
    }

    /// The flag `end` clears; exposed so callers can stop the session from elsewhere.
    pub fn run_flag(&self) -> RunFlag {
        self.running.clone()
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Progress snapshots supersede each other; a full log drops them.
    fn emit_progress(&self, event: TransferEvent) {
        if let Some(tx) = &self.log {
            let _ = tx.try_send(event);
        }
    }

    /// `Started` and `Finished` open and close a log row, so they wait for
    /// room. Must run off the async executor (transfers run on the blocking pool).
    fn emit_lifecycle(&self, event: TransferEvent) {
        if let Some(tx) = &self.log {
            if tx.blocking_send(event).is_err() {
                tracing::debug!(session = %self.identity, "transfer log closed");
            }
        }
    }

    fn copy_with_progress(
        &self,
        id: u64,
        source: &Path,
        dest: &Path,
        started: Instant,
    ) -> std::io::Result<u64> {
        let mut input = fs::File::open(source)?;
        let mut output = fs::File::create(dest)?;
        let mut buf = vec![0u8; COPY_BUF_BYTES];
        let mut bytes = 0u64;
        let mut last_report = Instant::now();
        loop {
            let n = input.read(&mut buf)?;
            if n == 0 {
                break;
            }
            output.write_all(&buf[..n])?;
            bytes += n as u64;
            if last_report.elapsed() >= PROGRESS_EVERY {
                self.emit_progress(TransferEvent::Progress {
                    id,
                    elapsed_secs: started.elapsed().as_secs_f64(),
                    bytes,
                });
                last_report = Instant::now();
            }
        }
        output.sync_all()?;
        Ok(bytes)
    }
}

fn modified_millis(meta: &fs::Metadata) -> i64 {
    meta.modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// `/`-separated path of `path` relative to `base`. `Ok(None)` for `base`
/// itself; `Err(())` when a component is not valid UTF-8 and so could not be
/// named in a listing and opened again.
fn relative_string(base: &Path, path: &Path) -> Result<Option<String>, ()> {
    let Ok(rel) = path.strip_prefix(base) else {
        return Ok(None);
    };
    let parts = rel
        .components()
        .map(|c| c.as_os_str().to_str())
        .collect::<Option<Vec<&str>>>()
        .ok_or(())?;
    if parts.is_empty() {
        Ok(None)
    } else {
        Ok(Some(parts.join("/")))
    }
}

impl TransferSession for FsSession {
    fn identity(&self) -> &SessionIdentity {
        &self.identity
    }

    fn is_running(&self) -> bool {
        self.running.is_running()
    }

    fn list(
        &self,
        path: Option<&str>,
        recursive: bool,
        filter: &dyn EntryFilter,
        order: SortOrder,
    ) -> Result<Vec<Entry>, SessionError> {
        if !self.is_running() {
            return Err(SessionError::Ended);
        }
        let base = match path {
            Some(p) => local_path_for(&self.root, p)?,
            None => self.root.clone(),
        };
        if !base.is_dir() {
            return Err(SessionError::Unavailable(format!(
                "cannot list {}",
                base.display()
            )));
        }

        let mut walker = WalkDir::new(&base).min_depth(1).sort_by_file_name();
        if !recursive {
            walker = walker.max_depth(1);
        }

        let mut listed = Vec::new();
        let mut walker = walker.into_iter();
        while let Some(item) = walker.next() {
            let item = item.map_err(|e| SessionError::Unavailable(e.to_string()))?;
            let relative_path = match relative_string(&self.root, item.path()) {
                Ok(Some(p)) => p,
                Ok(None) => continue,
                Err(()) => {
                    tracing::warn!(
                        session = %self.identity,
                        path = %item.path().display(),
                        "skipping entry whose name is not valid UTF-8"
                    );
                    if item.file_type().is_dir() {
                        walker.skip_current_dir();
                    }
                    continue;
                }
            };
            let meta = item
                .metadata()
                .map_err(|e| SessionError::Unavailable(e.to_string()))?;
            let entry = Entry::new(
                relative_path,
                if meta.is_file() { meta.len() } else { 0 },
                modified_millis(&meta),
            );
            let listed_entry = if meta.is_dir() {
                ListedEntry::directory(entry)
            } else {
                ListedEntry::file(entry)
            };
            if filter.include(&listed_entry) {
                listed.push(listed_entry);
            }
        }
        order.apply(&mut listed);
        Ok(listed.into_iter().map(|l| l.entry).collect())
    }

    fn transfer(
        &self,
        options: &TransferOptions,
        remote_path: &str,
        local_path: &Path,
    ) -> Result<TransferReceipt, SessionError> {
        if !self.is_running() {
            return Err(SessionError::Ended);
        }
        let source = local_path_for(&self.root, remote_path)?;
        let failed = |source: std::io::Error| SessionError::Transfer {
            path: remote_path.to_string(),
            source,
        };
        // A claimed name holds an empty placeholder until the rename replaces it,
        // so concurrent workers never pick the same destination or `.part` file.
        let dest = if options.unique {
            claim_unique_path(local_path).map_err(failed)?
        } else {
            local_path.to_path_buf()
        };
        let part = temp_path(&dest);

        let id = NEXT_TRANSFER_ID.fetch_add(1, Ordering::Relaxed);
        let started = Instant::now();
        self.emit_lifecycle(TransferEvent::Started {
            id,
            identity: self.identity.clone(),
            path: remote_path.to_string(),
        });

        let result = self
            .copy_with_progress(id, &source, &part, started)
            .and_then(|bytes| fs::rename(&part, &dest).map(|()| bytes));
        let elapsed_secs = started.elapsed().as_secs_f64();
        let bytes = match result {
            Ok(bytes) => bytes,
            Err(e) => {
                let _ = fs::remove_file(&part);
                if options.unique {
                    let _ = fs::remove_file(&dest);
                }
                self.emit_lifecycle(TransferEvent::Finished {
                    id,
                    ok: false,
                    elapsed_secs,
                    bytes: 0,
                });
                return Err(failed(e));
            }
        };
        self.emit_lifecycle(TransferEvent::Finished {
            id,
            ok: true,
            elapsed_secs,
            bytes,
        });

        if options.delete_source {
            if let Err(e) = fs::remove_file(&source) {
                tracing::warn!(
                    session = %self.identity,
                    path = remote_path,
                    "transferred but could not delete source: {}",
                    e
                );
            }
        }
        tracing::debug!(
            session = %self.identity,
            path = remote_path,
            local = %dest.display(),
            bytes,
            "transfer complete"
        );
        Ok(TransferReceipt {
            local_path: dest,
            bytes,
        })
    }

    fn open_sibling(&self) -> Result<Arc<dyn TransferSession>, SessionError> {
        if !self.is_running() {
            return Err(SessionError::Ended);
        }
        let mut sibling = FsSession::open(self.identity.clone(), self.root.clone())?;
        sibling.log = self.log.clone();
        Ok(Arc::new(sibling))
    }

    fn end(&self) {
        if self.running.stop() {
            tracing::debug!(session = %self.identity, "filesystem session ended");
        }
    }
}
