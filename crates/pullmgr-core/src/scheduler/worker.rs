//! The blocking worker loop shared by both scheduling flows.

use std::path::Path;

use crate::queue::WorkQueue;
use crate::session::{
    local_path_for, SessionError, TransferOptions, TransferReceipt, TransferSession,
};

/// What one worker did before it exited.
#[derive(Debug, Default)]
pub struct WorkerReport {
    pub files: usize,
    pub bytes: u64,
    /// The parent session stopped while paths were still queued.
    pub stopped_early: bool,
    /// The transfer failure that stopped this worker, if any.
    pub error: Option<SessionError>,
}

impl WorkerReport {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Mirror `remote_path` under `local_root` and transfer it with `session`.
pub(crate) fn transfer_one(
    session: &dyn TransferSession,
    remote_path: &str,
    local_root: &Path,
    options: &TransferOptions,
) -> Result<TransferReceipt, SessionError> {
    let local = local_path_for(local_root, remote_path)?;
    if let Some(dir) = local.parent() {
        std::fs::create_dir_all(dir).map_err(|source| SessionError::Transfer {
            path: remote_path.to_string(),
            source,
        })?;
    }
    session.transfer(options, remote_path, &local)
}

/// Drain `queue` through `session` until it is empty, `parent` stops, or a
/// transfer fails. `parent` is checked before every dequeue.
pub fn run_worker(
    name: &str,
    parent: &dyn TransferSession,
    session: &dyn TransferSession,
    queue: &WorkQueue,
    local_root: &Path,
    options: &TransferOptions,
) -> WorkerReport {
    let mut report = WorkerReport::default();
    loop {
        if !parent.is_running() {
            report.stopped_early = queue.remaining() > 0;
            tracing::debug!(worker = name, remaining = queue.remaining(), "parent session stopped");
            break;
        }
        let Some(path) = queue.pop() else {
            break;
        };
        tracing::debug!(worker = name, path = %path, "dequeued");
        match transfer_one(session, &path, local_root, options) {
            Ok(receipt) => {
                report.files += 1;
                report.bytes += receipt.bytes;
            }
            Err(e) => {
                tracing::warn!(worker = name, path = %path, error = ?e, "transfer failed");
                report.error = Some(e);
                break;
            }
        }
    }
    report
}
