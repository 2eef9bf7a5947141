//! Multi-session drain of a work set.

use std::sync::Arc;

use anyhow::{Context, Result};

use super::plan::SchedulePlan;
use super::worker::{run_worker, WorkerReport};
use super::FAILURE_CODE;
use crate::context::SessionContext;
use crate::entry::Entry;
use crate::queue::WorkQueue;
use crate::session::{SessionGuard, TransferOptions, TransferSession};

/// Result of `run_multi_session`. Reflects the primary worker only; the
/// secondary worker's outcome is reported by the context's supervisor.
#[derive(Debug)]
pub struct ScheduleOutcome {
    pub plan: SchedulePlan,
    pub second_session: bool,
    pub primary: WorkerReport,
}

impl ScheduleOutcome {
    pub fn is_success(&self) -> bool {
        self.primary.is_success()
    }

    /// 0 on success, -1 when the primary worker failed.
    pub fn code(&self) -> i32 {
        if self.is_success() {
            0
        } else {
            FAILURE_CODE
        }
    }
}

/// Drain `entries` (size-descending) through `primary`.
///
/// When the plan calls for it, a sibling session is opened and its worker is
/// registered with the context's supervisor before the primary worker starts.
/// The sibling stops at its next dequeue once `primary` ends; callers end the
/// primary session and then call `SessionContext::finish` to join it.
pub async fn run_multi_session(
    ctx: &SessionContext,
    primary: &Arc<dyn TransferSession>,
    entries: &[Entry],
    threshold: u64,
    options: TransferOptions,
) -> Result<ScheduleOutcome> {
    let plan = SchedulePlan::new(entries, threshold);
    let queue = Arc::new(WorkQueue::from_entries(entries));
    let local_root = ctx.config().local_root.clone();
    tracing::info!(
        session = %primary.identity(),
        files = plan.file_count,
        bytes = plan.total_bytes,
        threshold,
        "scheduling transfers"
    );

    let mut second_session = false;
    if plan.wants_second_session() {
        match primary.open_sibling() {
            Ok(sibling) => {
                second_session = true;
                let parent = Arc::clone(primary);
                let queue = Arc::clone(&queue);
                let local_root = local_root.clone();
                ctx.supervisor().spawn_blocking("secondary-worker", move || {
                    let guard = SessionGuard::new(sibling);
                    let report = run_worker(
                        "secondary",
                        parent.as_ref(),
                        guard.session().as_ref(),
                        &queue,
                        &local_root,
                        &options,
                    );
                    tracing::info!(
                        worker = "secondary",
                        files = report.files,
                        bytes = report.bytes,
                        stopped_early = report.stopped_early,
                        "worker finished"
                    );
                    match report.error {
                        Some(e) => Err(anyhow::Error::new(e).context("secondary worker")),
                        None => Ok(()),
                    }
                });
            }
            Err(e) => {
                tracing::warn!(
                    session = %primary.identity(),
                    "could not open second session, continuing with one: {:#}",
                    anyhow::Error::new(e)
                );
            }
        }
    }

    let report = {
        let session = Arc::clone(primary);
        let queue = Arc::clone(&queue);
        tokio::task::spawn_blocking(move || {
            run_worker(
                "primary",
                session.as_ref(),
                session.as_ref(),
                &queue,
                &local_root,
                &options,
            )
        })
        .await
        .context("primary worker join")?
    };
    tracing::info!(
        worker = "primary",
        files = report.files,
        bytes = report.bytes,
        stopped_early = report.stopped_early,
        ok = report.is_success(),
        "worker finished"
    );

    Ok(ScheduleOutcome {
        plan,
        second_session,
        primary: report,
    })
}
