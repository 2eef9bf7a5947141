//! Transfer scheduling.
//!
//! Two flows share the same worker loop:
//! - `run_multi_session`: drain a size-descending work set with the primary
//!   session, adding a sibling session when queued bytes exceed a threshold.
//! - `run_incremental`: list, keep new or changed entries, and record each
//!   one in the manifest right after it transfers.

mod incremental;
mod plan;
mod run;
mod worker;

pub use incremental::{run_incremental, sync_changed, SyncOutcome};
pub use plan::SchedulePlan;
pub use run::{run_multi_session, ScheduleOutcome};
pub use worker::{run_worker, WorkerReport};

/// Process-style result code of a failed run.
pub const FAILURE_CODE: i32 = -1;
