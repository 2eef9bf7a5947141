//! Live transfer metrics: the transfer log written by sessions and the
//! pooled metrics source the rate monitor samples.

mod db;
mod log_writer;
mod pool;

pub use db::{TransferLogDb, TransferRecord, TransferStatus};
pub use log_writer::run_transfer_log_loop;
pub use pool::{SqliteMetricsHandle, SqliteMetricsPool};

use anyhow::Result;
use async_trait::async_trait;

use crate::session::SessionIdentity;

/// Elapsed time and bytes moved so far for one in-progress transfer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransferSample {
    pub elapsed_secs: f64,
    pub bytes: u64,
}

impl TransferSample {
    /// Rate in KB/sec (`bytes / 1024 / elapsed`), or `None` before any time has passed.
    pub fn rate_kbps(&self) -> Option<f64> {
        if self.elapsed_secs <= 0.0 {
            return None;
        }
        Some(self.bytes as f64 / 1024.0 / self.elapsed_secs)
    }
}

/// Progress events emitted by a session while it transfers a file.
#[derive(Debug, Clone)]
pub enum TransferEvent {
    Started {
        id: u64,
        identity: SessionIdentity,
        path: String,
    },
    Progress {
        id: u64,
        elapsed_secs: f64,
        bytes: u64,
    },
    Finished {
        id: u64,
        ok: bool,
        elapsed_secs: f64,
        bytes: u64,
    },
}

pub type TransferLogSender = tokio::sync::mpsc::Sender<TransferEvent>;

/// Source of live metrics for the transfer a session currently has in flight.
#[async_trait]
pub trait MetricsSource: Send {
    async fn query(&mut self, identity: &SessionIdentity) -> Result<Option<TransferSample>>;
}

/// Pool of metrics handles. Every acquired handle goes back through `release`.
#[async_trait]
pub trait MetricsPool: Send + Sync {
    type Handle: MetricsSource + Send;

    async fn acquire(&self) -> Result<Self::Handle>;

    fn release(&self, handle: Self::Handle);
}
