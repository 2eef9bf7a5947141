//! Session-scoped context: run flags and supervised background tasks.
//!
//! A `SessionContext` is created per CLI invocation and passed by reference
//! to the scheduler and monitor. Background work (the sibling transfer worker,
//! the rate monitor, the transfer-log writer) is registered with its
//! `Supervisor` so it is joined when the session ends instead of outliving it.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use tokio::task::JoinSet;

use crate::config::PullConfig;

/// Shared "is running" flag of a session. Workers and monitors poll it; there
/// is no preemptive cancellation.
#[derive(Debug, Clone)]
pub struct RunFlag(Arc<AtomicBool>);

impl RunFlag {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(true)))
    }

    pub fn is_running(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Mark as stopped. Returns true if this call performed the transition.
    pub fn stop(&self) -> bool {
        self.0.swap(false, Ordering::AcqRel)
    }
}

impl Default for RunFlag {
    fn default() -> Self {
        Self::new()
    }
}

/// Outcome of one supervised task, reported when the session ends.
#[derive(Debug)]
pub struct TaskReport {
    pub name: &'static str,
    pub result: Result<()>,
}

/// Owner of background task handles; joins them deterministically.
#[derive(Default)]
pub struct Supervisor {
    tasks: Mutex<JoinSet<TaskReport>>,
}

impl Supervisor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track an async task. Must be called from within a tokio runtime.
    pub fn spawn<F>(&self, name: &'static str, fut: F)
    where
        F: Future<Output = Result<()>> + Send + 'static,
    {
        tracing::debug!(task = name, "spawning supervised task");
        self.lock().spawn(async move {
            TaskReport {
                name,
                result: fut.await,
            }
        });
    }

    /// Track a blocking task (e.g. a transfer worker) on the blocking pool.
    pub fn spawn_blocking<F>(&self, name: &'static str, f: F)
    where
        F: FnOnce() -> Result<()> + Send + 'static,
    {
        tracing::debug!(task = name, "spawning supervised blocking task");
        self.lock().spawn_blocking(move || TaskReport { name, result: f() });
    }

    /// Number of tracked tasks not yet joined.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Wait for every tracked task. Panicked or cancelled tasks are reported as errors.
    pub async fn join_all(&self) -> Vec<TaskReport> {
        let mut set = std::mem::take(&mut *self.lock());
        let mut reports = Vec::with_capacity(set.len());
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(report) => reports.push(report),
                Err(e) => reports.push(TaskReport {
                    name: "unknown",
                    result: Err(anyhow::anyhow!("supervised task join: {}", e)),
                }),
            }
        }
        reports
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, JoinSet<TaskReport>> {
        self.tasks.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Per-invocation context passed by reference to every component.
pub struct SessionContext {
    config: Arc<PullConfig>,
    supervisor: Supervisor,
}

impl SessionContext {
    pub fn new(config: PullConfig) -> Self {
        Self {
            config: Arc::new(config),
            supervisor: Supervisor::new(),
        }
    }

    pub fn config(&self) -> &Arc<PullConfig> {
        &self.config
    }

    pub fn supervisor(&self) -> &Supervisor {
        &self.supervisor
    }

    /// Join every supervised task and log its outcome. Call after the primary
    /// session has ended so workers and monitors observe the stop.
    pub async fn finish(&self) -> Vec<TaskReport> {
        let reports = self.supervisor.join_all().await;
        for report in &reports {
            match &report.result {
                Ok(()) => tracing::debug!(task = report.name, "supervised task finished"),
                Err(e) => tracing::warn!(task = report.name, "supervised task failed: {:#}", e),
            }
        }
        reports
    }
}
