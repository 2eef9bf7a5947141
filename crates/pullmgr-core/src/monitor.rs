//! Background throughput monitor that escalates the priority mode once.

use std::time::Duration;

use anyhow::{Context, Result};

use crate::metrics::{MetricsPool, MetricsSource};
use crate::priority::{ConfigStore, PriorityController, PriorityState};
use crate::session::TransferSession;

/// Samples with less elapsed time than this are too noisy to judge.
const MIN_SAMPLE_SECS: f64 = 2.0;

/// Why a monitor run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorExit {
    /// Priority was already High; nothing was sampled.
    AlreadyHigh,
    /// The session stopped before throughput dropped below the minimum.
    SessionEnded,
    /// Throughput dropped below the minimum and priority was raised to High.
    Escalated,
}

#[derive(Debug, Clone, Copy)]
pub struct RateMonitor {
    pub min_rate_kbps: f64,
    pub interval: Duration,
}

/// Returns the handle to its pool exactly once, however the loop exits.
struct HandleGuard<'a, P: MetricsPool> {
    pool: &'a P,
    handle: Option<P::Handle>,
}

impl<P: MetricsPool> HandleGuard<'_, P> {
    fn source(&mut self) -> &mut P::Handle {
        self.handle
            .as_mut()
            .unwrap_or_else(|| unreachable!("handle is only taken in drop"))
    }
}

impl<P: MetricsPool> Drop for HandleGuard<'_, P> {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.pool.release(handle);
        }
    }
}

impl RateMonitor {
    pub fn new(min_rate_kbps: f64, interval: Duration) -> Self {
        Self {
            min_rate_kbps,
            interval,
        }
    }

    /// Watch `session` until it stops or its transfer rate drops below
    /// `min_rate_kbps`, in which case priority is raised to High. Priority is
    /// never lowered again by the monitor.
    pub async fn run<P, S>(
        &self,
        session: &dyn TransferSession,
        pool: &P,
        priority: &PriorityController<S>,
    ) -> Result<MonitorExit>
    where
        P: MetricsPool,
        S: ConfigStore,
    {
        if priority.get_state() == PriorityState::High {
            tracing::debug!(session = %session.identity(), "priority already high; monitor idle");
            return Ok(MonitorExit::AlreadyHigh);
        }

        let handle = pool.acquire().await.context("acquire metrics handle")?;
        let mut guard = HandleGuard {
            pool,
            handle: Some(handle),
        };

        while session.is_running() {
            match guard.source().query(session.identity()).await {
                Ok(Some(sample)) if sample.elapsed_secs >= MIN_SAMPLE_SECS => {
                    if let Some(rate) = sample.rate_kbps() {
                        tracing::debug!(
                            session = %session.identity(),
                            rate_kbps = rate,
                            elapsed_secs = sample.elapsed_secs,
                            "transfer rate sample"
                        );
                        if rate < self.min_rate_kbps {
                            tracing::info!(
                                session = %session.identity(),
                                rate_kbps = rate,
                                min_rate_kbps = self.min_rate_kbps,
                                "transfer rate below minimum; raising priority"
                            );
                            priority
                                .set_state(PriorityState::High)
                                .context("raise priority")?;
                            return Ok(MonitorExit::Escalated);
                        }
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(session = %session.identity(), "metrics query failed: {:#}", e)
                }
            }
            tokio::time::sleep(self.interval).await;
        }
        Ok(MonitorExit::SessionEnded)
    }
}
