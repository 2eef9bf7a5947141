//! `pullmgr fetch` – drain an action with one or two sessions, optionally
//! watched by the rate monitor.

use std::sync::Arc;

use anyhow::{Context, Result};
use pullmgr_core::config::{self, PullConfig};
use pullmgr_core::context::SessionContext;
use pullmgr_core::lister::list_entries;
use pullmgr_core::metrics::{run_transfer_log_loop, SqliteMetricsPool, TransferLogDb};
use pullmgr_core::monitor::RateMonitor;
use pullmgr_core::priority::{PriorityController, TomlConfigStore};
use pullmgr_core::scheduler::{run_multi_session, FAILURE_CODE};
use pullmgr_core::session::{SessionGuard, TransferOptions, TransferSession};

use super::{action_filter, open_session};

/// Transfer events buffered between sessions and the log writer.
const TRANSFER_LOG_CAPACITY: usize = 256;

pub async fn run_fetch(
    cfg: PullConfig,
    selector: &str,
    threshold: Option<u64>,
    min_rate: Option<f64>,
) -> Result<i32> {
    let action = cfg.find_action(selector)?.clone();
    let threshold = threshold.unwrap_or(cfg.byte_threshold);
    let min_rate = min_rate.or(cfg.min_rate_kbps);
    let interval = cfg.monitor_interval();

    let db = TransferLogDb::open_at(cfg.transfer_log_path()?)
        .await
        .context("open transfer log")?;
    let recovered = db.recover_in_progress().await?;
    if recovered > 0 {
        tracing::info!("marked {} stale transfer(s) from a previous run as abandoned", recovered);
    }

    let ctx = SessionContext::new(cfg);
    let (log_tx, log_rx) = tokio::sync::mpsc::channel(TRANSFER_LOG_CAPACITY);
    ctx.supervisor()
        .spawn("transfer-log", run_transfer_log_loop(log_rx, db.clone()));

    let primary: Arc<dyn TransferSession> = match open_session(&action) {
        Ok(s) => Arc::new(s.with_transfer_log(log_tx)),
        Err(e) => {
            drop(log_tx);
            ctx.finish().await;
            eprintln!("{}: {}", action.identity(), e);
            return Ok(FAILURE_CODE);
        }
    };
    let guard = SessionGuard::new(Arc::clone(&primary));

    if let Some(min_rate) = min_rate {
        let priority = PriorityController::new(TomlConfigStore::open(config::options_path()?)?);
        let pool = SqliteMetricsPool::new(db);
        let monitor = RateMonitor::new(min_rate, interval);
        let session = Arc::clone(&primary);
        ctx.supervisor().spawn("rate-monitor", async move {
            let exit = monitor.run(session.as_ref(), &pool, &priority).await?;
            tracing::info!(?exit, "rate monitor finished");
            Ok::<_, anyhow::Error>(())
        });
    }

    let listed = {
        let session = Arc::clone(&primary);
        let filter = action_filter(&action);
        tokio::task::spawn_blocking(move || list_entries(session.as_ref(), &filter, true))
            .await
            .context("listing join")?
    };
    let entries = match listed {
        Ok(entries) => entries,
        Err(e) => {
            drop(guard);
            drop(primary);
            ctx.finish().await;
            eprintln!("{}: {}", action.identity(), e);
            return Ok(FAILURE_CODE);
        }
    };

    let outcome =
        run_multi_session(&ctx, &primary, &entries, threshold, TransferOptions::drain()).await?;

    // Ending the primary session stops the secondary worker and the monitor;
    // dropping the last session closes the transfer log channel.
    drop(guard);
    drop(primary);
    let reports = ctx.finish().await;
    let failed_tasks = reports.iter().filter(|r| r.result.is_err()).count();

    if entries.is_empty() {
        println!("{}: nothing to fetch", action.identity());
    } else {
        println!(
            "{}: {} file(s), {} bytes queued; primary transferred {} file(s){}",
            action.identity(),
            outcome.plan.file_count,
            outcome.plan.total_bytes,
            outcome.primary.files,
            if outcome.second_session {
                " with a second session"
            } else {
                ""
            }
        );
    }
    if let Some(e) = &outcome.primary.error {
        eprintln!("{}: primary worker failed: {}", action.identity(), e);
    }
    if failed_tasks > 0 {
        eprintln!("{} background task(s) failed; see the log", failed_tasks);
    }
    Ok(outcome.code())
}
