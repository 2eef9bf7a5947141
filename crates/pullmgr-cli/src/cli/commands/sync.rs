//! `pullmgr sync` – transfer only new or changed files.

use std::sync::Arc;

use anyhow::Result;
use pullmgr_core::config::PullConfig;
use pullmgr_core::context::SessionContext;
use pullmgr_core::scheduler::{run_incremental, FAILURE_CODE};
use pullmgr_core::session::{SessionGuard, TransferOptions, TransferSession};

use super::{action_filter, manifest_store, open_session};

pub async fn run_sync(cfg: PullConfig, selector: &str) -> Result<i32> {
    let action = cfg.find_action(selector)?.clone();
    let store = manifest_store(&cfg, &action)?;
    let ctx = SessionContext::new(cfg);

    let session: Arc<dyn TransferSession> = match open_session(&action) {
        Ok(s) => Arc::new(s),
        Err(e) => {
            eprintln!("{}: {}", action.identity(), e);
            return Ok(FAILURE_CODE);
        }
    };

    let outcome = {
        let _guard = SessionGuard::new(Arc::clone(&session));
        run_incremental(
            &ctx,
            &session,
            store,
            Arc::new(action_filter(&action)),
            TransferOptions::incremental(),
        )
        .await?
    };
    ctx.finish().await;

    match &outcome.error {
        None if outcome.pending == 0 => println!("{}: up to date", action.identity()),
        None => println!(
            "{}: transferred {} file(s), {} bytes",
            action.identity(),
            outcome.transferred,
            outcome.bytes
        ),
        Some(e) => eprintln!(
            "{}: stopped after {} of {} file(s): {}",
            action.identity(),
            outcome.transferred,
            outcome.pending,
            e
        ),
    }
    Ok(outcome.code())
}
