//! `pullmgr list` – show remote files and their change classification.

use std::sync::Arc;

use anyhow::Result;
use pullmgr_core::config::PullConfig;
use pullmgr_core::lister::list_entries;
use pullmgr_core::manifest::ChangeKind;
use pullmgr_core::scheduler::FAILURE_CODE;
use pullmgr_core::session::SessionGuard;

use super::{action_filter, manifest_store, open_session};

pub fn run_list(cfg: &PullConfig, selector: &str) -> Result<i32> {
    let action = cfg.find_action(selector)?;
    let session = match open_session(action) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("{}: {}", action.identity(), e);
            return Ok(FAILURE_CODE);
        }
    };
    let guard = SessionGuard::new(Arc::new(session));
    let store = manifest_store(cfg, action)?;

    let entries = match list_entries(guard.session().as_ref(), &action_filter(action), true) {
        Ok(entries) => entries,
        Err(e) => {
            eprintln!("{}: {}", action.identity(), e);
            return Ok(FAILURE_CODE);
        }
    };

    if entries.is_empty() {
        println!("No files in {}.", action.identity());
        return Ok(0);
    }
    println!("{:<10} {:>14} {}", "STATUS", "SIZE", "PATH");
    let mut pending = 0usize;
    for (entry, kind) in store.classify(&entries) {
        if kind != ChangeKind::Unchanged {
            pending += 1;
        }
        println!(
            "{:<10} {:>14} {}",
            kind.as_str(),
            entry.length,
            entry.relative_path
        );
    }
    println!("{} file(s), {} new or changed", entries.len(), pending);
    Ok(0)
}
