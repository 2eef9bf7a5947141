//! `pullmgr priority` – show or set the bandwidth priority mode.

use anyhow::Result;
use pullmgr_core::config;
use pullmgr_core::priority::{PriorityController, PriorityState, TomlConfigStore};

use crate::cli::PriorityMode;

pub fn run_priority(mode: PriorityMode) -> Result<i32> {
    let controller = PriorityController::new(TomlConfigStore::open(config::options_path()?)?);
    match mode {
        PriorityMode::Show => {}
        PriorityMode::Normal => controller.set_state(PriorityState::Normal)?,
        PriorityMode::High => controller.set_state(PriorityState::High)?,
    }
    println!("priority: {}", controller.get_state());
    Ok(0)
}
