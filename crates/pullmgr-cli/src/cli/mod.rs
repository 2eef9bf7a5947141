//! CLI for the pullmgr file pull scheduler.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use pullmgr_core::config;

use commands::{run_fetch, run_list, run_priority, run_sync};

/// Top-level CLI for pullmgr.
#[derive(Debug, Parser)]
#[command(name = "pullmgr")]
#[command(about = "pullmgr: change-aware, multi-session file pull scheduler", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Show remote files of an action and whether each is new, changed or unchanged.
    List {
        /// `host/mailbox/action`, or just the action name when it is unique.
        action: String,
    },

    /// Transfer only files that are new or changed since the last sync.
    Sync {
        /// `host/mailbox/action`, or just the action name when it is unique.
        action: String,
    },

    /// Drain every remote file, opening a second session for large batches.
    Fetch {
        /// `host/mailbox/action`, or just the action name when it is unique.
        action: String,
        /// Queued bytes above which a second session is opened (default from config).
        #[arg(long, value_name = "BYTES")]
        threshold: Option<u64>,
        /// Raise priority when the transfer rate drops below this many KB/sec.
        #[arg(long, value_name = "KBPS")]
        min_rate: Option<f64>,
    },

    /// Show or set the bandwidth priority mode.
    Priority {
        #[arg(value_enum, default_value_t = PriorityMode::Show)]
        mode: PriorityMode,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PriorityMode {
    Show,
    Normal,
    High,
}

impl CliCommand {
    /// Parse arguments and run the command. Returns the process exit code.
    pub async fn run_from_args() -> Result<i32> {
        let cli = Cli::parse();
        let cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);

        let code = match cli.command {
            CliCommand::List { action } => run_list(&cfg, &action)?,
            CliCommand::Sync { action } => run_sync(cfg, &action).await?,
            CliCommand::Fetch {
                action,
                threshold,
                min_rate,
            } => run_fetch(cfg, &action, threshold, min_rate).await?,
            CliCommand::Priority { mode } => run_priority(mode)?,
        };

        Ok(code)
    }
}

#[cfg(test)]
mod tests;
