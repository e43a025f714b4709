//! CLI struct definitions for the questline command-line interface.
//!
//! All clap-derived types live here; dispatch lives in `main.rs`.

use crate::plugins::{activity, ledger, progression, tasks};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[clap(
    name = "questline",
    version = env!("CARGO_PKG_VERSION"),
    about = "Progression and rewards ledger: point balances, experience levels, and idempotent task-reward claims."
)]
pub struct Cli {
    /// Store root directory (defaults to $QUESTLINE_DATA or ./.questline/data).
    #[clap(long, global = true)]
    pub dir: Option<PathBuf>,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Initialize all subsystem databases in the store root.
    Init,
    /// Point balances and the ledger audit trail.
    Ledger(ledger::LedgerCli),
    /// Experience, levels, and level history.
    Progression(progression::ProgressionCli),
    /// Task catalog, progress, and reward claims.
    Tasks(tasks::TasksCli),
    /// Record and count activity events.
    Activity(activity::ActivityCli),
    /// Print subsystem capability schemas as JSON.
    Capabilities,
}
