//! # CLI Interface
//!
//! Defines the command-line argument structure for `reservoir-keeper`
//! using `clap` derive. Supports three subcommands: `run`, `init`, and
//! `version`.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Reservoir rebalance keeper.
///
/// Watches registered vaults and calls rebalance on a fixed cadence,
/// collecting the caller incentive. In demo mode the keeper runs
/// against deterministic simulated venues with a drifting yield curve.
#[derive(Parser, Debug)]
#[command(
    name = "reservoir-keeper",
    about = "Reservoir rebalance keeper daemon",
    version,
    propagate_version = true
)]
pub struct KeeperCli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands for the keeper binary.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the keeper loop.
    Run(RunArgs),
    /// Initialize the data directory and vault store.
    Init(InitArgs),
    /// Print version information and exit.
    Version,
}

/// Arguments for the `run` subcommand.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Path to the keeper data directory holding the vault store.
    #[arg(long, short = 'd', env = "RESERVOIR_DATA_DIR", default_value = "~/.reservoir")]
    pub data_dir: PathBuf,

    /// Address the keeper's incentive payouts accrue to.
    #[arg(long, env = "RESERVOIR_KEEPER_ADDR", default_value = "res:keeper")]
    pub keeper_address: String,

    /// Seconds between rebalance passes.
    #[arg(long, env = "RESERVOIR_INTERVAL_SECS", default_value_t = 30)]
    pub interval_secs: u64,

    /// Deposit asset ticker for the demo vault.
    #[arg(long, default_value = "WBTC")]
    pub asset: String,

    /// Collateral market identifier for the demo vault.
    #[arg(long, default_value = "fuse-pool-6")]
    pub market: String,

    /// Borrow utilization target in basis points.
    #[arg(long, default_value_t = 5_000)]
    pub utilization_bps: u64,

    /// Emit JSON logs instead of pretty-printed output.
    #[arg(long, env = "RESERVOIR_LOG_JSON")]
    pub log_json: bool,
}

/// Arguments for the `init` subcommand.
#[derive(Parser, Debug)]
pub struct InitArgs {
    /// Path to the data directory to initialize.
    #[arg(long, short = 'd', env = "RESERVOIR_DATA_DIR", default_value = "~/.reservoir")]
    pub data_dir: PathBuf,
}
