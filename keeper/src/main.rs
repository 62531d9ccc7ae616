// Copyright (c) 2026 Reservoir Labs. MIT License.
// See LICENSE for details.

//! # Reservoir Keeper
//!
//! Entry point for the `reservoir-keeper` binary. Parses CLI arguments,
//! initializes logging, restores the vault store, and runs the
//! rebalance loop.
//!
//! The binary supports three subcommands:
//!
//! - `run`     — start the keeper loop
//! - `init`    — initialize the data directory and vault store
//! - `version` — print build version information
//!
//! This build drives the deterministic simulated venues that ship with
//! the engine; a production deployment swaps them for live market
//! adapters behind the same traits.

mod cli;
mod logging;

use anyhow::{Context, Result};
use clap::Parser;
use rand::Rng;
use tokio::signal;

use reservoir_engine::asset::AssetId;
use reservoir_engine::config::{PolicyParams, WAD};
use reservoir_engine::markets::sim::{SimCollateralMarket, SimOracle, SimYieldSource};
use reservoir_engine::markets::YieldSource;
use reservoir_engine::rebalance::{LeveragedPolicy, RebalanceEngine, RebalancePolicy};
use reservoir_engine::registry::VaultKey;
use reservoir_engine::store::VaultStore;
use reservoir_engine::vault::{Vault, VaultAccount, VaultConfig};

use cli::{Commands, KeeperCli};
use logging::LogFormat;

/// Borrow asset for the demo vault. Live deployments read this from the
/// market adapter instead.
const DEMO_BORROW_ASSET: &str = "DAI";

/// Opening deposit seeded into a freshly-created demo vault so the loop
/// has something to deploy.
const DEMO_SEED_DEPOSIT: u64 = 100_000;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = KeeperCli::parse();

    match cli.command {
        Commands::Run(args) => run_keeper(args).await,
        Commands::Init(args) => init_data_dir(args),
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

/// Starts the keeper loop: restore the vault, drive the simulated
/// venues, rebalance on a fixed cadence, persist after every pass.
async fn run_keeper(args: cli::RunArgs) -> Result<()> {
    let format = if args.log_json {
        LogFormat::Json
    } else {
        LogFormat::Pretty
    };
    logging::init_logging("reservoir_keeper=info,reservoir_engine=info", format);

    tracing::info!(
        data_dir = %args.data_dir.display(),
        interval_secs = args.interval_secs,
        asset = %args.asset,
        market = %args.market,
        utilization_bps = args.utilization_bps,
        "starting reservoir-keeper"
    );

    // --- Persistent storage ---
    let db_path = args.data_dir.join("db");
    std::fs::create_dir_all(&db_path)
        .with_context(|| format!("failed to create store directory: {}", db_path.display()))?;
    let store = VaultStore::open(&db_path)
        .with_context(|| format!("failed to open vault store at {}", db_path.display()))?;
    tracing::info!(path = %db_path.display(), vaults = store.vault_count(), "vault store opened");

    // --- Simulated venues ---
    let underlying = AssetId::new(&args.asset);
    let borrow_asset = AssetId::new(DEMO_BORROW_ASSET);
    let mut market = SimCollateralMarket::new(underlying, borrow_asset, 7_500, WAD, WAD);
    let mut yield_source = SimYieldSource::new(borrow_asset, WAD);
    let mut oracle = SimOracle::new();
    oracle.set_price(underlying, WAD);
    oracle.set_price(borrow_asset, WAD);

    // --- Vault ---
    let params = PolicyParams {
        target_utilization_bps: args.utilization_bps,
        ..PolicyParams::default()
    };
    let engine = RebalanceEngine::new(LeveragedPolicy::from_params(&params));
    let key = VaultKey::new(underlying, args.market.clone(), engine.policy().version());

    let mut vault = load_or_seed_vault(
        &store,
        &key,
        VaultConfig {
            underlying,
            borrow_asset,
            params,
        },
        &oracle,
    )?;
    store.put_vault(&key, &vault)?;

    // --- Rebalance loop ---
    let mut interval =
        tokio::time::interval(std::time::Duration::from_secs(args.interval_secs.max(1)));
    let mut rng = rand::thread_rng();

    loop {
        tokio::select! {
            _ = interval.tick() => {}
            _ = shutdown_signal() => {
                tracing::info!("shutdown signal received");
                break;
            }
        }

        // Simulated market drift: the yield position earns a small
        // random return each pass.
        if yield_source.balance() > 0 {
            let earned = yield_source.balance() / 200 + rng.gen_range(0..50);
            yield_source.accrue(earned);
        }

        // Quotes go stale between passes; a live oracle pushes its own.
        oracle.set_price(underlying, WAD);
        oracle.set_price(borrow_asset, WAD);

        match engine.rebalance(
            &mut vault,
            &mut market,
            &mut yield_source,
            &oracle,
            &args.keeper_address,
        ) {
            Ok(report) => {
                tracing::info!(
                    %key,
                    profit = report.profit,
                    incentive_paid = report.incentive.paid,
                    vault_value = report.vault_value,
                    rate_wad = report.exchange_rate_wad,
                    converged = report.converged,
                    "rebalance pass complete"
                );
                store.put_vault(&key, &vault)?;
            }
            Err(err) => {
                // Venue trouble is not fatal; the next pass retries.
                tracing::warn!(%key, error = %err, "rebalance pass failed");
            }
        }
    }

    store.put_vault(&key, &vault)?;
    store.flush()?;
    tracing::info!("reservoir-keeper stopped");
    Ok(())
}

/// Restores the vault stored under `key`, or creates and seeds a fresh
/// demo vault if none exists.
///
/// The simulated venues start empty on every run, so a restored record
/// is rehydrated with its full registered value dormant. Claims and the
/// exchange rate carry over; the first rebalance pass redeploys.
fn load_or_seed_vault(
    store: &VaultStore,
    key: &VaultKey,
    config: VaultConfig,
    oracle: &SimOracle,
) -> Result<Vault> {
    match store.get_vault(key)? {
        Some(stored) => {
            let mut account = VaultAccount::new(config.underlying, config.borrow_asset);
            account.dormant_balance = stored.account().last_recorded_value;
            account.last_recorded_value = stored.account().last_recorded_value;
            tracing::info!(
                %key,
                value = account.last_recorded_value,
                holders = stored.ledger().holder_count(),
                "vault restored from store"
            );
            Ok(Vault::from_parts(
                account,
                stored.ledger().clone(),
                stored.params().clone(),
            ))
        }
        None => {
            let mut vault = Vault::new(config);
            vault
                .deposit("res:treasury", DEMO_SEED_DEPOSIT, oracle)
                .context("seed deposit rejected")?;
            tracing::info!(%key, seed = DEMO_SEED_DEPOSIT, "demo vault created");
            Ok(vault)
        }
    }
}

/// Initializes the keeper data directory and an empty vault store.
fn init_data_dir(args: cli::InitArgs) -> Result<()> {
    logging::init_logging("reservoir_keeper=info", LogFormat::Pretty);

    let db_path = args.data_dir.join("db");
    std::fs::create_dir_all(&db_path)
        .with_context(|| format!("failed to create data directory: {}", db_path.display()))?;

    let store = VaultStore::open(&db_path)
        .with_context(|| format!("failed to create vault store at {}", db_path.display()))?;
    store.flush()?;

    println!("Keeper initialized successfully.");
    println!("  Data directory : {}", args.data_dir.display());
    println!("  Vault store    : {}", db_path.display());
    println!("  Vault records  : {}", store.vault_count());

    Ok(())
}

/// Prints version information to stdout.
fn print_version() {
    println!("reservoir-keeper {}", env!("CARGO_PKG_VERSION"));
    println!("rustc            {}", rustc_version());
}

/// Returns the Rust compiler version used to build this binary.
fn rustc_version() -> &'static str {
    option_env!("RUSTC_VERSION").unwrap_or("unknown")
}

/// Waits for SIGINT (Ctrl+C) or SIGTERM, whichever comes first.
///
/// On non-Unix platforms, only Ctrl+C is supported.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn demo_config(underlying: AssetId, borrow_asset: AssetId) -> VaultConfig {
        VaultConfig {
            underlying,
            borrow_asset,
            params: PolicyParams::default(),
        }
    }

    fn demo_oracle(underlying: AssetId, borrow_asset: AssetId) -> SimOracle {
        let mut oracle = SimOracle::new();
        oracle.set_price(underlying, WAD);
        oracle.set_price(borrow_asset, WAD);
        oracle
    }

    #[test]
    fn fresh_store_seeds_demo_vault() {
        let underlying = AssetId::new("WBTC");
        let borrow_asset = AssetId::new(DEMO_BORROW_ASSET);
        let key = VaultKey::new(underlying, "fuse-pool-6", 2);
        let store = VaultStore::open_temporary().unwrap();

        let vault = load_or_seed_vault(
            &store,
            &key,
            demo_config(underlying, borrow_asset),
            &demo_oracle(underlying, borrow_asset),
        )
        .unwrap();

        assert_eq!(vault.ledger().shares_of("res:treasury"), DEMO_SEED_DEPOSIT);
        assert_eq!(vault.account().dormant_balance, DEMO_SEED_DEPOSIT);
    }

    #[test]
    fn vault_survives_keeper_restart() {
        let dir = tempfile::tempdir().expect("tempdir");
        let underlying = AssetId::new("WBTC");
        let borrow_asset = AssetId::new(DEMO_BORROW_ASSET);
        let key = VaultKey::new(underlying, "fuse-pool-6", 2);
        let oracle = demo_oracle(underlying, borrow_asset);

        {
            let store = VaultStore::open(dir.path().join("db")).unwrap();
            let vault = load_or_seed_vault(
                &store,
                &key,
                demo_config(underlying, borrow_asset),
                &oracle,
            )
            .unwrap();
            store.put_vault(&key, &vault).unwrap();
        }

        // Second run against the same data directory: no re-seeding, and
        // the registered value is rehydrated dormant with claims intact.
        let store = VaultStore::open(dir.path().join("db")).unwrap();
        let restored = load_or_seed_vault(
            &store,
            &key,
            demo_config(underlying, borrow_asset),
            &oracle,
        )
        .unwrap();

        assert_eq!(restored.ledger().shares_of("res:treasury"), DEMO_SEED_DEPOSIT);
        assert_eq!(restored.ledger().total_supply(), DEMO_SEED_DEPOSIT);
        assert_eq!(restored.account().last_recorded_value, DEMO_SEED_DEPOSIT);
        assert_eq!(restored.account().dormant_balance, DEMO_SEED_DEPOSIT);
    }
}
