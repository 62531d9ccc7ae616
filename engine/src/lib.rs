//! # Reservoir Engine — Core Library
//!
//! The accounting and rebalancing core for Reservoir's leveraged
//! yield-routing vaults. Deposits of a single asset are pooled, partly
//! supplied as collateral to a money market, partly borrowed against to
//! fund a position in a secondary yield source, with proceeds compounding
//! back into depositors' claim value.
//!
//! The hard part is not any single step — it is keeping the books solvent
//! across three independently-failing external systems (a collateral
//! market, a borrow market, a yield market) while deposits, withdrawals,
//! and third-party rebalances interleave under prices we don't control.
//!
//! ## Architecture
//!
//! The crate is split into modules that mirror the actual concerns of a
//! vault protocol:
//!
//! - **config** — Policy constants and per-vault configuration.
//! - **asset** — Asset identifiers and metadata.
//! - **ledger** — Share ledger: proportional claims, mint/burn, rate math.
//! - **vault** — Per-asset vault state, deposits, and withdrawals.
//! - **markets** — Adapter traits for the external venues, plus
//!   deterministic simulations for tests and local runs.
//! - **rebalance** — The rebalance engine, strategy policies, and the
//!   keeper incentive settlement.
//! - **registry** — Vault instances indexed by (asset, market, strategy).
//! - **store** — Persistent vault records over sled.
//!
//! ## Design Philosophy
//!
//! 1. All amounts are `u64` in smallest-unit denomination. No floating
//!    point anywhere near money. Intermediates widen to `u128`.
//! 2. The exchange rate is always derived, never stored independently.
//!    If two numbers can disagree, one day they will.
//! 3. Every state transition either fully commits or leaves the vault
//!    exactly as it found it. Partial mutation is how protocols die.
//! 4. If it touches money, it has tests. Plural.

pub mod asset;
pub mod config;
pub mod error;
pub mod ledger;
pub mod markets;
pub mod rebalance;
pub mod registry;
pub mod store;
pub mod vault;

pub use asset::AssetId;
pub use error::VaultError;
pub use ledger::ShareLedger;
pub use registry::{VaultKey, VaultRegistry};
pub use vault::{Vault, VaultConfig};
