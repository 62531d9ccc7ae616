//! # Rebalance Policies
//!
//! A [`RebalancePolicy`] decides the target allocation; the engine
//! executes it. Keeping the two apart is what lets the registry run
//! different strategy revisions side by side under the same engine —
//! the policy version is part of the vault's registry key.
//!
//! Two policies ship today, matching the two strategy generations this
//! protocol has actually run:
//!
//! - [`SupplyOnlyPolicy`] (v1): supply collateral, never borrow. The
//!   conservative single-market strategy.
//! - [`LeveragedPolicy`] (v2): supply collateral, borrow to a
//!   configurable fraction of capacity, route the draw to the yield
//!   source.

use crate::config::{PolicyParams, BPS_DENOMINATOR};

/// Strategy interface: target allocation as a function of current state.
///
/// Policies are pure — they never touch the venues. The engine feeds
/// them observed balances and executes the difference.
pub trait RebalancePolicy {
    /// Human-readable strategy name for logs and reports.
    fn name(&self) -> &'static str;

    /// Strategy version. Part of the registry key: bumping this is how
    /// a new strategy generation coexists with vaults on the old one.
    fn version(&self) -> u32;

    /// How much of the dormant balance to supply as collateral this
    /// rebalance. The engine still applies the dust threshold.
    fn supply_amount(&self, dormant: u64) -> u64;

    /// Target borrow value (common units) given the gross borrow
    /// capacity the market reports against current collateral.
    fn target_borrow_value(&self, capacity_value: u128) -> u128;
}

// ---------------------------------------------------------------------------
// SupplyOnlyPolicy
// ---------------------------------------------------------------------------

/// Strategy v1: everything into the collateral market, zero leverage.
#[derive(Clone, Copy, Debug, Default)]
pub struct SupplyOnlyPolicy;

impl RebalancePolicy for SupplyOnlyPolicy {
    fn name(&self) -> &'static str {
        "supply-only"
    }

    fn version(&self) -> u32 {
        1
    }

    fn supply_amount(&self, dormant: u64) -> u64 {
        dormant
    }

    fn target_borrow_value(&self, _capacity_value: u128) -> u128 {
        0
    }
}

// ---------------------------------------------------------------------------
// LeveragedPolicy
// ---------------------------------------------------------------------------

/// Strategy v2: borrow to a fixed fraction of safe capacity and deploy
/// the draw into the yield source.
///
/// The default target is half of maximum safe capacity — enough
/// leverage to matter, enough headroom that ordinary price volatility
/// doesn't walk the position toward liquidation.
#[derive(Clone, Copy, Debug)]
pub struct LeveragedPolicy {
    /// Borrow target as a fraction of capacity, in bps.
    pub target_utilization_bps: u64,
}

impl LeveragedPolicy {
    /// Creates a policy with an explicit utilization target.
    pub fn new(target_utilization_bps: u64) -> Self {
        Self {
            target_utilization_bps: target_utilization_bps.min(BPS_DENOMINATOR),
        }
    }

    /// Creates a policy from a vault's configured parameters.
    pub fn from_params(params: &PolicyParams) -> Self {
        Self::new(params.target_utilization_bps)
    }
}

impl RebalancePolicy for LeveragedPolicy {
    fn name(&self) -> &'static str {
        "leveraged"
    }

    fn version(&self) -> u32 {
        2
    }

    fn supply_amount(&self, dormant: u64) -> u64 {
        dormant
    }

    fn target_borrow_value(&self, capacity_value: u128) -> u128 {
        capacity_value * self.target_utilization_bps as u128 / BPS_DENOMINATOR as u128
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WAD;

    #[test]
    fn supply_only_never_borrows() {
        let p = SupplyOnlyPolicy;
        assert_eq!(p.target_borrow_value(1_000_000 * WAD), 0);
        assert_eq!(p.supply_amount(42), 42);
    }

    #[test]
    fn leveraged_targets_fraction_of_capacity() {
        let p = LeveragedPolicy::new(5_000);
        assert_eq!(p.target_borrow_value(1_000 * WAD), 500 * WAD);
    }

    #[test]
    fn leveraged_clamps_to_full_capacity() {
        let p = LeveragedPolicy::new(15_000);
        assert_eq!(p.target_utilization_bps, BPS_DENOMINATOR);
    }

    #[test]
    fn versions_are_distinct() {
        assert_ne!(SupplyOnlyPolicy.version(), LeveragedPolicy::new(5_000).version());
    }
}
