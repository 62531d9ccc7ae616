//! # Engine Configuration & Constants
//!
//! Every policy number in Reservoir lives here. If you're hardcoding a
//! constant somewhere else, you're doing it wrong and you owe the team
//! coffee.
//!
//! The utilization target and deposit minimum deliberately live in
//! [`PolicyParams`] rather than as bare constants: they have changed
//! between strategy revisions before and will change again. The values
//! below are defaults, not invariants.

use serde::{Deserialize, Serialize};
use std::time::Duration;

// ---------------------------------------------------------------------------
// Fixed-point scale
// ---------------------------------------------------------------------------

/// The fixed-point scale for prices and exchange rates: 10^18.
///
/// A price of `1 * WAD` means one smallest unit of the asset is worth
/// exactly one common unit. All common-unit values are `u128` scaled
/// by this factor.
pub const WAD: u128 = 1_000_000_000_000_000_000;

/// Basis-point denominator. 10_000 bps = 100%.
pub const BPS_DENOMINATOR: u64 = 10_000;

// ---------------------------------------------------------------------------
// Policy defaults
// ---------------------------------------------------------------------------

/// Default borrow utilization target: 50% of the market's safe borrow
/// capacity. Half of maximum leaves headroom for price volatility before
/// the position approaches liquidation territory.
pub const DEFAULT_TARGET_UTILIZATION_BPS: u64 = 5_000;

/// Default minimum deposit, in common-unit value (WAD-scaled).
///
/// Deposits below this are rejected outright: dust positions cost more
/// in rebalance overhead than they ever contribute to the pool.
pub const DEFAULT_MIN_DEPOSIT_VALUE: u128 = 500 * WAD;

/// Default dust threshold for external calls, in smallest units.
///
/// Supplying or depositing amounts below this wastes an external call
/// for no measurable effect; the engine skips them.
pub const DEFAULT_DUST_THRESHOLD: u64 = 1_000;

/// Default keeper incentive: 100 bps (1%) of realized profit.
pub const DEFAULT_INCENTIVE_SHARE_BPS: u64 = 100;

/// Default absolute ceiling on a single incentive payout, in underlying
/// smallest units. One extremely profitable rebalance must not pay out
/// disproportionately at depositors' expense.
pub const DEFAULT_INCENTIVE_CEILING: u64 = 1_000_000_000;

/// Default maximum age of an oracle quote before it is considered stale.
/// A rebalance against stale prices is worse than no rebalance.
pub const DEFAULT_MAX_QUOTE_AGE: Duration = Duration::from_secs(300);

// ---------------------------------------------------------------------------
// PolicyParams
// ---------------------------------------------------------------------------

/// Tunable policy parameters for a single vault.
///
/// These are configuration, not protocol constants — different vaults
/// (and different strategy revisions of the same vault) run with
/// different values.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyParams {
    /// Borrow target as a fraction of safe borrow capacity, in bps.
    pub target_utilization_bps: u64,

    /// Minimum deposit value in common units (WAD-scaled).
    pub min_deposit_value: u128,

    /// Smallest amount worth an external call, in smallest units.
    pub dust_threshold: u64,

    /// Keeper incentive as a fraction of realized profit, in bps.
    pub incentive_share_bps: u64,

    /// Absolute per-rebalance incentive ceiling, in underlying units.
    pub incentive_ceiling: u64,

    /// Maximum tolerated oracle quote age.
    pub max_quote_age: Duration,
}

impl Default for PolicyParams {
    fn default() -> Self {
        Self {
            target_utilization_bps: DEFAULT_TARGET_UTILIZATION_BPS,
            min_deposit_value: DEFAULT_MIN_DEPOSIT_VALUE,
            dust_threshold: DEFAULT_DUST_THRESHOLD,
            incentive_share_bps: DEFAULT_INCENTIVE_SHARE_BPS,
            incentive_ceiling: DEFAULT_INCENTIVE_CEILING,
            max_quote_age: DEFAULT_MAX_QUOTE_AGE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_utilization_leaves_headroom() {
        // Borrowing the full capacity means liquidation on the first
        // downtick. The default must stay strictly below 100%.
        assert!(DEFAULT_TARGET_UTILIZATION_BPS < BPS_DENOMINATOR);
    }

    #[test]
    fn default_params_are_consistent() {
        let p = PolicyParams::default();
        assert!(p.incentive_share_bps <= BPS_DENOMINATOR);
        assert!(p.min_deposit_value > 0);
        assert!(p.max_quote_age.as_secs() > 0);
    }

    #[test]
    fn params_serialization_roundtrip() {
        let p = PolicyParams::default();
        let json = serde_json::to_string(&p).expect("serialize");
        let back: PolicyParams = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, p);
    }
}
