//! # Incentive Settlement
//!
//! Keepers are paid out of the profit their rebalance realizes — a
//! rebalance that shows no profit pays nothing, which keeps the calling
//! cadence economic instead of spammy. The sizing is deliberately a pure
//! function so it can be unit-tested with no venue or sequencing in
//! sight: profit goes in, a capped reward comes out.
//!
//! Settlement itself is best-effort. If the dormant balance can't cover
//! the earned reward, the keeper gets what's there and the shortfall is
//! logged; a solvency-critical rebalance must never fail over its tip.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::BPS_DENOMINATOR;

/// What a rebalance paid its caller.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncentivePayout {
    /// Reward earned per the sizing function, underlying units.
    pub earned: u64,
    /// Reward actually paid (≤ earned; limited by dormant funds).
    pub paid: u64,
    /// Recipient address.
    pub recipient: String,
}

/// Sizes the keeper reward for a realized profit.
///
/// Non-positive profit earns nothing. Positive profit earns
/// `share_bps` of itself, hard-capped at `ceiling` so one windfall
/// rebalance can't drain depositor value.
pub fn incentive_for(profit: i128, share_bps: u64, ceiling: u64) -> u64 {
    if profit <= 0 {
        return 0;
    }
    let share = profit as u128 * share_bps as u128 / BPS_DENOMINATOR as u128;
    share.min(ceiling as u128) as u64
}

/// Settles an earned reward against the available dormant balance.
///
/// Returns the payout record; the caller deducts `paid` from the
/// dormant balance. Never fails — a shortfall is logged and paid
/// partially.
pub fn settle(earned: u64, available: u64, recipient: &str) -> IncentivePayout {
    let paid = earned.min(available);
    if paid < earned {
        warn!(
            recipient,
            earned,
            paid,
            "incentive under-funded; paying what the dormant balance covers"
        );
    }
    IncentivePayout {
        earned,
        paid,
        recipient: recipient.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_profit_no_incentive() {
        assert_eq!(incentive_for(0, 100, 1_000), 0);
        assert_eq!(incentive_for(-5_000, 100, 1_000), 0);
    }

    #[test]
    fn incentive_is_share_of_profit() {
        // 1% of 50_000 = 500.
        assert_eq!(incentive_for(50_000, 100, 1_000_000), 500);
    }

    #[test]
    fn incentive_rounds_down() {
        // 1% of 50 = 0.5 -> 0. Small profits pay nothing.
        assert_eq!(incentive_for(50, 100, 1_000_000), 0);
    }

    #[test]
    fn incentive_respects_ceiling() {
        // 1% of 10^12 would be 10^10; ceiling wins.
        assert_eq!(incentive_for(1_000_000_000_000, 100, 5_000), 5_000);
    }

    #[test]
    fn settlement_pays_in_full_when_funded() {
        let p = settle(500, 10_000, "res:keeper");
        assert_eq!(p.paid, 500);
        assert_eq!(p.earned, 500);
    }

    #[test]
    fn settlement_pays_partially_when_short() {
        let p = settle(500, 200, "res:keeper");
        assert_eq!(p.paid, 200);
        assert_eq!(p.earned, 500);
    }

    #[test]
    fn settlement_handles_empty_pool() {
        let p = settle(500, 0, "res:keeper");
        assert_eq!(p.paid, 0);
    }
}
