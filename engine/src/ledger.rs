//! # Share Ledger
//!
//! Tracks the total share supply and each holder's shares for one vault,
//! and owns the exchange-rate arithmetic that converts between underlying
//! amounts and shares.
//!
//! The exchange rate is **always derived**: `max(total_value, 1) /
//! max(total_supply, 1)`, defined as 1:1 when the supply is zero (the
//! first deposit sets the baseline). It is never stored as its own field,
//! so it can never drift out of sync with the balances it summarizes.
//!
//! Both conversions round down. [`shares_for`] rounding down means a
//! deposit can never over-mint; [`amount_for`] rounding down means a
//! withdrawal can never over-pay. The dust lost to rounding accrues to
//! the pool, never the other way around.
//!
//! Mint and burn are the only mutation paths, which makes share
//! conservation (`sum(holder.shares) == total_supply`) structural rather
//! than something we hope for.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::WAD;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors internal to share bookkeeping.
///
/// These never reach API callers directly — the vault operations check
/// claims before burning and translate anything that slips through into
/// the public error taxonomy.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// A mint would overflow the total supply.
    #[error("share supply overflow: supply {supply}, mint {mint}")]
    SupplyOverflow {
        /// Current total supply.
        supply: u64,
        /// The mint amount that caused the overflow.
        mint: u64,
    },

    /// A burn exceeds the holder's share balance.
    #[error("insufficient shares: holder {holder} has {held}, burn {burn}")]
    InsufficientShares {
        /// The holder whose shares were insufficient.
        holder: String,
        /// Shares currently held.
        held: u64,
        /// The burn amount that was rejected.
        burn: u64,
    },
}

// ---------------------------------------------------------------------------
// Share math (pure functions)
// ---------------------------------------------------------------------------

/// Computes the shares minted for depositing `amount` into a pool with
/// the given total value and share supply. Rounds down.
///
/// With zero supply the rate is 1:1 — the first depositor's amount sets
/// the baseline, exactly like the original launch behavior.
pub fn shares_for(amount: u64, total_value: u64, total_supply: u64) -> u64 {
    if total_supply == 0 {
        return amount;
    }
    let shares = amount as u128 * total_supply as u128 / (total_value.max(1) as u128);
    // A collapsed pool value against a large supply can push the quotient
    // past u64. Saturate; the supply-overflow check on mint rejects it.
    u64::try_from(shares).unwrap_or(u64::MAX)
}

/// Computes the underlying amount a holder receives for burning `shares`
/// against a pool with the given total value and share supply. Rounds
/// down.
pub fn amount_for(shares: u64, total_value: u64, total_supply: u64) -> u64 {
    if total_supply == 0 {
        return 0;
    }
    let amount = shares as u128 * total_value as u128 / total_supply as u128;
    amount as u64
}

/// Computes the shares that must burn to pay out exactly `amount`.
/// Rounds **up** — the mirror of [`amount_for`]'s rounding down, so a
/// withdrawal-by-amount can never burn fewer shares than the payout is
/// worth. Never exceeds the shares whose `amount_for` covers `amount`.
pub fn shares_for_exact(amount: u64, total_value: u64, total_supply: u64) -> u64 {
    if total_supply == 0 {
        return 0;
    }
    let numerator = amount as u128 * total_supply as u128;
    let value = total_value.max(1) as u128;
    u64::try_from(numerator.div_ceil(value)).unwrap_or(u64::MAX)
}

/// The current exchange rate as a WAD-scaled fixed-point number, for
/// reporting and logging. `1 * WAD` means one share is worth exactly one
/// underlying unit.
pub fn exchange_rate_wad(total_value: u64, total_supply: u64) -> u128 {
    (total_value.max(1) as u128) * WAD / (total_supply.max(1) as u128)
}

// ---------------------------------------------------------------------------
// ShareLedger
// ---------------------------------------------------------------------------

/// Per-vault share accounting: total supply plus per-holder balances.
///
/// Shares are fungible and created only by [`mint`](Self::mint) /
/// destroyed only by [`burn`](Self::burn); the vault calls these
/// atomically with the underlying balance change that funds them, so
/// there is no intermediate state where shares exist unbacked.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ShareLedger {
    /// Total shares outstanding across all holders.
    total_supply: u64,

    /// Shares held, indexed by holder address.
    holders: HashMap<String, u64>,
}

impl ShareLedger {
    /// Creates an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Total shares outstanding.
    pub fn total_supply(&self) -> u64 {
        self.total_supply
    }

    /// Shares held by `holder` (zero for unknown holders).
    pub fn shares_of(&self, holder: &str) -> u64 {
        self.holders.get(holder).copied().unwrap_or(0)
    }

    /// Number of holders with a non-zero balance.
    pub fn holder_count(&self) -> usize {
        self.holders.values().filter(|&&s| s > 0).count()
    }

    /// Iterates over `(holder, shares)` pairs, including zero entries.
    pub fn holders(&self) -> impl Iterator<Item = (&str, u64)> {
        self.holders.iter().map(|(h, &s)| (h.as_str(), s))
    }

    /// Mints `shares` to `holder`, increasing the total supply.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::SupplyOverflow`] if the total supply would
    /// exceed `u64::MAX`. If you're hitting this, someone minted 18.4
    /// quintillion shares and the vault has bigger problems.
    pub fn mint(&mut self, holder: &str, shares: u64) -> Result<u64, LedgerError> {
        let new_supply =
            self.total_supply
                .checked_add(shares)
                .ok_or(LedgerError::SupplyOverflow {
                    supply: self.total_supply,
                    mint: shares,
                })?;

        // Per-holder balance cannot overflow if the supply didn't.
        *self.holders.entry(holder.to_string()).or_insert(0) += shares;
        self.total_supply = new_supply;

        Ok(new_supply)
    }

    /// Burns `shares` from `holder`, decreasing the total supply.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InsufficientShares`] if the holder does not
    /// hold that many shares. No state changes on failure.
    pub fn burn(&mut self, holder: &str, shares: u64) -> Result<u64, LedgerError> {
        let held = self.shares_of(holder);
        if shares > held {
            return Err(LedgerError::InsufficientShares {
                holder: holder.to_string(),
                held,
                burn: shares,
            });
        }

        if let Some(entry) = self.holders.get_mut(holder) {
            *entry -= shares;
        }
        self.total_supply -= shares;

        Ok(self.shares_of(holder))
    }

    /// Verifies share conservation: the sum of holder balances equals the
    /// total supply. Structural given the mint/burn-only mutation paths,
    /// but cheap to check, so property tests check it after every step.
    pub fn is_conserved(&self) -> bool {
        let sum: u128 = self.holders.values().map(|&s| s as u128).sum();
        sum == self.total_supply as u128
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const ALICE: &str = "res:alice";
    const BOB: &str = "res:bob";

    // -- Share math --

    #[test]
    fn first_deposit_is_one_to_one() {
        assert_eq!(shares_for(1_000, 0, 0), 1_000);
    }

    #[test]
    fn shares_scale_with_rate() {
        // Pool value 1050 over 1000 shares: rate 1.05. A 105 deposit
        // mints exactly 100 shares.
        assert_eq!(shares_for(105, 1_050, 1_000), 100);
    }

    #[test]
    fn shares_round_down() {
        // 100 / 1.05 = 95.23..., floor to 95. The pool keeps the dust.
        assert_eq!(shares_for(100, 1_050, 1_000), 95);
    }

    #[test]
    fn amount_scales_with_rate() {
        assert_eq!(amount_for(1_000, 1_050, 1_000), 1_050);
    }

    #[test]
    fn amount_rounds_down() {
        // 3 shares at value 10 over supply 4: 7.5, floor to 7.
        assert_eq!(amount_for(3, 10, 4), 7);
    }

    #[test]
    fn exact_withdrawal_shares_round_up() {
        // Paying out 100 at rate 1.05 costs ceil(100 / 1.05) = 96 shares.
        assert_eq!(shares_for_exact(100, 1_050, 1_000), 96);
    }

    #[test]
    fn exact_withdrawal_of_full_claim_burns_all_shares() {
        let value = 1_050u64;
        let supply = 1_000u64;
        let claim = amount_for(supply, value, supply);
        assert!(shares_for_exact(claim, value, supply) <= supply);
    }

    #[test]
    fn collapsed_value_saturates_instead_of_wrapping() {
        // Pool value crashed to 1 against a huge supply: the raw quotient
        // exceeds u64 and must clamp, never wrap into a small mint.
        assert_eq!(shares_for(u64::MAX, 1, u64::MAX), u64::MAX);
        assert_eq!(shares_for_exact(u64::MAX, 1, u64::MAX), u64::MAX);

        // The saturated figure then trips the mint overflow check on any
        // non-empty ledger, so the deposit is rejected rather than minted.
        let mut ledger = ShareLedger::new();
        ledger.mint(ALICE, 1_000).unwrap();
        assert!(matches!(
            ledger.mint(BOB, u64::MAX),
            Err(LedgerError::SupplyOverflow { .. })
        ));
    }

    #[test]
    fn amount_for_zero_supply_is_zero() {
        assert_eq!(amount_for(100, 1_000, 0), 0);
    }

    #[test]
    fn exchange_rate_defaults_to_one() {
        assert_eq!(exchange_rate_wad(0, 0), WAD);
    }

    #[test]
    fn exchange_rate_reflects_appreciation() {
        let rate = exchange_rate_wad(1_050, 1_000);
        assert_eq!(rate, WAD * 1_050 / 1_000);
    }

    #[test]
    fn mint_then_burn_is_value_neutral_within_rounding() {
        let value = 987_654_321u64;
        let supply = 123_456_789u64;
        let deposit = 1_000_000u64;

        let shares = shares_for(deposit, value, supply);
        let back = amount_for(shares, value + deposit, supply + shares);

        // Rounding always favors the pool.
        assert!(back <= deposit);
        assert!(deposit - back <= 2);
    }

    // -- Ledger --

    #[test]
    fn mint_increases_supply_and_holder_balance() {
        let mut ledger = ShareLedger::new();
        ledger.mint(ALICE, 1_000).unwrap();

        assert_eq!(ledger.total_supply(), 1_000);
        assert_eq!(ledger.shares_of(ALICE), 1_000);
        assert!(ledger.is_conserved());
    }

    #[test]
    fn burn_decreases_supply_and_holder_balance() {
        let mut ledger = ShareLedger::new();
        ledger.mint(ALICE, 1_000).unwrap();
        let remaining = ledger.burn(ALICE, 400).unwrap();

        assert_eq!(remaining, 600);
        assert_eq!(ledger.total_supply(), 600);
        assert!(ledger.is_conserved());
    }

    #[test]
    fn burn_exceeding_holding_rejected() {
        let mut ledger = ShareLedger::new();
        ledger.mint(ALICE, 100).unwrap();

        let result = ledger.burn(ALICE, 101);
        assert!(matches!(
            result,
            Err(LedgerError::InsufficientShares {
                held: 100,
                burn: 101,
                ..
            })
        ));
        assert_eq!(ledger.shares_of(ALICE), 100, "failed burn must not change state");
    }

    #[test]
    fn burn_from_unknown_holder_rejected() {
        let mut ledger = ShareLedger::new();
        assert!(ledger.burn(BOB, 1).is_err());
    }

    #[test]
    fn mint_overflow_rejected() {
        let mut ledger = ShareLedger::new();
        ledger.mint(ALICE, u64::MAX).unwrap();
        let result = ledger.mint(BOB, 1);
        assert!(matches!(result, Err(LedgerError::SupplyOverflow { .. })));
        assert!(ledger.is_conserved());
    }

    #[test]
    fn conservation_across_many_holders() {
        let mut ledger = ShareLedger::new();
        ledger.mint(ALICE, 700).unwrap();
        ledger.mint(BOB, 300).unwrap();
        ledger.burn(ALICE, 200).unwrap();
        ledger.mint(ALICE, 50).unwrap();
        ledger.burn(BOB, 300).unwrap();

        assert_eq!(ledger.total_supply(), 550);
        assert_eq!(ledger.holder_count(), 1);
        assert!(ledger.is_conserved());
    }

    #[test]
    fn ledger_serialization_roundtrip() {
        let mut ledger = ShareLedger::new();
        ledger.mint(ALICE, 42).unwrap();

        let json = serde_json::to_string(&ledger).expect("serialize");
        let back: ShareLedger = serde_json::from_str(&json).expect("deserialize");

        assert_eq!(back.shares_of(ALICE), 42);
        assert_eq!(back.total_supply(), 42);
    }
}
