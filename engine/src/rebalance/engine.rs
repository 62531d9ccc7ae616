//! # Rebalance Engine
//!
//! Executes one rebalance: snapshot, settle the caller's incentive,
//! push balances toward the policy target, then register the resulting
//! NAV as the new exchange-rate baseline.
//!
//! ## Staged commit
//!
//! Locally-owned state is mutated on a staged copy of the account and
//! committed only after every step has succeeded. A venue error at any
//! point returns the typed failure with the local state exactly as it
//! was; unwinding the venue-side effects of a half-done rebalance is the
//! host environment's transaction boundary, not this engine's.
//!
//! ## Partial fills
//!
//! Venue calls are allowed to under-fill. The engine takes what it gets,
//! reports the deltas it actually moved, and flags the rebalance as not
//! converged — the next call picks up from wherever the venues left it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::VaultError;
use crate::ledger::exchange_rate_wad;
use crate::markets::oracle::{value_of, ValuationOracle};
use crate::markets::{CollateralMarket, YieldSource};
use crate::rebalance::incentive::{incentive_for, settle, IncentivePayout};
use crate::rebalance::policy::RebalancePolicy;
use crate::vault::{Valuation, Vault};

// ---------------------------------------------------------------------------
// RebalanceReport
// ---------------------------------------------------------------------------

/// What one rebalance observed and moved.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RebalanceReport {
    /// Who called, and therefore who the incentive went to.
    pub caller: String,
    /// Name of the policy that set the target.
    pub strategy: String,
    /// Profit (or loss, negative) realized since the last registration,
    /// in underlying units.
    pub profit: i128,
    /// The caller's reward, earned and paid.
    pub incentive: IncentivePayout,
    /// Underlying newly supplied as collateral.
    pub supplied: u64,
    /// Borrow asset newly drawn.
    pub drawn: u64,
    /// Borrow asset repaid.
    pub repaid: u64,
    /// Borrow asset deployed into the yield source.
    pub deployed: u64,
    /// Borrow asset recovered from the yield source.
    pub recovered: u64,
    /// NAV baseline after registration, underlying units.
    pub vault_value: u64,
    /// Exchange rate after registration, WAD-scaled.
    pub exchange_rate_wad: u128,
    /// Whether the borrow position landed within the dust threshold of
    /// the policy target. `false` means a venue under-filled and the
    /// next rebalance has work left.
    pub converged: bool,
    /// When the rebalance ran.
    pub as_of: DateTime<Utc>,
}

impl RebalanceReport {
    /// `true` if the rebalance moved nothing at any venue.
    pub fn is_noop(&self) -> bool {
        self.supplied == 0
            && self.drawn == 0
            && self.repaid == 0
            && self.deployed == 0
            && self.recovered == 0
    }
}

// ---------------------------------------------------------------------------
// RebalanceEngine
// ---------------------------------------------------------------------------

/// Drives vaults toward a policy target. Stateless between calls — one
/// engine instance can serve every vault running its policy.
pub struct RebalanceEngine<P: RebalancePolicy> {
    policy: P,
}

impl<P: RebalancePolicy> RebalanceEngine<P> {
    /// Creates an engine for the given policy.
    pub fn new(policy: P) -> Self {
        Self { policy }
    }

    /// The policy this engine executes.
    pub fn policy(&self) -> &P {
        &self.policy
    }

    /// Runs one rebalance for `caller` against the vault's venues.
    ///
    /// Steps, in order:
    ///
    /// 1. Capture a valuation and compute realized profit against the
    ///    recorded baseline.
    /// 2. Settle the caller's incentive out of the dormant balance.
    /// 3. Supply the remaining dormant balance as collateral.
    /// 4. Correct the borrow toward the policy target: draw when under,
    ///    repay (recovering from the yield source as needed) when over.
    /// 5. Deploy any borrow-asset float into the yield source.
    /// 6. Re-capture and register the final NAV as the new baseline.
    ///
    /// # Errors
    ///
    /// - [`VaultError::StaleValuation`] if any needed price is missing,
    ///   zero, or too old. Checked first; nothing moves.
    /// - [`VaultError::ExternalProtocolRejected`] /
    ///   [`VaultError::CapacityExceeded`] when a venue refuses a call.
    ///
    /// On any error the vault's local state is unchanged.
    pub fn rebalance(
        &self,
        vault: &mut Vault,
        market: &mut dyn CollateralMarket,
        yield_source: &mut dyn YieldSource,
        oracle: &dyn ValuationOracle,
        caller: &str,
    ) -> Result<RebalanceReport, VaultError> {
        let params = vault.params().clone();
        let now = Utc::now();
        let mut staged = vault.account().clone();

        // 1. Snapshot and realized profit.
        let opening = Valuation::capture(&staged, market, yield_source, oracle, &params, now)?;
        let profit = opening.total_underlying as i128 - staged.last_recorded_value as i128;

        debug!(
            underlying = %staged.underlying,
            strategy = self.policy.name(),
            total_underlying = opening.total_underlying,
            baseline = staged.last_recorded_value,
            profit,
            solvent = opening.is_solvent(),
            "rebalance opened"
        );

        // 2. Caller incentive, out of dormant funds before they deploy.
        let earned = incentive_for(profit, params.incentive_share_bps, params.incentive_ceiling);
        let incentive = settle(earned, staged.dormant_balance, caller);
        staged.dormant_balance -= incentive.paid;

        // 3. Supply collateral.
        let supply_amount = self.policy.supply_amount(staged.dormant_balance);
        let supplied = if supply_amount >= params.dust_threshold {
            let receipt = market.supply(supply_amount)?;
            staged.dormant_balance -= supply_amount;
            receipt
        } else {
            0
        };

        // 4. Borrow correction against the post-supply capacity.
        let capacity = market.collateral_capacity()?;
        let target_value = self.policy.target_borrow_value(capacity);
        let current_value = value_of(market.borrowed_balance(), opening.borrow_price_wad);

        let mut drawn = 0u64;
        let mut repaid = 0u64;
        let mut recovered = 0u64;

        if current_value < target_value {
            let want = ((target_value - current_value) / opening.borrow_price_wad) as u64;
            if want >= params.dust_threshold {
                // May under-fill; zero means the market says "at capacity".
                drawn = market.borrow(want)?;
                staged.borrow_float = staged.borrow_float.saturating_add(drawn);
            }
        } else {
            let excess = ((current_value - target_value) / opening.borrow_price_wad) as u64;
            if excess >= params.dust_threshold {
                let need = excess.saturating_sub(staged.borrow_float);
                if need > 0 {
                    // Recover from the yield source; tolerate a shortfall
                    // and repay whatever we end up holding.
                    recovered = yield_source.withdraw(need)?;
                    staged.borrow_float = staged.borrow_float.saturating_add(recovered);
                }
                let repay_request = excess.min(staged.borrow_float);
                repaid = market.repay(repay_request)?;
                staged.borrow_float -= repaid;
            }
        }

        // 5. Route the float into the yield source.
        let deployed = if staged.borrow_float >= params.dust_threshold {
            let amount = staged.borrow_float;
            let receipt = yield_source.deposit(amount)?;
            staged.borrow_float = 0;
            receipt
        } else {
            0
        };

        // 6. Register the final NAV.
        let closing = Valuation::capture(&staged, market, yield_source, oracle, &params, now)?;
        staged.last_recorded_value = closing.total_underlying;

        let final_target = self.policy.target_borrow_value(market.collateral_capacity()?);
        let gap_value = closing.borrow_value().abs_diff(final_target);
        let converged = ((gap_value / opening.borrow_price_wad) as u64) < params.dust_threshold;

        let rate = exchange_rate_wad(staged.last_recorded_value, vault.ledger().total_supply());
        *vault.account_mut() = staged;

        info!(
            underlying = %vault.underlying(),
            strategy = self.policy.name(),
            caller,
            profit,
            incentive_paid = incentive.paid,
            supplied,
            drawn,
            repaid,
            deployed,
            recovered,
            vault_value = vault.account().last_recorded_value,
            rate_wad = rate,
            converged,
            "rebalance committed"
        );

        Ok(RebalanceReport {
            caller: caller.to_string(),
            strategy: self.policy.name().to_string(),
            profit,
            incentive,
            supplied,
            drawn,
            repaid,
            deployed,
            recovered,
            vault_value: vault.account().last_recorded_value,
            exchange_rate_wad: rate,
            converged,
            as_of: now,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
