//! # Vault Account & Valuation
//!
//! [`VaultAccount`] is the per-asset aggregate state the vault owns
//! outright: the dormant underlying balance, the borrow-asset float in
//! transit between venues, and the NAV baseline recorded at the last
//! value-changing operation. Supplied, borrowed, and yield-source
//! balances live with the external venues and are re-queried every time
//! they matter — caching them across invocations would mean reasoning
//! about solvency from numbers someone else already changed.
//!
//! [`Valuation`] is one consistent snapshot of everything: fresh oracle
//! prices, fresh venue balances, and the common-unit total they add up
//! to. Every rebalance starts by capturing one, and withdrawal
//! solvency checks are computed against one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::asset::AssetId;
use crate::config::{PolicyParams, BPS_DENOMINATOR};
use crate::error::VaultError;
use crate::markets::oracle::{fresh_price, value_of, ValuationOracle};
use crate::markets::{CollateralMarket, YieldSource};

// ---------------------------------------------------------------------------
// VaultAccount
// ---------------------------------------------------------------------------

/// The locally-owned aggregate state of one vault.
///
/// This struct (plus the share ledger) is exactly what must survive a
/// process restart; everything else is re-derived from the venues.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultAccount {
    /// The deposit asset. Immutable after creation.
    pub underlying: AssetId,

    /// The asset borrowed against collateral. Immutable after creation.
    pub borrow_asset: AssetId,

    /// Underlying held locally, not yet deployed. Grows on deposit,
    /// shrinks on withdrawal, moves both ways on rebalance.
    pub dormant_balance: u64,

    /// Borrow-asset units held locally: funds in transit between the
    /// borrow position and the yield source (fresh draws not yet
    /// deployed, repayment float, withdrawal residue).
    pub borrow_float: u64,

    /// Total underlying value recorded at the last value-changing
    /// operation, in underlying units. The exchange rate between
    /// rebalances is derived from this baseline.
    pub last_recorded_value: u64,
}

impl VaultAccount {
    /// Creates an empty account for the given asset pair.
    pub fn new(underlying: AssetId, borrow_asset: AssetId) -> Self {
        Self {
            underlying,
            borrow_asset,
            dormant_balance: 0,
            borrow_float: 0,
            last_recorded_value: 0,
        }
    }

    /// Returns `true` if the vault holds nothing locally and has no
    /// recorded value. A drained vault looks like this; it is never
    /// destroyed.
    pub fn is_drained(&self) -> bool {
        self.dormant_balance == 0 && self.borrow_float == 0 && self.last_recorded_value == 0
    }
}

// ---------------------------------------------------------------------------
// Valuation
// ---------------------------------------------------------------------------

/// One consistent snapshot of the vault's full position.
///
/// All `*_value` fields are WAD-scaled common units; `total_underlying`
/// is the same total re-expressed in underlying smallest units (the
/// denomination shares are priced in).
#[derive(Clone, Copy, Debug)]
pub struct Valuation {
    /// Fresh price of the underlying, WAD-scaled.
    pub underlying_price_wad: u128,
    /// Fresh price of the borrow asset, WAD-scaled.
    pub borrow_price_wad: u128,
    /// Collateral currently supplied, in underlying units.
    pub supplied: u64,
    /// Outstanding borrow principal, in borrow-asset units.
    pub borrowed: u64,
    /// Yield-source position value, common units.
    pub yield_value: u128,
    /// Gross asset value before netting debt, common units.
    pub gross_assets: u128,
    /// Net total value of the vault, common units (floored at zero).
    pub total_value: u128,
    /// Net total value re-expressed in underlying units.
    pub total_underlying: u64,
    /// When the snapshot was taken.
    pub as_of: DateTime<Utc>,
}

impl Valuation {
    /// Captures a snapshot: queries both venues for balances and the
    /// oracle for fresh prices, then computes the net total.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::StaleValuation`] if either price is
    /// missing, zero, or older than the configured maximum age. Nothing
    /// is written anywhere on failure.
    pub fn capture(
        account: &VaultAccount,
        market: &dyn CollateralMarket,
        yield_source: &dyn YieldSource,
        oracle: &dyn ValuationOracle,
        params: &PolicyParams,
        now: DateTime<Utc>,
    ) -> Result<Self, VaultError> {
        let underlying_price_wad =
            fresh_price(oracle, account.underlying, params.max_quote_age, now)?;
        let borrow_price_wad =
            fresh_price(oracle, account.borrow_asset, params.max_quote_age, now)?;

        let supplied = market.supplied_balance();
        let borrowed = market.borrowed_balance();
        let yield_value = yield_source.current_value();

        let gross_assets = value_of(account.dormant_balance, underlying_price_wad)
            + value_of(supplied, underlying_price_wad)
            + value_of(account.borrow_float, borrow_price_wad)
            + yield_value;
        let debt = value_of(borrowed, borrow_price_wad);

        let total_value = gross_assets.saturating_sub(debt);
        let total_underlying = (total_value / underlying_price_wad) as u64;

        Ok(Self {
            underlying_price_wad,
            borrow_price_wad,
            supplied,
            borrowed,
            yield_value,
            gross_assets,
            total_value,
            total_underlying,
            as_of: now,
        })
    }

    /// Returns `true` if assets cover debt. [`total_value`](Self::total_value)
    /// floors at zero, so this is the explicit solvency signal.
    pub fn is_solvent(&self) -> bool {
        self.gross_assets >= self.borrow_value()
    }

    /// Outstanding borrow value in common units.
    pub fn borrow_value(&self) -> u128 {
        value_of(self.borrowed, self.borrow_price_wad)
    }

    /// Maximum collateral redeemable, in underlying units, without
    /// pushing the position below what the outstanding borrow requires
    /// at the market's collateral factor.
    ///
    /// With no borrow outstanding, everything supplied is redeemable.
    pub fn redeemable_collateral(&self, collateral_factor_bps: u64) -> u64 {
        if self.borrowed == 0 {
            return self.supplied;
        }
        if collateral_factor_bps == 0 {
            return 0;
        }

        // Collateral value that must remain to keep the borrow solvent.
        let required_value =
            self.borrow_value() * BPS_DENOMINATOR as u128 / collateral_factor_bps as u128;
        let supplied_value = value_of(self.supplied, self.underlying_price_wad);
        let free_value = supplied_value.saturating_sub(required_value);

        (free_value / self.underlying_price_wad) as u64
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WAD;
    use crate::markets::sim::{SimCollateralMarket, SimOracle, SimYieldSource};

    fn wbtc() -> AssetId {
        AssetId::new("WBTC")
    }

    fn dai() -> AssetId {
        AssetId::new("DAI")
    }

    fn setup() -> (VaultAccount, SimCollateralMarket, SimYieldSource, SimOracle) {
        let account = VaultAccount::new(wbtc(), dai());
        let market = SimCollateralMarket::new(wbtc(), dai(), 7_500, 2 * WAD, WAD);
        let ys = SimYieldSource::new(dai(), WAD);
        let mut oracle = SimOracle::new();
        oracle.set_price(wbtc(), 2 * WAD);
        oracle.set_price(dai(), WAD);
        (account, market, ys, oracle)
    }

    #[test]
    fn empty_vault_values_to_zero() {
        let (account, market, ys, oracle) = setup();
        let v = Valuation::capture(
            &account,
            &market,
            &ys,
            &oracle,
            &PolicyParams::default(),
            Utc::now(),
        )
        .unwrap();
        assert_eq!(v.total_value, 0);
        assert_eq!(v.total_underlying, 0);
    }

    #[test]
    fn total_nets_debt_against_assets() {
        let (mut account, mut market, mut ys, oracle) = setup();
        account.dormant_balance = 100; // value 200
        market.supply(1_000).unwrap(); // value 2000
        market.borrow(500).unwrap(); // debt 500
        ys.deposit(500).unwrap(); // value 500

        let v = Valuation::capture(
            &account,
            &market,
            &ys,
            &oracle,
            &PolicyParams::default(),
            Utc::now(),
        )
        .unwrap();

        // 200 + 2000 + 500 - 500 = 2200 common units = 1100 WBTC units.
        assert_eq!(v.total_value, 2_200 * WAD);
        assert_eq!(v.total_underlying, 1_100);
        assert!(v.is_solvent());
    }

    #[test]
    fn capture_fails_on_missing_price() {
        let (account, market, ys, _) = setup();
        let empty = SimOracle::new();
        let err = Valuation::capture(
            &account,
            &market,
            &ys,
            &empty,
            &PolicyParams::default(),
            Utc::now(),
        )
        .unwrap_err();
        assert!(matches!(err, VaultError::StaleValuation { .. }));
    }

    #[test]
    fn redeemable_is_everything_without_borrow() {
        let (account, mut market, ys, oracle) = setup();
        market.supply(1_000).unwrap();

        let v = Valuation::capture(
            &account,
            &market,
            &ys,
            &oracle,
            &PolicyParams::default(),
            Utc::now(),
        )
        .unwrap();
        assert_eq!(v.redeemable_collateral(7_500), 1_000);
    }

    #[test]
    fn redeemable_leaves_borrow_covered() {
        let (account, mut market, ys, oracle) = setup();
        market.supply(1_000).unwrap(); // value 2000, capacity 1500
        market.borrow(750).unwrap(); // debt value 750

        let v = Valuation::capture(
            &account,
            &market,
            &ys,
            &oracle,
            &PolicyParams::default(),
            Utc::now(),
        )
        .unwrap();

        // Required collateral value: 750 / 0.75 = 1000 -> 500 WBTC units
        // must stay. 500 units are free.
        assert_eq!(v.redeemable_collateral(7_500), 500);
    }

    #[test]
    fn redeemable_is_zero_when_fully_levered() {
        let (account, mut market, ys, oracle) = setup();
        market.supply(1_000).unwrap();
        market.borrow(1_500).unwrap(); // full capacity

        let v = Valuation::capture(
            &account,
            &market,
            &ys,
            &oracle,
            &PolicyParams::default(),
            Utc::now(),
        )
        .unwrap();
        assert_eq!(v.redeemable_collateral(7_500), 0);
    }

    #[test]
    fn account_serialization_roundtrip() {
        let mut account = VaultAccount::new(wbtc(), dai());
        account.dormant_balance = 42;
        account.last_recorded_value = 42;

        let json = serde_json::to_string(&account).expect("serialize");
        let back: VaultAccount = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, account);
    }
}
