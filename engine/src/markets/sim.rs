//! # Simulated Venues
//!
//! Deterministic in-memory implementations of the market adapters and
//! the oracle. These back every unit and integration test in the crate,
//! and the keeper's demo mode runs against them.
//!
//! The simulations are intentionally simple but honest about the failure
//! surface of the real venues: borrows clamp at capacity, redemptions
//! respect a liquidity cap, yield withdrawals can take a slippage
//! haircut, and a paused venue rejects everything with a typed error.

use std::collections::HashMap;

use crate::asset::AssetId;
use crate::config::BPS_DENOMINATOR;
use crate::markets::oracle::{PriceQuote, ValuationOracle};
use crate::markets::{CollateralMarket, MarketError, Venue, YieldSource};

// ---------------------------------------------------------------------------
// SimOracle
// ---------------------------------------------------------------------------

/// A price table with explicit timestamps. Tests mutate it between
/// operations to simulate price movement and staleness.
#[derive(Clone, Debug, Default)]
pub struct SimOracle {
    prices: HashMap<AssetId, PriceQuote>,
}

impl SimOracle {
    /// Creates an empty oracle (every lookup fails until prices are set).
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a fresh quote for `asset`.
    pub fn set_price(&mut self, asset: AssetId, price_wad: u128) {
        self.prices.insert(asset, PriceQuote::now(price_wad));
    }

    /// Sets a quote verbatim, timestamp included. Used to test staleness.
    pub fn set_quote(&mut self, asset: AssetId, quote: PriceQuote) {
        self.prices.insert(asset, quote);
    }
}

impl ValuationOracle for SimOracle {
    fn price_of(&self, asset: AssetId) -> Option<PriceQuote> {
        self.prices.get(&asset).copied()
    }
}

// ---------------------------------------------------------------------------
// SimCollateralMarket
// ---------------------------------------------------------------------------

/// An in-memory lending market with a collateral factor and optional
/// liquidity caps.
#[derive(Clone, Debug)]
pub struct SimCollateralMarket {
    underlying: AssetId,
    borrow_asset: AssetId,
    supplied: u64,
    borrowed: u64,
    collateral_factor_bps: u64,
    underlying_price_wad: u128,
    borrow_price_wad: u128,
    /// Maximum amount a single redeem can fill, if set.
    redeem_liquidity: Option<u64>,
    /// Maximum amount a single borrow can fill, if set.
    borrow_liquidity: Option<u64>,
    /// Market-level supply cap across all suppliers, if set.
    supply_cap: Option<u64>,
    paused: bool,
}

impl SimCollateralMarket {
    /// Creates an empty market.
    ///
    /// Prices are the market's own view, used to compute borrow
    /// capacity; keep them consistent with the [`SimOracle`] the test
    /// drives the engine with.
    pub fn new(
        underlying: AssetId,
        borrow_asset: AssetId,
        collateral_factor_bps: u64,
        underlying_price_wad: u128,
        borrow_price_wad: u128,
    ) -> Self {
        Self {
            underlying,
            borrow_asset,
            supplied: 0,
            borrowed: 0,
            collateral_factor_bps,
            underlying_price_wad,
            borrow_price_wad,
            redeem_liquidity: None,
            borrow_liquidity: None,
            supply_cap: None,
            paused: false,
        }
    }

    /// Updates the market's view of the collateral price.
    pub fn set_underlying_price(&mut self, price_wad: u128) {
        self.underlying_price_wad = price_wad;
    }

    /// Updates the market's view of the borrow asset price.
    pub fn set_borrow_price(&mut self, price_wad: u128) {
        self.borrow_price_wad = price_wad;
    }

    /// Caps how much a single redeem can fill.
    pub fn set_redeem_liquidity(&mut self, cap: Option<u64>) {
        self.redeem_liquidity = cap;
    }

    /// Caps how much the market will hold in total. Supplies beyond the
    /// cap are rejected with [`MarketError::AtCapacity`].
    pub fn set_supply_cap(&mut self, cap: Option<u64>) {
        self.supply_cap = cap;
    }

    /// Caps how much a single borrow can fill.
    pub fn set_borrow_liquidity(&mut self, cap: Option<u64>) {
        self.borrow_liquidity = cap;
    }

    /// Pauses the market: every mutating call is rejected.
    pub fn pause(&mut self) {
        self.paused = true;
    }

    /// Unpauses the market.
    pub fn unpause(&mut self) {
        self.paused = false;
    }

    /// Simulates supply-side interest: the collateral grows in place.
    pub fn accrue_supply_interest(&mut self, amount: u64) {
        self.supplied = self.supplied.saturating_add(amount);
    }

    /// Simulates borrow-side interest: the debt grows in place.
    pub fn accrue_borrow_interest(&mut self, amount: u64) {
        self.borrowed = self.borrowed.saturating_add(amount);
    }

    fn reject_if_paused(&self) -> Result<(), MarketError> {
        if self.paused {
            return Err(MarketError::Rejected {
                venue: Venue::CollateralMarket,
                reason: "market paused".into(),
            });
        }
        Ok(())
    }

    fn borrowed_value(&self) -> u128 {
        self.borrowed as u128 * self.borrow_price_wad
    }
}

impl CollateralMarket for SimCollateralMarket {
    fn underlying(&self) -> AssetId {
        self.underlying
    }

    fn borrow_asset(&self) -> AssetId {
        self.borrow_asset
    }

    fn supply(&mut self, amount: u64) -> Result<u64, MarketError> {
        self.reject_if_paused()?;
        if let Some(cap) = self.supply_cap {
            let headroom = cap.saturating_sub(self.supplied);
            if amount > headroom {
                return Err(MarketError::AtCapacity {
                    venue: Venue::CollateralMarket,
                    requested: amount,
                    capacity: headroom,
                });
            }
        }
        self.supplied = self.supplied.saturating_add(amount);
        Ok(amount)
    }

    fn redeem(&mut self, amount: u64) -> Result<u64, MarketError> {
        self.reject_if_paused()?;
        if amount > self.supplied {
            return Err(MarketError::Unfilled {
                venue: Venue::CollateralMarket,
                requested: amount,
                filled: self.supplied,
            });
        }
        let actual = match self.redeem_liquidity {
            Some(cap) => amount.min(cap),
            None => amount,
        };
        self.supplied -= actual;
        Ok(actual)
    }

    fn borrow(&mut self, amount: u64) -> Result<u64, MarketError> {
        self.reject_if_paused()?;

        // Headroom in borrow-asset units against the collateral factor.
        let capacity = self.collateral_capacity()?;
        let headroom_value = capacity.saturating_sub(self.borrowed_value());
        let headroom = if self.borrow_price_wad == 0 {
            0
        } else {
            (headroom_value / self.borrow_price_wad) as u64
        };

        let mut actual = amount.min(headroom);
        if let Some(cap) = self.borrow_liquidity {
            actual = actual.min(cap);
        }
        self.borrowed = self.borrowed.saturating_add(actual);
        Ok(actual)
    }

    fn repay(&mut self, amount: u64) -> Result<u64, MarketError> {
        self.reject_if_paused()?;
        let actual = amount.min(self.borrowed);
        self.borrowed -= actual;
        Ok(actual)
    }

    fn supplied_balance(&self) -> u64 {
        self.supplied
    }

    fn borrowed_balance(&self) -> u64 {
        self.borrowed
    }

    fn collateral_capacity(&self) -> Result<u128, MarketError> {
        let supplied_value = self.supplied as u128 * self.underlying_price_wad;
        Ok(supplied_value * self.collateral_factor_bps as u128 / BPS_DENOMINATOR as u128)
    }

    fn collateral_factor_bps(&self) -> u64 {
        self.collateral_factor_bps
    }
}

// ---------------------------------------------------------------------------
// SimYieldSource
// ---------------------------------------------------------------------------

/// An in-memory yield venue with optional withdrawal slippage.
#[derive(Clone, Debug)]
pub struct SimYieldSource {
    asset: AssetId,
    balance: u64,
    price_wad: u128,
    /// Haircut applied to withdrawals, in bps. 50 = 0.5% slippage.
    withdraw_haircut_bps: u64,
    /// Maximum amount a single withdrawal can fill, if set.
    max_withdraw: Option<u64>,
    paused: bool,
}

impl SimYieldSource {
    /// Creates an empty yield source for `asset` at the given price.
    pub fn new(asset: AssetId, price_wad: u128) -> Self {
        Self {
            asset,
            balance: 0,
            price_wad,
            withdraw_haircut_bps: 0,
            max_withdraw: None,
            paused: false,
        }
    }

    /// Sets the withdrawal slippage haircut in bps.
    pub fn set_withdraw_haircut_bps(&mut self, bps: u64) {
        self.withdraw_haircut_bps = bps.min(BPS_DENOMINATOR);
    }

    /// Caps how much a single withdrawal can fill.
    pub fn set_max_withdraw(&mut self, cap: Option<u64>) {
        self.max_withdraw = cap;
    }

    /// Updates the venue's asset price.
    pub fn set_price(&mut self, price_wad: u128) {
        self.price_wad = price_wad;
    }

    /// Pauses the venue: every mutating call is rejected.
    pub fn pause(&mut self) {
        self.paused = true;
    }

    /// Simulates earned yield: the position grows in place.
    pub fn accrue(&mut self, amount: u64) {
        self.balance = self.balance.saturating_add(amount);
    }

    fn reject_if_paused(&self) -> Result<(), MarketError> {
        if self.paused {
            return Err(MarketError::Rejected {
                venue: Venue::YieldSource,
                reason: "venue paused".into(),
            });
        }
        Ok(())
    }
}

impl YieldSource for SimYieldSource {
    fn asset(&self) -> AssetId {
        self.asset
    }

    fn deposit(&mut self, amount: u64) -> Result<u64, MarketError> {
        self.reject_if_paused()?;
        self.balance = self.balance.saturating_add(amount);
        Ok(amount)
    }

    fn withdraw(&mut self, amount: u64) -> Result<u64, MarketError> {
        self.reject_if_paused()?;
        let mut drained = amount.min(self.balance);
        if let Some(cap) = self.max_withdraw {
            drained = drained.min(cap);
        }
        let recovered =
            (drained as u128 * (BPS_DENOMINATOR - self.withdraw_haircut_bps) as u128
                / BPS_DENOMINATOR as u128) as u64;
        self.balance -= drained;
        Ok(recovered)
    }

    fn current_value(&self) -> u128 {
        self.balance as u128 * self.price_wad
    }

    fn balance(&self) -> u64 {
        self.balance
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
