//! # External Market Adapters
//!
//! The engine never talks to an external protocol directly — it talks to
//! the two traits in this module. [`CollateralMarket`] is the lending
//! venue where the vault's asset is supplied as collateral and the
//! borrow asset is drawn against it. [`YieldSource`] is the secondary
//! venue where borrowed funds go to earn.
//!
//! Two contract points matter more than anything else here:
//!
//! 1. **Failures are typed.** An adapter must report a failure as a
//!    [`MarketError`], never as a silent zero, whenever the failure is
//!    distinguishable from "request exceeds capacity". A zero return
//!    from [`CollateralMarket::borrow`] specifically means "at capacity",
//!    and the engine plans around it.
//! 2. **Partial fills are legal.** `borrow`, `redeem`, `repay`, and
//!    [`YieldSource::withdraw`] may return less than requested. Whether a
//!    shortfall is tolerable is the caller's decision — rebalances
//!    re-plan, withdrawals abort.
//!
//! External balances are logically owned by the venues; the engine
//! re-queries them on every invocation and never assumes they are stable
//! between reads.

pub mod oracle;
pub mod sim;

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::asset::AssetId;

pub use oracle::{PriceQuote, ValuationOracle};

// ---------------------------------------------------------------------------
// Venue
// ---------------------------------------------------------------------------

/// Which external venue an error originated from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Venue {
    /// The lending market holding collateral and the borrow position.
    CollateralMarket,
    /// The secondary venue holding deployed borrow-asset funds.
    YieldSource,
}

impl fmt::Display for Venue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Venue::CollateralMarket => write!(f, "collateral market"),
            Venue::YieldSource => write!(f, "yield source"),
        }
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Typed adapter failures.
#[derive(Debug, Error)]
pub enum MarketError {
    /// The venue refused the call outright (paused, frozen asset,
    /// protocol-level guard).
    #[error("{venue} rejected call: {reason}")]
    Rejected {
        /// The failing venue.
        venue: Venue,
        /// Venue-reported reason.
        reason: String,
    },

    /// The venue filled less than requested in a context where the
    /// adapter itself knows the shortfall is an error (e.g. redeeming
    /// more than is held).
    #[error("{venue} under-filled: requested {requested}, filled {filled}")]
    Unfilled {
        /// The failing venue.
        venue: Venue,
        /// Amount requested.
        requested: u64,
        /// Amount actually filled.
        filled: u64,
    },

    /// The request exceeds a hard market-level limit.
    #[error("{venue} at capacity: requested {requested}, capacity {capacity}")]
    AtCapacity {
        /// The failing venue.
        venue: Venue,
        /// Amount requested.
        requested: u64,
        /// Remaining capacity.
        capacity: u64,
    },
}

// ---------------------------------------------------------------------------
// CollateralMarket
// ---------------------------------------------------------------------------

/// Adapter to the lending market: collateral on one side, the borrow
/// position on the other.
///
/// Supplied balances are reported in underlying smallest units (derived
/// from the market's exchange-rate-bearing receipt balance — the
/// receipt-token mechanics stay behind this boundary). Borrowed balances
/// are in the borrow asset's smallest units.
pub trait CollateralMarket {
    /// The asset accepted as collateral.
    fn underlying(&self) -> AssetId;

    /// The asset drawn when borrowing.
    fn borrow_asset(&self) -> AssetId;

    /// Supplies `amount` of underlying as collateral. Returns the
    /// receipt delta, expressed in underlying units.
    fn supply(&mut self, amount: u64) -> Result<u64, MarketError>;

    /// Redeems up to `amount` of underlying collateral. Returns the
    /// amount actually redeemed (`<= amount` under market liquidity
    /// limits).
    fn redeem(&mut self, amount: u64) -> Result<u64, MarketError>;

    /// Borrows up to `amount` of the borrow asset. Returns the amount
    /// actually drawn: `<= amount`, and `0` when the position is at
    /// capacity. Borrowing beyond capacity is impossible by
    /// construction — the market clamps, it does not overdraw.
    fn borrow(&mut self, amount: u64) -> Result<u64, MarketError>;

    /// Repays up to `amount` of the outstanding borrow. Returns the
    /// amount actually applied (`<= amount`; never more than is owed).
    fn repay(&mut self, amount: u64) -> Result<u64, MarketError>;

    /// Current collateral balance, in underlying units.
    fn supplied_balance(&self) -> u64;

    /// Current outstanding borrow principal, in borrow-asset units.
    fn borrowed_balance(&self) -> u64;

    /// Maximum safe borrow value against the current collateral, in
    /// common units (WAD-scaled). This is the gross figure — the
    /// outstanding borrow is not subtracted.
    fn collateral_capacity(&self) -> Result<u128, MarketError>;

    /// The market's collateral factor in basis points: how much borrow
    /// value one unit of collateral value unlocks.
    fn collateral_factor_bps(&self) -> u64;
}

// ---------------------------------------------------------------------------
// YieldSource
// ---------------------------------------------------------------------------

/// Adapter to the secondary yield venue where borrowed funds earn.
pub trait YieldSource {
    /// The asset this venue accepts (the borrow asset, in the leveraged
    /// strategy).
    fn asset(&self) -> AssetId;

    /// Deposits `amount` into the venue. Returns the receipt delta.
    fn deposit(&mut self, amount: u64) -> Result<u64, MarketError>;

    /// Withdraws up to `amount`. Returns the amount actually recovered —
    /// possibly less than requested under slippage or liquidity limits.
    /// Callers must tolerate the shortfall and re-plan.
    fn withdraw(&mut self, amount: u64) -> Result<u64, MarketError>;

    /// Current position value in common units (WAD-scaled).
    fn current_value(&self) -> u128;

    /// Current position size in asset units.
    fn balance(&self) -> u64;
}
