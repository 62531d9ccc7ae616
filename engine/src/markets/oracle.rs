//! # Valuation Oracle
//!
//! Converts external-protocol balances into a common unit of account.
//! The engine queries the oracle fresh on every rebalance and withdrawal
//! that needs to reason about the borrow position — prices are never
//! cached across invocations.
//!
//! The failure posture is fail-safe, not fail-open: a missing, zero, or
//! stale quote aborts the invocation with
//! [`VaultError::StaleValuation`]. Rebalancing against bad prices is
//! strictly worse than not rebalancing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::asset::AssetId;
use crate::config::WAD;
use crate::error::VaultError;

// ---------------------------------------------------------------------------
// PriceQuote
// ---------------------------------------------------------------------------

/// A single oracle observation for one asset.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceQuote {
    /// Common-unit value of one smallest unit of the asset, WAD-scaled.
    pub price_wad: u128,

    /// When the quote was observed.
    pub as_of: DateTime<Utc>,
}

impl PriceQuote {
    /// Creates a quote observed now.
    pub fn now(price_wad: u128) -> Self {
        Self {
            price_wad,
            as_of: Utc::now(),
        }
    }

    /// Age of the quote relative to `now`. A quote from the future
    /// (clock skew) counts as age zero.
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        (now - self.as_of).to_std().unwrap_or(Duration::ZERO)
    }
}

// ---------------------------------------------------------------------------
// ValuationOracle
// ---------------------------------------------------------------------------

/// Price feed boundary. Implementations aggregate however they like;
/// the engine only requires per-asset quotes with timestamps.
pub trait ValuationOracle {
    /// The latest quote for `asset`, or `None` if no feed exists.
    fn price_of(&self, asset: AssetId) -> Option<PriceQuote>;
}

/// Fetches a usable price or fails the invocation.
///
/// Rejects missing feeds, zero prices, and quotes older than
/// `max_age`. Returns the WAD-scaled price on success.
pub fn fresh_price(
    oracle: &dyn ValuationOracle,
    asset: AssetId,
    max_age: Duration,
    now: DateTime<Utc>,
) -> Result<u128, VaultError> {
    let quote = oracle
        .price_of(asset)
        .ok_or_else(|| VaultError::StaleValuation {
            asset,
            reason: "no price feed".into(),
        })?;

    if quote.price_wad == 0 {
        return Err(VaultError::StaleValuation {
            asset,
            reason: "zero price".into(),
        });
    }

    let age = quote.age(now);
    if age > max_age {
        return Err(VaultError::StaleValuation {
            asset,
            reason: format!("quote is {}s old, max {}s", age.as_secs(), max_age.as_secs()),
        });
    }

    Ok(quote.price_wad)
}

// ---------------------------------------------------------------------------
// Conversions
// ---------------------------------------------------------------------------

/// Common-unit value (WAD-scaled) of `amount` smallest units at
/// `price_wad`.
pub fn value_of(amount: u64, price_wad: u128) -> u128 {
    amount as u128 * price_wad
}

/// Smallest units of an asset purchasable for `value` common units at
/// `price_wad`. Rounds down.
pub fn amount_at(value: u128, price_wad: u128) -> u64 {
    if price_wad == 0 {
        return 0;
    }
    (value / price_wad) as u64
}
