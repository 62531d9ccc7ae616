//! Error types for vault operations.
//!
//! Every fallible operation on a vault returns a [`VaultError`]. The enum
//! is exhaustive over the failure modes of the deposit / withdraw /
//! rebalance surface, and every variant carries enough structured context
//! to act on without string-parsing.
//!
//! Propagation policy:
//!
//! - [`InvalidAmount`](VaultError::InvalidAmount),
//!   [`InsufficientBalance`](VaultError::InsufficientBalance), and
//!   [`InsufficientLiquidity`](VaultError::InsufficientLiquidity) are
//!   caller mistakes. They are surfaced immediately and never retried.
//! - [`ExternalProtocolRejected`](VaultError::ExternalProtocolRejected)
//!   aborts the whole invocation with no partial commit. Retrying on a
//!   later tick is the keeper scheduler's job, not the engine's.
//! - [`StaleValuation`](VaultError::StaleValuation) is fatal to that
//!   invocation only; nothing is written until valuation succeeds.

use thiserror::Error;

use crate::asset::AssetId;
use crate::markets::{MarketError, Venue};

/// Errors that can occur during vault operations.
#[derive(Debug, Error)]
pub enum VaultError {
    /// The amount is zero or its value is below the configured minimum.
    #[error("invalid amount: {amount} (value {value}, minimum {minimum})")]
    InvalidAmount {
        /// The rejected amount in smallest units.
        amount: u64,
        /// The oracle-converted value of the amount (WAD-scaled).
        value: u128,
        /// The configured minimum deposit value (WAD-scaled).
        minimum: u128,
    },

    /// A withdrawal request exceeds the holder's claim.
    #[error("insufficient balance: claim {claim}, requested {requested} (holder {holder})")]
    InsufficientBalance {
        /// The holder whose claim was checked.
        holder: String,
        /// The holder's current claim in underlying units.
        claim: u64,
        /// The requested withdrawal amount.
        requested: u64,
    },

    /// Honoring the withdrawal would push the collateral position below
    /// what the outstanding borrow requires.
    #[error(
        "insufficient liquidity: shortfall {shortfall}, safely redeemable {redeemable}"
    )]
    InsufficientLiquidity {
        /// Amount that could not be covered from the dormant balance.
        shortfall: u64,
        /// Maximum collateral redeemable without endangering the borrow.
        redeemable: u64,
    },

    /// An external venue rejected a call or returned less than requested
    /// where a shortfall is not tolerable.
    #[error("{venue} rejected: {reason}")]
    ExternalProtocolRejected {
        /// Which external venue failed.
        venue: Venue,
        /// Venue-reported reason.
        reason: String,
    },

    /// The oracle quote for an asset is missing, zero, or too old.
    #[error("stale valuation for {asset}: {reason}")]
    StaleValuation {
        /// The asset whose quote was unusable.
        asset: AssetId,
        /// Why the quote was rejected (zero price, age, missing feed).
        reason: String,
    },

    /// A borrow or collateral request exceeds market-level limits.
    #[error("{venue} capacity exceeded: requested {requested}, capacity {capacity}")]
    CapacityExceeded {
        /// Which external venue enforced the limit.
        venue: Venue,
        /// The requested amount or value.
        requested: u128,
        /// The venue's remaining capacity.
        capacity: u128,
    },
}

impl From<MarketError> for VaultError {
    fn from(err: MarketError) -> Self {
        match err {
            MarketError::AtCapacity {
                venue,
                requested,
                capacity,
            } => VaultError::CapacityExceeded {
                venue,
                requested: requested as u128,
                capacity: capacity as u128,
            },
            MarketError::Rejected { venue, reason } => {
                VaultError::ExternalProtocolRejected { venue, reason }
            }
            MarketError::Unfilled {
                venue,
                requested,
                filled,
            } => VaultError::ExternalProtocolRejected {
                venue,
                reason: format!("partial fill: requested {requested}, filled {filled}"),
            },
        }
    }
}
