//! # Asset Identifiers
//!
//! Every asset the engine touches — the deposit asset, the borrow asset,
//! the yield source's receipt token — is identified by an [`AssetId`]:
//! a fixed 8-byte uppercase ticker tag. Tags are human-readable on the
//! wire and in logs, stable across restarts, and cheap to compare.
//!
//! There is deliberately no on-the-fly asset registration here. A vault
//! is created for a known asset by the registry; the engine never meets
//! an asset it wasn't configured for.

use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// AssetId
// ---------------------------------------------------------------------------

/// A fixed-width asset identifier.
///
/// Eight bytes of ASCII, right-padded with zeros. `AssetId::new("WBTC")`
/// and `AssetId::new("WBTC")` are always equal; serialization preserves
/// the tag byte-for-byte. Tags longer than 8 bytes are truncated — pick
/// short tickers.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AssetId([u8; 8]);

impl AssetId {
    /// Creates an asset ID from a ticker string.
    pub fn new(ticker: &str) -> Self {
        let mut bytes = [0u8; 8];
        for (i, b) in ticker.bytes().take(8).enumerate() {
            bytes[i] = b.to_ascii_uppercase();
        }
        Self(bytes)
    }

    /// Returns the raw 8-byte tag.
    pub fn as_bytes(&self) -> &[u8; 8] {
        &self.0
    }

    /// Returns the ticker with trailing padding stripped.
    pub fn ticker(&self) -> String {
        let end = self.0.iter().position(|&b| b == 0).unwrap_or(8);
        String::from_utf8_lossy(&self.0[..end]).into_owned()
    }
}

impl fmt::Debug for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AssetId({})", self.ticker())
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.ticker())
    }
}
