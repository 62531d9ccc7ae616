//! # Vault Registry
//!
//! One process serves many vaults: the same asset can run against
//! different collateral markets, and the same (asset, market) pair can
//! run different strategy generations side by side while depositors
//! migrate. The registry keys each vault by all three.
//!
//! Vaults are never destroyed. A fully-withdrawn vault stays registered
//! with zero balances and zero supply, ready for the next deposit — the
//! key, and the history behind it, outlive the money.
//!
//! ## Concurrency
//!
//! Each vault sits behind its own `parking_lot::Mutex`, shared via
//! `Arc`. Operations on different vaults never contend; operations on
//! the same vault serialize, which is exactly the consistency the
//! accounting needs.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::asset::AssetId;
use crate::vault::{Vault, VaultConfig};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Registry-level failures.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// A vault already exists under this key.
    #[error("vault already registered: {key}")]
    Duplicate {
        /// The conflicting key.
        key: VaultKey,
    },

    /// No vault exists under this key.
    #[error("unknown vault: {key}")]
    Unknown {
        /// The key that was looked up.
        key: VaultKey,
    },

    /// A storage key string did not parse as a [`VaultKey`].
    #[error("malformed vault key: {raw}")]
    MalformedKey {
        /// The raw string that failed to parse.
        raw: String,
    },
}

// ---------------------------------------------------------------------------
// VaultKey
// ---------------------------------------------------------------------------

/// Identifies one vault: deposit asset, collateral market, strategy
/// generation.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VaultKey {
    /// The deposit asset.
    pub underlying: AssetId,
    /// Identifier of the collateral market the vault deploys into.
    pub market: String,
    /// Strategy generation (matches the policy's version).
    pub strategy_version: u32,
}

impl VaultKey {
    /// Creates a key.
    pub fn new(underlying: AssetId, market: impl Into<String>, strategy_version: u32) -> Self {
        Self {
            underlying,
            market: market.into(),
            strategy_version,
        }
    }

    /// The key's canonical string form, used as the storage key:
    /// `TICKER:market:vN`. Market identifiers must not contain `:`.
    pub fn storage_key(&self) -> String {
        format!(
            "{}:{}:v{}",
            self.underlying, self.market, self.strategy_version
        )
    }

    /// Parses a canonical string form back into a key.
    pub fn parse(raw: &str) -> Result<Self, RegistryError> {
        let malformed = || RegistryError::MalformedKey {
            raw: raw.to_string(),
        };

        let mut parts = raw.splitn(3, ':');
        let ticker = parts.next().ok_or_else(malformed)?;
        let market = parts.next().ok_or_else(malformed)?;
        let version = parts.next().ok_or_else(malformed)?;

        if ticker.is_empty() || market.is_empty() {
            return Err(malformed());
        }
        let strategy_version = version
            .strip_prefix('v')
            .and_then(|v| v.parse::<u32>().ok())
            .ok_or_else(malformed)?;

        Ok(Self {
            underlying: AssetId::new(ticker),
            market: market.to_string(),
            strategy_version,
        })
    }
}

impl fmt::Display for VaultKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.storage_key())
    }
}

// ---------------------------------------------------------------------------
// VaultRegistry
// ---------------------------------------------------------------------------

/// All live vaults, keyed by [`VaultKey`].
#[derive(Default)]
pub struct VaultRegistry {
    vaults: RwLock<HashMap<VaultKey, Arc<Mutex<Vault>>>>,
}

impl VaultRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new empty vault under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Duplicate`] if the key is taken. Keys
    /// are permanent; re-use the existing vault instead.
    pub fn create(&self, key: VaultKey, config: VaultConfig) -> Result<Arc<Mutex<Vault>>, RegistryError> {
        self.insert(key, Vault::new(config))
    }

    /// Registers an already-populated vault (the restore-from-disk path).
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Duplicate`] if the key is taken.
    pub fn insert(&self, key: VaultKey, vault: Vault) -> Result<Arc<Mutex<Vault>>, RegistryError> {
        let mut vaults = self.vaults.write();
        if vaults.contains_key(&key) {
            return Err(RegistryError::Duplicate { key });
        }

        info!(%key, underlying = %vault.underlying(), "vault registered");
        let handle = Arc::new(Mutex::new(vault));
        vaults.insert(key, Arc::clone(&handle));
        Ok(handle)
    }

    /// Looks up the vault under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Unknown`] for an unregistered key.
    pub fn get(&self, key: &VaultKey) -> Result<Arc<Mutex<Vault>>, RegistryError> {
        self.vaults
            .read()
            .get(key)
            .cloned()
            .ok_or_else(|| RegistryError::Unknown { key: key.clone() })
    }

    /// Whether a vault exists under `key`.
    pub fn contains(&self, key: &VaultKey) -> bool {
        self.vaults.read().contains_key(key)
    }

    /// All registered keys, in no particular order.
    pub fn keys(&self) -> Vec<VaultKey> {
        self.vaults.read().keys().cloned().collect()
    }

    /// Keys of every vault denominated in `asset`.
    pub fn keys_for_asset(&self, asset: AssetId) -> Vec<VaultKey> {
        self.vaults
            .read()
            .keys()
            .filter(|k| k.underlying == asset)
            .cloned()
            .collect()
    }

    /// Keys of every vault deployed into `market`.
    pub fn keys_for_market(&self, market: &str) -> Vec<VaultKey> {
        self.vaults
            .read()
            .keys()
            .filter(|k| k.market == market)
            .cloned()
            .collect()
    }

    /// Number of registered vaults.
    pub fn len(&self) -> usize {
        self.vaults.read().len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.vaults.read().is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
