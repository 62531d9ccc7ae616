//! # Vault Store — Persistent Records
//!
//! Persistence for vault state, built on sled's embedded key-value
//! store. Only locally-owned state is persisted — dormant balance,
//! borrow float, NAV baseline, the share ledger, and policy parameters.
//! Venue-side balances are deliberately not stored: they are re-queried
//! live on every operation, and a number written yesterday about someone
//! else's books is worse than no number.
//!
//! ## Tree Layout
//!
//! | Tree       | Key                              | Value            |
//! |------------|----------------------------------|------------------|
//! | `vaults`   | canonical vault key (UTF-8)      | `bincode(Vault)` |
//! | `metadata` | key (UTF-8)                      | value (bytes)    |
//!
//! The vault key is the [`VaultKey`] canonical string
//! (`TICKER:market:vN`), so a `sled` scan of the tree doubles as an
//! index listing.

use sled::{Db, Tree};
use std::path::Path;

use crate::registry::VaultKey;
use crate::vault::Vault;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur during store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("corrupt record under key {key}: {reason}")]
    Corrupt { key: String, reason: String },
}

pub type StoreResult<T> = Result<T, StoreError>;

// ---------------------------------------------------------------------------
// Metadata Keys
// ---------------------------------------------------------------------------

/// Well-known key in the `metadata` tree for the record schema version.
const META_SCHEMA_VERSION: &[u8] = b"schema_version";

/// Current record schema version. Bumped when the serialized layout of
/// [`Vault`] changes incompatibly.
const SCHEMA_VERSION: u64 = 1;

// ---------------------------------------------------------------------------
// VaultStore
// ---------------------------------------------------------------------------

/// Persistent storage for vault records.
///
/// Wraps a sled `Db` and exposes typed accessors keyed by [`VaultKey`].
/// Serialization is bincode throughout.
///
/// # Thread Safety
///
/// sled trees support lock-free concurrent reads and serialized writes;
/// a `VaultStore` can be shared across threads via `Arc<VaultStore>`
/// without external synchronization.
#[derive(Debug, Clone)]
pub struct VaultStore {
    /// The underlying sled database handle.
    db: Db,
    /// Vault records keyed by canonical vault key.
    vaults: Tree,
    /// Arbitrary key-value metadata (schema version, etc.).
    metadata: Tree,
}

impl VaultStore {
    /// Opens or creates a store at the given filesystem path.
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let db = sled::open(path)?;
        Self::from_db(db)
    }

    /// Creates a temporary in-memory store, cleaned up on drop. For
    /// tests and the keeper's demo mode.
    pub fn open_temporary() -> StoreResult<Self> {
        let config = sled::Config::new().temporary(true);
        let db = config.open()?;
        Self::from_db(db)
    }

    fn from_db(db: Db) -> StoreResult<Self> {
        let vaults = db.open_tree("vaults")?;
        let metadata = db.open_tree("metadata")?;

        let store = Self {
            db,
            vaults,
            metadata,
        };
        store.check_schema()?;
        Ok(store)
    }

    /// Stamps a fresh store with the schema version, and refuses to open
    /// a store written by an incompatible version.
    fn check_schema(&self) -> StoreResult<()> {
        match self.metadata.get(META_SCHEMA_VERSION)? {
            None => {
                self.metadata
                    .insert(META_SCHEMA_VERSION, &SCHEMA_VERSION.to_be_bytes())?;
                Ok(())
            }
            Some(bytes) => {
                let found = u64::from_be_bytes(bytes.as_ref().try_into().map_err(|_| {
                    StoreError::Corrupt {
                        key: "schema_version".to_string(),
                        reason: "invalid version bytes".to_string(),
                    }
                })?);
                if found != SCHEMA_VERSION {
                    return Err(StoreError::Corrupt {
                        key: "schema_version".to_string(),
                        reason: format!("schema {found}, this build reads {SCHEMA_VERSION}"),
                    });
                }
                Ok(())
            }
        }
    }

    // -- Vault records ------------------------------------------------------

    /// Persists a vault record under `key`, overwriting any previous
    /// record, and flushes to disk. The flush is what makes a committed
    /// deposit or rebalance survive a crash.
    pub fn put_vault(&self, key: &VaultKey, vault: &Vault) -> StoreResult<()> {
        let bytes =
            bincode::serialize(vault).map_err(|e| StoreError::Serialization(e.to_string()))?;
        self.vaults.insert(key.storage_key().as_bytes(), bytes)?;
        self.db.flush()?;
        Ok(())
    }

    /// Retrieves the vault record under `key`, or `None` if absent.
    pub fn get_vault(&self, key: &VaultKey) -> StoreResult<Option<Vault>> {
        match self.vaults.get(key.storage_key().as_bytes())? {
            Some(bytes) => {
                let vault: Vault = bincode::deserialize(&bytes).map_err(|e| StoreError::Corrupt {
                    key: key.storage_key(),
                    reason: e.to_string(),
                })?;
                Ok(Some(vault))
            }
            None => Ok(None),
        }
    }

    /// Loads every persisted vault record. The registry restore path.
    pub fn load_all(&self) -> StoreResult<Vec<(VaultKey, Vault)>> {
        let mut records = Vec::with_capacity(self.vaults.len());
        for entry in self.vaults.iter() {
            let (key_bytes, value) = entry?;
            let raw = String::from_utf8(key_bytes.to_vec()).map_err(|_| StoreError::Corrupt {
                key: String::from_utf8_lossy(&key_bytes).into_owned(),
                reason: "non-UTF-8 key".to_string(),
            })?;
            let key = VaultKey::parse(&raw).map_err(|_| StoreError::Corrupt {
                key: raw.clone(),
                reason: "unparseable vault key".to_string(),
            })?;
            let vault: Vault = bincode::deserialize(&value).map_err(|e| StoreError::Corrupt {
                key: raw,
                reason: e.to_string(),
            })?;
            records.push((key, vault));
        }
        Ok(records)
    }

    // -- Utility ------------------------------------------------------------

    /// Number of vault records stored.
    pub fn vault_count(&self) -> usize {
        self.vaults.len()
    }

    /// Forces a flush of all pending writes to disk.
    pub fn flush(&self) -> StoreResult<()> {
        self.db.flush()?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::AssetId;
    use crate::config::{PolicyParams, WAD};
    use crate::markets::sim::SimOracle;
    use crate::vault::VaultConfig;

    fn wbtc() -> AssetId {
        AssetId::new("WBTC")
    }

    fn key() -> VaultKey {
        VaultKey::new(wbtc(), "fuse-pool-6", 2)
    }

    fn funded_vault() -> Vault {
        let mut vault = Vault::new(VaultConfig {
            underlying: wbtc(),
            borrow_asset: AssetId::new("DAI"),
            params: PolicyParams::default(),
        });
        let mut oracle = SimOracle::new();
        oracle.set_price(wbtc(), WAD);
        vault.deposit("res:alice", 1_000, &oracle).unwrap();
        vault
    }

    #[test]
    fn open_temporary_store() {
        let store = VaultStore::open_temporary().expect("should create temp store");
        assert_eq!(store.vault_count(), 0);
    }

    #[test]
    fn get_missing_vault_is_none() {
        let store = VaultStore::open_temporary().unwrap();
        assert!(store.get_vault(&key()).unwrap().is_none());
    }

    #[test]
    fn put_and_get_roundtrip() {
        let store = VaultStore::open_temporary().unwrap();
        let vault = funded_vault();

        store.put_vault(&key(), &vault).unwrap();

        let restored = store.get_vault(&key()).unwrap().expect("record exists");
        assert_eq!(restored.account(), vault.account());
        assert_eq!(restored.ledger().shares_of("res:alice"), 1_000);
        assert_eq!(restored.params(), vault.params());
    }

    #[test]
    fn overwrite_replaces_record() {
        let store = VaultStore::open_temporary().unwrap();
        let mut vault = funded_vault();
        store.put_vault(&key(), &vault).unwrap();

        let mut oracle = SimOracle::new();
        oracle.set_price(wbtc(), WAD);
        vault.deposit("res:bob", 2_000, &oracle).unwrap();
        store.put_vault(&key(), &vault).unwrap();

        let restored = store.get_vault(&key()).unwrap().unwrap();
        assert_eq!(restored.ledger().total_supply(), 3_000);
        assert_eq!(store.vault_count(), 1);
    }

    #[test]
    fn load_all_returns_every_record() {
        let store = VaultStore::open_temporary().unwrap();
        let vault = funded_vault();

        let k1 = VaultKey::new(wbtc(), "fuse-pool-6", 1);
        let k2 = VaultKey::new(wbtc(), "fuse-pool-6", 2);
        let k3 = VaultKey::new(AssetId::new("USDC"), "fuse-pool-18", 2);
        store.put_vault(&k1, &vault).unwrap();
        store.put_vault(&k2, &vault).unwrap();
        store.put_vault(&k3, &vault).unwrap();

        let mut records = store.load_all().unwrap();
        records.sort_by_key(|(k, _)| k.storage_key());
        assert_eq!(records.len(), 3);
        assert!(records.iter().any(|(k, _)| *k == k3));
        for (_, v) in &records {
            assert_eq!(v.ledger().total_supply(), 1_000);
        }
    }

    #[test]
    fn records_survive_reopen() {
        let dir = tempfile::tempdir().expect("tempdir");
        let vault = funded_vault();

        {
            let store = VaultStore::open(dir.path()).unwrap();
            store.put_vault(&key(), &vault).unwrap();
        }

        let store = VaultStore::open(dir.path()).unwrap();
        let restored = store.get_vault(&key()).unwrap().expect("survives reopen");
        assert_eq!(restored.account().dormant_balance, 1_000);
        assert_eq!(restored.account().last_recorded_value, 1_000);
    }

    #[test]
    fn schema_version_is_stamped() {
        let dir = tempfile::tempdir().expect("tempdir");
        {
            let _store = VaultStore::open(dir.path()).unwrap();
        }
        // A second open against the same stamp succeeds.
        let store = VaultStore::open(dir.path()).unwrap();
        assert_eq!(store.vault_count(), 0);
    }

    #[test]
    fn restore_into_registry() {
        use crate::registry::VaultRegistry;

        let store = VaultStore::open_temporary().unwrap();
        store.put_vault(&key(), &funded_vault()).unwrap();

        let registry = VaultRegistry::new();
        for (k, v) in store.load_all().unwrap() {
            registry.insert(k, v).unwrap();
        }

        let vault = registry.get(&key()).unwrap();
        assert_eq!(vault.lock().claim_of("res:alice"), 1_000);
    }
}
