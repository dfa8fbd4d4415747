//! nockwallet-storage
//!
//! Persisted wallet state as a flat string-key → value map backed by sled
//! (pure-Rust, no C dependencies). Values are bincode-encoded serde records.
//!
//! Key layout:
//!   enc                           — encrypted vault blob
//!   accounts                      — array of public account records
//!   currentAccountIndex           — integer
//!   autoLockMinutes               — integer ≥ 0 (0 disables)
//!   onboardingState               — { backupComplete }
//!   approvedOrigins               — array of origin strings
//!   cachedBalances                — pkh → nicks (UI hint only)
//!   utxoStore/<pkh>/notes         — array of StoredNote records
//!   utxoStore/<pkh>/transactions  — array of WalletTransaction records

use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::warn;

use nockwallet_core::WalletError;

/// Well-known storage keys.
pub mod keys {
    use nockwallet_core::types::Digest;

    pub const ENCRYPTED_VAULT: &str = "enc";
    pub const ACCOUNTS: &str = "accounts";
    pub const CURRENT_ACCOUNT_INDEX: &str = "currentAccountIndex";
    pub const AUTO_LOCK_MINUTES: &str = "autoLockMinutes";
    pub const ONBOARDING_STATE: &str = "onboardingState";
    pub const APPROVED_ORIGINS: &str = "approvedOrigins";
    pub const CACHED_BALANCES: &str = "cachedBalances";

    pub fn utxo_notes(pkh: &Digest) -> String {
        format!("utxoStore/{}/notes", pkh.to_b58())
    }

    pub fn utxo_transactions(pkh: &Digest) -> String {
        format!("utxoStore/{}/transactions", pkh.to_b58())
    }
}

/// Handle to the persisted key→value map.
pub struct WalletStorage {
    db: sled::Db,
}

impl WalletStorage {
    /// Open or create the wallet database at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, WalletError> {
        let db = sled::open(path).map_err(|e| WalletError::Storage(e.to_string()))?;
        Ok(Self { db })
    }

    /// An ephemeral database for tests: nothing touches disk after drop.
    pub fn temporary() -> Result<Self, WalletError> {
        let db = sled::Config::new()
            .temporary(true)
            .open()
            .map_err(|e| WalletError::Storage(e.to_string()))?;
        Ok(Self { db })
    }

    /// Read and decode a record. Decode failure is an error; callers that
    /// prefer corruption-tolerant reads use [`WalletStorage::get_lenient`].
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, WalletError> {
        match self.db.get(key).map_err(|e| WalletError::Storage(e.to_string()))? {
            Some(bytes) => {
                let value = bincode::deserialize(&bytes)
                    .map_err(|e| WalletError::Serialization(format!("{key}: {e}")))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    /// Read a record, treating an undecodable value as absent. Used by the
    /// UTXO store so a corrupted book degrades to an empty one and a full
    /// re-sync, instead of wedging the engine.
    pub fn get_lenient<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, WalletError> {
        match self.get(key) {
            Ok(v) => Ok(v),
            Err(WalletError::Serialization(msg)) => {
                warn!(key, %msg, "dropping corrupted record");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    pub fn put<T: Serialize>(&self, key: &str, value: &T) -> Result<(), WalletError> {
        let bytes =
            bincode::serialize(value).map_err(|e| WalletError::Serialization(e.to_string()))?;
        self.db
            .insert(key, bytes)
            .map_err(|e| WalletError::Storage(e.to_string()))?;
        Ok(())
    }

    pub fn delete(&self, key: &str) -> Result<(), WalletError> {
        self.db
            .remove(key)
            .map_err(|e| WalletError::Storage(e.to_string()))?;
        Ok(())
    }

    pub fn contains(&self, key: &str) -> Result<bool, WalletError> {
        self.db
            .contains_key(key)
            .map_err(|e| WalletError::Storage(e.to_string()))
    }

    /// Wipe every key. Vault reset destroys the whole layout, UTXO books
    /// and cached balances included.
    pub fn clear(&self) -> Result<(), WalletError> {
        self.db.clear().map_err(|e| WalletError::Storage(e.to_string()))?;
        self.flush()
    }

    /// Flush pending writes to disk.
    pub fn flush(&self) -> Result<(), WalletError> {
        self.db.flush().map_err(|e| WalletError::Storage(e.to_string()))?;
        Ok(())
    }
}
