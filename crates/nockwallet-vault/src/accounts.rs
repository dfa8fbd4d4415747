//! Public account records.
//!
//! Accounts are append-only per vault: removing one sets the hidden flag,
//! so derivation indices are never reused and on-chain balances stay
//! reachable.

use serde::{Deserialize, Serialize};

use nockwallet_core::types::Digest;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Derivation index under the master key.
    pub index: u32,
    pub name: String,
    /// TIP5 hash of the derived public key; the account's address.
    pub pkh: Digest,
    /// Soft-deleted. Hidden accounts keep their index forever.
    #[serde(default)]
    pub hidden: bool,
    /// Opaque display attributes owned by the presentation layer.
    #[serde(default)]
    pub display: Option<String>,
}

impl Account {
    pub fn new(index: u32, name: String, pkh: Digest) -> Self {
        Self { index, name, pkh, hidden: false, display: None }
    }

    /// Default name for a freshly derived account.
    pub fn default_name(index: u32) -> String {
        format!("Account {}", index + 1)
    }
}
