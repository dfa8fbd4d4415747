//! nockwallet-vault
//!
//! The password-encrypted seed vault: at-rest AEAD over the mnemonic,
//! Argon2id key stretching with persisted parameters, the
//! Absent/Locked/Unlocked state machine, the append-only account list, and
//! the auto-lock policy with its sticky manual-lock flag.

pub mod accounts;
pub mod vault;

pub use accounts::Account;
pub use vault::{EncryptedVault, KdfParams, Vault, VaultStatus};
