//! BIP-39 mnemonic handling.
//!
//! Mnemonics are always 24 English words. Seed derivation is the standard
//! PBKDF2-HMAC-SHA512 with 2048 rounds over `"mnemonic" ++ passphrase`,
//! performed by the bip39 crate.

use bip39::{Language, Mnemonic};

use nockwallet_core::constants::{MNEMONIC_WORD_COUNT, SEED_BYTES};
use nockwallet_core::WalletError;

/// Parse and checksum-validate a 24-word English mnemonic.
pub fn parse_mnemonic(phrase: &str) -> Result<Mnemonic, WalletError> {
    let mnemonic =
        Mnemonic::parse_in(Language::English, phrase).map_err(|_| WalletError::InvalidMnemonic)?;
    if mnemonic.word_count() != MNEMONIC_WORD_COUNT {
        return Err(WalletError::InvalidMnemonic);
    }
    Ok(mnemonic)
}

/// Generate a fresh 24-word mnemonic from OS entropy.
pub fn generate_mnemonic() -> Result<Mnemonic, WalletError> {
    Mnemonic::generate_in(Language::English, MNEMONIC_WORD_COUNT)
        .map_err(|_| WalletError::InvalidMnemonic)
}

/// 64-byte seed for a validated mnemonic and optional passphrase.
pub fn mnemonic_to_seed(mnemonic: &Mnemonic, passphrase: Option<&str>) -> [u8; SEED_BYTES] {
    mnemonic.to_seed(passphrase.unwrap_or(""))
}
