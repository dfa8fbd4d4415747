//! nockwallet-crypto
//!
//! Signing keys for the Nockchain wallet: the sextic-extension curve group,
//! deterministic Schnorr signatures with 97-byte public keys, BIP-39
//! mnemonic handling, and the HMAC-SHA512 extended-key hierarchy that maps
//! account indices to signing keys.

pub mod curve;
pub mod fp6;
pub mod keys;
pub mod mnemonic;
pub mod schnorr;

pub use keys::{derive_master_key, derive_master_key_from_mnemonic, ExtendedKey};
pub use mnemonic::{generate_mnemonic, mnemonic_to_seed, parse_mnemonic};
pub use schnorr::{PrivateKey, PublicKey, Signature};
