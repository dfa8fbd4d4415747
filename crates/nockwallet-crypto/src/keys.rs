//! Extended-key hierarchy.
//!
//! A master key is split from the BIP-39 seed with HMAC-SHA512; children
//! derive by non-negative index from the parent's chain code and private
//! key. Account `k` of a vault is `master.derive_child(k)`, and its address
//! is the TIP5 hash of the derived public key. This policy is load-bearing:
//! on-chain balances key off the derived PKH.

use hmac::{Hmac, Mac};
use sha2::Sha512;
use zeroize::Zeroize;

use nockwallet_core::constants::{PRIVATE_KEY_BYTES, SEED_BYTES};
use nockwallet_core::types::Digest;
use nockwallet_core::WalletError;

use crate::mnemonic::{mnemonic_to_seed, parse_mnemonic};
use crate::schnorr::{PrivateKey, PublicKey};

type HmacSha512 = Hmac<Sha512>;

/// Domain key for the master split.
const MASTER_HMAC_KEY: &[u8] = b"Nockchain seed";

/// A node in the derivation tree. Public-only branches carry no private
/// key and cannot derive children.
#[derive(Clone)]
pub struct ExtendedKey {
    pub private_key: Option<PrivateKey>,
    pub public_key: PublicKey,
    pub chain_code: [u8; 32],
}

impl ExtendedKey {
    /// Derive the master key from a 64-byte seed. Deterministic.
    pub fn from_seed(seed: &[u8; SEED_BYTES]) -> Result<Self, WalletError> {
        let mut mac = HmacSha512::new_from_slice(MASTER_HMAC_KEY)
            .map_err(|e| WalletError::Derivation(e.to_string()))?;
        mac.update(seed);
        let digest = mac.finalize().into_bytes();
        Self::from_split(&digest)
    }

    /// Non-hardened child derivation by index.
    pub fn derive_child(&self, index: u32) -> Result<ExtendedKey, WalletError> {
        let private = self
            .private_key
            .as_ref()
            .ok_or_else(|| WalletError::Derivation("public-only branch".into()))?;
        let mut mac = HmacSha512::new_from_slice(&self.chain_code)
            .map_err(|e| WalletError::Derivation(e.to_string()))?;
        mac.update(&[0x00]);
        mac.update(private.as_bytes());
        mac.update(&index.to_be_bytes());
        let digest = mac.finalize().into_bytes();
        Self::from_split(&digest)
            .map_err(|_| WalletError::Derivation(format!("index {index} yields a rejected key")))
    }

    /// The account address for this key: TIP5 over the encoded public key.
    pub fn pkh(&self) -> Digest {
        self.public_key.pkh()
    }

    /// Forget the private half, leaving a watch-only branch.
    pub fn neuter(&self) -> ExtendedKey {
        ExtendedKey {
            private_key: None,
            public_key: self.public_key,
            chain_code: self.chain_code,
        }
    }

    fn from_split(digest: &[u8]) -> Result<Self, WalletError> {
        let mut key_bytes = [0u8; PRIVATE_KEY_BYTES];
        key_bytes.copy_from_slice(&digest[..PRIVATE_KEY_BYTES]);
        let mut chain_code = [0u8; 32];
        chain_code.copy_from_slice(&digest[PRIVATE_KEY_BYTES..]);
        let private = PrivateKey::from_bytes(key_bytes)
            .map_err(|_| WalletError::Derivation("split yields the zero scalar".into()))?;
        key_bytes.zeroize();
        let public_key = private.public_key();
        Ok(Self { private_key: Some(private), public_key, chain_code })
    }
}

impl std::fmt::Debug for ExtendedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "ExtendedKey {{ pkh: {:?}, watch_only: {} }}",
            self.pkh(),
            self.private_key.is_none()
        )
    }
}

/// Master key from a raw seed.
pub fn derive_master_key(seed: &[u8; SEED_BYTES]) -> Result<ExtendedKey, WalletError> {
    ExtendedKey::from_seed(seed)
}

/// Convenience: parse + seed + master in one step.
pub fn derive_master_key_from_mnemonic(
    phrase: &str,
    passphrase: Option<&str>,
) -> Result<ExtendedKey, WalletError> {
    let mnemonic = parse_mnemonic(phrase)?;
    let mut seed = mnemonic_to_seed(&mnemonic, passphrase);
    let master = ExtendedKey::from_seed(&seed);
    seed.zeroize();
    master
}

#[cfg(test)]
mod tests {
    use super::*;

    const PHRASE: &str = "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon art";

    #[test]
    fn master_derivation_is_deterministic() {
        let a = derive_master_key_from_mnemonic(PHRASE, None).unwrap();
        let b = derive_master_key_from_mnemonic(PHRASE, None).unwrap();
        assert_eq!(a.pkh(), b.pkh());
        assert_eq!(a.chain_code, b.chain_code);
    }

    #[test]
    fn children_are_reproducible_and_distinct() {
        let master = derive_master_key_from_mnemonic(PHRASE, None).unwrap();
        let c0 = master.derive_child(0).unwrap();
        let c0_again = master.derive_child(0).unwrap();
        let c1 = master.derive_child(1).unwrap();
        assert_eq!(c0.pkh(), c0_again.pkh());
        assert_ne!(c0.pkh(), c1.pkh());
        assert_ne!(c0.pkh(), master.pkh());
    }

    #[test]
    fn passphrase_changes_the_tree() {
        let plain = derive_master_key_from_mnemonic(PHRASE, None).unwrap();
        let salted = derive_master_key_from_mnemonic(PHRASE, Some("hunter2")).unwrap();
        assert_ne!(plain.pkh(), salted.pkh());
    }

    #[test]
    fn public_only_branch_cannot_derive() {
        let master = derive_master_key_from_mnemonic(PHRASE, None).unwrap();
        let watch = master.neuter();
        assert!(watch.derive_child(0).is_err());
        assert_eq!(watch.pkh(), master.pkh());
    }

    #[test]
    fn derived_key_signs_under_its_own_pkh() {
        let master = derive_master_key_from_mnemonic(PHRASE, None).unwrap();
        let account = master.derive_child(0).unwrap();
        let sk = account.private_key.as_ref().unwrap();
        let sig = sk.sign(b"tx-id-bytes").unwrap();
        assert!(account.public_key.verify(b"tx-id-bytes", &sig));
        assert_eq!(account.public_key.pkh(), account.pkh());
    }
}
