//! Deterministic Schnorr signing.
//!
//! The nonce is derived from the private key and message through the TIP5
//! noun hash, so signing the same payload twice yields byte-identical
//! signatures. The response scalar is carried as a plain big integer and
//! verification checks `s·G = R + e·P` exactly, so no subgroup-order
//! constant enters the scheme.

use num_bigint::BigUint;
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

use nockwallet_core::constants::{PRIVATE_KEY_BYTES, PUBLIC_KEY_BYTES};
use nockwallet_core::hash::NounHash;
use nockwallet_core::noun::Noun;
use nockwallet_core::types::Digest;
use nockwallet_core::WalletError;

use crate::curve::Point;

// ── PrivateKey ───────────────────────────────────────────────────────────────

/// A 32-byte signing scalar. Wiped from memory on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct PrivateKey([u8; PRIVATE_KEY_BYTES]);

impl PrivateKey {
    /// Rejects the zero scalar.
    pub fn from_bytes(bytes: [u8; PRIVATE_KEY_BYTES]) -> Result<Self, WalletError> {
        if bytes.iter().all(|b| *b == 0) {
            return Err(WalletError::SigningFailed("zero private key".into()));
        }
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; PRIVATE_KEY_BYTES] {
        &self.0
    }

    fn scalar(&self) -> BigUint {
        BigUint::from_bytes_be(&self.0)
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey(Point::generator().scalar_mul(&self.scalar()))
    }

    /// Sign an arbitrary byte string. Deterministic: nonce and challenge
    /// both come from TIP5 over length-framed nouns.
    pub fn sign(&self, message: &[u8]) -> Result<Signature, WalletError> {
        let k_digest = frame_hash(&[&self.0, message]);
        let k = BigUint::from_bytes_be(k_digest.as_bytes());
        if k == BigUint::default() {
            return Err(WalletError::SigningFailed("degenerate nonce".into()));
        }
        let r_point = Point::generator().scalar_mul(&k);
        let public = self.public_key();
        let e = challenge(&r_point, &public, message);
        let s = k + e * self.scalar();
        Ok(Signature { r: r_point.encode().to_vec(), s: s.to_bytes_be() })
    }
}

impl std::fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PrivateKey(…)")
    }
}

// ── PublicKey ────────────────────────────────────────────────────────────────

/// A curve point, encoded on the wire as 97 bytes.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct PublicKey(Point);

impl PublicKey {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, WalletError> {
        if bytes.len() != PUBLIC_KEY_BYTES {
            return Err(WalletError::InvalidEncoding(format!(
                "public key must be {PUBLIC_KEY_BYTES} bytes, got {}",
                bytes.len()
            )));
        }
        let point = Point::decode(bytes)
            .ok_or_else(|| WalletError::InvalidEncoding("public key not on curve".into()))?;
        Ok(Self(point))
    }

    pub fn to_bytes(&self) -> [u8; PUBLIC_KEY_BYTES] {
        self.0.encode()
    }

    pub fn point(&self) -> &Point {
        &self.0
    }

    /// The public-key hash: the TIP5 noun hash of the encoded key atom.
    /// Account addresses and PKH locks are keyed by this digest.
    pub fn pkh(&self) -> Digest {
        Noun::atom_bytes(&self.to_bytes()).noun_hash()
    }

    /// Check a signature produced by [`PrivateKey::sign`].
    pub fn verify(&self, message: &[u8], signature: &Signature) -> bool {
        let Some(r_point) = Point::decode(&signature.r) else {
            return false;
        };
        let s = BigUint::from_bytes_be(&signature.s);
        let e = challenge(&r_point, self, message);
        let lhs = Point::generator().scalar_mul(&s);
        let rhs = r_point.add(&self.0.scalar_mul(&e));
        lhs == rhs
    }
}

// ── Signature ────────────────────────────────────────────────────────────────

/// A Schnorr signature: the 97-byte nonce commitment and the big-endian
/// response scalar.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    pub r: Vec<u8>,
    pub s: Vec<u8>,
}

impl std::fmt::Debug for Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Signature({}b)", self.r.len() + self.s.len())
    }
}

// ── Hash framing ─────────────────────────────────────────────────────────────

/// Hash a sequence of byte strings with explicit length framing, so
/// adjacent fields can never merge into the same preimage.
fn frame_hash(parts: &[&[u8]]) -> Digest {
    let mut noun = Noun::atom_u64(0);
    for part in parts.iter().rev() {
        let framed = Noun::cell(Noun::atom_u64(part.len() as u64), Noun::atom_bytes(part));
        noun = Noun::cell(framed, noun);
    }
    noun.noun_hash()
}

fn challenge(r_point: &Point, public: &PublicKey, message: &[u8]) -> BigUint {
    let digest = frame_hash(&[&r_point.encode(), &public.to_bytes(), message]);
    BigUint::from_bytes_be(digest.as_bytes())
}
