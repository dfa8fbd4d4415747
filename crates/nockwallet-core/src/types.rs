use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Sub};

use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::constants::DIGEST_BYTES;
use crate::error::WalletError;

// ── Digest ───────────────────────────────────────────────────────────────────

/// 40-byte TIP5 hash value: five 64-bit field elements, little-endian bytes.
///
/// Displayed as Base58; the encode/decode pair round-trips exactly and any
/// accepted string decodes to exactly 40 bytes.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Digest(pub [u8; DIGEST_BYTES]);

impl Digest {
    pub const ZERO: Digest = Digest([0u8; DIGEST_BYTES]);

    pub fn from_bytes(b: [u8; DIGEST_BYTES]) -> Self {
        Self(b)
    }

    pub fn as_bytes(&self) -> &[u8; DIGEST_BYTES] {
        &self.0
    }

    /// Base-58 encoded string representation.
    pub fn to_b58(&self) -> String {
        bs58::encode(&self.0).into_string()
    }

    /// Decode a Base58 digest string. Rejects anything that is not exactly
    /// 40 bytes once decoded.
    pub fn from_b58(s: &str) -> Result<Self, WalletError> {
        let bytes = bs58::decode(s.trim())
            .into_vec()
            .map_err(|e| WalletError::InvalidEncoding(format!("base58: {e}")))?;
        if bytes.len() != DIGEST_BYTES {
            return Err(WalletError::InvalidEncoding(format!(
                "digest must be {DIGEST_BYTES} bytes, got {}",
                bytes.len()
            )));
        }
        let mut arr = [0u8; DIGEST_BYTES];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_b58())
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b58 = self.to_b58();
        write!(f, "Digest({}…)", &b58[..b58.len().min(8)])
    }
}

// Serialized as Base58 for human-readable formats (JSON), raw bytes for
// compact formats (bincode at rest).
impl Serialize for Digest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            serializer.serialize_str(&self.to_b58())
        } else {
            serializer.serialize_bytes(&self.0)
        }
    }
}

impl<'de> Deserialize<'de> for Digest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        if deserializer.is_human_readable() {
            let s = String::deserialize(deserializer)?;
            Digest::from_b58(&s).map_err(D::Error::custom)
        } else {
            let bytes = Vec::<u8>::deserialize(deserializer)?;
            if bytes.len() != DIGEST_BYTES {
                return Err(D::Error::custom(format!(
                    "digest must be {DIGEST_BYTES} bytes, got {}",
                    bytes.len()
                )));
            }
            let mut arr = [0u8; DIGEST_BYTES];
            arr.copy_from_slice(&bytes);
            Ok(Digest(arr))
        }
    }
}

/// True iff `s` parses as a Nockchain address: Base58, exactly 40 bytes.
pub fn is_nock_address(s: &str) -> bool {
    Digest::from_b58(s).is_ok()
}

// ── Nicks ────────────────────────────────────────────────────────────────────

/// An amount in nicks (atomic currency unit, 1 NOCK = 65,536 nicks).
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct Nicks(pub u64);

impl Nicks {
    pub const ZERO: Nicks = Nicks(0);

    pub fn checked_sub(self, rhs: Nicks) -> Option<Nicks> {
        self.0.checked_sub(rhs.0).map(Nicks)
    }

    pub fn saturating_sub(self, rhs: Nicks) -> Nicks {
        Nicks(self.0.saturating_sub(rhs.0))
    }
}

impl Add for Nicks {
    type Output = Nicks;
    fn add(self, rhs: Nicks) -> Nicks {
        Nicks(self.0 + rhs.0)
    }
}

impl AddAssign for Nicks {
    fn add_assign(&mut self, rhs: Nicks) {
        self.0 += rhs.0;
    }
}

impl Sub for Nicks {
    type Output = Nicks;
    fn sub(self, rhs: Nicks) -> Nicks {
        Nicks(self.0 - rhs.0)
    }
}

impl Sum for Nicks {
    fn sum<I: Iterator<Item = Nicks>>(iter: I) -> Nicks {
        Nicks(iter.map(|n| n.0).sum())
    }
}

impl fmt::Display for Nicks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} nicks", self.0)
    }
}

// ── BlockHeight ──────────────────────────────────────────────────────────────

/// Absolute block height ("page" in chain nomenclature).
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct BlockHeight(pub u64);

impl fmt::Display for BlockHeight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ── WalletTxId ───────────────────────────────────────────────────────────────

/// Local identifier for a wallet transaction record. Distinct from the
/// chain-side transaction digest (`output_txid`), which only exists after a
/// transaction body has been built.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WalletTxId(pub uuid::Uuid);

impl WalletTxId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl fmt::Display for WalletTxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for WalletTxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WalletTxId({})", &self.0.to_string()[..8])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_b58_round_trip() {
        let mut bytes = [0u8; DIGEST_BYTES];
        for (i, b) in bytes.iter_mut().enumerate() {
            *b = (i as u8).wrapping_mul(37).wrapping_add(11);
        }
        let d = Digest(bytes);
        let s = d.to_b58();
        assert_eq!(Digest::from_b58(&s).unwrap(), d);
    }

    #[test]
    fn digest_b58_rejects_wrong_length() {
        // 32-byte payload: valid base58, wrong width.
        let s = bs58::encode([7u8; 32]).into_string();
        assert!(Digest::from_b58(&s).is_err());
        assert!(Digest::from_b58("not-base58-!!").is_err());
    }

    #[test]
    fn address_validator_trims_whitespace() {
        let d = Digest([3u8; DIGEST_BYTES]);
        let padded = format!("  {}\n", d.to_b58());
        assert!(is_nock_address(&padded));
        assert!(!is_nock_address("zz"));
    }

    #[test]
    fn nicks_arithmetic() {
        let a = Nicks(100_000);
        let b = Nicks(10_000);
        assert_eq!(a + b, Nicks(110_000));
        assert_eq!(a - b, Nicks(90_000));
        assert_eq!(a.checked_sub(Nicks(200_000)), None);
        let total: Nicks = vec![Nicks(1), Nicks(2), Nicks(3)].into_iter().sum();
        assert_eq!(total, Nicks(6));
    }
}
