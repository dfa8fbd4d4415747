//! TIP5 noun hashing.
//!
//! Atoms hash as TIP5 over their little-endian 64-bit limb decomposition;
//! cells hash as the TIP5 two-to-one compression of the child digests. The
//! tree hash of a noun is therefore deterministic and independent of host
//! endianness.

use twenty_first::math::b_field_element::BFieldElement;
use twenty_first::tip5::Digest as TipDigest;
use twenty_first::tip5::Tip5;

use crate::error::WalletError;
use crate::noun::{cue, Noun, NounEncode};
use crate::types::Digest;

fn to_tip5(d: Digest) -> TipDigest {
    let mut belts = [BFieldElement::new(0); 5];
    for (i, chunk) in d.0.chunks_exact(8).enumerate() {
        belts[i] = BFieldElement::new(u64::from_le_bytes(chunk.try_into().unwrap()));
    }
    TipDigest::new(belts)
}

fn from_tip5(d: TipDigest) -> Digest {
    let mut bytes = [0u8; 40];
    for (i, belt) in d.values().iter().enumerate() {
        bytes[i * 8..(i + 1) * 8].copy_from_slice(&belt.value().to_le_bytes());
    }
    Digest(bytes)
}

/// TIP5 hash of a canonical atom (little-endian bytes, no trailing zeros).
pub fn hash_atom(bytes: &[u8]) -> Digest {
    let belts: Vec<BFieldElement> = bytes
        .chunks(8)
        .map(|chunk| {
            let mut buf = [0u8; 8];
            buf[..chunk.len()].copy_from_slice(chunk);
            BFieldElement::new(u64::from_le_bytes(buf))
        })
        .collect();
    from_tip5(Tip5::hash_varlen(&belts))
}

/// TIP5 two-to-one compression of two digests.
pub fn hash_pair(left: Digest, right: Digest) -> Digest {
    from_tip5(Tip5::hash_pair(to_tip5(left), to_tip5(right)))
}

/// Tree-hash a structural value through its canonical noun encoding.
/// Types implement this by delegating to their `NounEncode` form.
pub trait NounHash {
    fn noun_hash(&self) -> Digest;
}

impl NounHash for Noun {
    fn noun_hash(&self) -> Digest {
        match self {
            Noun::Atom(bytes) => hash_atom(bytes),
            Noun::Cell(l, r) => hash_pair(l.noun_hash(), r.noun_hash()),
        }
    }
}

/// Tree hash of any encodable value.
pub fn tree_hash<T: NounEncode>(value: &T) -> Digest {
    value.to_noun().noun_hash()
}

/// Hash an already-serialised noun: parse the jam, then tree-hash.
///
/// Transaction ids are `hash_noun(jam(body))`; by construction this equals
/// the tree hash of the body noun itself.
pub fn hash_noun(jam_bytes: &[u8]) -> Result<Digest, WalletError> {
    Ok(cue(jam_bytes)?.noun_hash())
}

/// The first-name commitment for a lock root: the tree hash of
/// `[%.y lock_root]`. The boolean prefix is part of the v1 algorithm and
/// must never be dropped.
pub fn first_name(lock_root: Digest) -> Digest {
    tree_hash(&(true, lock_root))
}
