//! Notes: the chain's spendable unit.

use serde::{Deserialize, Serialize};

use crate::hash::{tree_hash, NounHash};
use crate::noun::{Noun, NounEncode};
use crate::types::{Digest, Nicks};

/// On-chain note schema version.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum NoteVersion {
    V0,
    V1,
    V2,
}

impl NounEncode for NoteVersion {
    fn to_noun(&self) -> Noun {
        Noun::atom_u64(match self {
            NoteVersion::V0 => 0,
            NoteVersion::V1 => 1,
            NoteVersion::V2 => 2,
        })
    }
}

/// A note's name: the first-name commits to the lock root of the spend
/// condition controlling the note; the last-name is a source commitment
/// produced by the build step and treated as opaque here.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Name {
    pub first: Digest,
    pub last: Digest,
}

impl Name {
    pub fn new(first: Digest, last: Digest) -> Self {
        Self { first, last }
    }
}

impl NounEncode for Name {
    fn to_noun(&self) -> Noun {
        (self.first, self.last).to_noun()
    }
}

impl NounHash for Name {
    fn noun_hash(&self) -> Digest {
        tree_hash(self)
    }
}

/// A spendable note as the chain reports it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    pub version: NoteVersion,
    /// Block height the note was minted at.
    pub origin_page: u32,
    pub name: Name,
    pub note_data_hash: Digest,
    /// Value in nicks.
    pub assets: Nicks,
}

impl Note {
    /// Stable local identifier: the tree hash of the note's name. The name
    /// is unique per note on-chain, so this survives re-syncs.
    pub fn id(&self) -> Digest {
        self.name.noun_hash()
    }
}

impl NounEncode for Note {
    fn to_noun(&self) -> Noun {
        (
            self.version,
            self.origin_page,
            &self.name,
            self.note_data_hash,
            self.assets,
        )
            .to_noun()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::hash_atom;
    use crate::lock::SpendCondition;

    fn sample_note(assets: u64) -> Note {
        let sc = SpendCondition::single_pkh(hash_atom(b"owner"));
        Note {
            version: NoteVersion::V1,
            origin_page: 7,
            name: Name::new(sc.first_name(), hash_atom(b"source")),
            note_data_hash: hash_atom(b"data"),
            assets: Nicks(assets),
        }
    }

    #[test]
    fn note_id_is_stable_and_name_keyed() {
        let a = sample_note(100);
        let b = sample_note(250);
        // Same name, different assets: same id.
        assert_eq!(a.id(), b.id());
        let mut c = sample_note(100);
        c.name.last = hash_atom(b"other-source");
        assert_ne!(a.id(), c.id());
    }

    #[test]
    fn versions_encode_distinctly() {
        assert_ne!(NoteVersion::V0.to_noun(), NoteVersion::V1.to_noun());
        assert_ne!(NoteVersion::V1.to_noun(), NoteVersion::V2.to_noun());
    }
}
