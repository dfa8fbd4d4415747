//! Spend-condition discovery.
//!
//! A note's first-name commits to the lock root but not to the condition
//! structure that realises it, so the wallet must reconstruct the condition
//! for notes it owns. The candidate list below is closed: a note minted
//! under any other lock shape fails with `SpendConditionMismatch` rather
//! than falling back silently.

use nockwallet_core::constants::COINBASE_MATURITY_BLOCKS;
use nockwallet_core::lock::{LockPrimitive, Pkh, SpendCondition, Timelock, TimelockRange};
use nockwallet_core::note::Note;
use nockwallet_core::types::{BlockHeight, Digest};
use nockwallet_core::WalletError;

/// First-name of the standard single-signature condition for `pkh`. The
/// sync loop queries chain balances under this name.
pub fn simple_first_name(pkh: Digest) -> Digest {
    SpendCondition::single_pkh(pkh).first_name()
}

/// First-name of the canonical coinbase condition for `pkh`.
pub fn coinbase_first_name(pkh: Digest) -> Digest {
    SpendCondition::coinbase(pkh).first_name()
}

/// The supported lock shapes for a note owned by `pkh`, in match order.
fn candidates(pkh: Digest, origin_page: u32) -> [SpendCondition; 4] {
    [
        // 1. Standard simple note.
        SpendCondition::single_pkh(pkh),
        // 2. Coinbase via the canonical helper.
        SpendCondition::coinbase(pkh),
        // 3. Coinbase maturity written as an explicit relative range. Under
        //    this encoding it coincides with the canonical helper, but the
        //    candidate stays in the list: the set of supported shapes is
        //    contractual, not an artifact of the current encoding.
        SpendCondition::new(vec![
            LockPrimitive::Pkh(Pkh::single(pkh)),
            LockPrimitive::Tim(Timelock::new(
                TimelockRange::unbounded(),
                TimelockRange::new(Some(BlockHeight(COINBASE_MATURITY_BLOCKS)), None),
            )),
        ]),
        // 4. Maturity pinned to an absolute height instead.
        SpendCondition::new(vec![
            LockPrimitive::Pkh(Pkh::single(pkh)),
            LockPrimitive::Tim(Timelock::new(
                TimelockRange::new(
                    Some(BlockHeight(origin_page as u64 + COINBASE_MATURITY_BLOCKS)),
                    None,
                ),
                TimelockRange::unbounded(),
            )),
        ]),
    ]
}

/// Recover the spend condition controlling `note`, given the owner's `pkh`.
/// Tries each candidate in order and keeps the first whose first-name
/// matches the note's commitment.
pub fn discover_spend_condition(note: &Note, pkh: Digest) -> Result<SpendCondition, WalletError> {
    candidates(pkh, note.origin_page)
        .into_iter()
        .find(|candidate| candidate.first_name() == note.name.first)
        .ok_or_else(|| WalletError::SpendConditionMismatch(note.id()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use nockwallet_core::hash::hash_atom;
    use nockwallet_core::note::{Name, NoteVersion};
    use nockwallet_core::types::Nicks;

    fn owner() -> Digest {
        hash_atom(b"owner-pkh")
    }

    fn note_under(sc: &SpendCondition, origin_page: u32) -> Note {
        Note {
            version: NoteVersion::V1,
            origin_page,
            name: Name::new(sc.first_name(), hash_atom(b"last")),
            note_data_hash: hash_atom(b"data"),
            assets: Nicks(1_000),
        }
    }

    #[test]
    fn discovers_simple_note() {
        let note = note_under(&SpendCondition::single_pkh(owner()), 10);
        let sc = discover_spend_condition(&note, owner()).unwrap();
        assert_eq!(sc, SpendCondition::single_pkh(owner()));
    }

    #[test]
    fn discovers_coinbase_note() {
        let note = note_under(&SpendCondition::coinbase(owner()), 10);
        let sc = discover_spend_condition(&note, owner()).unwrap();
        assert_eq!(sc.first_name(), note.name.first);
        assert!(sc.tims().next().is_some());
    }

    #[test]
    fn discovers_absolute_height_variant() {
        let origin = 250u32;
        let abs = SpendCondition::new(vec![
            LockPrimitive::Pkh(Pkh::single(owner())),
            LockPrimitive::Tim(Timelock::new(
                TimelockRange::new(Some(BlockHeight(350)), None),
                TimelockRange::unbounded(),
            )),
        ]);
        let note = note_under(&abs, origin);
        let sc = discover_spend_condition(&note, owner()).unwrap();
        assert_eq!(sc, abs);
    }

    #[test]
    fn unknown_shape_is_a_hard_error() {
        // A 2-of-2 lock is outside the supported set.
        let exotic = SpendCondition::new(vec![LockPrimitive::Pkh(Pkh::new(
            2,
            vec![owner(), hash_atom(b"other")],
        ))]);
        let note = note_under(&exotic, 5);
        match discover_spend_condition(&note, owner()) {
            Err(WalletError::SpendConditionMismatch(id)) => assert_eq!(id, note.id()),
            other => panic!("expected SpendConditionMismatch, got {other:?}"),
        }
    }

    #[test]
    fn wrong_owner_never_matches() {
        let note = note_under(&SpendCondition::single_pkh(owner()), 1);
        assert!(discover_spend_condition(&note, hash_atom(b"not-owner")).is_err());
    }
}
