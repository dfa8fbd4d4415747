//! The sync diff: a pure comparison of the local note view against a
//! fetched chain snapshot.
//!
//! Newly appeared UTXOs are classified as change when their value matches
//! the expected change of an outgoing transaction; duplicate expectations
//! resolve first-in-wins by transaction creation order, and each
//! expectation is consumed by at most one note.

use std::collections::HashMap;

use nockwallet_core::note::Note;
use nockwallet_core::types::{Digest, Nicks, WalletTxId};

use crate::store::{NoteState, StoredNote, WalletTransaction};

/// A note as fetched from the chain, keyed by its stable id.
#[derive(Clone, Debug)]
pub struct FetchedUtxo {
    pub note_id: Digest,
    pub note: Note,
}

impl From<Note> for FetchedUtxo {
    fn from(note: Note) -> Self {
        Self { note_id: note.id(), note }
    }
}

#[derive(Debug, Default)]
pub struct DiffResult {
    /// On chain but not yet in the local view.
    pub new_utxos: Vec<FetchedUtxo>,
    /// Known locally and still present on chain.
    pub still_unspent: Vec<Digest>,
    /// Known locally as unspent, but gone from the chain view.
    pub now_spent: Vec<Digest>,
    /// note_id → the outgoing transaction whose change it is.
    pub is_change_map: HashMap<Digest, WalletTxId>,
}

/// Compare the local notes against a fetched snapshot.
pub fn diff_utxos(
    local_notes: &[StoredNote],
    fetched: &[FetchedUtxo],
    outgoing_txs: &[WalletTransaction],
) -> DiffResult {
    let local_map: HashMap<Digest, &StoredNote> =
        local_notes.iter().map(|n| (n.note_id, n)).collect();

    // Expected change by amount, first-in-wins in creation order.
    let mut ordered: Vec<&WalletTransaction> = outgoing_txs.iter().collect();
    ordered.sort_by_key(|tx| tx.created_at);
    let mut expected_change_by_amount: HashMap<Nicks, WalletTxId> = HashMap::new();
    for tx in ordered {
        if tx.expected_change > Nicks::ZERO {
            expected_change_by_amount.entry(tx.expected_change).or_insert(tx.id);
        }
    }

    let mut result = DiffResult::default();

    for utxo in fetched {
        match local_map.get(&utxo.note_id) {
            None => {
                if let Some(tx_id) = expected_change_by_amount.remove(&utxo.note.assets) {
                    // Single-use: this expectation is now consumed.
                    result.is_change_map.insert(utxo.note_id, tx_id);
                }
                result.new_utxos.push(utxo.clone());
            }
            Some(local) if local.state != NoteState::Spent => {
                result.still_unspent.push(utxo.note_id);
            }
            Some(_) => {}
        }
    }

    let fetched_ids: HashMap<Digest, ()> = fetched.iter().map(|u| (u.note_id, ())).collect();
    for note in local_notes {
        if note.state != NoteState::Spent && !fetched_ids.contains_key(&note.note_id) {
            result.now_spent.push(note.note_id);
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::WalletTxStatus;
    use nockwallet_core::hash::hash_atom;
    use nockwallet_core::note::{Name, NoteVersion};

    fn chain_note(assets: u64, tag: &[u8]) -> FetchedUtxo {
        FetchedUtxo::from(Note {
            version: NoteVersion::V1,
            origin_page: 3,
            name: Name::new(hash_atom(tag), hash_atom(b"last")),
            note_data_hash: hash_atom(b"data"),
            assets: Nicks(assets),
        })
    }

    fn local_from(utxo: &FetchedUtxo, state: NoteState) -> StoredNote {
        StoredNote {
            note_id: utxo.note_id,
            note: utxo.note.clone(),
            state,
            pending_tx_id: None,
            discovered_at: 0,
            is_change: false,
            source_wallet_tx: None,
        }
    }

    fn outgoing(change: u64, created_at: i64) -> WalletTransaction {
        WalletTransaction {
            id: WalletTxId::generate(),
            account_pkh: hash_atom(b"acct"),
            to: hash_atom(b"dest"),
            amount: Nicks(1_000),
            fee: Nicks(100),
            expected_change: Nicks(change),
            input_note_ids: vec![],
            output_txid: None,
            status: WalletTxStatus::BroadcastedUnconfirmed,
            created_at,
            last_transition_at: created_at,
            error_message: None,
        }
    }

    #[test]
    fn classifies_new_still_and_spent() {
        let on_chain_old = chain_note(10_000, b"old");
        let gone = chain_note(20_000, b"gone");
        let fresh = chain_note(30_000, b"fresh");
        let local = vec![
            local_from(&on_chain_old, NoteState::Available),
            local_from(&gone, NoteState::InFlight),
        ];
        let fetched = vec![on_chain_old.clone(), fresh.clone()];

        let diff = diff_utxos(&local, &fetched, &[]);
        assert_eq!(diff.new_utxos.len(), 1);
        assert_eq!(diff.new_utxos[0].note_id, fresh.note_id);
        assert_eq!(diff.still_unspent, vec![on_chain_old.note_id]);
        assert_eq!(diff.now_spent, vec![gone.note_id]);
        assert!(diff.is_change_map.is_empty());
    }

    #[test]
    fn spent_notes_never_resurface() {
        let old = chain_note(10_000, b"old");
        let local = vec![local_from(&old, NoteState::Spent)];
        // Chain still reports it (e.g. a lagging node): neither new nor
        // still-unspent nor now-spent.
        let diff = diff_utxos(&local, &[old.clone()], &[]);
        assert!(diff.new_utxos.is_empty());
        assert!(diff.still_unspent.is_empty());
        assert!(diff.now_spent.is_empty());
    }

    #[test]
    fn change_matches_by_amount() {
        let tx = outgoing(89_000, 5);
        let change = chain_note(89_000, b"change");
        let unrelated = chain_note(12_345, b"gift");
        let diff = diff_utxos(&[], &[change.clone(), unrelated.clone()], &[tx.clone()]);

        assert_eq!(diff.new_utxos.len(), 2);
        assert_eq!(diff.is_change_map.get(&change.note_id), Some(&tx.id));
        assert!(!diff.is_change_map.contains_key(&unrelated.note_id));
    }

    #[test]
    fn duplicate_change_amounts_resolve_first_in_wins_single_use() {
        let first = outgoing(5_000, 10);
        let second = outgoing(5_000, 20);
        let note_a = chain_note(5_000, b"a");
        let note_b = chain_note(5_000, b"b");

        // Pass in reverse order: creation order must still win.
        let diff = diff_utxos(
            &[],
            &[note_a.clone(), note_b.clone()],
            &[second.clone(), first.clone()],
        );

        // Only the first tx's expectation exists, and it is consumed once.
        let matched: Vec<_> = diff.is_change_map.values().collect();
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0], &first.id);
    }

    #[test]
    fn zero_change_txs_never_match() {
        let tx = outgoing(0, 1);
        let note = chain_note(0, b"zero");
        let diff = diff_utxos(&[], &[note], &[tx]);
        assert!(diff.is_change_map.is_empty());
    }

    #[test]
    fn diff_is_idempotent_once_applied() {
        // After the first diff's results are applied, running the same
        // snapshot again reports nothing new.
        let fresh = chain_note(30_000, b"fresh");
        let gone = chain_note(20_000, b"gone");
        let local_before = vec![local_from(&gone, NoteState::Available)];
        let first = diff_utxos(&local_before, &[fresh.clone()], &[]);
        assert_eq!(first.new_utxos.len(), 1);
        assert_eq!(first.now_spent.len(), 1);

        let local_after = vec![
            local_from(&gone, NoteState::Spent),
            local_from(&fresh, NoteState::Available),
        ];
        let second = diff_utxos(&local_after, &[fresh.clone()], &[]);
        assert!(second.new_utxos.is_empty());
        assert_eq!(second.still_unspent, vec![fresh.note_id]);
        assert!(second.now_spent.is_empty());
    }
}
