//! Sync reconciliation: fetch the chain's view of an account, diff it
//! against the local book, and advance note states and transaction
//! lifecycles.

use std::collections::HashSet;

use tracing::{debug, info};

use nockwallet_core::constants::TX_EXPIRY_MS;
use nockwallet_core::types::{Digest, WalletTxId};
use nockwallet_core::WalletError;
use nockwallet_rpc::NodeRpc;

use crate::diff::{diff_utxos, FetchedUtxo};
use crate::store::{NoteState, StoredNote, UtxoStore, WalletTxStatus};

#[derive(Debug, Default)]
pub struct SyncOutcome {
    pub discovered: usize,
    pub spent: usize,
    pub confirmed: Vec<WalletTxId>,
    pub expired: Vec<WalletTxId>,
}

/// One sync round for `pkh`: the RPC fetch is the only suspension point;
/// the diff and its application run as a single non-suspending call over
/// the in-memory book, flushed afterwards.
pub async fn sync_account<R: NodeRpc>(
    store: &mut UtxoStore,
    rpc: &R,
    pkh: Digest,
    now_ms: i64,
) -> Result<SyncOutcome, WalletError> {
    let notes = rpc.query_utxos_by_pkh(pkh).await?;
    let fetched: Vec<FetchedUtxo> = notes.into_iter().map(FetchedUtxo::from).collect();
    let outcome = apply_snapshot(store, pkh, &fetched, now_ms)?;
    store.flush_book(pkh)?;
    Ok(outcome)
}

/// Apply a fetched snapshot to the book. Pure with respect to I/O: callers
/// flush. Applying the same snapshot twice is a no-op.
pub fn apply_snapshot(
    store: &mut UtxoStore,
    pkh: Digest,
    fetched: &[FetchedUtxo],
    now_ms: i64,
) -> Result<SyncOutcome, WalletError> {
    let book = store.book(pkh)?;

    let pending: Vec<_> = book
        .transactions
        .iter()
        .filter(|tx| tx.status.is_pending())
        .cloned()
        .collect();
    let diff = diff_utxos(&book.notes, fetched, &pending);

    let mut outcome = SyncOutcome::default();

    // Insert discovered notes, tagging change outputs back to their
    // originating transaction.
    for utxo in &diff.new_utxos {
        if book.notes.iter().any(|n| n.note_id == utxo.note_id) {
            continue;
        }
        let source = diff.is_change_map.get(&utxo.note_id).copied();
        book.notes.push(StoredNote {
            note_id: utxo.note_id,
            note: utxo.note.clone(),
            state: NoteState::Available,
            pending_tx_id: None,
            discovered_at: now_ms,
            is_change: source.is_some(),
            source_wallet_tx: source,
        });
        outcome.discovered += 1;
    }

    // Mark notes the chain no longer reports.
    let now_spent: HashSet<Digest> = diff.now_spent.iter().copied().collect();
    for note in book.notes.iter_mut() {
        if now_spent.contains(&note.note_id) && note.state != NoteState::Spent {
            note.state = NoteState::Spent;
            outcome.spent += 1;
        }
    }

    // A pending transaction confirms when every one of its inputs left the
    // chain view this round.
    for tx in book.transactions.iter_mut() {
        let awaiting = matches!(
            tx.status,
            WalletTxStatus::BroadcastPending | WalletTxStatus::BroadcastedUnconfirmed
        );
        if awaiting
            && !tx.input_note_ids.is_empty()
            && tx.input_note_ids.iter().all(|id| now_spent.contains(id))
        {
            tx.transition(WalletTxStatus::Confirmed, now_ms);
            info!(tx = %tx.id, "wallet transaction confirmed");
            outcome.confirmed.push(tx.id);
        }
    }

    // Expire transactions that outstayed the pending window, releasing
    // their input locks in the same pass.
    let mut to_release: Vec<WalletTxId> = Vec::new();
    for tx in book.transactions.iter_mut() {
        if tx.status.is_pending() && now_ms - tx.created_at > TX_EXPIRY_MS {
            tx.transition(WalletTxStatus::Expired, now_ms);
            tx.error_message = Some("expired before confirmation".into());
            to_release.push(tx.id);
            outcome.expired.push(tx.id);
        }
    }
    for tx_id in to_release {
        store.release_locks(pkh, tx_id)?;
    }

    debug!(
        %pkh,
        discovered = outcome.discovered,
        spent = outcome.spent,
        confirmed = outcome.confirmed.len(),
        expired = outcome.expired.len(),
        "sync applied"
    );
    Ok(outcome)
}
