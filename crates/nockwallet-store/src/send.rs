//! The send pipeline.
//!
//! Select inputs, lock them atomically, build and sign, persist the
//! pending wallet transaction, then broadcast. The pending record and the
//! input locks always land in the same persisted snapshot, and a failed
//! broadcast never strands a `BroadcastPending` record: it either advances
//! to `BroadcastedUnconfirmed` or fails and releases its locks.

use tracing::{info, warn};

use nockwallet_core::constants::SEND_LOCK_RETRIES;
use nockwallet_core::types::{Digest, Nicks, WalletTxId};
use nockwallet_core::WalletError;
use nockwallet_crypto::keys::ExtendedKey;
use nockwallet_engine::{discover_spend_condition, fee_for_words, TxBuilder};
use nockwallet_rpc::NodeRpc;

use crate::store::{StoredNote, UtxoStore, WalletTransaction, WalletTxStatus};

#[derive(Clone, Debug)]
pub struct SendRequest {
    pub to: Digest,
    pub amount: Nicks,
    pub fee: Option<Nicks>,
    pub send_max: bool,
}

#[derive(Clone, Debug)]
pub struct SendOutcome {
    /// Engine-side transaction digest.
    pub tx_id: Digest,
    /// False when the node rejected the broadcast; the wallet transaction
    /// is then `Failed` and its inputs are released.
    pub broadcasted: bool,
    pub wallet_tx: WalletTransaction,
}

/// Send from the account owned by `key`. Single transaction, any number of
/// inputs.
pub async fn send_transaction<R: NodeRpc>(
    store: &mut UtxoStore,
    rpc: &R,
    key: &ExtendedKey,
    request: SendRequest,
    now_ms: i64,
) -> Result<SendOutcome, WalletError> {
    let pkh = key.pkh();

    if request.send_max {
        let (amount, fee) = estimate_max_send(store, pkh, request.to)?;
        let wallet_tx_id = WalletTxId::generate();
        let locked = store.lock_all_available(pkh, wallet_tx_id)?;
        if locked.is_empty() {
            return Err(WalletError::InsufficientFunds { have: Nicks::ZERO, need: fee });
        }
        // Sweeps refund to the recipient, so no change output can exist.
        return dispatch(
            store, rpc, key, wallet_tx_id, &locked, request.to, amount, fee, request.to, now_ms,
        )
        .await;
    }

    if request.amount == Nicks::ZERO {
        return Err(WalletError::InvalidAmount);
    }
    let fee = match request.fee {
        Some(fee) => fee,
        None => estimate_fee(store, pkh, request.to, request.amount)?,
    };
    let need = request.amount + fee;

    // Selection and lock are one critical section; the bounded retry covers
    // a selection raced away by a concurrent send between the two phases.
    for attempt in 0..=SEND_LOCK_RETRIES {
        let wallet_tx_id = WalletTxId::generate();
        let picked = store.peek_selection(pkh, need)?;
        let locked = match store.lock_exact(pkh, &picked, wallet_tx_id) {
            Ok(notes) => notes,
            Err(WalletError::SelectionRaced) if attempt < SEND_LOCK_RETRIES => {
                warn!(attempt, "input selection raced; retrying");
                continue;
            }
            Err(e) => return Err(e),
        };
        return dispatch(
            store, rpc, key, wallet_tx_id, &locked, request.to, request.amount, fee, pkh, now_ms,
        )
        .await;
    }
    Err(WalletError::SelectionRaced)
}

/// Build, sign, persist and broadcast with inputs already locked for
/// `wallet_tx_id`. Releases the locks on every failure path before the
/// wallet-transaction record exists; afterwards, failure goes through
/// `fail_transaction` so the record and the locks move together.
#[allow(clippy::too_many_arguments)]
async fn dispatch<R: NodeRpc>(
    store: &mut UtxoStore,
    rpc: &R,
    key: &ExtendedKey,
    wallet_tx_id: WalletTxId,
    locked: &[StoredNote],
    to: Digest,
    amount: Nicks,
    fee: Nicks,
    refund_pkh: Digest,
    now_ms: i64,
) -> Result<SendOutcome, WalletError> {
    let pkh = key.pkh();

    let release_and = |store: &mut UtxoStore, err: WalletError| -> WalletError {
        if let Err(release_err) = store
            .release_locks(pkh, wallet_tx_id)
            .and_then(|_| store.flush_book(pkh))
        {
            warn!(%release_err, "failed to release input locks after abort");
        }
        err
    };

    let mut pairs = Vec::with_capacity(locked.len());
    for stored in locked {
        match discover_spend_condition(&stored.note, pkh) {
            Ok(sc) => pairs.push((stored.note.clone(), sc)),
            Err(e) => return Err(release_and(store, e)),
        }
    }

    let unsigned = match TxBuilder::new(to, amount, refund_pkh)
        .inputs(pairs)
        .fee_override(fee)
        .build()
    {
        Ok(tx) => tx,
        Err(e) => return Err(release_and(store, e)),
    };

    let Some(private) = key.private_key.as_ref() else {
        return Err(release_and(store, WalletError::Locked));
    };
    let raw = match unsigned.sign(private) {
        Ok(raw) => raw,
        Err(e) => return Err(release_and(store, e)),
    };

    let input_total: Nicks = locked.iter().map(|n| n.note.assets).sum();
    let wallet_tx = WalletTransaction {
        id: wallet_tx_id,
        account_pkh: pkh,
        to,
        amount,
        fee,
        expected_change: input_total - amount - fee,
        input_note_ids: locked.iter().map(|n| n.note_id).collect(),
        output_txid: None,
        status: WalletTxStatus::BroadcastPending,
        created_at: now_ms,
        last_transition_at: now_ms,
        error_message: None,
    };

    // Persisted before broadcast: the pending record and its in-flight
    // inputs share one snapshot.
    store.book(pkh)?.transactions.push(wallet_tx.clone());
    store.flush_book(pkh)?;

    match rpc.broadcast(&raw.to_jam()).await {
        Ok(_) => {
            store.with_transaction(pkh, wallet_tx_id, |tx| {
                tx.transition(WalletTxStatus::BroadcastedUnconfirmed, now_ms);
                tx.output_txid = Some(raw.id);
            })?;
            store.flush_book(pkh)?;
            info!(tx = %wallet_tx_id, id = %raw.id, "transaction broadcast");
            let wallet_tx = current_record(store, pkh, wallet_tx_id)?;
            Ok(SendOutcome { tx_id: raw.id, broadcasted: true, wallet_tx })
        }
        Err(e) => {
            warn!(tx = %wallet_tx_id, error = %e, "broadcast failed; releasing inputs");
            store.fail_transaction(pkh, wallet_tx_id, e.to_string(), now_ms)?;
            let wallet_tx = current_record(store, pkh, wallet_tx_id)?;
            Ok(SendOutcome { tx_id: raw.id, broadcasted: false, wallet_tx })
        }
    }
}

fn current_record(
    store: &mut UtxoStore,
    pkh: Digest,
    tx_id: WalletTxId,
) -> Result<WalletTransaction, WalletError> {
    store
        .book(pkh)?
        .transactions
        .iter()
        .find(|t| t.id == tx_id)
        .cloned()
        .ok_or_else(|| WalletError::NotFound(format!("wallet tx {tx_id}")))
}

// ── Estimation (side-effect free) ────────────────────────────────────────────

/// Fee a send of `amount` to `to` would pay right now. Performs selection
/// and size calculation only: no locks, no signatures, no broadcast.
pub fn estimate_fee(
    store: &mut UtxoStore,
    pkh: Digest,
    to: Digest,
    amount: Nicks,
) -> Result<Nicks, WalletError> {
    if amount == Nicks::ZERO {
        return Err(WalletError::InvalidAmount);
    }
    let mut fee = Nicks::ZERO;
    let mut previous: Option<Vec<Digest>> = None;
    // Selection grows monotonically with the fee, so this reaches a fixed
    // point after at most one pass per extra input.
    loop {
        let picked = store.peek_selection(pkh, amount + fee)?;
        if previous.as_ref() == Some(&picked) {
            return Ok(fee);
        }
        let pairs = conditions_for(store, pkh, &picked)?;
        fee = TxBuilder::new(to, amount, pkh).inputs(pairs).projected_fee()?;
        previous = Some(picked);
    }
}

/// The largest sendable amount and its fee, assuming every available note
/// is swept to `to`. Iterates the fee to a fixed point; the body size is
/// stable because a sweep refunds to the recipient and so never carries a
/// change seed.
pub fn estimate_max_send(
    store: &mut UtxoStore,
    pkh: Digest,
    to: Digest,
) -> Result<(Nicks, Nicks), WalletError> {
    let book = store.book(pkh)?;
    let available: Vec<Digest> = book
        .notes
        .iter()
        .filter(|n| n.state == crate::store::NoteState::Available)
        .map(|n| n.note_id)
        .collect();
    let total: Nicks = book
        .notes
        .iter()
        .filter(|n| n.state == crate::store::NoteState::Available)
        .map(|n| n.note.assets)
        .sum();
    if available.is_empty() {
        return Err(WalletError::InsufficientFunds {
            have: Nicks::ZERO,
            need: fee_for_words(0),
        });
    }
    let pairs = conditions_for(store, pkh, &available)?;

    let mut fee = fee_for_words(0);
    for _ in 0..8 {
        let amount = total
            .checked_sub(fee)
            .filter(|a| *a > Nicks::ZERO)
            .ok_or(WalletError::InsufficientFunds { have: total, need: fee })?;
        let unsigned = TxBuilder::new(to, amount, to)
            .inputs(pairs.clone())
            .fee_override(fee)
            .build()?;
        let projected = fee_for_words(unsigned.body_words);
        if projected == fee {
            return Ok((amount, fee));
        }
        fee = projected;
    }
    Err(WalletError::InvalidParams("max-send fee failed to converge".into()))
}

fn conditions_for(
    store: &mut UtxoStore,
    pkh: Digest,
    note_ids: &[Digest],
) -> Result<Vec<(nockwallet_core::note::Note, nockwallet_core::lock::SpendCondition)>, WalletError>
{
    let book = store.book(pkh)?;
    let mut pairs = Vec::with_capacity(note_ids.len());
    for id in note_ids {
        let stored = book
            .notes
            .iter()
            .find(|n| n.note_id == *id)
            .ok_or_else(|| WalletError::NotFound(format!("note {id}")))?;
        let sc = discover_spend_condition(&stored.note, pkh)?;
        pairs.push((stored.note.clone(), sc));
    }
    Ok(pairs)
}
