//! Stored notes, wallet transactions, and the per-account books.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::warn;

use nockwallet_core::note::Note;
use nockwallet_core::types::{Digest, Nicks, WalletTxId};
use nockwallet_core::WalletError;
use nockwallet_storage::{keys as storage_keys, WalletStorage};

// ── StoredNote ───────────────────────────────────────────────────────────────

/// Local availability state of a note. Notes are never physically deleted;
/// the state is authoritative.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum NoteState {
    Available,
    InFlight,
    Spent,
}

/// A chain note plus the wallet's local bookkeeping.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StoredNote {
    pub note_id: Digest,
    pub note: Note,
    pub state: NoteState,
    /// The pending wallet transaction holding this note in flight.
    pub pending_tx_id: Option<WalletTxId>,
    /// Unix milliseconds when sync first saw the note.
    pub discovered_at: i64,
    /// True when the diff classified this note as change of one of our own
    /// transactions.
    #[serde(default)]
    pub is_change: bool,
    /// The transaction whose change this note is.
    #[serde(default)]
    pub source_wallet_tx: Option<WalletTxId>,
}

// ── WalletTransaction ────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum WalletTxStatus {
    Created,
    BroadcastPending,
    BroadcastedUnconfirmed,
    Confirmed,
    Failed,
    Expired,
}

impl WalletTxStatus {
    /// Still waiting on the chain: eligible for confirmation and expiry.
    pub fn is_pending(&self) -> bool {
        matches!(
            self,
            WalletTxStatus::Created
                | WalletTxStatus::BroadcastPending
                | WalletTxStatus::BroadcastedUnconfirmed
        )
    }

    pub fn is_terminal(&self) -> bool {
        !self.is_pending()
    }
}

/// One outgoing transfer as the wallet tracks it, from creation through
/// broadcast to confirmation, failure or expiry.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WalletTransaction {
    pub id: WalletTxId,
    pub account_pkh: Digest,
    pub to: Digest,
    pub amount: Nicks,
    pub fee: Nicks,
    /// input_total − amount − fee; what the change-detection heuristic
    /// matches newly discovered UTXOs against.
    pub expected_change: Nicks,
    pub input_note_ids: Vec<Digest>,
    /// Engine-side transaction digest, set once the body exists.
    pub output_txid: Option<Digest>,
    pub status: WalletTxStatus,
    pub created_at: i64,
    pub last_transition_at: i64,
    pub error_message: Option<String>,
}

impl WalletTransaction {
    pub fn transition(&mut self, status: WalletTxStatus, now_ms: i64) {
        self.status = status;
        self.last_transition_at = now_ms;
    }
}

// ── AccountBook / UtxoStore ──────────────────────────────────────────────────

/// Everything the wallet persists for one account.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AccountBook {
    pub notes: Vec<StoredNote>,
    pub transactions: Vec<WalletTransaction>,
}

/// The persisted UTXO store. Books load lazily per account and stay cached
/// in memory; mutations happen in memory inside a single non-suspending
/// call and are flushed to storage afterwards, so no other engine task can
/// observe a half-applied transition.
pub struct UtxoStore {
    storage: Arc<WalletStorage>,
    books: HashMap<Digest, AccountBook>,
}

impl UtxoStore {
    pub fn new(storage: Arc<WalletStorage>) -> Self {
        Self { storage, books: HashMap::new() }
    }

    /// The in-memory book for `pkh`, loading it from storage on first use.
    /// A corrupted record degrades to an empty book (and a later full
    /// re-sync) rather than an error.
    pub fn book(&mut self, pkh: Digest) -> Result<&mut AccountBook, WalletError> {
        if !self.books.contains_key(&pkh) {
            let notes: Vec<StoredNote> = self
                .storage
                .get_lenient(&storage_keys::utxo_notes(&pkh))?
                .unwrap_or_default();
            let transactions: Vec<WalletTransaction> = self
                .storage
                .get_lenient(&storage_keys::utxo_transactions(&pkh))?
                .unwrap_or_default();
            if notes.is_empty() && transactions.is_empty() {
                warn!(%pkh, "utxo book empty on load; full sync will rebuild it");
            }
            self.books.insert(pkh, AccountBook { notes, transactions });
        }
        Ok(self.books.get_mut(&pkh).expect("book inserted above"))
    }

    /// Persist one account's book. Notes and transactions land in the same
    /// flush: a persisted pending transaction can never name an input that
    /// is not already in flight in the same snapshot.
    pub fn flush_book(&mut self, pkh: Digest) -> Result<(), WalletError> {
        let book = self.book(pkh)?.clone();
        self.storage.put(&storage_keys::utxo_notes(&pkh), &book.notes)?;
        self.storage
            .put(&storage_keys::utxo_transactions(&pkh), &book.transactions)?;
        self.storage.flush()
    }

    /// Spendable balance: available notes only, so in-flight value is
    /// already excluded.
    pub fn available_balance(&mut self, pkh: Digest) -> Result<Nicks, WalletError> {
        Ok(self
            .book(pkh)?
            .notes
            .iter()
            .filter(|n| n.state == NoteState::Available)
            .map(|n| n.note.assets)
            .sum())
    }

    pub fn transactions(&mut self, pkh: Digest) -> Result<Vec<WalletTransaction>, WalletError> {
        Ok(self.book(pkh)?.transactions.clone())
    }

    /// Record an externally built transaction (e.g. sign_raw_tx flows) so
    /// sync can track it.
    pub fn add_transaction(
        &mut self,
        pkh: Digest,
        tx: WalletTransaction,
    ) -> Result<(), WalletError> {
        self.book(pkh)?.transactions.push(tx);
        self.flush_book(pkh)
    }

    // ── Input locking (single non-suspending critical section) ───────────────

    /// Greedily select available notes in insertion order until they cover
    /// `need`, then atomically mark them in flight for `tx_id`. On
    /// insufficient funds nothing is locked.
    pub fn select_and_lock(
        &mut self,
        pkh: Digest,
        need: Nicks,
        tx_id: WalletTxId,
    ) -> Result<Vec<StoredNote>, WalletError> {
        let book = self.book(pkh)?;
        let mut selected: Vec<usize> = Vec::new();
        let mut sum = Nicks::ZERO;
        for (i, note) in book.notes.iter().enumerate() {
            if note.state != NoteState::Available {
                continue;
            }
            selected.push(i);
            sum += note.note.assets;
            if sum >= need {
                break;
            }
        }
        if sum < need {
            let have: Nicks = book
                .notes
                .iter()
                .filter(|n| n.state == NoteState::Available)
                .map(|n| n.note.assets)
                .sum();
            return Err(WalletError::InsufficientFunds { have, need });
        }
        // Still inside the same borrow: no suspension point between the
        // availability check above and the transition below.
        let mut locked = Vec::with_capacity(selected.len());
        for i in selected {
            let note = &mut book.notes[i];
            note.state = NoteState::InFlight;
            note.pending_tx_id = Some(tx_id);
            locked.push(note.clone());
        }
        Ok(locked)
    }

    /// Read-only greedy selection: the note ids a send for `need` would
    /// lock, in insertion order. Locks nothing.
    pub fn peek_selection(&mut self, pkh: Digest, need: Nicks) -> Result<Vec<Digest>, WalletError> {
        let book = self.book(pkh)?;
        let mut picked = Vec::new();
        let mut sum = Nicks::ZERO;
        for note in &book.notes {
            if note.state != NoteState::Available {
                continue;
            }
            picked.push(note.note_id);
            sum += note.note.assets;
            if sum >= need {
                return Ok(picked);
            }
        }
        let have: Nicks = book
            .notes
            .iter()
            .filter(|n| n.state == NoteState::Available)
            .map(|n| n.note.assets)
            .sum();
        Err(WalletError::InsufficientFunds { have, need })
    }

    /// Lock exactly the named notes for `tx_id`. If any is no longer
    /// available (a racing send won it), nothing is locked and the caller
    /// retries its selection.
    pub fn lock_exact(
        &mut self,
        pkh: Digest,
        note_ids: &[Digest],
        tx_id: WalletTxId,
    ) -> Result<Vec<StoredNote>, WalletError> {
        let book = self.book(pkh)?;
        let all_available = note_ids.iter().all(|id| {
            book.notes
                .iter()
                .any(|n| n.note_id == *id && n.state == NoteState::Available)
        });
        if !all_available {
            return Err(WalletError::SelectionRaced);
        }
        let mut locked = Vec::with_capacity(note_ids.len());
        for id in note_ids {
            let note = book
                .notes
                .iter_mut()
                .find(|n| n.note_id == *id)
                .expect("presence checked above");
            note.state = NoteState::InFlight;
            note.pending_tx_id = Some(tx_id);
            locked.push(note.clone());
        }
        Ok(locked)
    }

    /// Lock every available note for `tx_id` (send-max).
    pub fn lock_all_available(
        &mut self,
        pkh: Digest,
        tx_id: WalletTxId,
    ) -> Result<Vec<StoredNote>, WalletError> {
        let book = self.book(pkh)?;
        let mut locked = Vec::new();
        for note in book.notes.iter_mut() {
            if note.state == NoteState::Available {
                note.state = NoteState::InFlight;
                note.pending_tx_id = Some(tx_id);
                locked.push(note.clone());
            }
        }
        Ok(locked)
    }

    /// Return the inputs of `tx_id` to the available pool.
    pub fn release_locks(&mut self, pkh: Digest, tx_id: WalletTxId) -> Result<(), WalletError> {
        let book = self.book(pkh)?;
        for note in book.notes.iter_mut() {
            if note.state == NoteState::InFlight && note.pending_tx_id == Some(tx_id) {
                note.state = NoteState::Available;
                note.pending_tx_id = None;
            }
        }
        Ok(())
    }

    // ── Transaction transitions ──────────────────────────────────────────────

    /// Move a transaction to `Failed` and release its input locks. The two
    /// mutations always travel together.
    pub fn fail_transaction(
        &mut self,
        pkh: Digest,
        tx_id: WalletTxId,
        message: String,
        now_ms: i64,
    ) -> Result<(), WalletError> {
        let book = self.book(pkh)?;
        if let Some(tx) = book.transactions.iter_mut().find(|t| t.id == tx_id) {
            tx.transition(WalletTxStatus::Failed, now_ms);
            tx.error_message = Some(message);
        }
        self.release_locks(pkh, tx_id)?;
        self.flush_book(pkh)
    }

    pub fn with_transaction(
        &mut self,
        pkh: Digest,
        tx_id: WalletTxId,
        f: impl FnOnce(&mut WalletTransaction),
    ) -> Result<(), WalletError> {
        let book = self.book(pkh)?;
        let tx = book
            .transactions
            .iter_mut()
            .find(|t| t.id == tx_id)
            .ok_or_else(|| WalletError::NotFound(format!("wallet tx {tx_id}")))?;
        f(tx);
        Ok(())
    }
}
