//! Scriptable in-memory node, used by the engine test suites.
//!
//! Notes are indexed by first-name exactly as the chain indexes them; tests
//! seed and retire notes between sync rounds to simulate chain activity.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use nockwallet_core::hash::hash_atom;
use nockwallet_core::lock::SpendCondition;
use nockwallet_core::note::Note;
use nockwallet_core::types::Digest;
use nockwallet_core::WalletError;

use crate::NodeRpc;

#[derive(Default)]
pub struct MockNode {
    notes: Mutex<HashMap<Digest, Vec<Note>>>,
    broadcasts: Mutex<Vec<Vec<u8>>>,
    fail_broadcast: AtomicBool,
    fail_health: AtomicBool,
}

impl MockNode {
    pub fn new() -> Self {
        Self::default()
    }

    /// Put a note on the simulated chain, indexed by its first-name.
    pub fn seed_note(&self, note: Note) {
        self.notes
            .lock()
            .unwrap()
            .entry(note.name.first)
            .or_default()
            .push(note);
    }

    /// Remove a note (a spend observed on-chain).
    pub fn retire_note(&self, note_id: Digest) {
        let mut notes = self.notes.lock().unwrap();
        for bucket in notes.values_mut() {
            bucket.retain(|n| n.id() != note_id);
        }
    }

    /// Raw jams submitted via `broadcast`, oldest first.
    pub fn broadcast_log(&self) -> Vec<Vec<u8>> {
        self.broadcasts.lock().unwrap().clone()
    }

    pub fn set_fail_broadcast(&self, fail: bool) {
        self.fail_broadcast.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_health(&self, fail: bool) {
        self.fail_health.store(fail, Ordering::SeqCst);
    }
}

impl NodeRpc for MockNode {
    async fn query_utxos_by_first_name(
        &self,
        first_name: Digest,
    ) -> Result<Vec<Note>, WalletError> {
        Ok(self
            .notes
            .lock()
            .unwrap()
            .get(&first_name)
            .cloned()
            .unwrap_or_default())
    }

    async fn query_utxos_by_pkh(&self, pkh: Digest) -> Result<Vec<Note>, WalletError> {
        let simple = SpendCondition::single_pkh(pkh).first_name();
        let coinbase = SpendCondition::coinbase(pkh).first_name();
        let notes = self.notes.lock().unwrap();
        let mut out = notes.get(&simple).cloned().unwrap_or_default();
        out.extend(notes.get(&coinbase).cloned().unwrap_or_default());
        Ok(out)
    }

    async fn broadcast(&self, raw_tx_jam: &[u8]) -> Result<Digest, WalletError> {
        if self.fail_broadcast.load(Ordering::SeqCst) {
            return Err(WalletError::Rpc("node unavailable".into()));
        }
        self.broadcasts.lock().unwrap().push(raw_tx_jam.to_vec());
        Ok(hash_atom(raw_tx_jam))
    }

    async fn health_check(&self) -> Result<(), WalletError> {
        if self.fail_health.load(Ordering::SeqCst) {
            return Err(WalletError::Rpc("health check failed".into()));
        }
        Ok(())
    }
}
