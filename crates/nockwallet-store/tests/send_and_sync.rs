//! End-to-end send and sync flows against the in-memory node.
//!
//! Run with:
//!   cargo test -p nockwallet-store --test send_and_sync

use std::sync::Arc;

use nockwallet_core::constants::TX_EXPIRY_MS;
use nockwallet_core::hash::hash_atom;
use nockwallet_core::lock::SpendCondition;
use nockwallet_core::note::{Name, Note, NoteVersion};
use nockwallet_core::types::{Digest, Nicks};
use nockwallet_core::WalletError;
use nockwallet_crypto::keys::{derive_master_key_from_mnemonic, ExtendedKey};
use nockwallet_rpc::mock::MockNode;
use nockwallet_storage::WalletStorage;
use nockwallet_store::{
    estimate_fee, estimate_max_send, send_transaction, sync_account, NoteState, SendRequest,
    UtxoStore, WalletTxStatus,
};

const PHRASE: &str = "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon art";

struct Harness {
    store: UtxoStore,
    node: MockNode,
    key: ExtendedKey,
    pkh: Digest,
}

impl Harness {
    fn new() -> Self {
        let master = derive_master_key_from_mnemonic(PHRASE, None).unwrap();
        let key = master.derive_child(0).unwrap();
        let pkh = key.pkh();
        Harness {
            store: UtxoStore::new(Arc::new(WalletStorage::temporary().unwrap())),
            node: MockNode::new(),
            key,
            pkh,
        }
    }

    /// Mint a simple note for the wallet's account on the simulated chain.
    fn mint(&self, assets: u64, tag: &[u8]) -> Note {
        let sc = SpendCondition::single_pkh(self.pkh);
        let note = Note {
            version: NoteVersion::V1,
            origin_page: 12,
            name: Name::new(sc.first_name(), hash_atom(tag)),
            note_data_hash: hash_atom(b"data"),
            assets: Nicks(assets),
        };
        self.node.seed_note(note.clone());
        note
    }

    async fn sync(&mut self, now_ms: i64) -> nockwallet_store::SyncOutcome {
        sync_account(&mut self.store, &self.node, self.pkh, now_ms)
            .await
            .unwrap()
    }
}

fn recipient() -> Digest {
    hash_atom(b"somebody-else")
}

#[tokio::test]
async fn single_note_send_through_confirmation() {
    let mut h = Harness::new();
    let minted = h.mint(100_000, b"note-1");

    let outcome = h.sync(1_000).await;
    assert_eq!(outcome.discovered, 1);
    assert_eq!(h.store.available_balance(h.pkh).unwrap(), Nicks(100_000));

    let request = SendRequest {
        to: recipient(),
        amount: Nicks(10_000),
        fee: Some(Nicks(1_000)),
        send_max: false,
    };
    let sent = send_transaction(&mut h.store, &h.node, &h.key, request, 2_000)
        .await
        .unwrap();
    assert!(sent.broadcasted);
    assert_eq!(sent.wallet_tx.status, WalletTxStatus::BroadcastedUnconfirmed);
    assert_eq!(sent.wallet_tx.expected_change, Nicks(89_000));
    assert_eq!(sent.wallet_tx.output_txid, Some(sent.tx_id));
    assert_eq!(h.node.broadcast_log().len(), 1);

    // The input is held in flight; nothing is spendable.
    {
        let book = h.store.book(h.pkh).unwrap();
        assert_eq!(book.notes[0].state, NoteState::InFlight);
        assert_eq!(book.notes[0].pending_tx_id, Some(sent.wallet_tx.id));
    }
    assert_eq!(h.store.available_balance(h.pkh).unwrap(), Nicks::ZERO);

    // Chain processes the transaction: the input disappears, the change
    // output appears.
    h.node.retire_note(minted.id());
    h.mint(89_000, b"change-1");

    let outcome = h.sync(3_000).await;
    assert_eq!(outcome.confirmed, vec![sent.wallet_tx.id]);
    assert_eq!(outcome.spent, 1);
    assert_eq!(outcome.discovered, 1);

    let book = h.store.book(h.pkh).unwrap();
    let spent = book.notes.iter().find(|n| n.note_id == minted.id()).unwrap();
    assert_eq!(spent.state, NoteState::Spent);

    let change = book
        .notes
        .iter()
        .find(|n| n.note.assets == Nicks(89_000))
        .unwrap();
    assert_eq!(change.state, NoteState::Available);
    assert!(change.is_change);
    assert_eq!(change.source_wallet_tx, Some(sent.wallet_tx.id));

    let tx = book.transactions.iter().find(|t| t.id == sent.wallet_tx.id).unwrap();
    assert_eq!(tx.status, WalletTxStatus::Confirmed);
}

#[tokio::test]
async fn insufficient_funds_locks_nothing_and_persists_nothing() {
    let mut h = Harness::new();
    h.mint(30_000, b"a");
    h.mint(30_000, b"b");
    h.sync(1_000).await;

    let request = SendRequest {
        to: recipient(),
        amount: Nicks(70_000),
        fee: Some(Nicks(1_000)),
        send_max: false,
    };
    let err = send_transaction(&mut h.store, &h.node, &h.key, request, 2_000)
        .await
        .unwrap_err();
    match err {
        WalletError::InsufficientFunds { have, need } => {
            assert_eq!(have, Nicks(60_000));
            assert_eq!(need, Nicks(71_000));
        }
        other => panic!("expected InsufficientFunds, got {other:?}"),
    }

    let book = h.store.book(h.pkh).unwrap();
    assert!(book.notes.iter().all(|n| n.state == NoteState::Available));
    assert!(book.transactions.is_empty());
    assert!(h.node.broadcast_log().is_empty());
}

#[tokio::test]
async fn failed_broadcast_releases_locks() {
    let mut h = Harness::new();
    h.mint(50_000, b"a");
    h.sync(1_000).await;

    h.node.set_fail_broadcast(true);
    let request = SendRequest {
        to: recipient(),
        amount: Nicks(10_000),
        fee: Some(Nicks(1_000)),
        send_max: false,
    };
    let outcome = send_transaction(&mut h.store, &h.node, &h.key, request, 2_000)
        .await
        .unwrap();
    assert!(!outcome.broadcasted);
    assert_eq!(outcome.wallet_tx.status, WalletTxStatus::Failed);
    assert!(outcome.wallet_tx.error_message.is_some());

    // Inputs are spendable again; the failed record remains for history.
    assert_eq!(h.store.available_balance(h.pkh).unwrap(), Nicks(50_000));
    let book = h.store.book(h.pkh).unwrap();
    assert_eq!(book.transactions.len(), 1);
}

#[tokio::test]
async fn concurrent_sends_never_share_an_input() {
    let mut h = Harness::new();
    h.mint(20_000, b"a");
    h.mint(20_000, b"b");
    h.sync(1_000).await;

    let first = send_transaction(
        &mut h.store,
        &h.node,
        &h.key,
        SendRequest {
            to: recipient(),
            amount: Nicks(15_000),
            fee: Some(Nicks(1_000)),
            send_max: false,
        },
        2_000,
    )
    .await
    .unwrap();
    assert!(first.broadcasted);

    // The second send can only see the remaining 20k note.
    let err = send_transaction(
        &mut h.store,
        &h.node,
        &h.key,
        SendRequest {
            to: recipient(),
            amount: Nicks(25_000),
            fee: Some(Nicks(1_000)),
            send_max: false,
        },
        3_000,
    )
    .await
    .unwrap_err();
    assert!(matches!(
        err,
        WalletError::InsufficientFunds { have, .. } if have == Nicks(20_000)
    ));

    // Every in-flight note belongs to exactly one pending transaction.
    let book = h.store.book(h.pkh).unwrap();
    for note in book.notes.iter().filter(|n| n.state == NoteState::InFlight) {
        let owners: Vec<_> = book
            .transactions
            .iter()
            .filter(|t| t.status.is_pending() && t.input_note_ids.contains(&note.note_id))
            .collect();
        assert_eq!(owners.len(), 1);
        assert_eq!(Some(owners[0].id), note.pending_tx_id);
    }
}

#[tokio::test]
async fn pending_transaction_expires_and_releases_inputs() {
    let mut h = Harness::new();
    h.mint(50_000, b"a");
    h.sync(1_000).await;

    let sent = send_transaction(
        &mut h.store,
        &h.node,
        &h.key,
        SendRequest {
            to: recipient(),
            amount: Nicks(10_000),
            fee: Some(Nicks(1_000)),
            send_max: false,
        },
        2_000,
    )
    .await
    .unwrap();
    assert!(sent.broadcasted);

    // The chain never picks it up; the input is still reported unspent.
    let late = 2_000 + TX_EXPIRY_MS + 1;
    let outcome = h.sync(late).await;
    assert_eq!(outcome.expired, vec![sent.wallet_tx.id]);

    let book = h.store.book(h.pkh).unwrap();
    let tx = book.transactions.iter().find(|t| t.id == sent.wallet_tx.id).unwrap();
    assert_eq!(tx.status, WalletTxStatus::Expired);
    assert_eq!(h.store.available_balance(h.pkh).unwrap(), Nicks(50_000));
}

#[tokio::test]
async fn send_max_sweeps_without_change() {
    let mut h = Harness::new();
    h.mint(40_000_000, b"a");
    h.mint(60_000_000, b"b");
    h.sync(1_000).await;

    let (amount, fee) = estimate_max_send(&mut h.store, h.pkh, recipient()).unwrap();
    assert_eq!(amount + fee, Nicks(100_000_000));

    let outcome = send_transaction(
        &mut h.store,
        &h.node,
        &h.key,
        SendRequest { to: recipient(), amount: Nicks::ZERO, fee: None, send_max: true },
        2_000,
    )
    .await
    .unwrap();
    assert!(outcome.broadcasted);
    assert_eq!(outcome.wallet_tx.amount, amount);
    assert_eq!(outcome.wallet_tx.fee, fee);
    assert_eq!(outcome.wallet_tx.expected_change, Nicks::ZERO);
    assert_eq!(outcome.wallet_tx.input_note_ids.len(), 2);

    let book = h.store.book(h.pkh).unwrap();
    assert!(book.notes.iter().all(|n| n.state == NoteState::InFlight));
}

#[tokio::test]
async fn estimation_is_side_effect_free() {
    let mut h = Harness::new();
    h.mint(80_000_000, b"a");
    h.sync(1_000).await;

    let fee = estimate_fee(&mut h.store, h.pkh, recipient(), Nicks(10_000)).unwrap();
    assert!(fee > Nicks::ZERO);
    let again = estimate_fee(&mut h.store, h.pkh, recipient(), Nicks(10_000)).unwrap();
    assert_eq!(fee, again);

    let book = h.store.book(h.pkh).unwrap();
    assert!(book.notes.iter().all(|n| n.state == NoteState::Available));
    assert!(book.transactions.is_empty());
    assert!(h.node.broadcast_log().is_empty());
}

#[tokio::test]
async fn coinbase_notes_sync_and_spend() {
    let mut h = Harness::new();
    // A mining reward: coinbase lock, discovered via the coinbase
    // first-name query leg.
    let sc = SpendCondition::coinbase(h.pkh);
    let reward = Note {
        version: NoteVersion::V1,
        origin_page: 5,
        name: Name::new(sc.first_name(), hash_atom(b"reward")),
        note_data_hash: hash_atom(b"data"),
        assets: Nicks(500_000),
    };
    h.node.seed_note(reward.clone());

    let outcome = h.sync(1_000).await;
    assert_eq!(outcome.discovered, 1);

    let sent = send_transaction(
        &mut h.store,
        &h.node,
        &h.key,
        SendRequest {
            to: recipient(),
            amount: Nicks(100_000),
            fee: Some(Nicks(2_000)),
            send_max: false,
        },
        2_000,
    )
    .await
    .unwrap();
    assert!(sent.broadcasted);
    assert_eq!(sent.wallet_tx.expected_change, Nicks(398_000));
}

#[tokio::test]
async fn rediscovered_spent_notes_stay_spent() {
    let mut h = Harness::new();
    let minted = h.mint(10_000, b"a");
    h.sync(1_000).await;

    h.node.retire_note(minted.id());
    h.sync(2_000).await;
    {
        let book = h.store.book(h.pkh).unwrap();
        assert_eq!(book.notes[0].state, NoteState::Spent);
    }

    // A lagging node briefly re-reports the spent note: state must hold.
    h.node.seed_note(minted.clone());
    h.sync(3_000).await;
    let book = h.store.book(h.pkh).unwrap();
    assert_eq!(book.notes.len(), 1);
    assert_eq!(book.notes[0].state, NoteState::Spent);
}

#[tokio::test]
async fn store_survives_reload_mid_flight() {
    let storage = Arc::new(WalletStorage::temporary().unwrap());
    let master = derive_master_key_from_mnemonic(PHRASE, None).unwrap();
    let key = master.derive_child(0).unwrap();
    let pkh = key.pkh();
    let node = MockNode::new();

    let sc = SpendCondition::single_pkh(pkh);
    node.seed_note(Note {
        version: NoteVersion::V1,
        origin_page: 1,
        name: Name::new(sc.first_name(), hash_atom(b"n")),
        note_data_hash: hash_atom(b"data"),
        assets: Nicks(90_000),
    });

    let wallet_tx_id;
    {
        let mut store = UtxoStore::new(Arc::clone(&storage));
        sync_account(&mut store, &node, pkh, 1_000).await.unwrap();
        let sent = send_transaction(
            &mut store,
            &node,
            &key,
            SendRequest {
                to: recipient(),
                amount: Nicks(30_000),
                fee: Some(Nicks(1_000)),
                send_max: false,
            },
            2_000,
        )
        .await
        .unwrap();
        wallet_tx_id = sent.wallet_tx.id;
    }

    // A fresh process sees the in-flight lock and the pending record in
    // one consistent snapshot.
    let mut reloaded = UtxoStore::new(storage);
    let book = reloaded.book(pkh).unwrap();
    assert_eq!(book.notes[0].state, NoteState::InFlight);
    assert_eq!(book.notes[0].pending_tx_id, Some(wallet_tx_id));
    let tx = book.transactions.iter().find(|t| t.id == wallet_tx_id).unwrap();
    assert_eq!(tx.status, WalletTxStatus::BroadcastedUnconfirmed);
    assert!(tx
        .input_note_ids
        .iter()
        .all(|id| book.notes.iter().any(|n| n.note_id == *id && n.state == NoteState::InFlight)));
}
