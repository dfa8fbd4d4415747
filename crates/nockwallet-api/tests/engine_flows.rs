//! End-to-end engine flows: setup and derivation, provider approvals with
//! replay rejection, auto-lock, and manual-lock stickiness.
//!
//! Run with:
//!   cargo test -p nockwallet-api --test engine_flows

use std::sync::Arc;

use serde_json::json;

use nockwallet_api::{ConnectionState, WalletEngine, WalletRequest};
use nockwallet_core::constants::REQUEST_EXPIRATION_MS;
use nockwallet_core::hash::hash_atom;
use nockwallet_core::lock::SpendCondition;
use nockwallet_core::note::{Name, Note, NoteVersion};
use nockwallet_core::types::{Digest, Nicks};
use nockwallet_core::WalletError;
use nockwallet_crypto::keys::derive_master_key_from_mnemonic;
use nockwallet_rpc::mock::MockNode;
use nockwallet_storage::WalletStorage;

const PHRASE: &str = "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon art";
const PASSWORD: &str = "hunter2hunter2";
const ORIGIN: &str = "https://dapp.example";

fn engine() -> WalletEngine<MockNode> {
    let storage = Arc::new(WalletStorage::temporary().unwrap());
    WalletEngine::new(storage, MockNode::new()).unwrap()
}

async fn setup(engine: &mut WalletEngine<MockNode>, now_ms: i64) -> Digest {
    let result = engine
        .handle(
            WalletRequest::Setup {
                password: PASSWORD.into(),
                mnemonic: Some(PHRASE.into()),
            },
            now_ms,
        )
        .await
        .unwrap();
    Digest::from_b58(result["account"]["pkh"].as_str().unwrap()).unwrap()
}

fn mint(engine: &WalletEngine<MockNode>, pkh: Digest, assets: u64, tag: &[u8]) {
    let sc = SpendCondition::single_pkh(pkh);
    engine_node(engine).seed_note(Note {
        version: NoteVersion::V1,
        origin_page: 9,
        name: Name::new(sc.first_name(), hash_atom(tag)),
        note_data_hash: hash_atom(b"data"),
        assets: Nicks(assets),
    });
}

fn engine_node(engine: &WalletEngine<MockNode>) -> &MockNode {
    engine.node()
}

fn recipient_b58() -> String {
    hash_atom(b"somebody-else").to_b58()
}

#[tokio::test]
async fn setup_derives_account_zero_deterministically() {
    let mut e = engine();
    let pkh = setup(&mut e, 0).await;

    // The derivation policy is pinned: account 0 is master.derive_child(0).
    let expected = derive_master_key_from_mnemonic(PHRASE, None)
        .unwrap()
        .derive_child(0)
        .unwrap()
        .pkh();
    assert_eq!(pkh, expected);

    let accounts = e.handle(WalletRequest::GetAccounts, 1).await.unwrap();
    let list = accounts.as_array().unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0]["index"], json!(0));

    let state = e.handle(WalletRequest::GetState, 2).await.unwrap();
    assert_eq!(state["status"], json!("unlocked"));
}

#[tokio::test]
async fn unknown_methods_fail_closed() {
    let err = WalletRequest::from_method("drain_wallet", json!({})).unwrap_err();
    assert_eq!(err.code(), "METHOD_NOT_SUPPORTED");
}

#[tokio::test]
async fn provider_flow_with_replayed_approval() {
    let mut e = engine();
    let pkh = setup(&mut e, 0).await;
    mint(&e, pkh, 200_000, b"n1");
    e.sync(100).await.unwrap();

    // Connect the dapp: request_accounts queues a ticket; approval records
    // the origin.
    let pending = e
        .handle(WalletRequest::RequestAccounts { origin: ORIGIN.into() }, 200)
        .await
        .unwrap();
    let approval_id = pending["approval_id"].as_u64().unwrap();
    e.handle(WalletRequest::ApproveRequest { approval_id }, 300)
        .await
        .unwrap();
    assert!(e.is_origin_approved(ORIGIN).unwrap());

    // Two dapp sends queue two tickets.
    let first = e
        .handle(
            WalletRequest::SendTransaction {
                to: recipient_b58(),
                amount: 10_000,
                fee: Some(1_000),
                send_max: false,
                origin: Some(ORIGIN.into()),
            },
            1_000,
        )
        .await
        .unwrap();
    let second = e
        .handle(
            WalletRequest::SendTransaction {
                to: recipient_b58(),
                amount: 20_000,
                fee: Some(1_000),
                send_max: false,
                origin: Some(ORIGIN.into()),
            },
            1_000,
        )
        .await
        .unwrap();
    let first_id = first["approval_id"].as_u64().unwrap();
    let second_id = second["approval_id"].as_u64().unwrap();

    // Approving the first promptly executes it.
    let executed = e
        .handle(WalletRequest::ApproveRequest { approval_id: first_id }, 2_000)
        .await
        .unwrap();
    assert_eq!(executed["broadcasted"], json!(true));
    assert_eq!(engine_node(&e).broadcast_log().len(), 1);

    // The second approval arrives six minutes later: replay-rejected, and
    // nothing about the wallet changed.
    let err = e
        .handle(
            WalletRequest::ApproveRequest { approval_id: second_id },
            1_000 + REQUEST_EXPIRATION_MS + 60_000,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, WalletError::RequestExpired));
    assert_eq!(engine_node(&e).broadcast_log().len(), 1);

    let txs = e
        .handle(WalletRequest::GetWalletTransactions, 9_999_999)
        .await
        .unwrap();
    assert_eq!(txs.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn unapproved_origin_cannot_send() {
    let mut e = engine();
    setup(&mut e, 0).await;
    let err = e
        .handle(
            WalletRequest::SendTransaction {
                to: recipient_b58(),
                amount: 1,
                fee: None,
                send_max: false,
                origin: Some("https://evil.example".into()),
            },
            100,
        )
        .await
        .unwrap_err();
    assert_eq!(err.code(), "UNAUTHORIZED");
}

#[tokio::test]
async fn auto_lock_after_idle_window() {
    let mut e = engine();
    setup(&mut e, 0).await;
    e.handle(WalletRequest::SetAutoLock { minutes: 1 }, 0)
        .await
        .unwrap();

    // 61 seconds with no user activity: the next request hits a locked
    // vault.
    let err = e
        .handle(WalletRequest::RequestAccounts { origin: ORIGIN.into() }, 61_000)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "LOCKED");

    let state = e.handle(WalletRequest::GetState, 61_001).await.unwrap();
    assert_eq!(state["status"], json!("locked"));
}

#[tokio::test]
async fn passive_reads_do_not_refresh_the_idle_clock() {
    let mut e = engine();
    setup(&mut e, 0).await;
    e.handle(WalletRequest::SetAutoLock { minutes: 1 }, 0)
        .await
        .unwrap();

    // A state poll at 59s must not extend the window.
    e.handle(WalletRequest::GetState, 59_000).await.unwrap();
    let state = e.handle(WalletRequest::GetState, 61_000).await.unwrap();
    assert_eq!(state["status"], json!("locked"));
}

#[tokio::test]
async fn zero_minutes_disables_auto_lock() {
    let mut e = engine();
    setup(&mut e, 0).await;
    e.handle(WalletRequest::SetAutoLock { minutes: 0 }, 0)
        .await
        .unwrap();
    let state = e
        .handle(WalletRequest::GetState, 365 * 24 * 3_600_000)
        .await
        .unwrap();
    assert_eq!(state["status"], json!("unlocked"));
}

#[tokio::test]
async fn manual_lock_is_sticky_until_explicit_unlock() {
    let mut e = engine();
    setup(&mut e, 0).await;
    e.handle(WalletRequest::SetAutoLock { minutes: 1 }, 0)
        .await
        .unwrap();

    e.handle(WalletRequest::Lock, 1_000).await.unwrap();
    let state = e.handle(WalletRequest::GetState, 2_000).await.unwrap();
    assert_eq!(state["status"], json!("locked"));
    assert_eq!(state["manually_locked"], json!(true));

    // The idle alarm firing later changes nothing; the flag holds.
    let state = e.handle(WalletRequest::GetState, 10_000_000).await.unwrap();
    assert_eq!(state["manually_locked"], json!(true));

    e.handle(WalletRequest::Unlock { password: PASSWORD.into() }, 10_000_001)
        .await
        .unwrap();
    let state = e.handle(WalletRequest::GetState, 10_000_002).await.unwrap();
    assert_eq!(state["status"], json!("unlocked"));
    assert_eq!(state["manually_locked"], json!(false));
}

#[tokio::test]
async fn send_and_balance_round_trip_through_the_engine() {
    let mut e = engine();
    let pkh = setup(&mut e, 0).await;
    mint(&e, pkh, 100_000, b"n1");
    e.sync(100).await.unwrap();

    let balance = e.handle(WalletRequest::GetBalanceFromStore, 200).await.unwrap();
    assert_eq!(balance["nicks"], json!(100_000));

    let sent = e
        .handle(
            WalletRequest::SendTransaction {
                to: recipient_b58(),
                amount: 10_000,
                fee: Some(1_000),
                send_max: false,
                origin: None,
            },
            300,
        )
        .await
        .unwrap();
    assert_eq!(sent["broadcasted"], json!(true));
    assert_eq!(sent["wallet_tx"]["expected_change"], json!(89_000));

    // In-flight value is excluded from the store balance.
    let balance = e.handle(WalletRequest::GetBalanceFromStore, 400).await.unwrap();
    assert_eq!(balance["nicks"], json!(0));
}

#[tokio::test]
async fn negative_fee_is_invalid() {
    let mut e = engine();
    setup(&mut e, 0).await;
    let err = e
        .handle(
            WalletRequest::SendTransaction {
                to: recipient_b58(),
                amount: 1_000,
                fee: Some(-5),
                send_max: false,
                origin: None,
            },
            100,
        )
        .await
        .unwrap_err();
    assert_eq!(err.code(), "INVALID_PARAMS");
}

#[tokio::test]
async fn bad_address_is_rejected_before_any_work() {
    let mut e = engine();
    setup(&mut e, 0).await;
    let err = e
        .handle(
            WalletRequest::SendTransaction {
                to: "definitely-not-an-address".into(),
                amount: 1_000,
                fee: None,
                send_max: false,
                origin: None,
            },
            100,
        )
        .await
        .unwrap_err();
    assert_eq!(err.code(), "BAD_ADDRESS");
}

#[tokio::test]
async fn health_tick_tracks_connection_state() {
    let mut e = engine();
    setup(&mut e, 0).await;
    assert_eq!(e.health_tick(1_000).await, ConnectionState::Connected);

    engine_node(&e).set_fail_health(true);
    assert_eq!(e.health_tick(2_000).await, ConnectionState::Degraded { missed: 1 });
    e.health_tick(3_000).await;
    assert_eq!(e.health_tick(4_000).await, ConnectionState::Down);

    engine_node(&e).set_fail_health(false);
    assert_eq!(e.health_tick(5_000).await, ConnectionState::Connected);
}
