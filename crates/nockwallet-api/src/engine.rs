//! The wallet engine facade.
//!
//! One explicit handle over vault, UTXO store and node RPC. The shell
//! constructs a `WalletEngine` at boot and feeds it parsed requests; all
//! vault and store state lives behind this handle, never in globals.
//! Every request passes the auto-lock gate first, and only the fixed
//! user-activity set refreshes the idle clock.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{json, Value};
use tracing::{info, warn};

use nockwallet_core::constants::NICKS_PER_NOCK;
use nockwallet_core::hash::hash_noun;
use nockwallet_core::lock::SpendCondition;
use nockwallet_core::note::Note;
use nockwallet_core::types::{Digest, Nicks};
use nockwallet_core::WalletError;
use nockwallet_rpc::NodeRpc;
use nockwallet_storage::{keys as storage_keys, WalletStorage};
use nockwallet_store::{
    estimate_fee, estimate_max_send, send_transaction, sync_account, SendRequest, SyncOutcome,
    UtxoStore, WalletTransaction,
};
use nockwallet_vault::{Vault, VaultStatus};

use crate::approvals::{ApprovalAction, ApprovalId, ApprovalQueue};
use crate::health::{ConnectionHealth, ConnectionState};
use crate::request::WalletRequest;

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
struct OnboardingState {
    #[serde(rename = "backupComplete")]
    backup_complete: bool,
}

pub struct WalletEngine<R: NodeRpc> {
    storage: Arc<WalletStorage>,
    vault: Vault,
    store: UtxoStore,
    rpc: R,
    approvals: ApprovalQueue,
    health: ConnectionHealth,
}

impl<R: NodeRpc> WalletEngine<R> {
    pub fn new(storage: Arc<WalletStorage>, rpc: R) -> Result<Self, WalletError> {
        let vault = Vault::load(Arc::clone(&storage))?;
        let store = UtxoStore::new(Arc::clone(&storage));
        Ok(Self {
            storage,
            vault,
            store,
            rpc,
            approvals: ApprovalQueue::new(),
            health: ConnectionHealth::new(),
        })
    }

    pub fn vault(&self) -> &Vault {
        &self.vault
    }

    pub fn node(&self) -> &R {
        &self.rpc
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.health.state()
    }

    /// Handle one request. `now_ms` is the caller's clock; the engine keeps
    /// none of its own.
    pub async fn handle(
        &mut self,
        request: WalletRequest,
        now_ms: i64,
    ) -> Result<Value, WalletError> {
        if self.vault.should_auto_lock(now_ms) {
            info!("idle window elapsed; locking vault");
            self.vault.auto_lock();
        }
        if request.is_user_activity() {
            self.vault.touch_activity(now_ms);
        }

        match request {
            // ── Vault ────────────────────────────────────────────────────────
            WalletRequest::GetState => Ok(self.state_view()),
            WalletRequest::Setup { password, mnemonic } => {
                let account = self.vault.setup(&password, mnemonic.as_deref(), now_ms)?;
                Ok(json!({ "account": account, "locked": false }))
            }
            WalletRequest::Unlock { password } => {
                self.vault.unlock(&password, now_ms)?;
                Ok(json!({ "ok": true }))
            }
            WalletRequest::Lock => {
                self.vault.lock();
                Ok(json!({ "ok": true }))
            }
            WalletRequest::Reset => {
                self.vault.reset()?;
                // The in-memory books are gone with the storage beneath them.
                self.store = UtxoStore::new(Arc::clone(&self.storage));
                Ok(json!({ "ok": true }))
            }
            WalletRequest::SetAutoLock { minutes } => {
                self.vault.set_auto_lock(minutes)?;
                Ok(json!({ "ok": true }))
            }
            WalletRequest::GetAutoLock => {
                Ok(json!({ "minutes": self.vault.auto_lock_minutes() }))
            }
            WalletRequest::GetMnemonic { password } => {
                Ok(json!({ "mnemonic": self.vault.get_mnemonic(&password)? }))
            }

            // ── Accounts ─────────────────────────────────────────────────────
            WalletRequest::CreateAccount { name } => {
                let account = self.vault.create_account(name)?;
                serde_json::to_value(account).map_err(to_serialization_error)
            }
            WalletRequest::SwitchAccount { index } => {
                self.vault.switch_account(index)?;
                Ok(json!({ "current_account_index": index }))
            }
            WalletRequest::RenameAccount { index, name } => {
                self.vault.rename_account(index, name)?;
                Ok(json!({ "ok": true }))
            }
            WalletRequest::HideAccount { index } => {
                self.vault.hide_account(index)?;
                Ok(json!({ "ok": true }))
            }
            WalletRequest::UpdateAccountStyling { index, display } => {
                self.vault.update_account_styling(index, display)?;
                Ok(json!({ "ok": true }))
            }
            WalletRequest::GetAccounts => {
                serde_json::to_value(self.vault.visible_accounts()).map_err(to_serialization_error)
            }

            // ── Balance / transactions ───────────────────────────────────────
            WalletRequest::GetBalance => self.chain_balance().await,
            WalletRequest::GetBalanceFromStore => {
                let pkh = self.current_pkh()?;
                let nicks = self.store.available_balance(pkh)?;
                Ok(json!({ "nicks": nicks.0 }))
            }
            WalletRequest::EstimateTransactionFee { to, amount } => {
                let to = parse_address(&to)?;
                if amount == 0 {
                    return Err(WalletError::InvalidAmount);
                }
                let pkh = self.current_pkh()?;
                let fee = estimate_fee(&mut self.store, pkh, to, Nicks(amount))?;
                Ok(json!({ "fee": fee.0 }))
            }
            WalletRequest::EstimateMaxSend { to } => {
                let to = parse_address(&to)?;
                let pkh = self.current_pkh()?;
                let (amount, fee) = estimate_max_send(&mut self.store, pkh, to)?;
                Ok(json!({ "amount": amount.0, "fee": fee.0 }))
            }
            WalletRequest::SendTransaction { to, amount, fee, send_max, origin } => {
                let fee = parse_fee(fee)?;
                match origin {
                    Some(origin) => {
                        self.require_origin_approved(&origin)?;
                        let id = self.approvals.enqueue(
                            ApprovalAction::Send {
                                to,
                                amount: Nicks(amount),
                                fee,
                                send_max,
                                origin,
                            },
                            now_ms,
                        );
                        Ok(json!({ "approval_id": id, "status": "pending_approval" }))
                    }
                    None => self.execute_send(&to, Nicks(amount), fee, send_max, now_ms).await,
                }
            }
            WalletRequest::SignRawTx { raw_tx, notes, spend_conditions } => {
                self.sign_raw_tx(&raw_tx, notes, spend_conditions)
            }
            WalletRequest::AddTransactionToCache { transaction } => {
                let tx: WalletTransaction = serde_json::from_value(transaction)
                    .map_err(|e| WalletError::InvalidParams(e.to_string()))?;
                let pkh = tx.account_pkh;
                self.store.add_transaction(pkh, tx)?;
                Ok(json!({ "ok": true }))
            }
            WalletRequest::GetWalletTransactions => {
                let pkh = self.current_pkh()?;
                serde_json::to_value(self.store.transactions(pkh)?).map_err(to_serialization_error)
            }

            // ── Provider ─────────────────────────────────────────────────────
            WalletRequest::RequestAccounts { origin } => {
                if self.vault.is_locked() {
                    return Err(WalletError::Locked);
                }
                if self.is_origin_approved(&origin)? {
                    let addresses: Vec<String> = self
                        .vault
                        .visible_accounts()
                        .iter()
                        .map(|a| a.pkh.to_b58())
                        .collect();
                    return Ok(json!({ "accounts": addresses }));
                }
                let id = self
                    .approvals
                    .enqueue(ApprovalAction::ConnectOrigin { origin }, now_ms);
                Ok(json!({ "approval_id": id, "status": "pending_approval" }))
            }
            WalletRequest::SignMessage { message, origin } => match origin {
                Some(origin) => {
                    self.require_origin_approved(&origin)?;
                    let id = self
                        .approvals
                        .enqueue(ApprovalAction::SignMessage { message, origin }, now_ms);
                    Ok(json!({ "approval_id": id, "status": "pending_approval" }))
                }
                None => self.execute_sign_message(&message),
            },

            // ── Approvals ────────────────────────────────────────────────────
            WalletRequest::ApproveRequest { approval_id } => {
                self.approve(approval_id, now_ms).await
            }
            WalletRequest::RejectRequest { approval_id } => {
                self.approvals.take_for_rejection(approval_id)?;
                Ok(json!({ "rejected": true }))
            }
        }
    }

    // ── Timer-driven entry points (the shell's alarms call these) ────────────

    /// One UTXO sync round for the current account.
    pub async fn sync(&mut self, now_ms: i64) -> Result<SyncOutcome, WalletError> {
        let pkh = self.current_pkh()?;
        sync_account(&mut self.store, &self.rpc, pkh, now_ms).await
    }

    /// One health-check round. Isolated failures degrade the indicator and
    /// nothing else; the cadence never self-aborts.
    pub async fn health_tick(&mut self, now_ms: i64) -> ConnectionState {
        match self.rpc.health_check().await {
            Ok(()) => self.health.record_success(now_ms),
            Err(e) => {
                warn!(error = %e, "health check missed");
                self.health.record_failure();
            }
        }
        self.health.state()
    }

    // ── Onboarding / origins ─────────────────────────────────────────────────

    pub fn is_origin_approved(&self, origin: &str) -> Result<bool, WalletError> {
        Ok(self.approved_origins()?.iter().any(|o| o == origin))
    }

    pub fn backup_complete(&self) -> Result<bool, WalletError> {
        let state: OnboardingState = self
            .storage
            .get(storage_keys::ONBOARDING_STATE)?
            .unwrap_or_default();
        Ok(state.backup_complete)
    }

    pub fn set_backup_complete(&self) -> Result<(), WalletError> {
        self.storage.put(
            storage_keys::ONBOARDING_STATE,
            &OnboardingState { backup_complete: true },
        )
    }

    // ── Internals ────────────────────────────────────────────────────────────

    async fn approve(&mut self, id: ApprovalId, now_ms: i64) -> Result<Value, WalletError> {
        match self.approvals.take_for_approval(id, now_ms)? {
            ApprovalAction::ConnectOrigin { origin } => {
                self.approve_origin(&origin)?;
                Ok(json!({ "approved_origin": origin }))
            }
            ApprovalAction::Send { to, amount, fee, send_max, .. } => {
                self.execute_send(&to, amount, fee, send_max, now_ms).await
            }
            ApprovalAction::SignMessage { message, .. } => self.execute_sign_message(&message),
        }
    }

    async fn execute_send(
        &mut self,
        to: &str,
        amount: Nicks,
        fee: Option<Nicks>,
        send_max: bool,
        now_ms: i64,
    ) -> Result<Value, WalletError> {
        let to = parse_address(to)?;
        let key = self.vault.account_key(self.vault.current_account_index())?;
        let request = SendRequest { to, amount, fee, send_max };
        let outcome = send_transaction(&mut self.store, &self.rpc, &key, request, now_ms).await?;
        Ok(json!({
            "tx_id": outcome.tx_id.to_b58(),
            "broadcasted": outcome.broadcasted,
            "wallet_tx": serde_json::to_value(&outcome.wallet_tx).map_err(to_serialization_error)?,
        }))
    }

    fn execute_sign_message(&mut self, message: &str) -> Result<Value, WalletError> {
        let key = self.vault.account_key(self.vault.current_account_index())?;
        let private = key.private_key.as_ref().ok_or(WalletError::Locked)?;
        let signature = private.sign(message.as_bytes())?;
        Ok(json!({
            "public_key": hex::encode(key.public_key.to_bytes()),
            "signature": { "r": hex::encode(&signature.r), "s": hex::encode(&signature.s) },
        }))
    }

    /// Sign an externally assembled transaction body: callers bring the
    /// unsigned jam plus the notes and conditions being spent; the engine
    /// checks the commitments and signs the body hash with the current
    /// account key.
    fn sign_raw_tx(
        &mut self,
        raw_tx_hex: &str,
        notes: Value,
        spend_conditions: Value,
    ) -> Result<Value, WalletError> {
        let jam = hex::decode(raw_tx_hex)
            .map_err(|e| WalletError::InvalidParams(format!("raw_tx: {e}")))?;
        let tx_id = hash_noun(&jam)?;

        let notes: Vec<Note> = serde_json::from_value(notes)
            .map_err(|e| WalletError::InvalidParams(format!("notes: {e}")))?;
        let conditions: Vec<SpendCondition> = serde_json::from_value(spend_conditions)
            .map_err(|e| WalletError::InvalidParams(format!("spend_conditions: {e}")))?;
        if notes.len() != conditions.len() {
            return Err(WalletError::InvalidParams(
                "notes and spend_conditions must pair up".into(),
            ));
        }
        for (note, sc) in notes.iter().zip(&conditions) {
            if sc.first_name() != note.name.first {
                return Err(WalletError::SpendConditionMismatch(note.id()));
            }
        }

        let key = self.vault.account_key(self.vault.current_account_index())?;
        let private = key.private_key.as_ref().ok_or(WalletError::Locked)?;
        let signature = private.sign(tx_id.as_bytes())?;
        Ok(json!({
            "tx_id": tx_id.to_b58(),
            "public_key": hex::encode(key.public_key.to_bytes()),
            "signature": { "r": hex::encode(&signature.r), "s": hex::encode(&signature.s) },
        }))
    }

    async fn chain_balance(&mut self) -> Result<Value, WalletError> {
        let pkh = self.current_pkh()?;
        let notes = self.rpc.query_utxos_by_pkh(pkh).await?;
        let total: Nicks = notes.iter().map(|n| n.assets).sum();

        // UI hint only; the store stays authoritative for spendability.
        let mut cached: HashMap<String, u64> = self
            .storage
            .get(storage_keys::CACHED_BALANCES)?
            .unwrap_or_default();
        cached.insert(pkh.to_b58(), total.0);
        self.storage.put(storage_keys::CACHED_BALANCES, &cached)?;

        Ok(json!({ "nicks": total.0, "nock": total.0 / NICKS_PER_NOCK }))
    }

    fn current_pkh(&self) -> Result<Digest, WalletError> {
        Ok(self.vault.current_account()?.pkh)
    }

    fn require_origin_approved(&self, origin: &str) -> Result<(), WalletError> {
        if !self.is_origin_approved(origin)? {
            return Err(WalletError::Unauthorized);
        }
        Ok(())
    }

    fn approved_origins(&self) -> Result<Vec<String>, WalletError> {
        Ok(self
            .storage
            .get(storage_keys::APPROVED_ORIGINS)?
            .unwrap_or_default())
    }

    fn approve_origin(&self, origin: &str) -> Result<(), WalletError> {
        let mut origins = self.approved_origins()?;
        if !origins.iter().any(|o| o == origin) {
            origins.push(origin.to_string());
            self.storage.put(storage_keys::APPROVED_ORIGINS, &origins)?;
        }
        Ok(())
    }

    fn state_view(&self) -> Value {
        let status = match self.vault.status() {
            VaultStatus::Absent => "absent",
            VaultStatus::Locked => "locked",
            VaultStatus::Unlocked => "unlocked",
        };
        json!({
            "status": status,
            "current_account_index": self.vault.current_account_index(),
            "accounts": self.vault.visible_accounts().len(),
            "auto_lock_minutes": self.vault.auto_lock_minutes(),
            "manually_locked": self.vault.is_manually_locked(),
            "connection": format!("{:?}", self.health.state()),
        })
    }
}

fn parse_address(s: &str) -> Result<Digest, WalletError> {
    Digest::from_b58(s).map_err(|_| WalletError::BadAddress(s.to_string()))
}

fn parse_fee(fee: Option<i64>) -> Result<Option<Nicks>, WalletError> {
    match fee {
        Some(f) if f < 0 => Err(WalletError::InvalidFee),
        Some(f) => Ok(Some(Nicks(f as u64))),
        None => Ok(None),
    }
}

fn to_serialization_error(e: serde_json::Error) -> WalletError {
    WalletError::Serialization(e.to_string())
}
