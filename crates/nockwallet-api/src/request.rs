//! The request surface.
//!
//! The shell's message bus dispatches by method name; here that becomes a
//! tagged-variant type with exhaustive handling. Unknown method names fail
//! with `METHOD_NOT_SUPPORTED` at the parse boundary, so the handler match
//! stays total.

use serde::Deserialize;

use nockwallet_core::WalletError;

/// Everything the extension shell can ask of the engine. Variants carrying
/// an `origin` arrived through the dapp provider and go through the
/// approval queue.
#[derive(Clone, Debug, PartialEq)]
pub enum WalletRequest {
    // ── Vault ────────────────────────────────────────────────────────────────
    GetState,
    Setup { password: String, mnemonic: Option<String> },
    Unlock { password: String },
    Lock,
    Reset,
    SetAutoLock { minutes: u32 },
    GetAutoLock,
    GetMnemonic { password: String },

    // ── Accounts ─────────────────────────────────────────────────────────────
    CreateAccount { name: Option<String> },
    SwitchAccount { index: u32 },
    RenameAccount { index: u32, name: String },
    HideAccount { index: u32 },
    UpdateAccountStyling { index: u32, display: String },
    GetAccounts,

    // ── Balance / transactions ───────────────────────────────────────────────
    GetBalance,
    GetBalanceFromStore,
    EstimateTransactionFee { to: String, amount: u64 },
    EstimateMaxSend { to: String },
    SendTransaction {
        to: String,
        amount: u64,
        fee: Option<i64>,
        send_max: bool,
        /// Present when a dapp asked; routes through the approval queue.
        origin: Option<String>,
    },
    SignRawTx {
        raw_tx: String,
        notes: serde_json::Value,
        spend_conditions: serde_json::Value,
    },
    AddTransactionToCache { transaction: serde_json::Value },
    GetWalletTransactions,

    // ── Provider ─────────────────────────────────────────────────────────────
    RequestAccounts { origin: String },
    SignMessage { message: String, origin: Option<String> },

    // ── Approvals ────────────────────────────────────────────────────────────
    ApproveRequest { approval_id: u64 },
    RejectRequest { approval_id: u64 },
}

#[derive(Deserialize)]
struct PasswordParams {
    password: String,
}

#[derive(Deserialize)]
struct SetupParams {
    password: String,
    #[serde(default)]
    mnemonic: Option<String>,
}

#[derive(Deserialize)]
struct MinutesParams {
    minutes: u32,
}

#[derive(Deserialize)]
struct NameParams {
    #[serde(default)]
    name: Option<String>,
}

#[derive(Deserialize)]
struct IndexParams {
    index: u32,
}

#[derive(Deserialize)]
struct RenameParams {
    index: u32,
    name: String,
}

#[derive(Deserialize)]
struct StylingParams {
    index: u32,
    display: String,
}

#[derive(Deserialize)]
struct EstimateParams {
    to: String,
    amount: u64,
}

#[derive(Deserialize)]
struct ToParams {
    to: String,
}

#[derive(Deserialize)]
struct SendParams {
    to: String,
    amount: u64,
    #[serde(default)]
    fee: Option<i64>,
    #[serde(default)]
    send_max: bool,
    #[serde(default)]
    origin: Option<String>,
}

#[derive(Deserialize)]
struct SignRawTxParams {
    raw_tx: String,
    notes: serde_json::Value,
    spend_conditions: serde_json::Value,
}

#[derive(Deserialize)]
struct CacheTxParams {
    transaction: serde_json::Value,
}

#[derive(Deserialize)]
struct OriginParams {
    origin: String,
}

#[derive(Deserialize)]
struct SignMessageParams {
    message: String,
    #[serde(default)]
    origin: Option<String>,
}

#[derive(Deserialize)]
struct ApprovalParams {
    approval_id: u64,
}

fn params<T: serde::de::DeserializeOwned>(value: serde_json::Value) -> Result<T, WalletError> {
    serde_json::from_value(value).map_err(|e| WalletError::InvalidParams(e.to_string()))
}

impl WalletRequest {
    /// Parse a shell message. Unknown names are rejected here so the
    /// dispatch match never needs a fallback arm.
    pub fn from_method(method: &str, value: serde_json::Value) -> Result<Self, WalletError> {
        Ok(match method {
            "get_state" => WalletRequest::GetState,
            "setup" => {
                let p: SetupParams = params(value)?;
                WalletRequest::Setup { password: p.password, mnemonic: p.mnemonic }
            }
            "unlock" => {
                let p: PasswordParams = params(value)?;
                WalletRequest::Unlock { password: p.password }
            }
            "lock" => WalletRequest::Lock,
            "reset" => WalletRequest::Reset,
            "set_auto_lock" => {
                let p: MinutesParams = params(value)?;
                WalletRequest::SetAutoLock { minutes: p.minutes }
            }
            "get_auto_lock" => WalletRequest::GetAutoLock,
            "get_mnemonic" => {
                let p: PasswordParams = params(value)?;
                WalletRequest::GetMnemonic { password: p.password }
            }
            "create_account" => {
                let p: NameParams = params(value)?;
                WalletRequest::CreateAccount { name: p.name }
            }
            "switch_account" => {
                let p: IndexParams = params(value)?;
                WalletRequest::SwitchAccount { index: p.index }
            }
            "rename_account" => {
                let p: RenameParams = params(value)?;
                WalletRequest::RenameAccount { index: p.index, name: p.name }
            }
            "hide_account" => {
                let p: IndexParams = params(value)?;
                WalletRequest::HideAccount { index: p.index }
            }
            "update_account_styling" => {
                let p: StylingParams = params(value)?;
                WalletRequest::UpdateAccountStyling { index: p.index, display: p.display }
            }
            "get_accounts" => WalletRequest::GetAccounts,
            "get_balance" => WalletRequest::GetBalance,
            "get_balance_from_store" => WalletRequest::GetBalanceFromStore,
            "estimate_transaction_fee" => {
                let p: EstimateParams = params(value)?;
                WalletRequest::EstimateTransactionFee { to: p.to, amount: p.amount }
            }
            "estimate_max_send" => {
                let p: ToParams = params(value)?;
                WalletRequest::EstimateMaxSend { to: p.to }
            }
            "send_transaction" => {
                let p: SendParams = params(value)?;
                WalletRequest::SendTransaction {
                    to: p.to,
                    amount: p.amount,
                    fee: p.fee,
                    send_max: p.send_max,
                    origin: p.origin,
                }
            }
            "sign_raw_tx" => {
                let p: SignRawTxParams = params(value)?;
                WalletRequest::SignRawTx {
                    raw_tx: p.raw_tx,
                    notes: p.notes,
                    spend_conditions: p.spend_conditions,
                }
            }
            "add_transaction_to_cache" => {
                let p: CacheTxParams = params(value)?;
                WalletRequest::AddTransactionToCache { transaction: p.transaction }
            }
            "get_wallet_transactions" => WalletRequest::GetWalletTransactions,
            "request_accounts" => {
                let p: OriginParams = params(value)?;
                WalletRequest::RequestAccounts { origin: p.origin }
            }
            "sign_message" => {
                let p: SignMessageParams = params(value)?;
                WalletRequest::SignMessage { message: p.message, origin: p.origin }
            }
            "approve_request" => {
                let p: ApprovalParams = params(value)?;
                WalletRequest::ApproveRequest { approval_id: p.approval_id }
            }
            "reject_request" => {
                let p: ApprovalParams = params(value)?;
                WalletRequest::RejectRequest { approval_id: p.approval_id }
            }
            other => return Err(WalletError::MethodNotSupported(other.to_string())),
        })
    }

    /// Whether this request refreshes the auto-lock activity clock. The set
    /// is fixed: passive reads must never keep the vault awake.
    pub fn is_user_activity(&self) -> bool {
        match self {
            WalletRequest::Unlock { .. }
            | WalletRequest::SwitchAccount { .. }
            | WalletRequest::CreateAccount { .. }
            | WalletRequest::RenameAccount { .. }
            | WalletRequest::SetAutoLock { .. }
            | WalletRequest::GetMnemonic { .. } => true,
            // Provider-side interactions count; wallet-internal variants of
            // the same methods do not.
            WalletRequest::RequestAccounts { .. } => true,
            WalletRequest::SendTransaction { origin, .. } => origin.is_some(),
            WalletRequest::SignMessage { origin, .. } => origin.is_some(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_known_methods() {
        let req = WalletRequest::from_method("unlock", json!({"password": "pw"})).unwrap();
        assert_eq!(req, WalletRequest::Unlock { password: "pw".into() });

        let req = WalletRequest::from_method(
            "send_transaction",
            json!({"to": "abc", "amount": 5, "send_max": false}),
        )
        .unwrap();
        assert!(matches!(req, WalletRequest::SendTransaction { fee: None, .. }));
    }

    #[test]
    fn unknown_method_is_not_supported() {
        let err = WalletRequest::from_method("mint_tokens", json!({})).unwrap_err();
        assert!(matches!(err, WalletError::MethodNotSupported(m) if m == "mint_tokens"));
    }

    #[test]
    fn malformed_params_are_invalid() {
        let err = WalletRequest::from_method("unlock", json!({"pass": "pw"})).unwrap_err();
        assert_eq!(err.code(), "INVALID_PARAMS");
    }

    #[test]
    fn activity_classification_is_fixed() {
        assert!(WalletRequest::Unlock { password: "x".into() }.is_user_activity());
        assert!(WalletRequest::SwitchAccount { index: 0 }.is_user_activity());
        assert!(WalletRequest::SetAutoLock { minutes: 5 }.is_user_activity());
        assert!(WalletRequest::RequestAccounts { origin: "https://a".into() }.is_user_activity());

        // Passive reads and wallet-internal calls never touch the clock.
        assert!(!WalletRequest::GetState.is_user_activity());
        assert!(!WalletRequest::GetAccounts.is_user_activity());
        assert!(!WalletRequest::GetBalance.is_user_activity());
        assert!(!WalletRequest::Lock.is_user_activity());
        let internal_send = WalletRequest::SendTransaction {
            to: "a".into(),
            amount: 1,
            fee: None,
            send_max: false,
            origin: None,
        };
        assert!(!internal_send.is_user_activity());
    }
}
