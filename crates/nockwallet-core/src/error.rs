use thiserror::Error;

use crate::types::{Digest, Nicks};

/// Every failure the wallet engine can surface.
///
/// Callers above the engine dispatch on [`WalletError::code`], which carries
/// the stable wire vocabulary; the enum itself carries the structured detail.
#[derive(Debug, Error)]
pub enum WalletError {
    // ── Vault / policy ───────────────────────────────────────────────────────
    #[error("wallet is locked")]
    Locked,

    #[error("no vault exists; run setup first")]
    NoVault,

    #[error("vault already exists; reset before setting up again")]
    VaultExists,

    #[error("bad password")]
    BadPassword,

    #[error("invalid mnemonic")]
    InvalidMnemonic,

    #[error("invalid account index: {0}")]
    InvalidAccountIndex(u32),

    // ── Requests ─────────────────────────────────────────────────────────────
    #[error("method not supported: {0}")]
    MethodNotSupported(String),

    #[error("origin not authorized")]
    Unauthorized,

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid params: {0}")]
    InvalidParams(String),

    #[error("approval request expired")]
    RequestExpired,

    #[error("user rejected the request")]
    UserRejected,

    // ── Transaction engine ───────────────────────────────────────────────────
    #[error("invalid address: {0}")]
    BadAddress(String),

    #[error("insufficient funds: have {have}, need {need}")]
    InsufficientFunds { have: Nicks, need: Nicks },

    #[error("no known spend condition matches note {0}")]
    SpendConditionMismatch(Digest),

    #[error("amount must be greater than zero")]
    InvalidAmount,

    #[error("invalid fee")]
    InvalidFee,

    #[error("signing failed: {0}")]
    SigningFailed(String),

    #[error("input selection raced with a concurrent send")]
    SelectionRaced,

    #[error("key derivation failed: {0}")]
    Derivation(String),

    // ── Codec / environment ──────────────────────────────────────────────────
    #[error("invalid encoding: {0}")]
    InvalidEncoding(String),

    #[error("rpc error: {0}")]
    Rpc(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl WalletError {
    /// Stable error code string exposed at the engine boundary.
    pub fn code(&self) -> &'static str {
        match self {
            WalletError::Locked => "LOCKED",
            WalletError::NoVault => "NO_VAULT",
            WalletError::VaultExists => "INVALID_PARAMS",
            WalletError::BadPassword => "BAD_PASSWORD",
            WalletError::InvalidMnemonic => "INVALID_MNEMONIC",
            WalletError::InvalidAccountIndex(_) => "INVALID_ACCOUNT_INDEX",
            WalletError::MethodNotSupported(_) => "METHOD_NOT_SUPPORTED",
            WalletError::Unauthorized => "UNAUTHORIZED",
            WalletError::NotFound(_) => "NOT_FOUND",
            WalletError::InvalidParams(_) => "INVALID_PARAMS",
            WalletError::RequestExpired => "REQUEST_EXPIRED",
            WalletError::UserRejected => "USER_REJECTED",
            WalletError::BadAddress(_) => "BAD_ADDRESS",
            WalletError::InsufficientFunds { .. } => "INSUFFICIENT_FUNDS",
            WalletError::SpendConditionMismatch(_) => "SPEND_CONDITION_MISMATCH",
            WalletError::InvalidAmount => "INVALID_PARAMS",
            WalletError::InvalidFee => "INVALID_PARAMS",
            WalletError::SigningFailed(_) => "SIGNING_FAILED",
            WalletError::SelectionRaced => "INVALID_PARAMS",
            WalletError::Derivation(_) => "SIGNING_FAILED",
            WalletError::InvalidEncoding(_) => "BAD_ADDRESS",
            WalletError::Rpc(_) => "RPC_ERROR",
            WalletError::Storage(_) => "STORAGE_ERROR",
            WalletError::Serialization(_) => "STORAGE_ERROR",
        }
    }
}
