//! nockwallet-rpc
//!
//! The engine-facing node contract: a small set of RPCs for querying the
//! chain's UTXO set by first-name or account, broadcasting a signed
//! transaction, and liveness checks. `HttpNodeClient` speaks JSON-RPC 2.0
//! over HTTP; `mock::MockNode` is the scriptable in-memory double the test
//! suites drive.

pub mod client;
pub mod mock;

use nockwallet_core::note::Note;
use nockwallet_core::types::Digest;
use nockwallet_core::WalletError;

/// The node RPC surface the engine depends on. Transport is pluggable; the
/// engine only assumes these four calls.
#[allow(async_fn_in_trait)]
pub trait NodeRpc {
    /// Notes spendable under the lock committed to by `first_name`.
    async fn query_utxos_by_first_name(&self, first_name: Digest)
        -> Result<Vec<Note>, WalletError>;

    /// Notes for an account: the union of the simple and coinbase
    /// first-names derived from `pkh`.
    async fn query_utxos_by_pkh(&self, pkh: Digest) -> Result<Vec<Note>, WalletError>;

    /// Submit a signed transaction jam. Returns the chain-side tx digest.
    async fn broadcast(&self, raw_tx_jam: &[u8]) -> Result<Digest, WalletError>;

    /// Liveness ping for the connection-status indicator.
    async fn health_check(&self) -> Result<(), WalletError>;
}

pub use client::HttpNodeClient;
