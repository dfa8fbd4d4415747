//! nockwallet-store
//!
//! The persisted local view of the chain, per account: stored notes with
//! their availability state, the wallet-transaction lifecycle, the sync
//! diff that reconciles the local view against a chain snapshot, and the
//! send pipeline that locks inputs, builds, signs and broadcasts.

pub mod diff;
pub mod send;
pub mod store;
pub mod sync;

pub use diff::{diff_utxos, DiffResult, FetchedUtxo};
pub use send::{estimate_fee, estimate_max_send, send_transaction, SendOutcome, SendRequest};
pub use store::{AccountBook, NoteState, StoredNote, UtxoStore, WalletTransaction, WalletTxStatus};
pub use sync::{sync_account, SyncOutcome};
