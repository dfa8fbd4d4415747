//! nockwallet-engine
//!
//! Builds, signs and validates Nockchain transactions: spend-condition
//! discovery for owned notes, seed (output) construction with change,
//! fee sizing from the canonical noun encoding, and whole-transaction
//! validation against sum conservation, commitments, signatures and
//! timelocks.

pub mod builder;
pub mod discovery;
pub mod fee;

pub use builder::{RawTx, Seed, TxBuilder, TxInput, UnsignedTx};
pub use discovery::{coinbase_first_name, discover_spend_condition, simple_first_name};
pub use fee::fee_for_words;
