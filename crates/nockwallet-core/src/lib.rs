//! nockwallet-core
//!
//! Fundamental types for the Nockchain wallet engine: 40-byte TIP5 digests,
//! nick amounts, the noun structural codec (jam/cue), TIP5 noun hashing,
//! lock primitives and spend conditions, notes and their names, protocol
//! constants, and the stable error vocabulary shared by every crate above.

pub mod constants;
pub mod error;
pub mod hash;
pub mod lock;
pub mod note;
pub mod noun;
pub mod types;

pub use error::WalletError;
pub use hash::{first_name, hash_atom, hash_noun, hash_pair, tree_hash, NounHash};
pub use lock::{LockPrimitive, Pkh, SpendCondition, Timelock, TimelockRange};
pub use note::{Name, Note, NoteVersion};
pub use noun::{cue, jam, Noun, NounEncode};
pub use types::{BlockHeight, Digest, Nicks, WalletTxId};
