//! nockwallet-api
//!
//! The engine surface the extension shell drives: a tagged-variant request
//! type with exhaustive handling, the approval queue with replay-protected
//! expiry, the connection-health tracker, and the `WalletEngine` facade
//! that ties vault, store and node RPC together behind one explicit
//! handle.

pub mod approvals;
pub mod engine;
pub mod health;
pub mod request;

pub use approvals::{ApprovalAction, ApprovalId, ApprovalQueue};
pub use engine::WalletEngine;
pub use health::{ConnectionHealth, ConnectionState};
pub use request::WalletRequest;
