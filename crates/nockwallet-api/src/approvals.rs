//! Pending approvals.
//!
//! Provider-originated actions wait here until the user decides. Every
//! ticket carries its creation timestamp; completing one after the
//! expiration window is rejected outright, which is what stops a stale
//! approval from being replayed against the engine.

use std::collections::HashMap;

use nockwallet_core::constants::REQUEST_EXPIRATION_MS;
use nockwallet_core::types::Nicks;
use nockwallet_core::WalletError;

pub type ApprovalId = u64;

/// The action a ticket will perform once approved.
#[derive(Clone, Debug, PartialEq)]
pub enum ApprovalAction {
    ConnectOrigin { origin: String },
    Send { to: String, amount: Nicks, fee: Option<Nicks>, send_max: bool, origin: String },
    SignMessage { message: String, origin: String },
}

#[derive(Clone, Debug)]
struct PendingApproval {
    action: ApprovalAction,
    created_at_ms: i64,
}

#[derive(Default)]
pub struct ApprovalQueue {
    next_id: ApprovalId,
    pending: HashMap<ApprovalId, PendingApproval>,
}

impl ApprovalQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&mut self, action: ApprovalAction, now_ms: i64) -> ApprovalId {
        self.next_id += 1;
        let id = self.next_id;
        self.pending.insert(id, PendingApproval { action, created_at_ms: now_ms });
        id
    }

    /// Consume a ticket for approval. A ticket whose timestamp is
    /// `REQUEST_EXPIRATION_MS` or more in the past is rejected; the ticket
    /// is consumed either way, so it cannot be retried.
    pub fn take_for_approval(
        &mut self,
        id: ApprovalId,
        now_ms: i64,
    ) -> Result<ApprovalAction, WalletError> {
        let pending = self
            .pending
            .remove(&id)
            .ok_or_else(|| WalletError::NotFound(format!("approval {id}")))?;
        if now_ms - pending.created_at_ms >= REQUEST_EXPIRATION_MS {
            return Err(WalletError::RequestExpired);
        }
        Ok(pending.action)
    }

    /// Consume a ticket for rejection.
    pub fn take_for_rejection(&mut self, id: ApprovalId) -> Result<ApprovalAction, WalletError> {
        self.pending
            .remove(&id)
            .map(|p| p.action)
            .ok_or_else(|| WalletError::NotFound(format!("approval {id}")))
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}
