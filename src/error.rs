use thiserror::Error;

use crate::store::{MailId, MailState};

/// Errors raised by a [`MailStore`](crate::MailStore).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("mail store lock poisoned during {0}")]
    LockPoisoned(&'static str),

    /// The record was never persisted, so there is nothing to update.
    #[error("invalid record state: {0}")]
    InvalidState(String),

    #[error("mail {0} not found")]
    NotFound(MailId),

    /// The caller's claim is stale: someone reclaimed and re-claimed the record since.
    #[error("concurrent write detected for mail {id} (expected attempt {expected}, got {actual})")]
    ConcurrentWrite {
        id: MailId,
        expected: u32,
        actual: u32,
    },

    /// The record already left the claimed state, so this outcome comes too late.
    #[error("mail {id} is {state}, not claimed")]
    NotClaimed { id: MailId, state: MailState },

    #[error("snapshot error: {0}")]
    Snapshot(String),
}

impl StoreError {
    /// Errors a dispatcher can step over: the record moved on without us.
    pub fn is_benign(&self) -> bool {
        matches!(
            self,
            StoreError::NotFound(_)
                | StoreError::ConcurrentWrite { .. }
                | StoreError::NotClaimed { .. }
        )
    }
}
