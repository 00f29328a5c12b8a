use std::fmt;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque identifier of a stored mail.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MailId(String);

impl MailId {
    /// Generate a fresh random identifier.
    pub fn generate() -> Self {
        MailId(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MailId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for MailId {
    fn from(id: String) -> Self {
        MailId(id)
    }
}

impl From<&str> for MailId {
    fn from(id: &str) -> Self {
        MailId(id.to_string())
    }
}

/// Processing state of a stored mail.
///
/// A mail that failed for a transient reason goes back to `Pending` and keeps
/// its `last_error`, so retryable failures look like plain pending mail.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MailState {
    #[default]
    Pending,
    Claimed,
    Failed,
    Sent,
}

impl MailState {
    /// `Sent` and `Failed` are final; nothing claims such a record again.
    pub fn is_terminal(self) -> bool {
        matches!(self, MailState::Sent | MailState::Failed)
    }
}

impl fmt::Display for MailState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MailState::Pending => "pending",
            MailState::Claimed => "claimed",
            MailState::Failed => "failed",
            MailState::Sent => "sent",
        };
        f.write_str(name)
    }
}

/// A mail persisted for asynchronous delivery.
///
/// The payload is fixed at construction. State only moves along
/// `Pending -> Claimed -> {Sent | Failed | Pending}`; each transition method
/// returns `false` and leaves the record untouched when it does not apply.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailRecord {
    id: Option<MailId>,
    created_at: SystemTime,
    last_modified_at: SystemTime,
    payload: Vec<u8>,
    state: MailState,
    last_error: Option<String>,
    attempts: u32,
    claimed_at: Option<SystemTime>,
}

impl MailRecord {
    /// A new, not yet persisted record. Stores assign the identifier on create.
    pub fn new(payload: Vec<u8>) -> Self {
        let now = SystemTime::now();
        Self {
            id: None,
            created_at: now,
            last_modified_at: now,
            payload,
            state: MailState::Pending,
            last_error: None,
            attempts: 0,
            claimed_at: None,
        }
    }

    /// Attach the identifier a store assigned to this record.
    pub fn with_id(mut self, id: MailId) -> Self {
        self.id = Some(id);
        self
    }

    // Getters
    pub fn id(&self) -> Option<&MailId> {
        self.id.as_ref()
    }

    pub fn created_at(&self) -> SystemTime {
        self.created_at
    }

    pub fn last_modified_at(&self) -> SystemTime {
        self.last_modified_at
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn state(&self) -> MailState {
        self.state
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Number of times this record has been claimed.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn claimed_at(&self) -> Option<SystemTime> {
        self.claimed_at
    }

    pub fn is_pending(&self) -> bool {
        self.state == MailState::Pending
    }

    pub fn is_claimed(&self) -> bool {
        self.state == MailState::Claimed
    }

    pub fn is_sent(&self) -> bool {
        self.state == MailState::Sent
    }

    pub fn is_failed(&self) -> bool {
        self.state == MailState::Failed
    }

    // Transitions

    /// `Pending -> Claimed`. Stores call this inside their atomic claim.
    pub fn claim(&mut self, now: SystemTime) -> bool {
        if !self.is_pending() {
            return false;
        }
        self.state = MailState::Claimed;
        self.attempts += 1;
        self.claimed_at = Some(now);
        self.touch(now);
        true
    }

    /// `Claimed -> Sent`, clearing any earlier error.
    pub fn mark_sent(&mut self) -> bool {
        if !self.is_claimed() {
            return false;
        }
        self.state = MailState::Sent;
        self.last_error = None;
        self.claimed_at = None;
        self.touch(SystemTime::now());
        true
    }

    /// `Claimed -> Pending`: try again on a later tick.
    pub fn retry_later(&mut self, error: impl Into<String>) -> bool {
        if !self.is_claimed() {
            return false;
        }
        self.state = MailState::Pending;
        self.last_error = non_empty(error.into());
        self.claimed_at = None;
        self.touch(SystemTime::now());
        true
    }

    /// `Claimed -> Failed`: the mail will never be sent.
    pub fn fail(&mut self, error: impl Into<String>) -> bool {
        if !self.is_claimed() {
            return false;
        }
        self.state = MailState::Failed;
        self.last_error = non_empty(error.into());
        self.claimed_at = None;
        self.touch(SystemTime::now());
        true
    }

    fn touch(&mut self, now: SystemTime) {
        self.last_modified_at = now;
    }
}

fn non_empty(error: String) -> Option<String> {
    if error.is_empty() {
        None
    } else {
        Some(error)
    }
}
