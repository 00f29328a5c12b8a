use std::sync::Arc;
use std::time::Duration;

use crate::error::StoreError;

use super::record::{MailId, MailRecord};

/// Durable table of mails awaiting delivery.
///
/// `claim` is the only way to take ownership of a record and must be atomic:
/// of any number of concurrent callers for the same pending id, exactly one
/// gets the record back. Processes sharing a store rely on this, not on
/// in-process locking, to avoid sending a mail twice.
pub trait MailStore: Send + Sync {
    /// Insert a new pending record and return it with its identifier assigned.
    fn create(&self, payload: Vec<u8>) -> Result<MailRecord, StoreError>;

    /// Snapshot of the ids currently pending, oldest first.
    fn list_pending_ids(&self) -> Result<Vec<MailId>, StoreError>;

    /// Atomically move a pending record to claimed.
    ///
    /// `Ok(None)` when the record is gone or no longer pending.
    fn claim(&self, id: &MailId) -> Result<Option<MailRecord>, StoreError>;

    /// Persist a record the caller already claimed.
    fn update(&self, record: &MailRecord) -> Result<(), StoreError>;

    /// Remove a record outright. Returns true if one existed.
    fn delete(&self, id: &MailId) -> Result<bool, StoreError>;

    /// Read a record without claiming it.
    fn get(&self, id: &MailId) -> Result<Option<MailRecord>, StoreError>;

    /// Return records claimed for longer than `older_than` to pending.
    fn reclaim_stale(&self, older_than: Duration) -> Result<Vec<MailId>, StoreError>;
}

impl<S: MailStore + ?Sized> MailStore for Arc<S> {
    fn create(&self, payload: Vec<u8>) -> Result<MailRecord, StoreError> {
        (**self).create(payload)
    }

    fn list_pending_ids(&self) -> Result<Vec<MailId>, StoreError> {
        (**self).list_pending_ids()
    }

    fn claim(&self, id: &MailId) -> Result<Option<MailRecord>, StoreError> {
        (**self).claim(id)
    }

    fn update(&self, record: &MailRecord) -> Result<(), StoreError> {
        (**self).update(record)
    }

    fn delete(&self, id: &MailId) -> Result<bool, StoreError> {
        (**self).delete(id)
    }

    fn get(&self, id: &MailId) -> Result<Option<MailRecord>, StoreError> {
        (**self).get(id)
    }

    fn reclaim_stale(&self, older_than: Duration) -> Result<Vec<MailId>, StoreError> {
        (**self).reclaim_stale(older_than)
    }
}
