use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::{Arc, RwLock, RwLockWriteGuard};
use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::StoreError;

use super::record::{MailId, MailRecord};
use super::store::MailStore;

/// In-memory mail store backed by `Arc<RwLock<HashMap>>`.
///
/// Clone-friendly (cloning shares the same underlying table), so several
/// dispatchers can be pointed at one store to model independent processes.
/// Every operation runs under the write lock, which is what makes `claim`
/// atomic. Records older than the retention window are dropped on access,
/// whatever their state.
#[derive(Clone)]
pub struct InMemoryMailStore {
    table: Arc<RwLock<Table>>,
    retention: Option<Duration>,
}

#[derive(Default, Serialize, Deserialize)]
struct Table {
    next_seq: u64,
    rows: HashMap<MailId, Row>,
}

#[derive(Serialize, Deserialize)]
struct Row {
    seq: u64,
    record: MailRecord,
}

impl Default for InMemoryMailStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryMailStore {
    /// A store that keeps records forever.
    pub fn new() -> Self {
        Self {
            table: Arc::new(RwLock::new(Table::default())),
            retention: None,
        }
    }

    /// Drop records once they are older than `retention`.
    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = Some(retention);
        self
    }

    pub fn retention(&self) -> Option<Duration> {
        self.retention
    }

    /// Number of records currently held, in any state.
    pub fn len(&self) -> Result<usize, StoreError> {
        let table = self.write("len")?;
        Ok(table.rows.len())
    }

    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len()? == 0)
    }

    /// Remove every record past the retention window. Returns how many went.
    pub fn purge_expired(&self) -> Result<usize, StoreError> {
        let mut table = self
            .table
            .write()
            .map_err(|_| StoreError::LockPoisoned("purge"))?;
        Ok(self.purge(&mut table))
    }

    /// Write the whole table to `path` in bitcode format.
    pub fn save_snapshot(&self, path: impl AsRef<Path>) -> Result<(), StoreError> {
        let table = self.write("snapshot save")?;
        let bytes = bitcode::serialize(&*table).map_err(|e| StoreError::Snapshot(e.to_string()))?;
        fs::write(path, bytes).map_err(|e| StoreError::Snapshot(e.to_string()))
    }

    /// Rebuild a store from a file written by [`save_snapshot`](Self::save_snapshot).
    pub fn load_snapshot(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let bytes = fs::read(path).map_err(|e| StoreError::Snapshot(e.to_string()))?;
        let table: Table =
            bitcode::deserialize(&bytes).map_err(|e| StoreError::Snapshot(e.to_string()))?;
        Ok(Self {
            table: Arc::new(RwLock::new(table)),
            retention: None,
        })
    }

    /// Take the write lock and purge expired records before handing it out.
    fn write(&self, operation: &'static str) -> Result<RwLockWriteGuard<'_, Table>, StoreError> {
        let mut table = self
            .table
            .write()
            .map_err(|_| StoreError::LockPoisoned(operation))?;
        self.purge(&mut table);
        Ok(table)
    }

    fn purge(&self, table: &mut Table) -> usize {
        let Some(retention) = self.retention else {
            return 0;
        };
        let now = SystemTime::now();
        let before = table.rows.len();
        table
            .rows
            .retain(|_, row| !is_older_than(row.record.created_at(), retention, now));
        let purged = before - table.rows.len();
        if purged > 0 {
            debug!(purged, "Purged expired mails");
        }
        purged
    }
}

impl MailStore for InMemoryMailStore {
    fn create(&self, payload: Vec<u8>) -> Result<MailRecord, StoreError> {
        let mut table = self.write("create")?;
        let id = MailId::generate();
        let record = MailRecord::new(payload).with_id(id.clone());

        let seq = table.next_seq;
        table.next_seq += 1;
        table.rows.insert(
            id,
            Row {
                seq,
                record: record.clone(),
            },
        );
        Ok(record)
    }

    fn list_pending_ids(&self) -> Result<Vec<MailId>, StoreError> {
        let table = self.write("list pending")?;
        let mut pending: Vec<(u64, MailId)> = table
            .rows
            .iter()
            .filter(|(_, row)| row.record.is_pending())
            .map(|(id, row)| (row.seq, id.clone()))
            .collect();
        pending.sort_by_key(|(seq, _)| *seq);
        Ok(pending.into_iter().map(|(_, id)| id).collect())
    }

    fn claim(&self, id: &MailId) -> Result<Option<MailRecord>, StoreError> {
        let mut table = self.write("claim")?;
        match table.rows.get_mut(id) {
            Some(row) => {
                if row.record.claim(SystemTime::now()) {
                    Ok(Some(row.record.clone()))
                } else {
                    Ok(None)
                }
            }
            None => Ok(None),
        }
    }

    fn update(&self, record: &MailRecord) -> Result<(), StoreError> {
        let id = record.id().ok_or_else(|| {
            StoreError::InvalidState("cannot update mail because it is not persisted yet".into())
        })?;

        let mut table = self.write("update")?;
        let row = table
            .rows
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;

        if row.record.attempts() != record.attempts() {
            return Err(StoreError::ConcurrentWrite {
                id: id.clone(),
                expected: record.attempts(),
                actual: row.record.attempts(),
            });
        }
        if !row.record.is_claimed() {
            return Err(StoreError::NotClaimed {
                id: id.clone(),
                state: row.record.state(),
            });
        }
        if row.record.payload() != record.payload() {
            return Err(StoreError::InvalidState(format!(
                "payload of mail {} cannot change after creation",
                id
            )));
        }

        row.record = record.clone();
        Ok(())
    }

    fn delete(&self, id: &MailId) -> Result<bool, StoreError> {
        let mut table = self.write("delete")?;
        Ok(table.rows.remove(id).is_some())
    }

    fn get(&self, id: &MailId) -> Result<Option<MailRecord>, StoreError> {
        let table = self
            .table
            .read()
            .map_err(|_| StoreError::LockPoisoned("get"))?;
        let now = SystemTime::now();
        Ok(table
            .rows
            .get(id)
            .filter(|row| match self.retention {
                Some(retention) => !is_older_than(row.record.created_at(), retention, now),
                None => true,
            })
            .map(|row| row.record.clone()))
    }

    fn reclaim_stale(&self, older_than: Duration) -> Result<Vec<MailId>, StoreError> {
        let mut table = self.write("reclaim")?;
        let now = SystemTime::now();

        let mut reclaimed: Vec<(u64, MailId)> = Vec::new();
        for (id, row) in table.rows.iter_mut() {
            let stale = row
                .record
                .claimed_at()
                .is_some_and(|at| is_older_than(at, older_than, now));
            if stale && row.record.retry_later("claim expired") {
                reclaimed.push((row.seq, id.clone()));
            }
        }
        reclaimed.sort_by_key(|(seq, _)| *seq);
        Ok(reclaimed.into_iter().map(|(_, id)| id).collect())
    }
}

fn is_older_than(at: SystemTime, age: Duration, now: SystemTime) -> bool {
    now.duration_since(at).map(|elapsed| elapsed >= age).unwrap_or(false)
}
