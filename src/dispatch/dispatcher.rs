use std::time::Duration;

use thiserror::Error;
use tracing::{debug, error, info, trace, warn};

use super::backoff::BackoffTrigger;
use crate::error::StoreError;
use crate::mail::{EncodingError, Envelope};
use crate::store::{MailId, MailRecord, MailStore};
use crate::transport::{Transport, TransportError};

/// A tick could not finish because the store failed underneath it.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// What one tick did.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    /// Ids listed as pending when the tick started.
    pub pending: usize,
    pub claimed: usize,
    pub sent: usize,
    /// Mails given up on for good.
    pub failed: usize,
    /// Mails put back to pending after a transport-health failure.
    pub deferred: usize,
    /// Ids another dispatcher claimed (or the store dropped) first.
    pub skipped: usize,
    /// Stale claims returned to pending before the tick started.
    pub reclaimed: usize,
    /// The tick stopped early because the transport is unhealthy.
    pub halted: bool,
}

enum Outcome {
    Sent,
    Unreadable(EncodingError),
    Refused(TransportError),
}

/// Claims pending mails one by one, sends them and records the outcome.
///
/// The backoff trigger is passed into every tick rather than owned here, so
/// whoever schedules ticks also owns the delay between them.
pub struct Dispatcher<S, T> {
    store: S,
    transport: T,
    send_timeout: Duration,
    claim_timeout: Option<Duration>,
}

impl<S, T> Dispatcher<S, T> {
    pub fn new(store: S, transport: T) -> Self {
        Self {
            store,
            transport,
            send_timeout: Duration::from_secs(30),
            claim_timeout: None,
        }
    }

    /// Time budget handed to every transport call.
    pub fn with_send_timeout(mut self, timeout: Duration) -> Self {
        self.send_timeout = timeout;
        self
    }

    /// Return mails stuck in claimed for longer than `timeout` to pending at
    /// the start of each tick. Off by default: a claim only looks stuck after
    /// its owner crashed, and reclaiming a slow but live send sends it twice.
    pub fn with_claim_timeout(mut self, timeout: Duration) -> Self {
        self.claim_timeout = Some(timeout);
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn send_timeout(&self) -> Duration {
        self.send_timeout
    }

    pub fn claim_timeout(&self) -> Option<Duration> {
        self.claim_timeout
    }
}

impl<S: MailStore, T: Transport> Dispatcher<S, T> {
    /// Run one dispatch tick.
    ///
    /// Mails are handled in the order the store lists them. A successful send
    /// resets `trigger`; an authentication or connectivity failure puts the
    /// mail back to pending, backs `trigger` off and ends the tick, leaving
    /// the remaining mails untouched.
    pub fn run_once(&self, trigger: &mut BackoffTrigger) -> Result<TickReport, DispatchError> {
        trace!("Start mail shipping");
        let mut report = TickReport::default();

        if let Some(timeout) = self.claim_timeout {
            let reclaimed = self.store.reclaim_stale(timeout)?;
            for id in &reclaimed {
                warn!(mail_id = %id, claim_timeout = ?timeout, "Reclaimed mail stuck in claimed state");
            }
            report.reclaimed = reclaimed.len();
        }

        let ids = self.store.list_pending_ids()?;
        report.pending = ids.len();
        if ids.is_empty() {
            trace!("No mails to ship");
            return Ok(report);
        }
        debug!(count = ids.len(), "Sending mails");

        for id in ids {
            let Some(mut record) = self.store.claim(&id)? else {
                debug!(mail_id = %id, "Mail is no longer pending, skipping it");
                report.skipped += 1;
                continue;
            };
            report.claimed += 1;

            match self.deliver(&record) {
                Outcome::Sent => {
                    record.mark_sent();
                    trigger.reset();
                    info!(mail_id = %id, attempts = record.attempts(), "Mail sent");
                    self.finalize(&id, &record)?;
                    report.sent += 1;
                }
                Outcome::Unreadable(err) => {
                    warn!(mail_id = %id, error = %err, "Stored message is unreadable, mail cannot be sent");
                    record.fail(err.to_string());
                    self.finalize(&id, &record)?;
                    report.failed += 1;
                }
                Outcome::Refused(err) if err.is_transport_health() => {
                    error!(
                        mail_id = %id,
                        error = %err,
                        "Transport is unhealthy, trying this and the remaining mails again later"
                    );
                    record.retry_later(err.message());
                    self.finalize(&id, &record)?;
                    trigger.increase();
                    report.deferred += 1;
                    report.halted = true;
                    break;
                }
                Outcome::Refused(err) => {
                    warn!(mail_id = %id, error = %err, "Mail was rejected and is thrown away");
                    record.fail(err.message());
                    self.finalize(&id, &record)?;
                    report.failed += 1;
                }
            }
        }

        trace!(
            sent = report.sent,
            failed = report.failed,
            deferred = report.deferred,
            next_delay = ?trigger.current_delay(),
            "Finished mail shipping"
        );
        Ok(report)
    }

    fn deliver(&self, record: &MailRecord) -> Outcome {
        let envelope = match Envelope::from_payload(record.payload()) {
            Ok(envelope) => envelope,
            Err(err) => return Outcome::Unreadable(err),
        };
        match self
            .transport
            .send(&envelope, record.payload(), self.send_timeout)
        {
            Ok(()) => Outcome::Sent,
            Err(err) => Outcome::Refused(err),
        }
    }

    /// Persist the final state. A record that was deleted, re-claimed or
    /// already finished in the meantime is left alone; anything else is fatal.
    fn finalize(&self, id: &MailId, record: &MailRecord) -> Result<(), DispatchError> {
        match self.store.update(record) {
            Ok(()) => Ok(()),
            Err(err) if err.is_benign() => {
                warn!(mail_id = %id, error = %err, state = %record.state(), "Could not record mail outcome");
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }
}
