//! Background thread that schedules dispatch ticks.
//!
//! One tick runs at a time. After each tick the thread records the completion
//! time, asks the trigger when the next tick is due and sleeps on the stop
//! channel until then.

use std::sync::mpsc::{channel, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{error, info};

use super::backoff::BackoffTrigger;
use super::dispatcher::{Dispatcher, TickReport};
use crate::store::MailStore;
use crate::transport::Transport;

/// Totals collected by a [`DispatcherThread`].
#[derive(Debug, Default, Clone)]
pub struct DispatchStats {
    pub ticks: usize,
    pub sent: usize,
    pub failed: usize,
    pub deferred: usize,
    pub skipped: usize,
    pub reclaimed: usize,
    /// Delay the trigger held when the thread stopped.
    pub final_delay: Duration,
}

impl DispatchStats {
    fn record(&mut self, report: &TickReport) {
        self.sent += report.sent;
        self.failed += report.failed;
        self.deferred += report.deferred;
        self.skipped += report.skipped;
        self.reclaimed += report.reclaimed;
    }
}

/// Runs a [`Dispatcher`] on its own thread, paced by a [`BackoffTrigger`].
///
/// ## Example
///
/// ```ignore
/// use postbox::{BackoffTrigger, Dispatcher, DispatcherThread, InMemoryMailStore, LogTransport};
///
/// let store = InMemoryMailStore::new();
/// let dispatcher = Dispatcher::new(store.clone(), LogTransport::new());
///
/// let worker = DispatcherThread::spawn(dispatcher, BackoffTrigger::default());
///
/// // ... post mails into `store` ...
///
/// let stats = worker.stop();
/// println!("Sent {} mails", stats.sent);
/// ```
pub struct DispatcherThread {
    stop_tx: Sender<()>,
    handle: Option<JoinHandle<DispatchStats>>,
}

impl DispatcherThread {
    /// Spawn the dispatch thread. The first tick runs one trigger delay from now.
    ///
    /// A store failure that stops a tick ends the thread; `stop` still
    /// returns what was collected up to then.
    pub fn spawn<S, T>(dispatcher: Dispatcher<S, T>, mut trigger: BackoffTrigger) -> Self
    where
        S: MailStore + 'static,
        T: Transport + 'static,
    {
        let (stop_tx, stop_rx) = channel();

        let handle = thread::spawn(move || {
            let mut stats = DispatchStats::default();
            let mut last_completion: Option<Instant> = None;

            loop {
                let now = Instant::now();
                let due = trigger.next_run_at(last_completion, now);

                match stop_rx.recv_timeout(due.saturating_duration_since(now)) {
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    Err(RecvTimeoutError::Timeout) => {}
                }

                stats.ticks += 1;
                let result = dispatcher.run_once(&mut trigger);
                last_completion = Some(Instant::now());

                match result {
                    Ok(report) => stats.record(&report),
                    Err(err) => {
                        error!(error = %err, "Mail dispatch stopped on a store failure");
                        break;
                    }
                }
            }

            stats.final_delay = trigger.current_delay();
            info!(ticks = stats.ticks, sent = stats.sent, "Mail dispatcher stopped");
            stats
        });

        Self {
            stop_tx,
            handle: Some(handle),
        }
    }

    /// Signal the thread to stop and wait for it to finish.
    /// Returns the collected statistics.
    pub fn stop(mut self) -> DispatchStats {
        let _ = self.stop_tx.send(());
        if let Some(handle) = self.handle.take() {
            handle.join().unwrap_or_default()
        } else {
            DispatchStats::default()
        }
    }

    /// Signal the thread to stop without waiting.
    pub fn signal_stop(&self) {
        let _ = self.stop_tx.send(());
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, JoinHandle::is_finished)
    }
}

impl Drop for DispatcherThread {
    fn drop(&mut self) {
        let _ = self.stop_tx.send(());
    }
}
