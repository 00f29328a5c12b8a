use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{channel, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tracing::warn;

use super::{Transport, TransportError};
use crate::mail::Envelope;

const DEFAULT_MAX_RUNNING: usize = 4;

/// Enforces the send timeout for transports that cannot bound themselves.
///
/// Each send runs on a helper thread; the caller waits at most `timeout` and
/// then reports a connectivity failure. A send that overran is abandoned, not
/// interrupted, so the mail may still go out after the dispatcher has put it
/// back to pending.
///
/// Abandoned helper threads keep running until the inner transport returns.
/// At most `max_running` helpers (default 4) exist at once; while that many
/// are still busy, new sends fail with a connectivity error instead of
/// starting another thread.
pub struct BoundedTransport<T> {
    inner: Arc<T>,
    running: Arc<AtomicUsize>,
    max_running: usize,
}

impl<T> BoundedTransport<T> {
    pub fn new(inner: T) -> Self {
        Self {
            inner: Arc::new(inner),
            running: Arc::new(AtomicUsize::new(0)),
            max_running: DEFAULT_MAX_RUNNING,
        }
    }

    /// Limit on helper threads alive at the same time, including abandoned ones.
    pub fn with_max_running(mut self, max_running: usize) -> Self {
        self.max_running = max_running.max(1);
        self
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }

    /// Helper threads currently alive.
    pub fn running(&self) -> usize {
        self.running.load(Ordering::SeqCst)
    }

    /// Reserve a helper slot, or `None` when all are taken.
    fn acquire(&self) -> Option<RunningGuard> {
        self.running
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                (n < self.max_running).then_some(n + 1)
            })
            .ok()
            .map(|_| RunningGuard(Arc::clone(&self.running)))
    }
}

impl<T> Clone for BoundedTransport<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            running: Arc::clone(&self.running),
            max_running: self.max_running,
        }
    }
}

/// Releases a helper slot when the helper thread ends, panics included.
struct RunningGuard(Arc<AtomicUsize>);

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl<T: Transport + 'static> Transport for BoundedTransport<T> {
    fn send(
        &self,
        envelope: &Envelope,
        message: &[u8],
        timeout: Duration,
    ) -> Result<(), TransportError> {
        let Some(guard) = self.acquire() else {
            warn!(max_running = self.max_running, "Earlier sends are still hanging, not starting another");
            return Err(TransportError::Connectivity(format!(
                "{} earlier sends are still running",
                self.max_running
            )));
        };

        let (result_tx, result_rx) = channel();
        let inner = Arc::clone(&self.inner);
        let envelope = envelope.clone();
        let message = message.to_vec();

        thread::Builder::new()
            .name("postbox-send".into())
            .spawn(move || {
                let _guard = guard;
                // receiver is gone when the caller already timed out
                let _ = result_tx.send(inner.send(&envelope, &message, timeout));
            })
            .map_err(|e| TransportError::Connectivity(format!("could not start send: {}", e)))?;

        match result_rx.recv_timeout(timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => {
                warn!(timeout = ?timeout, "Send overran its timeout, abandoning it");
                Err(TransportError::timed_out(timeout))
            }
            Err(RecvTimeoutError::Disconnected) => Err(TransportError::Connectivity(
                "send aborted before reporting a result".into(),
            )),
        }
    }
}
