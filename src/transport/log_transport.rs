use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::info;

use super::{Transport, TransportError};
use crate::mail::Envelope;

/// A transport that only logs each mail, optionally into a shared buffer.
///
/// Handy for development setups and tests that want to see what would have
/// been sent.
#[derive(Clone, Default)]
pub struct LogTransport {
    buffer: Option<Arc<Mutex<Vec<String>>>>,
}

impl LogTransport {
    pub fn new() -> Self {
        LogTransport { buffer: None }
    }

    pub fn with_buffer(buffer: Arc<Mutex<Vec<String>>>) -> Self {
        LogTransport {
            buffer: Some(buffer),
        }
    }
}

impl Transport for LogTransport {
    fn send(
        &self,
        envelope: &Envelope,
        message: &[u8],
        _timeout: Duration,
    ) -> Result<(), TransportError> {
        let recipients = envelope
            .recipients
            .iter()
            .map(|r| r.address())
            .collect::<Vec<_>>()
            .join(", ");
        info!(
            from = %envelope.sender.address(),
            to = %recipients,
            bytes = message.len(),
            "Mail delivered to log"
        );

        if let Some(buffer) = &self.buffer {
            let mut buffer = buffer
                .lock()
                .map_err(|_| TransportError::Connectivity("log buffer poisoned".into()))?;
            buffer.push(format!(
                "[MAIL] {} -> {}\n{}",
                envelope.sender.address(),
                recipients,
                String::from_utf8_lossy(message)
            ));
        }
        Ok(())
    }
}
