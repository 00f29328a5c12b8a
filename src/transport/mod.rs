//! Transports hand a stored payload to the outside world.
//!
//! A transport classifies its own failures into the three kinds the
//! dispatcher knows how to react to. Authentication and connectivity
//! failures say the transport itself is unhealthy; a rejection concerns one
//! mail only.

mod bounded;
mod log_transport;

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::mail::Envelope;

pub use bounded::BoundedTransport;
pub use log_transport::LogTransport;

/// Why a transport could not deliver a mail.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Credentials were refused. Every other send would fail the same way.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// The remote end could not be reached or did not answer in time.
    #[error("connection failed: {0}")]
    Connectivity(String),

    /// The remote end refused this particular mail.
    #[error("mail rejected: {0}")]
    Rejection(String),
}

impl TransportError {
    /// The error a send reports when it overran its time budget.
    pub fn timed_out(after: Duration) -> Self {
        TransportError::Connectivity(format!("send timed out after {:?}", after))
    }

    /// The failure description without the kind prefix.
    pub fn message(&self) -> &str {
        match self {
            TransportError::Authentication(message)
            | TransportError::Connectivity(message)
            | TransportError::Rejection(message) => message,
        }
    }

    /// True for failures that will hit every mail until the transport recovers.
    pub fn is_transport_health(&self) -> bool {
        matches!(
            self,
            TransportError::Authentication(_) | TransportError::Connectivity(_)
        )
    }
}

/// Sends one encoded mail.
pub trait Transport: Send + Sync {
    /// Deliver `message` to the envelope's recipients, giving up after `timeout`.
    fn send(
        &self,
        envelope: &Envelope,
        message: &[u8],
        timeout: Duration,
    ) -> Result<(), TransportError>;
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn send(
        &self,
        envelope: &Envelope,
        message: &[u8],
        timeout: Duration,
    ) -> Result<(), TransportError> {
        (**self).send(envelope, message, timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn health_classification() {
        assert!(TransportError::Authentication("535".into()).is_transport_health());
        assert!(TransportError::Connectivity("refused".into()).is_transport_health());
        assert!(!TransportError::Rejection("550".into()).is_transport_health());
    }

    #[test]
    fn message_strips_kind() {
        let error = TransportError::Rejection("bad recipient".into());
        assert_eq!(error.message(), "bad recipient");
        assert_eq!(error.to_string(), "mail rejected: bad recipient");
    }

    #[test]
    fn timeout_is_connectivity() {
        let error = TransportError::timed_out(Duration::from_secs(30));
        assert!(matches!(error, TransportError::Connectivity(_)));
        assert!(error.message().contains("30s"));
    }
}
