//! Durable outbox for outbound mail.
//!
//! Callers post a mail through a [`PostOffice`], which encodes it and stores
//! it as pending. A [`Dispatcher`], usually driven by a [`DispatcherThread`],
//! later claims each pending mail, hands it to a [`Transport`] and records
//! whether it was sent, failed for good, or should be retried once the
//! transport is healthy again.

mod config;
mod dispatch;
mod error;
mod mail;
mod post_office;
mod store;
mod transport;

pub use config::{ConfigError, PostboxConfig};
pub use dispatch::{
    BackoffTrigger, DispatchError, DispatchStats, Dispatcher, DispatcherThread, TickReport,
};
pub use error::StoreError;
pub use mail::{
    EncodingError, Envelope, Letter, MailAddress, MailBody, MessageBuilder, MimeMessageBuilder,
};
pub use post_office::{PostError, PostOffice};
pub use store::{InMemoryMailStore, MailId, MailRecord, MailState, MailStore};
pub use transport::{BoundedTransport, LogTransport, Transport, TransportError};
