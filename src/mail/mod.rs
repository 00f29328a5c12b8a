//! Building and reading the payload stored for each mail.
//!
//! - `MailAddress` - validated address with optional display name
//! - `Letter` / `MailBody` - what a caller wants to send
//! - `MessageBuilder` - turns a `Letter` into payload bytes (`MimeMessageBuilder` by default)
//! - `Envelope` - sender and recipients read back out of a payload before sending

mod address;
mod builder;
mod envelope;
mod header;

use thiserror::Error;

pub use address::MailAddress;
pub use builder::{Letter, MailBody, MessageBuilder, MimeMessageBuilder};
pub use envelope::Envelope;

/// A mail could not be turned into payload bytes, or payload bytes back into a mail.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodingError {
    #[error("invalid mail address: {0:?}")]
    InvalidAddress(String),

    #[error("mail has no recipients")]
    NoRecipients,

    #[error("line break in {0} header")]
    HeaderInjection(&'static str),

    #[error("malformed message: {0}")]
    MalformedPayload(String),
}
