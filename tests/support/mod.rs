//! Shared helpers for the integration tests.

#![allow(dead_code)]

pub mod scripted_transport;

use postbox::{Letter, MailAddress, MailBody, MailId, MailStore, MessageBuilder, MimeMessageBuilder};

/// Install a test subscriber once; `RUST_LOG` controls the output.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A well-formed payload whose subject identifies it.
pub fn payload(subject: &str) -> Vec<u8> {
    let letter = Letter::new(
        subject,
        MailAddress::of("noreply@example.com").unwrap(),
        vec![MailAddress::of("jane@example.com").unwrap()],
        MailBody::Text(format!("body of {}", subject)),
    );
    MimeMessageBuilder::new().encode(&letter).unwrap()
}

/// Store a payload and return its id.
pub fn create<S: MailStore>(store: &S, subject: &str) -> MailId {
    store.create(payload(subject)).unwrap().id().cloned().unwrap()
}
