use thiserror::Error;
use tracing::debug;

use crate::error::StoreError;
use crate::mail::{EncodingError, Letter, MailAddress, MailBody, MessageBuilder, MimeMessageBuilder};
use crate::store::{MailRecord, MailStore};

/// Posting a mail failed before it was stored.
#[derive(Debug, Error)]
pub enum PostError {
    #[error(transparent)]
    Encoding(#[from] EncodingError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Entry point for callers: encode a mail and store it for later dispatch.
///
/// Nothing is sent here. The returned record is pending; its final state shows
/// up in the store once a dispatcher has handled it.
pub struct PostOffice<S, B = MimeMessageBuilder> {
    store: S,
    builder: B,
}

impl<S: MailStore> PostOffice<S> {
    pub fn new(store: S) -> Self {
        Self::with_builder(store, MimeMessageBuilder::new())
    }
}

impl<S: MailStore, B: MessageBuilder> PostOffice<S, B> {
    pub fn with_builder(store: S, builder: B) -> Self {
        Self { store, builder }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Encode and store a letter.
    pub fn post(&self, letter: &Letter) -> Result<MailRecord, PostError> {
        let payload = self.builder.encode(letter)?;
        self.post_encoded(payload)
    }

    /// Parse addresses from plain strings, then encode and store.
    pub fn post_mail(
        &self,
        subject: &str,
        from: &str,
        to: &[&str],
        body: MailBody,
    ) -> Result<MailRecord, PostError> {
        let from = MailAddress::parse(from)?;
        let to = to
            .iter()
            .map(|address| MailAddress::parse(address))
            .collect::<Result<Vec<_>, _>>()?;
        self.post(&Letter::new(subject, from, to, body))
    }

    /// Store an already encoded message as is.
    pub fn post_encoded(&self, payload: Vec<u8>) -> Result<MailRecord, PostError> {
        let record = self.store.create(payload)?;
        if let Some(id) = record.id() {
            debug!(mail_id = %id, bytes = record.payload().len(), "Mail posted");
        }
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryMailStore;

    #[test]
    fn post_stores_pending_record() {
        let post_office = PostOffice::new(InMemoryMailStore::new());
        let record = post_office
            .post_mail(
                "Welcome",
                "Example <noreply@example.com>",
                &["jane@example.com"],
                MailBody::Text("Hello".into()),
            )
            .unwrap();

        assert!(record.is_pending());
        let id = record.id().unwrap();
        assert_eq!(post_office.store().list_pending_ids().unwrap(), vec![id.clone()]);
    }

    #[test]
    fn invalid_address_is_not_stored() {
        let post_office = PostOffice::new(InMemoryMailStore::new());
        let result = post_office.post_mail(
            "Welcome",
            "noreply@example.com",
            &["not an address"],
            MailBody::Text("Hello".into()),
        );

        assert!(matches!(
            result,
            Err(PostError::Encoding(EncodingError::InvalidAddress(_)))
        ));
        assert!(post_office.store().is_empty().unwrap());
    }

    #[test]
    fn missing_recipients_is_not_stored() {
        let post_office = PostOffice::new(InMemoryMailStore::new());
        let result = post_office.post_mail("Hi", "a@example.com", &[], MailBody::Html("<p>x</p>".into()));
        assert!(matches!(result, Err(PostError::Encoding(EncodingError::NoRecipients))));
        assert!(post_office.store().is_empty().unwrap());
    }

    #[test]
    fn encoded_payload_is_stored_verbatim() {
        let post_office = PostOffice::new(InMemoryMailStore::new());
        let record = post_office.post_encoded(b"Email Content".to_vec()).unwrap();
        assert_eq!(record.payload(), b"Email Content");
    }
}
