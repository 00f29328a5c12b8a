use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::address::MailAddress;
use super::header::{base64_lines, encode_text, ensure_single_line};
use super::EncodingError;

/// Body of a mail and how it should be rendered.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MailBody {
    Text(String),
    Html(String),
    /// HTML with a plain-text alternative for clients that do not render HTML.
    HtmlWithText { html: String, text: String },
}

/// Everything a caller supplies to post a mail.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Letter {
    pub subject: String,
    pub from: MailAddress,
    pub to: Vec<MailAddress>,
    pub body: MailBody,
}

impl Letter {
    pub fn new(
        subject: impl Into<String>,
        from: MailAddress,
        to: Vec<MailAddress>,
        body: MailBody,
    ) -> Self {
        Self {
            subject: subject.into(),
            from,
            to,
            body,
        }
    }
}

/// Turns a [`Letter`] into the bytes stored and later handed to a transport.
pub trait MessageBuilder: Send + Sync {
    fn encode(&self, letter: &Letter) -> Result<Vec<u8>, EncodingError>;
}

/// Builds an RFC 5322 / MIME message with UTF-8 base64 bodies.
#[derive(Clone, Copy, Debug, Default)]
pub struct MimeMessageBuilder;

impl MimeMessageBuilder {
    pub fn new() -> Self {
        Self
    }
}

impl MessageBuilder for MimeMessageBuilder {
    fn encode(&self, letter: &Letter) -> Result<Vec<u8>, EncodingError> {
        ensure_single_line("subject", &letter.subject)?;
        if letter.to.is_empty() {
            return Err(EncodingError::NoRecipients);
        }

        let to = letter
            .to
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");

        let mut message = String::new();
        push_header(&mut message, "Date", &Utc::now().to_rfc2822());
        push_header(
            &mut message,
            "Message-ID",
            &format!("<{}@{}>", Uuid::new_v4(), letter.from.domain()),
        );
        push_header(&mut message, "From", &letter.from.to_string());
        push_header(&mut message, "To", &to);
        push_header(&mut message, "Subject", &encode_text(&letter.subject));
        push_header(&mut message, "MIME-Version", "1.0");

        match &letter.body {
            MailBody::Text(text) => push_part(&mut message, "text/plain", text),
            MailBody::Html(html) => push_part(&mut message, "text/html", html),
            MailBody::HtmlWithText { html, text } => {
                let boundary = format!("=_postbox_{}", Uuid::new_v4().simple());
                push_header(
                    &mut message,
                    "Content-Type",
                    &format!("multipart/alternative; boundary=\"{}\"", boundary),
                );
                message.push_str("\r\n");
                for (content_type, content) in [("text/plain", text), ("text/html", html)] {
                    message.push_str(&format!("--{}\r\n", boundary));
                    push_part(&mut message, content_type, content);
                }
                message.push_str(&format!("--{}--\r\n", boundary));
            }
        }

        Ok(message.into_bytes())
    }
}

fn push_header(message: &mut String, name: &str, value: &str) {
    message.push_str(name);
    message.push_str(": ");
    message.push_str(value);
    message.push_str("\r\n");
}

fn push_part(message: &mut String, content_type: &str, content: &str) {
    push_header(
        message,
        "Content-Type",
        &format!("{}; charset=UTF-8", content_type),
    );
    push_header(message, "Content-Transfer-Encoding", "base64");
    message.push_str("\r\n");
    message.push_str(&base64_lines(content.as_bytes()));
}
