use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::header::{decode_text, encode_personal, ensure_single_line};
use super::EncodingError;

/// A mail address with an optional display name.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MailAddress {
    address: String,
    personal: Option<String>,
}

impl MailAddress {
    /// A bare address, e.g. `jane@example.com`.
    pub fn of(address: impl Into<String>) -> Result<Self, EncodingError> {
        let address = address.into().trim().to_string();
        validate(&address)?;
        Ok(Self {
            address,
            personal: None,
        })
    }

    /// An address with a display name, e.g. `Jane Doe <jane@example.com>`.
    pub fn with_personal(
        address: impl Into<String>,
        personal: impl Into<String>,
    ) -> Result<Self, EncodingError> {
        let personal = personal.into();
        ensure_single_line("personal name", &personal)?;
        let mut parsed = Self::of(address)?;
        let personal = personal.trim();
        if !personal.is_empty() {
            parsed.personal = Some(personal.to_string());
        }
        Ok(parsed)
    }

    /// Parse `addr`, `Name <addr>` or `"Quoted, Name" <addr>`. An RFC 2047
    /// encoded display name is decoded.
    pub fn parse(input: &str) -> Result<Self, EncodingError> {
        let input = input.trim();
        let Some(open) = input.rfind('<') else {
            return Self::of(input);
        };
        let close = input[open..]
            .find('>')
            .map(|i| open + i)
            .ok_or_else(|| EncodingError::InvalidAddress(input.to_string()))?;
        if !input[close + 1..].trim().is_empty() {
            return Err(EncodingError::InvalidAddress(input.to_string()));
        }

        let address = &input[open + 1..close];
        let personal = input[..open].trim();
        let personal = if personal.starts_with('"') {
            unquote(personal)
        } else {
            decode_text(personal)
        };
        Self::with_personal(address, personal)
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn personal(&self) -> Option<&str> {
        self.personal.as_deref()
    }

    /// The part after `@`.
    pub fn domain(&self) -> &str {
        self.address
            .rsplit_once('@')
            .map(|(_, domain)| domain)
            .unwrap_or_default()
    }
}

impl fmt::Display for MailAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.personal {
            Some(personal) => write!(f, "{} <{}>", encode_personal(personal), self.address),
            None => f.write_str(&self.address),
        }
    }
}

impl FromStr for MailAddress {
    type Err = EncodingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

fn validate(address: &str) -> Result<(), EncodingError> {
    let invalid = || EncodingError::InvalidAddress(address.to_string());

    if address
        .chars()
        .any(|c| c.is_whitespace() || c.is_control() || "<>,;\"".contains(c))
    {
        return Err(invalid());
    }
    let (local, domain) = address.split_once('@').ok_or_else(invalid)?;
    if local.is_empty() || domain.is_empty() || domain.contains('@') {
        return Err(invalid());
    }
    if domain.starts_with('.') || domain.ends_with('.') || domain.contains("..") {
        return Err(invalid());
    }
    Ok(())
}

fn unquote(personal: &str) -> String {
    match personal
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
    {
        Some(inner) => inner.replace("\\\"", "\"").replace("\\\\", "\\"),
        None => personal.to_string(),
    }
}
