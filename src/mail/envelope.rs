use super::address::MailAddress;
use super::header::split_address_list;
use super::EncodingError;

/// Sender and recipients of a stored payload, as a transport needs them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Envelope {
    pub sender: MailAddress,
    pub recipients: Vec<MailAddress>,
}

impl Envelope {
    /// Read the header block of a payload and pull out `From` and `To`/`Cc`/`Bcc`.
    pub fn from_payload(payload: &[u8]) -> Result<Self, EncodingError> {
        let head = header_block(payload)?;

        let mut sender = None;
        let mut recipients = Vec::new();
        for (name, value) in unfold(head) {
            if name.eq_ignore_ascii_case("from") {
                if sender.is_some() {
                    return Err(malformed("more than one From header"));
                }
                sender = Some(MailAddress::parse(&value)?);
            } else if ["to", "cc", "bcc"]
                .iter()
                .any(|field| name.eq_ignore_ascii_case(field))
            {
                for address in split_address_list(&value) {
                    recipients.push(MailAddress::parse(address)?);
                }
            }
        }

        let sender = sender.ok_or_else(|| malformed("missing From header"))?;
        if recipients.is_empty() {
            return Err(EncodingError::NoRecipients);
        }
        Ok(Self { sender, recipients })
    }
}

fn malformed(reason: &str) -> EncodingError {
    EncodingError::MalformedPayload(reason.to_string())
}

fn header_block(payload: &[u8]) -> Result<&str, EncodingError> {
    let end = find(payload, b"\r\n\r\n")
        .or_else(|| find(payload, b"\n\n"))
        .ok_or_else(|| malformed("no blank line after headers"))?;
    std::str::from_utf8(&payload[..end]).map_err(|_| malformed("headers are not valid UTF-8"))
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

/// Join folded continuation lines onto their header.
fn unfold(head: &str) -> Vec<(String, String)> {
    let mut headers: Vec<(String, String)> = Vec::new();
    for line in head.lines() {
        if line.starts_with(&[' ', '\t'][..]) {
            if let Some((_, value)) = headers.last_mut() {
                value.push(' ');
                value.push_str(line.trim());
            }
            continue;
        }
        if let Some((name, value)) = line.split_once(':') {
            headers.push((name.trim().to_string(), value.trim().to_string()));
        }
    }
    headers
}
