//! Header value helpers shared by the builder and the envelope parser.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

use super::EncodingError;

/// Reject CR/LF so a value cannot start a header of its own.
pub(crate) fn ensure_single_line(field: &'static str, value: &str) -> Result<(), EncodingError> {
    if value.contains(&['\r', '\n'][..]) {
        return Err(EncodingError::HeaderInjection(field));
    }
    Ok(())
}

/// Printable ASCII passes through; anything else becomes an RFC 2047 encoded word.
pub(crate) fn encode_text(value: &str) -> String {
    if value.bytes().all(|b| (0x20..0x7f).contains(&b)) {
        value.to_string()
    } else {
        format!("=?UTF-8?B?{}?=", STANDARD.encode(value.as_bytes()))
    }
}

/// Reverse of [`encode_text`]: decode a value made only of `=?charset?B|Q?..?=`
/// words. Anything else, including words that do not decode to UTF-8, is
/// returned unchanged.
pub(crate) fn decode_text(value: &str) -> String {
    let words: Option<Vec<String>> = value.split_whitespace().map(decode_word).collect();
    match words {
        Some(words) if !words.is_empty() => words.concat(),
        _ => value.to_string(),
    }
}

fn decode_word(word: &str) -> Option<String> {
    let inner = word.strip_prefix("=?")?.strip_suffix("?=")?;
    let mut parts = inner.splitn(3, '?');
    let charset = parts.next()?;
    let encoding = parts.next()?;
    let text = parts.next()?;
    if !(charset.eq_ignore_ascii_case("utf-8") || charset.eq_ignore_ascii_case("us-ascii")) {
        return None;
    }

    let bytes = match encoding {
        "B" | "b" => STANDARD.decode(text).ok()?,
        "Q" | "q" => decode_q(text)?,
        _ => return None,
    };
    String::from_utf8(bytes).ok()
}

fn decode_q(text: &str) -> Option<Vec<u8>> {
    let mut out = Vec::with_capacity(text.len());
    let mut bytes = text.bytes();
    while let Some(b) = bytes.next() {
        match b {
            b'_' => out.push(b' '),
            b'=' => {
                let hex = [bytes.next()?, bytes.next()?];
                let hex = std::str::from_utf8(&hex).ok()?;
                out.push(u8::from_str_radix(hex, 16).ok()?);
            }
            _ => out.push(b),
        }
    }
    Some(out)
}

/// Display name for an address header: quoted when it holds specials.
pub(crate) fn encode_personal(personal: &str) -> String {
    let encoded = encode_text(personal);
    if encoded.starts_with("=?") {
        return encoded;
    }
    if personal.contains(|c: char| "()<>[]:;@\\,.\"".contains(c)) {
        let escaped = personal.replace('\\', "\\\\").replace('"', "\\\"");
        format!("\"{}\"", escaped)
    } else {
        encoded
    }
}

/// Base64 body wrapped at 76 columns with CRLF line ends.
pub(crate) fn base64_lines(content: &[u8]) -> String {
    let encoded = STANDARD.encode(content);
    let mut out = String::with_capacity(encoded.len() + encoded.len() / 76 * 2 + 2);
    for chunk in encoded.as_bytes().chunks(76) {
        // base64 output is ASCII
        out.push_str(std::str::from_utf8(chunk).unwrap_or_default());
        out.push_str("\r\n");
    }
    out
}

/// Split an address-list header value on commas outside quotes and angle brackets.
pub(crate) fn split_address_list(value: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut in_quotes = false;
    let mut in_angle = false;
    let mut escaped = false;
    let mut start = 0;

    for (i, c) in value.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_quotes => escaped = true,
            '"' => in_quotes = !in_quotes,
            '<' if !in_quotes => in_angle = true,
            '>' if !in_quotes => in_angle = false,
            ',' if !in_quotes && !in_angle => {
                parts.push(value[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(value[start..].trim());
    parts.into_iter().filter(|part| !part.is_empty()).collect()
}
