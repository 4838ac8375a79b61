//! Header decoding: RFC 2047 encoded words and sender extraction.

use mail_parser::MessageParser;

/// Decode RFC 2047 encoded words (`=?utf-8?q?...?=`) in a raw header value.
///
/// Falls back to the raw value when nothing can be decoded.
pub fn decode_header(raw: &str) -> String {
    if !raw.contains("=?") {
        return raw.to_string();
    }
    let wrapped = format!("Subject: {raw}\r\n\r\n");
    MessageParser::default()
        .parse(wrapped.as_bytes())
        .and_then(|parsed| parsed.subject().map(str::to_string))
        .unwrap_or_else(|| raw.to_string())
}

/// Extract the mailbox local part of a `From` header (the MR owner).
///
/// `alice@example.com ("alice@example.com")` → `alice`.
pub fn extract_owner(from: &str) -> Option<String> {
    let wrapped = format!("From: {from}\r\n\r\n");
    let address = MessageParser::default()
        .parse(wrapped.as_bytes())
        .and_then(|parsed| {
            parsed
                .from()
                .and_then(|addr| addr.first())
                .and_then(|a| a.address())
                .map(str::to_string)
        })
        .unwrap_or_else(|| from.to_string());

    let (local, _) = address.split_once('@')?;
    let local = local.trim().trim_start_matches('<');
    if local.is_empty() {
        None
    } else {
        Some(local.to_string())
    }
}
