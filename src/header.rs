//! Header name normalization.
//!
//! Switch logs print headers exactly as they went over the wire, so the same
//! field shows up in long form (`Call-ID`) or compact form (`i`) depending on
//! the peer. Everything is folded to upper-case canonical names.

pub const CALL_ID: &str = "CALL-ID";
pub const FROM: &str = "FROM";
pub const TO: &str = "TO";
pub const CONTACT: &str = "CONTACT";
pub const VIA: &str = "VIA";
pub const USER_AGENT: &str = "USER-AGENT";
pub const SERVER: &str = "SERVER";

/// Compact forms from RFC 3261 section 7.3.3.
fn expand_compact(key: &str) -> Option<&'static str> {
    let canonical = match key {
        "I" => CALL_ID,
        "T" => TO,
        "F" => FROM,
        "M" => CONTACT,
        "V" => VIA,
        _ => return None,
    };
    Some(canonical)
}

pub fn normalize_key(key: &str) -> String {
    let upper = key.trim().to_ascii_uppercase();
    match expand_compact(&upper) {
        Some(canonical) => canonical.to_owned(),
        None => upper,
    }
}

/// True when `key` could be a header name: non-empty, printable, no whitespace.
pub fn is_token(key: &str) -> bool {
    !key.is_empty() && key.bytes().all(|b| b.is_ascii_graphic())
}

/// Split `Key: value` on the first colon. The value loses its leading whitespace only.
pub fn split_header(line: &str) -> Option<(&str, &str)> {
    let colon = memchr::memchr(b':', line.as_bytes())?;
    let key = &line[..colon];
    let value = line[colon + 1..].trim_start_matches([' ', '\t']);
    Some((key, value))
}
