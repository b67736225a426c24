use regex::Regex;

use crate::header;
use crate::scanner::ScanError;

pub const DEFAULT_DID_HEADER: &str = "X-DID";
pub const DEFAULT_ALT_DID_HEADER: &str = "X-CROSS-DOMAIN-DID";

/// Which calls a scan keeps. The two modes are mutually exclusive.
#[derive(Debug, Clone)]
pub enum Selection {
    /// Regex matched against the raw Call-ID header value, before the host suffix is dropped.
    CallId(Regex),
    /// Substring that must appear in the From or To header value.
    Number(String),
}

impl Selection {
    pub fn call_id(pattern: &str) -> Result<Self, ScanError> {
        Ok(Selection::CallId(Regex::new(pattern)?))
    }

    pub fn number(number: impl Into<String>) -> Self {
        Selection::Number(number.into())
    }
}

#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// `None` keeps every call.
    pub selection: Option<Selection>,
    /// Keep the plain DID header even when the cross-domain one is present.
    pub ignore_alt_did: bool,
    pub did_header: String,
    pub alt_did_header: String,
}

impl Default for ScanConfig {
    fn default() -> Self {
        ScanConfig {
            selection: None,
            ignore_alt_did: false,
            did_header: DEFAULT_DID_HEADER.to_owned(),
            alt_did_header: DEFAULT_ALT_DID_HEADER.to_owned(),
        }
    }
}

impl ScanConfig {
    pub fn with_selection(selection: Selection) -> Self {
        ScanConfig {
            selection: Some(selection),
            ..Default::default()
        }
    }
}

/// Result of checking one freshly stored header against the selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Nothing decided yet, or the block matched.
    Keep,
    /// The block cannot belong to a selected call; stop reading it.
    Reject,
}

/// Early-exit check run after each header is stored into the buffer.
///
/// `key` is the canonical name of the header just stored and `lookup` gives
/// access to every header stored so far in the same block.
pub fn check_header<'a>(
    selection: Option<&Selection>,
    key: &str,
    value: &str,
    lookup: impl Fn(&str) -> Option<&'a str>,
) -> Verdict {
    match selection {
        None => Verdict::Keep,
        Some(Selection::CallId(re)) => {
            if key == header::CALL_ID && !re.is_match(value) {
                Verdict::Reject
            } else {
                Verdict::Keep
            }
        }
        Some(Selection::Number(number)) => {
            if key != header::TO && key != header::FROM {
                return Verdict::Keep;
            }
            match (lookup(header::TO), lookup(header::FROM)) {
                (Some(to), Some(from)) => {
                    if to.contains(number.as_str()) || from.contains(number.as_str()) {
                        Verdict::Keep
                    } else {
                        Verdict::Reject
                    }
                }
                _ => Verdict::Keep,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn check(
        selection: &Selection,
        stored: &HashMap<&'static str, &'static str>,
        key: &str,
    ) -> Verdict {
        let value = stored.get(key).copied().unwrap_or("");
        check_header(Some(selection), key, value, |k| stored.get(k).copied())
    }

    #[test]
    fn no_selection_keeps_everything() {
        assert_eq!(
            check_header(None, header::CALL_ID, "anything", |_| None),
            Verdict::Keep
        );
    }

    #[test]
    fn call_id_regex_against_raw_value() {
        let sel = Selection::call_id("^abc.*@pbx$").unwrap();
        let stored = HashMap::from([(header::CALL_ID, "abc123@pbx")]);
        assert_eq!(check(&sel, &stored, header::CALL_ID), Verdict::Keep);

        let stored = HashMap::from([(header::CALL_ID, "zzz@pbx")]);
        assert_eq!(check(&sel, &stored, header::CALL_ID), Verdict::Reject);
    }

    #[test]
    fn call_id_mode_ignores_other_headers() {
        let sel = Selection::call_id("nomatch").unwrap();
        let stored = HashMap::from([(header::FROM, "<sip:1@h>")]);
        assert_eq!(check(&sel, &stored, header::FROM), Verdict::Keep);
    }

    #[test]
    fn invalid_pattern() {
        let err = Selection::call_id("(unclosed").unwrap_err();
        assert!(matches!(err, ScanError::InvalidPattern(_)));
        assert!(err.to_string().starts_with("invalid call-id pattern"));
    }

    #[test]
    fn number_waits_for_both_headers() {
        let sel = Selection::number("1002");
        let stored = HashMap::from([(header::TO, "<sip:555@h>")]);
        assert_eq!(check(&sel, &stored, header::TO), Verdict::Keep);
    }

    #[test]
    fn number_matches_either_side() {
        let sel = Selection::number("1002");
        let stored = HashMap::from([
            (header::TO, "<sip:555@h>"),
            (header::FROM, "\"Alice\" <sip:1002@h>;tag=1"),
        ]);
        assert_eq!(check(&sel, &stored, header::FROM), Verdict::Keep);

        let stored = HashMap::from([
            (header::TO, "<sip:1002@h>"),
            (header::FROM, "<sip:555@h>"),
        ]);
        assert_eq!(check(&sel, &stored, header::FROM), Verdict::Keep);
    }

    #[test]
    fn number_rejects_when_neither_side_matches() {
        let sel = Selection::number("1002");
        let stored = HashMap::from([
            (header::TO, "<sip:555@h>"),
            (header::FROM, "<sip:777@h>"),
        ]);
        assert_eq!(check(&sel, &stored, header::TO), Verdict::Reject);
    }

    #[test]
    fn default_config_headers() {
        let cfg = ScanConfig::default();
        assert!(cfg.selection.is_none());
        assert!(!cfg.ignore_alt_did);
        assert_eq!(cfg.did_header, "X-DID");
        assert_eq!(cfg.alt_did_header, "X-CROSS-DOMAIN-DID");
    }
}
