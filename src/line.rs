use std::sync::LazyLock;

use memchr::memmem;
use regex::Regex;

use crate::header::{is_token, split_header};
use crate::types::{Direction, LogTimestamp, SipMessageType};

static TRANSMITTING: LazyLock<memmem::Finder<'static>> =
    LazyLock::new(|| memmem::Finder::new(b"ransmitting"));
static TO: LazyLock<memmem::Finder<'static>> = LazyLock::new(|| memmem::Finder::new(b"to "));
static READ_FROM: LazyLock<memmem::Finder<'static>> =
    LazyLock::new(|| memmem::Finder::new(b"SIP read from "));

static TIMESTAMP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\[?([A-Za-z]{3}) {1,2}(\d{1,2}) (\d{2}):(\d{2}):(\d{2})\]?")
        .expect("timestamp pattern is valid")
});

static REQUEST_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(INVITE|ACK|BYE|CANCEL|REFER|OPTIONS|REGISTER|NOTIFY|SUBSCRIBE|INFO|PRACK|UPDATE|MESSAGE|PUBLISH) ((?:sips?|tel):(?:([^@\s;]+)@)?\S+)",
    )
    .expect("request line pattern is valid")
});

static STATUS_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^SIP/2\.0 (\d{3})(?: (.*))?$").expect("status line pattern is valid")
});

/// What a single log line means to the scanner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineEvent<'a> {
    Blank,
    Timestamp(LogTimestamp),
    /// Start of a printed SIP message. `timestamp` is set when the logger
    /// prefixed the marker line itself with a timestamp.
    Marker {
        direction: Direction,
        host: &'a str,
        timestamp: Option<LogTimestamp>,
    },
    StartLine {
        message_type: SipMessageType,
        dialed_number: Option<String>,
    },
    Header {
        key: &'a str,
        value: &'a str,
    },
    Other,
}

/// Strip leading and trailing control characters (`\r`, `\n`, tabs, NUL...).
pub fn strip_controls(line: &str) -> &str {
    line.trim_matches(|c: char| c.is_ascii_control())
}

/// Classify one already-stripped line.
///
/// Order matters: markers and start lines contain colons too. A line whose
/// text before the first colon is a single token is a header no matter what
/// its value says; markers and start lines always have a space before it.
pub fn classify(line: &str) -> LineEvent<'_> {
    if line.is_empty() {
        return LineEvent::Blank;
    }

    let (timestamp, rest) = match parse_timestamp_prefix(line) {
        Some((ts, len)) => (Some(ts), &line[len..]),
        None => (None, line),
    };

    if timestamp.is_none() {
        if let Some((key, value)) = split_header(line).filter(|(key, _)| is_token(key)) {
            return LineEvent::Header { key, value };
        }
    }

    if let Some((direction, host)) = parse_marker(rest) {
        return LineEvent::Marker {
            direction,
            host,
            timestamp,
        };
    }

    if let Some(ts) = timestamp {
        return LineEvent::Timestamp(ts);
    }

    if let Some((message_type, dialed_number)) = parse_start_line(line) {
        return LineEvent::StartLine {
            message_type,
            dialed_number,
        };
    }

    match split_header(line) {
        Some((key, value)) if !key.trim().is_empty() => LineEvent::Header { key, value },
        _ => LineEvent::Other,
    }
}

/// Parse a leading `[Mon DD HH:MM:SS]` token. Returns the timestamp and the
/// byte length of the token including any brackets.
pub fn parse_timestamp_prefix(line: &str) -> Option<(LogTimestamp, usize)> {
    let caps = TIMESTAMP.captures(line)?;
    let month = LogTimestamp::month_from_name(&caps[1])?;
    let day: u8 = caps[2].parse().ok()?;
    let hour: u8 = caps[3].parse().ok()?;
    let min: u8 = caps[4].parse().ok()?;
    let sec: u8 = caps[5].parse().ok()?;
    if day == 0 || day > 31 || hour > 23 || min > 59 || sec > 60 {
        return None;
    }
    let len = caps.get(0).map_or(0, |m| m.end());
    Some((
        LogTimestamp {
            month,
            day,
            hour,
            min,
            sec,
        },
        len,
    ))
}

fn host_token(data: &str) -> Option<&str> {
    let end = data
        .find(|c: char| c.is_ascii_whitespace())
        .unwrap_or(data.len());
    let token = &data[..end];
    if token.is_empty() {
        None
    } else {
        Some(token)
    }
}

/// Detect `... Transmitting (NAT) to 10.0.0.2:5060:` and `<--- SIP read from UDP:10.0.0.2:5060 --->`.
pub fn parse_marker(line: &str) -> Option<(Direction, &str)> {
    let bytes = line.as_bytes();
    if let Some(pos) = TRANSMITTING.find(bytes) {
        let after = pos + TRANSMITTING.needle().len();
        if let Some(to) = TO.find(&bytes[after..]) {
            let start = after + to + TO.needle().len();
            if let Some(host) = host_token(&line[start..]) {
                let host = host.strip_suffix(':').unwrap_or(host);
                if !host.is_empty() {
                    return Some((Direction::Outbound, host));
                }
            }
        }
    }
    if let Some(pos) = READ_FROM.find(bytes) {
        let start = pos + READ_FROM.needle().len();
        if let Some(host) = host_token(&line[start..]) {
            return Some((Direction::Inbound, host));
        }
    }
    None
}

/// Parse a request line (`INVITE sip:555@host SIP/2.0`) or a status line
/// (`SIP/2.0 180 Ringing`). For requests the user part of the target, if
/// any, is returned as the dialed number.
pub fn parse_start_line(line: &str) -> Option<(SipMessageType, Option<String>)> {
    if let Some(caps) = STATUS_LINE.captures(line) {
        let code: u16 = caps[1].parse().ok()?;
        let reason = caps.get(2).map_or("", |m| m.as_str()).trim().to_owned();
        return Some((SipMessageType::Response { code, reason }, None));
    }
    let caps = REQUEST_LINE.captures(line)?;
    let message_type = SipMessageType::Request {
        method: caps[1].to_owned(),
        uri: caps[2].to_owned(),
    };
    let dialed = caps.get(3).map(|m| m.as_str().to_owned());
    Some((message_type, dialed))
}
