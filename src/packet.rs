use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, trace};

use crate::filter::ScanConfig;
use crate::header::{self, normalize_key};
use crate::index::CallIndex;
use crate::types::{Direction, LogTimestamp, SipMessageType, SipPacket};

static PARTY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?:"(?P<name>[^"]*)"\s*)?<?sips?:(?P<number>[^@;>\s]+)@"#)
        .expect("party pattern is valid")
});

static ANGLE_ADDR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<([^>]+)>").expect("angle address pattern is valid"));

/// Display name and user part of a From/To value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Party<'a> {
    pub name: Option<&'a str>,
    pub number: &'a str,
}

/// Pull the optional quoted display name and the user part out of
/// `"Alice" <sip:1002@pbx>;tag=...`. Values without a user part yield `None`.
pub fn parse_party(value: &str) -> Option<Party<'_>> {
    let caps = PARTY.captures(value)?;
    let number = caps.name("number")?.as_str();
    let name = caps
        .name("name")
        .map(|m| m.as_str().trim())
        .filter(|n| !n.is_empty());
    Some(Party { name, number })
}

/// Address inside the angle brackets of a Contact value.
pub fn parse_contact(value: &str) -> Option<&str> {
    ANGLE_ADDR
        .captures(value)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Drop the `@host` suffix of a Call-ID. Applying it twice changes nothing.
pub fn normalize_call_id(raw: &str) -> &str {
    let local = match raw.find('@') {
        Some(at) => &raw[..at],
        None => raw,
    };
    local.trim_end()
}

/// Headers of one message as they are being read from the log.
#[derive(Debug, Clone, Default)]
pub struct PacketBuffer {
    pub far: Option<String>,
    pub near: Option<String>,
    pub message_type: Option<SipMessageType>,
    pub dialed_number: Option<String>,
    pub fields: HashMap<String, String>,
    pub timestamp: Option<LogTimestamp>,
}

impl PacketBuffer {
    pub fn open(direction: Direction, host: &str, timestamp: Option<LogTimestamp>) -> Self {
        let mut buf = PacketBuffer {
            timestamp,
            ..Default::default()
        };
        match direction {
            Direction::Outbound => buf.far = Some(host.to_owned()),
            Direction::Inbound => buf.near = Some(host.to_owned()),
        }
        buf
    }

    pub fn direction(&self) -> Direction {
        if self.far.is_some() {
            Direction::Outbound
        } else {
            Direction::Inbound
        }
    }

    pub fn field(&self, canonical: &str) -> Option<&str> {
        self.fields.get(canonical).map(String::as_str)
    }

    /// Store a header under its canonical name and return that name.
    pub fn insert_header(&mut self, key: &str, value: &str) -> String {
        let key = normalize_key(key);
        self.fields.insert(key.clone(), value.to_owned());
        key
    }

    pub fn call_id(&self) -> Option<&str> {
        self.field(header::CALL_ID)
            .map(normalize_call_id)
            .filter(|id| !id.is_empty())
    }
}

/// What happened to a buffer handed to [`finalize`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Finalized {
    Committed { call_id: String, created: bool },
    /// No usable Call-ID header.
    NoCallId,
    /// Neither an INVITE nor part of a call that started with one. `removed`
    /// tells whether an existing record for the same Call-ID was dropped.
    NotSession { call_id: String, removed: bool },
    /// A block with headers but no request or status line.
    NoStartLine { call_id: String },
}

/// Validate a terminated block and commit it to the index.
pub fn finalize(buffer: PacketBuffer, index: &mut CallIndex, config: &ScanConfig) -> Finalized {
    let Some(call_id) = buffer.call_id().map(str::to_owned) else {
        trace!("block without Call-ID dropped");
        return Finalized::NoCallId;
    };

    let is_session = buffer
        .message_type
        .as_ref()
        .is_some_and(SipMessageType::is_session_initiating);
    let continues_session = index
        .get(&call_id)
        .is_some_and(|record| record.starts_with_session());
    if !is_session && !continues_session {
        let removed = index.remove(&call_id).is_some();
        debug!(call_id = %call_id, removed, "skipping non-session message");
        return Finalized::NotSession { call_id, removed };
    }

    let Some(message_type) = buffer.message_type.clone() else {
        debug!(call_id = %call_id, "block without start line dropped");
        return Finalized::NoStartLine { call_id };
    };

    let created = !index.contains(&call_id);
    let record = index.get_or_create(&call_id);

    if let Some(party) = buffer.field(header::FROM).and_then(parse_party) {
        record.set_caller(party.name, party.number);
    }
    if let Some(party) = buffer.field(header::TO).and_then(parse_party) {
        record.set_callee(party.name, party.number);
    }

    if record.dialed_number.is_none() {
        let did = buffer.field(&normalize_key(&config.did_header));
        let alt = if config.ignore_alt_did {
            None
        } else {
            buffer.field(&normalize_key(&config.alt_did_header))
        };
        let fallback = if is_session {
            buffer.dialed_number.as_deref()
        } else {
            None
        };
        if let Some(number) = alt.or(did).or(fallback) {
            record.set_dialed_number(number);
        }
    }

    let agent = buffer
        .field(header::USER_AGENT)
        .or_else(|| buffer.field(header::SERVER));
    if let Some(agent) = agent {
        if is_session {
            record.set_origin_agent(agent);
        } else if message_type.is_early_response() {
            record.set_dest_agent(agent);
        }
    }

    let direction = buffer.direction();
    let contact = buffer
        .field(header::CONTACT)
        .and_then(parse_contact)
        .map(str::to_owned);
    let address = buffer.far.or(buffer.near).unwrap_or_default();

    trace!(call_id = %call_id, %direction, message = %message_type, "packet committed");
    record.push_packet(SipPacket {
        direction,
        message_type,
        timestamp: buffer.timestamp,
        contact,
        address,
    });

    Finalized::Committed { call_id, created }
}
