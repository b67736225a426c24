use std::fmt;

pub const SESSION_METHOD: &str = "INVITE";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Outbound,
    Inbound,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Outbound => f.write_str("sent"),
            Direction::Inbound => f.write_str("recv"),
        }
    }
}

const MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// Wall-clock stamp as printed by the switch logger, e.g. `[Oct 19 12:34:56]`.
///
/// The log format carries no year, so ordering is only meaningful within one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LogTimestamp {
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub min: u8,
    pub sec: u8,
}

impl LogTimestamp {
    /// Month number (1-12) for a three-letter month name, case-insensitive.
    pub fn month_from_name(name: &str) -> Option<u8> {
        MONTHS
            .iter()
            .position(|m| m.eq_ignore_ascii_case(name))
            .map(|i| i as u8 + 1)
    }
}

impl fmt::Display for LogTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let month = MONTHS
            .get(usize::from(self.month.saturating_sub(1)))
            .copied()
            .unwrap_or("???");
        write!(
            f,
            "{month} {:2} {:02}:{:02}:{:02}",
            self.day, self.hour, self.min, self.sec
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SipMessageType {
    Request { method: String, uri: String },
    Response { code: u16, reason: String },
}

impl SipMessageType {
    pub fn is_session_initiating(&self) -> bool {
        matches!(self, SipMessageType::Request { method, .. } if method == SESSION_METHOD)
    }

    pub fn status_code(&self) -> Option<u16> {
        match self {
            SipMessageType::Response { code, .. } => Some(*code),
            SipMessageType::Request { .. } => None,
        }
    }

    /// Provisional responses that identify the answering side's agent:
    /// 100 Trying, 180 Ringing and 183 Session Progress.
    pub fn is_early_response(&self) -> bool {
        matches!(self.status_code(), Some(100 | 180 | 183))
    }

    /// Short label used in call flows: the verb for requests, `code reason` for responses.
    pub fn label(&self) -> String {
        match self {
            SipMessageType::Request { method, .. } => method.clone(),
            SipMessageType::Response { code, reason } => format!("{code} {reason}"),
        }
    }
}

impl fmt::Display for SipMessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SipMessageType::Request { method, uri } => write!(f, "{method} {uri}"),
            SipMessageType::Response { code, reason } => write!(f, "{code} {reason}"),
        }
    }
}

/// One committed message of a call, in the order it was found in the log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SipPacket {
    pub direction: Direction,
    pub message_type: SipMessageType,
    pub timestamp: Option<LogTimestamp>,
    pub contact: Option<String>,
    /// Remote host the message was sent to or read from.
    pub address: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallRecord {
    pub call_id: String,
    pub caller_name: Option<String>,
    pub caller_number: Option<String>,
    pub callee_name: Option<String>,
    pub callee_number: Option<String>,
    pub dialed_number: Option<String>,
    pub origin_agent: Option<String>,
    pub dest_agent: Option<String>,
    packets: Vec<SipPacket>,
}

fn set_once(slot: &mut Option<String>, value: &str) -> bool {
    if slot.is_some() {
        return false;
    }
    *slot = Some(value.to_owned());
    true
}

impl CallRecord {
    pub fn new(call_id: impl Into<String>) -> Self {
        CallRecord {
            call_id: call_id.into(),
            ..Default::default()
        }
    }

    pub fn packets(&self) -> &[SipPacket] {
        &self.packets
    }

    pub fn push_packet(&mut self, packet: SipPacket) {
        self.packets.push(packet);
    }

    pub fn first_packet(&self) -> Option<&SipPacket> {
        self.packets.first()
    }

    pub fn first_timestamp(&self) -> Option<LogTimestamp> {
        self.packets.iter().find_map(|p| p.timestamp)
    }

    pub fn last_timestamp(&self) -> Option<LogTimestamp> {
        self.packets.iter().rev().find_map(|p| p.timestamp)
    }

    pub fn starts_with_session(&self) -> bool {
        self.first_packet()
            .is_some_and(|p| p.message_type.is_session_initiating())
    }

    /// Labels of all packets in order, e.g. `INVITE, 100 Trying, 200 OK, ACK`.
    pub fn method_summary(&self) -> String {
        self.packets
            .iter()
            .map(|p| p.message_type.label())
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn set_caller(&mut self, name: Option<&str>, number: &str) {
        if let Some(name) = name {
            set_once(&mut self.caller_name, name);
        }
        set_once(&mut self.caller_number, number);
    }

    pub fn set_callee(&mut self, name: Option<&str>, number: &str) {
        if let Some(name) = name {
            set_once(&mut self.callee_name, name);
        }
        set_once(&mut self.callee_number, number);
    }

    pub fn set_dialed_number(&mut self, number: &str) -> bool {
        set_once(&mut self.dialed_number, number)
    }

    pub fn set_origin_agent(&mut self, agent: &str) -> bool {
        set_once(&mut self.origin_agent, agent)
    }

    pub fn set_dest_agent(&mut self, agent: &str) -> bool {
        set_once(&mut self.dest_agent, agent)
    }
}
