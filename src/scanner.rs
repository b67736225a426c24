use std::fmt;
use std::io::{BufRead, BufReader, Read};

use tracing::{debug, info, trace, warn};

use crate::filter::{check_header, ScanConfig, Verdict};
use crate::index::CallIndex;
use crate::line::{classify, strip_controls, LineEvent};
use crate::packet::{finalize, Finalized, PacketBuffer};
use crate::types::LogTimestamp;

#[derive(Debug)]
pub enum ScanError {
    /// The log could not be opened or read. No partial result is returned.
    InputUnavailable(std::io::Error),
    InvalidPattern(regex::Error),
}

impl fmt::Display for ScanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanError::InputUnavailable(e) => write!(f, "input unavailable: {e}"),
            ScanError::InvalidPattern(e) => write!(f, "invalid call-id pattern: {e}"),
        }
    }
}

impl std::error::Error for ScanError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ScanError::InputUnavailable(e) => Some(e),
            ScanError::InvalidPattern(e) => Some(e),
        }
    }
}

impl From<std::io::Error> for ScanError {
    fn from(e: std::io::Error) -> Self {
        ScanError::InputUnavailable(e)
    }
}

impl From<regex::Error> for ScanError {
    fn from(e: regex::Error) -> Self {
        ScanError::InvalidPattern(e)
    }
}

#[derive(Debug, Default)]
enum State {
    #[default]
    Idle,
    Capturing(PacketBuffer),
}

/// Counters kept while scanning, mostly for `--stats` and debug output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanStats {
    pub lines: u64,
    pub blocks: u64,
    pub committed: u64,
    /// Blocks aborted by the selection before their end.
    pub rejected: u64,
    /// Terminated blocks that were not part of an INVITE dialog, or had no Call-ID.
    pub discarded: u64,
    /// Blocks cut short by a new marker or end of input.
    pub abandoned: u64,
    pub removed_calls: u64,
}

/// Line-driven scanner turning a switch log into a [`CallIndex`].
///
/// Two states: `Idle` between messages and `Capturing` while the headers of
/// one message are read. Every line is classified once and dispatched through
/// [`LogScanner::feed_line`].
pub struct LogScanner {
    config: ScanConfig,
    state: State,
    pending_timestamp: Option<LogTimestamp>,
    index: CallIndex,
    stats: ScanStats,
}

impl LogScanner {
    pub fn new(config: ScanConfig) -> Self {
        LogScanner {
            config,
            state: State::Idle,
            pending_timestamp: None,
            index: CallIndex::new(),
            stats: ScanStats::default(),
        }
    }

    pub fn index(&self) -> &CallIndex {
        &self.index
    }

    pub fn stats(&self) -> ScanStats {
        self.stats
    }

    #[cfg(test)]
    fn is_capturing(&self) -> bool {
        matches!(self.state, State::Capturing(_))
    }

    /// Read `reader` to the end, one line at a time.
    ///
    /// Each call is one self-contained input: a block still open at its end
    /// is dropped and a timestamp seen in it is not carried into the next
    /// call. The index and counters accumulate across calls.
    pub fn run<R: Read>(&mut self, reader: R) -> Result<(), ScanError> {
        self.pending_timestamp = None;
        let mut reader = BufReader::new(reader);
        let mut raw = Vec::new();
        loop {
            raw.clear();
            let n = reader.read_until(b'\n', &mut raw)?;
            if n == 0 {
                break;
            }
            let line = String::from_utf8_lossy(&raw);
            self.feed_line(&line);
        }
        self.finish_input();
        info!(
            lines = self.stats.lines,
            blocks = self.stats.blocks,
            calls = self.index.len(),
            "scan complete"
        );
        Ok(())
    }

    /// Feed one raw line (terminator included or not).
    pub fn feed_line(&mut self, raw: &str) {
        self.stats.lines += 1;
        let line = strip_controls(raw);
        let event = classify(line);
        let state = std::mem::take(&mut self.state);
        self.state = self.transition(state, event);
    }

    fn transition(&mut self, state: State, event: LineEvent<'_>) -> State {
        match (state, event) {
            (state, LineEvent::Marker {
                direction,
                host,
                timestamp,
            }) => {
                if let State::Capturing(old) = state {
                    self.stats.abandoned += 1;
                    warn!(
                        line = self.stats.lines,
                        call_id = old.call_id().unwrap_or("-"),
                        "message block not terminated before next marker, dropping it"
                    );
                }
                if timestamp.is_some() {
                    self.pending_timestamp = timestamp;
                }
                self.stats.blocks += 1;
                trace!(line = self.stats.lines, %direction, host, "block opened");
                State::Capturing(PacketBuffer::open(
                    direction,
                    host,
                    self.pending_timestamp,
                ))
            }
            (state, LineEvent::Timestamp(ts)) => {
                self.pending_timestamp = Some(ts);
                state
            }
            (State::Capturing(mut buf), LineEvent::StartLine {
                message_type,
                dialed_number,
            }) => {
                buf.message_type = Some(message_type);
                if dialed_number.is_some() {
                    buf.dialed_number = dialed_number;
                }
                State::Capturing(buf)
            }
            (State::Capturing(mut buf), LineEvent::Header { key, value }) => {
                let key = buf.insert_header(key, value);
                let verdict = check_header(self.config.selection.as_ref(), &key, value, |k| {
                    buf.field(k)
                });
                match verdict {
                    Verdict::Keep => State::Capturing(buf),
                    Verdict::Reject => {
                        self.stats.rejected += 1;
                        debug!(
                            line = self.stats.lines,
                            header = %key,
                            value,
                            "block does not match selection, skipping"
                        );
                        State::Idle
                    }
                }
            }
            (State::Capturing(buf), LineEvent::Blank) => {
                self.commit(buf);
                State::Idle
            }
            (State::Capturing(buf), LineEvent::Other) => State::Capturing(buf),
            (State::Idle, _) => State::Idle,
        }
    }

    fn commit(&mut self, buf: PacketBuffer) {
        match finalize(buf, &mut self.index, &self.config) {
            Finalized::Committed { call_id, created } => {
                self.stats.committed += 1;
                if created {
                    debug!(call_id = %call_id, "matched new call");
                }
            }
            Finalized::NotSession { removed, .. } => {
                self.stats.discarded += 1;
                if removed {
                    self.stats.removed_calls += 1;
                }
            }
            Finalized::NoCallId | Finalized::NoStartLine { .. } => {
                self.stats.discarded += 1;
            }
        }
    }

    fn finish_input(&mut self) {
        if let State::Capturing(buf) = std::mem::take(&mut self.state) {
            self.stats.abandoned += 1;
            debug!(
                call_id = buf.call_id().unwrap_or("-"),
                "input ended inside a message block, dropping it"
            );
        }
    }

    pub fn into_index(mut self) -> CallIndex {
        self.finish_input();
        self.index
    }
}

/// Scan a whole log and return the calls it contains.
pub fn scan<R: Read>(reader: R, config: ScanConfig) -> Result<CallIndex, ScanError> {
    let mut scanner = LogScanner::new(config);
    scanner.run(reader)?;
    Ok(scanner.into_index())
}
