//! Protocol version 1 upload-pack grammars.
//!
//! The request side covers want/shallow/deepen collection and, in stateful
//! transports, the have/done negotiation that continues after the first
//! flush. The response side covers the optional shallow section, the
//! ACK/NAK section, and the packfile section. Pack chunks are opaque; they
//! may be raw or side-band multiplexed and are surfaced verbatim.

use std::io::Read;

use bstr::ByteSlice;
use gitwire_core::capabilities::{parse_oid, trim_lf};
use gitwire_core::pktline::Packet;
use gitwire_core::scan::ScannerCore;
use gitwire_core::{Error, Result};

/// The shape of one request line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReqLine {
    Want,
    Shallow,
    Deepen,
    Filter,
    Have,
    Done,
}

/// Classify and structurally validate one request line.
///
/// Only the first want line may carry a space-separated capability list
/// after the object id.
fn classify(line: &[u8], first_want: bool) -> Result<ReqLine> {
    let line = trim_lf(line);
    if let Some(rest) = line.strip_prefix(b"want ") {
        let oid_hex = match rest.find_byte(b' ') {
            Some(at) if first_want => &rest[..at],
            Some(_) => return Err(invalid("want", line)),
            None => rest,
        };
        parse_oid(oid_hex).map_err(|_| invalid("want", line))?;
        Ok(ReqLine::Want)
    } else if let Some(rest) = line.strip_prefix(b"shallow ") {
        parse_oid(rest).map_err(|_| invalid("shallow", line))?;
        Ok(ReqLine::Shallow)
    } else if let Some(rest) = line.strip_prefix(b"deepen ") {
        if rest.is_empty() || !rest.iter().all(u8::is_ascii_digit) {
            return Err(invalid("deepen", line));
        }
        Ok(ReqLine::Deepen)
    } else if let Some(rest) = line.strip_prefix(b"deepen-since ") {
        if rest.is_empty() || !rest.iter().all(u8::is_ascii_digit) {
            return Err(invalid("deepen-since", line));
        }
        Ok(ReqLine::Deepen)
    } else if let Some(rest) = line.strip_prefix(b"deepen-not ") {
        if rest.is_empty() {
            return Err(invalid("deepen-not", line));
        }
        Ok(ReqLine::Deepen)
    } else if let Some(rest) = line.strip_prefix(b"filter ") {
        if rest.is_empty() {
            return Err(invalid("filter", line));
        }
        Ok(ReqLine::Filter)
    } else if let Some(rest) = line.strip_prefix(b"have ") {
        parse_oid(rest).map_err(|_| invalid("have", line))?;
        Ok(ReqLine::Have)
    } else if line == b"done" {
        Ok(ReqLine::Done)
    } else {
        Err(invalid("upload-pack request", line))
    }
}

fn invalid(what: &'static str, line: &[u8]) -> Error {
    Error::InvalidLine {
        what,
        line: line.into(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReqState {
    FirstWant,
    Want,
    Shallow,
    Negotiate,
    Done,
    End,
}

impl ReqState {
    fn name(self) -> &'static str {
        match self {
            ReqState::FirstWant => "first-want",
            ReqState::Want => "want",
            ReqState::Shallow => "shallow",
            ReqState::Negotiate => "negotiate",
            ReqState::Done => "done",
            ReqState::End => "end",
        }
    }
}

/// Pull-based scanner over a v1 upload-pack request.
///
/// [`RequestScanner::new`] expects the stateless-RPC shape where the phase
/// is terminated by a flush; [`RequestScanner::stateful`] additionally
/// accepts have/done negotiation after the flush and a clean EOF once `done`
/// was seen.
pub struct RequestScanner<R> {
    core: ScannerCore<R>,
    state: ReqState,
    stateful: bool,
}

impl<R: Read> RequestScanner<R> {
    /// Scanner for a stateless-RPC (HTTP) request.
    pub fn new(input: R) -> Self {
        Self::with_mode(input, false)
    }

    /// Scanner for a stateful (SSH, git-daemon) request stream.
    pub fn stateful(input: R) -> Self {
        Self::with_mode(input, true)
    }

    fn with_mode(input: R, stateful: bool) -> Self {
        Self {
            core: ScannerCore::new(input),
            state: ReqState::FirstWant,
            stateful,
        }
    }

    /// Fetch and validate the next packet; `false` on termination.
    pub fn advance(&mut self) -> bool {
        let packet = match self.core.next_packet() {
            Some(packet) => packet,
            None => return self.on_end(),
        };
        match self.step(&packet) {
            Ok(next) => {
                self.state = next;
                self.core.emit(packet)
            }
            Err(e) => self.core.fail(e),
        }
    }

    /// The most recent packet.
    pub fn current(&self) -> Option<&Packet> {
        self.core.current()
    }

    /// The terminal error, if the scanner stopped abnormally.
    pub fn error(&self) -> Option<&Error> {
        self.core.error()
    }

    fn on_end(&mut self) -> bool {
        if self.core.error().is_some() || self.state == ReqState::End {
            return self.core.finish();
        }
        // A stateful peer may hang up after `done` or mid-negotiation; a
        // stateless request is only complete once flushed.
        if self.stateful && matches!(self.state, ReqState::Done | ReqState::Negotiate) {
            return self.core.finish();
        }
        self.core.fail(Error::ShortRead {
            when: "reading an upload-pack request",
        })
    }

    fn step(&self, packet: &Packet) -> Result<ReqState> {
        let unexpected = || Error::UnexpectedPacket {
            state: self.state.name(),
            packet: packet.kind(),
        };
        match (self.state, packet) {
            (ReqState::FirstWant, Packet::Data(line)) => match classify(line, true)? {
                ReqLine::Want => Ok(ReqState::Want),
                _ => Err(unexpected()),
            },
            // A flush before any want: the client has nothing to ask for.
            (ReqState::FirstWant, Packet::Flush) => Ok(ReqState::End),
            (ReqState::Want, Packet::Data(line)) => match classify(line, false)? {
                ReqLine::Want | ReqLine::Filter | ReqLine::Have => Ok(ReqState::Want),
                ReqLine::Shallow | ReqLine::Deepen => Ok(ReqState::Shallow),
                ReqLine::Done => Ok(ReqState::Done),
            },
            (ReqState::Want, Packet::Flush) => Ok(self.post_flush()),
            (ReqState::Shallow, Packet::Data(line)) => match classify(line, false)? {
                ReqLine::Shallow | ReqLine::Deepen => Ok(ReqState::Shallow),
                _ => Err(unexpected()),
            },
            (ReqState::Shallow, Packet::Flush) => Ok(self.post_flush()),
            (ReqState::Negotiate, Packet::Data(line)) => match classify(line, false)? {
                ReqLine::Have => Ok(ReqState::Negotiate),
                ReqLine::Done => Ok(ReqState::Done),
                _ => Err(unexpected()),
            },
            // Batch boundary between have rounds.
            (ReqState::Negotiate, Packet::Flush) => Ok(ReqState::Negotiate),
            (ReqState::Done, Packet::Flush) => Ok(ReqState::End),
            (ReqState::End, Packet::Data(line)) if self.stateful => match classify(line, false)? {
                ReqLine::Have => Ok(ReqState::Negotiate),
                ReqLine::Done => Ok(ReqState::Done),
                _ => Err(unexpected()),
            },
            (ReqState::End, Packet::Flush) if self.stateful => Ok(ReqState::End),
            _ => Err(unexpected()),
        }
    }

    fn post_flush(&self) -> ReqState {
        if self.stateful {
            ReqState::Negotiate
        } else {
            ReqState::End
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RespState {
    Start,
    Shallow,
    Ack,
    Pack,
    End,
}

impl RespState {
    fn name(self) -> &'static str {
        match self {
            RespState::Start => "start",
            RespState::Shallow => "shallow",
            RespState::Ack => "acknowledgements",
            RespState::Pack => "pack",
            RespState::End => "end",
        }
    }
}

/// Pull-based scanner over a v1 upload-pack response.
///
/// Pack data may begin directly after an ACK or NAK without a separating
/// flush; observed servers do this even though the documentation is silent
/// on it.
pub struct ResponseScanner<R> {
    core: ScannerCore<R>,
    state: RespState,
}

impl<R: Read> ResponseScanner<R> {
    /// Create a scanner over `input`.
    pub fn new(input: R) -> Self {
        Self {
            core: ScannerCore::new(input),
            state: RespState::Start,
        }
    }

    /// Fetch and validate the next packet; `false` on termination.
    pub fn advance(&mut self) -> bool {
        let packet = match self.core.next_packet() {
            Some(packet) => packet,
            None => return self.on_end(),
        };
        match self.step(&packet) {
            Ok(next) => {
                self.state = next;
                self.core.emit(packet)
            }
            Err(e) => self.core.fail(e),
        }
    }

    /// The most recent packet.
    pub fn current(&self) -> Option<&Packet> {
        self.core.current()
    }

    /// The terminal error, if the scanner stopped abnormally.
    pub fn error(&self) -> Option<&Error> {
        self.core.error()
    }

    fn on_end(&mut self) -> bool {
        if self.core.error().is_some() || self.state == RespState::End {
            return self.core.finish();
        }
        self.core.fail(Error::ShortRead {
            when: "reading an upload-pack response",
        })
    }

    fn step(&self, packet: &Packet) -> Result<RespState> {
        match (self.state, packet) {
            (RespState::Start, Packet::Data(line)) if is_shallow_line(line) => {
                validate_shallow_line(line)?;
                Ok(RespState::Shallow)
            }
            // The shallow phase may be empty; fall through to the
            // acknowledgement rules.
            (RespState::Start, Packet::Data(line)) => ack_step(line),
            (RespState::Start, Packet::Flush) => Ok(RespState::Pack),
            (RespState::Shallow, Packet::Data(line)) if is_shallow_line(line) => {
                validate_shallow_line(line)?;
                Ok(RespState::Shallow)
            }
            (RespState::Shallow, Packet::Flush) => Ok(RespState::Ack),
            (RespState::Ack, Packet::Data(line)) => ack_step(line),
            (RespState::Ack, Packet::Flush) => Ok(RespState::Pack),
            (RespState::Pack, Packet::Data(_)) => Ok(RespState::Pack),
            (RespState::Pack, Packet::Flush) => Ok(RespState::End),
            (state, packet) => Err(Error::UnexpectedPacket {
                state: state.name(),
                packet: packet.kind(),
            }),
        }
    }
}

fn is_shallow_line(line: &[u8]) -> bool {
    line.starts_with(b"shallow ") || line.starts_with(b"unshallow ")
}

fn validate_shallow_line(line: &[u8]) -> Result<()> {
    let trimmed = trim_lf(line);
    let rest = trimmed
        .strip_prefix(b"shallow ")
        .or_else(|| trimmed.strip_prefix(b"unshallow "))
        .unwrap_or_default();
    parse_oid(rest).map_err(|_| invalid("shallow", line))?;
    Ok(())
}

/// Acknowledgement-phase handling: ACK and NAK lines stay in the phase,
/// anything else is the first opaque pack chunk.
fn ack_step(line: &[u8]) -> Result<RespState> {
    if let Some(rest) = trim_lf(line).strip_prefix(b"ACK ") {
        let (oid_hex, status) = match rest.find_byte(b' ') {
            Some(at) => (&rest[..at], Some(&rest[at + 1..])),
            None => (rest, None),
        };
        parse_oid(oid_hex).map_err(|_| invalid("ACK", line))?;
        match status {
            None | Some(b"continue") | Some(b"common") | Some(b"ready") => Ok(RespState::Ack),
            Some(_) => Err(invalid("ACK", line)),
        }
    } else if trim_lf(line) == b"NAK" {
        Ok(RespState::Ack)
    } else {
        Ok(RespState::Pack)
    }
}
