//! Protocol version 2 request and response grammars.
//!
//! v2 is command-oriented: a request names a command, lists capabilities,
//! and optionally carries an argument section after a delimiter. Responses
//! are section-oriented, with delimiters between sections and a flush (or a
//! response-end, under stateless pipelining) at the end. Section semantics
//! are left to the caller; only framing validity is enforced.

use std::io::Read;

use gitwire_core::capabilities::{is_capability_line, trim_lf};
use gitwire_core::pktline::Packet;
use gitwire_core::scan::ScannerCore;
use gitwire_core::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReqState {
    Command,
    Caps,
    Args,
    End,
}

impl ReqState {
    fn name(self) -> &'static str {
        match self {
            ReqState::Command => "command",
            ReqState::Caps => "capabilities",
            ReqState::Args => "arguments",
            ReqState::End => "end",
        }
    }
}

/// Pull-based scanner over a v2 request.
pub struct RequestScanner<R> {
    core: ScannerCore<R>,
    state: ReqState,
}

impl<R: Read> RequestScanner<R> {
    /// Create a scanner over `input`.
    pub fn new(input: R) -> Self {
        Self {
            core: ScannerCore::new(input),
            state: ReqState::Command,
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
        self.core.fail(Error::ShortRead {
            when: "reading a v2 request",
        })
    }

    fn step(&self, packet: &Packet) -> Result<ReqState> {
        match (self.state, packet) {
            (ReqState::Command, Packet::Data(line)) => {
                match trim_lf(line).strip_prefix(b"command=") {
                    Some(name) if !name.is_empty() => Ok(ReqState::Caps),
                    _ => Err(Error::InvalidLine {
                        what: "command",
                        line: line.as_slice().into(),
                    }),
                }
            }
            (ReqState::Caps, Packet::Data(line)) if is_capability_line(line) => Ok(ReqState::Caps),
            (ReqState::Caps, Packet::Delimiter) => Ok(ReqState::Args),
            // A capability-only request carries no argument section.
            (ReqState::Caps, Packet::Flush) => Ok(ReqState::End),
            (ReqState::Args, Packet::Data(_)) => Ok(ReqState::Args),
            (ReqState::Args, Packet::Flush) => Ok(ReqState::End),
            (state, packet) => Err(Error::UnexpectedPacket {
                state: state.name(),
                packet: packet.kind(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RespState {
    Start,
    InSection,
    End,
}

impl RespState {
    fn name(self) -> &'static str {
        match self {
            RespState::Start => "start",
            RespState::InSection => "in-section",
            RespState::End => "end",
        }
    }
}

/// Pull-based scanner over a v2 response.
///
/// Packets are exposed verbatim; section contents are opaque to this layer.
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
            when: "reading a v2 response",
        })
    }

    fn step(&self, packet: &Packet) -> Result<RespState> {
        match (self.state, packet) {
            (RespState::Start | RespState::InSection, Packet::Data(_)) => Ok(RespState::InSection),
            (RespState::InSection, Packet::Delimiter) => Ok(RespState::InSection),
            // An empty response (e.g. no matching refs) is a bare terminator.
            (RespState::Start | RespState::InSection, Packet::Flush | Packet::ResponseEnd) => {
                Ok(RespState::End)
            }
            (state, packet) => Err(Error::UnexpectedPacket {
                state: state.name(),
                packet: packet.kind(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn drain_request(input: &[u8]) -> (Vec<Packet>, Option<String>) {
        let mut scanner = RequestScanner::new(Cursor::new(input.to_vec()));
        let mut seen = Vec::new();
        while scanner.advance() {
            seen.push(scanner.current().unwrap().clone());
        }
        (seen, scanner.error().map(|e| e.to_string()))
    }

    fn drain_response(input: &[u8]) -> (Vec<Packet>, Option<String>) {
        let mut scanner = ResponseScanner::new(Cursor::new(input.to_vec()));
        let mut seen = Vec::new();
        while scanner.advance() {
            seen.push(scanner.current().unwrap().clone());
        }
        (seen, scanner.error().map(|e| e.to_string()))
    }

    #[test]
    fn ls_refs_request_with_delimited_arguments() {
        let (seen, err) = drain_request(b"0014command=ls-refs\n00010009peel\n0000");
        assert!(err.is_none(), "unexpected error: {err:?}");
        assert_eq!(
            seen,
            vec![
                Packet::Data(b"command=ls-refs\n".to_vec()),
                Packet::Delimiter,
                Packet::Data(b"peel\n".to_vec()),
                Packet::Flush,
            ]
        );
    }

    #[test]
    fn capability_only_request_ends_at_the_flush() {
        let (seen, err) = drain_request(b"0014command=ls-refs\n0015agent=git/2.43.0\n0000");
        assert!(err.is_none(), "unexpected error: {err:?}");
        assert_eq!(seen.len(), 3);
    }

    #[test]
    fn missing_command_line_is_invalid() {
        let (_, err) = drain_request(b"0009peel\n0000");
        assert!(err.unwrap().contains("malformed command line"));
    }

    #[test]
    fn delimiter_before_the_command_is_unexpected() {
        let (_, err) = drain_request(b"00010000");
        let err = err.unwrap();
        assert!(err.contains("unexpected delimiter packet"));
        assert!(err.contains("state command"));
    }

    #[test]
    fn truncated_request_is_a_short_read() {
        let (_, err) = drain_request(b"0014command=ls-refs\n");
        assert!(err.unwrap().contains("unexpected end of input"));
    }

    #[test]
    fn sectioned_response_with_response_end() {
        let input = concat!(
            "0014acknowledgments\n",
            "0031ACK 1111111111111111111111111111111111111111\n",
            "0001",
            "000dpackfile\n",
            "000b\x01PACK\x00\x00",
            "0002"
        );
        let (seen, err) = drain_response(input.as_bytes());
        assert!(err.is_none(), "unexpected error: {err:?}");
        assert_eq!(seen.len(), 6);
        assert_eq!(seen[5], Packet::ResponseEnd);
    }

    #[test]
    fn empty_response_is_a_bare_flush() {
        let (seen, err) = drain_response(b"0000");
        assert!(err.is_none(), "unexpected error: {err:?}");
        assert_eq!(seen, vec![Packet::Flush]);
    }

    #[test]
    fn response_end_after_delimiter_only_sections() {
        let (seen, err) = drain_response(b"000esomething\n00010009more\n0000");
        assert!(err.is_none(), "unexpected error: {err:?}");
        assert_eq!(seen.len(), 4);
    }
}
