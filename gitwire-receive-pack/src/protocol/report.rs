//! Scanner for the v1 receive-pack report (the server's response).
//!
//! The report is an `unpack <status>` line, one `ok`/`ng` line per ref, and
//! a flush. When side-band was negotiated every report packet arrives inside
//! a channel-1 payload, interleaved with progress (channel 2) and error
//! (channel 3) payloads; this scanner reassembles the channel-1 byte stream
//! through an internal buffer and parses it against the same grammar, so one
//! band payload may yield several report packets.

use std::collections::VecDeque;
use std::io::Read;

use bstr::{BString, ByteSlice};
use gitwire_core::capabilities::trim_lf;
use gitwire_core::pktline::{decode, Packet};
use gitwire_core::scan::ScannerCore;
use gitwire_core::sideband::SideBand;
use gitwire_core::{Error, Result};

/// One observed item of a receive-pack report stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportEvent {
    /// A packet of the report grammar: the `unpack` line, a per-ref status
    /// line, or the terminating flush.
    Status(Packet),
    /// Progress text from side-band channel 2.
    Progress(BString),
    /// Error text from side-band channel 3.
    Error(BString),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Unpack,
    PerRef,
    End,
}

impl State {
    fn name(self) -> &'static str {
        match self {
            State::Unpack => "unpack-status",
            State::PerRef => "per-ref-status",
            State::End => "end",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Framing {
    Undetected,
    Plain,
    SideBand,
}

/// Pull-based scanner over a receive-pack report.
///
/// Side-band framing is detected from the first packet without a hint: a
/// report line starts with ASCII text, a multiplexed frame with a channel
/// tag byte of 1, 2 or 3.
pub struct ReportScanner<R> {
    core: ScannerCore<R>,
    state: State,
    framing: Framing,
    /// Reassembly buffer for the channel-1 byte stream.
    main: Vec<u8>,
    /// Events decoded but not yet handed out.
    ready: VecDeque<ReportEvent>,
    current: Option<ReportEvent>,
}

impl<R: Read> ReportScanner<R> {
    /// Create a scanner over `input`.
    pub fn new(input: R) -> Self {
        Self {
            core: ScannerCore::new(input),
            state: State::Unpack,
            framing: Framing::Undetected,
            main: Vec::new(),
            ready: VecDeque::new(),
            current: None,
        }
    }

    /// Fetch the next report event; `false` on termination.
    ///
    /// Events decoded before a failure are delivered before the scanner
    /// reports the failure through [`error`](Self::error).
    pub fn advance(&mut self) -> bool {
        loop {
            if let Some(event) = self.ready.pop_front() {
                self.current = Some(event);
                return true;
            }
            if self.core.is_done() {
                return false;
            }
            match self.core.next_packet() {
                Some(packet) => {
                    if let Err(e) = self.ingest(packet) {
                        self.core.fail(e);
                    }
                }
                None => {
                    self.on_end();
                }
            }
        }
    }

    /// The most recent event.
    pub fn current(&self) -> Option<&ReportEvent> {
        self.current.as_ref()
    }

    /// The terminal error, if the scanner stopped abnormally.
    pub fn error(&self) -> Option<&Error> {
        self.core.error()
    }

    fn on_end(&mut self) {
        if self.state == State::End && self.main.is_empty() {
            self.core.finish();
        } else {
            self.core.fail(Error::ShortRead {
                when: "reading a receive-pack report",
            });
        }
    }

    fn ingest(&mut self, packet: Packet) -> Result<()> {
        if self.framing == Framing::Undetected {
            self.framing = match &packet {
                Packet::Data(payload) if SideBand::parse(payload).is_some() => Framing::SideBand,
                _ => Framing::Plain,
            };
        }
        match self.framing {
            Framing::Plain | Framing::Undetected => {
                self.step_report(packet)?;
                Ok(())
            }
            Framing::SideBand => self.ingest_band(packet),
        }
    }

    fn ingest_band(&mut self, packet: Packet) -> Result<()> {
        match packet {
            Packet::Data(payload) => match SideBand::parse(&payload) {
                Some(SideBand::Main(bytes)) => {
                    self.main.extend_from_slice(&bytes);
                    self.drain_main()
                }
                Some(SideBand::Progress(bytes)) => {
                    self.ready.push_back(ReportEvent::Progress(bytes.into()));
                    Ok(())
                }
                Some(SideBand::Error(bytes)) => {
                    self.ready.push_back(ReportEvent::Error(bytes.into()));
                    Ok(())
                }
                None => Err(Error::UnexpectedPacket {
                    state: self.state.name(),
                    packet: "unbanded data",
                }),
            },
            // The outer flush ends the multiplexed stream; the inner grammar
            // must already be complete.
            Packet::Flush => {
                if self.state != State::End || !self.main.is_empty() {
                    return Err(Error::ShortRead {
                        when: "reassembling the report stream",
                    });
                }
                self.core.finish();
                Ok(())
            }
            other => Err(Error::UnexpectedPacket {
                state: self.state.name(),
                packet: other.kind(),
            }),
        }
    }

    fn drain_main(&mut self) -> Result<()> {
        loop {
            match decode::streaming(&self.main)? {
                decode::Stream::Complete { packet, consumed } => {
                    self.main.drain(..consumed);
                    if let Packet::Err(msg) = packet {
                        return Err(Error::Peer(msg));
                    }
                    self.step_report(packet)?;
                }
                decode::Stream::Incomplete { .. } => return Ok(()),
            }
        }
    }

    fn step_report(&mut self, packet: Packet) -> Result<()> {
        let next = match (self.state, &packet) {
            (State::Unpack, Packet::Data(line)) if line.starts_with(b"unpack ") => {
                let status = trim_lf(&line[b"unpack ".len()..]);
                if status.is_empty() {
                    return Err(invalid("unpack status", line));
                }
                State::PerRef
            }
            (State::PerRef, Packet::Data(line)) => {
                validate_ref_status(line)?;
                State::PerRef
            }
            (State::PerRef, Packet::Flush) => State::End,
            (state, packet) => {
                return Err(Error::UnexpectedPacket {
                    state: state.name(),
                    packet: packet.kind(),
                })
            }
        };
        self.state = next;
        self.ready.push_back(ReportEvent::Status(packet));
        Ok(())
    }
}

/// Validate one `ok <ref>` or `ng <ref> <reason>` line.
fn validate_ref_status(line: &[u8]) -> Result<()> {
    let trimmed = trim_lf(line);
    if let Some(rest) = trimmed.strip_prefix(b"ok ") {
        if rest.is_empty() || rest.contains(&b' ') {
            return Err(invalid("ref status", line));
        }
        Ok(())
    } else if let Some(rest) = trimmed.strip_prefix(b"ng ") {
        match rest.split_once_str(" ") {
            Some((refname, reason)) if !refname.is_empty() && !reason.is_empty() => Ok(()),
            _ => Err(invalid("ref status", line)),
        }
    } else {
        Err(invalid("ref status", line))
    }
}

fn invalid(what: &'static str, line: &[u8]) -> Error {
    Error::InvalidLine {
        what,
        line: line.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gitwire_core::pktline::encode;
    use gitwire_core::sideband::Channel;
    use std::io::Cursor;

    fn drain(input: Vec<u8>) -> (Vec<ReportEvent>, Option<String>) {
        let mut scanner = ReportScanner::new(Cursor::new(input));
        let mut seen = Vec::new();
        while scanner.advance() {
            seen.push(scanner.current().unwrap().clone());
        }
        (seen, scanner.error().map(|e| e.to_string()))
    }

    fn status(bytes: &[u8]) -> ReportEvent {
        ReportEvent::Status(Packet::Data(bytes.to_vec()))
    }

    #[test]
    fn plain_report_without_side_band() {
        let input = b"000eunpack ok\n0014ok refs/heads/a\n0025ng refs/heads/b non-fast-forward\n0000"
            .to_vec();
        let (seen, err) = drain(input);
        assert!(err.is_none(), "unexpected error: {err:?}");
        assert_eq!(
            seen,
            vec![
                status(b"unpack ok\n"),
                status(b"ok refs/heads/a\n"),
                status(b"ng refs/heads/b non-fast-forward\n"),
                ReportEvent::Status(Packet::Flush),
            ]
        );
    }

    #[test]
    fn side_band_report_reassembles_the_inner_stream() {
        // Two inner pkt-lines split across two band payloads, with progress
        // in between.
        let inner: Vec<u8> = b"000eunpack ok\n0014ok refs/heads/a\n0000".to_vec();
        let (first, second) = inner.split_at(9);
        let mut input = Vec::new();
        encode::band_to_write(Channel::Data, first, &mut input).unwrap();
        encode::band_to_write(Channel::Progress, b"done.\n", &mut input).unwrap();
        encode::band_to_write(Channel::Data, second, &mut input).unwrap();
        encode::flush_to_write(&mut input).unwrap();

        let (seen, err) = drain(input);
        assert!(err.is_none(), "unexpected error: {err:?}");
        assert_eq!(
            seen,
            vec![
                ReportEvent::Progress("done.\n".into()),
                status(b"unpack ok\n"),
                status(b"ok refs/heads/a\n"),
                ReportEvent::Status(Packet::Flush),
            ]
        );
    }

    #[test]
    fn one_band_payload_may_carry_several_report_lines() {
        let inner: Vec<u8> = b"000eunpack ok\n0014ok refs/heads/a\n0000".to_vec();
        let mut input = Vec::new();
        encode::band_to_write(Channel::Data, &inner, &mut input).unwrap();
        encode::flush_to_write(&mut input).unwrap();

        let (seen, err) = drain(input);
        assert!(err.is_none(), "unexpected error: {err:?}");
        assert_eq!(seen.len(), 3);
    }

    #[test]
    fn channel_three_errors_reach_the_caller() {
        let mut input = Vec::new();
        encode::band_to_write(Channel::Error, b"something failed\n", &mut input).unwrap();
        let mut scanner = ReportScanner::new(Cursor::new(input));
        assert!(scanner.advance());
        assert_eq!(
            scanner.current(),
            Some(&ReportEvent::Error("something failed\n".into()))
        );
    }

    #[test]
    fn truncated_inner_stream_is_a_short_read() {
        // Band payload holds half an inner frame, then the outer flush.
        let mut input = Vec::new();
        encode::band_to_write(Channel::Data, b"000eunp", &mut input).unwrap();
        encode::flush_to_write(&mut input).unwrap();
        let (_, err) = drain(input);
        assert!(err.unwrap().contains("unexpected end of input"));
    }

    #[test]
    fn inner_err_frame_surfaces_as_a_peer_error() {
        let mut inner = b"000eunpack ok\n".to_vec();
        inner.extend_from_slice(b"0013ERR hook vetoed");
        let mut input = Vec::new();
        encode::band_to_write(Channel::Data, &inner, &mut input).unwrap();
        let mut scanner = ReportScanner::new(Cursor::new(input));
        assert!(scanner.advance()); // unpack ok
        assert!(!scanner.advance());
        match scanner.error() {
            Some(Error::Peer(msg)) => assert_eq!(msg.as_slice(), b"hook vetoed"),
            other => panic!("expected peer error, got {other:?}"),
        }
    }

    #[test]
    fn bad_unpack_line_is_rejected_in_both_framings() {
        let (_, err) = drain(b"000dunpacked\n0000".to_vec());
        assert!(err.unwrap().contains("unexpected data packet"));

        let mut input = Vec::new();
        encode::band_to_write(Channel::Data, b"000dunpacked\n", &mut input).unwrap();
        let (_, err) = drain(input);
        assert!(err.unwrap().contains("unexpected data packet"));
    }

    #[test]
    fn eof_before_the_report_is_a_short_read() {
        let (_, err) = drain(Vec::new());
        assert!(err.unwrap().contains("unexpected end of input"));
    }
}
