//! Scanner for the `info/refs` advertisement response.
//!
//! Covers the v0/v1 shape (service banner, flush, ref lines, flush) and
//! branches into the v2 capability advertisement when the stream opens with
//! capability lines instead of a `# service=` banner. No protocol hint is
//! required; the first packet decides.

use std::io::Read;

use crate::capabilities;
use crate::pktline::Packet;
use crate::scan::ScannerCore;
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Start,
    AfterBanner,
    FirstRef,
    OtherRefs,
    CapList,
    End,
}

impl State {
    fn name(self) -> &'static str {
        match self {
            State::Start => "start",
            State::AfterBanner => "after-banner",
            State::FirstRef => "first-ref",
            State::OtherRefs => "other-refs",
            State::CapList => "capability-list",
            State::End => "end",
        }
    }
}

/// Pull-based scanner over an `info/refs` response.
///
/// Validates the service banner, the flush after it, and the shape of every
/// advertised ref line. An empty advertisement (banner, flush, flush) is
/// legal. Capabilities on the first ref line are split at the first NUL
/// only.
pub struct InfoRefsScanner<R> {
    core: ScannerCore<R>,
    state: State,
}

impl<R: Read> InfoRefsScanner<R> {
    /// Create a scanner over `input`.
    pub fn new(input: R) -> Self {
        Self {
            core: ScannerCore::new(input),
            state: State::Start,
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
        if self.core.error().is_some() || self.state == State::End {
            return self.core.finish();
        }
        self.core.fail(Error::ShortRead {
            when: "reading a ref advertisement",
        })
    }

    fn step(&self, packet: &Packet) -> Result<State> {
        match (self.state, packet) {
            (State::Start, Packet::Data(line)) => {
                if capabilities::parse_service_banner(line).is_some() {
                    Ok(State::AfterBanner)
                } else if is_v2_opening(line) {
                    Ok(State::CapList)
                } else {
                    Err(Error::InvalidLine {
                        what: "service banner",
                        line: line.as_slice().into(),
                    })
                }
            }
            (State::AfterBanner, Packet::Flush) => Ok(State::FirstRef),
            (State::FirstRef, Packet::Data(line)) | (State::OtherRefs, Packet::Data(line)) => {
                capabilities::parse_ref_line(line)?;
                Ok(State::OtherRefs)
            }
            // A flush right after the banner's flush: zero refs advertised.
            (State::FirstRef, Packet::Flush) | (State::OtherRefs, Packet::Flush) => Ok(State::End),
            (State::CapList, Packet::Data(line)) if capabilities::is_capability_line(line) => {
                Ok(State::CapList)
            }
            (State::CapList, Packet::Flush) => Ok(State::End),
            (state, packet) => Err(Error::UnexpectedPacket {
                state: state.name(),
                packet: packet.kind(),
            }),
        }
    }
}

fn is_v2_opening(line: &[u8]) -> bool {
    capabilities::trim_lf(line) == b"version 2" || capabilities::is_capability_line(line)
}
