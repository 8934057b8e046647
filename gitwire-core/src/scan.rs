//! Shared plumbing for the pull-based protocol scanners.
//!
//! Every phase scanner follows the same contract: `advance()` pulls and
//! validates one packet and returns `true`, or returns `false` on clean
//! termination or on a terminal error; `current()` is the most recent
//! packet; `error()` is the terminal error, if any. A terminated scanner
//! keeps returning `false`.

use std::io::Read;

use crate::pktline::{Packet, PacketReader};
use crate::Error;

/// Common state for a pull-based scanner: the frame reader, the packet most
/// recently produced, and the terminal error.
///
/// Phase scanners embed this and layer their grammar on top; packet
/// sourcing, termination and in-band `ERR` handling are identical
/// everywhere.
pub struct ScannerCore<R> {
    reader: PacketReader<R>,
    current: Option<Packet>,
    err: Option<Error>,
    done: bool,
}

impl<R: Read> ScannerCore<R> {
    /// Create the shared state over `input`.
    pub fn new(input: R) -> Self {
        Self {
            reader: PacketReader::new(input),
            current: None,
            err: None,
            done: false,
        }
    }

    /// The most recent packet, `None` before the first successful advance.
    pub fn current(&self) -> Option<&Packet> {
        self.current.as_ref()
    }

    /// The terminal error, set once the scanner stopped abnormally.
    pub fn error(&self) -> Option<&Error> {
        self.err.as_ref()
    }

    /// Whether the scanner has terminated.
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Pull the next packet.
    ///
    /// Returns `None` when the scanner is already done, on EOF (the caller
    /// decides whether EOF is permitted in its state, via [`error`](Self::error)
    /// being unset), or after storing a terminal error. An `ERR` packet from
    /// the peer terminates the scanner with [`Error::Peer`], preserving the
    /// message for forwarding.
    pub fn next_packet(&mut self) -> Option<Packet> {
        if self.done {
            return None;
        }
        match self.reader.read_packet() {
            Ok(Some(Packet::Err(msg))) => {
                self.fail(Error::Peer(msg));
                None
            }
            Ok(Some(packet)) => Some(packet),
            Ok(None) => None,
            Err(e) => {
                self.fail(e);
                None
            }
        }
    }

    /// Record `packet` as current and keep scanning.
    pub fn emit(&mut self, packet: Packet) -> bool {
        self.current = Some(packet);
        true
    }

    /// Terminate cleanly; any previously stored error is kept.
    pub fn finish(&mut self) -> bool {
        self.done = true;
        false
    }

    /// Terminate with `err`.
    pub fn fail(&mut self, err: Error) -> bool {
        if self.err.is_none() {
            self.err = Some(err);
        }
        self.done = true;
        false
    }
}

/// A grammar-free scanner exposing every frame of a stream verbatim.
///
/// Useful to proxies and inspection tools that forward packets opaquely.
/// In-band `ERR` packets still terminate it, like every other scanner.
pub struct GenericScanner<R> {
    core: ScannerCore<R>,
}

impl<R: Read> GenericScanner<R> {
    /// Create a scanner over `input`.
    pub fn new(input: R) -> Self {
        Self {
            core: ScannerCore::new(input),
        }
    }

    /// Fetch the next packet; `false` on end of stream or error.
    pub fn advance(&mut self) -> bool {
        match self.core.next_packet() {
            Some(packet) => self.core.emit(packet),
            None => self.core.finish(),
        }
    }

    /// The most recent packet.
    pub fn current(&self) -> Option<&Packet> {
        self.core.current()
    }

    /// The terminal error, if the stream ended abnormally.
    pub fn error(&self) -> Option<&Error> {
        self.core.error()
    }
}
