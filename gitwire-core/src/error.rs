//! Error types shared by the codec, the scanners, and the writers.

use bstr::BString;

/// Result type alias for wire-protocol operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by this workspace.
///
/// All scanner errors are terminal: once `advance()` has returned `false`
/// with an error set, the scanner can not be advanced further.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The 4-byte length prefix was not lowercase hexadecimal.
    #[error("malformed pkt-line length prefix {:?}", String::from_utf8_lossy(.prefix))]
    MalformedLength {
        /// The offending prefix bytes as read from the wire.
        prefix: [u8; 4],
    },

    /// The byte source ended in the middle of a frame or phase.
    #[error("unexpected end of input while {when}")]
    ShortRead {
        /// What the codec or scanner was waiting for.
        when: &'static str,
    },

    /// The payload can not be framed within the 65535-byte pkt-line limit.
    #[error("payload of {len} bytes exceeds the pkt-line limit")]
    PayloadTooLarge {
        /// Length of the rejected payload.
        len: usize,
    },

    /// The packet shape is not acceptable in the scanner's current state.
    #[error("unexpected {packet} packet in state {state}")]
    UnexpectedPacket {
        /// Name of the scanner state that rejected the packet.
        state: &'static str,
        /// Shape of the rejected packet.
        packet: &'static str,
    },

    /// A line-shaped payload did not match its structural grammar.
    #[error("malformed {what} line: {line:?}")]
    InvalidLine {
        /// Which line grammar was violated.
        what: &'static str,
        /// The offending line.
        line: BString,
    },

    /// The peer sent an in-band `ERR` packet.
    ///
    /// The message is preserved verbatim so that a proxy can forward the
    /// packet unchanged; see [`crate::Packet::Err`].
    #[error("remote error: {0}")]
    Peer(BString),

    /// The writer was closed; later operations are discarded.
    #[error("writer is already closed")]
    AlreadyClosed,

    /// The underlying byte source or sink failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// The peer-sent message if this is an in-band `ERR` error.
    pub fn as_peer_message(&self) -> Option<&[u8]> {
        match self {
            Error::Peer(msg) => Some(msg.as_ref()),
            _ => None,
        }
    }
}
