//! pkt-line framing: the length-prefixed transfer unit of the smart protocol.
//!
//! A frame is a 4-digit lowercase hexadecimal length `LLLL` followed by
//! `LLLL - 4` bytes of payload. Three lengths are control frames without
//! payload: `0000` (flush), `0001` (delimiter) and `0002` (response-end).
//! `0004` is a data frame with an empty payload; `0003` is malformed.

pub mod decode;
pub mod encode;
mod read;

pub use read::PacketReader;

use bstr::BString;

use crate::Result;

/// Maximum total size of an encoded pkt-line, including the length prefix.
pub const MAX_LINE_LEN: usize = 0xFFFF;
/// Maximum payload of a plain data frame.
pub const MAX_DATA_LEN: usize = MAX_LINE_LEN - 4;
/// Maximum payload of a side-band frame, where one channel byte precedes the data.
pub const MAX_BAND_DATA_LEN: usize = MAX_LINE_LEN - 5;

pub(crate) const FLUSH_LINE: &[u8] = b"0000";
pub(crate) const DELIMITER_LINE: &[u8] = b"0001";
pub(crate) const RESPONSE_END_LINE: &[u8] = b"0002";
pub(crate) const ERR_PREFIX: &[u8] = b"ERR ";

/// A decoded pkt-line.
///
/// Every packet re-encodes to the exact bytes it was decoded from; an `Err`
/// packet re-encodes to the data frame it was classified from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
    /// `0000`, terminating a phase.
    Flush,
    /// `0001`, separating sections within a v2 phase.
    Delimiter,
    /// `0002`, terminating a v2 stateless-RPC response.
    ResponseEnd,
    /// A data frame and its payload.
    Data(Vec<u8>),
    /// A data frame whose payload began with `ERR `; only the message is kept.
    Err(BString),
}

impl Packet {
    /// Wrap a raw frame payload, classifying `ERR `-prefixed payloads.
    pub fn from_payload(payload: &[u8]) -> Packet {
        match payload.strip_prefix(ERR_PREFIX) {
            Some(msg) => Packet::Err(msg.into()),
            None => Packet::Data(payload.to_vec()),
        }
    }

    /// Payload bytes of a data frame, `None` for control frames.
    ///
    /// An `Err` packet exposes its message without the `ERR ` prefix.
    pub fn as_slice(&self) -> Option<&[u8]> {
        match self {
            Packet::Data(data) => Some(data),
            Packet::Err(msg) => Some(msg.as_ref()),
            Packet::Flush | Packet::Delimiter | Packet::ResponseEnd => None,
        }
    }

    /// Short name of the packet shape, used in error reporting.
    pub fn kind(&self) -> &'static str {
        match self {
            Packet::Flush => "flush",
            Packet::Delimiter => "delimiter",
            Packet::ResponseEnd => "response-end",
            Packet::Data(_) => "data",
            Packet::Err(_) => "err",
        }
    }

    /// Serialize to the wire bytes this packet decodes from.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        self.write_to(&mut out)?;
        Ok(out)
    }

    /// Write the wire form of this packet to `out`, returning the frame size.
    pub fn write_to(&self, out: &mut impl std::io::Write) -> Result<usize> {
        match self {
            Packet::Flush => encode::flush_to_write(out),
            Packet::Delimiter => encode::delim_to_write(out),
            Packet::ResponseEnd => encode::response_end_to_write(out),
            Packet::Data(data) => encode::data_to_write(data, out),
            Packet::Err(msg) => encode::error_to_write(msg.as_ref(), out),
        }
    }
}
