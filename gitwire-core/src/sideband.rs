//! Side-band multiplexing: channel-tagged payloads inside data frames.
//!
//! During pack transfer the peer may interleave up to three streams inside
//! one pkt-line sequence, distinguished by a single leading byte: 1 carries
//! the data stream, 2 progress text, 3 a fatal error message.

use std::io::Write;

use crate::pktline::encode;
use crate::Result;

/// The three side-band channels and their wire tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    /// Channel 1: the multiplexed data stream (pack bytes, inner pkt-lines).
    Data = 1,
    /// Channel 2: progress text for the user.
    Progress = 2,
    /// Channel 3: fatal error text.
    Error = 3,
}

impl Channel {
    /// Map a leading payload byte to its channel, if it is one.
    pub fn from_byte(byte: u8) -> Option<Channel> {
        match byte {
            1 => Some(Channel::Data),
            2 => Some(Channel::Progress),
            3 => Some(Channel::Error),
            _ => None,
        }
    }
}

/// A de-multiplexed side-band payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SideBand {
    /// Channel 1 payload.
    Main(Vec<u8>),
    /// Channel 2 payload.
    Progress(Vec<u8>),
    /// Channel 3 payload.
    Error(Vec<u8>),
}

impl SideBand {
    /// Interpret a data-frame payload as a side-band packet.
    ///
    /// Returns `None` when the payload is empty or its leading byte is not a
    /// channel tag; such payloads are not side-band packets and pass through
    /// the protocol unchanged.
    pub fn parse(payload: &[u8]) -> Option<SideBand> {
        let (&tag, rest) = payload.split_first()?;
        Some(match Channel::from_byte(tag)? {
            Channel::Data => SideBand::Main(rest.to_vec()),
            Channel::Progress => SideBand::Progress(rest.to_vec()),
            Channel::Error => SideBand::Error(rest.to_vec()),
        })
    }

    /// The channel this payload arrived on.
    pub fn channel(&self) -> Channel {
        match self {
            SideBand::Main(_) => Channel::Data,
            SideBand::Progress(_) => Channel::Progress,
            SideBand::Error(_) => Channel::Error,
        }
    }

    /// The de-tagged payload bytes.
    pub fn bytes(&self) -> &[u8] {
        match self {
            SideBand::Main(b) | SideBand::Progress(b) | SideBand::Error(b) => b,
        }
    }

    /// Serialize as a channel-tagged pkt-line.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        self.write_to(&mut out)?;
        Ok(out)
    }

    /// Write as a channel-tagged pkt-line, returning the frame size.
    pub fn write_to(&self, out: &mut impl Write) -> Result<usize> {
        encode::band_to_write(self.channel(), self.bytes(), out)
    }
}
