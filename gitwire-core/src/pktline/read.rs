//! Pull-based pkt-line reading over a blocking byte source.

use std::io::Read;

use super::{decode, Packet};
use crate::{Error, Result};

/// Reads one pkt-line at a time from any blocking `Read`.
///
/// The reader owns no knowledge of whether the source is a socket, pipe or
/// file. EOF between frames is a clean end of stream; EOF inside a frame is
/// a [`Error::ShortRead`].
pub struct PacketReader<R> {
    inner: R,
}

impl<R: Read> PacketReader<R> {
    /// Create a reader over `inner`.
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    /// Read the next frame, or `Ok(None)` on EOF at a frame boundary.
    ///
    /// Data payloads beginning with `ERR ` come back as [`Packet::Err`].
    pub fn read_packet(&mut self) -> Result<Option<Packet>> {
        let mut prefix = [0u8; 4];
        if !self.fill(&mut prefix, true)? {
            return Ok(None);
        }
        let len = usize::from(decode::hex_len(&prefix)?);
        let packet = match len {
            0 => Packet::Flush,
            1 => Packet::Delimiter,
            2 => Packet::ResponseEnd,
            3 => return Err(Error::MalformedLength { prefix }),
            _ => {
                let mut payload = vec![0u8; len - 4];
                self.fill(&mut payload, false)?;
                Packet::from_payload(&payload)
            }
        };
        Ok(Some(packet))
    }

    /// Consume the reader and return the underlying source.
    pub fn into_inner(self) -> R {
        self.inner
    }

    /// Read exactly `buf.len()` bytes. When `at_boundary` is set, EOF before
    /// the first byte is a clean end of stream rather than an error.
    fn fill(&mut self, buf: &mut [u8], at_boundary: bool) -> Result<bool> {
        let mut read = 0;
        while read < buf.len() {
            match self.inner.read(&mut buf[read..]) {
                Ok(0) => {
                    if read == 0 && at_boundary {
                        return Ok(false);
                    }
                    let when = if at_boundary {
                        "reading a pkt-line length prefix"
                    } else {
                        "reading a pkt-line payload"
                    };
                    return Err(Error::ShortRead { when });
                }
                Ok(n) => read += n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(Error::Io(e)),
            }
        }
        Ok(true)
    }
}
