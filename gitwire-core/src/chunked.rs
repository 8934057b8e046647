//! Chunking writer: splits an arbitrary byte stream into bounded blocks.
//!
//! The producer half buffers writes and hands blocks of at most `sz` bytes
//! to a consumer over a rendezvous channel, so a stalled consumer blocks the
//! producer. The consumer typically re-frames each block as a side-band
//! payload; [`pump_to_band`] does exactly that.

use std::io;
use std::sync::mpsc::{sync_channel, Receiver, SyncSender};

use crate::pktline::{encode, MAX_BAND_DATA_LEN};
use crate::sideband::Channel;
use crate::{Error, Result};

/// Block size that still fits a side-band-1 pkt-line after wrapping.
pub const DEFAULT_BLOCK_SIZE: usize = MAX_BAND_DATA_LEN;

/// Create a chunking writer emitting blocks of at most `sz` bytes.
///
/// The receiver yields blocks in write order and sees end-of-stream once the
/// writer is closed. Dropping the receiver unblocks a waiting producer with
/// a broken-pipe error.
///
/// # Panics
///
/// Panics if `sz` is zero.
pub fn channel(sz: usize) -> (ChunkedWriter, Receiver<Vec<u8>>) {
    assert!(sz > 0, "block size must be non-zero");
    let (tx, rx) = sync_channel(0);
    (
        ChunkedWriter {
            buf: Vec::new(),
            sz,
            tx: Some(tx),
        },
        rx,
    )
}

/// Producer half of a chunked block stream.
///
/// The concatenation of all emitted blocks equals the concatenation of all
/// bytes handed to [`write`](Self::write), in order.
pub struct ChunkedWriter {
    buf: Vec<u8>,
    sz: usize,
    tx: Option<SyncSender<Vec<u8>>>,
}

impl ChunkedWriter {
    /// Append bytes, handing complete blocks to the consumer.
    ///
    /// Blocks while the consumer is not ready to accept the next block.
    pub fn write(&mut self, data: &[u8]) -> Result<usize> {
        if self.tx.is_none() {
            return Err(Error::AlreadyClosed);
        }
        self.buf.extend_from_slice(data);
        while self.buf.len() >= self.sz {
            let rest = self.buf.split_off(self.sz);
            let block = std::mem::replace(&mut self.buf, rest);
            self.send(block)?;
        }
        Ok(data.len())
    }

    /// Drain every buffered byte to the consumer, the last block possibly
    /// shorter than the configured size.
    pub fn flush(&mut self) -> Result<()> {
        if self.tx.is_none() {
            return Err(Error::AlreadyClosed);
        }
        while !self.buf.is_empty() {
            let at = self.buf.len().min(self.sz);
            let rest = self.buf.split_off(at);
            let block = std::mem::replace(&mut self.buf, rest);
            self.send(block)?;
        }
        Ok(())
    }

    /// Flush, then signal end-of-stream to the consumer. Idempotent.
    pub fn close(&mut self) -> Result<()> {
        if self.tx.is_some() {
            self.flush()?;
            self.tx = None;
        }
        Ok(())
    }

    fn send(&mut self, block: Vec<u8>) -> Result<()> {
        let tx = match self.tx.as_ref() {
            Some(tx) => tx,
            None => return Err(Error::AlreadyClosed),
        };
        if tx.send(block).is_err() {
            // The receiver is gone; latch shut so later calls fail fast.
            self.tx = None;
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "block consumer is gone",
            )));
        }
        Ok(())
    }
}

impl io::Write for ChunkedWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        ChunkedWriter::write(self, buf).map_err(into_io)
    }

    fn flush(&mut self) -> io::Result<()> {
        ChunkedWriter::flush(self).map_err(into_io)
    }
}

fn into_io(err: Error) -> io::Error {
    match err {
        Error::Io(e) => e,
        other => io::Error::new(io::ErrorKind::Other, other),
    }
}

/// Forward a block stream to `out`, wrapping each block as one side-band
/// frame on `channel`. Returns the number of frame bytes written.
///
/// Runs until the producer closes its half; typically called on the consumer
/// thread of [`channel`].
pub fn pump_to_band(
    rx: Receiver<Vec<u8>>,
    channel: Channel,
    out: &mut impl io::Write,
) -> Result<u64> {
    let mut written = 0u64;
    for block in rx {
        written += encode::band_to_write(channel, &block, out)? as u64;
    }
    Ok(written)
}
