//! Synchronized pkt-line sink for the two-producer report path.
//!
//! While a push is being processed, the report writer and the side-band
//! multiplexer (progress, keepalives) both emit frames to the same client
//! connection. [`SyncedWriter`] serializes them under one mutex and latches
//! shut on first close; [`SyncedWriter::close_with_error`] emits a final
//! channel-3 frame so the client sees why the stream ended. Writes after
//! close are discarded with the benign [`Error::AlreadyClosed`], which late
//! producers are expected to ignore.

use std::io::Write;
use std::sync::{Arc, Mutex, MutexGuard};

use gitwire_core::pktline::{encode, Packet};
use gitwire_core::sideband::Channel;
use gitwire_core::{Error, Result};

struct Inner<W> {
    out: W,
    closed: bool,
}

/// A cloneable, mutex-guarded pkt-line writer with sticky close semantics.
pub struct SyncedWriter<W> {
    inner: Arc<Mutex<Inner<W>>>,
}

impl<W> Clone for SyncedWriter<W> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<W: Write> SyncedWriter<W> {
    /// Create a shared writer over `out`.
    pub fn new(out: W) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner { out, closed: false })),
        }
    }

    /// Write one packet.
    pub fn write_packet(&self, packet: &Packet) -> Result<()> {
        let mut inner = self.lock();
        if inner.closed {
            return Err(Error::AlreadyClosed);
        }
        packet.write_to(&mut inner.out)?;
        Ok(())
    }

    /// Write `data` as one frame on the given side-band channel.
    pub fn write_band(&self, channel: Channel, data: &[u8]) -> Result<()> {
        let mut inner = self.lock();
        if inner.closed {
            return Err(Error::AlreadyClosed);
        }
        encode::band_to_write(channel, data, &mut inner.out)?;
        Ok(())
    }

    /// Write a flush frame.
    pub fn write_flush(&self) -> Result<()> {
        self.write_packet(&Packet::Flush)
    }

    /// Flush the sink and latch the writer shut. Later writes are discarded.
    ///
    /// Only the first close has any effect.
    pub fn close(&self) -> Result<()> {
        let mut inner = self.lock();
        if inner.closed {
            return Ok(());
        }
        inner.closed = true;
        inner.out.flush()?;
        Ok(())
    }

    /// Latch the writer shut, first emitting `message` on channel 3.
    ///
    /// A writer that is already closed discards the message and reports
    /// [`Error::AlreadyClosed`].
    pub fn close_with_error(&self, message: &[u8]) -> Result<()> {
        let mut inner = self.lock();
        if inner.closed {
            return Err(Error::AlreadyClosed);
        }
        inner.closed = true;
        encode::band_to_write(Channel::Error, message, &mut inner.out)?;
        inner.out.flush()?;
        Ok(())
    }

    /// Whether the writer has been latched shut.
    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Unwrap the sink when this is the last handle to it.
    pub fn try_into_inner(self) -> Option<W> {
        Arc::try_unwrap(self.inner)
            .ok()
            .map(|mutex| match mutex.into_inner() {
                Ok(inner) => inner.out,
                Err(poisoned) => poisoned.into_inner().out,
            })
    }

    fn lock(&self) -> MutexGuard<'_, Inner<W>> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
