//! gitwire-receive-pack: scanners and sinks for the push side of the smart
//! protocol.
//!
//! The request scanner validates shallow lines, ref-update commands, the
//! optional push certificate, and the opaque pack that follows. The report
//! scanner consumes the server's response, transparently demultiplexing
//! side-band framing when the peer negotiated it. [`output::SyncedWriter`]
//! is the shared sink for servers that produce the report from more than
//! one thread.
#![forbid(unsafe_code)]

pub mod output;
pub mod protocol;

pub use gitwire_core::{Error, Packet, Result};
pub use protocol::{ReportEvent, ReportScanner, RequestScanner};
