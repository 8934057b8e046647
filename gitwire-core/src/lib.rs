//! gitwire-core: shared wire-protocol primitives for the gitwire crates.
//!
//! This crate provides the byte-level building blocks used by
//! `gitwire-upload-pack` and `gitwire-receive-pack`: the pkt-line framing
//! codec, the decoded packet taxonomy, the side-band codec, the chunking
//! writer, and the pull-based scanner plumbing every protocol phase builds
//! on. It also hosts the scanner for the `info/refs` advertisement, which is
//! shared by both services.
//!
//! Nothing here touches a repository or a transport; every scanner is bound
//! to a plain `Read` source and every writer to a plain `Write` sink.
#![deny(missing_docs, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod advert;
pub mod capabilities;
pub mod chunked;
mod error;
pub mod pktline;
pub mod scan;
pub mod sideband;

pub use error::{Error, Result};
pub use pktline::Packet;
pub use sideband::{Channel, SideBand};
