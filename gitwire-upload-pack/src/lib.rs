//! gitwire-upload-pack: scanners for the fetch side of the smart protocol.
//!
//! This crate validates the packet grammars of the upload-pack phases:
//! the v1 request (wants, shallow/deepen, negotiation), the v1 response
//! (shallow section, ACK/NAK section, packfile), and the v2 command
//! request/response pair. Pack bytes pass through opaquely; nothing here
//! decodes packfiles or touches a repository.
//!
//! The `info/refs` advertisement scanner these phases follow lives in
//! `gitwire_core::advert`, shared with receive-pack.
#![forbid(unsafe_code)]

pub mod protocol;

pub use gitwire_core::{Error, Packet, Result};
pub use protocol::{v1, v2};
