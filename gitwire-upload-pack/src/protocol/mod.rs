//! Upload-pack protocol grammars, one module per protocol version.

pub mod v1;
pub mod v2;
