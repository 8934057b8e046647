//! pkt-line serialization helpers.

use std::io::Write;

use super::{
    DELIMITER_LINE, ERR_PREFIX, FLUSH_LINE, MAX_BAND_DATA_LEN, MAX_DATA_LEN, MAX_LINE_LEN,
    RESPONSE_END_LINE,
};
use crate::sideband::Channel;
use crate::{Error, Result};

/// Write a flush (`0000`) frame, returning the frame size.
pub fn flush_to_write(out: &mut impl Write) -> Result<usize> {
    out.write_all(FLUSH_LINE)?;
    Ok(4)
}

/// Write a delimiter (`0001`) frame, returning the frame size.
pub fn delim_to_write(out: &mut impl Write) -> Result<usize> {
    out.write_all(DELIMITER_LINE)?;
    Ok(4)
}

/// Write a response-end (`0002`) frame, returning the frame size.
pub fn response_end_to_write(out: &mut impl Write) -> Result<usize> {
    out.write_all(RESPONSE_END_LINE)?;
    Ok(4)
}

/// Write `data` as one data frame, returning the frame size.
pub fn data_to_write(data: &[u8], out: &mut impl Write) -> Result<usize> {
    if data.len() > MAX_DATA_LEN {
        return Err(Error::PayloadTooLarge { len: data.len() });
    }
    out.write_all(&hex_prefix(data.len() + 4))?;
    out.write_all(data)?;
    Ok(data.len() + 4)
}

/// Write `message` as one in-band `ERR ` frame, returning the frame size.
pub fn error_to_write(message: &[u8], out: &mut impl Write) -> Result<usize> {
    let payload_len = message.len() + ERR_PREFIX.len();
    if payload_len > MAX_DATA_LEN {
        return Err(Error::PayloadTooLarge { len: payload_len });
    }
    out.write_all(&hex_prefix(payload_len + 4))?;
    out.write_all(ERR_PREFIX)?;
    out.write_all(message)?;
    Ok(payload_len + 4)
}

/// Write `data` as one frame on the given side-band channel, returning the
/// frame size.
pub fn band_to_write(channel: Channel, data: &[u8], out: &mut impl Write) -> Result<usize> {
    if data.len() > MAX_BAND_DATA_LEN {
        return Err(Error::PayloadTooLarge { len: data.len() });
    }
    out.write_all(&hex_prefix(data.len() + 5))?;
    out.write_all(&[channel as u8])?;
    out.write_all(data)?;
    Ok(data.len() + 5)
}

fn hex_prefix(len: usize) -> [u8; 4] {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    debug_assert!(len <= MAX_LINE_LEN);
    let mut prefix = [0u8; 4];
    for (i, byte) in prefix.iter_mut().enumerate() {
        *byte = HEX[len >> (12 - 4 * i) & 0xF];
    }
    prefix
}
