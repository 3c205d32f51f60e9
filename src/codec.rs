//! Length-prefixed frame codec.
//!
//! Every message, in either direction, is a fixed-width length header
//! followed by exactly that many payload bytes:
//!
//! ```text
//! +----------------+---------------------------+
//! | len: u32 (LE)  | payload (len bytes)       |
//! +----------------+---------------------------+
//!
//! Example:
//! 06 00 00 00 68 65 6c 6c 6f 31    ->  "hello1"
//! ```
//!
//! There is no message-type tag; payload interpretation belongs to the
//! request handler.

use bytes::{BufMut, BytesMut};
use thiserror::Error;

/// Size of the length prefix in bytes.
pub const HEADER_LEN: usize = 4;

/// Maximum payload size accepted or produced.
pub const MAX_PAYLOAD: usize = 4096;

/// Largest possible encoded frame.
pub const MAX_FRAME: usize = HEADER_LEN + MAX_PAYLOAD;

/// Framing errors. All of them are fatal for the connection that hit them.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    /// Declared or supplied payload length exceeds [`MAX_PAYLOAD`].
    #[error("frame exceeds max length: {len} > {max}", max = MAX_PAYLOAD)]
    Oversized {
        /// Offending payload length.
        len: usize,
    },
}

/// A frame located at the front of a buffer.
#[derive(Debug, PartialEq, Eq)]
pub struct Decoded<'a> {
    /// Payload bytes, borrowed from the input buffer.
    pub payload: &'a [u8],
    /// Bytes the frame occupies in the input (header + payload).
    pub consumed: usize,
}

/// Try to decode one frame from the front of `input`.
///
/// Returns `Ok(None)` when the header or payload is still incomplete; the
/// caller must wait for more bytes and nothing is consumed. An oversized
/// length is reported as soon as the header is visible, whether or not the
/// payload bytes have arrived.
pub fn try_decode_one(input: &[u8]) -> Result<Option<Decoded<'_>>, FrameError> {
    let Some(header) = input.get(..HEADER_LEN) else {
        return Ok(None);
    };

    let len = read_len(header);
    if len > MAX_PAYLOAD {
        return Err(FrameError::Oversized { len });
    }

    let end = HEADER_LEN + len;
    match input.get(HEADER_LEN..end) {
        Some(payload) => Ok(Some(Decoded {
            payload,
            consumed: end,
        })),
        None => Ok(None),
    }
}

/// Append an encoded frame carrying `payload` to `dst`.
///
/// `dst` is left untouched on error.
pub fn encode(payload: &[u8], dst: &mut BytesMut) -> Result<(), FrameError> {
    if payload.len() > MAX_PAYLOAD {
        return Err(FrameError::Oversized { len: payload.len() });
    }

    dst.reserve(HEADER_LEN + payload.len());
    dst.put_u32_le(payload.len() as u32);
    dst.put_slice(payload);
    Ok(())
}

/// Encode a single frame into a fresh vector.
pub fn encode_to_vec(payload: &[u8]) -> Result<Vec<u8>, FrameError> {
    let mut buf = BytesMut::with_capacity(HEADER_LEN + payload.len());
    encode(payload, &mut buf)?;
    Ok(buf.to_vec())
}

/// Interpret a 4-byte header as a payload length.
pub fn read_len(header: &[u8]) -> usize {
    let mut raw = [0u8; HEADER_LEN];
    raw.copy_from_slice(&header[..HEADER_LEN]);
    u32::from_le_bytes(raw) as usize
}
