//! Frame Envelope
//!
//! Body encoding for [`Frame`]s. The TCP layer adds the length prefix; this
//! module owns what sits behind it: one version byte followed by the bincode
//! encoding of the frame.

use super::Frame;
use crate::{Result, TransportError};
use types::TERM_TOO_DEEP;

/// Wire format constants
pub struct WireFormat;

impl WireFormat {
    /// Protocol version
    pub const VERSION: u8 = 1;
    /// Size of the big-endian length prefix in bytes
    pub const LENGTH_PREFIX_SIZE: usize = 4;
    /// Maximum frame body size (16MB)
    pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;
    /// Maximum frame body size before the peer has completed the handshake (64KB)
    pub const MAX_HANDSHAKE_FRAME_SIZE: usize = 64 * 1024;
}

/// Serialize a frame body (version byte + bincode payload)
pub fn encode_frame(frame: &Frame) -> Result<Vec<u8>> {
    let payload = bincode::serialize(frame)?;

    if payload.len() + 1 > WireFormat::MAX_FRAME_SIZE {
        return Err(TransportError::protocol(format!(
            "Frame size {} exceeds maximum {}",
            payload.len() + 1,
            WireFormat::MAX_FRAME_SIZE
        )));
    }

    let mut buffer = Vec::with_capacity(payload.len() + 1);
    buffer.push(WireFormat::VERSION);
    buffer.extend_from_slice(&payload);
    Ok(buffer)
}

/// Deserialize a frame body produced by [`encode_frame`]
pub fn decode_frame(data: &[u8]) -> Result<Frame> {
    let (version, payload) = data
        .split_first()
        .ok_or_else(|| TransportError::protocol("Empty frame"))?;

    if *version != WireFormat::VERSION {
        return Err(TransportError::protocol(format!(
            "Unsupported protocol version: {}",
            version
        )));
    }

    bincode::deserialize(payload).map_err(|error| {
        if matches!(&*error, bincode::ErrorKind::Custom(message) if message == TERM_TOO_DEEP) {
            TransportError::protocol(TERM_TOO_DEEP)
        } else {
            error.into()
        }
    })
}
