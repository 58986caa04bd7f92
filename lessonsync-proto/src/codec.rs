//! Serialization for the change log format.
//!
//! Provides encode/decode functions using postcard, along with
//! length-prefix framing for append-only record files.

use serde::Serialize;
use serde::de::DeserializeOwned;

/// Size of the little-endian length prefix in front of every frame.
pub const FRAME_PREFIX_LEN: usize = 4;

/// Error type for codec encode/decode operations.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// Serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),
    /// Frame is incomplete or has an invalid length prefix.
    #[error("invalid frame: {0}")]
    InvalidFrame(String),
}

/// Encodes a value into a byte vector using postcard.
///
/// # Errors
///
/// Returns `CodecError::Serialization` if the value cannot be serialized.
pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, CodecError> {
    postcard::to_allocvec(value).map_err(|e| CodecError::Serialization(e.to_string()))
}

/// Decodes a value from a byte slice using postcard.
///
/// # Errors
///
/// Returns `CodecError::Serialization` if the bytes cannot be deserialized.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, CodecError> {
    postcard::from_bytes(bytes).map_err(|e| CodecError::Serialization(e.to_string()))
}

/// Encodes a value with a 4-byte little-endian length prefix.
///
/// Wire format: `[u32 length (LE)][payload bytes]`
///
/// # Errors
///
/// Returns `CodecError::Serialization` if the value cannot be serialized,
/// or `CodecError::InvalidFrame` if the payload exceeds `u32::MAX` bytes.
pub fn encode_framed<T: Serialize>(value: &T) -> Result<Vec<u8>, CodecError> {
    let payload = encode(value)?;
    let len = u32::try_from(payload.len()).map_err(|_| {
        CodecError::InvalidFrame(format!(
            "payload too large for framing: {} bytes",
            payload.len()
        ))
    })?;
    let mut frame = Vec::with_capacity(FRAME_PREFIX_LEN + payload.len());
    frame.extend_from_slice(&len.to_le_bytes());
    frame.extend_from_slice(&payload);
    Ok(frame)
}

/// Reads the payload length from the start of a frame.
///
/// # Errors
///
/// Returns `CodecError::InvalidFrame` if fewer than four bytes are given.
pub fn frame_payload_len(bytes: &[u8]) -> Result<usize, CodecError> {
    let len_bytes: [u8; FRAME_PREFIX_LEN] = bytes
        .get(..FRAME_PREFIX_LEN)
        .and_then(|b| b.try_into().ok())
        .ok_or_else(|| {
            CodecError::InvalidFrame(format!(
                "need at least {FRAME_PREFIX_LEN} bytes for length prefix, got {}",
                bytes.len()
            ))
        })?;
    Ok(u32::from_le_bytes(len_bytes) as usize)
}

/// Decodes a length-prefixed frame.
///
/// Returns the decoded value and the total number of bytes consumed
/// from the input (including the length prefix).
///
/// # Errors
///
/// Returns `CodecError::InvalidFrame` if the input is too short or the
/// length prefix indicates more data than available, or
/// `CodecError::Serialization` if the payload cannot be deserialized.
pub fn decode_framed<T: DeserializeOwned>(bytes: &[u8]) -> Result<(T, usize), CodecError> {
    let payload_len = frame_payload_len(bytes)?;

    let total_len = FRAME_PREFIX_LEN + payload_len;
    if bytes.len() < total_len {
        return Err(CodecError::InvalidFrame(format!(
            "frame indicates {} bytes but only {} available",
            payload_len,
            bytes.len() - FRAME_PREFIX_LEN
        )));
    }

    let value = decode(&bytes[FRAME_PREFIX_LEN..total_len])?;
    Ok((value, total_len))
}
