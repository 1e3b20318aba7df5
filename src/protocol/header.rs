//! Frame header encoding and decoding.

use crate::error::{BridgeError, Result};

/// Header size in bytes.
pub const HEADER_SIZE: usize = 9;

/// Default maximum payload size (64 MB).
pub const DEFAULT_MAX_PAYLOAD_SIZE: u32 = 64 * 1024 * 1024;

/// What a frame carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FrameKind {
    /// The single result of a deferred exchange.
    Response = 0x01,
    /// One emitted value of a streaming exchange.
    Chunk = 0x02,
    /// Normal end of a stream. Always empty.
    StreamEnd = 0x03,
    /// Failure; payload is a UTF-8 message.
    Error = 0x04,
    /// Exchange handled with no body. Always empty.
    NoContent = 0x05,
}

impl FrameKind {
    /// Parse a kind byte.
    pub fn from_u8(raw: u8) -> Result<Self> {
        match raw {
            0x01 => Ok(Self::Response),
            0x02 => Ok(Self::Chunk),
            0x03 => Ok(Self::StreamEnd),
            0x04 => Ok(Self::Error),
            0x05 => Ok(Self::NoContent),
            other => Err(BridgeError::Protocol(format!(
                "Unknown frame kind 0x{other:02X}"
            ))),
        }
    }

    /// Whether this kind ends the exchange.
    #[inline]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Chunk)
    }

    /// Whether frames of this kind must have an empty payload.
    #[inline]
    pub fn is_empty_kind(&self) -> bool {
        matches!(self, Self::StreamEnd | Self::NoContent)
    }
}

/// Decoded frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Exchange this frame belongs to.
    pub request_id: u32,
    /// Frame kind.
    pub kind: FrameKind,
    /// Payload length in bytes.
    pub payload_length: u32,
}

impl Header {
    /// Create a new header.
    pub fn new(request_id: u32, kind: FrameKind, payload_length: u32) -> Self {
        Self {
            request_id,
            kind,
            payload_length,
        }
    }

    /// Encode header to bytes (Big Endian).
    ///
    /// # Example
    ///
    /// ```
    /// use reactive_bridge::protocol::{FrameKind, Header, HEADER_SIZE};
    ///
    /// let bytes = Header::new(42, FrameKind::Chunk, 5).encode();
    /// assert_eq!(bytes.len(), HEADER_SIZE);
    /// assert_eq!(bytes[4], 0x02);
    /// ```
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0..4].copy_from_slice(&self.request_id.to_be_bytes());
        buf[4] = self.kind as u8;
        buf[5..9].copy_from_slice(&self.payload_length.to_be_bytes());
        buf
    }

    /// Decode header from bytes.
    ///
    /// Returns `Ok(None)` if the buffer is too short.
    pub fn decode(buf: &[u8]) -> Result<Option<Self>> {
        if buf.len() < HEADER_SIZE {
            return Ok(None);
        }
        let kind = FrameKind::from_u8(buf[4])?;
        Ok(Some(Self {
            request_id: u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]),
            kind,
            payload_length: u32::from_be_bytes([buf[5], buf[6], buf[7], buf[8]]),
        }))
    }

    /// Validate length constraints.
    pub fn validate(&self, max_payload_size: u32) -> Result<()> {
        if self.payload_length > max_payload_size {
            return Err(BridgeError::Protocol(format!(
                "Payload size {} exceeds maximum {}",
                self.payload_length, max_payload_size
            )));
        }

        if self.kind.is_empty_kind() && self.payload_length != 0 {
            return Err(BridgeError::Protocol(format!(
                "{:?} frames must have an empty payload",
                self.kind
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_decode() {
        let header = Header::new(0xDEAD_BEEF, FrameKind::Error, 17);
        let bytes = header.encode();

        assert_eq!(&bytes[0..4], &[0xDE, 0xAD, 0xBE, 0xEF]);
        assert_eq!(bytes[4], 0x04);
        assert_eq!(&bytes[5..9], &[0, 0, 0, 17]);

        let decoded = Header::decode(&bytes).unwrap().unwrap();
        assert_eq!(decoded, header);
    }

    #[test]
    fn test_decode_short_buffer() {
        assert!(Header::decode(&[0, 0, 0]).unwrap().is_none());
    }

    #[test]
    fn test_decode_unknown_kind() {
        let mut bytes = Header::new(1, FrameKind::Chunk, 0).encode();
        bytes[4] = 0x7F;
        assert!(matches!(
            Header::decode(&bytes),
            Err(BridgeError::Protocol(_))
        ));
    }

    #[test]
    fn test_validate() {
        assert!(Header::new(1, FrameKind::Chunk, 10).validate(100).is_ok());
        assert!(Header::new(1, FrameKind::Chunk, 101).validate(100).is_err());
        assert!(Header::new(1, FrameKind::StreamEnd, 1).validate(100).is_err());
        assert!(Header::new(1, FrameKind::NoContent, 0).validate(100).is_ok());
    }

    #[test]
    fn test_terminal_kinds() {
        assert!(!FrameKind::Chunk.is_terminal());
        assert!(FrameKind::Response.is_terminal());
        assert!(FrameKind::StreamEnd.is_terminal());
        assert!(FrameKind::Error.is_terminal());
        assert!(FrameKind::NoContent.is_terminal());
    }
}
