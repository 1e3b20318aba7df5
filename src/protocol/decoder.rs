//! Incremental frame decoder for partial reads.
//!
//! Two states:
//! - `WaitingForHeader`: need at least `HEADER_SIZE` bytes
//! - `WaitingForPayload`: header parsed, need `payload_length` more bytes

use bytes::{Buf, BytesMut};

use super::frame::Frame;
use super::header::{Header, DEFAULT_MAX_PAYLOAD_SIZE, HEADER_SIZE};
use crate::error::Result;

#[derive(Debug, Clone, Copy)]
enum State {
    WaitingForHeader,
    WaitingForPayload(Header),
}

/// Accumulates bytes and yields complete frames.
pub struct FrameDecoder {
    buffer: BytesMut,
    state: State,
    max_payload_size: u32,
}

impl FrameDecoder {
    /// Create a decoder with the default payload limit.
    pub fn new() -> Self {
        Self::with_max_payload(DEFAULT_MAX_PAYLOAD_SIZE)
    }

    /// Create a decoder with a custom payload limit.
    pub fn with_max_payload(max_payload_size: u32) -> Self {
        Self {
            buffer: BytesMut::with_capacity(8 * 1024),
            state: State::WaitingForHeader,
            max_payload_size,
        }
    }

    /// Push bytes and extract every complete frame.
    ///
    /// # Errors
    ///
    /// Returns a protocol error on an unknown kind or an invalid length.
    pub fn push(&mut self, data: &[u8]) -> Result<Vec<Frame>> {
        self.buffer.extend_from_slice(data);

        let mut frames = Vec::new();
        while let Some(frame) = self.try_extract_one()? {
            frames.push(frame);
        }
        Ok(frames)
    }

    /// Bytes buffered but not yet part of a complete frame.
    #[inline]
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    fn try_extract_one(&mut self) -> Result<Option<Frame>> {
        let header = match self.state {
            State::WaitingForPayload(header) => header,
            State::WaitingForHeader => {
                let Some(header) = Header::decode(&self.buffer)? else {
                    return Ok(None);
                };
                header.validate(self.max_payload_size)?;
                self.buffer.advance(HEADER_SIZE);
                header
            }
        };

        let len = header.payload_length as usize;
        if self.buffer.len() < len {
            self.state = State::WaitingForPayload(header);
            return Ok(None);
        }

        self.state = State::WaitingForHeader;
        let payload = self.buffer.split_to(len).freeze();
        Ok(Some(Frame::new(header, payload)))
    }
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}
