//! Request context for handlers.
//!
//! Provides methods for writing an exchange's frames:
//! - `respond` - the single result of a deferred exchange
//! - `no_content` - handled, no body
//! - `error` - failure
//! - `try_chunk` / `try_end` - streaming frames, non-blocking
//!
//! The async variants wait on writer backpressure and are used from tokio
//! tasks. The `try_` variants never block and only fail once the writer is
//! gone; they are what emitters call from producer threads.

use bytes::Bytes;
use serde::Serialize;

use crate::codec::{self, ContentType};
use crate::error::Result;
use crate::protocol::FrameKind;
use crate::writer::{OutboundFrame, WriterHandle};

/// Context of one request/response exchange.
///
/// `Clone` and cheap; every clone writes to the same exchange.
#[derive(Clone)]
pub struct RequestContext {
    method_id: u16,
    request_id: u32,
    writer: Option<WriterHandle>,
}

impl RequestContext {
    /// Create a context without a writer (frames are discarded).
    pub fn new(method_id: u16, request_id: u32) -> Self {
        Self {
            method_id,
            request_id,
            writer: None,
        }
    }

    /// Create a context writing through `writer`.
    pub fn with_writer(method_id: u16, request_id: u32, writer: WriterHandle) -> Self {
        Self {
            method_id,
            request_id,
            writer: Some(writer),
        }
    }

    /// Method ID of the handler serving this exchange.
    #[inline]
    pub fn method_id(&self) -> u16 {
        self.method_id
    }

    /// Request ID of this exchange.
    #[inline]
    pub fn request_id(&self) -> u32 {
        self.request_id
    }

    /// Whether the transport behind this context is gone.
    pub fn is_closed(&self) -> bool {
        self.writer.as_ref().is_some_and(WriterHandle::is_closed)
    }

    /// Send the single result, serialized per `content_type`.
    pub async fn respond<T: Serialize + ?Sized>(
        &self,
        value: &T,
        content_type: ContentType,
    ) -> Result<()> {
        let payload = codec::encode(content_type, value)?;
        self.send(FrameKind::Response, payload).await
    }

    /// Send the single result as pre-encoded bytes.
    pub async fn respond_bytes(&self, payload: Bytes) -> Result<()> {
        self.send(FrameKind::Response, payload).await
    }

    /// Mark the exchange handled with no body.
    pub async fn no_content(&self) -> Result<()> {
        self.send(FrameKind::NoContent, Bytes::new()).await
    }

    /// Send an error frame.
    pub async fn error(&self, message: &str) -> Result<()> {
        self.send(FrameKind::Error, Bytes::copy_from_slice(message.as_bytes()))
            .await
    }

    /// Send a stream chunk without waiting.
    pub fn try_chunk(&self, payload: Bytes) -> Result<()> {
        self.try_send(FrameKind::Chunk, payload)
    }

    /// End a stream without waiting. `StreamEnd` is always empty.
    pub fn try_end(&self) -> Result<()> {
        self.try_send(FrameKind::StreamEnd, Bytes::new())
    }

    /// Send an error frame without waiting.
    pub fn try_error(&self, message: &str) -> Result<()> {
        self.try_send(FrameKind::Error, Bytes::copy_from_slice(message.as_bytes()))
    }

    /// Mark the exchange handled with no body, without waiting.
    pub fn try_no_content(&self) -> Result<()> {
        self.try_send(FrameKind::NoContent, Bytes::new())
    }

    async fn send(&self, kind: FrameKind, payload: Bytes) -> Result<()> {
        let Some(writer) = &self.writer else {
            return Ok(());
        };
        writer
            .send(OutboundFrame::new(self.request_id, kind, payload)?)
            .await
    }

    fn try_send(&self, kind: FrameKind, payload: Bytes) -> Result<()> {
        let Some(writer) = &self.writer else {
            return Ok(());
        };
        writer.try_send(OutboundFrame::new(self.request_id, kind, payload)?)
    }
}
