//! Server-Sent Events emitter.
//!
//! Each value becomes one SSE message: a `data:` field per line of its
//! textual rendering, terminated by a blank line.
//!
//! ```text
//! "single value"  ->  data:single value\n\n
//! "a\nb"          ->  data:a\ndata:b\n\n
//! ```

use std::time::Duration;

use serde::Serialize;

use super::response::{Framing, ResponseEmitter};
use super::StreamingChannel;
use crate::codec::{ContentType, JsonCodec, TextCodec};
use crate::error::{BridgeError, Result};
use crate::handler::RequestContext;
use crate::lifecycle::LifecycleCallback;

/// Render `value` as one SSE message.
///
/// `Text` writes strings verbatim; `Json` and `MsgPack` (which has no text
/// form) write compact JSON.
pub fn format_event<T: Serialize + ?Sized>(
    content_type: ContentType,
    value: &T,
) -> Result<String> {
    let text = match content_type {
        ContentType::Text => TextCodec::encode(value)?,
        ContentType::Json | ContentType::MsgPack => {
            String::from_utf8_lossy(&JsonCodec::encode(value)?).into_owned()
        }
    };

    let mut event = String::with_capacity(text.len() + 8);
    for line in text.split('\n') {
        event.push_str("data:");
        event.push_str(line.strip_suffix('\r').unwrap_or(line));
        event.push('\n');
    }
    event.push('\n');
    Ok(event)
}

/// Streaming channel writing each value as an SSE message in a `Chunk` frame.
#[derive(Clone)]
pub struct SseEmitter {
    inner: ResponseEmitter,
}

impl SseEmitter {
    /// Create an SSE emitter for `ctx` with the text default.
    pub fn new(ctx: RequestContext) -> Self {
        Self {
            inner: ResponseEmitter::build(ctx, ContentType::Text, Framing::Sse, None),
        }
    }

    /// Expire the emitter after `timeout`.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        Self {
            inner: self.inner.with_timeout(timeout),
        }
    }

    /// Underlying framed emitter.
    pub fn emitter(&self) -> &ResponseEmitter {
        &self.inner
    }

    /// Write one value as an SSE message.
    pub fn send<T: Serialize + ?Sized>(
        &self,
        value: &T,
        content_type: Option<ContentType>,
    ) -> Result<()> {
        self.inner.send(value, content_type)
    }

    /// Finish normally.
    pub fn complete(&self) {
        self.inner.complete();
    }

    /// Finish with an error.
    pub fn complete_with_error(&self, error: BridgeError) {
        self.inner.complete_with_error(error);
    }
}

impl<T: Serialize + Send> StreamingChannel<T> for SseEmitter {
    fn send(&self, value: T, content_type: Option<ContentType>) -> Result<()> {
        self.inner.send(&value, content_type)
    }

    fn complete(&self) {
        self.inner.complete();
    }

    fn complete_with_error(&self, error: BridgeError) {
        self.inner.complete_with_error(error);
    }

    fn on_timeout(&self, callback: LifecycleCallback) {
        self.inner.on_timeout(callback);
    }

    fn on_transport_completion(&self, callback: LifecycleCallback) {
        self.inner.on_completion(callback);
    }
}
