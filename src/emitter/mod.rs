//! Streaming channels: long-lived senders that write many values.
//!
//! - [`ResponseEmitter`] - one `Chunk` frame per value, `StreamEnd` on completion
//! - [`SseEmitter`] - values rendered as Server-Sent Events messages
//!
//! Both write through a [`RequestContext`](crate::handler::RequestContext)
//! without blocking, so they can be driven from producer threads.

mod response;
mod sse;

use crate::codec::ContentType;
use crate::error::{BridgeError, Result};
use crate::lifecycle::LifecycleCallback;

pub use response::ResponseEmitter;
pub use sse::{format_event, SseEmitter};

/// Long-lived sender a streaming bridge forwards values to.
pub trait StreamingChannel<T>: Send + Sync {
    /// Write one value. `content_type` overrides the channel default.
    ///
    /// Fails with [`BridgeError::ChannelClosed`] once the channel is finished
    /// or the transport is gone.
    fn send(&self, value: T, content_type: Option<ContentType>) -> Result<()>;

    /// Finish normally.
    fn complete(&self);

    /// Finish with an error.
    fn complete_with_error(&self, error: BridgeError);

    /// Register a callback for the channel timing out.
    fn on_timeout(&self, callback: LifecycleCallback);

    /// Register a callback for the channel being finished, by either side.
    fn on_transport_completion(&self, callback: LifecycleCallback);
}
