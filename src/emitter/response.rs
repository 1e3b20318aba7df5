//! Framed response emitter.
//!
//! The finished flag and the frame enqueue share one lock, so no `Chunk`
//! can be queued behind the terminal `StreamEnd` or `Error` frame.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use bytes::Bytes;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use super::sse::format_event;
use super::StreamingChannel;
use crate::codec::{self, ContentType};
use crate::error::{BridgeError, Result};
use crate::handler::RequestContext;
use crate::lifecycle::{Lifecycle, LifecycleCallback};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Framing {
    Chunk,
    Sse,
}

struct Inner {
    ctx: RequestContext,
    content_type: ContentType,
    framing: Framing,
    timeout: Option<Duration>,
    finished: Mutex<bool>,
    done: CancellationToken,
    lifecycle: Lifecycle,
}

/// Streaming channel writing one `Chunk` frame per value.
///
/// Cheap to clone; clones share the same exchange.
#[derive(Clone)]
pub struct ResponseEmitter {
    inner: Arc<Inner>,
}

impl ResponseEmitter {
    /// Create an emitter for `ctx` with the MsgPack default.
    pub fn new(ctx: RequestContext) -> Self {
        Self::build(ctx, ContentType::default(), Framing::Chunk, None)
    }

    pub(super) fn build(
        ctx: RequestContext,
        content_type: ContentType,
        framing: Framing,
        timeout: Option<Duration>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                ctx,
                content_type,
                framing,
                timeout,
                finished: Mutex::new(false),
                done: CancellationToken::new(),
                lifecycle: Lifecycle::new(),
            }),
        }
    }

    /// Set the default content type. Only meaningful before sharing.
    pub fn with_content_type(self, content_type: ContentType) -> Self {
        let inner = &self.inner;
        Self::build(inner.ctx.clone(), content_type, inner.framing, inner.timeout)
    }

    /// Expire the emitter after `timeout`. Only meaningful before sharing.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        let inner = &self.inner;
        Self::build(
            inner.ctx.clone(),
            inner.content_type,
            inner.framing,
            Some(timeout),
        )
    }

    /// Request ID of the exchange.
    pub fn request_id(&self) -> u32 {
        self.inner.ctx.request_id()
    }

    /// Default content type.
    pub fn content_type(&self) -> ContentType {
        self.inner.content_type
    }

    /// Configured timeout, if any.
    pub fn timeout(&self) -> Option<Duration> {
        self.inner.timeout
    }

    /// Whether the emitter has been finished.
    pub fn is_finished(&self) -> bool {
        *self.lock()
    }

    /// Wait until the emitter is finished.
    pub async fn finished(&self) {
        self.inner.done.cancelled().await
    }

    /// Write one value.
    pub fn send<T: Serialize + ?Sized>(
        &self,
        value: &T,
        content_type: Option<ContentType>,
    ) -> Result<()> {
        if self.is_finished() {
            return Err(BridgeError::ChannelClosed);
        }

        let content_type = content_type.unwrap_or(self.inner.content_type);
        let payload = match self.inner.framing {
            Framing::Chunk => codec::encode(content_type, value)?,
            Framing::Sse => Bytes::from(format_event(content_type, value)?),
        };

        let mut finished = self.lock();
        if *finished {
            return Err(BridgeError::ChannelClosed);
        }
        match self.inner.ctx.try_chunk(payload) {
            Err(e) if e.is_channel_closed() => {
                // Transport is gone; nothing else can be written.
                *finished = true;
                drop(finished);
                self.after_finish();
                Err(e)
            }
            other => other,
        }
    }

    /// Finish normally with a `StreamEnd` frame.
    pub fn complete(&self) {
        let written = {
            let mut finished = self.lock();
            if *finished {
                return;
            }
            *finished = true;
            self.inner.ctx.try_end()
        };
        if let Err(e) = written {
            tracing::warn!(
                "Failed to end stream for request {}: {}",
                self.request_id(),
                e
            );
        }
        self.after_finish();
    }

    /// Finish with an `Error` frame carrying the error message.
    pub fn complete_with_error(&self, error: BridgeError) {
        let written = {
            let mut finished = self.lock();
            if *finished {
                return;
            }
            *finished = true;
            self.inner.ctx.try_error(&error.to_string())
        };
        if let Err(e) = written {
            tracing::warn!(
                "Failed to send stream error for request {}: {}",
                self.request_id(),
                e
            );
        }
        self.after_finish();
    }

    /// Transport timed out: fire timeout callbacks, then fail the stream
    /// unless a callback already finished it.
    pub fn expire(&self) {
        tracing::debug!("Emitter for request {} timed out", self.request_id());
        self.inner.lifecycle.fire_timeout();
        self.complete_with_error(BridgeError::Timeout);
    }

    /// Client went away: finish without writing anything.
    pub fn abort(&self) {
        tracing::debug!("Emitter for request {} aborted", self.request_id());
        self.finish();
    }

    /// Register a timeout callback.
    pub fn on_timeout(&self, callback: LifecycleCallback) {
        self.inner.lifecycle.on_timeout(callback);
    }

    /// Register a completion callback.
    pub fn on_completion(&self, callback: LifecycleCallback) {
        self.inner.lifecycle.on_completion(callback);
    }

    fn lock(&self) -> MutexGuard<'_, bool> {
        self.inner.finished.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn finish(&self) {
        let first = !std::mem::replace(&mut *self.lock(), true);
        if first {
            self.after_finish();
        }
    }

    fn after_finish(&self) {
        self.inner.done.cancel();
        self.inner.lifecycle.fire_completion();
    }
}

impl<T: Serialize + Send> StreamingChannel<T> for ResponseEmitter {
    fn send(&self, value: T, content_type: Option<ContentType>) -> Result<()> {
        ResponseEmitter::send(self, &value, content_type)
    }

    fn complete(&self) {
        ResponseEmitter::complete(self);
    }

    fn complete_with_error(&self, error: BridgeError) {
        ResponseEmitter::complete_with_error(self, error);
    }

    fn on_timeout(&self, callback: LifecycleCallback) {
        ResponseEmitter::on_timeout(self, callback);
    }

    fn on_transport_completion(&self, callback: LifecycleCallback) {
        self.on_completion(callback);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{Frame, FrameDecoder, FrameKind};
    use crate::writer::{spawn_writer_task, spawn_writer_task_default, WriterConfig};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::io::{duplex, AsyncReadExt, DuplexStream};

    async fn read_frames(server: &mut DuplexStream, count: usize) -> Vec<Frame> {
        let mut decoder = FrameDecoder::new();
        let mut frames = Vec::new();
        let mut buf = vec![0u8; 1024];
        while frames.len() < count {
            let n = server.read(&mut buf).await.unwrap();
            assert!(n > 0, "stream closed early");
            frames.extend(decoder.push(&buf[..n]).unwrap());
        }
        frames
    }

    #[tokio::test]
    async fn test_chunks_then_end() {
        let (client, mut server) = duplex(4096);
        let (writer, _task) = spawn_writer_task_default(client);
        let emitter = ResponseEmitter::new(RequestContext::with_writer(1, 9, writer))
            .with_content_type(ContentType::Text);

        emitter.send("m1", None).unwrap();
        emitter.send("m2", None).unwrap();
        emitter.send(&3, Some(ContentType::Json)).unwrap();
        emitter.complete();

        let frames = read_frames(&mut server, 4).await;
        assert_eq!(frames[0].payload_str(), Some("m1"));
        assert_eq!(frames[1].payload_str(), Some("m2"));
        assert_eq!(frames[2].payload_str(), Some("3"));
        assert_eq!(frames[3].kind(), FrameKind::StreamEnd);
        assert!(frames.iter().all(|f| f.request_id() == 9));
    }

    #[tokio::test]
    async fn test_complete_with_error_writes_message() {
        let (client, mut server) = duplex(4096);
        let (writer, _task) = spawn_writer_task_default(client);
        let emitter = ResponseEmitter::new(RequestContext::with_writer(1, 2, writer));

        emitter.complete_with_error(BridgeError::producer_msg("boom"));
        emitter.complete();

        let frames = read_frames(&mut server, 1).await;
        assert_eq!(frames[0].kind(), FrameKind::Error);
        assert_eq!(frames[0].payload_str(), Some("Producer error: boom"));
    }

    #[test]
    fn test_send_after_complete_fails() {
        let emitter = ResponseEmitter::new(RequestContext::new(1, 1));
        emitter.complete();

        assert!(emitter.is_finished());
        assert!(matches!(
            emitter.send("late", None),
            Err(BridgeError::ChannelClosed)
        ));
    }

    #[test]
    fn test_completion_callbacks_fire_once() {
        let emitter = ResponseEmitter::new(RequestContext::new(1, 1));
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        emitter.on_completion(Box::new(move || {
            c.fetch_add(1, Ordering::SeqCst);
        }));

        emitter.complete();
        emitter.complete_with_error(BridgeError::Timeout);
        emitter.abort();

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_expire_runs_timeout_then_completion() {
        let emitter = ResponseEmitter::new(RequestContext::new(1, 1));
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));
        let o1 = order.clone();
        emitter.on_timeout(Box::new(move || o1.lock().unwrap().push("timeout")));
        let o2 = order.clone();
        emitter.on_completion(Box::new(move || o2.lock().unwrap().push("completion")));

        emitter.expire();

        assert!(emitter.is_finished());
        assert_eq!(*order.lock().unwrap(), vec!["timeout", "completion"]);
    }

    #[tokio::test]
    async fn test_closed_transport_finishes_emitter() {
        let (client, server) = duplex(64);
        let (writer, task) = spawn_writer_task_default(client);
        drop(server);

        let emitter = ResponseEmitter::new(RequestContext::with_writer(1, 1, writer));
        // First write fails inside the writer task, which then closes its queue.
        let _ = emitter.send("x", None);
        let _ = task.await;

        assert!(matches!(
            emitter.send("y", None),
            Err(BridgeError::ChannelClosed)
        ));
        assert!(emitter.is_finished());
    }

    async fn read_to_end(server: &mut DuplexStream) -> Vec<Frame> {
        let mut decoder = FrameDecoder::new();
        let mut frames = Vec::new();
        let mut buf = vec![0u8; 4096];
        loop {
            let n = server.read(&mut buf).await.unwrap();
            if n == 0 {
                return frames;
            }
            frames.extend(decoder.push(&buf[..n]).unwrap());
        }
    }

    #[tokio::test]
    async fn test_burst_past_pending_limit_is_delivered() {
        let (client, mut server) = duplex(1 << 20);
        let config = WriterConfig {
            max_pending_frames: 8,
            ..WriterConfig::default()
        };
        let (writer, _task) = spawn_writer_task(client, config);
        let emitter = ResponseEmitter::new(RequestContext::with_writer(1, 4, writer))
            .with_content_type(ContentType::Json);

        for i in 0..500u32 {
            emitter.send(&i, None).unwrap();
        }
        emitter.complete();
        drop(emitter);

        let frames = read_to_end(&mut server).await;
        assert_eq!(frames.len(), 501);
        assert_eq!(frames[499].payload_str(), Some("499"));
        assert_eq!(frames[500].kind(), FrameKind::StreamEnd);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_no_chunk_after_terminal_frame_under_race() {
        for _ in 0..50 {
            let (client, mut server) = duplex(1 << 20);
            let (writer, _task) = spawn_writer_task_default(client);
            let emitter = ResponseEmitter::new(RequestContext::with_writer(1, 6, writer))
                .with_content_type(ContentType::Text);

            let sender = emitter.clone();
            let pump = std::thread::spawn(move || {
                while sender.send("tick", None).is_ok() {}
            });
            let expirer = emitter.clone();
            let timer = std::thread::spawn(move || expirer.expire());
            pump.join().unwrap();
            timer.join().unwrap();
            drop(emitter);

            let frames = read_to_end(&mut server).await;
            let last = frames.last().unwrap();
            assert_eq!(last.kind(), FrameKind::Error);
            assert_eq!(
                frames.iter().filter(|f| f.kind() == FrameKind::Error).count(),
                1
            );
        }
    }

    #[tokio::test]
    async fn test_finished_resolves_on_abort() {
        let emitter = ResponseEmitter::new(RequestContext::new(1, 1));
        let waiter = emitter.clone();
        let handle = tokio::spawn(async move { waiter.finished().await });

        emitter.abort();
        handle.await.unwrap();
    }
}
