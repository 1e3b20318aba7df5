//! Async request processing.
//!
//! Tracks exchanges whose response is produced after the handler returned,
//! writes the deferred outcome when it arrives, and routes client
//! disconnects to the right exchange.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use super::RequestContext;
use crate::codec::{self, ContentType};
use crate::deferred::DeferredResult;
use crate::emitter::ResponseEmitter;
use crate::error::{BridgeError, Result};

type AbortFn = Box<dyn FnOnce() + Send>;

/// Registry of in-flight async exchanges. Cheap to clone.
#[derive(Clone, Default)]
pub struct AsyncManager {
    in_flight: Arc<Mutex<HashMap<u32, AbortFn>>>,
}

impl AsyncManager {
    /// Create an empty manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for `result` on a tokio task and write it to `ctx`.
    ///
    /// A value becomes a `Response` frame encoded with `content_type`, an
    /// error an `Error` frame. Aborted exchanges write nothing.
    pub fn start_deferred_result_processing<T>(
        &self,
        result: DeferredResult<T>,
        ctx: RequestContext,
        content_type: ContentType,
    ) -> Result<JoinHandle<()>>
    where
        T: Serialize + Send + 'static,
    {
        let runtime = Handle::try_current()
            .map_err(|_| BridgeError::NoRuntime("deferred result processing"))?;
        let request_id = ctx.request_id();

        let aborting = result.clone();
        self.track(request_id, Box::new(move || aborting.abort()));

        let manager = self.clone();
        Ok(runtime.spawn(async move {
            let outcome = result.outcome().await;
            manager.forget(request_id);

            let written = match outcome.and_then(|value| codec::encode(content_type, &value)) {
                Ok(payload) => ctx.respond_bytes(payload).await,
                Err(BridgeError::Aborted) => {
                    tracing::debug!("Request {} aborted, no response written", request_id);
                    Ok(())
                }
                Err(e) => ctx.error(&e.to_string()).await,
            };
            if let Err(e) = written {
                tracing::error!("Failed to write response for request {}: {}", request_id, e);
            }
        }))
    }

    /// Track a streaming exchange until its emitter finishes.
    ///
    /// Applies the emitter's timeout, if any.
    pub fn start_emitter_processing(&self, emitter: ResponseEmitter) -> Result<JoinHandle<()>> {
        let runtime =
            Handle::try_current().map_err(|_| BridgeError::NoRuntime("emitter processing"))?;
        let request_id = emitter.request_id();

        let aborting = emitter.clone();
        self.track(request_id, Box::new(move || aborting.abort()));

        let manager = self.clone();
        Ok(runtime.spawn(async move {
            match emitter.timeout() {
                Some(timeout) => {
                    tokio::select! {
                        _ = emitter.finished() => {}
                        _ = tokio::time::sleep(timeout) => emitter.expire(),
                    }
                }
                None => emitter.finished().await,
            }
            manager.forget(request_id);
        }))
    }

    /// Abort an in-flight exchange (client disconnect).
    ///
    /// Returns `false` if no exchange with `request_id` is in flight.
    pub fn abort(&self, request_id: u32) -> bool {
        let abort = self.lock().remove(&request_id);
        match abort {
            Some(abort) => {
                tracing::debug!("Aborting request {}", request_id);
                abort();
                true
            }
            None => false,
        }
    }

    /// Number of in-flight exchanges.
    pub fn in_flight(&self) -> usize {
        self.lock().len()
    }

    fn track(&self, request_id: u32, abort: AbortFn) {
        if self.lock().insert(request_id, abort).is_some() {
            tracing::warn!("Request {} was already in flight", request_id);
        }
    }

    fn forget(&self, request_id: u32) {
        self.lock().remove(&request_id);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<u32, AbortFn>> {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deferred::DeferredCompletion;
    use crate::protocol::{FrameDecoder, FrameKind};
    use crate::writer::spawn_writer_task_default;
    use std::time::Duration;
    use tokio::io::{duplex, AsyncReadExt};

    #[tokio::test]
    async fn test_resolved_result_written_as_response() {
        let (client, mut server) = duplex(4096);
        let (writer, _task) = spawn_writer_task_default(client);
        let manager = AsyncManager::new();

        let result = DeferredResult::new();
        let task = manager
            .start_deferred_result_processing(
                result.clone(),
                RequestContext::with_writer(1, 11, writer),
                ContentType::Json,
            )
            .unwrap();
        assert_eq!(manager.in_flight(), 1);

        result.resolve(vec!["a", "b"]);
        task.await.unwrap();
        assert_eq!(manager.in_flight(), 0);

        let mut buf = vec![0u8; 256];
        let n = server.read(&mut buf).await.unwrap();
        let frames = FrameDecoder::new().push(&buf[..n]).unwrap();
        assert_eq!(frames[0].request_id(), 11);
        assert_eq!(frames[0].kind(), FrameKind::Response);
        assert_eq!(frames[0].payload_str(), Some(r#"["a","b"]"#));
    }

    #[tokio::test]
    async fn test_value_that_is_send_but_not_sync() {
        let (client, mut server) = duplex(4096);
        let (writer, _task) = spawn_writer_task_default(client);
        let manager = AsyncManager::new();

        let result = DeferredResult::new();
        let task = manager
            .start_deferred_result_processing(
                result.clone(),
                RequestContext::with_writer(1, 16, writer),
                ContentType::Json,
            )
            .unwrap();
        result.resolve(std::cell::Cell::new(5u32));
        task.await.unwrap();

        let mut buf = vec![0u8; 256];
        let n = server.read(&mut buf).await.unwrap();
        let frames = FrameDecoder::new().push(&buf[..n]).unwrap();
        assert_eq!(frames[0].kind(), FrameKind::Response);
        assert_eq!(frames[0].payload_str(), Some("5"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_written_as_error() {
        let (client, mut server) = duplex(4096);
        let (writer, _task) = spawn_writer_task_default(client);
        let manager = AsyncManager::new();

        let result: DeferredResult<u32> = DeferredResult::with_timeout(Duration::from_secs(30));
        let task = manager
            .start_deferred_result_processing(
                result,
                RequestContext::with_writer(1, 12, writer),
                ContentType::MsgPack,
            )
            .unwrap();
        task.await.unwrap();

        let mut buf = vec![0u8; 256];
        let n = server.read(&mut buf).await.unwrap();
        let frames = FrameDecoder::new().push(&buf[..n]).unwrap();
        assert_eq!(frames[0].kind(), FrameKind::Error);
        assert_eq!(frames[0].payload_str(), Some("Async request timed out"));
    }

    #[tokio::test]
    async fn test_abort_in_flight() {
        let manager = AsyncManager::new();
        let result: DeferredResult<u32> = DeferredResult::new();
        let task = manager
            .start_deferred_result_processing(
                result.clone(),
                RequestContext::new(1, 13),
                ContentType::MsgPack,
            )
            .unwrap();

        assert!(manager.abort(13));
        assert!(!manager.abort(13));
        task.await.unwrap();

        assert!(result.is_completed());
        assert_eq!(manager.in_flight(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_emitter_timeout_expires_stream() {
        let manager = AsyncManager::new();
        let emitter = ResponseEmitter::new(RequestContext::new(1, 14))
            .with_timeout(Duration::from_secs(5));

        let task = manager.start_emitter_processing(emitter.clone()).unwrap();
        assert_eq!(manager.in_flight(), 1);
        task.await.unwrap();

        assert!(emitter.is_finished());
        assert_eq!(manager.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_emitter_forgotten_on_complete() {
        let manager = AsyncManager::new();
        let emitter = ResponseEmitter::new(RequestContext::new(1, 15));

        let task = manager.start_emitter_processing(emitter.clone()).unwrap();
        emitter.complete();
        task.await.unwrap();

        assert_eq!(manager.in_flight(), 0);
        assert!(!manager.abort(15));
    }

    #[test]
    fn test_requires_runtime() {
        let manager = AsyncManager::new();
        let result: DeferredResult<u32> = DeferredResult::new();
        let started = manager.start_deferred_result_processing(
            result,
            RequestContext::new(1, 1),
            ContentType::MsgPack,
        );
        assert!(matches!(started, Err(BridgeError::NoRuntime(_))));
    }
}
