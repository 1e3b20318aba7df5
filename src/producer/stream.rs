//! Producer driven by a `futures` stream on a tokio task.

use std::sync::Arc;

use futures::{Stream, StreamExt};
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;

use crate::error::{BridgeError, Result};
use crate::observer::Observer;
use crate::subscription::{FlagSubscription, Subscription, TokenSubscription};

use super::StreamProducer;

/// Polls a stream on its own task and forwards every item.
///
/// `Ok` items become `on_next`, the first `Err` becomes `on_error`, and the
/// end of the stream becomes `on_complete`. Cancelling the subscription
/// stops polling at the next await point and drops the stream.
pub struct SpawnedProducer<S> {
    stream: S,
    runtime: Option<Handle>,
}

impl<S> SpawnedProducer<S> {
    /// Wrap `stream`; it is spawned on the current runtime at subscribe time.
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            runtime: None,
        }
    }

    /// Spawn on a specific runtime instead of the current one.
    pub fn on(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }
}

impl<S, T> StreamProducer<T> for SpawnedProducer<S>
where
    S: Stream<Item = Result<T>> + Send + 'static,
    T: Send + 'static,
{
    fn subscribe(self: Box<Self>, observer: Arc<dyn Observer<T>>) -> Box<dyn Subscription> {
        let SpawnedProducer { stream, runtime } = *self;

        let Some(runtime) = runtime.or_else(|| Handle::try_current().ok()) else {
            observer.on_subscribe(Box::new(FlagSubscription::cancelled()));
            observer.on_error(BridgeError::NoRuntime("stream producer needs a tokio runtime"));
            return Box::new(FlagSubscription::cancelled());
        };

        let token = CancellationToken::new();
        observer.on_subscribe(Box::new(TokenSubscription::new(token.clone())));
        let cancelled = token.clone();
        runtime.spawn(async move {
            let mut stream = std::pin::pin!(stream);
            loop {
                tokio::select! {
                    biased;
                    _ = cancelled.cancelled() => {
                        tracing::trace!("Stream producer cancelled");
                        return;
                    }
                    item = stream.next() => match item {
                        Some(Ok(value)) => observer.on_next(value),
                        Some(Err(e)) => {
                            observer.on_error(e);
                            return;
                        }
                        None => {
                            observer.on_complete();
                            return;
                        }
                    },
                }
            }
        });

        Box::new(TokenSubscription::new(token))
    }
}
