//! Deferred results: one-shot, request-scoped completion slots.
//!
//! [`DeferredCompletion`] is the seam the single-result bridge settles.
//! [`DeferredResult`] is the implementation the async manager waits on:
//! it owns the timeout policy and the transport lifecycle notifications.
//!
//! # Outcome flow
//!
//! ```text
//! resolve / reject ──► slot ──► outcome().await ──► completion callbacks
//!                                   │
//!                  timeout elapsed ─┴─► timeout callbacks ─► Err(Timeout) if still pending
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::oneshot;

use crate::error::{BridgeError, Result};
use crate::lifecycle::{Lifecycle, LifecycleCallback};

/// One-shot completion slot a bridge settles.
pub trait DeferredCompletion<T>: Send + Sync {
    /// Resolve with a value. Returns `false` if already settled.
    fn resolve(&self, value: T) -> bool;

    /// Reject with an error. Returns `false` if already settled.
    fn reject(&self, error: BridgeError) -> bool;

    /// Register a callback for the transport timing out.
    fn on_timeout(&self, callback: LifecycleCallback);

    /// Register a callback for the exchange being finished by the transport.
    fn on_transport_completion(&self, callback: LifecycleCallback);
}

struct Shared<T> {
    settled: AtomicBool,
    sender: Mutex<Option<oneshot::Sender<Result<T>>>>,
    receiver: Mutex<Option<oneshot::Receiver<Result<T>>>>,
    timeout: Option<Duration>,
    lifecycle: Lifecycle,
}

/// Deferred result of an async exchange.
///
/// Cloning yields another handle to the same slot.
pub struct DeferredResult<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for DeferredResult<T> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<T: Send + 'static> DeferredResult<T> {
    /// Create a deferred result that never times out.
    pub fn new() -> Self {
        Self::build(None)
    }

    /// Create a deferred result that expires after `timeout`.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::build(Some(timeout))
    }

    fn build(timeout: Option<Duration>) -> Self {
        let (tx, rx) = oneshot::channel();
        Self {
            shared: Arc::new(Shared {
                settled: AtomicBool::new(false),
                sender: Mutex::new(Some(tx)),
                receiver: Mutex::new(Some(rx)),
                timeout,
                lifecycle: Lifecycle::new(),
            }),
        }
    }

    /// Configured timeout, if any.
    pub fn timeout(&self) -> Option<Duration> {
        self.shared.timeout
    }

    /// Whether a value or an error has been set.
    pub fn is_settled(&self) -> bool {
        self.shared.settled.load(Ordering::Acquire)
    }

    /// Whether the exchange has been finished by the transport.
    pub fn is_completed(&self) -> bool {
        self.shared.lifecycle.is_completed()
    }

    /// Register a completion callback.
    pub fn on_completion(&self, callback: LifecycleCallback) {
        self.shared.lifecycle.on_completion(callback);
    }

    /// Abort the exchange (client went away).
    ///
    /// Fires completion callbacks first so upstream work stops, then
    /// settles with [`BridgeError::Aborted`] if nothing else did.
    pub fn abort(&self) {
        tracing::debug!("Deferred result aborted");
        self.shared.lifecycle.fire_completion();
        self.settle(Err(BridgeError::Aborted));
    }

    /// Transport timed out: fire timeout callbacks, then settle with
    /// [`BridgeError::Timeout`] unless a callback supplied a result.
    pub fn expire(&self) {
        self.shared.lifecycle.fire_timeout();
        self.settle(Err(BridgeError::Timeout));
    }

    /// Wait for the outcome, applying the timeout.
    ///
    /// Completion callbacks fire once the outcome is known. Only the first
    /// caller receives the outcome; later callers get a protocol error.
    pub async fn outcome(&self) -> Result<T> {
        let receiver = self
            .shared
            .receiver
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(mut receiver) = receiver else {
            return Err(BridgeError::Protocol(
                "Deferred result outcome already taken".to_string(),
            ));
        };

        if let Some(timeout) = self.shared.timeout {
            if tokio::time::timeout(timeout, &mut receiver).await.is_err() {
                tracing::debug!("Deferred result timed out after {:?}", timeout);
                self.expire();
            }
        }

        let outcome = receiver.await.unwrap_or(Err(BridgeError::ChannelClosed));
        self.shared.lifecycle.fire_completion();
        outcome
    }

    fn settle(&self, outcome: Result<T>) -> bool {
        if self.shared.settled.swap(true, Ordering::AcqRel) {
            return false;
        }

        let sender = self
            .shared
            .sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(sender) = sender {
            if sender.send(outcome).is_err() {
                tracing::trace!("Deferred result settled after its receiver was dropped");
            }
        }
        true
    }
}

impl<T: Send + 'static> Default for DeferredResult<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send + 'static> DeferredCompletion<T> for DeferredResult<T> {
    fn resolve(&self, value: T) -> bool {
        self.settle(Ok(value))
    }

    fn reject(&self, error: BridgeError) -> bool {
        self.settle(Err(error))
    }

    fn on_timeout(&self, callback: LifecycleCallback) {
        self.shared.lifecycle.on_timeout(callback);
    }

    fn on_transport_completion(&self, callback: LifecycleCallback) {
        self.shared.lifecycle.on_completion(callback);
    }
}
