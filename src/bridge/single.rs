//! Single-result bridge.
//!
//! ```text
//! producer ──on_next──► latch.try_settle_value ──► completion.resolve   (first wins)
//!          ──on_error─► latch.try_settle_error ──► completion.reject    + release guard
//!          ──on_complete──────────────────────────────────────────────► release guard
//! completion ──on_timeout / on_transport_completion───────────────────► release guard
//! ```
//!
//! Only the first value is used. Producers meant to yield a collection are
//! aggregated upstream (see [`ProducerExt::collect_vec`]).
//!
//! [`ProducerExt::collect_vec`]: crate::producer::ProducerExt::collect_vec

use std::sync::{Arc, Weak};

use crate::deferred::DeferredCompletion;
use crate::error::BridgeError;
use crate::latch::{Settle, TerminationLatch, TerminationState};
use crate::lifecycle::LifecycleCallback;
use crate::observer::Observer;
use crate::producer::StreamProducer;
use crate::subscription::{Subscription, SubscriptionGuard};

struct DeferredTarget<T> {
    completion: Arc<dyn DeferredCompletion<T>>,
}

impl<T> Settle for DeferredTarget<T> {
    type Value = T;

    fn settle_value(&self, value: T) {
        self.completion.resolve(value);
    }

    fn settle_error(&self, error: BridgeError) {
        self.completion.reject(error);
    }

    /// An empty producer leaves the deferred result to its own timeout, so
    /// a valueless completion has nothing to settle.
    fn settle_complete(&self) {}
}

struct Inner<T> {
    latch: TerminationLatch<DeferredTarget<T>>,
    guard: SubscriptionGuard,
}

impl<T> Inner<T> {
    fn teardown(&self, reason: &str) {
        if self.guard.release() {
            tracing::debug!("Subscription released on transport {}", reason);
        }
    }
}

impl<T> Observer<T> for Inner<T> {
    fn on_subscribe(&self, subscription: Box<dyn Subscription>) {
        self.guard.attach(subscription);
    }

    fn on_next(&self, value: T) {
        self.latch.try_settle_value(value);
    }

    fn on_error(&self, error: BridgeError) {
        if !self.latch.try_settle_error(error) {
            tracing::trace!("Producer error after settlement dropped");
        }
        self.guard.release();
    }

    fn on_complete(&self) {
        if !self.latch.is_settled() {
            tracing::debug!("Producer completed without a value");
        }
        self.guard.release();
    }
}

/// Bridges a producer to a one-shot deferred completion.
pub struct SingleResultBridge<T> {
    inner: Arc<Inner<T>>,
}

impl<T: Send + 'static> SingleResultBridge<T> {
    /// Register for the completion's lifecycle, then subscribe to `producer`.
    ///
    /// The producer may settle the completion before this returns.
    pub fn new<P, C>(producer: P, completion: C) -> Self
    where
        P: StreamProducer<T> + 'static,
        C: DeferredCompletion<T> + 'static,
    {
        let completion: Arc<dyn DeferredCompletion<T>> = Arc::new(completion);
        let inner = Arc::new(Inner {
            latch: TerminationLatch::new(DeferredTarget {
                completion: completion.clone(),
            }),
            guard: SubscriptionGuard::new(),
        });

        completion.on_timeout(release_on(&inner, "timeout"));
        completion.on_transport_completion(release_on(&inner, "completion"));

        let observer: Arc<dyn Observer<T>> = inner.clone();
        let subscription = Box::new(producer).subscribe(observer);
        inner.guard.adopt(subscription);

        Self { inner }
    }

    /// Current latch state.
    pub fn state(&self) -> TerminationState {
        self.inner.latch.state()
    }

    /// Whether the completion has been settled through this bridge.
    pub fn is_settled(&self) -> bool {
        self.inner.latch.is_settled()
    }

    /// Whether the subscription has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.inner.guard.is_cancelled()
    }

    /// Whether teardown has happened.
    pub fn is_released(&self) -> bool {
        self.inner.guard.is_released()
    }
}

fn release_on<T: 'static>(inner: &Arc<Inner<T>>, reason: &'static str) -> LifecycleCallback {
    let weak: Weak<Inner<T>> = Arc::downgrade(inner);
    Box::new(move || {
        if let Some(inner) = weak.upgrade() {
            inner.teardown(reason);
        }
    })
}
