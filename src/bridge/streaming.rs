//! Streaming bridge.
//!
//! Forwards every value to a [`StreamingChannel`] in emission order, one
//! `send` per value, until the producer completes or fails or the
//! transport finishes the channel. A single `completed` flag decides which
//! terminal action reaches the channel.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use crate::codec::ContentType;
use crate::emitter::StreamingChannel;
use crate::error::BridgeError;
use crate::lifecycle::LifecycleCallback;
use crate::observer::Observer;
use crate::producer::StreamProducer;
use crate::subscription::{Subscription, SubscriptionGuard};

struct Inner<T> {
    channel: Arc<dyn StreamingChannel<T>>,
    content_type: Option<ContentType>,
    completed: AtomicBool,
    guard: SubscriptionGuard,
}

impl<T> Inner<T> {
    fn fail(&self, error: BridgeError) {
        self.guard.release();
        if self.completed.swap(true, Ordering::AcqRel) {
            return;
        }
        if error.is_channel_closed() {
            tracing::debug!("Streaming channel closed, dropping remaining values");
        } else {
            tracing::warn!("Streaming send failed: {}", error);
            self.channel.complete_with_error(error);
        }
    }

    fn teardown(&self, reason: &str) {
        self.completed.store(true, Ordering::Release);
        if self.guard.release() {
            tracing::debug!("Streaming subscription released on transport {}", reason);
        }
    }
}

impl<T> Observer<T> for Inner<T> {
    fn on_subscribe(&self, subscription: Box<dyn Subscription>) {
        self.guard.attach(subscription);
    }

    fn on_next(&self, value: T) {
        // Fast path only; the channel itself refuses sends once finished.
        if self.completed.load(Ordering::Acquire) || self.guard.is_released() {
            return;
        }
        if let Err(e) = self.channel.send(value, self.content_type) {
            self.fail(e);
        }
    }

    fn on_error(&self, error: BridgeError) {
        if !self.completed.swap(true, Ordering::AcqRel) {
            self.channel.complete_with_error(error);
        }
        self.guard.release();
    }

    fn on_complete(&self) {
        if !self.completed.swap(true, Ordering::AcqRel) {
            self.channel.complete();
        }
        self.guard.release();
    }
}

/// Bridges a producer to a streaming channel.
pub struct StreamingBridge<T> {
    inner: Arc<Inner<T>>,
}

impl<T: Send + 'static> StreamingBridge<T> {
    /// Register for the channel's lifecycle, then subscribe to `producer`.
    ///
    /// `content_type` is passed with every `send`; `None` uses the channel
    /// default.
    pub fn new<P, C>(producer: P, channel: C, content_type: Option<ContentType>) -> Self
    where
        P: StreamProducer<T> + 'static,
        C: StreamingChannel<T> + 'static,
    {
        let channel: Arc<dyn StreamingChannel<T>> = Arc::new(channel);
        let inner = Arc::new(Inner {
            channel: channel.clone(),
            content_type,
            completed: AtomicBool::new(false),
            guard: SubscriptionGuard::new(),
        });

        channel.on_timeout(release_on(&inner, "timeout"));
        channel.on_transport_completion(release_on(&inner, "completion"));

        let observer: Arc<dyn Observer<T>> = inner.clone();
        let subscription = Box::new(producer).subscribe(observer);
        inner.guard.adopt(subscription);

        Self { inner }
    }

    /// Whether a terminal action has reached the channel, or the transport
    /// finished it.
    pub fn is_completed(&self) -> bool {
        self.inner.completed.load(Ordering::Acquire)
    }

    /// Whether the subscription has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.inner.guard.is_cancelled()
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
