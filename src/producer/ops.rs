//! Producer combinators: value mapping and upstream aggregation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::error::{BridgeError, Result};
use crate::observer::Observer;
use crate::subscription::Subscription;

use super::{BoxProducer, StreamProducer};

type MapFn<T, U> = Arc<dyn Fn(T) -> Result<U> + Send + Sync>;

/// Maps each value; a mapping error terminates the stream.
pub struct TryMap<T, U> {
    inner: BoxProducer<T>,
    f: MapFn<T, U>,
}

impl<T, U> TryMap<T, U> {
    /// Wrap `inner` with mapping function `f`.
    pub fn new<F>(inner: BoxProducer<T>, f: F) -> Self
    where
        F: Fn(T) -> Result<U> + Send + Sync + 'static,
    {
        Self {
            inner,
            f: Arc::new(f),
        }
    }
}

struct TryMapObserver<T, U> {
    downstream: Arc<dyn Observer<U>>,
    f: MapFn<T, U>,
    failed: AtomicBool,
}

impl<T, U> Observer<T> for TryMapObserver<T, U>
where
    T: Send + 'static,
    U: Send + 'static,
{
    fn on_subscribe(&self, subscription: Box<dyn Subscription>) {
        self.downstream.on_subscribe(subscription);
    }

    fn on_next(&self, value: T) {
        if self.failed.load(Ordering::Acquire) {
            return;
        }
        match (self.f)(value) {
            Ok(mapped) => self.downstream.on_next(mapped),
            Err(e) => {
                if !self.failed.swap(true, Ordering::AcqRel) {
                    self.downstream.on_error(e);
                }
            }
        }
    }

    fn on_error(&self, error: BridgeError) {
        if !self.failed.swap(true, Ordering::AcqRel) {
            self.downstream.on_error(error);
        }
    }

    fn on_complete(&self) {
        if !self.failed.load(Ordering::Acquire) {
            self.downstream.on_complete();
        }
    }
}

impl<T, U> StreamProducer<U> for TryMap<T, U>
where
    T: Send + 'static,
    U: Send + 'static,
{
    fn subscribe(self: Box<Self>, observer: Arc<dyn Observer<U>>) -> Box<dyn Subscription> {
        let TryMap { inner, f } = *self;
        inner.subscribe(Arc::new(TryMapObserver {
            downstream: observer,
            f,
            failed: AtomicBool::new(false),
        }))
    }
}

/// Buffers every value and emits them as one `Vec` on completion.
///
/// An empty source yields an empty `Vec`; an error discards the buffer.
pub struct Collect<T> {
    inner: BoxProducer<T>,
}

impl<T> Collect<T> {
    /// Aggregate `inner`.
    pub fn new(inner: BoxProducer<T>) -> Self {
        Self { inner }
    }
}

struct CollectObserver<T> {
    downstream: Arc<dyn Observer<Vec<T>>>,
    buffer: Mutex<Option<Vec<T>>>,
}

impl<T> CollectObserver<T> {
    fn take(&self) -> Option<Vec<T>> {
        self.buffer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}

impl<T: Send + 'static> Observer<T> for CollectObserver<T> {
    fn on_subscribe(&self, subscription: Box<dyn Subscription>) {
        self.downstream.on_subscribe(subscription);
    }

    fn on_next(&self, value: T) {
        let mut buffer = self.buffer.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(items) = buffer.as_mut() {
            items.push(value);
        }
    }

    fn on_error(&self, error: BridgeError) {
        if self.take().is_some() {
            self.downstream.on_error(error);
        }
    }

    fn on_complete(&self) {
        if let Some(items) = self.take() {
            self.downstream.on_next(items);
            self.downstream.on_complete();
        }
    }
}

impl<T: Send + 'static> StreamProducer<Vec<T>> for Collect<T> {
    fn subscribe(self: Box<Self>, observer: Arc<dyn Observer<Vec<T>>>) -> Box<dyn Subscription> {
        self.inner.subscribe(Arc::new(CollectObserver {
            downstream: observer,
            buffer: Mutex::new(Some(Vec::new())),
        }))
    }
}
