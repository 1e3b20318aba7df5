//! Stream producers.
//!
//! A [`StreamProducer`] pushes zero or more values to an [`Observer`], then
//! completes or fails. Subscribing consumes the producer and returns the
//! [`Subscription`] that stops delivery.
//!
//! The adapters here cover the common shapes:
//!
//! - [`just`], [`from_iter`], [`empty`], [`fail`] emit synchronously on the
//!   subscribing thread
//! - [`from_stream`] and [`from_future`] drive a `futures` stream or future
//!   on a tokio task
//! - [`publisher()`] hands back a [`Publisher`] that pushes values by hand
//!
//! [`ProducerExt`] adds `map`, `try_map` and `collect_vec`.
//!
//! # Example
//!
//! ```
//! use std::sync::{Arc, Mutex};
//! use reactive_bridge::observer::observer;
//! use reactive_bridge::producer::{self, ProducerExt, StreamProducer};
//!
//! let seen = Arc::new(Mutex::new(Vec::new()));
//! let sink = seen.clone();
//!
//! let p = producer::from_iter(vec![1, 2, 3]).map(|v| v * 10).collect_vec();
//! let _sub = Box::new(p).subscribe(Arc::new(observer(
//!     move |v: Vec<i32>| sink.lock().unwrap().push(v),
//!     |_| {},
//!     || {},
//! )));
//!
//! assert_eq!(*seen.lock().unwrap(), vec![vec![10, 20, 30]]);
//! ```

mod iter;
mod ops;
mod publisher;
mod stream;

use std::future::Future;
use std::sync::Arc;

use futures::Stream;

use crate::error::{BridgeError, Result};
use crate::observer::Observer;
use crate::subscription::Subscription;

pub use iter::IterProducer;
pub use ops::{Collect, TryMap};
pub use publisher::{publisher, PublishProducer, Publisher};
pub use stream::SpawnedProducer;

/// Asynchronous source of values.
pub trait StreamProducer<T>: Send {
    /// Start delivery to `observer`.
    ///
    /// Implementations call [`Observer::on_subscribe`] with a handle to the
    /// returned subscription before the first other signal. Callbacks may
    /// fire before this returns (synchronous producers) or later on any
    /// thread.
    fn subscribe(self: Box<Self>, observer: Arc<dyn Observer<T>>) -> Box<dyn Subscription>;
}

/// Type-erased producer.
pub type BoxProducer<T> = Box<dyn StreamProducer<T>>;

impl<T: 'static> StreamProducer<T> for BoxProducer<T> {
    fn subscribe(self: Box<Self>, observer: Arc<dyn Observer<T>>) -> Box<dyn Subscription> {
        (*self).subscribe(observer)
    }
}

/// Producer emitting one value, then completing.
pub fn just<T: Send + 'static>(value: T) -> IterProducer<std::iter::Once<T>> {
    IterProducer::new(std::iter::once(value))
}

/// Producer emitting every item of `items`, then completing.
pub fn from_iter<I>(items: I) -> IterProducer<I::IntoIter>
where
    I: IntoIterator,
    I::IntoIter: Send,
{
    IterProducer::new(items.into_iter())
}

/// Producer that completes without emitting.
pub fn empty<T: Send>() -> IterProducer<std::iter::Empty<T>> {
    IterProducer::new(std::iter::empty())
}

/// Producer that fails immediately with `error`.
pub fn fail<T: Send>(error: BridgeError) -> IterProducer<std::iter::Empty<T>> {
    IterProducer::failing(std::iter::empty(), error)
}

/// Producer driven by a `futures` stream on a tokio task.
pub fn from_stream<S, T>(stream: S) -> SpawnedProducer<S>
where
    S: Stream<Item = Result<T>> + Send + 'static,
    T: Send + 'static,
{
    SpawnedProducer::new(stream)
}

/// Producer emitting the output of one future, then completing.
pub fn from_future<F, T>(future: F) -> SpawnedProducer<futures::stream::Once<F>>
where
    F: Future<Output = Result<T>> + Send + 'static,
    T: Send + 'static,
{
    SpawnedProducer::new(futures::stream::once(future))
}

/// Combinators over any producer.
pub trait ProducerExt<T>: StreamProducer<T> + Sized + 'static {
    /// Transform each value.
    fn map<U, F>(self, f: F) -> TryMap<T, U>
    where
        F: Fn(T) -> U + Send + Sync + 'static,
        T: Send + 'static,
        U: Send + 'static,
    {
        TryMap::new(Box::new(self), move |v| Ok(f(v)))
    }

    /// Transform each value; an `Err` becomes the producer's error.
    fn try_map<U, F>(self, f: F) -> TryMap<T, U>
    where
        F: Fn(T) -> Result<U> + Send + Sync + 'static,
        T: Send + 'static,
        U: Send + 'static,
    {
        TryMap::new(Box::new(self), f)
    }

    /// Aggregate every value into one `Vec`, emitted on completion.
    fn collect_vec(self) -> Collect<T>
    where
        T: Send + 'static,
    {
        Collect::new(Box::new(self))
    }

    /// Erase the producer type.
    fn boxed(self) -> BoxProducer<T> {
        Box::new(self)
    }
}

impl<T, P> ProducerExt<T> for P where P: StreamProducer<T> + Sized + 'static {}
