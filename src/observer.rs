//! Observer callbacks a stream producer delivers to.
//!
//! A producer calls `on_subscribe` once, then `on_next` zero or more times,
//! then exactly one of `on_error` or `on_complete`. Calls may arrive on any
//! thread, but never concurrently for the same subscription.

use crate::error::BridgeError;
use crate::subscription::Subscription;

/// Receiver of a producer's signals.
pub trait Observer<T>: Send + Sync {
    /// Delivery is about to start; `subscription` cancels it.
    ///
    /// Arrives before any other signal, so an observer can stop a
    /// synchronous producer from inside `on_next`.
    fn on_subscribe(&self, subscription: Box<dyn Subscription>) {
        drop(subscription);
    }

    /// A value was emitted.
    fn on_next(&self, value: T);

    /// The producer failed. Terminal.
    fn on_error(&self, error: BridgeError);

    /// The producer finished normally. Terminal.
    fn on_complete(&self);
}

/// Observer built from a closure triple.
pub struct FnObserver<N, E, C> {
    next: N,
    error: E,
    complete: C,
}

/// Build an observer from three closures.
///
/// # Example
///
/// ```
/// use reactive_bridge::observer::{observer, Observer};
///
/// let obs = observer(
///     |v: i32| println!("next {v}"),
///     |e| println!("error {e}"),
///     || println!("done"),
/// );
/// obs.on_next(1);
/// obs.on_complete();
/// ```
pub fn observer<T, N, E, C>(next: N, error: E, complete: C) -> FnObserver<N, E, C>
where
    N: Fn(T) + Send + Sync,
    E: Fn(BridgeError) + Send + Sync,
    C: Fn() + Send + Sync,
{
    FnObserver {
        next,
        error,
        complete,
    }
}

impl<T, N, E, C> Observer<T> for FnObserver<N, E, C>
where
    N: Fn(T) + Send + Sync,
    E: Fn(BridgeError) + Send + Sync,
    C: Fn() + Send + Sync,
{
    fn on_next(&self, value: T) {
        (self.next)(value)
    }

    fn on_error(&self, error: BridgeError) {
        (self.error)(error)
    }

    fn on_complete(&self) {
        (self.complete)()
    }
}
