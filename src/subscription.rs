//! Subscription handles and the one-shot cancellation guard.
//!
//! A [`Subscription`] is what a producer hands back from `subscribe`.
//! The [`SubscriptionGuard`] owns it on the bridge side and cancels it
//! exactly once, whichever trigger (producer termination or transport
//! lifecycle) fires first.
//!
//! # Attach/release ordering
//!
//! Producers hand their handle to `on_subscribe` before emitting, and
//! return it again from `subscribe`. The bridge attaches the first and
//! adopts the second only if nothing was attached. A producer that skips
//! `on_subscribe` may emit synchronously inside `subscribe`, so the guard
//! can still be released before the handle is attached. Both sides use sequentially
//! consistent operations so at least one of them observes the other:
//!
//! ```text
//! attach:  handle.set(h)      -> released.load()   -> cancel if released
//! release: released.swap(true) -> handle.get()     -> cancel if attached
//! ```
//!
//! The `cancelled` swap makes the actual `cancel()` call happen once.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use tokio_util::sync::CancellationToken;

/// Handle to an active subscription.
pub trait Subscription: Send + Sync {
    /// Stop further callback delivery.
    fn cancel(&self);

    /// Whether `cancel` has been called.
    fn is_cancelled(&self) -> bool;
}

/// Subscription backed by a shared flag that the producer polls.
#[derive(Debug, Clone, Default)]
pub struct FlagSubscription {
    cancelled: Arc<AtomicBool>,
}

impl FlagSubscription {
    /// Create a live subscription.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a subscription that is already cancelled.
    pub fn cancelled() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(true)),
        }
    }
}

impl Subscription for FlagSubscription {
    fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    #[inline]
    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

/// Subscription backed by a [`CancellationToken`].
#[derive(Debug, Clone)]
pub struct TokenSubscription {
    token: CancellationToken,
}

impl TokenSubscription {
    /// Wrap a token.
    pub fn new(token: CancellationToken) -> Self {
        Self { token }
    }
}

impl Subscription for TokenSubscription {
    fn cancel(&self) {
        self.token.cancel();
    }

    fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// Acquired once, released once; cancels the attached subscription.
#[derive(Default)]
pub struct SubscriptionGuard {
    handle: OnceLock<Box<dyn Subscription>>,
    released: AtomicBool,
    cancelled: AtomicBool,
}

impl SubscriptionGuard {
    /// Create an empty guard.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach the subscription returned by `subscribe`.
    ///
    /// If the guard was already released, the subscription is cancelled
    /// immediately. A second attach is refused and the extra subscription
    /// is cancelled.
    pub fn attach(&self, subscription: Box<dyn Subscription>) {
        if let Err(extra) = self.handle.set(subscription) {
            tracing::warn!("Subscription already attached, cancelling the extra one");
            extra.cancel();
            return;
        }

        if self.released.load(Ordering::SeqCst) {
            self.cancel_attached();
        }
    }

    /// Attach the handle `subscribe` returned, unless `on_subscribe`
    /// already attached one for the same subscription.
    pub fn adopt(&self, subscription: Box<dyn Subscription>) {
        if self.handle.get().is_some() {
            return;
        }
        self.attach(subscription);
    }

    /// Release the guard. Returns `true` only for the first call.
    pub fn release(&self) -> bool {
        if self.released.swap(true, Ordering::SeqCst) {
            return false;
        }
        self.cancel_attached();
        true
    }

    /// Whether the guard has been released.
    #[inline]
    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }

    /// Whether the attached subscription has been cancelled.
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    fn cancel_attached(&self) {
        if let Some(handle) = self.handle.get() {
            if !self.cancelled.swap(true, Ordering::SeqCst) {
                handle.cancel();
            }
        }
    }
}
