//! Transport lifecycle notifications: timeout and completion.
//!
//! Both [`DeferredResult`](crate::deferred::DeferredResult) and the
//! streaming emitters expose the same two inbound notifications. Each slot
//! fires at most once; a callback registered after its slot fired runs
//! immediately on the registering thread.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

/// Callback invoked by a lifecycle notification.
pub type LifecycleCallback = Box<dyn FnOnce() + Send + 'static>;

#[derive(Default)]
struct CallbackSlot {
    fired: AtomicBool,
    callbacks: Mutex<Vec<LifecycleCallback>>,
}

impl CallbackSlot {
    fn register(&self, callback: LifecycleCallback) {
        {
            let mut callbacks = self
                .callbacks
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            // Checked under the lock so `fire` cannot drain between check and push.
            if !self.fired.load(Ordering::Acquire) {
                callbacks.push(callback);
                return;
            }
        }
        callback();
    }

    fn fire(&self) -> bool {
        let drained = {
            let mut callbacks = self
                .callbacks
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if self.fired.swap(true, Ordering::AcqRel) {
                return false;
            }
            std::mem::take(&mut *callbacks)
        };

        for callback in drained {
            callback();
        }
        true
    }

    #[inline]
    fn has_fired(&self) -> bool {
        self.fired.load(Ordering::Acquire)
    }
}

/// Pair of one-shot notification slots for one exchange.
#[derive(Default)]
pub struct Lifecycle {
    timeout: CallbackSlot,
    completion: CallbackSlot,
}

impl Lifecycle {
    /// Create a lifecycle with nothing fired.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a timeout callback.
    pub fn on_timeout(&self, callback: LifecycleCallback) {
        self.timeout.register(callback);
    }

    /// Register a completion callback.
    pub fn on_completion(&self, callback: LifecycleCallback) {
        self.completion.register(callback);
    }

    /// Fire timeout callbacks. Returns `false` if already fired.
    pub fn fire_timeout(&self) -> bool {
        self.timeout.fire()
    }

    /// Fire completion callbacks. Returns `false` if already fired.
    pub fn fire_completion(&self) -> bool {
        self.completion.fire()
    }

    /// Whether the timeout notification fired.
    pub fn is_timed_out(&self) -> bool {
        self.timeout.has_fired()
    }

    /// Whether the completion notification fired.
    pub fn is_completed(&self) -> bool {
        self.completion.has_fired()
    }
}
