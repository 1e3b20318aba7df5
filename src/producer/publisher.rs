//! Hand-driven producer: values are pushed through a [`Publisher`].

use std::sync::{Arc, Mutex, PoisonError};

use super::StreamProducer;
use crate::error::BridgeError;
use crate::observer::Observer;
use crate::subscription::{FlagSubscription, Subscription};

struct Shared<T> {
    observer: Mutex<Option<Arc<dyn Observer<T>>>>,
    subscription: FlagSubscription,
}

/// Pushing side of a [`PublishProducer`].
///
/// Signals sent before anyone subscribed, after a terminal signal, or
/// after the subscriber cancelled are dropped.
pub struct Publisher<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for Publisher<T> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

/// Subscribing side of a [`Publisher`].
pub struct PublishProducer<T> {
    shared: Arc<Shared<T>>,
}

/// Create a connected publisher/producer pair.
pub fn publisher<T>() -> (Publisher<T>, PublishProducer<T>) {
    let shared = Arc::new(Shared {
        observer: Mutex::new(None),
        subscription: FlagSubscription::new(),
    });
    (
        Publisher {
            shared: shared.clone(),
        },
        PublishProducer { shared },
    )
}

impl<T> Publisher<T> {
    /// Emit a value. Returns `false` if it was dropped.
    pub fn next(&self, value: T) -> bool {
        if self.is_cancelled() {
            return false;
        }
        let Some(observer) = self.current() else {
            return false;
        };
        observer.on_next(value);
        true
    }

    /// Fail the stream.
    pub fn error(&self, error: BridgeError) -> bool {
        match self.take() {
            Some(observer) => {
                observer.on_error(error);
                true
            }
            None => false,
        }
    }

    /// Complete the stream.
    pub fn complete(&self) -> bool {
        match self.take() {
            Some(observer) => {
                observer.on_complete();
                true
            }
            None => false,
        }
    }

    /// Whether a subscriber is attached and no terminal signal was sent.
    pub fn is_subscribed(&self) -> bool {
        self.current().is_some()
    }

    /// Whether the subscriber cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.shared.subscription.is_cancelled()
    }

    fn current(&self) -> Option<Arc<dyn Observer<T>>> {
        self.shared
            .observer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn take(&self) -> Option<Arc<dyn Observer<T>>> {
        self.shared
            .observer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}

impl<T: Send + 'static> StreamProducer<T> for PublishProducer<T> {
    fn subscribe(self: Box<Self>, observer: Arc<dyn Observer<T>>) -> Box<dyn Subscription> {
        observer.on_subscribe(Box::new(self.shared.subscription.clone()));
        *self
            .shared
            .observer
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(observer);
        Box::new(self.shared.subscription.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::observer;

    #[test]
    fn test_signals_reach_subscriber() {
        let (publisher, producer) = publisher::<u32>();
        assert!(!publisher.next(0));

        let (tx, rx) = std::sync::mpsc::channel();
        let t1 = tx.clone();
        let _sub = Box::new(producer).subscribe(Arc::new(observer(
            move |v: u32| t1.send(format!("next {v}")).unwrap(),
            |_| {},
            move || tx.send("complete".to_string()).unwrap(),
        )));

        assert!(publisher.is_subscribed());
        assert!(publisher.next(1));
        assert!(publisher.complete());
        assert!(!publisher.next(2));
        assert!(!publisher.error(BridgeError::Timeout));

        let seen: Vec<String> = rx.try_iter().collect();
        assert_eq!(seen, vec!["next 1", "complete"]);
    }

    #[test]
    fn test_cancel_drops_values() {
        let (publisher, producer) = publisher::<u32>();
        let sub = Box::new(producer).subscribe(Arc::new(observer(
            |_: u32| panic!("value after cancel"),
            |_| {},
            || {},
        )));

        sub.cancel();
        assert!(publisher.is_cancelled());
        assert!(!publisher.next(1));
    }
}
