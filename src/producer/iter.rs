//! Synchronous producer over an iterator.

use std::sync::Arc;

use crate::error::BridgeError;
use crate::observer::Observer;
use crate::subscription::{FlagSubscription, Subscription};

use super::StreamProducer;

/// Emits every item on the subscribing thread, then completes or fails.
///
/// Cancellation is checked before each item is pulled, so an observer that
/// cancels from inside `on_next` stops the iterator.
pub struct IterProducer<I> {
    items: I,
    error: Option<BridgeError>,
}

impl<I> IterProducer<I> {
    /// Emit `items`, then complete.
    pub fn new(items: I) -> Self {
        Self { items, error: None }
    }

    /// Emit `items`, then fail with `error`.
    pub fn failing(items: I, error: BridgeError) -> Self {
        Self {
            items,
            error: Some(error),
        }
    }

    /// Subscribe with an externally owned subscription flag.
    ///
    /// Lets callers cancel delivery that is still in progress on this thread.
    pub fn subscribe_with(self, observer: Arc<dyn Observer<I::Item>>, subscription: &FlagSubscription)
    where
        I: Iterator,
    {
        let IterProducer { mut items, error } = self;
        while !subscription.is_cancelled() {
            let Some(item) = items.next() else {
                match error {
                    Some(error) => observer.on_error(error),
                    None => observer.on_complete(),
                }
                return;
            };
            observer.on_next(item);
        }
    }
}

impl<I> StreamProducer<I::Item> for IterProducer<I>
where
    I: Iterator + Send,
{
    fn subscribe(self: Box<Self>, observer: Arc<dyn Observer<I::Item>>) -> Box<dyn Subscription> {
        let subscription = FlagSubscription::new();
        observer.on_subscribe(Box::new(subscription.clone()));
        (*self).subscribe_with(observer, &subscription);
        Box::new(subscription)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::observer;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn recording<T: std::fmt::Debug + Send + 'static>() -> (Arc<Mutex<Vec<String>>>, Arc<dyn Observer<T>>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let (l1, l2, l3) = (log.clone(), log.clone(), log.clone());
        let obs = observer(
            move |v: T| l1.lock().unwrap().push(format!("next:{v:?}")),
            move |e| l2.lock().unwrap().push(format!("error:{e}")),
            move || l3.lock().unwrap().push("complete".to_string()),
        );
        (log, Arc::new(obs))
    }

    #[test]
    fn test_emits_then_completes() {
        let (log, obs) = recording::<i32>();
        let sub = Box::new(IterProducer::new(vec![1, 2].into_iter())).subscribe(obs);

        assert!(!sub.is_cancelled());
        assert_eq!(*log.lock().unwrap(), vec!["next:1", "next:2", "complete"]);
    }

    #[test]
    fn test_failing_emits_error_last() {
        let (log, obs) = recording::<i32>();
        let producer = IterProducer::failing(vec![1].into_iter(), BridgeError::producer_msg("E"));
        Box::new(producer).subscribe(obs);

        assert_eq!(
            *log.lock().unwrap(),
            vec!["next:1", "error:Producer error: E"]
        );
    }

    #[test]
    fn test_cancel_during_delivery_stops_items() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let subscription = FlagSubscription::new();

        let sink = log.clone();
        let sub = subscription.clone();
        let obs = observer(
            move |v: i32| {
                sink.lock().unwrap().push(v);
                if v == 2 {
                    sub.cancel();
                }
            },
            |_| {},
            || panic!("must not complete after cancel"),
        );

        IterProducer::new(1..=5).subscribe_with(Arc::new(obs), &subscription);
        assert_eq!(*log.lock().unwrap(), vec![1, 2]);
    }

    struct CancelAfter {
        limit: usize,
        seen: AtomicUsize,
        handle: Mutex<Option<Box<dyn Subscription>>>,
    }

    impl Observer<u64> for CancelAfter {
        fn on_subscribe(&self, subscription: Box<dyn Subscription>) {
            *self.handle.lock().unwrap() = Some(subscription);
        }

        fn on_next(&self, _: u64) {
            if self.seen.fetch_add(1, Ordering::SeqCst) + 1 == self.limit {
                if let Some(handle) = self.handle.lock().unwrap().as_ref() {
                    handle.cancel();
                }
            }
        }

        fn on_error(&self, _: BridgeError) {}

        fn on_complete(&self) {
            panic!("cancelled producer completed");
        }
    }

    #[test]
    fn test_subscribe_hands_out_handle_before_items() {
        let pulled = Arc::new(AtomicUsize::new(0));
        let counter = pulled.clone();
        let items = std::iter::repeat(1u64).inspect(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let obs = Arc::new(CancelAfter {
            limit: 3,
            seen: AtomicUsize::new(0),
            handle: Mutex::new(None),
        });

        let sub = Box::new(IterProducer::new(items)).subscribe(obs.clone());

        assert!(sub.is_cancelled());
        assert_eq!(pulled.load(Ordering::SeqCst), 3);
        assert_eq!(obs.seen.load(Ordering::SeqCst), 3);
    }
}
