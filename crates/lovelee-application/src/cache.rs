//! Client-side read caches.
//!
//! A [`StateCache`] holds the last value a subscription delivered. UI code
//! may apply an optimistic change ahead of the round trip; the next
//! subscription callback replaces it with what the store actually holds.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::watch;

/// Watchable cache of one subscription's latest value.
///
/// Cheap to clone; clones share the value.
#[derive(Debug)]
pub struct StateCache<T> {
    sender: Arc<watch::Sender<T>>,
    optimistic: Arc<AtomicBool>,
}

impl<T> Clone for StateCache<T> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
            optimistic: self.optimistic.clone(),
        }
    }
}

impl<T> StateCache<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new(initial: T) -> Self {
        let (sender, _) = watch::channel(initial);
        Self {
            sender: Arc::new(sender),
            optimistic: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Snapshot of the cached value.
    pub fn current(&self) -> T {
        self.sender.borrow().clone()
    }

    /// Receiver that wakes on every change.
    pub fn changed(&self) -> watch::Receiver<T> {
        self.sender.subscribe()
    }

    /// Whether the value includes a local change the store has not confirmed.
    pub fn is_optimistic(&self) -> bool {
        self.optimistic.load(Ordering::Acquire)
    }

    /// Applies a local change immediately.
    pub fn apply_optimistic<F>(&self, change: F)
    where
        F: FnOnce(&mut T),
    {
        self.sender.send_modify(change);
        self.optimistic.store(true, Ordering::Release);
    }

    /// Replaces the value with authoritative store state.
    pub fn reconcile(&self, value: T) {
        self.sender.send_replace(value);
        self.optimistic.store(false, Ordering::Release);
    }

    /// Callback that reconciles this cache, for handing to a `subscribe` call.
    pub fn sink(&self) -> impl Fn(T) + Send + Sync + 'static {
        let cache = self.clone();
        move |value| cache.reconcile(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_optimistic_then_reconcile() {
        let cache = StateCache::new(vec![1]);
        let mut rx = cache.changed();

        cache.apply_optimistic(|v| v.push(2));
        assert!(cache.is_optimistic());
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), vec![1, 2]);

        let sink = cache.sink();
        sink(vec![1, 3]);
        assert!(!cache.is_optimistic());
        assert_eq!(cache.current(), vec![1, 3]);
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), vec![1, 3]);
    }
}
