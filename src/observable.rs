//! Minimal observable container.
//!
//! # Responsibilities
//! - Hold a single value behind `get`/`update`
//! - Notify subscribers after every update
//! - Hand back an unsubscribe guard for teardown
//!
//! # Design Decisions
//! - Plain struct composition, no trait-mixing; decorate by wrapping
//! - Subscribers are called with a snapshot taken after the mutation,
//!   outside the value lock, so a callback may call `get` freely
//! - `Subscription` unsubscribes on drop; `detach` keeps the callback
//!   alive for the lifetime of the observable

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

type Callback<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct Inner<T> {
    value: Mutex<T>,
    subscribers: Mutex<Vec<(u64, Callback<T>)>>,
    next_id: AtomicU64,
}

/// A shared, observable value.
///
/// Cloning the handle shares the underlying value and subscriber list.
pub struct Observable<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for Observable<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Clone + Send + 'static> Observable<T> {
    pub fn new(value: T) -> Self {
        Self {
            inner: Arc::new(Inner {
                value: Mutex::new(value),
                subscribers: Mutex::new(Vec::new()),
                next_id: AtomicU64::new(0),
            }),
        }
    }

    /// Snapshot of the current value.
    pub fn get(&self) -> T {
        self.inner.value.lock().unwrap().clone()
    }

    /// Read without cloning the whole value.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.inner.value.lock().unwrap())
    }

    /// Mutate the value and notify all subscribers.
    pub fn update<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let (result, snapshot) = {
            let mut guard = self.inner.value.lock().unwrap();
            let result = f(&mut guard);
            (result, guard.clone())
        };
        self.notify(&snapshot);
        result
    }

    /// Register a change callback; the returned guard unsubscribes on drop.
    pub fn subscribe(&self, cb: impl Fn(&T) + Send + Sync + 'static) -> Subscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner
            .subscribers
            .lock()
            .unwrap()
            .push((id, Arc::new(cb)));

        let weak: Weak<Inner<T>> = Arc::downgrade(&self.inner);
        Subscription {
            cancel: Some(Box::new(move || {
                if let Some(inner) = weak.upgrade() {
                    inner
                        .subscribers
                        .lock()
                        .unwrap()
                        .retain(|(sub_id, _)| *sub_id != id);
                }
            })),
        }
    }

    fn notify(&self, value: &T) {
        let callbacks: Vec<Callback<T>> = self
            .inner
            .subscribers
            .lock()
            .unwrap()
            .iter()
            .map(|(_, cb)| Arc::clone(cb))
            .collect();
        for cb in callbacks {
            cb(value);
        }
    }
}

/// Guard for an active subscription.
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    /// Remove the callback now.
    pub fn unsubscribe(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }

    /// Keep the callback registered for the observable's lifetime.
    pub fn detach(mut self) {
        self.cancel = None;
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn update_notifies_subscribers() {
        let obs = Observable::new(0u32);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);
        let sub = obs.subscribe(move |v| seen_clone.lock().unwrap().push(*v));

        obs.update(|v| *v = 1);
        obs.update(|v| *v += 9);

        assert_eq!(*seen.lock().unwrap(), vec![1, 10]);
        assert_eq!(obs.get(), 10);
        drop(sub);
    }

    #[test]
    fn dropped_subscription_stops_notifications() {
        let obs = Observable::new(0u32);
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = Arc::clone(&count);
        let sub = obs.subscribe(move |_| {
            count_clone.fetch_add(1, Ordering::SeqCst);
        });

        obs.update(|v| *v = 1);
        sub.unsubscribe();
        obs.update(|v| *v = 2);

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn subscriber_may_read_back() {
        let obs = Observable::new(5u32);
        let obs_clone = obs.clone();
        let sub = obs.subscribe(move |v| {
            // get() must not deadlock inside a notification
            assert_eq!(obs_clone.get(), *v);
        });
        obs.update(|v| *v = 6);
        drop(sub);
    }
}
