//! Generic reactive store
//!
//! Every store in this crate is a `Store<S>`: a single owner of an in-memory
//! state value with three capabilities:
//!
//! - `snapshot()` - synchronous clone of the current state
//! - `subscribe()` - register a listener called after every committed change
//! - `patch()` - apply one explicit patch and notify listeners
//!
//! ## Patches
//!
//! State types implement [`Reducer`], which names an enum of every mutation
//! the state supports. Patches are applied by pattern matching, so the set of
//! possible changes to a store is closed and testable.
//!
//! ## Delivery
//!
//! Listeners run after the state lock is released and receive the snapshot
//! taken at commit time. A listener may itself call `patch`; the nested commit
//! is queued and delivered once the current one has reached every listener,
//! so listeners always observe commits in the order they happened.
//!
//! Only the thread that starts delivery waits for it. A `patch` from another
//! thread while delivery is running queues its snapshot and returns at once;
//! the delivering thread hands it to listeners afterwards, still in order.
//!
//! ```ignore
//! let store = Store::new(NotificationState::default());
//! let _sub = store.subscribe(|state| println!("{} notifications", state.items.len()));
//! store.patch(NotificationPatch::Clear);
//! ```

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, Weak};

/// A state value with a closed set of patches
pub trait Reducer: Clone + Send + 'static {
    /// Every mutation this state supports
    type Patch: Send;

    /// Apply a patch in place. Must not fail.
    fn apply(&mut self, patch: Self::Patch);
}

/// Callback invoked with the committed state
pub type Listener<S> = Arc<dyn Fn(&S) + Send + Sync>;

struct Shared<S> {
    state: S,
    version: u64,
    listeners: Vec<(u64, Listener<S>)>,
    next_listener_id: u64,
    /// Committed snapshots not yet delivered to listeners
    pending: VecDeque<S>,
    /// Set while some caller is draining `pending`
    dispatching: bool,
}

/// Handle to a store. Cloning the handle shares the same state.
pub struct Store<S> {
    shared: Arc<Mutex<Shared<S>>>,
}

impl<S> Clone for Store<S> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<S: Reducer> Store<S> {
    /// Create a store holding the given initial state
    pub fn new(initial: S) -> Self {
        Self {
            shared: Arc::new(Mutex::new(Shared {
                state: initial,
                version: 0,
                listeners: Vec::new(),
                next_listener_id: 0,
                pending: VecDeque::new(),
                dispatching: false,
            })),
        }
    }

    /// Get a copy of the current state
    pub fn snapshot(&self) -> S {
        self.lock().state.clone()
    }

    /// Read the current state without cloning all of it
    pub fn with<R>(&self, f: impl FnOnce(&S) -> R) -> R {
        f(&self.lock().state)
    }

    /// Number of patches committed so far
    pub fn version(&self) -> u64 {
        self.lock().version
    }

    /// Number of live subscriptions
    pub fn listener_count(&self) -> usize {
        self.lock().listeners.len()
    }

    /// Register a listener for committed changes
    ///
    /// The listener stays registered until the returned [`Subscription`] is
    /// dropped or explicitly unsubscribed.
    pub fn subscribe<F>(&self, listener: F) -> Subscription<S>
    where
        F: Fn(&S) + Send + Sync + 'static,
    {
        let mut shared = self.lock();
        let id = shared.next_listener_id;
        shared.next_listener_id += 1;
        shared.listeners.push((id, Arc::new(listener)));

        Subscription {
            id,
            shared: Arc::downgrade(&self.shared),
        }
    }

    /// Apply a patch and notify listeners
    pub fn patch(&self, patch: S::Patch) {
        {
            let mut shared = self.lock();
            shared.state.apply(patch);
            shared.version += 1;

            if shared.listeners.is_empty() {
                return;
            }

            let snapshot = shared.state.clone();
            shared.pending.push_back(snapshot);

            if shared.dispatching {
                return;
            }
            shared.dispatching = true;
        }

        self.drain();
    }

    /// Deliver queued snapshots until none remain
    fn drain(&self) {
        let guard = DispatchGuard { store: self };

        loop {
            let (snapshot, listeners) = {
                let mut shared = self.lock();
                match shared.pending.pop_front() {
                    Some(snapshot) => {
                        let listeners: Vec<Listener<S>> = shared
                            .listeners
                            .iter()
                            .map(|(_, listener)| Arc::clone(listener))
                            .collect();
                        (snapshot, listeners)
                    }
                    None => break,
                }
            };

            for listener in &listeners {
                listener(&snapshot);
            }
        }

        drop(guard);
    }

    fn lock(&self) -> MutexGuard<'_, Shared<S>> {
        lock_shared(&self.shared)
    }
}

impl<S: Reducer + Default> Default for Store<S> {
    fn default() -> Self {
        Self::new(S::default())
    }
}

/// Clears the dispatching flag even if a listener panics mid-delivery
struct DispatchGuard<'a, S: Reducer> {
    store: &'a Store<S>,
}

impl<S: Reducer> Drop for DispatchGuard<'_, S> {
    fn drop(&mut self) {
        let mut shared = self.store.lock();
        if std::thread::panicking() {
            shared.pending.clear();
        }
        shared.dispatching = false;
    }
}

fn lock_shared<S>(shared: &Mutex<Shared<S>>) -> MutexGuard<'_, Shared<S>> {
    shared.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Registration returned by [`Store::subscribe`]
#[must_use = "dropping a Subscription unsubscribes its listener"]
pub struct Subscription<S> {
    id: u64,
    shared: Weak<Mutex<Shared<S>>>,
}

impl<S> Subscription<S> {
    /// Remove the listener now
    pub fn unsubscribe(self) {}

    /// Keep the listener registered for the lifetime of the store
    pub fn detach(mut self) {
        self.shared = Weak::new();
    }
}

impl<S> Drop for Subscription<S> {
    fn drop(&mut self) {
        if let Some(shared) = self.shared.upgrade() {
            let mut shared = lock_shared(&shared);
            shared.listeners.retain(|(id, _)| *id != self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Clone, Default, PartialEq)]
    struct Counter {
        value: i64,
        label: String,
    }

    enum CounterPatch {
        Add(i64),
        Label(String),
    }

    impl Reducer for Counter {
        type Patch = CounterPatch;

        fn apply(&mut self, patch: CounterPatch) {
            match patch {
                CounterPatch::Add(n) => self.value += n,
                CounterPatch::Label(label) => self.label = label,
            }
        }
    }

    #[test]
    fn test_patch_updates_snapshot() {
        let store = Store::new(Counter::default());
        store.patch(CounterPatch::Add(2));
        store.patch(CounterPatch::Label("two".to_string()));

        let state = store.snapshot();
        assert_eq!(state.value, 2);
        assert_eq!(state.label, "two");
        assert_eq!(store.version(), 2);
    }

    #[test]
    fn test_listeners_see_every_commit_in_order() {
        let store = Store::new(Counter::default());
        let seen = Arc::new(Mutex::new(Vec::new()));

        let sink = Arc::clone(&seen);
        let _sub = store.subscribe(move |state: &Counter| sink.lock().unwrap().push(state.value));

        store.patch(CounterPatch::Add(1));
        store.patch(CounterPatch::Add(10));
        store.patch(CounterPatch::Add(100));

        assert_eq!(*seen.lock().unwrap(), vec![1, 11, 111]);
    }

    #[test]
    fn test_notification_is_synchronous() {
        let store = Store::new(Counter::default());
        let calls = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&calls);
        let _sub = store.subscribe(move |_: &Counter| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        store.patch(CounterPatch::Add(1));
        // Delivered before patch() returned
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_dropping_subscription_unsubscribes() {
        let store = Store::new(Counter::default());
        let calls = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&calls);
        let sub = store.subscribe(move |_: &Counter| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(store.listener_count(), 1);

        store.patch(CounterPatch::Add(1));
        sub.unsubscribe();
        store.patch(CounterPatch::Add(1));

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(store.listener_count(), 0);
    }

    #[test]
    fn test_detached_subscription_stays_registered() {
        let store = Store::new(Counter::default());
        store.subscribe(|_: &Counter| {}).detach();
        assert_eq!(store.listener_count(), 1);
    }

    #[test]
    fn test_reentrant_patch_is_delivered_after_current_commit() {
        let store = Store::new(Counter::default());
        let seen = Arc::new(Mutex::new(Vec::new()));

        // First listener reacts to value 1 by committing another change
        let handle = store.clone();
        let _reactor = store.subscribe(move |state: &Counter| {
            if state.value == 1 {
                handle.patch(CounterPatch::Add(1));
            }
        });

        let sink = Arc::clone(&seen);
        let _observer = store.subscribe(move |state: &Counter| sink.lock().unwrap().push(state.value));

        store.patch(CounterPatch::Add(1));

        // Observer still saw value 1 before value 2
        assert_eq!(*seen.lock().unwrap(), vec![1, 2]);
        assert_eq!(store.snapshot().value, 2);
    }

    #[test]
    fn test_patch_from_other_thread_during_delivery_is_queued() {
        let store = Store::new(Counter::default());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let returned_early = Arc::new(Mutex::new(None));

        let handle = store.clone();
        let flag = Arc::clone(&returned_early);
        let sink = Arc::clone(&seen);
        let _sub = store.subscribe(move |state: &Counter| {
            sink.lock().unwrap().push(state.value);
            if state.value == 1 {
                let other = handle.clone();
                let delivered = Arc::clone(&sink);
                // Joined inside the listener: only works if the other
                // thread's patch does not wait for delivery
                let len_after = std::thread::spawn(move || {
                    other.patch(CounterPatch::Add(10));
                    delivered.lock().unwrap().len()
                })
                .join()
                .unwrap();
                *flag.lock().unwrap() = Some(len_after);
            }
        });

        store.patch(CounterPatch::Add(1));

        // The other thread returned before its commit was delivered
        assert_eq!(*returned_early.lock().unwrap(), Some(1));
        assert_eq!(*seen.lock().unwrap(), vec![1, 11]);
    }

    #[test]
    fn test_listener_never_sees_partial_state() {
        let store = Store::new(Counter::default());
        let ok = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&ok);
        let _sub = store.subscribe(move |state: &Counter| {
            if state.label == state.value.to_string() || state.label.is_empty() {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });

        store.patch(CounterPatch::Add(5));
        store.patch(CounterPatch::Label("5".to_string()));

        assert_eq!(ok.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_with_reads_without_clone() {
        let store = Store::new(Counter::default());
        store.patch(CounterPatch::Add(7));
        assert_eq!(store.with(|state| state.value * 2), 14);
    }
}
