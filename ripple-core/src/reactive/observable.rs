//! Observable Implementation
//!
//! An Observable is the fundamental reactive primitive. It holds a value and
//! tracks which computations depend on it.
//!
//! # How Observables Work
//!
//! 1. When an observable is read while a computation is being tracked, the
//!    observable records that computation as a subscriber, and the
//!    computation records the observable as one of its sources.
//!
//! 2. When `set` stores a value that differs from the current one, every
//!    subscriber is notified, in the order it first subscribed.
//!
//! 3. Setting an equal value does nothing at all.
//!
//! Dependencies are discovered by actually executing reads, so a
//! short-circuited `a.get() && b.get()` only depends on `b` when `a` is true.
//!
//! # Memory Layout
//!
//! Each observable consists of:
//! - A unique ID (8 bytes)
//! - The value, behind `Rc<RefCell<_>>` shared by every clone of the handle
//! - An ordered map of subscriber IDs to weak subscriber handles

use std::cell::RefCell;
use std::fmt::{self, Debug};
use std::rc::{Rc, Weak};

use indexmap::IndexMap;

use super::context::Tracker;
use super::runtime::Runtime;
use super::subscriber::{ComputationId, ObservableId, Source, Subscriber};
use crate::config::UntrackedReadPolicy;

struct ObservableInner<T> {
    id: ObservableId,
    value: RefCell<T>,
    subscribers: RefCell<IndexMap<ComputationId, Subscriber>>,
}

impl<T> Source for ObservableInner<T> {
    fn unsubscribe(&self, subscriber: ComputationId) {
        self.subscribers.borrow_mut().shift_remove(&subscriber);
    }
}

/// A reactive cell holding a value of type `T`.
///
/// Cloning an `Observable` yields another handle to the same cell.
///
/// # Example
///
/// ```rust
/// use ripple_core::reactive::Observable;
///
/// let count = Observable::new(0);
///
/// // Read the value
/// assert_eq!(count.get_untracked(), 0);
///
/// // Update the value (notifies subscribers)
/// count.set(5);
/// assert_eq!(count.get_untracked(), 5);
/// ```
pub struct Observable<T> {
    inner: Rc<ObservableInner<T>>,
}

impl<T> Observable<T>
where
    T: Clone + PartialEq + 'static,
{
    /// Create a new observable with the given initial value.
    pub fn new(value: T) -> Self {
        Self {
            inner: Rc::new(ObservableInner {
                id: ObservableId::new(),
                value: RefCell::new(value),
                subscribers: RefCell::new(IndexMap::new()),
            }),
        }
    }

    /// Get the observable's unique ID.
    pub fn id(&self) -> ObservableId {
        self.inner.id
    }

    /// Get the current value.
    ///
    /// If called while a computation is being tracked, this also subscribes
    /// that computation to the observable.
    pub fn get(&self) -> T {
        self.track();
        self.inner.value.borrow().clone()
    }

    /// Borrow the current value without cloning it. Tracked like [`get`](Self::get).
    ///
    /// `f` must not call [`set`](Self::set) on this observable.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.track();
        f(&self.inner.value.borrow())
    }

    /// Get the current value without tracking dependencies or reporting a
    /// stray read.
    pub fn get_untracked(&self) -> T {
        self.inner.value.borrow().clone()
    }

    /// Set a new value and notify subscribers if it differs from the current
    /// one.
    ///
    /// Returns whether the value changed. Notification is synchronous: every
    /// dependent computation has re-run by the time this returns.
    pub fn set(&self, value: T) -> bool {
        if *self.inner.value.borrow() == value {
            return false;
        }

        *self.inner.value.borrow_mut() = value;
        self.notify_subscribers();
        true
    }

    /// Update the value using a function of the current one.
    pub fn update<F>(&self, f: F) -> bool
    where
        F: FnOnce(&T) -> T,
    {
        let next = f(&self.inner.value.borrow());
        self.set(next)
    }

    /// Get the number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.inner
            .subscribers
            .borrow()
            .values()
            .filter(|subscriber| subscriber.strong_count() > 0)
            .count()
    }

    /// Whether the computation `id` is subscribed to this observable.
    pub fn has_subscriber(&self, id: ComputationId) -> bool {
        self.inner.subscribers.borrow().contains_key(&id)
    }

    fn track(&self) {
        match Tracker::current_subscriber() {
            Some((id, subscriber)) => {
                self.inner
                    .subscribers
                    .borrow_mut()
                    .entry(id)
                    .or_insert(subscriber);

                let source: Weak<ObservableInner<T>> = Rc::downgrade(&self.inner);
                Tracker::record_source(self.inner.id, source);
            }
            None if Tracker::is_active() => {}
            None => self.report_untracked_read(),
        }
    }

    fn report_untracked_read(&self) {
        match Runtime::config().untracked_reads {
            UntrackedReadPolicy::Warn => tracing::warn!(
                observable = %self.inner.id,
                "observable read outside of a tracked computation; no dependency recorded"
            ),
            UntrackedReadPolicy::Debug => tracing::debug!(
                observable = %self.inner.id,
                "observable read outside of a tracked computation"
            ),
            UntrackedReadPolicy::Silent => {}
        }
    }

    /// Notify all live subscribers that the value has changed.
    fn notify_subscribers(&self) {
        // Snapshot first: subscribers re-run synchronously and may drop or
        // add edges on this observable while we iterate.
        let snapshot: Vec<Subscriber> = {
            let mut subscribers = self.inner.subscribers.borrow_mut();
            subscribers.retain(|_, subscriber| subscriber.strong_count() > 0);
            subscribers.values().cloned().collect()
        };

        tracing::trace!(
            observable = %self.inner.id,
            subscribers = snapshot.len(),
            "value changed"
        );

        for subscriber in snapshot {
            if let Some(computation) = subscriber.upgrade() {
                if !computation.is_disposed() {
                    computation.notify();
                }
            }
        }
    }
}

impl<T> Clone for Observable<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T> Debug for Observable<T>
where
    T: Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observable")
            .field("id", &self.inner.id)
            .field("value", &*self.inner.value.borrow())
            .field("subscriber_count", &self.inner.subscribers.borrow().len())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::subscriber::{ComputationKind, TrackedComputation};
    use std::cell::Cell;

    struct Counter {
        id: ComputationId,
        calls: Cell<usize>,
    }

    impl TrackedComputation for Counter {
        fn id(&self) -> ComputationId {
            self.id
        }
        fn kind(&self) -> ComputationKind {
            ComputationKind::Reaction
        }
        fn notify(&self) {
            self.calls.set(self.calls.get() + 1);
        }
        fn dispose(&self) {}
        fn is_disposed(&self) -> bool {
            false
        }
    }

    fn counter() -> Rc<Counter> {
        Rc::new(Counter {
            id: ComputationId::new(),
            calls: Cell::new(0),
        })
    }

    fn read_as<T: Clone + PartialEq + 'static>(observable: &Observable<T>, who: &Rc<Counter>) -> T {
        let subscriber: Rc<dyn TrackedComputation> = who.clone();
        let scope = Tracker::enter(who.id, Rc::downgrade(&subscriber));
        let value = observable.get();
        let _ = scope.finish();
        value
    }

    #[test]
    fn observable_get_and_set() {
        let observable = Observable::new(0);
        assert_eq!(observable.get_untracked(), 0);

        assert!(observable.set(42));
        assert_eq!(observable.get_untracked(), 42);
    }

    #[test]
    fn observable_update() {
        let observable = Observable::new(10);
        observable.update(|v| v + 5);
        assert_eq!(observable.get_untracked(), 15);
    }

    #[test]
    fn tracked_read_subscribes_once() {
        let observable = Observable::new(1);
        let who = counter();

        read_as(&observable, &who);
        read_as(&observable, &who);

        assert_eq!(observable.subscriber_count(), 1);
        assert!(observable.has_subscriber(who.id));
    }

    #[test]
    fn untracked_read_does_not_subscribe() {
        let observable = Observable::new(1);
        assert_eq!(observable.get(), 1);
        assert_eq!(observable.subscriber_count(), 0);
    }

    #[test]
    fn set_notifies_only_on_change() {
        let observable = Observable::new(0);
        let who = counter();
        read_as(&observable, &who);

        assert!(!observable.set(0));
        assert_eq!(who.calls.get(), 0);

        assert!(observable.set(1));
        assert_eq!(who.calls.get(), 1);

        assert!(!observable.set(1));
        assert_eq!(who.calls.get(), 1);
    }

    #[test]
    fn notifies_in_subscription_order() {
        thread_local! {
            static ORDER: RefCell<Vec<ComputationId>> = const { RefCell::new(Vec::new()) };
        }

        struct Recorder(ComputationId);
        impl TrackedComputation for Recorder {
            fn id(&self) -> ComputationId {
                self.0
            }
            fn kind(&self) -> ComputationKind {
                ComputationKind::Reaction
            }
            fn notify(&self) {
                ORDER.with(|order| order.borrow_mut().push(self.0));
            }
            fn dispose(&self) {}
            fn is_disposed(&self) -> bool {
                false
            }
        }

        let observable = Observable::new("a".to_string());
        let recorders: Vec<Rc<dyn TrackedComputation>> = (0..3)
            .map(|_| Rc::new(Recorder(ComputationId::new())) as Rc<dyn TrackedComputation>)
            .collect();

        for recorder in &recorders {
            let scope = Tracker::enter(recorder.id(), Rc::downgrade(recorder));
            observable.get();
            let _ = scope.finish();
        }

        observable.set("b".to_string());

        let expected: Vec<_> = recorders.iter().map(|r| r.id()).collect();
        ORDER.with(|order| assert_eq!(*order.borrow(), expected));
    }

    #[test]
    fn dropped_subscribers_are_pruned() {
        let observable = Observable::new(0);
        let who = counter();
        read_as(&observable, &who);
        assert_eq!(observable.subscriber_count(), 1);

        drop(who);
        assert_eq!(observable.subscriber_count(), 0);

        observable.set(1);
        assert!(observable.inner.subscribers.borrow().is_empty());
    }

    #[test]
    fn unsubscribe_removes_edge() {
        let observable = Observable::new(0);
        let who = counter();
        read_as(&observable, &who);

        observable.inner.unsubscribe(who.id);
        observable.set(1);
        assert_eq!(who.calls.get(), 0);
    }

    #[test]
    fn observable_clone_shares_state() {
        let observable1 = Observable::new(0);
        let observable2 = observable1.clone();

        observable1.set(42);
        assert_eq!(observable2.get_untracked(), 42);
        assert_eq!(observable1.id(), observable2.id());
    }

    #[test]
    fn observable_ids_are_unique() {
        let o1 = Observable::new(0);
        let o2 = Observable::new(0);
        assert_ne!(o1.id(), o2.id());
    }
}
