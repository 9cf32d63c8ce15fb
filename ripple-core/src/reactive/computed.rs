//! Computed Implementation
//!
//! A Computed is a cached derived value that re-evaluates only when one of
//! its dependencies changes.
//!
//! # How Computed Values Work
//!
//! 1. On creation, the getter runs once under tracking. The result is cached
//!    and every observable it read becomes a dependency.
//!
//! 2. `get()` returns the cached value. It never runs the getter.
//!
//! 3. When a dependency's value changes, the computed value re-runs the
//!    getter under fresh tracking and overwrites the cache. Afterwards it
//!    drops the dependencies the new run did not read, so a getter with
//!    conditional reads only depends on what it actually read last. Edges
//!    that were read again stay where they are in each observable's
//!    notification order.
//!
//! If the getter panics during a re-run, the cache and the dependency set
//! of the last successful run are kept, so a later change can still bring
//! the value up to date.
//!
//! Recomputation is eager: it happens inside the `set` that caused it, not
//! on the next read. Because `Observable::set` ignores equal values, the
//! getter runs once per real change of a dependency.

use std::cell::{Cell, RefCell};
use std::fmt::{self, Debug};
use std::panic::{self, AssertUnwindSafe};
use std::rc::{Rc, Weak};

use super::context::Tracker;
use super::runtime::Runtime;
use super::subscriber::{
    release_sources, release_stale_sources, source_ids, ComputationId, ComputationKind, Sources,
    Subscriber, TrackedComputation,
};
use crate::error::{panic_message, ReactiveError, Result};

struct ComputedInner<T> {
    id: ComputationId,
    this: Weak<ComputedInner<T>>,
    getter: Box<dyn Fn() -> T>,
    value: RefCell<T>,
    sources: RefCell<Sources>,
    /// Number of times the getter has run, including the initial run.
    runs: Cell<usize>,
    disposed: Cell<bool>,
}

impl<T: 'static> ComputedInner<T> {
    fn subscriber(&self) -> Subscriber {
        self.this.clone()
    }

    fn recompute(&self) {
        let retained = source_ids(&self.sources.borrow());
        let (value, sources) =
            Tracker::run_retaining(self.id, self.subscriber(), retained, || (self.getter)());

        let previous = self.sources.replace(sources);
        release_stale_sources(previous, &self.sources.borrow(), self.id);
        if self.disposed.get() {
            // Disposed by its own body.
            release_sources(self.sources.take(), self.id);
        }
        *self.value.borrow_mut() = value;
        self.runs.set(self.runs.get() + 1);

        tracing::trace!(computation = %self.id, runs = self.runs.get(), "recomputed");
    }
}

impl<T: 'static> TrackedComputation for ComputedInner<T> {
    fn id(&self) -> ComputationId {
        self.id
    }

    fn kind(&self) -> ComputationKind {
        ComputationKind::Computed
    }

    fn notify(&self) {
        if !self.disposed.get() {
            self.recompute();
        }
    }

    fn dispose(&self) {
        self.disposed.set(true);
        release_sources(self.sources.take(), self.id);
    }

    fn is_disposed(&self) -> bool {
        self.disposed.get()
    }
}

/// A cached derived value that recomputes only when dependencies change.
///
/// # Type Parameters
///
/// - `T`: The type of the computed value. Must be `Clone` so `get` can hand
///   out copies of the cache.
///
/// # Example
///
/// ```rust
/// use ripple_core::reactive::{Computed, Observable};
///
/// let count = Observable::new(2);
/// let source = count.clone();
/// let doubled = Computed::new(move || source.get() * 2);
///
/// assert_eq!(doubled.get(), 4);
/// count.set(5);
/// assert_eq!(doubled.get(), 10);
/// ```
pub struct Computed<T> {
    inner: Rc<ComputedInner<T>>,
}

impl<T> Computed<T>
where
    T: Clone + 'static,
{
    /// Create a computed value, running `getter` once immediately to fill
    /// the cache and discover its dependencies.
    ///
    /// The runtime owns the computation until [`dispose`](Self::dispose) is
    /// called; dropping every handle does not stop it.
    pub fn new<F>(getter: F) -> Self
    where
        F: Fn() -> T + 'static,
    {
        Self::build(ComputationId::new(), getter)
    }

    /// Like [`new`](Self::new), but a panic in the initial getter run is
    /// returned as [`ReactiveError::ComputationPanicked`].
    pub fn try_new<F>(getter: F) -> Result<Self>
    where
        F: Fn() -> T + 'static,
    {
        let id = ComputationId::new();
        panic::catch_unwind(AssertUnwindSafe(|| Self::build(id, getter))).map_err(|payload| {
            ReactiveError::ComputationPanicked {
                id,
                message: panic_message(payload.as_ref()),
            }
        })
    }

    fn build<F>(id: ComputationId, getter: F) -> Self
    where
        F: Fn() -> T + 'static,
    {
        let inner = Rc::new_cyclic(|this: &Weak<ComputedInner<T>>| {
            let subscriber: Subscriber = this.clone();
            let (value, sources) = Tracker::run(id, subscriber, &getter);

            ComputedInner {
                id,
                this: this.clone(),
                getter: Box::new(getter),
                value: RefCell::new(value),
                sources: RefCell::new(sources),
                runs: Cell::new(1),
                disposed: Cell::new(false),
            }
        });

        Runtime::register(inner.clone());
        Self { inner }
    }

    /// Get the computation's unique ID.
    pub fn id(&self) -> ComputationId {
        self.inner.id
    }

    /// Get the cached value.
    ///
    /// Never runs the getter and never records a dependency.
    pub fn get(&self) -> T {
        self.inner.value.borrow().clone()
    }

    /// Borrow the cached value without cloning it.
    ///
    /// `f` must not set any observable this computed value depends on: the
    /// resulting recompute would need to replace the borrowed cache.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.inner.value.borrow())
    }

    /// Number of times the getter has run, including the initial run.
    pub fn recompute_count(&self) -> usize {
        self.inner.runs.get()
    }

    /// Number of observables read during the most recent run.
    pub fn dependency_count(&self) -> usize {
        self.inner.sources.borrow().len()
    }

    /// Stop recomputing. The last cached value stays readable.
    pub fn dispose(&self) -> Result<()> {
        Runtime::dispose(self.inner.id)
    }

    /// Check if the computed value has been disposed.
    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.get()
    }
}

impl<T> Clone for Computed<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T> Debug for Computed<T>
where
    T: Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Computed")
            .field("id", &self.inner.id)
            .field("value", &*self.inner.value.borrow())
            .field("runs", &self.inner.runs.get())
            .field("dependency_count", &self.inner.sources.borrow().len())
            .field("disposed", &self.inner.disposed.get())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
