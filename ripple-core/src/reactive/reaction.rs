//! Reaction Implementation
//!
//! A Reaction pairs a boolean predicate with a side-effecting callback.
//!
//! # How Reactions Work
//!
//! 1. When created, the reaction evaluates its predicate immediately, under
//!    tracking. If it returns `true` the effect fires before `new` returns.
//!
//! 2. When any observable read by the predicate changes, the predicate is
//!    evaluated again under fresh tracking, and the effect fires if it is
//!    `true`.
//!
//!    Observables read again keep the reaction's original place in their
//!    notification order. A predicate that panics leaves the previous
//!    dependencies in place.
//!
//! 3. Only the predicate is tracked. The effect runs untracked, so reads
//!    inside it never become dependencies.
//!
//! # Re-entrancy
//!
//! Nothing guards against an effect that sets an observable. The nested
//! `set` runs its own notifications on the same stack before the outer one
//! continues, and a reaction that re-triggers itself recurses until the
//! stack overflows.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::rc::{Rc, Weak};

use super::context::{untracked, Tracker};
use super::runtime::Runtime;
use super::subscriber::{
    release_sources, release_stale_sources, source_ids, ComputationId, ComputationKind, Sources,
    TrackedComputation,
};
use crate::error::{panic_message, ReactiveError, Result};

struct ReactionInner {
    id: ComputationId,
    this: Weak<ReactionInner>,
    predicate: Box<dyn Fn() -> bool>,
    effect: Box<dyn Fn()>,
    sources: RefCell<Sources>,
    evaluations: Cell<usize>,
    effect_runs: Cell<usize>,
    disposed: Cell<bool>,
}

impl ReactionInner {
    /// Evaluate the predicate under tracking and fire the effect if it holds.
    fn schedule(&self) {
        if self.disposed.get() {
            return;
        }

        let retained = source_ids(&self.sources.borrow());
        let (fire, sources) =
            Tracker::run_retaining(self.id, self.this.clone(), retained, || (self.predicate)());

        let previous = self.sources.replace(sources);
        release_stale_sources(previous, &self.sources.borrow(), self.id);
        if self.disposed.get() {
            // Disposed by its own body.
            release_sources(self.sources.take(), self.id);
            return;
        }
        self.evaluations.set(self.evaluations.get() + 1);

        tracing::trace!(computation = %self.id, fire, "predicate evaluated");

        if fire {
            self.effect_runs.set(self.effect_runs.get() + 1);
            untracked(|| (self.effect)());
        }
    }
}

impl TrackedComputation for ReactionInner {
    fn id(&self) -> ComputationId {
        self.id
    }

    fn kind(&self) -> ComputationKind {
        ComputationKind::Reaction
    }

    fn notify(&self) {
        self.schedule();
    }

    fn dispose(&self) {
        self.disposed.set(true);
        release_sources(self.sources.take(), self.id);
    }

    fn is_disposed(&self) -> bool {
        self.disposed.get()
    }
}

/// A side effect that fires whenever its predicate evaluates to `true`.
///
/// # Example
///
/// ```rust
/// use ripple_core::reactive::{Observable, Reaction};
/// use std::cell::Cell;
/// use std::rc::Rc;
///
/// let ready = Observable::new(false);
/// let fired = Rc::new(Cell::new(0));
///
/// let source = ready.clone();
/// let counter = fired.clone();
/// Reaction::new(move || source.get(), move || counter.set(counter.get() + 1));
///
/// ready.set(true);
/// assert_eq!(fired.get(), 1);
/// ```
#[derive(Clone)]
pub struct Reaction {
    inner: Rc<ReactionInner>,
}

impl Reaction {
    /// Create a reaction and evaluate it once immediately.
    ///
    /// The runtime owns the reaction until [`dispose`](Self::dispose) is
    /// called, so the returned handle may be dropped.
    pub fn new<P, E>(predicate: P, effect: E) -> Self
    where
        P: Fn() -> bool + 'static,
        E: Fn() + 'static,
    {
        let reaction = Self::new_lazy(predicate, effect);
        reaction.inner.schedule();
        reaction
    }

    /// Like [`new`](Self::new), but a panic from the initial predicate or
    /// effect run is returned as [`ReactiveError::ComputationPanicked`].
    ///
    /// A reaction that failed this way is disposed before returning.
    pub fn try_new<P, E>(predicate: P, effect: E) -> Result<Self>
    where
        P: Fn() -> bool + 'static,
        E: Fn() + 'static,
    {
        let reaction = Self::new_lazy(predicate, effect);
        let id = reaction.id();

        match panic::catch_unwind(AssertUnwindSafe(|| reaction.inner.schedule())) {
            Ok(()) => Ok(reaction),
            Err(payload) => {
                Runtime::dispose(id)?;
                Err(ReactiveError::ComputationPanicked {
                    id,
                    message: panic_message(payload.as_ref()),
                })
            }
        }
    }

    /// Create a registered reaction without evaluating it.
    fn new_lazy<P, E>(predicate: P, effect: E) -> Self
    where
        P: Fn() -> bool + 'static,
        E: Fn() + 'static,
    {
        let inner = Rc::new_cyclic(|this| ReactionInner {
            id: ComputationId::new(),
            this: this.clone(),
            predicate: Box::new(predicate),
            effect: Box::new(effect),
            sources: RefCell::new(Sources::new()),
            evaluations: Cell::new(0),
            effect_runs: Cell::new(0),
            disposed: Cell::new(false),
        });

        Runtime::register(inner.clone());
        Self { inner }
    }

    /// Get the reaction's unique ID.
    pub fn id(&self) -> ComputationId {
        self.inner.id
    }

    /// Number of times the effect has fired.
    pub fn effect_runs(&self) -> usize {
        self.inner.effect_runs.get()
    }

    /// Number of times the predicate has been evaluated.
    pub fn evaluations(&self) -> usize {
        self.inner.evaluations.get()
    }

    /// Number of observables read by the most recent predicate evaluation.
    pub fn dependency_count(&self) -> usize {
        self.inner.sources.borrow().len()
    }

    /// Dispose of the reaction.
    ///
    /// After disposal, the reaction will not run again.
    pub fn dispose(&self) -> Result<()> {
        Runtime::dispose(self.inner.id)
    }

    /// Check if the reaction has been disposed.
    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.get()
    }
}

impl fmt::Debug for Reaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reaction")
            .field("id", &self.inner.id)
            .field("evaluations", &self.evaluations())
            .field("effect_runs", &self.effect_runs())
            .field("dependency_count", &self.dependency_count())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
