//! Identity and capability types shared by every reactive primitive.
//!
//! A tracked computation (a computed value or a reaction) is addressed by a
//! [`ComputationId`] and exposes a single [`TrackedComputation::notify`]
//! entry point. Observables only ever see that capability through a weak
//! reference, so they never keep a computation alive on their own.

use std::fmt;
use std::rc::Weak;
use std::sync::atomic::{AtomicU64, Ordering};

use smallvec::SmallVec;

/// Unique identifier for a tracked computation.
///
/// Each computed value and each reaction gets a unique ID when created.
/// IDs are never reused, even after disposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComputationId(u64);

impl ComputationId {
    /// Generate a new unique computation ID.
    ///
    /// Uses an atomic counter so IDs stay unique across threads.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for ComputationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ComputationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "computation#{}", self.0)
    }
}

/// Unique identifier for an observable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObservableId(u64);

impl ObservableId {
    /// Generate a new unique observable ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for ObservableId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ObservableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "observable#{}", self.0)
    }
}

/// Which flavour of tracked computation an ID belongs to. Used for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComputationKind {
    /// A cached derived value.
    Computed,
    /// A predicate plus side effect.
    Reaction,
}

/// A computation that reads observables and wants to hear about changes.
///
/// Implemented by the inner state of [`Computed`](super::Computed) and
/// [`Reaction`](super::Reaction). Observables hold these as
/// `Weak<dyn TrackedComputation>` and call [`notify`](Self::notify) once per
/// actual value change.
pub trait TrackedComputation {
    /// The computation's unique ID.
    fn id(&self) -> ComputationId;

    /// Whether this is a computed value or a reaction.
    fn kind(&self) -> ComputationKind;

    /// One of the sources read during the last execution changed.
    ///
    /// Re-runs the computation synchronously under fresh tracking.
    fn notify(&self);

    /// Stop reacting: drop every source subscription and ignore future
    /// notifications.
    fn dispose(&self);

    /// Whether [`dispose`](Self::dispose) has been called.
    fn is_disposed(&self) -> bool;
}

/// The reverse edge: something a computation read and can unsubscribe from.
pub trait Source {
    /// Remove `subscriber` from this source's subscriber set.
    fn unsubscribe(&self, subscriber: ComputationId);
}

/// Weak handle to a subscribing computation.
pub type Subscriber = Weak<dyn TrackedComputation>;

/// The sources recorded during one tracked execution, deduplicated by ID.
pub type Sources = SmallVec<[(ObservableId, Weak<dyn Source>); 4]>;

/// Unsubscribe `subscriber` from every still-alive source in `sources`.
pub(crate) fn release_sources(sources: Sources, subscriber: ComputationId) {
    for (_, source) in sources {
        if let Some(source) = source.upgrade() {
            source.unsubscribe(subscriber);
        }
    }
}

/// Unsubscribe `subscriber` from the sources in `previous` that `current`
/// no longer contains.
///
/// Sources read again keep their existing subscription, and with it their
/// position in the observable's notification order.
pub(crate) fn release_stale_sources(previous: Sources, current: &Sources, subscriber: ComputationId) {
    let stale: Sources = previous
        .into_iter()
        .filter(|(id, _)| !current.iter().any(|(kept, _)| kept == id))
        .collect();
    release_sources(stale, subscriber);
}

/// The observable IDs in `sources`, in read order.
pub(crate) fn source_ids(sources: &Sources) -> SmallVec<[ObservableId; 4]> {
    sources.iter().map(|(id, _)| *id).collect()
}
