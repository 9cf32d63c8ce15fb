//! Reactive Primitives
//!
//! This module implements the core reactive system: observables, computed
//! values, and reactions.
//!
//! # Concepts
//!
//! ## Observables
//!
//! An Observable is a container for mutable state. When its value is read
//! while a computed value or reaction is running, the observable records
//! that computation as a subscriber. When `set` stores a different value,
//! every subscriber re-runs synchronously.
//!
//! ## Computed values
//!
//! A Computed is a derived value that caches its result. It runs its getter
//! once on creation and again each time a dependency changes; reading it
//! never runs the getter.
//!
//! ## Reactions
//!
//! A Reaction evaluates a boolean predicate whenever its dependencies change
//! and fires a side effect when the predicate holds.
//!
//! # Implementation Notes
//!
//! Dependencies are captured at runtime through a thread-local stack of
//! tracking frames (see [`Tracker`]). Observables keep weak references to
//! their subscribers; the per-thread [`Runtime`] owns the computations until
//! they are disposed. Everything here is single-threaded: handles are
//! `!Send` and a notification finishes before `set` returns.

mod context;
mod subscriber;
mod observable;
mod computed;
mod reaction;
mod runtime;

pub use context::{untracked, Retained, Tracker, TrackingScope};
pub use subscriber::{
    ComputationId, ComputationKind, ObservableId, Source, Sources, Subscriber, TrackedComputation,
};
pub use observable::Observable;
pub use computed::Computed;
pub use reaction::Reaction;
pub use runtime::Runtime;
