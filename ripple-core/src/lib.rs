//! Ripple Core
//!
//! A small fine-grained reactive dependency-tracking engine. It provides:
//!
//! - Observables: mutable cells that remember who read them
//! - Computed values: cached derivations recomputed only on real changes
//! - Reactions: predicates that fire a side effect when they become true
//!
//! Computations discover their dependencies by running. Any observable read
//! while a computed getter or reaction predicate executes becomes a
//! dependency, and a later `set` with a different value re-runs exactly the
//! computations that read it.
//!
//! # Architecture
//!
//! - `reactive`: the primitives, the tracking stack and the per-thread runtime
//! - `config`: diagnostic settings for the runtime
//! - `error`: the crate error type
//!
//! # Example
//!
//! ```rust
//! use ripple_core::{computed, observable, reaction};
//! use std::cell::Cell;
//! use std::rc::Rc;
//!
//! let a = observable(true);
//! let b = observable(true);
//!
//! let (ra, rb) = (a.clone(), b.clone());
//! let both = computed(move || ra.get() && rb.get());
//!
//! let fired = Rc::new(Cell::new(0));
//! let (ra, counter) = (a.clone(), fired.clone());
//! reaction(move || !ra.get(), move || counter.set(counter.get() + 1));
//!
//! a.set(false);
//! assert!(!both.get());
//! assert_eq!(fired.get(), 1);
//! ```

pub mod config;
pub mod error;
pub mod reactive;

pub use config::{Config, UntrackedReadPolicy};
pub use error::{ReactiveError, Result};
pub use reactive::{untracked, Computed, Observable, Reaction, Runtime};

/// Create an observable holding `initial`.
pub fn observable<T>(initial: T) -> Observable<T>
where
    T: Clone + PartialEq + 'static,
{
    Observable::new(initial)
}

/// Create a computed value from `getter`. The getter runs once immediately.
pub fn computed<T, F>(getter: F) -> Computed<T>
where
    T: Clone + 'static,
    F: Fn() -> T + 'static,
{
    Computed::new(getter)
}

/// Create a reaction that runs `effect` whenever `predicate` evaluates to
/// `true`, starting with an immediate evaluation.
///
/// The reaction lives until disposed through the returned handle or
/// [`Runtime::dispose`].
pub fn reaction<P, E>(predicate: P, effect: E) -> Reaction
where
    P: Fn() -> bool + 'static,
    E: Fn() + 'static,
{
    Reaction::new(predicate, effect)
}
