//! Reactive Runtime
//!
//! The runtime owns every live computation on the current thread and holds
//! the active [`Config`].
//!
//! # Ownership
//!
//! Observables only keep weak references to their subscribers, so something
//! else has to keep computed values and reactions alive. That is the
//! registry here: each computation is registered when it is created and
//! stays registered until [`Runtime::dispose`] is called. Handles returned to
//! callers share the same allocation but dropping them does not stop the
//! computation, which means `reaction(..)` can be fire-and-forget.

use std::cell::RefCell;
use std::rc::Rc;

use indexmap::IndexMap;

use super::subscriber::{ComputationId, TrackedComputation};
use crate::config::Config;
use crate::error::{ReactiveError, Result};

thread_local! {
    static REGISTRY: RefCell<IndexMap<ComputationId, Rc<dyn TrackedComputation>>> =
        RefCell::new(IndexMap::new());
    static CONFIG: RefCell<Config> = RefCell::new(Config::default());
}

/// The per-thread reactive runtime.
pub struct Runtime;

impl Runtime {
    /// Take ownership of a computation until it is disposed.
    pub fn register(computation: Rc<dyn TrackedComputation>) {
        let id = computation.id();
        tracing::debug!(computation = %id, kind = ?computation.kind(), "registered");

        REGISTRY.with(|registry| {
            registry.borrow_mut().insert(id, computation);
        });
    }

    /// Dispose a computation: release ownership and remove it from every
    /// observable it subscribed to.
    ///
    /// Fails with [`ReactiveError::UnknownComputation`] if the ID is not
    /// registered on this thread, e.g. because it was already disposed.
    pub fn dispose(id: ComputationId) -> Result<()> {
        // Release the registry borrow before running dispose, which touches
        // observables.
        let computation = REGISTRY
            .with(|registry| registry.borrow_mut().shift_remove(&id))
            .ok_or(ReactiveError::UnknownComputation(id))?;

        computation.dispose();
        tracing::debug!(computation = %id, kind = ?computation.kind(), "disposed");
        Ok(())
    }

    /// Whether the runtime currently owns `id`.
    pub fn is_registered(id: ComputationId) -> bool {
        REGISTRY.with(|registry| registry.borrow().contains_key(&id))
    }

    /// Number of computations owned by the runtime on this thread.
    pub fn live_computations() -> usize {
        REGISTRY.with(|registry| registry.borrow().len())
    }

    /// Replace the active configuration for this thread.
    pub fn configure(config: Config) {
        CONFIG.with(|current| *current.borrow_mut() = config);
    }

    /// A copy of the active configuration.
    pub fn config() -> Config {
        CONFIG.with(|current| current.borrow().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::UntrackedReadPolicy;
    use crate::reactive::subscriber::ComputationKind;
    use std::cell::Cell;

    struct MockComputation {
        id: ComputationId,
        notified: Cell<usize>,
        disposed: Cell<bool>,
    }

    impl MockComputation {
        fn new() -> Rc<Self> {
            Rc::new(Self {
                id: ComputationId::new(),
                notified: Cell::new(0),
                disposed: Cell::new(false),
            })
        }
    }

    impl TrackedComputation for MockComputation {
        fn id(&self) -> ComputationId {
            self.id
        }

        fn kind(&self) -> ComputationKind {
            ComputationKind::Computed
        }

        fn notify(&self) {
            self.notified.set(self.notified.get() + 1);
        }

        fn dispose(&self) {
            self.disposed.set(true);
        }

        fn is_disposed(&self) -> bool {
            self.disposed.get()
        }
    }

    #[test]
    fn runtime_registers_and_disposes() {
        let computation = MockComputation::new();
        let id = computation.id;

        Runtime::register(computation.clone());
        assert!(Runtime::is_registered(id));

        Runtime::dispose(id).unwrap();
        assert!(!Runtime::is_registered(id));
        assert!(computation.is_disposed());
    }

    #[test]
    fn dispose_twice_is_an_error() {
        let computation = MockComputation::new();
        let id = computation.id;
        Runtime::register(computation);

        Runtime::dispose(id).unwrap();
        let err = Runtime::dispose(id).unwrap_err();
        assert!(matches!(err, ReactiveError::UnknownComputation(found) if found == id));
    }

    #[test]
    fn registry_keeps_computation_alive() {
        let computation = MockComputation::new();
        let id = computation.id;
        let weak = Rc::downgrade(&computation);

        Runtime::register(computation);
        assert!(weak.upgrade().is_some());

        Runtime::dispose(id).unwrap();
        assert!(weak.upgrade().is_none());
    }

    #[test]
    fn configure_replaces_config() {
        let before = Runtime::config();
        Runtime::configure(Config::default().with_untracked_reads(UntrackedReadPolicy::Silent));
        assert_eq!(Runtime::config().untracked_reads, UntrackedReadPolicy::Silent);
        Runtime::configure(before);
    }
}
