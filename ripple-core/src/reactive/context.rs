//! Tracking Context
//!
//! The tracker records which computation is currently running, so that an
//! observable read can be attributed to the right subscriber.
//!
//! # Implementation
//!
//! We use a thread-local stack of frames. Entering a tracked execution
//! pushes a frame; the returned [`TrackingScope`] pops it when finished or
//! dropped. Because it is a stack and not a single slot, a computation that
//! runs another tracked computation inline gets its own attribution back
//! once the inner one completes.
//!
//! A frame can also be *untracked* (see [`untracked`]): reads inside it are
//! neither attributed nor reported as stray reads.

use std::cell::RefCell;
use std::rc::Weak;

use smallvec::SmallVec;

use super::subscriber::{
    release_sources, ComputationId, ObservableId, Source, Sources, Subscriber,
};

/// Observable IDs a computation was already subscribed to before a re-run.
pub type Retained = SmallVec<[ObservableId; 4]>;

thread_local! {
    static CONTEXT_STACK: RefCell<Vec<Frame>> = const { RefCell::new(Vec::new()) };
}

/// An entry in the tracking stack.
struct Frame {
    /// The computation being executed, or `None` for an untracked scope.
    subscriber: Option<(ComputationId, Subscriber)>,
    /// Observables read during this execution.
    sources: Sources,
    /// Subscriptions that predate this execution and must survive an unwind.
    retained: Retained,
}

/// Entry points for the per-thread tracking stack.
pub struct Tracker;

impl Tracker {
    /// Begin a tracked execution of `id`.
    ///
    /// Until the returned scope is finished or dropped, observable reads
    /// subscribe `subscriber` and are recorded as its sources.
    pub fn enter(id: ComputationId, subscriber: Subscriber) -> TrackingScope {
        Self::enter_retaining(id, subscriber, Retained::new())
    }

    /// Begin a re-run of `id`, which is already subscribed to `retained`.
    ///
    /// If the scope unwinds, only subscriptions outside `retained` are
    /// rolled back, so the computation keeps the dependencies of its last
    /// successful run.
    pub fn enter_retaining(id: ComputationId, subscriber: Subscriber, retained: Retained) -> TrackingScope {
        CONTEXT_STACK.with(|stack| {
            stack.borrow_mut().push(Frame {
                subscriber: Some((id, subscriber)),
                sources: Sources::new(),
                retained,
            });
        });

        TrackingScope {
            computation: Some(id),
            finished: false,
        }
    }

    /// Run `f` as a tracked execution of `id` and return its result along
    /// with the sources it read.
    ///
    /// If `f` panics, the frame is popped and its partial dependencies are
    /// released before the panic continues.
    pub fn run<R>(id: ComputationId, subscriber: Subscriber, f: impl FnOnce() -> R) -> (R, Sources) {
        Self::run_retaining(id, subscriber, Retained::new(), f)
    }

    /// [`run`](Self::run) for a re-execution; see [`enter_retaining`](Self::enter_retaining).
    pub fn run_retaining<R>(
        id: ComputationId,
        subscriber: Subscriber,
        retained: Retained,
        f: impl FnOnce() -> R,
    ) -> (R, Sources) {
        let scope = Self::enter_retaining(id, subscriber, retained);
        let result = f();
        (result, scope.finish())
    }

    fn enter_untracked() -> TrackingScope {
        CONTEXT_STACK.with(|stack| {
            stack.borrow_mut().push(Frame {
                subscriber: None,
                sources: Sources::new(),
                retained: Retained::new(),
            });
        });

        TrackingScope {
            computation: None,
            finished: false,
        }
    }

    /// Whether any frame, tracked or untracked, is on the stack.
    pub fn is_active() -> bool {
        CONTEXT_STACK.with(|stack| !stack.borrow().is_empty())
    }

    /// The computation that reads are currently attributed to, if any.
    pub fn current() -> Option<ComputationId> {
        CONTEXT_STACK.with(|stack| {
            stack
                .borrow()
                .last()
                .and_then(|frame| frame.subscriber.as_ref().map(|(id, _)| *id))
        })
    }

    /// Number of frames on the stack.
    pub fn depth() -> usize {
        CONTEXT_STACK.with(|stack| stack.borrow().len())
    }

    pub(crate) fn current_subscriber() -> Option<(ComputationId, Subscriber)> {
        CONTEXT_STACK.with(|stack| {
            stack
                .borrow()
                .last()
                .and_then(|frame| frame.subscriber.clone())
        })
    }

    /// Record that the innermost tracked computation read `source`.
    ///
    /// Ignored inside untracked frames and when nothing is tracking.
    pub(crate) fn record_source(id: ObservableId, source: Weak<dyn Source>) {
        CONTEXT_STACK.with(|stack| {
            if let Some(frame) = stack.borrow_mut().last_mut() {
                if frame.subscriber.is_none() {
                    return;
                }
                if !frame.sources.iter().any(|(seen, _)| *seen == id) {
                    frame.sources.push((id, source));
                }
            }
        });
    }

    fn pop(expected: Option<ComputationId>) -> Option<Frame> {
        CONTEXT_STACK.with(|stack| {
            let popped = stack.borrow_mut().pop();

            if let Some(frame) = &popped {
                let actual = frame.subscriber.as_ref().map(|(id, _)| *id);
                debug_assert_eq!(
                    actual, expected,
                    "TrackingScope mismatch: expected {:?}, got {:?}",
                    expected, actual
                );
            }

            popped
        })
    }
}

/// Guard for one frame of the tracking stack.
///
/// Call [`finish`](Self::finish) after the body returns normally to collect
/// the sources it read. If the guard is dropped instead (the body panicked),
/// the frame is still popped and any subscriptions the failed run added are
/// rolled back. Retained subscriptions are left alone.
#[must_use = "dropping the scope ends tracking immediately"]
pub struct TrackingScope {
    computation: Option<ComputationId>,
    finished: bool,
}

impl TrackingScope {
    /// End tracking and return the sources read during the execution.
    pub fn finish(mut self) -> Sources {
        self.finished = true;
        Tracker::pop(self.computation)
            .map(|frame| frame.sources)
            .unwrap_or_default()
    }
}

impl Drop for TrackingScope {
    fn drop(&mut self) {
        if self.finished {
            return;
        }

        if let Some(frame) = Tracker::pop(self.computation) {
            if let Some((id, _)) = frame.subscriber {
                tracing::debug!(computation = %id, "tracked execution unwound, releasing partial dependencies");
                let retained = frame.retained;
                let added: Sources = frame
                    .sources
                    .into_iter()
                    .filter(|(source, _)| !retained.contains(source))
                    .collect();
                release_sources(added, id);
            }
        }
    }
}

/// Run `f` without attributing any observable reads to the current
/// computation.
///
/// Reads inside `f` are also exempt from the stray-read diagnostic.
pub fn untracked<R>(f: impl FnOnce() -> R) -> R {
    let _scope = Tracker::enter_untracked();
    f()
}
