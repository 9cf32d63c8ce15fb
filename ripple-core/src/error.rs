//! Error types for the reactive runtime.

use thiserror::Error;

use crate::reactive::ComputationId;

/// Errors surfaced by the reactive runtime.
///
/// Reading an observable outside of a tracked computation is *not* an
/// error; it only produces a diagnostic (see [`crate::config`]).
#[derive(Debug, Error)]
pub enum ReactiveError {
    /// The computation is not owned by the runtime on this thread, usually
    /// because it was already disposed.
    #[error("{0} is not registered (already disposed?)")]
    UnknownComputation(ComputationId),

    /// A getter, predicate or effect panicked during construction.
    #[error("{id} panicked during its initial run: {message}")]
    ComputationPanicked {
        /// The computation whose body panicked.
        id: ComputationId,
        /// The panic payload, when it was a string.
        message: String,
    },

    /// A configuration document could not be parsed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(#[from] serde_json::Error),
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ReactiveError>;

/// Turn a caught panic payload into a printable message.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn panic_message_extracts_strings() {
        let payload = std::panic::catch_unwind(|| panic!("boom")).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "boom");

        let payload = std::panic::catch_unwind(|| panic!("code {}", 7)).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "code 7");
    }

    #[test]
    fn errors_render_computation_id() {
        let id = ComputationId::new();
        let err = ReactiveError::UnknownComputation(id);
        assert!(err.to_string().contains(&id.to_string()));
    }
}
