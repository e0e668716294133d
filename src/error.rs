//! Error types for the idempotency coordinator.
//!
//! The error taxonomy mirrors the per-key state machine: arbitration
//! rejections ([`RunOnceError::AlreadyRunning`], [`RunOnceError::OperationFailed`])
//! carry no store transition, handler failures are classified as retryable or
//! non-retryable and recorded before being re-surfaced, and store faults are
//! fatal and supersede whatever else was in flight.
//!
//! Handler code signals a retryable condition either by returning a
//! [`RetryableError`] (anywhere in the error's `source()` chain) or by the
//! caller supplying a custom predicate to
//! [`Coordinator::run_once_with`](crate::Coordinator::run_once_with).

use thiserror::Error;

use crate::duration::Duration;
use crate::serdes::SerDesError;
use crate::types::InvalidKeyError;

/// Boxed error type used for user-supplied handler, preprocess, and
/// postprocess failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Marker error for failures that permit a subsequent attempt to re-enter
/// the handler.
///
/// The default retryable test walks the error's `source()` chain looking for
/// this type, so wrapping is fine:
///
/// ```rust
/// use run_once::{BoxError, RetryableError};
///
/// fn flaky() -> Result<(), BoxError> {
///     Err(RetryableError::new("upstream connection reset").into())
/// }
///
/// let err = flaky().unwrap_err();
/// assert!(run_once::is_retryable_marker(err.as_ref()));
/// ```
#[derive(Debug, Error)]
#[error("{message}")]
pub struct RetryableError {
    message: String,
    #[source]
    source: Option<BoxError>,
}

impl RetryableError {
    /// Creates a retryable marker from a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a retryable marker wrapping an underlying error.
    pub fn with_source(message: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Wraps an arbitrary error, reusing its display text as the message.
    pub fn from_error(source: impl Into<BoxError>) -> Self {
        let source = source.into();
        Self {
            message: source.to_string(),
            source: Some(source),
        }
    }
}

/// Returns true if `error` or any link in its `source()` chain is a
/// [`RetryableError`] marker.
///
/// This is the default `is_retryable` predicate used by
/// [`Coordinator::run_once`](crate::Coordinator::run_once).
pub fn is_retryable_marker(error: &(dyn std::error::Error + 'static)) -> bool {
    let mut current: Option<&(dyn std::error::Error + 'static)> = Some(error);
    while let Some(err) = current {
        if err.downcast_ref::<RetryableError>().is_some() {
            return true;
        }
        current = err.source();
    }
    false
}

/// Failures reported by a [`RecordStore`](crate::store::RecordStore)
/// implementation.
///
/// Store failures are fatal from the coordinator's point of view: they are
/// propagated as-is without any state transition, and a store failure while
/// recording a handler outcome supersedes the handler's own error.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backend rejected or failed the operation.
    #[error("record store backend error: {message}")]
    Backend {
        /// Description of the backend failure.
        message: String,
    },

    /// The store has been closed; no further operations are possible.
    #[error("record store is closed")]
    Closed,

    /// The store returned state that violates the record invariants.
    #[error("record store returned inconsistent state: {message}")]
    Inconsistent {
        /// Description of the violated invariant.
        message: String,
    },
}

impl StoreError {
    /// Creates a new backend error.
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
        }
    }

    /// Creates a new inconsistency error.
    pub fn inconsistent(message: impl Into<String>) -> Self {
        Self::Inconsistent {
            message: message.into(),
        }
    }
}

/// The error type surfaced by [`Coordinator::run_once`](crate::Coordinator::run_once).
#[derive(Debug, Error)]
pub enum RunOnceError {
    /// Another invocation holds a valid lease on this key. Retryable from
    /// the client's point of view: a later attempt may find the key
    /// completed (and replay) or reclaimable.
    #[error("operation \"{key}\" is already running")]
    AlreadyRunning {
        /// The contended key.
        key: String,
    },

    /// A prior attempt ended in a non-retryable failure; no retry will ever
    /// succeed for this key.
    #[error("operation \"{key}\" previously failed and will not be retried")]
    OperationFailed {
        /// The latched key.
        key: String,
    },

    /// The handler exceeded the configured lease duration with
    /// `automatic_timeout` enabled. Recorded as a retryable failure.
    #[error("operation \"{key}\" timed out after {ttl}")]
    Timeout {
        /// The key whose handler timed out.
        key: String,
        /// The lease duration that was exceeded.
        ttl: Duration,
    },

    /// The handler failed with an error the retryable predicate accepted.
    /// Recorded as a retryable failure; a subsequent attempt will re-enter
    /// the handler with the retry flag set.
    #[error("retryable failure for operation \"{key}\"")]
    Retryable {
        /// The key whose handler failed.
        key: String,
        /// The original handler error.
        #[source]
        source: BoxError,
    },

    /// The handler failed with a non-retryable error. Recorded as a hard
    /// failure; every subsequent attempt surfaces
    /// [`RunOnceError::OperationFailed`].
    #[error("operation \"{key}\" failed")]
    Handler {
        /// The key whose handler failed.
        key: String,
        /// The original handler error.
        #[source]
        source: BoxError,
    },

    /// The supplied idempotency key was empty or whitespace-only.
    #[error(transparent)]
    InvalidKey(#[from] InvalidKeyError),

    /// A codec failed to serialize or deserialize a request or response blob.
    #[error(transparent)]
    SerDes(#[from] SerDesError),

    /// The record store itself failed. Fatal; no state transition was made.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl RunOnceError {
    /// Returns true if this is an [`RunOnceError::AlreadyRunning`] rejection.
    pub fn is_already_running(&self) -> bool {
        matches!(self, Self::AlreadyRunning { .. })
    }

    /// Returns true if this is an [`RunOnceError::OperationFailed`] latch.
    pub fn is_operation_failed(&self) -> bool {
        matches!(self, Self::OperationFailed { .. })
    }

    /// Returns true if a subsequent attempt may re-enter the handler:
    /// timeouts, recorded-retryable handler failures, and lease contention.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Timeout { .. } | Self::Retryable { .. } | Self::AlreadyRunning { .. }
        )
    }

    /// Returns true if this is a hard handler timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Returns true if the store itself failed.
    pub fn is_store_failure(&self) -> bool {
        matches!(self, Self::Store(_))
    }
}
