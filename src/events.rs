//! Lifecycle event side-channel.
//!
//! Every interesting transition in an invocation's life is reported to a
//! [`RunOnceEvents`] sink. The sink is a write-only side channel: every
//! method has a no-op default, implementations must be side-effect-safe, and
//! nothing they do can influence the state machine. [`TracingEvents`] is the
//! stock sink over the `tracing` crate; [`NullEvents`] disables logging.

use std::sync::Arc;

use crate::error::RunOnceError;

/// Observer for per-key lifecycle events.
///
/// All methods default to no-ops, so implementations only override what they
/// care about. Implementations must not panic: the coordinator calls them
/// inline and does not guard against unwinding.
pub trait RunOnceEvents: Send + Sync {
    /// A fresh invocation inserted its record and is about to run.
    fn started(&self, _key: &str) {}

    /// A retry attempt claimed the key and is about to re-run the handler.
    fn retry(&self, _key: &str) {}

    /// A stored response is being replayed without running the handler.
    fn replay(&self, _key: &str) {}

    /// The handler completed and the record transitioned to `COMPLETED`.
    fn finished(&self, _key: &str) {}

    /// The handler exceeded the lease duration under `automatic_timeout`.
    fn timeout(&self, _key: &str, _error: &RunOnceError) {}

    /// The handler or a post-completion stage failed.
    fn error(&self, _key: &str, _error: &(dyn std::error::Error + 'static)) {}

    /// Arbitration rejected the invocation because another one holds the lease.
    fn already_running(&self, _key: &str) {}

    /// A failure is being recorded as `FAILED_RETRYABLE`.
    fn mark_retryable(&self, _key: &str) {}

    /// A failure is being recorded as `FAILED_NON_RETRYABLE`.
    fn mark_non_retryable(&self, _key: &str) {}
}

/// A shared, reference-counted event sink.
pub type SharedEvents = Arc<dyn RunOnceEvents>;

/// Event sink that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullEvents;

impl RunOnceEvents for NullEvents {}

/// Event sink that forwards to the `tracing` crate.
///
/// Routine transitions log at debug, contention at info, and failures at
/// warn, keyed by the idempotency key.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingEvents;

impl RunOnceEvents for TracingEvents {
    fn started(&self, key: &str) {
        tracing::debug!(key, "run_once started");
    }

    fn retry(&self, key: &str) {
        tracing::info!(key, "run_once retrying after earlier failure");
    }

    fn replay(&self, key: &str) {
        tracing::debug!(key, "run_once replaying stored response");
    }

    fn finished(&self, key: &str) {
        tracing::debug!(key, "run_once completed");
    }

    fn timeout(&self, key: &str, error: &RunOnceError) {
        tracing::warn!(key, %error, "run_once handler timed out");
    }

    fn error(&self, key: &str, error: &(dyn std::error::Error + 'static)) {
        tracing::warn!(key, %error, "run_once handler failed");
    }

    fn already_running(&self, key: &str) {
        tracing::info!(key, "run_once rejected: already running");
    }

    fn mark_retryable(&self, key: &str) {
        tracing::debug!(key, "run_once recording retryable failure");
    }

    fn mark_non_retryable(&self, key: &str) {
        tracing::warn!(key, "run_once recording non-retryable failure");
    }
}
