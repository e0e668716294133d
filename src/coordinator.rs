//! The coordinator facade.
//!
//! [`Coordinator`] is the single public entry point: it validates the key,
//! asks the arbiter for a decision, drives the execution pipeline, and maps
//! every pipeline failure back into a store transition before re-surfacing
//! it. Handler errors are never recovered here — they are classified,
//! recorded, and handed back to the caller.

use std::sync::Arc;

use crate::arbiter;
use crate::duration::Duration;
use crate::error::{is_retryable_marker, BoxError, RunOnceError, StoreError};
use crate::events::{SharedEvents, TracingEvents};
use crate::pipeline::{self, PipelineError, PipelineFailure};
use crate::record::RecordStatus;
use crate::request::Request;
use crate::store::SharedRecordStore;
use crate::types::IdempotencyKey;

/// Coordinates at-most-once completion of keyed operations over a shared
/// record store.
///
/// The store is a process-wide collaborator with its own lifecycle; the
/// coordinator borrows it and never opens or closes it. Events default to
/// [`TracingEvents`]; pass [`NullEvents`](crate::NullEvents) to disable
/// logging entirely.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use run_once::{Coordinator, MemoryRecordStore, Request};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), run_once::RunOnceError> {
/// let coordinator = Coordinator::new(Arc::new(MemoryRecordStore::new()));
///
/// let request = Request::new(
///     || async { Ok(20u32) },
///     |n: u32, _ctx| async move { Ok(n + 1) },
///     |resp: u32, _already_completed| async move { Ok(resp) },
/// );
///
/// let result = coordinator.run_once("invoice-77", request.clone()).await?;
/// assert_eq!(result, 21);
///
/// // The same key replays the stored response without re-running the handler.
/// let replayed = coordinator.run_once("invoice-77", request).await?;
/// assert_eq!(replayed, 21);
/// # Ok(())
/// # }
/// ```
///
/// # Postprocess and the idempotency guarantee
///
/// The record transitions to `COMPLETED` *before* `postprocess` runs. A
/// failure in `postprocess` therefore does not re-open the key: the failure
/// is surfaced, the record stays `COMPLETED`, and every subsequent attempt
/// replays the stored response and runs `postprocess` again. The *operation*
/// is at-most-once; the response transformation is not protected.
///
/// # Handler side effects
///
/// The handler runs outside any store transaction. Side effects it performs
/// against other systems are not rolled back on a retryable failure; wrap
/// downstream operations in their own `run_once` calls when they need the
/// same guarantee.
#[derive(Clone)]
pub struct Coordinator {
    store: SharedRecordStore,
    events: SharedEvents,
}

impl Coordinator {
    /// Creates a coordinator over the given store, logging through
    /// [`TracingEvents`].
    pub fn new(store: SharedRecordStore) -> Self {
        Self {
            store,
            events: Arc::new(TracingEvents),
        }
    }

    /// Replaces the event sink.
    pub fn with_events(mut self, events: SharedEvents) -> Self {
        self.events = events;
        self
    }

    /// The underlying record store.
    pub fn store(&self) -> &SharedRecordStore {
        &self.store
    }

    /// Runs `request` at most once to completion for `key`, using the
    /// default retryable test (a [`RetryableError`](crate::RetryableError)
    /// marker anywhere in the failure's source chain).
    ///
    /// Returns the output of `postprocess`, or one of the
    /// [`RunOnceError`] kinds. `key` must contain at least one
    /// non-whitespace character.
    pub async fn run_once<Req, Resp, Out>(
        &self,
        key: &str,
        request: Request<Req, Resp, Out>,
    ) -> Result<Out, RunOnceError>
    where
        Req: Send + 'static,
        Resp: Send + 'static,
        Out: Send + 'static,
    {
        self.run_once_with(key, request, |source| {
            is_retryable_marker(source.as_ref())
        })
        .await
    }

    /// Like [`run_once`](Self::run_once), with a caller-supplied predicate
    /// deciding which handler failures are retryable.
    ///
    /// Timeouts are always retryable regardless of the predicate.
    pub async fn run_once_with<Req, Resp, Out, F>(
        &self,
        key: &str,
        request: Request<Req, Resp, Out>,
        is_retryable: F,
    ) -> Result<Out, RunOnceError>
    where
        Req: Send + 'static,
        Resp: Send + 'static,
        Out: Send + 'static,
        F: Fn(&BoxError) -> bool + Send + Sync,
    {
        let key = IdempotencyKey::new(key)?;

        let outcome =
            arbiter::decide(self.store.as_ref(), self.events.as_ref(), &key, &request).await?;

        match pipeline::execute(
            self.store.as_ref(),
            self.events.as_ref(),
            &key,
            &request,
            outcome,
        )
        .await
        {
            Ok(out) => Ok(out),
            Err(PipelineError::Fatal(err)) => Err(err),
            Err(PipelineError::Failure(failure)) => Err(self
                .classify_and_record(&key, request.ttl, failure, &is_retryable)
                .await),
        }
    }

    /// Maps a pipeline failure to a store transition and the surfaced error.
    ///
    /// A store failure while recording supersedes the original error; the
    /// record is then left `RUNNING` for lease expiry to reclaim.
    async fn classify_and_record<F>(
        &self,
        key: &IdempotencyKey,
        ttl: Option<Duration>,
        failure: PipelineFailure,
        is_retryable: &F,
    ) -> RunOnceError
    where
        F: Fn(&BoxError) -> bool,
    {
        match failure {
            PipelineFailure::Timeout => {
                let err = RunOnceError::Timeout {
                    key: key.to_string(),
                    ttl: ttl.unwrap_or(Duration::ZERO),
                };
                self.events.timeout(key.as_str(), &err);
                self.events.mark_retryable(key.as_str());
                if let Err(store_err) = self.record_failure(key, RecordStatus::FailedRetryable).await
                {
                    return store_err.into();
                }
                err
            }
            PipelineFailure::Handler(source) => {
                if is_retryable(&source) {
                    self.events.mark_retryable(key.as_str());
                    if let Err(store_err) =
                        self.record_failure(key, RecordStatus::FailedRetryable).await
                    {
                        return store_err.into();
                    }
                    RunOnceError::Retryable {
                        key: key.to_string(),
                        source,
                    }
                } else {
                    self.events.error(key.as_str(), source.as_ref());
                    self.events.mark_non_retryable(key.as_str());
                    if let Err(store_err) = self
                        .record_failure(key, RecordStatus::FailedNonRetryable)
                        .await
                    {
                        return store_err.into();
                    }
                    RunOnceError::Handler {
                        key: key.to_string(),
                        source,
                    }
                }
            }
            PipelineFailure::Serialize(serdes_err) => {
                self.events.mark_non_retryable(key.as_str());
                if let Err(store_err) = self
                    .record_failure(key, RecordStatus::FailedNonRetryable)
                    .await
                {
                    return store_err.into();
                }
                RunOnceError::SerDes(serdes_err)
            }
            PipelineFailure::Postprocess(source) => {
                // The record already reads COMPLETED; no transition is made
                // and the next attempt will replay.
                self.events.error(key.as_str(), source.as_ref());
                if is_retryable(&source) {
                    RunOnceError::Retryable {
                        key: key.to_string(),
                        source,
                    }
                } else {
                    RunOnceError::Handler {
                        key: key.to_string(),
                        source,
                    }
                }
            }
        }
    }

    async fn record_failure(
        &self,
        key: &IdempotencyKey,
        status: RecordStatus,
    ) -> Result<(), StoreError> {
        self.store.finish(key.as_str(), None, status).await?;
        Ok(())
    }
}
