//! Outcome execution.
//!
//! Drives one arbitration [`Outcome`] to a user-visible result: replays run
//! `postprocess` directly; fresh and retry executions run the handler
//! (under a hard `tokio` deadline when configured), record the successful
//! response, then run `postprocess`.
//!
//! The handler executes outside any store transaction, and the `COMPLETED`
//! transition is its own store call. `postprocess` runs only after that
//! transition, so a postprocess failure cannot un-complete the record: the
//! operation is at-most-once, the response transformation is not protected.

use crate::arbiter::Outcome;
use crate::error::{BoxError, RunOnceError};
use crate::events::RunOnceEvents;
use crate::record::RecordStatus;
use crate::request::{HandlerContext, Request};
use crate::serdes::{SerDesContext, SerDesError};
use crate::store::RecordStore;
use crate::types::IdempotencyKey;

/// A classifiable failure produced by one of the user stages.
///
/// The facade decides the store transition and the surfaced error kind;
/// the pipeline only reports which stage failed and how.
#[derive(Debug)]
pub(crate) enum PipelineFailure {
    /// The handler exceeded the hard deadline.
    Timeout,
    /// The handler itself failed.
    Handler(BoxError),
    /// The response codec failed before the record could complete.
    Serialize(SerDesError),
    /// `postprocess` failed after the record reached `COMPLETED` (or during
    /// a replay). The record is not transitioned.
    Postprocess(BoxError),
}

/// Pipeline result: either a classifiable user-stage failure or a fatal
/// error that bypasses classification entirely.
#[derive(Debug)]
pub(crate) enum PipelineError {
    Failure(PipelineFailure),
    Fatal(RunOnceError),
}

pub(crate) async fn execute<Req, Resp, Out>(
    store: &dyn RecordStore,
    events: &dyn RunOnceEvents,
    key: &IdempotencyKey,
    request: &Request<Req, Resp, Out>,
    outcome: Outcome<Req, Resp>,
) -> Result<Out, PipelineError> {
    let (req, retry) = match outcome {
        Outcome::Replay(resp) => {
            return request
                .run_postprocess(resp, true)
                .await
                .map_err(|e| PipelineError::Failure(PipelineFailure::Postprocess(e)));
        }
        Outcome::Fresh(req) => (req, false),
        Outcome::Retry(req) => (req, true),
    };

    let ctx = HandlerContext::new(key.as_str(), retry);
    let handler = request.run_handler(req, ctx);

    let resp = match (request.automatic_timeout, request.ttl) {
        (true, Some(ttl)) => match tokio::time::timeout(ttl.to_std(), handler).await {
            Ok(result) => {
                result.map_err(|e| PipelineError::Failure(PipelineFailure::Handler(e)))?
            }
            Err(_elapsed) => return Err(PipelineError::Failure(PipelineFailure::Timeout)),
        },
        _ => handler
            .await
            .map_err(|e| PipelineError::Failure(PipelineFailure::Handler(e)))?,
    };

    let blob = request
        .response_serdes
        .serialize(&resp, &SerDesContext::new(key.as_str()))
        .map_err(|e| PipelineError::Failure(PipelineFailure::Serialize(e)))?;

    store
        .finish(key.as_str(), Some(blob), RecordStatus::Completed)
        .await
        .map_err(|e| PipelineError::Fatal(e.into()))?;
    events.finished(key.as_str());

    request
        .run_postprocess(resp, false)
        .await
        .map_err(|e| PipelineError::Failure(PipelineFailure::Postprocess(e)))
}
