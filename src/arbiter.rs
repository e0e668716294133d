//! Shared-state arbitration.
//!
//! Given a key and a request descriptor, [`decide`] transacts against the
//! record store and produces exactly one [`Outcome`]: run the handler fresh,
//! re-run it as a retry, replay the stored response, or reject the
//! invocation. The compare-and-set `claim` is what prevents two retry
//! executions from racing: at most one caller observes rows-affected 1 and
//! proceeds; everyone else sees 0 and reports the key as already running.
//!
//! Lease expiry is not garbage collection. It is a liveness provision: a
//! worker that crashed while `RUNNING` would otherwise wedge its key forever.

use crate::error::{RunOnceError, StoreError};
use crate::events::RunOnceEvents;
use crate::record::{RecordStatus, RunRecord};
use crate::request::Request;
use crate::serdes::SerDesContext;
use crate::store::{InsertOutcome, NewRecord, RecordStore};
use crate::types::IdempotencyKey;

/// The arbitration decision for one invocation.
///
/// Rejections (`AlreadyRunning`, `OperationFailed`) are reported as errors,
/// not variants: they carry no work for the pipeline.
#[derive(Debug, PartialEq)]
pub(crate) enum Outcome<Req, Resp> {
    /// The key is new; run the handler with `retry = false`.
    Fresh(Req),
    /// A prior attempt failed retryably or its lease expired; run the
    /// handler with `retry = true`.
    Retry(Req),
    /// The key completed earlier; skip the handler and deliver the stored
    /// response.
    Replay(Resp),
}

/// Decides what this invocation must do, transacting against the store.
pub(crate) async fn decide<Req, Resp, Out>(
    store: &dyn RecordStore,
    events: &dyn RunOnceEvents,
    key: &IdempotencyKey,
    request: &Request<Req, Resp, Out>,
) -> Result<Outcome<Req, Resp>, RunOnceError> {
    let record = match store.load(key.as_str()).await? {
        Some(record) => record,
        None => {
            // First writer wins the insert; losers re-load and arbitrate
            // against whatever the winner left behind.
            let req = request
                .run_preprocess()
                .await
                .map_err(|source| RunOnceError::Handler {
                    key: key.to_string(),
                    source,
                })?;

            let mut row = NewRecord::new(key.as_str());
            if request.persistent {
                row = row.with_request(serialize_request(request, key, &req)?);
            }

            match store.insert(row).await? {
                InsertOutcome::Inserted => {
                    events.started(key.as_str());
                    return Ok(Outcome::Fresh(req));
                }
                InsertOutcome::DuplicateKey => store.load(key.as_str()).await?.ok_or_else(|| {
                    StoreError::inconsistent(format!(
                        "insert for key \"{key}\" reported a duplicate but no row exists"
                    ))
                })?,
            }
        }
    };

    record.check_invariants()?;

    match record.status {
        RecordStatus::Completed => {
            let blob = record.response.as_deref().ok_or_else(|| {
                StoreError::inconsistent(format!("completed row for key \"{key}\" has no response"))
            })?;
            let resp = request
                .response_serdes
                .deserialize(blob, &SerDesContext::new(key.as_str()))?;
            events.replay(key.as_str());
            Ok(Outcome::Replay(resp))
        }
        RecordStatus::FailedNonRetryable => Err(RunOnceError::OperationFailed {
            key: key.to_string(),
        }),
        RecordStatus::FailedRetryable => {
            claim_for_retry(store, events, key, request, &record, RecordStatus::FailedRetryable)
                .await
        }
        RecordStatus::Running => {
            if lease_expired(store, request, &record) {
                claim_for_retry(store, events, key, request, &record, RecordStatus::Running).await
            } else {
                events.already_running(key.as_str());
                Err(RunOnceError::AlreadyRunning {
                    key: key.to_string(),
                })
            }
        }
        RecordStatus::Initial => Err(StoreError::inconsistent(format!(
            "persisted row for key \"{key}\" has pre-insertion status"
        ))
        .into()),
    }
}

/// Lease comparison on the store clock; a disabled ttl never expires.
fn lease_expired<Req, Resp, Out>(
    store: &dyn RecordStore,
    request: &Request<Req, Resp, Out>,
    record: &RunRecord,
) -> bool {
    match request.ttl {
        Some(ttl) => store.now() >= record.started_at + ttl.to_chrono(),
        None => false,
    }
}

/// Attempts the compare-and-set; the single winner becomes the retry
/// execution, everyone else is turned away.
async fn claim_for_retry<Req, Resp, Out>(
    store: &dyn RecordStore,
    events: &dyn RunOnceEvents,
    key: &IdempotencyKey,
    request: &Request<Req, Resp, Out>,
    record: &RunRecord,
    expected: RecordStatus,
) -> Result<Outcome<Req, Resp>, RunOnceError> {
    if store.claim(key.as_str(), expected).await? == 1 {
        let req = rehydrate(request, key, record).await?;
        events.retry(key.as_str());
        Ok(Outcome::Retry(req))
    } else {
        events.already_running(key.as_str());
        Err(RunOnceError::AlreadyRunning {
            key: key.to_string(),
        })
    }
}

/// Recovers the handler input for a retry: the stored blob for persistent
/// requests, a fresh preprocess run otherwise.
async fn rehydrate<Req, Resp, Out>(
    request: &Request<Req, Resp, Out>,
    key: &IdempotencyKey,
    record: &RunRecord,
) -> Result<Req, RunOnceError> {
    if request.persistent {
        let serdes = request.request_serdes.as_ref().ok_or_else(|| {
            StoreError::inconsistent(format!(
                "persistent request for key \"{key}\" has no request codec"
            ))
        })?;
        let blob = record.request.as_deref().ok_or_else(|| {
            StoreError::inconsistent(format!(
                "persistent record for key \"{key}\" has no request blob"
            ))
        })?;
        Ok(serdes.deserialize(blob, &SerDesContext::new(key.as_str()))?)
    } else {
        request
            .run_preprocess()
            .await
            .map_err(|source| RunOnceError::Handler {
                key: key.to_string(),
                source,
            })
    }
}

fn serialize_request<Req, Resp, Out>(
    request: &Request<Req, Resp, Out>,
    key: &IdempotencyKey,
    req: &Req,
) -> Result<String, RunOnceError> {
    let serdes = request.request_serdes.as_ref().ok_or_else(|| {
        StoreError::inconsistent(format!(
            "persistent request for key \"{key}\" has no request codec"
        ))
    })?;
    Ok(serdes.serialize(req, &SerDesContext::new(key.as_str()))?)
}
