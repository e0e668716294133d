//! # run-once
//!
//! An idempotency coordinator: given a caller-supplied key, a user-defined
//! business operation executes **at most once to completion** across
//! arbitrarily many retried invocations, across multiple processes sharing a
//! backing store.
//!
//! This solves the at-least-once delivery problem. When a client or message
//! broker retries a request it could not confirm, the coordinator recognizes
//! the repeated key, serializes concurrent attempts, replays the recorded
//! outcome, or re-runs the operation only if the earlier attempt left the
//! system in a retryable-failure state.
//!
//! ## Overview
//!
//! Four cooperating pieces:
//!
//! - [`RecordStore`] — the only plug point: a durable per-key record with
//!   atomic insert-if-absent and compare-and-set status transitions.
//!   [`MemoryRecordStore`] is the in-process reference implementation.
//! - The **arbiter** — decides, per invocation, whether to execute fresh,
//!   re-run as a retry, replay a stored response, or reject.
//! - The **pipeline** — drives preprocess → handler → record → postprocess
//!   with an optional hard timeout.
//! - [`Coordinator`] — the public facade combining the two and mapping every
//!   failure back into a store transition.
//!
//! ## Getting started
//!
//! ```toml
//! [dependencies]
//! run-once = "0.1"
//! tokio = { version = "1.0", features = ["full"] }
//! serde = { version = "1.0", features = ["derive"] }
//! ```
//!
//! ```rust
//! use std::sync::Arc;
//! use run_once::{Coordinator, Duration, MemoryRecordStore, Request};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), run_once::RunOnceError> {
//! let store = Arc::new(MemoryRecordStore::new());
//! let coordinator = Coordinator::new(store);
//!
//! let request = Request::new(
//!     // Preprocess: produce the handler input.
//!     || async { Ok("order-2041".to_string()) },
//!     // Handler: the operation to run at most once. `ctx.retry` is true
//!     // when re-entered after a retryable failure or an expired lease.
//!     |order_id: String, _ctx| async move { Ok(format!("charged:{order_id}")) },
//!     // Postprocess: shape the caller-visible result.
//!     |receipt: String, _already_completed| async move { Ok(receipt) },
//! )
//! .with_ttl(Duration::from_seconds(30))
//! .with_automatic_timeout(true);
//!
//! let receipt = coordinator.run_once("capture-order-2041", request).await?;
//! assert_eq!(receipt, "charged:order-2041");
//! # Ok(())
//! # }
//! ```
//!
//! ## Per-key lifecycle
//!
//! ```text
//!                  insert OK
//!       ───────────────────────────▶ RUNNING
//!                                      │
//!   COMPLETED  ◀───────────────────────┤ handler ok
//!   (replay)                           │
//!                                      │ retryable failure / timeout
//!   FAILED_RETRYABLE ◀─────────────────┤
//!       │ claim = 1                    │ non-retryable failure
//!       ▼                              ▼
//!     RUNNING (retry)            FAILED_NON_RETRYABLE (latched)
//!
//!   RUNNING with an expired lease: claim = 1 → RUNNING (retry)
//! ```
//!
//! `COMPLETED` and `FAILED_NON_RETRYABLE` are terminal. The compare-and-set
//! claim guarantees at most one concurrent attempt re-enters the handler;
//! everyone else observes [`RunOnceError::AlreadyRunning`].
//!
//! ## Retryable failures
//!
//! A handler signals "retry me" by returning a [`RetryableError`] (anywhere
//! in the error's source chain), or the caller supplies an arbitrary
//! predicate via [`Coordinator::run_once_with`]. Everything else latches the
//! key: subsequent attempts surface [`RunOnceError::OperationFailed`]
//! without touching the handler.
//!
//! ## Persistent requests
//!
//! With [`Request::persistent`], the preprocess output is serialized into
//! the record on first insert and rehydrated on every retry, so the handler
//! receives the identical input on each attempt. Non-persistent requests
//! recompute `preprocess` instead, which is why that closure is assumed
//! idempotent.
//!
//! ## What this crate does not do
//!
//! Exactly-once delivery (it provides at-most-once *completion* given
//! at-least-once delivery), distributed consensus beyond what the store
//! offers, client-side retry scheduling, cross-key ordering, or
//! payload-based deduplication — the key is authoritative.

pub mod coordinator;
pub mod duration;
pub mod error;
pub mod events;
pub mod record;
pub mod request;
pub mod serdes;
pub mod store;
pub mod types;

mod arbiter;
mod pipeline;
mod sealed;

pub use coordinator::Coordinator;
pub use duration::Duration;
pub use error::{is_retryable_marker, BoxError, RetryableError, RunOnceError, StoreError};
pub use events::{NullEvents, RunOnceEvents, SharedEvents, TracingEvents};
pub use record::{RecordStatus, RunRecord};
pub use request::{HandlerContext, Request};
pub use serdes::{custom_serdes, JsonSerDes, SerDes, SerDesContext, SerDesError};
pub use store::memory::MemoryRecordStore;
pub use store::{InsertOutcome, NewRecord, RecordStore, SharedRecordStore};
pub use types::{IdempotencyKey, InvalidKeyError};
