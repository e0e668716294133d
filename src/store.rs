//! The record store contract — the coordinator's only plug point.
//!
//! Implementations provide four per-key operations, each of which must be
//! atomic with respect to concurrent callers on the same key. That atomicity
//! is the entire concurrency story: the unique key constraint makes `insert`
//! elect a single winner, and the compare-and-set `claim` serializes retry
//! attempts. No store transaction ever spans user handler execution.
//!
//! The minimum isolation a relational backend needs is read-committed plus a
//! unique index on the key column; any level at which an insert-then-select
//! on the same key from another process cannot lose an update is sufficient.
//! The reference schema is documented on [`RunRecord`](crate::record::RunRecord).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::error::StoreError;
use crate::record::{RecordStatus, RunRecord};

pub mod memory;

/// The row content supplied to [`RecordStore::insert`].
///
/// The store fills in `started_at` from its own clock and sets the status to
/// [`RecordStatus::Running`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRecord {
    /// The idempotency key; the store's primary key.
    pub key: String,
    /// Serialized preprocessed input, present only for persistent requests.
    pub request: Option<String>,
}

impl NewRecord {
    /// Creates a new record payload for the given key.
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            request: None,
        }
    }

    /// Attaches a serialized request blob (persistent requests).
    pub fn with_request(mut self, request: impl Into<String>) -> Self {
        self.request = Some(request.into());
        self
    }
}

/// Result of an [`RecordStore::insert`] attempt.
///
/// The duplicate-key condition is a value rather than an error because it is
/// an expected outcome of the arbitration protocol, not a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// The row was created; the caller holds the lease.
    Inserted,
    /// A row with this key already exists; the caller must re-load and
    /// arbitrate against the existing record.
    DuplicateKey,
}

/// Durable per-key record storage with atomic insert-if-absent and
/// compare-and-set status transitions.
///
/// Implementations are process-wide collaborators with an explicit lifecycle
/// (connect or open on construction, [`close`](memory::MemoryRecordStore::close)
/// or an equivalent on teardown); the coordinator never owns that lifecycle.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Inserts a fresh row with status [`RecordStatus::Running`] and
    /// `started_at` taken from the store clock.
    ///
    /// Must report [`InsertOutcome::DuplicateKey`] when the key already
    /// exists; any other failure is a [`StoreError`].
    async fn insert(&self, record: NewRecord) -> Result<InsertOutcome, StoreError>;

    /// Reads the current row by primary key.
    async fn load(&self, key: &str) -> Result<Option<RunRecord>, StoreError>;

    /// Unconditionally sets `finished_at` to the store clock, the status to
    /// `status`, and the response blob (nullable). Returns rows affected.
    async fn finish(
        &self,
        key: &str,
        response: Option<String>,
        status: RecordStatus,
    ) -> Result<u64, StoreError>;

    /// Compare-and-set: if the row's current status equals `expected`, set
    /// status to [`RecordStatus::Running`] with a fresh `started_at` and
    /// report 1; otherwise report 0 and leave the row untouched.
    ///
    /// At most one concurrent caller observes 1; this is what serializes
    /// retry attempts and expired-lease reclamation.
    async fn claim(&self, key: &str, expected: RecordStatus) -> Result<u64, StoreError>;

    /// The store clock.
    ///
    /// `started_at`, `finished_at`, and lease-expiry comparisons all use this
    /// clock, so client clock skew never enters lease arithmetic. The default
    /// is the system clock; implementations backed by a database should
    /// prefer the database's clock where practical.
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A shared, reference-counted record store handle.
pub type SharedRecordStore = Arc<dyn RecordStore>;
