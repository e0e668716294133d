//! In-process record store.
//!
//! The reference [`RecordStore`] implementation: a single mutex over a
//! `HashMap`, which trivially serializes conflicting writers and therefore
//! satisfies the per-key atomicity contract. Used by the test suites and for
//! local development; production deployments implement [`RecordStore`] over
//! their own database.
//!
//! The store has an explicit lifecycle: it is open on construction and
//! [`close`](MemoryRecordStore::close) tears it down, after which every
//! operation reports [`StoreError::Closed`]. A frozen clock is available so
//! lease-expiry behavior can be tested without sleeping.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::StoreError;
use crate::record::{RecordStatus, RunRecord};
use crate::store::{InsertOutcome, NewRecord, RecordStore};

/// In-memory [`RecordStore`] with an explicit open/close lifecycle and an
/// optionally frozen clock.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use run_once::store::memory::MemoryRecordStore;
/// use run_once::store::SharedRecordStore;
///
/// let store: SharedRecordStore = Arc::new(MemoryRecordStore::new());
/// ```
pub struct MemoryRecordStore {
    records: Mutex<State>,
    frozen_now: Mutex<Option<DateTime<Utc>>>,
}

struct State {
    rows: HashMap<String, RunRecord>,
    open: bool,
}

impl MemoryRecordStore {
    /// Creates an open store using the system clock.
    pub fn new() -> Self {
        Self {
            records: Mutex::new(State {
                rows: HashMap::new(),
                open: true,
            }),
            frozen_now: Mutex::new(None),
        }
    }

    /// Creates an open store whose clock is frozen at `now`.
    ///
    /// Time only moves when [`set_now`](Self::set_now) or
    /// [`advance`](Self::advance) is called, which makes lease-expiry
    /// arbitration deterministic in tests.
    pub fn with_frozen_clock(now: DateTime<Utc>) -> Self {
        Self {
            records: Mutex::new(State {
                rows: HashMap::new(),
                open: true,
            }),
            frozen_now: Mutex::new(Some(now)),
        }
    }

    /// Moves a frozen clock to `now`. No effect on a system-clock store.
    pub fn set_now(&self, now: DateTime<Utc>) {
        if let Ok(mut frozen) = self.frozen_now.lock() {
            if frozen.is_some() {
                *frozen = Some(now);
            }
        }
    }

    /// Advances a frozen clock by `delta`. No effect on a system-clock store.
    pub fn advance(&self, delta: chrono::Duration) {
        if let Ok(mut frozen) = self.frozen_now.lock() {
            if let Some(now) = frozen.as_mut() {
                *now += delta;
            }
        }
    }

    /// Closes the store. Every subsequent operation reports
    /// [`StoreError::Closed`].
    pub fn close(&self) {
        if let Ok(mut state) = self.records.lock() {
            state.open = false;
            state.rows.clear();
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, State>, StoreError> {
        let state = self
            .records
            .lock()
            .map_err(|_| StoreError::backend("record store lock poisoned"))?;
        if !state.open {
            return Err(StoreError::Closed);
        }
        Ok(state)
    }

    fn clock_now(&self) -> DateTime<Utc> {
        self.frozen_now
            .lock()
            .ok()
            .and_then(|frozen| *frozen)
            .unwrap_or_else(Utc::now)
    }
}

impl Default for MemoryRecordStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn insert(&self, record: NewRecord) -> Result<InsertOutcome, StoreError> {
        let now = self.clock_now();
        let mut state = self.lock()?;
        if state.rows.contains_key(&record.key) {
            return Ok(InsertOutcome::DuplicateKey);
        }
        state.rows.insert(
            record.key.clone(),
            RunRecord {
                key: record.key,
                started_at: now,
                finished_at: None,
                status: RecordStatus::Running,
                request: record.request,
                response: None,
            },
        );
        Ok(InsertOutcome::Inserted)
    }

    async fn load(&self, key: &str) -> Result<Option<RunRecord>, StoreError> {
        let state = self.lock()?;
        Ok(state.rows.get(key).cloned())
    }

    async fn finish(
        &self,
        key: &str,
        response: Option<String>,
        status: RecordStatus,
    ) -> Result<u64, StoreError> {
        let now = self.clock_now();
        let mut state = self.lock()?;
        match state.rows.get_mut(key) {
            Some(row) => {
                row.finished_at = Some(now);
                row.status = status;
                row.response = response;
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn claim(&self, key: &str, expected: RecordStatus) -> Result<u64, StoreError> {
        let now = self.clock_now();
        let mut state = self.lock()?;
        match state.rows.get_mut(key) {
            Some(row) if row.status == expected => {
                row.status = RecordStatus::Running;
                row.started_at = now;
                row.finished_at = None;
                Ok(1)
            }
            _ => Ok(0),
        }
    }

    fn now(&self) -> DateTime<Utc> {
        self.clock_now()
    }
}
