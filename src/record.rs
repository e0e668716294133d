//! The durable per-key record and its lifecycle states.
//!
//! One row per idempotency key. The status carries a stable numeric id
//! (0–4) which is the persisted wire representation for relational stores:
//!
//! ```text
//! CREATE TABLE run_once_record (
//!   id              VARCHAR PRIMARY KEY,
//!   started_at      TIMESTAMP NOT NULL,
//!   finished_at     TIMESTAMP,
//!   status_id       INT NOT NULL,
//!   request         TEXT,
//!   response        TEXT
//! );
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// Lifecycle state of a per-key record.
///
/// `Initial` is ephemeral: it exists only before the first insert, and a
/// persisted row must carry one of the other four states. `Completed` and
/// `FailedNonRetryable` are terminal; `FailedRetryable` and an expired
/// `Running` lease are re-entrant via
/// [`RecordStore::claim`](crate::store::RecordStore::claim).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecordStatus {
    /// Pre-insertion state; never persisted.
    Initial,
    /// An invocation holds the lease and may be executing the handler.
    Running,
    /// The last attempt failed retryably; the next attempt may claim the key.
    FailedRetryable,
    /// The last attempt failed hard; the key is latched.
    FailedNonRetryable,
    /// The handler completed; the stored response is replayed to all
    /// subsequent attempts.
    Completed,
}

impl RecordStatus {
    /// Returns the stable numeric id used in persisted rows.
    pub fn status_id(&self) -> i32 {
        match self {
            Self::Initial => 0,
            Self::Running => 1,
            Self::FailedRetryable => 2,
            Self::FailedNonRetryable => 3,
            Self::Completed => 4,
        }
    }

    /// Maps a persisted numeric id back to a status.
    pub fn from_status_id(id: i32) -> Result<Self, StoreError> {
        match id {
            0 => Ok(Self::Initial),
            1 => Ok(Self::Running),
            2 => Ok(Self::FailedRetryable),
            3 => Ok(Self::FailedNonRetryable),
            4 => Ok(Self::Completed),
            other => Err(StoreError::inconsistent(format!(
                "unknown status id {other}"
            ))),
        }
    }

    /// Returns true for states no attempt can ever leave.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::FailedNonRetryable)
    }
}

impl std::fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Initial => "INITIAL",
            Self::Running => "RUNNING",
            Self::FailedRetryable => "FAILED_RETRYABLE",
            Self::FailedNonRetryable => "FAILED_NON_RETRYABLE",
            Self::Completed => "COMPLETED",
        };
        write!(f, "{name}")
    }
}

/// The durable row for one idempotency key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    /// The idempotency key; unique across the store.
    pub key: String,
    /// Instant of the most recent transition into [`RecordStatus::Running`];
    /// the lease start.
    pub started_at: DateTime<Utc>,
    /// Instant of the most recent terminal transition; `None` while running.
    pub finished_at: Option<DateTime<Utc>>,
    /// Current lifecycle state.
    pub status: RecordStatus,
    /// Serialized preprocessed input; present only for persistent requests.
    /// Immutable after the first successful insert.
    pub request: Option<String>,
    /// Serialized successful result; present iff `status` is `Completed`.
    pub response: Option<String>,
}

impl RunRecord {
    /// Checks the record invariants, reporting a violation as a store
    /// inconsistency.
    ///
    /// The arbiter runs this on every loaded row before branching on the
    /// status, so a corrupted store surfaces as a fatal error rather than a
    /// wrong decision.
    pub fn check_invariants(&self) -> Result<(), StoreError> {
        match self.status {
            RecordStatus::Initial => Err(StoreError::inconsistent(format!(
                "persisted row for key \"{}\" has pre-insertion status",
                self.key
            ))),
            RecordStatus::Running => {
                if self.response.is_some() {
                    return Err(StoreError::inconsistent(format!(
                        "running row for key \"{}\" carries a response",
                        self.key
                    )));
                }
                Ok(())
            }
            RecordStatus::FailedRetryable | RecordStatus::FailedNonRetryable => {
                if self.finished_at.is_none() {
                    return Err(StoreError::inconsistent(format!(
                        "failed row for key \"{}\" has no finished_at",
                        self.key
                    )));
                }
                if self.response.is_some() {
                    return Err(StoreError::inconsistent(format!(
                        "failed row for key \"{}\" carries a response",
                        self.key
                    )));
                }
                Ok(())
            }
            RecordStatus::Completed => {
                if self.finished_at.is_none() || self.response.is_none() {
                    return Err(StoreError::inconsistent(format!(
                        "completed row for key \"{}\" is missing response or finished_at",
                        self.key
                    )));
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn running_record(key: &str) -> RunRecord {
        RunRecord {
            key: key.to_string(),
            started_at: Utc::now(),
            finished_at: None,
            status: RecordStatus::Running,
            request: None,
            response: None,
        }
    }

    #[test]
    fn test_status_id_mapping() {
        assert_eq!(RecordStatus::Initial.status_id(), 0);
        assert_eq!(RecordStatus::Running.status_id(), 1);
        assert_eq!(RecordStatus::FailedRetryable.status_id(), 2);
        assert_eq!(RecordStatus::FailedNonRetryable.status_id(), 3);
        assert_eq!(RecordStatus::Completed.status_id(), 4);
    }

    #[test]
    fn test_from_status_id_unknown() {
        assert!(RecordStatus::from_status_id(5).is_err());
        assert!(RecordStatus::from_status_id(-1).is_err());
    }

    #[test]
    fn test_terminal_classification() {
        assert!(RecordStatus::Completed.is_terminal());
        assert!(RecordStatus::FailedNonRetryable.is_terminal());
        assert!(!RecordStatus::Running.is_terminal());
        assert!(!RecordStatus::FailedRetryable.is_terminal());
        assert!(!RecordStatus::Initial.is_terminal());
    }

    #[test]
    fn test_display() {
        assert_eq!(RecordStatus::FailedRetryable.to_string(), "FAILED_RETRYABLE");
        assert_eq!(RecordStatus::Completed.to_string(), "COMPLETED");
    }

    #[test]
    fn test_running_invariants() {
        let record = running_record("k");
        assert!(record.check_invariants().is_ok());

        let mut bad = running_record("k");
        bad.response = Some("r".to_string());
        assert!(bad.check_invariants().is_err());
    }

    #[test]
    fn test_initial_row_is_inconsistent() {
        let mut record = running_record("k");
        record.status = RecordStatus::Initial;
        assert!(record.check_invariants().is_err());
    }

    #[test]
    fn test_completed_requires_response_and_finished_at() {
        let mut record = running_record("k");
        record.status = RecordStatus::Completed;
        assert!(record.check_invariants().is_err());

        record.response = Some("42".to_string());
        record.finished_at = Some(Utc::now());
        assert!(record.check_invariants().is_ok());
    }

    #[test]
    fn test_failed_rejects_response() {
        let mut record = running_record("k");
        record.status = RecordStatus::FailedRetryable;
        record.finished_at = Some(Utc::now());
        assert!(record.check_invariants().is_ok());

        record.response = Some("r".to_string());
        assert!(record.check_invariants().is_err());
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        fn status_strategy() -> impl Strategy<Value = RecordStatus> {
            prop_oneof![
                Just(RecordStatus::Initial),
                Just(RecordStatus::Running),
                Just(RecordStatus::FailedRetryable),
                Just(RecordStatus::FailedNonRetryable),
                Just(RecordStatus::Completed),
            ]
        }

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(100))]

            #[test]
            fn prop_status_id_roundtrip(status in status_strategy()) {
                let restored = RecordStatus::from_status_id(status.status_id()).unwrap();
                prop_assert_eq!(status, restored);
            }

            #[test]
            fn prop_status_serde_roundtrip(status in status_strategy()) {
                let json = serde_json::to_string(&status).unwrap();
                let restored: RecordStatus = serde_json::from_str(&json).unwrap();
                prop_assert_eq!(status, restored);
            }

            #[test]
            fn prop_exactly_two_terminal_states(status in status_strategy()) {
                let terminal = status.is_terminal();
                match status {
                    RecordStatus::Completed | RecordStatus::FailedNonRetryable => {
                        prop_assert!(terminal)
                    }
                    _ => prop_assert!(!terminal),
                }
            }
        }
    }
}
