//! Duration type for lease and timeout configuration.
//!
//! Leases are routinely sub-second in tests and short-lived deployments, so
//! this type carries milliseconds. A zero duration disables both lease
//! reclamation and the automatic handler timeout.

use serde::{Deserialize, Serialize};

/// A time interval in milliseconds, used for the per-key lease and the
/// optional hard handler timeout.
///
/// # Example
///
/// ```
/// use run_once::Duration;
///
/// let lease = Duration::from_seconds(30);
/// assert_eq!(lease.as_millis(), 30_000);
///
/// let short = Duration::from_millis(250);
/// assert!(!short.is_zero());
///
/// // Zero disables lease reclamation and the automatic timeout.
/// assert!(Duration::ZERO.is_zero());
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct Duration {
    millis: u64,
}

impl Duration {
    /// The zero duration. Disables lease reclamation and the automatic timeout.
    pub const ZERO: Duration = Duration { millis: 0 };

    /// Creates a new `Duration` from the given number of milliseconds.
    pub fn from_millis(millis: u64) -> Self {
        Self { millis }
    }

    /// Creates a new `Duration` from the given number of seconds.
    pub fn from_seconds(seconds: u64) -> Self {
        Self {
            millis: seconds.saturating_mul(1_000),
        }
    }

    /// Creates a new `Duration` from the given number of minutes.
    pub fn from_minutes(minutes: u64) -> Self {
        Self {
            millis: minutes.saturating_mul(60_000),
        }
    }

    /// Creates a new `Duration` from the given number of hours.
    pub fn from_hours(hours: u64) -> Self {
        Self {
            millis: hours.saturating_mul(3_600_000),
        }
    }

    /// Returns the interval in milliseconds.
    pub fn as_millis(&self) -> u64 {
        self.millis
    }

    /// Returns true for the zero duration.
    pub fn is_zero(&self) -> bool {
        self.millis == 0
    }

    /// Converts to a [`std::time::Duration`] for use with `tokio::time`.
    pub fn to_std(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.millis)
    }

    /// Converts to a [`chrono::Duration`] for lease-expiry arithmetic.
    ///
    /// Saturates at `chrono`'s maximum rather than overflowing for
    /// absurdly large values.
    pub fn to_chrono(&self) -> chrono::Duration {
        chrono::Duration::try_milliseconds(self.millis.min(i64::MAX as u64) as i64)
            .unwrap_or(chrono::Duration::MAX)
    }
}

impl std::fmt::Display for Duration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}ms", self.millis)
    }
}

impl From<std::time::Duration> for Duration {
    fn from(d: std::time::Duration) -> Self {
        Self {
            millis: d.as_millis().min(u64::MAX as u128) as u64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constructors() {
        assert_eq!(Duration::from_millis(5).as_millis(), 5);
        assert_eq!(Duration::from_seconds(2).as_millis(), 2_000);
        assert_eq!(Duration::from_minutes(3).as_millis(), 180_000);
        assert_eq!(Duration::from_hours(1).as_millis(), 3_600_000);
    }

    #[test]
    fn test_zero() {
        assert!(Duration::ZERO.is_zero());
        assert!(Duration::default().is_zero());
        assert!(!Duration::from_millis(1).is_zero());
    }

    #[test]
    fn test_to_std() {
        let d = Duration::from_millis(1_500);
        assert_eq!(d.to_std(), std::time::Duration::from_millis(1_500));
    }

    #[test]
    fn test_to_chrono() {
        let d = Duration::from_seconds(30);
        assert_eq!(d.to_chrono(), chrono::Duration::seconds(30));
    }

    #[test]
    fn test_from_std() {
        let d: Duration = std::time::Duration::from_secs(2).into();
        assert_eq!(d.as_millis(), 2_000);
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", Duration::from_millis(250)), "250ms");
    }

    #[test]
    fn test_ordering() {
        assert!(Duration::from_millis(1) < Duration::from_seconds(1));
        assert_eq!(Duration::from_seconds(1), Duration::from_millis(1_000));
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(100))]

            #[test]
            fn prop_millis_roundtrip(millis in 0u64..=u64::MAX / 2) {
                let d = Duration::from_millis(millis);
                prop_assert_eq!(d.as_millis(), millis);
                prop_assert_eq!(Duration::from_millis(d.as_millis()), d);
            }

            #[test]
            fn prop_serde_roundtrip(millis in 0u64..=u64::MAX / 2) {
                let d = Duration::from_millis(millis);
                let json = serde_json::to_string(&d).unwrap();
                let restored: Duration = serde_json::from_str(&json).unwrap();
                prop_assert_eq!(d, restored);
            }

            #[test]
            fn prop_std_conversion_consistent(millis in 0u64..=86_400_000u64) {
                let d = Duration::from_millis(millis);
                prop_assert_eq!(d.to_std().as_millis() as u64, millis);
            }
        }
    }
}
