//! Newtype wrapper for the idempotency key.
//!
//! The key is the only identifier tying repeated invocations to one logical
//! operation, so it gets a validated newtype instead of travelling as a bare
//! `String`. Validation rejects empty and whitespace-only values, which are
//! usage errors: such keys would silently collide on the store's primary key.
//!
//! # Example
//!
//! ```rust
//! use run_once::IdempotencyKey;
//!
//! let key = IdempotencyKey::new("order-2041-capture").unwrap();
//! assert!(key.starts_with("order-"));
//! assert!(IdempotencyKey::new("").is_err());
//! assert!(IdempotencyKey::new("   ").is_err());
//! ```

use std::fmt;
use std::ops::Deref;

use serde::{Deserialize, Serialize};

/// Error returned when key validation fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidKeyError {
    /// Description of the validation failure.
    pub message: String,
}

impl fmt::Display for InvalidKeyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid idempotency key: {}", self.message)
    }
}

impl std::error::Error for InvalidKeyError {}

/// A caller-chosen identifier tying repeated requests to one logical operation.
///
/// Two invocations with equal keys are the same operation as far as the
/// coordinator is concerned; the payload is never consulted. Keys must be
/// non-empty and contain at least one non-whitespace character.
///
/// # Construction
///
/// ```rust
/// use run_once::IdempotencyKey;
///
/// let key = IdempotencyKey::new("payment-7f3a").unwrap();
/// assert_eq!(key.as_str(), "payment-7f3a");
///
/// // Empty and whitespace-only values are usage errors.
/// assert!(IdempotencyKey::new("").is_err());
/// assert!(IdempotencyKey::new(" \t ").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdempotencyKey(String);

impl IdempotencyKey {
    /// Creates a new `IdempotencyKey`, rejecting empty or whitespace-only values.
    pub fn new(key: impl Into<String>) -> Result<Self, InvalidKeyError> {
        let key = key.into();
        if key.trim().is_empty() {
            return Err(InvalidKeyError {
                message: "value must contain at least one non-whitespace character".to_string(),
            });
        }
        Ok(Self(key))
    }

    /// Returns the inner string value.
    #[inline]
    pub fn into_inner(self) -> String {
        self.0
    }

    /// Returns a reference to the inner string.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IdempotencyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Deref for IdempotencyKey {
    type Target = str;

    #[inline]
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<str> for IdempotencyKey {
    #[inline]
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<&str> for IdempotencyKey {
    type Error = InvalidKeyError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<String> for IdempotencyKey {
    type Error = InvalidKeyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}
