//! Serialization of request and response blobs.
//!
//! The coordinator never interprets the bytes it stores: the caller supplies
//! codecs that convert the preprocessed request and the successful response
//! to and from the string blobs held in the record store. [`JsonSerDes`] is
//! the default (serde_json); [`custom_serdes`] builds a codec from a pair of
//! closures for anything else.
//!
//! # Sealed trait
//!
//! The [`SerDes`] trait is sealed and cannot be implemented outside this
//! crate, so the codec interface can evolve without breaking callers. Use
//! [`custom_serdes`] for custom encodings.
//!
//! # Example
//!
//! ```rust
//! use run_once::serdes::{JsonSerDes, SerDes, SerDesContext};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Serialize, Deserialize, PartialEq, Debug)]
//! struct Charge {
//!     cents: u64,
//! }
//!
//! let serdes = JsonSerDes::<Charge>::new();
//! let context = SerDesContext::new("charge-91");
//! let value = Charge { cents: 1250 };
//!
//! let blob = serdes.serialize(&value, &context).unwrap();
//! let restored = serdes.deserialize(&blob, &context).unwrap();
//! assert_eq!(value, restored);
//! ```

use std::fmt;
use std::marker::PhantomData;

use serde::{de::DeserializeOwned, Serialize};

use crate::sealed::Sealed;

/// Error type for codec failures.
#[derive(Debug, Clone)]
pub struct SerDesError {
    /// The direction that failed.
    pub kind: SerDesErrorKind,
    /// Descriptive error message.
    pub message: String,
}

/// The direction of a codec failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SerDesErrorKind {
    /// Error while serializing a value to a blob.
    Serialization,
    /// Error while deserializing a blob back to a value.
    Deserialization,
}

impl SerDesError {
    /// Creates a new serialization error.
    pub fn serialization(message: impl Into<String>) -> Self {
        Self {
            kind: SerDesErrorKind::Serialization,
            message: message.into(),
        }
    }

    /// Creates a new deserialization error.
    pub fn deserialization(message: impl Into<String>) -> Self {
        Self {
            kind: SerDesErrorKind::Deserialization,
            message: message.into(),
        }
    }
}

impl fmt::Display for SerDesError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            SerDesErrorKind::Serialization => write!(f, "serialization error: {}", self.message),
            SerDesErrorKind::Deserialization => {
                write!(f, "deserialization error: {}", self.message)
            }
        }
    }
}

impl std::error::Error for SerDesError {}

/// Context provided to codecs, identifying the record being encoded.
///
/// Custom codecs can use the key for logging or key-dependent encodings.
#[derive(Debug, Clone)]
pub struct SerDesContext {
    /// The idempotency key of the record being encoded or decoded.
    pub key: String,
}

impl SerDesContext {
    /// Creates a new `SerDesContext` for the given key.
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }
}

/// Trait for converting request and response values to and from stored blobs.
///
/// This trait is sealed; implement custom behavior through [`custom_serdes`].
/// Implementations must be `Send + Sync` because codecs are shared across
/// concurrent invocations.
#[allow(private_bounds)]
pub trait SerDes<T>: Sealed + Send + Sync {
    /// Serializes a value to its blob representation.
    fn serialize(&self, value: &T, context: &SerDesContext) -> Result<String, SerDesError>;

    /// Deserializes a blob back to a value.
    fn deserialize(&self, blob: &str, context: &SerDesContext) -> Result<T, SerDesError>;
}

/// Default JSON codec backed by serde_json.
///
/// A persistent request whose preprocessed value is `None` serializes as the
/// explicit JSON `null` and round-trips as such.
pub struct JsonSerDes<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> Sealed for JsonSerDes<T> {}

impl<T> JsonSerDes<T> {
    /// Creates a new JSON codec.
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for JsonSerDes<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for JsonSerDes<T> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for JsonSerDes<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonSerDes").finish()
    }
}

impl<T> SerDes<T> for JsonSerDes<T>
where
    T: Serialize + DeserializeOwned,
{
    fn serialize(&self, value: &T, _context: &SerDesContext) -> Result<String, SerDesError> {
        serde_json::to_string(value).map_err(|e| SerDesError::serialization(e.to_string()))
    }

    fn deserialize(&self, blob: &str, _context: &SerDesContext) -> Result<T, SerDesError> {
        serde_json::from_str(blob).map_err(|e| SerDesError::deserialization(e.to_string()))
    }
}

/// A codec that delegates to user-provided closures.
///
/// Created via [`custom_serdes`]; this is the escape hatch for callers who
/// need encodings other than JSON without implementing the sealed [`SerDes`]
/// trait.
pub struct CustomSerDes<T, S, D>
where
    S: Fn(&T, &SerDesContext) -> Result<String, SerDesError> + Send + Sync,
    D: Fn(&str, &SerDesContext) -> Result<T, SerDesError> + Send + Sync,
{
    serialize_fn: S,
    deserialize_fn: D,
    _marker: PhantomData<fn() -> T>,
}

impl<T, S, D> Sealed for CustomSerDes<T, S, D>
where
    S: Fn(&T, &SerDesContext) -> Result<String, SerDesError> + Send + Sync,
    D: Fn(&str, &SerDesContext) -> Result<T, SerDesError> + Send + Sync,
{
}

impl<T, S, D> SerDes<T> for CustomSerDes<T, S, D>
where
    S: Fn(&T, &SerDesContext) -> Result<String, SerDesError> + Send + Sync,
    D: Fn(&str, &SerDesContext) -> Result<T, SerDesError> + Send + Sync,
{
    fn serialize(&self, value: &T, context: &SerDesContext) -> Result<String, SerDesError> {
        (self.serialize_fn)(value, context)
    }

    fn deserialize(&self, blob: &str, context: &SerDesContext) -> Result<T, SerDesError> {
        (self.deserialize_fn)(blob, context)
    }
}

impl<T, S, D> fmt::Debug for CustomSerDes<T, S, D>
where
    S: Fn(&T, &SerDesContext) -> Result<String, SerDesError> + Send + Sync,
    D: Fn(&str, &SerDesContext) -> Result<T, SerDesError> + Send + Sync,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomSerDes").finish()
    }
}

/// Creates a codec from a pair of closures.
///
/// # Example
///
/// ```rust
/// use run_once::serdes::{custom_serdes, SerDes, SerDesContext, SerDesError};
///
/// let serdes = custom_serdes::<u32, _, _>(
///     |value, _ctx| Ok(value.to_string()),
///     |blob, _ctx| {
///         blob.parse()
///             .map_err(|e| SerDesError::deserialization(format!("{e}")))
///     },
/// );
///
/// let ctx = SerDesContext::new("k");
/// assert_eq!(serdes.serialize(&42, &ctx).unwrap(), "42");
/// assert_eq!(serdes.deserialize("42", &ctx).unwrap(), 42);
/// ```
pub fn custom_serdes<T, S, D>(serialize_fn: S, deserialize_fn: D) -> CustomSerDes<T, S, D>
where
    S: Fn(&T, &SerDesContext) -> Result<String, SerDesError> + Send + Sync,
    D: Fn(&str, &SerDesContext) -> Result<T, SerDesError> + Send + Sync,
{
    CustomSerDes {
        serialize_fn,
        deserialize_fn,
        _marker: PhantomData,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Serialize, Deserialize, PartialEq, Debug, Clone)]
    struct TestData {
        name: String,
        value: i32,
    }

    fn context() -> SerDesContext {
        SerDesContext::new("test-key")
    }

    #[test]
    fn test_context_carries_key() {
        let ctx = SerDesContext::new("k-1");
        assert_eq!(ctx.key, "k-1");
    }

    #[test]
    fn test_error_kinds() {
        let ser = SerDesError::serialization("nope");
        assert_eq!(ser.kind, SerDesErrorKind::Serialization);
        assert!(ser.to_string().contains("serialization error"));

        let de = SerDesError::deserialization("nope");
        assert_eq!(de.kind, SerDesErrorKind::Deserialization);
        assert!(de.to_string().contains("deserialization error"));
    }

    #[test]
    fn test_json_roundtrip() {
        let serdes = JsonSerDes::<TestData>::new();
        let original = TestData {
            name: "roundtrip".to_string(),
            value: 123,
        };

        let blob = serdes.serialize(&original, &context()).unwrap();
        let restored = serdes.deserialize(&blob, &context()).unwrap();
        assert_eq!(original, restored);
    }

    #[test]
    fn test_json_invalid_blob() {
        let serdes = JsonSerDes::<TestData>::new();
        let result = serdes.deserialize("not valid json", &context());
        assert_eq!(result.unwrap_err().kind, SerDesErrorKind::Deserialization);
    }

    #[test]
    fn test_json_option_none_is_explicit_null() {
        let serdes = JsonSerDes::<Option<i32>>::new();
        let blob = serdes.serialize(&None, &context()).unwrap();
        assert_eq!(blob, "null");

        let restored = serdes.deserialize(&blob, &context()).unwrap();
        assert_eq!(restored, None);
    }

    #[test]
    fn test_json_as_trait_object() {
        let serdes: &dyn SerDes<String> = &JsonSerDes::<String>::new();
        let blob = serdes.serialize(&"v".to_string(), &context()).unwrap();
        assert_eq!(serdes.deserialize(&blob, &context()).unwrap(), "v");
    }

    #[test]
    fn test_custom_serdes_roundtrip() {
        let serdes = custom_serdes::<String, _, _>(
            |value, _ctx| Ok(format!("v1:{}", value)),
            |blob, _ctx| {
                blob.strip_prefix("v1:")
                    .map(|s| s.to_string())
                    .ok_or_else(|| SerDesError::deserialization("missing v1 prefix"))
            },
        );

        let blob = serdes.serialize(&"hello".to_string(), &context()).unwrap();
        assert_eq!(blob, "v1:hello");
        assert_eq!(serdes.deserialize(&blob, &context()).unwrap(), "hello");
        assert!(serdes.deserialize("v2:hello", &context()).is_err());
    }

    #[test]
    fn test_custom_serdes_receives_context() {
        let serdes = custom_serdes::<String, _, _>(
            |value, ctx| Ok(format!("{}:{}", ctx.key, value)),
            |blob, _ctx| Ok(blob.to_string()),
        );

        let blob = serdes.serialize(&"v".to_string(), &context()).unwrap();
        assert_eq!(blob, "test-key:v");
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
        struct ComplexData {
            text: String,
            number: i64,
            flag: bool,
            optional: Option<String>,
            items: Vec<i32>,
        }

        fn arbitrary_complex_data() -> impl Strategy<Value = ComplexData> {
            (
                any::<String>(),
                any::<i64>(),
                any::<bool>(),
                any::<Option<String>>(),
                any::<Vec<i32>>(),
            )
                .prop_map(|(text, number, flag, optional, items)| ComplexData {
                    text,
                    number,
                    flag,
                    optional,
                    items,
                })
        }

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(100))]

            #[test]
            fn prop_string_roundtrip(value: String) {
                let serdes = JsonSerDes::<String>::new();
                let ctx = SerDesContext::new("prop");
                let blob = serdes.serialize(&value, &ctx).unwrap();
                prop_assert_eq!(serdes.deserialize(&blob, &ctx).unwrap(), value);
            }

            #[test]
            fn prop_i64_roundtrip(value: i64) {
                let serdes = JsonSerDes::<i64>::new();
                let ctx = SerDesContext::new("prop");
                let blob = serdes.serialize(&value, &ctx).unwrap();
                prop_assert_eq!(serdes.deserialize(&blob, &ctx).unwrap(), value);
            }

            #[test]
            fn prop_option_roundtrip(value: Option<String>) {
                let serdes = JsonSerDes::<Option<String>>::new();
                let ctx = SerDesContext::new("prop");
                let blob = serdes.serialize(&value, &ctx).unwrap();
                prop_assert_eq!(serdes.deserialize(&blob, &ctx).unwrap(), value);
            }

            #[test]
            fn prop_complex_roundtrip(value in arbitrary_complex_data()) {
                let serdes = JsonSerDes::<ComplexData>::new();
                let ctx = SerDesContext::new("prop");
                let blob = serdes.serialize(&value, &ctx).unwrap();
                prop_assert_eq!(serdes.deserialize(&blob, &ctx).unwrap(), value);
            }
        }
    }
}
