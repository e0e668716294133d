//! Private sealed-trait marker.
//!
//! The [`Sealed`](crate::sealed::Sealed) supertrait prevents external crates
//! from implementing the [`SerDes`](crate::serdes::SerDes) trait directly, so
//! the codec interface can evolve without breaking callers. Callers that need
//! custom encodings use the [`custom_serdes`](crate::serdes::custom_serdes)
//! factory instead.

/// A marker trait used to seal other traits.
///
/// `pub(crate)` visibility means only types inside this crate can implement
/// it, and therefore only this crate can implement any trait that lists it
/// as a supertrait.
pub(crate) trait Sealed {}
