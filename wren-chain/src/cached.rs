use serde::{Deserialize, Serialize};

use crate::{SerializationError, WrenDeserialize, WrenSerialize};

/// A Cached type is an option that is never serialized.
///
/// It can be added to any struct without risking a consensus break.
#[derive(Clone, Copy, Eq, Serialize, Deserialize)]
pub struct Cached<T: Clone + Copy>(Option<T>);

impl<T: Clone + Copy> Cached<T> {
    pub fn new() -> Cached<T> {
        Cached(None)
    }
    pub fn from(val: T) -> Cached<T> {
        Cached(Some(val))
    }
    pub fn value(&self) -> Option<T> {
        self.0
    }
    pub fn has_value(&self) -> bool {
        self.0.is_some()
    }
}

impl<T: Clone + Copy> Default for Cached<T> {
    fn default() -> Self {
        Cached::new()
    }
}

/// Returns false only if the two items both have a full cache and their
/// values differ.
///
/// This allows us to generate items with empty caches for testing purposes
/// and compare them to their deserialized counterparts without modification.
/// Recall that caches are always populated during deserialization.
impl<T: PartialEq + Copy> PartialEq for Cached<T> {
    fn eq(&self, other: &Self) -> bool {
        match (self.0, other.0) {
            (Some(lhs), Some(rhs)) => lhs == rhs,
            _ => true,
        }
    }
}

impl<T: Clone + Copy> std::fmt::Debug for Cached<T>
where
    T: std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl<T: Clone + Copy> WrenSerialize for Cached<T> {
    fn wren_serialize<W>(&self, _: W) -> Result<(), std::io::Error>
    where
        W: std::io::Write,
    {
        Ok(())
    }
}

impl<T: Clone + Copy> WrenDeserialize for Cached<T> {
    fn wren_deserialize<R: std::io::Read>(_: R) -> Result<Self, SerializationError> {
        Ok(Cached(None))
    }
}
