//! Conversion of keys and values to the isolated byte form used by
//! store-by-value caches.

#[cfg(feature = "serde")]
use crate::error::CacheError;
use crate::error::Result;

/// Converts `T` to and from an owned byte representation.
///
/// A store-by-value cache serializes every key and value on write and
/// deserializes a fresh instance on every read, so no reference held by the
/// caller ever aliases the cache's internal state.
pub trait Serializer<T>: Send + Sync {
  fn serialize(&self, value: &T) -> Result<Vec<u8>>;
  fn deserialize(&self, bytes: &[u8]) -> Result<T>;
}

/// A `Serializer` backed by `bincode`.
#[cfg(feature = "serde")]
#[derive(Debug, Clone, Copy, Default)]
pub struct BincodeSerializer;

#[cfg(feature = "serde")]
impl<T> Serializer<T> for BincodeSerializer
where
  T: serde::Serialize + serde::de::DeserializeOwned,
{
  fn serialize(&self, value: &T) -> Result<Vec<u8>> {
    bincode::serialize(value).map_err(|e| CacheError::Serialization(e.to_string()))
  }

  fn deserialize(&self, bytes: &[u8]) -> Result<T> {
    bincode::deserialize(bytes).map_err(|e| CacheError::Serialization(e.to_string()))
  }
}

#[cfg(all(test, feature = "serde"))]
mod tests {
  use super::*;

  #[test]
  fn truncated_bytes_are_a_serialization_error() {
    let bytes = Serializer::<String>::serialize(&BincodeSerializer, &"hello".to_string()).unwrap();
    let err = Serializer::<String>::deserialize(&BincodeSerializer, &bytes[..3]).unwrap_err();
    assert!(matches!(err, CacheError::Serialization(_)));
  }
}
