//! Decoding of objects whose shape is selected by a discriminator field.
//!
//! A sum type implements [`Discriminated`] by naming the struct holding its
//! common fields (the probe) and a static table mapping discriminator values
//! to decode functions. Decoding reads the probe first, then either decodes
//! the full object as the matched variant or falls back to the probe itself.
//! Unknown discriminators are never an error.

use serde::de::{self, DeserializeOwned};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Decodes one concrete variant from the raw object.
pub type VariantDecoder<T> = fn(&Value) -> Result<T, serde_json::Error>;

/// Common fields shared by every shape of a discriminated object.
pub trait Probe: DeserializeOwned {
    /// The discriminator value.
    fn tag(&self) -> &str;
}

/// A sum type decoded through a discriminator registry.
pub trait Discriminated: Sized + 'static {
    /// The common fields, decoded first and used as the fallback.
    type Generic: Probe;

    /// Registry of known discriminator values.
    const VARIANTS: &'static [(&'static str, VariantDecoder<Self>)];

    /// Wrap the common fields of an unrecognized variant.
    fn fallback(generic: Self::Generic) -> Self;
}

/// Look up the decoder registered for `tag`.
pub fn lookup<T: Discriminated>(tag: &str) -> Option<VariantDecoder<T>> {
    T::VARIANTS
        .iter()
        .find(|(name, _)| *name == tag)
        .map(|(_, decode)| *decode)
}

/// Decode one discriminated object.
pub fn decode<T: Discriminated>(value: &Value) -> Result<T, serde_json::Error> {
    let probe = T::Generic::deserialize(value)?;
    match lookup::<T>(probe.tag()) {
        Some(decode) => decode(value),
        None => Ok(T::fallback(probe)),
    }
}

/// Decode a list of discriminated objects.
///
/// Each element is decoded on its own; the first failure aborts the whole list.
pub fn decode_list<T: Discriminated>(value: &Value) -> Result<Vec<T>, serde_json::Error> {
    let items = Vec::<Value>::deserialize(value)?;
    items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            decode(item).map_err(|e| {
                <serde_json::Error as de::Error>::custom(format_args!("element {}: {}", i, e))
            })
        })
        .collect()
}

/// Decode a single variant type, wrapping it into the sum type.
pub(crate) fn variant<V, T>(value: &Value, wrap: fn(V) -> T) -> Result<T, serde_json::Error>
where
    V: DeserializeOwned,
{
    V::deserialize(value).map(wrap)
}

/// `Deserialize` body shared by the sum types.
pub(crate) fn deserialize<'de, D, T>(d: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Discriminated,
{
    let value = Value::deserialize(d)?;
    decode(&value).map_err(de::Error::custom)
}

/// `deserialize_with` helper for list fields; `null` or a missing field decodes as empty.
pub(crate) fn deserialize_list<'de, D, T>(d: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Discriminated,
{
    match Option::<Value>::deserialize(d)? {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(value) => decode_list(&value).map_err(de::Error::custom),
    }
}
