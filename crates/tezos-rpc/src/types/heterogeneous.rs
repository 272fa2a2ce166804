//! Records encoded as arrays with a leading scalar.
//!
//! Several endpoints return records as
//!
//! ```text
//! [
//!     "...",      // object ID, hash or address
//!     { ... }     // the object, with the ID omitted
//! ]
//! ```
//!
//! instead of one object. [`leading_pair`] decodes the two positions
//! independently; the callers merge them into a single struct.

use serde::de::{self, DeserializeOwned};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Decode a JSON array of at least two elements into its first two positions.
///
/// Elements past the second are ignored.
pub fn leading_pair<'de, D, A, B>(d: D) -> Result<(A, B), D::Error>
where
    D: Deserializer<'de>,
    A: DeserializeOwned,
    B: DeserializeOwned,
{
    let items = Vec::<Value>::deserialize(d)?;
    if items.len() < 2 {
        return Err(de::Error::custom(format_args!(
            "JSON array is too short, expected 2, got {}",
            items.len()
        )));
    }

    let first = position(&items[0], 0)?;
    let second = position(&items[1], 1)?;
    Ok((first, second))
}

fn position<T, E>(value: &Value, index: usize) -> Result<T, E>
where
    T: DeserializeOwned,
    E: de::Error,
{
    T::deserialize(value).map_err(|e| E::custom(format_args!("array element {}: {}", index, e)))
}

/// Records carrying an identifier that the array encoding moves to the front.
pub(crate) trait Keyed {
    type Key: DeserializeOwned;

    fn set_key(&mut self, key: Self::Key);
}

/// Decode `[key, object]` into the object with its key filled in.
pub(crate) fn keyed<'de, D, T>(d: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Keyed + DeserializeOwned,
{
    let (key, mut record): (T::Key, T) = leading_pair(d)?;
    record.set_key(key);
    Ok(record)
}

/// `deserialize_with` helper for lists of `[key, object]` records.
pub(crate) fn keyed_list<'de, D, T>(d: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Keyed + DeserializeOwned,
{
    let items = Option::<Vec<Value>>::deserialize(d)?.unwrap_or_default();
    items
        .into_iter()
        .enumerate()
        .map(|(i, item)| {
            keyed(item).map_err(|e| de::Error::custom(format_args!("element {}: {}", i, e)))
        })
        .collect()
}

/// Wrapper used to decode top-level lists of keyed records.
#[derive(Debug)]
pub(crate) struct KeyedEntry<T>(pub T);

impl<'de, T> Deserialize<'de> for KeyedEntry<T>
where
    T: Keyed + DeserializeOwned,
{
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        keyed(d).map(KeyedEntry)
    }
}
