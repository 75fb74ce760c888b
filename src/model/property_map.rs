//! PropertyMap and FieldData — the key-value shapes fields render into.

use std::collections::{BTreeMap, HashMap};
use super::Value;

/// A map of property names to values.
pub type PropertyMap = HashMap<String, Value>;

/// A name-sorted snapshot of field values, as returned by every view.
pub type FieldData = BTreeMap<String, Value>;

/// Convert iterator of (key, value) pairs into a map value.
impl<K, V> From<Vec<(K, V)>> for Value
where
    K: Into<String>,
    V: Into<Value>,
{
    fn from(pairs: Vec<(K, V)>) -> Self {
        Value::Map(pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// Build a `PropertyMap` from (key, value) pairs.
pub fn props<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> PropertyMap
where
    K: Into<String>,
    V: Into<Value>,
{
    pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect()
}
