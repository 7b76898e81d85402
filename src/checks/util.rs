//! Small helpers shared by the check adapters.

use serde_json::{Map, Value};

use crate::error::ProbeError;

/// Percentage of `total` that is in use, given the `free` amount.
///
/// `None` when either value is missing or `total` is not positive.
pub fn to_percent_used(total: Option<f64>, free: Option<f64>) -> Option<f64> {
    match (total, free) {
        (Some(total), Some(free)) if total > 0.0 => Some((1.0 - free / total) * 100.0),
        _ => None,
    }
}

/// Value of `key`, or `null` when absent.
pub(crate) fn pick(src: &Value, key: &str) -> Value {
    src.get(key).cloned().unwrap_or(Value::Null)
}

/// Value of `key`, failing when the payload does not carry it.
pub(crate) fn require(src: &Value, key: &str) -> Result<Value, ProbeError> {
    src.get(key)
        .cloned()
        .ok_or_else(|| ProbeError::Decode(format!("missing `{key}` in guest status")))
}

/// Copies `keys` from `src` into a new item named `name`.
///
/// Dashes in API field names become underscores in the output.
pub(crate) fn item_with(name: Value, src: &Value, keys: &[&str]) -> Map<String, Value> {
    let mut item = Map::new();
    item.insert("name".into(), name);
    for key in keys {
        item.insert(key.replace('-', "_"), pick(src, key));
    }
    item
}

/// One item per entry of a keyed object, e.g. `nics` or `blockstat`.
pub(crate) fn items_per_key(src: Option<&Value>, keys: &[&str]) -> Option<Vec<Value>> {
    let entries = src?.as_object()?;
    Some(
        entries
            .iter()
            .map(|(name, entry)| Value::Object(item_with(Value::from(name.as_str()), entry, keys)))
            .collect(),
    )
}
