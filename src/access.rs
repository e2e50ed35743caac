use tracing::trace;

use crate::{error::HostAccessError, value::Value};

/// Reads `key` off `value`.
///
/// Sequences answer numeric keys by position and mappings answer string
/// keys by lookup. Host objects additionally answer field reads, but only for
/// keys their allow-list admits. Every other combination is absent
/// (`Ok(None)`); the only error is a host object failing while it is read.
///
/// # Errors
/// Propagates the [`HostAccessError`] of a host object whose
/// [`read_field`](crate::HostObject::read_field) failed.
pub fn access(value: &Value, key: &str) -> Result<Option<Value>, HostAccessError> {
    match value {
        Value::Array(items) => Ok(index(key).and_then(|index| items.get(index).cloned())),
        Value::Object(map) => Ok(map.get(key).cloned()),
        Value::Host(host) => {
            if let Some(index) = index(key) {
                if let Some(items) = host.as_sequence() {
                    return Ok(items.into_iter().nth(index));
                }
            }
            if let Some(entries) = host.as_mapping() {
                if let Some((_, found)) = entries.into_iter().find(|(name, _)| name == key) {
                    return Ok(Some(found));
                }
            }

            let allowed = host
                .valid_keys()
                .unwrap_or_else(|| host.field_names())
                .contains(&key);
            if !allowed {
                trace!(
                    type_name = host.type_name(),
                    key, "key is not readable from templates"
                );
                return Ok(None);
            }
            host.read_field(key)
        }
        Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_) => Ok(None),
    }
}

fn index(key: &str) -> Option<usize> {
    if key.starts_with('+') {
        return None;
    }
    key.parse().ok()
}
