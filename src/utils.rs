//! Helpers for pulling typed fields out of loosely-typed JSON payloads.

use serde_json::Value;

/// Returns the string at `key`, or `None` when missing or not a string.
pub fn get_str<'a>(args: &'a Value, key: &str) -> Option<&'a str> {
    args.get(key).and_then(Value::as_str)
}

/// Converts a JSON number to `u64`.
///
/// Clients that only speak doubles send `100.0`; that is accepted as long
/// as it is finite, non-negative and integral.
pub fn value_to_u64(value: &Value) -> Option<u64> {
    let number = match value {
        Value::Number(n) => n,
        _ => return None,
    };
    if let Some(n) = number.as_u64() {
        return Some(n);
    }
    let f = number.as_f64()?;
    if f.is_finite() && f >= 0.0 && f.fract() == 0.0 && f < u64::MAX as f64 {
        Some(f as u64)
    } else {
        None
    }
}
