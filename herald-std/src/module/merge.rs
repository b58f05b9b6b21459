//! Configuration merging.

use serde_json::Value;

/// Merge `overlay` into `target`.
///
/// Objects merge key by key, recursively. Any other overlay value (including
/// arrays and `null`) replaces the target value outright.
pub fn deep_merge(target: &mut Value, overlay: &Value) {
    match (target, overlay) {
        (Value::Object(target), Value::Object(overlay)) => {
            for (key, value) in overlay {
                match target.get_mut(key) {
                    Some(slot) => deep_merge(slot, value),
                    None => {
                        target.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (target, overlay) => *target = overlay.clone(),
    }
}

/// Return a deep copy of `base` with `overlay` merged over it.
pub fn merged(base: &Value, overlay: &Value) -> Value {
    let mut out = base.clone();
    deep_merge(&mut out, overlay);
    out
}
