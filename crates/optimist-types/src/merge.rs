//! Shallow merge for partial updates.

use serde_json::Value;

/// Apply a partial update to a value, producing a new value.
///
/// The default patch type is `Self`, i.e. a whole-value patch. Types with a
/// dedicated patch struct implement `Merge<ThatPatch>`.
pub trait Merge<P = Self> {
    fn merge(&self, patch: P) -> Self;
}

/// `{...old, ...patch}`: when both sides are objects, the patch's top-level
/// fields overwrite the old ones. Any other combination replaces the value.
impl Merge for Value {
    fn merge(&self, patch: Value) -> Value {
        match (self, patch) {
            (Value::Object(old), Value::Object(patch)) => {
                let mut merged = old.clone();
                for (field, value) in patch {
                    merged.insert(field, value);
                }
                Value::Object(merged)
            }
            (_, patch) => patch,
        }
    }
}
