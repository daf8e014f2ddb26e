//! JSON merge-patch (RFC 7396) application.

use serde_json::{Map, Value};

/// Applies `patch` onto `target` in place.
///
/// Object members merge recursively, `null` removes a member and any
/// non-object patch replaces the target wholesale.
pub fn apply_merge_patch(target: &mut Value, patch: &Value) {
    let Value::Object(patch_members) = patch else {
        *target = patch.clone();
        return;
    };

    if !target.is_object() {
        *target = Value::Object(Map::new());
    }
    let Value::Object(target_members) = target else {
        return;
    };

    for (key, value) in patch_members {
        if value.is_null() {
            target_members.remove(key);
            continue;
        }
        let slot = target_members.entry(key.clone()).or_insert(Value::Null);
        apply_merge_patch(slot, value);
    }
}
