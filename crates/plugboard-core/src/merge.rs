//! JSON merge utilities for config resolution
//!
//! Implements the override merge semantics:
//! - Nested objects are merged recursively, key by key
//! - Scalars and arrays are replaced entirely, never combined
//! - `null` is a value like any other: it overwrites, it does not delete

use serde_json::Value;

/// Deep merge a patch into a target JSON value.
///
/// Rules:
/// 1. Object into object: merged key by key, recursing into shared keys
/// 2. Anything else: the patch value replaces the target value entirely
/// 3. `null` in the patch overwrites the target value with `null`
/// 4. Keys absent from the patch remain unchanged in the target
///
/// Merging never fails; any shape of patch yields a defined result.
pub fn deep_merge(target: &mut Value, patch: &Value) {
	match (target, patch) {
		(Value::Object(target_obj), Value::Object(patch_obj)) => {
			for (key, patch_value) in patch_obj {
				match target_obj.get_mut(key) {
					Some(target_value) => deep_merge(target_value, patch_value),
					None => {
						target_obj.insert(key.clone(), patch_value.clone());
					}
				}
			}
		}
		(target, patch) => *target = patch.clone(),
	}
}

/// Deep merge an ordered sequence of patches over a base value
pub fn merge_layers<'a>(base: &Value, patches: impl IntoIterator<Item = &'a Value>) -> Value {
	let mut merged = base.clone();
	for patch in patches {
		deep_merge(&mut merged, patch);
	}
	merged
}


// vim: ts=4
