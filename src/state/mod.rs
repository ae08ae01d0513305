// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Device state documents and the pure functions that operate on them.
//!
//! A device's `state` is an open JSON document: the registry never interprets
//! its keys, it only clones, diffs, and merges them. The helpers here are the
//! single source of truth for what "equal" and "merge" mean:
//!
//! - [`deep_equal`] — recursive structural equality (key set and value,
//!   array order significant). Persistence decisions hang off this.
//! - [`merge_patch`] — shallow top-level merge: patch keys replace same-named
//!   keys, every other key is preserved.
//! - [`state_differs`] — change detection over the union of top-level keys,
//!   used to skip redundant writes during reconciliation.

use serde_json::{Map, Value};

/// A sparse top-level update to a device's state document.
///
/// Patches never null-fill: a key the integration did not report is simply
/// absent and leaves the registry's value untouched.
pub type StatePatch = Map<String, Value>;

/// Recursive structural equality over JSON values.
///
/// Objects are equal when they have the same key set and equal values per
/// key; arrays are compared element-wise in order. Numbers compare by their
/// serialized representation, so `1` and `1.0` are distinct.
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use homefleet::state::deep_equal;
///
/// assert!(deep_equal(&json!({"a": [1, 2]}), &json!({"a": [1, 2]})));
/// assert!(!deep_equal(&json!({"a": [1, 2]}), &json!({"a": [2, 1]})));
/// ```
#[must_use]
pub fn deep_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Number(x), Value::Number(y)) => x == y,
        (Value::String(x), Value::String(y)) => x == y,
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(l, r)| deep_equal(l, r))
        }
        (Value::Object(x), Value::Object(y)) => {
            x.len() == y.len()
                && x.iter()
                    .all(|(key, left)| y.get(key).is_some_and(|right| deep_equal(left, right)))
        }
        _ => false,
    }
}

/// Applies a sparse patch on top of a state document.
///
/// Shallow, top-level only: a patch key replaces the registry's value for
/// that key wholesale (no recursive merging), all other keys survive.
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use homefleet::state::merge_patch;
///
/// let base = json!({"a": 1, "b": 2}).as_object().unwrap().clone();
/// let patch = json!({"b": 3}).as_object().unwrap().clone();
/// assert_eq!(serde_json::Value::Object(merge_patch(base, &patch)), json!({"a": 1, "b": 3}));
/// ```
#[must_use]
pub fn merge_patch(mut state: Map<String, Value>, patch: &StatePatch) -> Map<String, Value> {
    for (key, value) in patch {
        state.insert(key.clone(), value.clone());
    }
    state
}

/// Reports whether any key differs between two state documents, comparing
/// the union of top-level keys with [`deep_equal`].
#[must_use]
pub fn state_differs(current: &Map<String, Value>, next: &Map<String, Value>) -> bool {
    current
        .keys()
        .chain(next.keys().filter(|key| !current.contains_key(*key)))
        .any(|key| match (current.get(key), next.get(key)) {
            (Some(a), Some(b)) => !deep_equal(a, b),
            _ => true,
        })
}

/// Borrows a state value as an object map, treating absent or non-object
/// state as empty.
#[must_use]
pub fn as_object_or_empty(state: Option<&Value>) -> Map<String, Value> {
    match state {
        Some(Value::Object(map)) => map.clone(),
        _ => Map::new(),
    }
}
