//! Diff engine for comparing existing vs requested object settings.
//!
//! Both sides are normalized before comparison: `null` object members are
//! dropped (so `null` and a missing key compare equal) and arrays made only
//! of strings are sorted. The walk then reports the deepest differing paths,
//! dot-joined, with array elements addressed by index.

use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use tracing::trace;

/// Engine for computing diffs between two JSON object graphs.
#[derive(Debug, Default, Clone, Copy)]
pub struct DiffEngine;

/// One differing path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiffEntry {
    /// Value on the existing side, if present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<Value>,
    /// Value on the requested side, if present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<Value>,
}

/// Path-keyed delta map.
pub type Difference = BTreeMap<String, DiffEntry>;

/// Result of a comparison.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompareResult {
    /// Whether both sides are equal after normalization.
    pub is_equal: bool,
    /// Delta map; `None` when equal.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub difference: Option<Difference>,
    /// Top-level keys under which a difference was found.
    #[serde(skip)]
    fields: BTreeSet<String>,
}

impl DiffEngine {
    /// Creates a new diff engine.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Compares `existing` against `requested`.
    #[must_use]
    pub fn compare(&self, existing: &Value, requested: &Value) -> CompareResult {
        let existing = Self::normalize(existing);
        let requested = Self::normalize(requested);

        if existing == requested {
            return CompareResult {
                is_equal: true,
                difference: None,
                fields: BTreeSet::new(),
            };
        }

        let mut difference = Difference::new();
        let mut fields = BTreeSet::new();
        for (key, from, to) in Self::pairs(&existing, &requested) {
            if from != to {
                Self::diff_member(from, to, key.clone(), &mut difference);
                fields.insert(key);
            }
        }
        trace!("Computed difference with {} path(s)", difference.len());

        CompareResult {
            is_equal: false,
            difference: Some(difference),
            fields,
        }
    }

    /// Returns a normalized deep copy of `value`.
    #[must_use]
    pub fn normalize(value: &Value) -> Value {
        match value {
            Value::Object(map) => Value::Object(
                map.iter()
                    .filter(|(_, v)| !v.is_null())
                    .map(|(k, v)| (k.clone(), Self::normalize(v)))
                    .collect(),
            ),
            Value::Array(items) => {
                let mut items: Vec<Value> = items.iter().map(Self::normalize).collect();
                if !items.is_empty() && items.iter().all(Value::is_string) {
                    items.sort_by(|a, b| a.as_str().cmp(&b.as_str()));
                }
                Value::Array(items)
            }
            other => other.clone(),
        }
    }

    /// Pairs up the members of both sides by key: removed members first, then
    /// the requested side in order.
    fn pairs<'v>(from: &'v Value, to: &'v Value) -> Vec<(String, Option<&'v Value>, Option<&'v Value>)> {
        let from_members = Self::members(from);
        let to_members = Self::members(to);

        let mut pairs: Vec<_> = from_members
            .iter()
            .filter(|(key, _)| !to_members.iter().any(|(k, _)| k == key))
            .map(|(key, value)| (key.clone(), Some(*value), None))
            .collect();
        for (key, to_value) in &to_members {
            let from_value = from_members.iter().find(|(k, _)| k == key).map(|(_, v)| *v);
            pairs.push((key.clone(), from_value, Some(*to_value)));
        }
        pairs
    }

    fn diff_member(from: Option<&Value>, to: Option<&Value>, path: String, changes: &mut Difference) {
        match (from, to) {
            (Some(from), Some(to)) if from == to => {}
            (Some(from), Some(to)) if Self::is_object_like(from) && Self::is_object_like(to) => {
                for (key, from, to) in Self::pairs(from, to) {
                    Self::diff_member(from, to, format!("{path}.{key}"), changes);
                }
            }
            (None, None) => {}
            (from, to) => {
                changes.insert(
                    path,
                    DiffEntry {
                        from: from.cloned(),
                        to: to.cloned(),
                    },
                );
            }
        }
    }

    /// Lists the members of an object (by key) or an array (by index).
    fn members(value: &Value) -> Vec<(String, &Value)> {
        match value {
            Value::Object(map) => map.iter().map(|(k, v)| (k.clone(), v)).collect(),
            Value::Array(items) => items
                .iter()
                .enumerate()
                .map(|(i, v)| (i.to_string(), v))
                .collect(),
            _ => Vec::new(),
        }
    }

    const fn is_object_like(value: &Value) -> bool {
        matches!(value, Value::Object(_) | Value::Array(_))
    }
}

impl CompareResult {
    /// Returns the top-level field names touched by the difference, sorted.
    ///
    /// Names are the real member keys, even when a key itself contains a `.`.
    #[must_use]
    pub fn changed_fields(&self) -> Vec<String> {
        self.fields.iter().cloned().collect()
    }
}

/// Projects `value` onto the given top-level fields.
#[must_use]
pub fn project(value: &Value, fields: &[&str]) -> Value {
    let mut out = Map::new();
    if let Value::Object(map) = value {
        for field in fields {
            if let Some(v) = map.get(*field) {
                out.insert((*field).to_string(), v.clone());
            }
        }
    }
    Value::Object(out)
}
