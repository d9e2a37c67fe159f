//! Field-level diffs between two event snapshots.
//!
//! A [`Diff`] is descriptive, not a patch: it reports which top-level keys
//! were added, which changed (with both values) and which disappeared.
//! Values are compared with `serde_json::Value` equality, so nested arrays
//! and objects are compared structurally.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Old and new value of a key present in both snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldChange {
    pub old: Value,
    pub new: Value,
}

/// Disjoint sections describing how `new` differs from `old`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diff {
    /// Keys only in the new snapshot
    pub added: BTreeMap<String, Value>,
    /// Keys in both snapshots with unequal values
    pub modified: BTreeMap<String, FieldChange>,
    /// Keys only in the old snapshot
    pub removed: BTreeMap<String, Value>,
}

impl Diff {
    /// True when both snapshots were equal.
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.modified.is_empty() && self.removed.is_empty()
    }

    /// Every key touched by the diff, sorted.
    pub fn changed_keys(&self) -> Vec<&str> {
        let mut keys = self
            .added
            .keys()
            .chain(self.modified.keys())
            .chain(self.removed.keys())
            .map(String::as_str)
            .collect::<Vec<_>>();
        keys.sort_unstable();
        keys
    }

    /// JSON form stored in change log entries.
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Compute the diff between two snapshots.
pub fn generate_diff(old: &Map<String, Value>, new: &Map<String, Value>) -> Diff {
    let mut diff = Diff::default();

    for (key, new_value) in new {
        match old.get(key) {
            None => {
                diff.added.insert(key.clone(), new_value.clone());
            }
            Some(old_value) if old_value != new_value => {
                diff.modified.insert(
                    key.clone(),
                    FieldChange {
                        old: old_value.clone(),
                        new: new_value.clone(),
                    },
                );
            }
            Some(_) => {}
        }
    }

    for (key, old_value) in old {
        if !new.contains_key(key) {
            diff.removed.insert(key.clone(), old_value.clone());
        }
    }

    diff
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected an object"),
        }
    }

    #[test]
    fn identical_snapshots_produce_empty_diff() {
        let data = object(json!({ "title": "Standup", "version": 3 }));
        let diff = generate_diff(&data, &data);
        assert!(diff.is_empty());
    }

    #[test]
    fn sections_are_disjoint_and_complete() {
        let old = object(json!({ "title": "Standup", "location": "Room 1", "notes": "x" }));
        let new = object(json!({ "title": "Daily standup", "location": "Room 1", "color": "blue" }));

        let diff = generate_diff(&old, &new);

        assert_eq!(diff.added, BTreeMap::from([("color".to_string(), json!("blue"))]));
        assert_eq!(
            diff.modified,
            BTreeMap::from([(
                "title".to_string(),
                FieldChange {
                    old: json!("Standup"),
                    new: json!("Daily standup"),
                },
            )])
        );
        assert_eq!(diff.removed, BTreeMap::from([("notes".to_string(), json!("x"))]));
        assert_eq!(diff.changed_keys(), vec!["color", "notes", "title"]);
    }

    #[test]
    fn nested_values_compare_structurally() {
        let old = object(json!({ "tags": ["a", "b"], "meta": { "x": 1 } }));
        let same = object(json!({ "meta": { "x": 1 }, "tags": ["a", "b"] }));
        let reordered = object(json!({ "tags": ["b", "a"], "meta": { "x": 1 } }));

        assert!(generate_diff(&old, &same).is_empty());
        assert!(generate_diff(&old, &reordered).modified.contains_key("tags"));
    }

    #[test]
    fn null_and_missing_are_different() {
        let old = object(json!({ "recurrence_pattern": null }));
        let new = object(json!({}));
        let diff = generate_diff(&old, &new);
        assert_eq!(diff.removed.get("recurrence_pattern"), Some(&Value::Null));
    }

    #[test]
    fn serialized_form_has_three_sections() {
        let old = object(json!({ "title": "A" }));
        let new = object(json!({ "title": "B" }));
        let value = generate_diff(&old, &new).to_value();
        assert_eq!(
            value,
            json!({
                "added": {},
                "modified": { "title": { "old": "A", "new": "B" } },
                "removed": {}
            })
        );
    }

    fn arb_snapshot() -> impl Strategy<Value = Map<String, Value>> {
        prop::collection::btree_map(
            "[a-e]",
            prop_oneof![
                any::<i64>().prop_map(Value::from),
                "[a-z]{0,4}".prop_map(Value::from),
                any::<bool>().prop_map(Value::from),
                Just(Value::Null),
            ],
            0..5,
        )
        .prop_map(|entries| entries.into_iter().collect())
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(128))]

        #[test]
        fn prop_diff_with_self_is_empty(snapshot in arb_snapshot()) {
            prop_assert!(generate_diff(&snapshot, &snapshot).is_empty());
        }

        #[test]
        fn prop_modified_carries_exact_values(old in arb_snapshot(), new in arb_snapshot()) {
            let diff = generate_diff(&old, &new);
            for (key, change) in &diff.modified {
                prop_assert_eq!(&change.old, &old[key]);
                prop_assert_eq!(&change.new, &new[key]);
                prop_assert_ne!(&change.old, &change.new);
            }
            for key in diff.added.keys() {
                prop_assert!(!old.contains_key(key) && new.contains_key(key));
            }
            for key in diff.removed.keys() {
                prop_assert!(old.contains_key(key) && !new.contains_key(key));
            }
            for (key, value) in &new {
                if old.get(key) == Some(value) {
                    prop_assert!(!diff.changed_keys().contains(&key.as_str()));
                }
            }
        }
    }
}
