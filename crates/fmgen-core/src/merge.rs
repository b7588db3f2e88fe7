//! Merge engine
//!
//! Combines an evaluated candidate with the metadata already present in a
//! document.
//!
//! ## Rules
//!
//! 1. An empty candidate changes nothing.
//! 2. A candidate already contained in the existing metadata changes nothing
//!    ([`deep_include`]).
//! 3. Otherwise the candidate is shallow-merged over the existing map; the
//!    candidate wins on conflicts and keys it does not mention are kept.
//! 4. Every key path where the candidate holds `null` is removed from the
//!    result.
//! 5. Top-level keys are optionally sorted.

use tracing::trace;

use crate::value::{Metadata, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeOptions {
    /// Sort top-level keys alphabetically.
    pub sort_keys: bool,
    /// Also sort keys of nested maps.
    pub sort_nested_keys: bool,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            sort_keys: true,
            sort_nested_keys: false,
        }
    }
}

/// Outcome of [`plan_merge`].
#[derive(Debug, Clone, PartialEq)]
pub enum MergePlan {
    EmptyCandidate,
    AlreadySatisfied,
    Merged(Metadata),
}

/// Whether every key path of `candidate` already holds an equal value in
/// `existing`.
///
/// Two nulls are *not* considered equal at any depth, so a candidate that
/// asks for a key or list slot to be removed is never treated as satisfied.
/// Lists must have the same length and include each other index by index.
pub fn deep_include(existing: &Value, candidate: &Value) -> bool {
    if existing.is_null() && candidate.is_null() {
        return false;
    }
    match (existing, candidate) {
        (Value::Map(existing), Value::Map(candidate)) => map_includes(existing, candidate),
        (Value::List(existing), Value::List(candidate)) => {
            existing.len() == candidate.len()
                && existing.iter().zip(candidate).all(|(x, y)| deep_include(x, y))
        }
        (Value::Map(_) | Value::List(_), _) => false,
        (_, Value::Map(_)) => false,
        _ => same_value(existing, candidate),
    }
}

fn map_includes(existing: &Metadata, candidate: &Metadata) -> bool {
    candidate
        .iter()
        .all(|(key, value)| deep_include(existing.get(key).unwrap_or(&Value::Undefined), value))
}

/// Scalar equality used by containment. Numbers compare numerically and a
/// date matches the string holding its ISO text.
fn same_value(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Date(_) | Value::DateTime(_), Value::String(s))
        | (Value::String(s), Value::Date(_) | Value::DateTime(_)) => {
            let date = if matches!(a, Value::String(_)) { b } else { a };
            date.date_text().as_deref() == Some(s.as_str())
        }
        _ => a == b,
    }
}

/// Merge `candidate` over `existing`.
pub fn merge(existing: Option<&Metadata>, candidate: &Metadata, options: &MergeOptions) -> Metadata {
    let mut merged = existing.cloned().unwrap_or_default();
    for (key, value) in candidate {
        merged.insert(key.clone(), value.clone());
    }
    remove_nulls(&mut merged, candidate);

    if options.sort_nested_keys {
        sort_recursive(&mut merged);
    } else if options.sort_keys {
        merged.sort_keys();
    }
    merged
}

/// Run the whole decision sequence for one candidate.
pub fn plan_merge(existing: Option<&Metadata>, candidate: &Metadata, options: &MergeOptions) -> MergePlan {
    if candidate.is_empty() {
        return MergePlan::EmptyCandidate;
    }
    if let Some(existing) = existing {
        if map_includes(existing, candidate) {
            trace!("candidate already contained in existing metadata");
            return MergePlan::AlreadySatisfied;
        }
    }
    MergePlan::Merged(merge(existing, candidate, options))
}

/// Remove from `target` every key path where `candidate` holds `null`.
fn remove_nulls(target: &mut Metadata, candidate: &Metadata) {
    for (key, value) in candidate {
        match value {
            Value::Null => {
                target.shift_remove(key);
            }
            Value::Map(nested) => {
                if let Some(Value::Map(inner)) = target.get_mut(key) {
                    remove_nulls(inner, nested);
                }
            }
            Value::List(items) => {
                if let Some(Value::List(inner)) = target.get_mut(key) {
                    strip_list_nulls(inner, items);
                }
            }
            _ => {}
        }
    }
}

/// Lists are addressed by index; null slots named by the candidate are
/// dropped, scanning from the end so earlier indices stay valid.
fn strip_list_nulls(target: &mut Vec<Value>, candidate: &[Value]) {
    for (idx, value) in candidate.iter().enumerate().rev() {
        if idx >= target.len() {
            continue;
        }
        match value {
            Value::Null => {
                target.remove(idx);
            }
            Value::Map(nested) => {
                if let Value::Map(inner) = &mut target[idx] {
                    remove_nulls(inner, nested);
                }
            }
            Value::List(items) => {
                if let Value::List(inner) = &mut target[idx] {
                    strip_list_nulls(inner, items);
                }
            }
            _ => {}
        }
    }
}

fn sort_recursive(map: &mut Metadata) {
    map.sort_keys();
    for value in map.values_mut() {
        sort_value(value);
    }
}

fn sort_value(value: &mut Value) {
    match value {
        Value::Map(inner) => sort_recursive(inner),
        Value::List(items) => items.iter_mut().for_each(sort_value),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata;
    use chrono::NaiveDate;
    use proptest::prelude::*;

    fn map(v: Metadata) -> Value {
        Value::Map(v)
    }

    #[test]
    fn test_null_is_not_included_in_null() {
        assert!(!deep_include(&Value::Null, &Value::Null));
        let existing = metadata! { "a" => Value::Null };
        let candidate = metadata! { "a" => Value::Null };
        assert!(!deep_include(&map(existing), &map(candidate)));
    }

    #[test]
    fn test_missing_key_includes_undefined() {
        let mut candidate = Metadata::new();
        candidate.insert("gone".into(), Value::Undefined);
        assert!(deep_include(&map(metadata! { "a" => 1 }), &map(candidate)));
    }

    #[test]
    fn test_containment_is_recursive_over_candidate_keys() {
        let existing = metadata! {
            "a" => 1,
            "nested" => metadata! { "x" => "y", "z" => true },
        };
        let candidate = metadata! { "nested" => metadata! { "x" => "y" } };
        assert!(deep_include(&map(existing.clone()), &map(candidate)));

        let candidate = metadata! { "nested" => metadata! { "x" => "other" } };
        assert!(!deep_include(&map(existing), &map(candidate)));
    }

    #[test]
    fn test_lists_compare_structurally() {
        let existing = metadata! { "tags" => vec!["a", "b"] };
        assert!(deep_include(&map(existing.clone()), &map(metadata! { "tags" => vec!["a", "b"] })));
        assert!(!deep_include(&map(existing), &map(metadata! { "tags" => vec!["b", "a"] })));
    }

    #[test]
    fn test_nulls_inside_lists_are_never_included() {
        let nulls = || Value::List(vec![Value::Integer(1), Value::Null]);
        assert!(!deep_include(&nulls(), &nulls()));

        let existing = metadata! { "l" => nulls() };
        let candidate = metadata! { "l" => nulls() };
        let plan = plan_merge(Some(&existing), &candidate, &MergeOptions::default());
        assert_eq!(plan, MergePlan::Merged(metadata! { "l" => vec![1i64] }));
    }

    #[test]
    fn test_maps_inside_lists_use_containment() {
        let existing = metadata! { "l" => Value::List(vec![map(metadata! { "a" => 1, "b" => 2 })]) };
        let candidate = metadata! { "l" => Value::List(vec![map(metadata! { "a" => 1 })]) };
        assert!(deep_include(&map(existing.clone()), &map(candidate)));

        let shorter = metadata! { "l" => Value::List(Vec::new()) };
        assert!(!deep_include(&map(existing), &map(shorter)));
    }

    #[test]
    fn test_numbers_and_dates_compare_by_value() {
        assert!(deep_include(&Value::Integer(3), &Value::Float(3.0)));
        let date = Value::Date(NaiveDate::from_ymd_opt(2024, 5, 1).unwrap());
        assert!(deep_include(&Value::from("2024-05-01"), &date));
        assert!(deep_include(&date, &Value::from("2024-05-01")));
        assert!(!deep_include(&date, &Value::from("2024-05-02")));
    }

    #[test]
    fn test_existing_container_vs_scalar_is_not_included() {
        assert!(!deep_include(&map(metadata! { "a" => 1 }), &Value::Integer(1)));
        assert!(!deep_include(&Value::Integer(1), &map(metadata! { "a" => 1 })));
    }

    #[test]
    fn test_empty_candidate_is_noop() {
        let existing = metadata! { "a" => 1 };
        assert_eq!(
            plan_merge(Some(&existing), &Metadata::new(), &MergeOptions::default()),
            MergePlan::EmptyCandidate
        );
    }

    #[test]
    fn test_contained_candidate_is_satisfied() {
        let existing = metadata! { "a" => 1, "b" => 2 };
        let candidate = metadata! { "b" => 2 };
        assert_eq!(
            plan_merge(Some(&existing), &candidate, &MergeOptions::default()),
            MergePlan::AlreadySatisfied
        );
    }

    #[test]
    fn test_null_removes_key() {
        let existing = metadata! { "a" => 1, "b" => 2 };
        let candidate = metadata! { "b" => Value::Null };
        let merged = merge(Some(&existing), &candidate, &MergeOptions::default());
        assert_eq!(merged, metadata! { "a" => 1 });
    }

    #[test]
    fn test_candidate_wins_conflicts() {
        let existing = metadata! { "a" => 1 };
        let candidate = metadata! { "a" => 2 };
        let merged = merge(Some(&existing), &candidate, &MergeOptions::default());
        assert_eq!(merged, metadata! { "a" => 2 });
    }

    #[test]
    fn test_top_level_sort() {
        let candidate = metadata! { "b" => 1, "a" => 2 };
        let merged = merge(None, &candidate, &MergeOptions::default());
        assert_eq!(merged.keys().collect::<Vec<_>>(), vec!["a", "b"]);

        let unsorted = MergeOptions { sort_keys: false, sort_nested_keys: false };
        let merged = merge(None, &candidate, &unsorted);
        assert_eq!(merged.keys().collect::<Vec<_>>(), vec!["b", "a"]);
    }

    #[test]
    fn test_nested_sort_only_when_requested() {
        let candidate = metadata! { "m" => metadata! { "z" => 1, "y" => 2 } };
        let merged = merge(None, &candidate, &MergeOptions::default());
        let inner: Vec<_> = merged["m"].as_map().unwrap().keys().cloned().collect();
        assert_eq!(inner, vec!["z", "y"]);

        let nested = MergeOptions { sort_keys: true, sort_nested_keys: true };
        let merged = merge(None, &candidate, &nested);
        let inner: Vec<_> = merged["m"].as_map().unwrap().keys().cloned().collect();
        assert_eq!(inner, vec!["y", "z"]);
    }

    #[test]
    fn test_unsorted_merge_keeps_existing_positions() {
        let existing = metadata! { "x" => 1, "y" => 2 };
        let candidate = metadata! { "new" => 0, "x" => 5 };
        let opts = MergeOptions { sort_keys: false, sort_nested_keys: false };
        let merged = merge(Some(&existing), &candidate, &opts);
        assert_eq!(merged.keys().collect::<Vec<_>>(), vec!["x", "y", "new"]);
    }

    #[test]
    fn test_nested_null_removal_replaces_whole_subtree() {
        // Shallow merge: the candidate's nested map replaces the existing one,
        // then the null inside it is stripped.
        let existing = metadata! { "m" => metadata! { "keep" => 1, "drop" => 2 } };
        let candidate = metadata! { "m" => metadata! { "drop" => Value::Null } };
        let merged = merge(Some(&existing), &candidate, &MergeOptions::default());
        assert_eq!(merged, metadata! { "m" => Metadata::new() });
    }

    #[test]
    fn test_null_removal_inside_lists() {
        let candidate = metadata! { "l" => Value::List(vec![Value::Integer(1), Value::Null, Value::Integer(3)]) };
        let merged = merge(None, &candidate, &MergeOptions::default());
        assert_eq!(merged, metadata! { "l" => vec![1i64, 3] });
    }

    fn scalar() -> impl Strategy<Value = Value> {
        prop_oneof![
            any::<bool>().prop_map(Value::Bool),
            any::<i64>().prop_map(Value::Integer),
            "[a-z]{0,6}".prop_map(Value::String),
        ]
    }

    fn metadata_strategy() -> impl Strategy<Value = Metadata> {
        prop::collection::vec(("[a-e]{1,3}", scalar()), 0..6)
            .prop_map(|pairs| pairs.into_iter().collect())
    }

    proptest! {
        #[test]
        fn prop_merge_is_idempotent(existing in metadata_strategy(), candidate in metadata_strategy()) {
            let opts = MergeOptions::default();
            let once = merge(Some(&existing), &candidate, &opts);
            prop_assert!(deep_include(&Value::Map(once.clone()), &Value::Map(candidate.clone())) || candidate.is_empty());
            let twice = merge(Some(&once), &candidate, &opts);
            prop_assert_eq!(once, twice);
        }

        #[test]
        fn prop_merge_never_drops_untouched_keys(existing in metadata_strategy(), candidate in metadata_strategy()) {
            let merged = merge(Some(&existing), &candidate, &MergeOptions::default());
            for key in existing.keys().filter(|k| !candidate.contains_key(*k)) {
                prop_assert_eq!(merged.get(key), existing.get(key));
            }
        }
    }
}
