//! Property-based tests for deep merging.

use super::{merge, merge_all};
use crate::value::{Mapping, Value};
use proptest::prelude::*;

fn leaf_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<i64>().prop_map(Value::Int),
        any::<bool>().prop_map(Value::Bool),
        "[a-z]{0,8}".prop_map(Value::Str),
        prop::collection::vec(any::<i32>().prop_map(Value::from), 0..4).prop_map(Value::List),
    ]
}

// Small key alphabet so layers collide often.
fn value_strategy() -> impl Strategy<Value = Value> {
    leaf_strategy().prop_recursive(3, 32, 4, |inner| {
        prop::collection::btree_map("[a-d]", inner, 0..4).prop_map(Value::Mapping)
    })
}

fn mapping_strategy() -> impl Strategy<Value = Mapping> {
    prop::collection::btree_map("[a-d]", value_strategy(), 0..5)
}

// Two mapping levels over scalar leaves: every key has the same shape in every layer.
fn layered_strategy() -> impl Strategy<Value = Mapping> {
    let leaves = prop::collection::btree_map("[x-z]", leaf_strategy(), 0..3);
    let middle = prop::collection::btree_map("[a-c]", leaves.prop_map(Value::Mapping), 0..3);
    prop::collection::btree_map("[a-c]", middle.prop_map(Value::Mapping), 0..3)
}

fn leaves(map: &Mapping) -> Vec<(Vec<String>, Value)> {
    fn walk(map: &Mapping, prefix: &mut Vec<String>, out: &mut Vec<(Vec<String>, Value)>) {
        for (key, value) in map {
            prefix.push(key.clone());
            match value {
                Value::Mapping(nested) => walk(nested, prefix, out),
                other => out.push((prefix.clone(), other.clone())),
            }
            prefix.pop();
        }
    }
    let mut out = Vec::new();
    walk(map, &mut Vec::new(), &mut out);
    out
}

fn lookup<'a>(map: &'a Mapping, path: &[String]) -> Option<&'a Value> {
    let (first, rest) = path.split_first()?;
    let value = map.get(first)?;
    if rest.is_empty() {
        return Some(value);
    }
    match value {
        Value::Mapping(nested) => lookup(nested, rest),
        _ => None,
    }
}

// True when `incoming` replaces or removes the base leaf at `path`.
fn overridden(incoming: &Mapping, path: &[String]) -> bool {
    (1..=path.len()).any(|len| match lookup(incoming, &path[..len]) {
        Some(Value::Mapping(_)) => len == path.len(),
        Some(_) => true,
        None => false,
    })
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 2000,
        .. ProptestConfig::default()
    })]

    // Every leaf of the incoming layer survives unchanged.
    #[test]
    fn merge_incoming_leaves_win(base in mapping_strategy(), incoming in mapping_strategy()) {
        let merged = merge(base, incoming.clone());
        for (path, leaf) in leaves(&incoming) {
            prop_assert_eq!(lookup(&merged, &path), Some(&leaf));
        }
    }

    // Base leaves survive unless the incoming layer touches their path.
    #[test]
    fn merge_retains_untouched_base_leaves(
        base in mapping_strategy(),
        incoming in mapping_strategy(),
    ) {
        let merged = merge(base.clone(), incoming.clone());
        for (path, leaf) in leaves(&base) {
            if !overridden(&incoming, &path) {
                prop_assert_eq!(lookup(&merged, &path), Some(&leaf));
            }
        }
    }

    // Top-level keys are the union of both layers.
    #[test]
    fn merge_key_union(base in mapping_strategy(), incoming in mapping_strategy()) {
        let merged = merge(base.clone(), incoming.clone());
        let mut expected: Vec<&String> = base.keys().chain(incoming.keys()).collect();
        expected.sort();
        expected.dedup();
        prop_assert_eq!(merged.keys().collect::<Vec<_>>(), expected);
    }

    // Merging an empty layer on either side changes nothing.
    #[test]
    fn merge_empty_identity(map in mapping_strategy()) {
        prop_assert_eq!(merge(map.clone(), Mapping::new()), map.clone());
        prop_assert_eq!(merge(Mapping::new(), map.clone()), map);
    }

    // With consistent shapes, grouping of layers does not matter.
    #[test]
    fn merge_associative_for_consistent_shapes(
        a in layered_strategy(),
        b in layered_strategy(),
        c in layered_strategy()
    ) {
        let left = merge(merge(a.clone(), b.clone()), c.clone());
        let right = merge(a.clone(), merge(b.clone(), c.clone()));
        prop_assert_eq!(&left, &right);
        prop_assert_eq!(merge_all(vec![a, b, c]), left);
    }
}
