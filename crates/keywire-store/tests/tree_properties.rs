//! Property-based tests for the (a,b)-tree engine.
//!
//! Random operation sequences are replayed against a reference
//! `BTreeMap`; after every single operation the tree must agree with the
//! reference and hold every structural invariant.

use std::collections::BTreeMap;

use keywire_proto::Value;
use keywire_store::AbTree;
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Op {
    Add(String, i32),
    Remove(String),
    Find(String),
}

/// Small key universe so operations collide often enough to exercise
/// overwrites, rotations, and merges.
fn arbitrary_key() -> impl Strategy<Value = String> {
    (0u8..24).prop_map(|n| format!("k{n:02}"))
}

fn arbitrary_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (arbitrary_key(), any::<i32>()).prop_map(|(key, value)| Op::Add(key, value)),
        arbitrary_key().prop_map(Op::Remove),
        arbitrary_key().prop_map(Op::Find),
    ]
}

fn arbitrary_params() -> impl Strategy<Value = (usize, usize)> {
    (2usize..=4).prop_flat_map(|a| (Just(a), (2 * a - 1)..=(2 * a + 2)))
}

proptest! {
    #[test]
    fn tree_agrees_with_reference_map(
        (a, b) in arbitrary_params(),
        ops in prop::collection::vec(arbitrary_op(), 1..200),
    ) {
        let mut tree = AbTree::new(a, b).expect("valid parameters");
        let mut reference: BTreeMap<String, i32> = BTreeMap::new();

        for op in ops {
            match op {
                Op::Add(key, value) => {
                    let replaced = tree.insert(key.clone(), Value::Int(value));
                    let expected = reference.insert(key, value);
                    prop_assert_eq!(replaced, expected.map(Value::Int));
                },
                Op::Remove(key) => {
                    let removed = tree.remove(&key);
                    let expected = reference.remove(&key);
                    prop_assert_eq!(removed, expected.map(Value::Int));
                },
                Op::Find(key) => {
                    let found = tree.find(&key).cloned();
                    let expected = reference.get(&key).copied();
                    prop_assert_eq!(found, expected.map(Value::Int));
                },
            }

            prop_assert_eq!(tree.len(), reference.len());
            let check = tree.check_invariants();
            prop_assert!(check.is_ok(), "structural check failed: {check:?}");
        }

        // Every reachable pair matches the reference at the end.
        for (key, value) in &reference {
            prop_assert_eq!(tree.find(key), Some(&Value::Int(*value)));
        }
    }

    #[test]
    fn find_returns_the_latest_written_value(
        key in arbitrary_key(),
        first in any::<i32>(),
        second in any::<i32>(),
    ) {
        let mut tree = AbTree::new(2, 3).expect("valid parameters");
        tree.insert(key.clone(), Value::Int(first));
        tree.insert(key.clone(), Value::Int(second));
        prop_assert_eq!(tree.find(&key), Some(&Value::Int(second)));
    }

    #[test]
    fn remove_then_find_is_none(
        keys in prop::collection::vec(arbitrary_key(), 1..32),
        victim_idx in any::<prop::sample::Index>(),
    ) {
        let mut tree = AbTree::new(2, 3).expect("valid parameters");
        for key in &keys {
            tree.insert(key.clone(), Value::Bool(true));
        }

        let victim = &keys[victim_idx.index(keys.len())];
        tree.remove(victim);
        prop_assert_eq!(tree.find(victim), None);
    }

    #[test]
    fn draining_all_keys_empties_the_tree(
        keys in prop::collection::vec(arbitrary_key(), 1..64),
    ) {
        let mut tree = AbTree::new(2, 3).expect("valid parameters");
        for key in &keys {
            tree.insert(key.clone(), Value::Text(key.clone()));
        }
        for key in &keys {
            tree.remove(key);
        }

        prop_assert!(tree.is_empty());
        prop_assert_eq!(tree.depth(), 0);
    }

    #[test]
    fn removing_an_absent_key_changes_nothing(
        keys in prop::collection::vec(arbitrary_key(), 1..32),
    ) {
        let mut tree = AbTree::new(2, 3).expect("valid parameters");
        for key in &keys {
            tree.insert(key.clone(), Value::Text(key.clone()));
        }

        let before = tree.topology();
        // "zz" sorts after every generated key and is never inserted.
        prop_assert_eq!(tree.remove("zz"), None);
        prop_assert_eq!(tree.topology(), before);
    }
}
