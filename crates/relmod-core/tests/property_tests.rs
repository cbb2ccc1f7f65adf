//! # Property-Based Tests
//!
//! Invariants of the ordered container and determinism of navigation,
//! verified with proptest.

use proptest::collection::vec;
use proptest::prelude::*;
use relmod_core::{AssociationEnd, MetaModel, OrderedSet, QuerySet, Value};
use std::collections::BTreeSet;

/// First-occurrence dedup, the expected iteration order of an OrderedSet.
fn dedup_preserving_order(values: &[u32]) -> Vec<u32> {
    let mut seen = BTreeSet::new();
    values
        .iter()
        .copied()
        .filter(|v| seen.insert(*v))
        .collect()
}

// =============================================================================
// ORDERED SET PROPERTIES
// =============================================================================

proptest! {
    /// Iteration order equals first-insertion order of unique elements.
    #[test]
    fn iteration_matches_insertion_order(values in vec(0u32..100, 0..50)) {
        let set: OrderedSet<u32> = values.iter().copied().collect();
        let order: Vec<_> = set.iter().collect();
        prop_assert_eq!(order, dedup_preserving_order(&values));
    }

    /// Adding every element a second time changes nothing.
    #[test]
    fn add_is_idempotent(values in vec(0u32..100, 0..50)) {
        let once: OrderedSet<u32> = values.iter().copied().collect();
        let mut twice = once.clone();
        for v in &values {
            twice.add(*v);
        }
        prop_assert_eq!(once, twice);
    }

    /// Reverse iteration is forward iteration reversed.
    #[test]
    fn reverse_is_mirror_of_forward(values in vec(0u32..100, 0..50)) {
        let set: OrderedSet<u32> = values.iter().copied().collect();
        let mut forward: Vec<_> = set.iter().collect();
        forward.reverse();
        let backward: Vec<_> = set.iter_reversed().collect();
        prop_assert_eq!(forward, backward);
    }

    /// Discarding elements preserves the relative order of survivors.
    #[test]
    fn discard_preserves_survivor_order(
        values in vec(0u32..100, 0..50),
        removed in vec(0u32..100, 0..20)
    ) {
        let mut set: OrderedSet<u32> = values.iter().copied().collect();
        for v in &removed {
            set.discard(*v);
        }
        let gone: BTreeSet<u32> = removed.iter().copied().collect();
        let expected: Vec<_> = dedup_preserving_order(&values)
            .into_iter()
            .filter(|v| !gone.contains(v))
            .collect();
        let order: Vec<_> = set.iter().collect();
        prop_assert_eq!(order, expected);
    }

    /// Union starts with the left operand's order and adds unseen elements
    /// of the right operand in order.
    #[test]
    fn union_order_and_bounds(
        left in vec(0u32..100, 0..30),
        right in vec(0u32..100, 0..30)
    ) {
        let a: OrderedSet<u32> = left.iter().copied().collect();
        let b: OrderedSet<u32> = right.iter().copied().collect();
        let u = &a | &b;

        prop_assert!(u.len() >= a.len().max(b.len()));
        prop_assert!(u.len() <= a.len() + b.len());

        let combined: Vec<u32> = left.iter().chain(right.iter()).copied().collect();
        let order: Vec<_> = u.iter().collect();
        prop_assert_eq!(order, dedup_preserving_order(&combined));
    }

    /// Popping from the front drains the set in insertion order.
    #[test]
    fn pop_front_drains_in_order(values in vec(0u32..100, 1..30)) {
        let mut set: OrderedSet<u32> = values.iter().copied().collect();
        let mut drained = Vec::new();
        while let Ok(v) = set.pop(false) {
            drained.push(v);
        }
        prop_assert!(set.is_empty());
        prop_assert_eq!(drained, dedup_preserving_order(&values));
    }
}

// =============================================================================
// NAVIGATION PROPERTIES
// =============================================================================

proptest! {
    /// Repeated navigation of an unchanged model returns identical results,
    /// whether answered from the scan or from the cache.
    #[test]
    fn navigation_is_deterministic(order_numbers in vec(0i64..5, 1..30)) {
        let mut model = MetaModel::new();
        model
            .define_class("Order", &[("Number", "integer")])
            .expect("define");
        model
            .define_class("Item", &[("Order_Number", "integer")])
            .expect("define");
        model
            .define_association(
                1,
                &AssociationEnd::one("Order", &["Number"]),
                &AssociationEnd::many("Item", &["Order_Number"]),
            )
            .expect("associate");

        let order = model
            .new_with("Order", vec![Value::Integer(0)], Vec::new())
            .expect("new")
            .expect("instance");
        for n in &order_numbers {
            model
                .new_with("Item", vec![Value::Integer(*n)], Vec::new())
                .expect("new");
        }

        let first = model
            .navigate_many(order)
            .to("Item", 1)
            .expect("hop")
            .select();
        let second = model
            .navigate_many(order)
            .to("Item", 1)
            .expect("hop")
            .select();
        prop_assert_eq!(&first, &second);

        let expected = order_numbers.iter().filter(|&&n| n == 0).count();
        prop_assert_eq!(first.set().map(QuerySet::len), Some(expected));
    }
}
