//! Registry: append order, traversal, keyed lookup, truncation.

use std::collections::HashSet;

use crate::common::{pairs_registry, runtime_globals, table_registry, LE64};
use rtdbg::registry::{CONTRACT_DEFINES, CONTRACT_FIELDS, CONTRACT_GLOBALS, GLOBALS_TYPE};
use rtdbg::{ObjectShape, PointerWidth, Registry};

#[test]
fn test_n_pairs_traverse_exactly_once() {
    for n in [0, 1, 2, 17, 300] {
        let registry = pairs_registry(n);
        let mut seen = HashSet::new();
        for (id, _) in registry.types() {
            assert!(seen.insert(id), "entry {:?} visited twice", id);
        }
        assert_eq!(seen.len(), n);
    }
}

#[test]
fn test_traversal_is_reverse_registration_order() {
    let registry = pairs_registry(5);
    let names: Vec<&str> = registry.types().map(|(_, e)| e.type_name()).collect();
    assert_eq!(names, ["Type4", "Type3", "Type2", "Type1", "Type0"]);
}

#[test]
fn test_every_pair_retrievable_in_any_order() {
    let mut forward = Registry::new();
    let mut backward = Registry::new();
    let pairs: Vec<(String, String, u32)> = (0..50)
        .map(|i| (format!("T{}", i % 7), format!("f{}", i), i * 4))
        .collect();
    for (t, f, o) in &pairs {
        forward.register_field(t.clone(), f.clone(), *o);
    }
    for (t, f, o) in pairs.iter().rev() {
        backward.register_field(t.clone(), f.clone(), *o);
    }
    for (t, f, o) in &pairs {
        assert_eq!(forward.field(t, f), Some(*o));
        assert_eq!(backward.field(t, f), Some(*o));
    }
}

#[test]
fn test_duplicate_key_latest_wins() {
    let mut registry = Registry::new();
    registry.register_field("EEType", "m_usFlags", 2);
    registry.register_field("EEType", "m_usFlags", 6);
    assert_eq!(registry.field("EEType", "m_usFlags"), Some(6));
    // Both entries stay in the list
    assert_eq!(registry.type_count(), 2);
}

#[test]
fn test_fixed_table_registered() {
    let registry = table_registry(LE64, &runtime_globals());
    let shape = ObjectShape::new(PointerWidth::Eight);
    for fact in CONTRACT_FIELDS {
        assert_eq!(
            registry.field(fact.type_name, fact.field_name),
            Some(fact.offset_for(&shape)),
            "{}.{}",
            fact.type_name,
            fact.field_name
        );
    }
    for define in CONTRACT_DEFINES {
        assert_eq!(registry.define(define.name), Some(define.value_for(&shape)));
        assert_eq!(registry.field(GLOBALS_TYPE, define.name), Some(define.value_for(&shape)));
    }
    for name in CONTRACT_GLOBALS {
        assert!(registry.global(name).is_some(), "{}", name);
    }
    assert_eq!(registry.size_of("Array"), Some(16));
}

#[test]
fn test_missing_globals_left_out() {
    let registry = table_registry(LE64, &rtdbg::RuntimeGlobals::new());
    assert_eq!(registry.global_count(), 0);
    assert!(registry.globals_head().is_none());
    assert!(registry.types_head().is_some());
}

#[test]
fn test_budget_drops_without_failing() {
    let mut registry = Registry::with_budget(2);
    assert!(registry.register_field("A", "x", 0).is_some());
    assert!(registry.register_global("g", 0x10).is_some());
    assert!(registry.register_field("B", "y", 4).is_none());
    assert!(registry.register_size("B", 8).is_none());
    assert!(registry.is_truncated());
    assert_eq!(registry.dropped(), 2);
    assert_eq!(registry.field("A", "x"), Some(0));
    assert_eq!(registry.size_of("B"), None);
}
