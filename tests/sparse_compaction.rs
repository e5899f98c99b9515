//! # Sparse Compaction Tests
//!
//! Removing any element from a sparse storage leaves the others reachable
//! under their logical indices with their values intact.

use std::collections::BTreeSet;
use std::sync::Arc;

use proptest::prelude::*;
use wordpack::{
    Compiler, Doubling, FieldSpec, Layout, Linear, Schema, SparseStorage, Store, StructureSpec,
    Value,
};

fn sensor() -> Arc<Layout> {
    let schema = Schema::build(
        StructureSpec::new("sensor")
            .with_field(FieldSpec::int("reading").with_bits(24))
            .with_field(FieldSpec::byte("unit").with_bits(3))
            .with_field(FieldSpec::object("meta"))
            .with_field(FieldSpec::short("gain").optional(Some(Value::Short(10)))),
    )
    .unwrap();
    Arc::new(Compiler::word_aligned().compile(&schema).unwrap())
}

fn fill(storage: &mut SparseStorage, layout: &Layout, indices: &[usize]) {
    let reading = layout.field("reading").unwrap();
    let gain = layout.field("gain").unwrap();
    let meta = layout.field("meta").unwrap();
    for logical in indices {
        storage.select(*logical).unwrap();
        storage.write_int(&reading, (*logical % 0xFFFFFF) as i32).unwrap();
        storage.write_short(&gain, (*logical % 1000) as i16).unwrap();
        storage
            .write_object(&meta, Some(Arc::new(*logical)))
            .unwrap();
    }
}

fn check(storage: &mut SparseStorage, layout: &Layout, logical: usize) {
    let reading = layout.field("reading").unwrap();
    let gain = layout.field("gain").unwrap();
    let meta = layout.field("meta").unwrap();
    assert!(storage.select(logical).unwrap());
    assert_eq!(storage.read_int(&reading).unwrap(), (logical % 0xFFFFFF) as i32);
    assert_eq!(storage.read_short(&gain).unwrap(), (logical % 1000) as i16);
    let object = storage.read_object(&meta).unwrap().unwrap();
    assert_eq!(object.downcast_ref::<usize>(), Some(&logical));
}

proptest! {
    #[test]
    fn removal_keeps_survivors_intact(
        indices in prop::collection::btree_set(0usize..100_000, 1..64),
        victim in any::<prop::sample::Index>(),
    ) {
        let layout = sensor();
        let indices: Vec<usize> = indices.into_iter().collect();
        let mut storage = layout
            .storage()
            .sizing(Doubling::new(4, 1 << 16).unwrap())
            .build_sparse()
            .unwrap();
        fill(&mut storage, &layout, &indices);

        let removed = indices[victim.index(indices.len())];
        storage.select(removed).unwrap();
        storage.clear().unwrap();

        prop_assert_eq!(storage.len(), indices.len() - 1);
        prop_assert!(!storage.contains(removed));
        let live: BTreeSet<usize> = storage.logical_indices().iter().copied().collect();
        let expected: BTreeSet<usize> = indices.iter().copied().filter(|i| *i != removed).collect();
        prop_assert_eq!(live, expected);
        for logical in indices.iter().filter(|i| **i != removed) {
            check(&mut storage, &layout, *logical);
        }
    }

    #[test]
    fn removing_everything_leaves_an_empty_storage(
        indices in prop::collection::btree_set(0usize..10_000, 1..40),
    ) {
        let layout = sensor();
        let indices: Vec<usize> = indices.into_iter().collect();
        let mut storage = layout.storage().build_sparse().unwrap();
        fill(&mut storage, &layout, &indices);

        for logical in indices.iter().rev() {
            prop_assert!(storage.remove(*logical).unwrap());
        }
        prop_assert!(storage.is_empty());
        prop_assert!(storage.capacity() >= 1);
        prop_assert!(!storage.remove(indices[0]).unwrap());
    }
}

#[test]
fn linear_sizing_grows_in_steps() {
    let layout = sensor();
    let mut storage = layout
        .storage()
        .sizing(Linear::new(5, 5, 50).unwrap())
        .build_sparse()
        .unwrap();
    let indices: Vec<usize> = (0..12).map(|i| i * 11).collect();
    fill(&mut storage, &layout, &indices);
    assert_eq!(storage.capacity(), 15);
    for logical in &indices {
        check(&mut storage, &layout, *logical);
    }
}

#[test]
fn removal_between_selections_keeps_other_selection_valid() {
    let layout = sensor();
    let reading = layout.field("reading").unwrap();
    let mut storage = layout.storage().build_sparse().unwrap();
    fill(&mut storage, &layout, &[3, 4, 5]);

    storage.select(5).unwrap();
    assert!(storage.remove(3).unwrap());
    assert_eq!(storage.selected(), Some(5));
    assert_eq!(storage.read_int(&reading).unwrap(), 5);
}

#[test]
fn large_default_initialized_storages_stay_consistent() {
    const ELEMENTS: usize = 40_000;
    let layout = sensor();
    let gain = layout.field("gain").unwrap();
    let reading = layout.field("reading").unwrap();

    let mut sparse = layout
        .storage()
        .default_init(true)
        .transactional(true)
        .build_sparse()
        .unwrap();
    for logical in 0..ELEMENTS {
        sparse.select(logical * 3).unwrap();
        sparse.write_int(&reading, logical as i32).unwrap();
    }
    assert_eq!(sparse.len(), ELEMENTS);
    assert_eq!(sparse.commit().unwrap().len(), ELEMENTS - 1);
    for logical in (0..ELEMENTS).step_by(997) {
        assert!(sparse.select(logical * 3).unwrap());
        assert_eq!(sparse.read_short(&gain).unwrap(), 10);
    }

    let mut dense = layout
        .storage()
        .capacity(ELEMENTS)
        .default_init(true)
        .transactional(true)
        .build()
        .unwrap();
    for element in 0..ELEMENTS {
        dense.select(element).unwrap();
        dense.write_short(&gain, 11).unwrap();
    }
    let records = dense.commit().unwrap();
    assert_eq!(records.len(), ELEMENTS);
    assert!(records.iter().all(|r| r.old == Value::Short(10) && r.new == Value::Short(11)));
}
