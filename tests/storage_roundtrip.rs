//! # Storage Round-Trip Tests
//!
//! Every value written to every element reads back as the same bit pattern,
//! truncated to the field width, with both packing strategies.

use std::sync::Arc;

use proptest::prelude::*;
use wordpack::{
    Compiler, FieldSpec, Kind, Layout, Schema, Store, Strategy as Packing, StructureSpec, Value,
};

fn arb_field() -> impl Strategy<Value = (Kind, u32)> {
    prop_oneof![
        Just((Kind::Bool, 1)),
        (1u32..=8).prop_map(|b| (Kind::Byte, b)),
        (1u32..=16).prop_map(|b| (Kind::Char, b)),
        (1u32..=16).prop_map(|b| (Kind::Short, b)),
        (1u32..=32).prop_map(|b| (Kind::Int, b)),
        (1u32..=64).prop_map(|b| (Kind::Long, b)),
        Just((Kind::Float, 32)),
        Just((Kind::Double, 64)),
    ]
}

fn build_layout(fields: &[(Kind, u32)], strategy: Packing) -> Arc<Layout> {
    let spec = fields
        .iter()
        .enumerate()
        .fold(StructureSpec::new("row"), |spec, (i, (kind, bits))| {
            spec.with_field(FieldSpec::new(format!("f{}", i), *kind).with_bits(*bits))
        });
    Arc::new(
        Compiler::new(strategy)
            .compile(&Schema::build(spec).unwrap())
            .unwrap(),
    )
}

fn pattern(seed: u64, element: usize, field: usize) -> u64 {
    seed.rotate_left((element * 7 + field * 13) as u32) ^ (element as u64 * 0x9E37_79B9)
}

proptest! {
    #[test]
    fn values_round_trip_at_every_element(
        fields in prop::collection::vec(arb_field(), 1..12),
        capacity in 1usize..24,
        seed in any::<u64>(),
        crossing in any::<bool>(),
    ) {
        let strategy = if crossing { Packing::BoundaryCrossing } else { Packing::WordAligned };
        let layout = build_layout(&fields, strategy);
        let handles: Vec<_> = (0..fields.len())
            .map(|i| layout.field(&format!("f{}", i)).unwrap())
            .collect();
        let mut storage = layout.storage().capacity(capacity).build().unwrap();

        for element in 0..capacity {
            storage.select(element).unwrap();
            for (i, field) in handles.iter().enumerate() {
                let value = Value::from_bits(field.kind(), pattern(seed, element, i)).unwrap();
                storage.write_value(field, value).unwrap();
            }
        }
        for element in 0..capacity {
            storage.select(element).unwrap();
            for (i, field) in handles.iter().enumerate() {
                let expected = Value::from_bits(field.kind(), pattern(seed, element, i))
                    .unwrap()
                    .truncated(field.bits());
                let read = storage.read_value(field).unwrap();
                prop_assert!(
                    read.same_bits(&expected),
                    "element {} field {}: read {:?}, expected {:?}",
                    element, i, read, expected
                );
            }
        }
    }

    #[test]
    fn fresh_storage_reads_zero(
        fields in prop::collection::vec(arb_field(), 1..12),
        capacity in 1usize..16,
    ) {
        let layout = build_layout(&fields, Packing::WordAligned);
        let storage_words = layout.storage().capacity(capacity).build().unwrap();
        prop_assert!(storage_words.words().iter().all(|w| *w == 0));

        let mut storage = storage_words;
        for element in 0..capacity {
            storage.select(element).unwrap();
            for field in layout.fields() {
                let read = storage.read_value(field).unwrap();
                prop_assert!(read.same_bits(&Value::zero(field.kind()).unwrap()));
            }
        }
    }

    #[test]
    fn resize_preserves_surviving_elements(
        fields in prop::collection::vec(arb_field(), 1..8),
        capacity in 1usize..16,
        resized in 1usize..32,
        seed in any::<u64>(),
    ) {
        let layout = build_layout(&fields, Packing::BoundaryCrossing);
        let handles: Vec<_> = layout.fields().copied().collect();
        let mut storage = layout.storage().capacity(capacity).build().unwrap();
        for element in 0..capacity {
            storage.select(element).unwrap();
            for (i, field) in handles.iter().enumerate() {
                let value = Value::from_bits(field.kind(), pattern(seed, element, i)).unwrap();
                storage.write_value(field, value).unwrap();
            }
        }

        storage.resize(resized).unwrap();
        prop_assert_eq!(storage.capacity(), resized);
        for element in 0..resized {
            storage.select(element).unwrap();
            for (i, field) in handles.iter().enumerate() {
                let read = storage.read_value(field).unwrap();
                let expected = if element < capacity {
                    Value::from_bits(field.kind(), pattern(seed, element, i))
                        .unwrap()
                        .truncated(field.bits())
                } else {
                    Value::zero(field.kind()).unwrap()
                };
                prop_assert!(read.same_bits(&expected));
            }
        }
    }
}

#[test]
fn long_fields_use_the_full_word() {
    let layout = build_layout(&[(Kind::Long, 64), (Kind::Long, 64)], Packing::WordAligned);
    let a = layout.field("f0").unwrap();
    let b = layout.field("f1").unwrap();
    let mut storage = layout.storage().capacity(2).build().unwrap();
    storage.select(1).unwrap();
    storage.write_long(&a, -1).unwrap();
    storage.write_long(&b, i64::MIN).unwrap();

    assert_eq!(storage.words(), &[0, 0, u64::MAX, 1 << 63]);
}

#[test]
fn sub_width_integers_are_zero_extended() {
    let layout = build_layout(&[(Kind::Int, 5)], Packing::WordAligned);
    let f = layout.field("f0").unwrap();
    let mut storage = layout.storage().capacity(1).build().unwrap();
    storage.select(0).unwrap();
    storage.write_int(&f, -1).unwrap();
    assert_eq!(storage.read_int(&f).unwrap(), 31);
}
