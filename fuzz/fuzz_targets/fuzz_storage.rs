//! Fuzz testing for storage operations.
//!
//! This fuzz target drives a sparse transactional storage with arbitrary
//! select/write/clear/commit/rollback sequences and checks it against a
//! simple map model after every commit.

#![no_main]

use std::collections::HashMap;
use std::sync::Arc;

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use wordpack::{Compiler, FieldSpec, Schema, Store, StructureSpec, Value};

#[derive(Debug, Arbitrary)]
enum StorageOperation {
    Select(u16),
    WriteCount(i32),
    WriteTotal(i64),
    Clear,
    Commit,
    Rollback,
}

fuzz_target!(|ops: Vec<StorageOperation>| {
    let schema = Schema::build(
        StructureSpec::new("cell")
            .with_field(FieldSpec::int("count").with_bits(11))
            .with_field(FieldSpec::long("total").with_bits(50)),
    )
    .unwrap();
    let layout = Arc::new(Compiler::boundary_crossing().compile(&schema).unwrap());
    let count = layout.field("count").unwrap();
    let total = layout.field("total").unwrap();
    let mut storage = layout.storage().transactional(true).build_sparse().unwrap();

    let mut model: HashMap<u16, (i32, i64)> = HashMap::new();
    let mut selected: Option<u16> = None;

    for op in ops.into_iter().take(512) {
        match op {
            StorageOperation::Select(index) => {
                storage.select(index as usize).unwrap();
                model.entry(index).or_insert((0, 0));
                selected = Some(index);
            }
            StorageOperation::WriteCount(v) => {
                let result = storage.write_int(&count, v);
                match selected {
                    Some(index) => {
                        result.unwrap();
                        model.get_mut(&index).unwrap().0 = v & 0x7FF;
                    }
                    None => assert!(result.is_err()),
                }
            }
            StorageOperation::WriteTotal(v) => {
                let result = storage.write_long(&total, v);
                match selected {
                    Some(index) => {
                        result.unwrap();
                        model.get_mut(&index).unwrap().1 = v & ((1 << 50) - 1);
                    }
                    None => assert!(result.is_err()),
                }
            }
            StorageOperation::Clear => {
                let result = storage.clear();
                match selected.take() {
                    Some(index) => {
                        result.unwrap();
                        model.remove(&index);
                    }
                    None => assert!(result.is_err()),
                }
            }
            StorageOperation::Commit => {
                storage.commit().unwrap();
            }
            StorageOperation::Rollback => {
                // Rollback restores values only; the model is rebuilt from
                // the storage itself.
                storage.rollback().unwrap();
                let mut last = None;
                for (index, values) in model.iter_mut() {
                    storage.select(*index as usize).unwrap();
                    *values = (
                        storage.read_int(&count).unwrap(),
                        storage.read_long(&total).unwrap(),
                    );
                    last = Some(*index);
                }
                match selected {
                    Some(index) => {
                        storage.select(index as usize).unwrap();
                    }
                    None => selected = last,
                }
            }
        }
    }

    assert_eq!(storage.len(), model.len());
    for (index, (c, t)) in &model {
        storage.select(*index as usize).unwrap();
        assert_eq!(storage.read_value(&count).unwrap(), Value::Int(*c));
        assert_eq!(storage.read_value(&total).unwrap(), Value::Long(*t));
    }
});
