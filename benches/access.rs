//! Field access benchmarks for wordpack
//!
//! These benchmarks measure selected-element reads and writes on the dense
//! storage, with and without a commit log, and on the sparse storage.

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use wordpack::{Compiler, FieldSpec, Layout, Schema, Store, StructureSpec};

const ELEMENTS: usize = 4096;

fn particle(compiler: Compiler) -> Arc<Layout> {
    let schema = Schema::build(
        StructureSpec::new("particle")
            .with_field(FieldSpec::bool("alive"))
            .with_field(FieldSpec::int("energy").with_bits(20))
            .with_field(FieldSpec::long("id").with_bits(40))
            .with_field(FieldSpec::float("mass")),
    )
    .unwrap();
    Arc::new(compiler.compile(&schema).unwrap())
}

fn bench_dense_access(c: &mut Criterion) {
    let mut group = c.benchmark_group("dense_access");
    group.throughput(Throughput::Elements(ELEMENTS as u64));

    for (name, compiler) in [
        ("aligned", Compiler::word_aligned()),
        ("crossing", Compiler::boundary_crossing()),
    ] {
        let layout = particle(compiler);
        let energy = layout.field("energy").unwrap();
        let id = layout.field("id").unwrap();
        let mut storage = layout.storage().capacity(ELEMENTS).build().unwrap();

        group.bench_function(format!("write_{}", name), |b| {
            b.iter(|| {
                for element in 0..ELEMENTS {
                    storage.select(element).unwrap();
                    storage.write_int(&energy, black_box(element as i32)).unwrap();
                    storage.write_long(&id, black_box(element as i64)).unwrap();
                }
            })
        });

        group.bench_function(format!("read_{}", name), |b| {
            b.iter(|| {
                let mut sum = 0i64;
                for element in 0..ELEMENTS {
                    storage.select(element).unwrap();
                    sum += storage.read_int(&energy).unwrap() as i64;
                    sum += storage.read_long(&id).unwrap();
                }
                black_box(sum)
            })
        });
    }

    group.finish();
}

fn bench_transactional_write(c: &mut Criterion) {
    let mut group = c.benchmark_group("transactional");
    group.throughput(Throughput::Elements(ELEMENTS as u64));

    let layout = particle(Compiler::word_aligned());
    let energy = layout.field("energy").unwrap();
    let mut storage = layout
        .storage()
        .capacity(ELEMENTS)
        .transactional(true)
        .build()
        .unwrap();
    let mut round = 0i32;

    group.bench_function("write_commit", |b| {
        b.iter(|| {
            round = round.wrapping_add(1) & 0xFFFF;
            for element in 0..ELEMENTS {
                storage.select(element).unwrap();
                storage.write_int(&energy, round).unwrap();
            }
            black_box(storage.commit().unwrap().len())
        })
    });

    group.finish();
}

fn bench_sparse_select(c: &mut Criterion) {
    let mut group = c.benchmark_group("sparse");
    group.throughput(Throughput::Elements(ELEMENTS as u64));

    let layout = particle(Compiler::word_aligned());
    let energy = layout.field("energy").unwrap();

    group.bench_function("insert_then_clear", |b| {
        b.iter(|| {
            let mut storage = layout.storage().build_sparse().unwrap();
            for element in 0..ELEMENTS {
                storage.select(element * 31).unwrap();
                storage.write_int(&energy, element as i32).unwrap();
            }
            for element in 0..ELEMENTS {
                storage.select(element * 31).unwrap();
                storage.clear().unwrap();
            }
            black_box(storage.capacity())
        })
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_dense_access,
    bench_transactional_write,
    bench_sparse_select
);
criterion_main!(benches);
