//! Layout compilation benchmarks for wordpack
//!
//! These benchmarks measure how compile time scales with schema size for
//! both packing strategies, including schemas dominated by unions.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use wordpack::{Compiler, FieldSpec, Kind, Schema, Strategy, StructureSpec};

const KINDS: [(Kind, u32); 6] = [
    (Kind::Bool, 1),
    (Kind::Byte, 5),
    (Kind::Short, 13),
    (Kind::Int, 27),
    (Kind::Long, 41),
    (Kind::Double, 64),
];

fn flat_schema(fields: usize) -> Schema {
    let spec = (0..fields).fold(StructureSpec::new("flat"), |spec, i| {
        let (kind, bits) = KINDS[i % KINDS.len()];
        spec.with_field(FieldSpec::new(format!("f{}", i), kind).with_bits(bits))
    });
    Schema::build(spec).unwrap()
}

fn union_schema(variants: usize) -> Schema {
    let union = (0..variants).fold(
        StructureSpec::union("shape").with_field(FieldSpec::byte("tag").as_metadata()),
        |spec, v| {
            let variant = (0..=v % 4).fold(StructureSpec::new(format!("v{}", v)), |s, i| {
                let (kind, bits) = KINDS[(v + i) % KINDS.len()];
                s.with_field(FieldSpec::new(format!("f{}", i), kind).with_bits(bits))
            });
            spec.with_child(variant)
        },
    );
    let spec = StructureSpec::new("root")
        .with_field(FieldSpec::int("id"))
        .with_child(union);
    Schema::build(spec).unwrap()
}

fn bench_flat_compile(c: &mut Criterion) {
    let mut group = c.benchmark_group("compile_flat");

    for fields in [8usize, 64, 512] {
        let schema = flat_schema(fields);
        for strategy in [Strategy::WordAligned, Strategy::BoundaryCrossing] {
            let compiler = Compiler::new(strategy);
            group.bench_with_input(
                BenchmarkId::new(format!("{:?}", strategy), fields),
                &schema,
                |b, schema| b.iter(|| compiler.compile(black_box(schema)).unwrap()),
            );
        }
    }

    group.finish();
}

fn bench_union_compile(c: &mut Criterion) {
    let mut group = c.benchmark_group("compile_union");

    for variants in [2usize, 16, 128] {
        let schema = union_schema(variants);
        let compiler = Compiler::word_aligned();
        group.bench_with_input(BenchmarkId::from_parameter(variants), &schema, |b, schema| {
            b.iter(|| compiler.compile(black_box(schema)).unwrap())
        });
    }

    group.finish();
}

criterion_group!(benches, bench_flat_compile, bench_union_compile);
criterion_main!(benches);
