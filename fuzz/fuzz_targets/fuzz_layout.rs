//! Fuzz testing for the layout compiler.
//!
//! This fuzz target builds arbitrary nested schemas (including invalid
//! widths and names) and compiles them with both strategies. Schema errors
//! are fine; panics, overlapping fields and aligned fields crossing a word
//! are not.

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use wordpack::{Compiler, FieldSpec, Schema, Strategy, StructureSpec, Value};

#[derive(Debug, Arbitrary)]
struct LayoutInput {
    root: FuzzStructure,
}

#[derive(Debug, Arbitrary)]
struct FuzzStructure {
    union: bool,
    fields: Vec<FuzzField>,
    children: Vec<(FuzzChildKind, FuzzStructure)>,
}

#[derive(Debug, Arbitrary, Clone, Copy)]
enum FuzzChildKind {
    Nested,
    Optional,
    List,
}

#[derive(Debug, Arbitrary)]
struct FuzzField {
    kind: u8,
    bits: u8,
    category: FuzzCategory,
    metadata: bool,
}

#[derive(Debug, Arbitrary, Clone, Copy)]
enum FuzzCategory {
    Plain,
    Global,
    Optional,
}

fn to_spec(input: &FuzzStructure, name: String, depth: usize) -> Option<StructureSpec> {
    let mut spec = if input.union {
        StructureSpec::union(name)
    } else {
        StructureSpec::new(name)
    };
    for (i, field) in input.fields.iter().take(16).enumerate() {
        let mut f = FieldSpec::of_kind(format!("f{}", i), field.kind % 9).ok()?;
        if field.bits > 0 {
            f = f.with_bits(field.bits as u32);
        }
        f = match field.category {
            FuzzCategory::Plain => f,
            FuzzCategory::Global => f.global(),
            FuzzCategory::Optional => f.optional(None::<Value>),
        };
        if field.metadata {
            f = f.as_metadata();
        }
        spec = spec.with_field(f);
    }
    if depth < 4 {
        for (i, (kind, child)) in input.children.iter().take(4).enumerate() {
            let child = to_spec(child, format!("c{}", i), depth + 1)?;
            spec = match kind {
                FuzzChildKind::Nested => spec.with_child(child),
                FuzzChildKind::Optional => spec.with_optional_child(child),
                FuzzChildKind::List => spec.with_list_child(child),
            };
        }
    }
    Some(spec)
}

fuzz_target!(|input: LayoutInput| {
    let Some(spec) = to_spec(&input.root, "root".to_string(), 0) else {
        return;
    };
    let Ok(schema) = Schema::build(spec) else {
        return;
    };

    for strategy in [Strategy::WordAligned, Strategy::BoundaryCrossing] {
        let Ok(layout) = Compiler::new(strategy).compile(&schema) else {
            continue;
        };
        for home in layout.homes() {
            assert!(home.content_bits() <= home.words_per_element() as u32 * 64);
        }
        for field in layout.fields() {
            if let Some(offset) = field.offset() {
                let home = layout.home(field.home()).unwrap();
                assert!(offset + field.bits() <= home.words_per_element() as u32 * 64);
                if strategy == Strategy::WordAligned {
                    assert!(!field.crosses_word());
                }
            }
        }
        let _ = layout.to_string();
    }
});
