//! Tests for the schema module

use std::sync::Arc;

use super::*;
use crate::storage::Store;
use crate::types::{EnumConverter, Kind, OffsetConverter, Value};

#[derive(Debug)]
struct Constant;

impl VirtualMapper for Constant {
    fn read(&self, _owner: StructureId, _store: &dyn Store) -> eyre::Result<Value> {
        Ok(Value::Int(1))
    }

    fn write(&self, _value: Value, _owner: StructureId, _store: &mut dyn Store) -> eyre::Result<()> {
        Ok(())
    }
}

fn particle() -> StructureSpec {
    StructureSpec::new("particle")
        .with_field(FieldSpec::bool("alive"))
        .with_field(FieldSpec::int("energy").with_bits(20))
        .with_child(
            StructureSpec::new("position")
                .with_field(FieldSpec::short("x"))
                .with_field(FieldSpec::short("y")),
        )
        .with_child(
            StructureSpec::union("shape")
                .with_field(FieldSpec::byte("tag").as_metadata())
                .with_child(StructureSpec::new("dot").with_field(FieldSpec::byte("size")))
                .with_child(StructureSpec::new("rect").with_field(FieldSpec::long("extent"))),
        )
}

#[test]
fn build_interns_structures_parents_first() {
    let schema = Schema::build(particle()).unwrap();

    assert_eq!(schema.structure_count(), 5);
    assert_eq!(schema.field_count(), 7);
    let root = schema.structure(schema.root());
    assert_eq!(root.name(), "particle");
    assert_eq!(root.fields().len(), 2);
    assert_eq!(root.children().len(), 2);
    assert!(root.parent().is_none());
}

#[test]
fn paths_resolve_in_both_directions() {
    let schema = Schema::build(particle()).unwrap();

    let rect = schema.find_structure("shape.rect").unwrap();
    assert_eq!(schema.structure_path(rect), "shape.rect");
    let extent = schema.find_field("shape.rect.extent").unwrap();
    assert_eq!(schema.field_path(extent), "shape.rect.extent");
    let alive = schema.find_field("alive").unwrap();
    assert_eq!(schema.field_path(alive), "alive");
    assert!(schema.find_field("shape.oval.r").is_none());
    assert_eq!(schema.find_structure(""), Some(schema.root()));
}

#[test]
fn descendants_lists_parents_before_children() {
    let schema = Schema::build(particle()).unwrap();
    let order = schema.descendants(schema.root());
    assert_eq!(order.len(), 5);
    assert_eq!(order[0], schema.root());
    let shape = schema.find_structure("shape").unwrap();
    let dot = schema.find_structure("shape.dot").unwrap();
    let pos_shape = order.iter().position(|s| *s == shape).unwrap();
    let pos_dot = order.iter().position(|s| *s == dot).unwrap();
    assert!(pos_shape < pos_dot);
}

#[test]
fn duplicate_field_names_are_rejected() {
    let err = Schema::build(
        StructureSpec::new("s")
            .with_field(FieldSpec::int("a"))
            .with_field(FieldSpec::long("a")),
    )
    .unwrap_err();
    assert!(err.to_string().contains("duplicate name 'a'"));
}

#[test]
fn field_and_child_names_share_a_namespace() {
    let err = Schema::build(
        StructureSpec::new("s")
            .with_field(FieldSpec::int("a"))
            .with_child(StructureSpec::new("a").with_field(FieldSpec::int("b"))),
    )
    .unwrap_err();
    assert!(err.to_string().contains("duplicate"));
}

#[test]
fn reserved_discriminator_name_is_rejected() {
    let err = Schema::build(StructureSpec::new("s").with_field(FieldSpec::int("$variant")))
        .unwrap_err();
    assert!(err.to_string().contains("reserved"));
}

#[test]
fn width_wider_than_kind_is_rejected() {
    let err = Schema::build(StructureSpec::new("s").with_field(FieldSpec::byte("b").with_bits(9)))
        .unwrap_err();
    assert!(err.to_string().contains("9 bits"));
}

#[test]
fn narrowed_float_is_rejected() {
    assert!(
        Schema::build(StructureSpec::new("s").with_field(FieldSpec::float("f").with_bits(16)))
            .is_err()
    );
}

#[test]
fn converter_width_must_match_declared_width() {
    let conv = Arc::new(EnumConverter::new(["a", "b", "c"]).unwrap());
    let err = Schema::build(
        StructureSpec::new("s").with_field(FieldSpec::int("e").with_bits(5).with_converter(conv)),
    )
    .unwrap_err();
    assert!(err.to_string().contains("needs 2 bits"));
}

#[test]
fn converted_field_takes_kind_and_width_from_converter() {
    let conv = Arc::new(OffsetConverter::new(-8, 7).unwrap());
    let schema =
        Schema::build(StructureSpec::new("s").with_field(FieldSpec::converted("t", conv))).unwrap();
    let def = schema.field(schema.find_field("t").unwrap());
    assert_eq!(def.kind(), Kind::Int);
    assert_eq!(def.bits(), 4);
}

#[test]
fn metadata_outside_union_is_rejected() {
    let err = Schema::build(StructureSpec::new("s").with_field(FieldSpec::int("m").as_metadata()))
        .unwrap_err();
    assert!(err.to_string().contains("outside a union"));
}

#[test]
fn union_without_variants_is_rejected() {
    let err = Schema::build(
        StructureSpec::new("s")
            .with_child(StructureSpec::union("u").with_field(FieldSpec::int("m").as_metadata())),
    )
    .unwrap_err();
    assert!(err.to_string().contains("no variants"));
}

#[test]
fn union_variants_must_be_inline() {
    let err = Schema::build(
        StructureSpec::union("u")
            .with_list_child(StructureSpec::new("l").with_field(FieldSpec::int("x"))),
    )
    .unwrap_err();
    assert!(err.to_string().contains("must be inline"));
}

#[test]
fn globals_inside_union_are_rejected() {
    let err = Schema::build(
        StructureSpec::union("u")
            .with_child(StructureSpec::new("v").with_field(FieldSpec::int("g").global())),
    )
    .unwrap_err();
    assert!(err.to_string().contains("global field 'g'"));
}

#[test]
fn virtual_field_requires_mapper() {
    let err = Schema::build(
        StructureSpec::new("s").with_field(FieldSpec::int("v").with_category(Category::Virtual)),
    )
    .unwrap_err();
    assert!(err.to_string().contains("no mapper"));

    let ok = Schema::build(
        StructureSpec::new("s").with_field(FieldSpec::int("v").virtual_with(Arc::new(Constant))),
    );
    assert!(ok.is_ok());
}

#[test]
fn optional_default_must_fit() {
    let err = Schema::build(
        StructureSpec::new("s")
            .with_field(FieldSpec::int("o").with_bits(4).optional(Some(Value::Int(16)))),
    )
    .unwrap_err();
    assert!(err.to_string().contains("does not fit"));
}

#[test]
fn optional_default_falls_back_to_zero() {
    let schema = Schema::build(
        StructureSpec::new("s")
            .with_field(FieldSpec::short("a").optional(None))
            .with_field(FieldSpec::short("b").optional(Some(Value::Short(9)))),
    )
    .unwrap();
    let a = schema.field(schema.find_field("a").unwrap());
    let b = schema.field(schema.find_field("b").unwrap());
    assert_eq!(a.default_value(), Some(Value::Short(0)));
    assert_eq!(b.default_value(), Some(Value::Short(9)));
}

#[test]
fn object_fields_must_be_plain() {
    assert!(
        Schema::build(StructureSpec::new("s").with_field(FieldSpec::object("o").global())).is_err()
    );
    let schema =
        Schema::build(StructureSpec::new("s").with_field(FieldSpec::object("o"))).unwrap();
    let def = schema.field(schema.find_field("o").unwrap());
    assert!(!def.is_packed());
    assert_eq!(def.bits(), 0);
}

#[test]
fn of_kind_uses_closed_table() {
    let spec = FieldSpec::of_kind("x", 5).unwrap();
    let schema = Schema::build(StructureSpec::new("s").with_field(spec)).unwrap();
    assert_eq!(schema.field(schema.find_field("x").unwrap()).kind(), Kind::Long);
    assert!(FieldSpec::of_kind("x", 42).is_err());
}

#[test]
fn dotted_names_are_rejected() {
    assert!(Schema::build(StructureSpec::new("s").with_field(FieldSpec::int("a.b"))).is_err());
    assert!(Schema::build(StructureSpec::new("")).is_err());
}
