//! # Structure and Field Model
//!
//! This module describes the logical shape of stored elements before any
//! physical layout exists.
//!
//! ## Architecture
//!
//! ```text
//! StructureSpec / FieldSpec   (fluent, unvalidated)
//!         │
//!         │ Schema::build()   validates names, widths, converters, unions
//!         v
//! Schema arena                StructureDef[] + FieldDef[], indexed by id
//!         │
//!         │ Compiler::compile()
//!         v
//! Layout                      same ids, plus offsets/widths/homes
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use wordpack::schema::{FieldSpec, Schema, StructureSpec};
//!
//! let schema = Schema::build(
//!     StructureSpec::new("particle")
//!         .with_field(FieldSpec::bool("alive"))
//!         .with_field(FieldSpec::int("energy").with_bits(20))
//!         .with_child(
//!             StructureSpec::union("shape")
//!                 .with_field(FieldSpec::byte("tag").as_metadata())
//!                 .with_child(StructureSpec::new("dot").with_field(FieldSpec::byte("size")))
//!                 .with_child(StructureSpec::new("box").with_field(FieldSpec::long("extent"))),
//!         )
//!         .with_list_child(StructureSpec::new("trail").with_field(FieldSpec::short("x"))),
//! )?;
//! ```
//!
//! ## Module Structure
//!
//! - `field`: `FieldSpec`, `FieldDef`, `FieldId`, `Category`
//! - `structure`: `StructureSpec`, `StructureDef`, `StructureId`, `ChildKind`, `Schema`
//! - `mapper`: `VirtualMapper` for computed fields

mod field;
mod mapper;
mod structure;

#[cfg(test)]
mod tests;

pub use field::{Category, FieldDef, FieldId, FieldSpec};
pub use mapper::VirtualMapper;
pub use structure::{ChildKind, Schema, StructureDef, StructureId, StructureSpec};
