//! # wordpack - Schema-Driven Bit-Packed Storage
//!
//! wordpack stores large arrays of structured elements in flat `u64` word
//! arrays. A schema describes the element (primitive fields with explicit
//! bit widths, nested structures, unions, optional and list children); the
//! layout compiler bin-packs it into 64-bit words; storages give typed,
//! selected-element access with optional commit/rollback tracking.
//!
//! - **Dense**: an element with a `bool`, a 20-bit int and a byte uses 29
//!   bits, one word per element instead of a padded struct
//! - **Flat**: no per-element allocation, resize is one `Vec::resize`
//! - **Checked**: every field handle is validated against its layout and
//!   kind; mismatches are errors, never silent conversions
//!
//! ## Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use wordpack::{Compiler, FieldSpec, Schema, Store, StructureSpec};
//!
//! let schema = Schema::build(
//!     StructureSpec::new("particle")
//!         .with_field(FieldSpec::bool("alive"))
//!         .with_field(FieldSpec::int("energy").with_bits(20))
//!         .with_field(FieldSpec::byte("kind")),
//! )?;
//! let layout = Arc::new(Compiler::word_aligned().compile(&schema)?);
//! let energy = layout.field("energy")?;
//!
//! let mut storage = layout.storage().capacity(1024).transactional(true).build()?;
//! storage.select(7)?;
//! storage.write_int(&energy, 12)?;
//! for change in storage.commit()? {
//!     println!("{} @{}: {} -> {}", change.kind(), change.element, change.old, change.new);
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │  schema      StructureSpec / FieldSpec        │
//! │              -> Schema (interned, validated)  │
//! ├─────────────────────────────────────────────┤
//! │  compiler    WordAligned | BoundaryCrossing   │
//! │              -> Layout (fields, homes, widths)│
//! ├─────────────────────────────────────────────┤
//! │  storage     PackedStorage (dense)            │
//! │              SparseStorage (logical indices)  │
//! │              CompositeStorage (child homes)   │
//! ├─────────────────────────────────────────────┤
//! │  transaction CommitLog, Snapshot, ChangeRecord│
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Module Overview
//!
//! - [`config`]: limits and defaults
//! - [`types`]: `Kind`, `Value`, `Datum`, converters
//! - [`schema`]: structure and field declarations, virtual mappers
//! - [`compiler`]: bin packing into a [`Layout`]
//! - [`storage`]: the [`Store`] trait and its three implementations
//! - [`transaction`]: dirty tracking and change records
//!
//! ## Concurrency
//!
//! A storage is a plain owned value: `&mut` for writes, shareable by `&` for
//! reads. Independent storages of one `Arc<Layout>` can live on different
//! threads. The only state shared between storages is a global block, held
//! behind `parking_lot::RwLock`.

#[macro_use]
mod macros;

pub mod compiler;
pub mod config;
pub mod schema;
pub mod storage;
pub mod transaction;
pub mod types;

pub use compiler::{Compiler, Field, Home, HomeId, HomeKind, Layout, Location, Strategy};
pub use schema::{
    Category, ChildKind, FieldDef, FieldId, FieldSpec, Schema, StructureDef, StructureId,
    StructureSpec, VirtualMapper,
};
pub use storage::{
    CompositeStorage, Doubling, Fixed, Linear, PackedStorage, SizingStrategy, SparseStorage,
    StorageBuilder, StorageImage, Store,
};
pub use transaction::{ChangeRecord, ElementState};
pub use types::{
    Converter, Datum, EnumConverter, IdentityConverter, Kind, ObjectRef, OffsetConverter, Value,
};
