//! # Bit-Packed Storage
//!
//! This module stores arrays of compiled elements in flat `Vec<u64>` word
//! arrays and gives typed access to them through [`Field`] handles.
//!
//! ## Storage Variants
//!
//! | Type | Addressing | Capacity |
//! |------|------------|----------|
//! | [`PackedStorage`] | dense, `0..capacity` | explicit `resize` |
//! | [`SparseStorage`] | any logical `usize`, inserted on first select | [`SizingStrategy`] |
//! | [`CompositeStorage`] | sparse primary plus one sparse store per optional/list child | per store |
//!
//! All three implement [`Store`], so code written against `&mut dyn Store`
//! (virtual mappers, serializers, walkers) works with any of them.
//!
//! ## Element Geometry
//!
//! ```text
//! words: [ e0.w0 | e0.w1 | e1.w0 | e1.w1 | e2.w0 | ... ]
//!          └── words_per_element ──┘
//!
//! field at offset o in element e:
//!   abs = (e * words_per_element * 64) + o
//!   word = abs / 64, shift = abs % 64
//! ```
//!
//! Object fields live in a parallel `Vec<Option<ObjectRef>>` with
//! `object_slots` entries per element. Optional fields live in a sparse
//! `(element, slot) -> Value` map. Global fields live in a capacity-1
//! storage shared behind an `Arc<parking_lot::RwLock<_>>`.
//!
//! ## Selection
//!
//! Every access targets the *selected* element. Reading or writing with no
//! element selected is an error rather than an implicit element 0.
//!
//! ## Module Structure
//!
//! - `bits`: word-level masking, including the two-word crossing path
//! - `packed`: `PackedStorage`, the dense engine everything builds on
//! - `optional`: sparse store for optional field values
//! - `sparse`: `SparseStorage`, logical index indirection with compaction
//! - `sizing`: `SizingStrategy` and the built-in strategies
//! - `composite`: `CompositeStorage`, routing to optional/list child stores
//! - `builder`: `StorageBuilder`, the fluent configuration entry point
//! - `image`: `StorageImage`, a plain-data snapshot for serializers

mod bits;
mod builder;
mod composite;
mod image;
mod optional;
mod packed;
mod sizing;
mod sparse;


use std::sync::Arc;

use eyre::{eyre, Result};

use crate::compiler::{Field, Layout};
use crate::schema::StructureId;
use crate::transaction::ChangeRecord;
use crate::types::{Datum, Kind, ObjectRef, Value};

pub use builder::StorageBuilder;
pub use composite::CompositeStorage;
pub use image::StorageImage;
pub use packed::PackedStorage;
pub use sizing::{Doubling, Fixed, Linear, SizingStrategy};
pub use sparse::SparseStorage;

/// Uniform access to a storage of compiled elements.
pub trait Store: Send {
    fn layout(&self) -> &Arc<Layout>;

    /// Makes `index` the target of subsequent accesses. Returns whether the
    /// element already existed; dense storages always return `true`.
    fn select(&mut self, index: usize) -> Result<bool>;

    fn selected(&self) -> Option<usize>;

    /// Resets the selected element: packed bits and objects to zero,
    /// optional values to their defaults. Sparse storages remove it.
    fn clear(&mut self) -> Result<()>;

    fn read_value(&self, field: &Field) -> Result<Value>;

    /// Writes `value` and returns the value it replaced.
    fn write_value(&mut self, field: &Field, value: Value) -> Result<Value>;

    fn read_object(&self, field: &Field) -> Result<Option<ObjectRef>>;

    fn write_object(&mut self, field: &Field, value: Option<ObjectRef>)
        -> Result<Option<ObjectRef>>;

    /// Emits a record for every changed field since the last commit.
    fn commit(&mut self) -> Result<Vec<ChangeRecord>>;

    /// Restores every element touched since the last commit.
    fn rollback(&mut self) -> Result<()>;

    fn capacity(&self) -> usize;

    /// Number of addressable elements: capacity for dense storages, live
    /// elements for sparse ones.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn resize(&mut self, capacity: usize) -> Result<()>;

    crate::store_accessors! {
        bool: bool => Bool,
        byte: i8 => Byte,
        char: u16 => Char,
        short: i16 => Short,
        int: i32 => Int,
        long: i64 => Long,
        float: f32 => Float,
        double: f64 => Double,
    }

    /// Reads any field as its converter-mapped logical value.
    fn read_any(&self, field: &Field) -> Result<Datum> {
        if field.kind() == Kind::Object {
            return Ok(Datum::Object(self.read_object(field)?));
        }
        let value = self.read_value(field)?;
        self.layout()
            .field_def(field)
            .converter()
            .to_logical(value)
    }

    /// Writes a logical value through the field's converter and returns the
    /// previous logical value.
    fn write_any(&mut self, field: &Field, datum: &Datum) -> Result<Datum> {
        if field.kind() == Kind::Object {
            let object = match datum {
                Datum::Object(o) => o.clone(),
                other => eyre::bail!("object field needs an object datum, got {:?}", other),
            };
            return Ok(Datum::Object(self.write_object(field, object)?));
        }
        let converter = Arc::clone(self.layout().field_def(field).converter());
        let value = converter.from_logical(datum)?;
        let old = self.write_value(field, value)?;
        converter.to_logical(old)
    }

    /// Live variant of a union with a discriminator, `None` when unset.
    fn active_variant(&self, union: StructureId) -> Result<Option<usize>> {
        let disc = discriminator(self.layout(), union)?;
        let raw = self.read_value(&disc)?.as_i64();
        Ok(usize::try_from(raw).ok().and_then(|k| k.checked_sub(1)))
    }

    fn set_variant(&mut self, union: StructureId, variant: Option<usize>) -> Result<()> {
        let layout = Arc::clone(self.layout());
        let disc = discriminator(&layout, union)?;
        let raw = match variant {
            Some(k) => {
                let count = layout.variant_count(union);
                eyre::ensure!(
                    k < count,
                    "variant {} out of range, '{}' has {}",
                    k,
                    layout.schema().structure_path(union),
                    count
                );
                k as i32 + 1
            }
            None => 0,
        };
        self.write_value(&disc, Value::Int(raw))?;
        Ok(())
    }
}

fn discriminator(layout: &Layout, union: StructureId) -> Result<Field> {
    layout.discriminator(union).ok_or_else(|| {
        eyre!(
            "'{}' has no discriminator; only unions with metadata fields track a variant",
            layout.schema().structure_path(union)
        )
    })
}
