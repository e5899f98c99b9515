//! # Compiled Layout
//!
//! The output of [`Compiler::compile`](super::Compiler::compile): the
//! original schema (with union discriminators attached) plus, for every
//! field, a copyable [`Field`] handle that says exactly where its value
//! lives.
//!
//! ## Homes
//!
//! Every storage root is a *home* with its own element width:
//!
//! ```text
//! HomeId::PRIMARY (0)   the schema root and its inline children
//! HomeId(1..)           one per optional/list child, preorder
//! HomeId::GLOBAL        every Global field, capacity-1 block
//! ```
//!
//! ## Locations
//!
//! | Location | Meaning |
//! |----------|---------|
//! | `Packed { offset }` | absolute bit offset inside the home's element |
//! | `Optional { slot }` | key into the home's sparse value store |
//! | `Object { slot }` | index into the home's per-element object array |
//! | `Virtual` | no storage, routed to the field's mapper |
//!
//! A packed field at `offset` occupies bits `offset % 64 ..` of word
//! `offset / 64` of the element, continuing into the next word when
//! `offset % 64 + bits > 64` (boundary-crossing layouts only).

use std::fmt;
use std::sync::Arc;

use eyre::{eyre, Result};
use hashbrown::HashMap;

use crate::compiler::Strategy;
use crate::config::WORD_BITS;
use crate::schema::{FieldDef, FieldId, Schema, StructureDef, StructureId};
use crate::storage::StorageBuilder;
use crate::types::Kind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HomeId(pub(crate) u32);

impl HomeId {
    pub const PRIMARY: HomeId = HomeId(0);
    pub const GLOBAL: HomeId = HomeId(u32::MAX);

    pub fn index(&self) -> usize {
        self.0 as usize
    }

    pub fn is_global(&self) -> bool {
        *self == Self::GLOBAL
    }
}

impl fmt::Display for HomeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_global() {
            write!(f, "global")
        } else {
            write!(f, "home#{}", self.0)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Location {
    Packed { offset: u32 },
    Optional { slot: u32 },
    Object { slot: u32 },
    Virtual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HomeKind {
    Primary,
    Optional,
    List,
    Global,
}

/// Compiled handle for one field. Cheap to copy and hand to storages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Field {
    pub(crate) id: FieldId,
    pub(crate) kind: Kind,
    pub(crate) bits: u32,
    pub(crate) home: HomeId,
    pub(crate) location: Location,
    pub(crate) index: u32,
    pub(crate) owner: StructureId,
}

impl Field {
    pub fn id(&self) -> FieldId {
        self.id
    }

    pub fn kind(&self) -> Kind {
        self.kind
    }

    pub fn bits(&self) -> u32 {
        self.bits
    }

    pub fn home(&self) -> HomeId {
        self.home
    }

    pub fn location(&self) -> Location {
        self.location
    }

    /// Position in compile order within the home; commit records follow it.
    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn owner(&self) -> StructureId {
        self.owner
    }

    pub fn is_global(&self) -> bool {
        self.home.is_global()
    }

    pub fn offset(&self) -> Option<u32> {
        match self.location {
            Location::Packed { offset } => Some(offset),
            _ => None,
        }
    }

    /// Word within the element holding the field's lowest bit.
    pub fn word(&self) -> Option<usize> {
        self.offset().map(|o| (o / WORD_BITS) as usize)
    }

    /// Bit position of the field's lowest bit within [`word`](Self::word).
    pub fn shift(&self) -> Option<u32> {
        self.offset().map(|o| o % WORD_BITS)
    }

    pub fn crosses_word(&self) -> bool {
        match self.shift() {
            Some(shift) => shift + self.bits > WORD_BITS,
            None => false,
        }
    }
}

/// One storage root and its element geometry.
#[derive(Debug, Clone)]
pub struct Home {
    pub(crate) id: HomeId,
    pub(crate) root: StructureId,
    pub(crate) kind: HomeKind,
    pub(crate) parent: Option<HomeId>,
    pub(crate) bits: u32,
    pub(crate) content_bits: u32,
    pub(crate) words_per_element: usize,
    pub(crate) objects: usize,
    pub(crate) optionals: usize,
    pub(crate) fields: Vec<FieldId>,
    pub(crate) virtuals: Vec<FieldId>,
    pub(crate) bucket_fill: Vec<u32>,
}

impl Home {
    pub fn id(&self) -> HomeId {
        self.id
    }

    pub fn root(&self) -> StructureId {
        self.root
    }

    pub fn kind(&self) -> HomeKind {
        self.kind
    }

    pub fn parent(&self) -> Option<HomeId> {
        self.parent
    }

    /// Packed width of one element, `(buckets - 1) * 64 + last fill`.
    pub fn bits(&self) -> u32 {
        self.bits
    }

    /// Sum of the widths of everything packed, i.e. `bits - padding`.
    pub fn content_bits(&self) -> u32 {
        self.content_bits
    }

    pub fn padding_bits(&self) -> u32 {
        (self.words_per_element as u32 * WORD_BITS).saturating_sub(self.content_bits)
    }

    pub fn words_per_element(&self) -> usize {
        self.words_per_element
    }

    pub fn object_slots(&self) -> usize {
        self.objects
    }

    pub fn optional_slots(&self) -> usize {
        self.optionals
    }

    /// Stored fields (packed, optional, object) in index order.
    pub fn fields(&self) -> &[FieldId] {
        &self.fields
    }

    pub fn virtuals(&self) -> &[FieldId] {
        &self.virtuals
    }

    /// Fill level of each 64-bit word as the packer left it.
    pub fn bucket_fill(&self) -> &[u32] {
        &self.bucket_fill
    }
}

#[derive(Debug, Clone)]
pub struct Layout {
    pub(crate) schema: Schema,
    pub(crate) strategy: Strategy,
    pub(crate) fields: Vec<Field>,
    pub(crate) homes: Vec<Home>,
    pub(crate) globals: Option<Home>,
    pub(crate) structure_bits: Vec<u32>,
    pub(crate) structure_home: Vec<HomeId>,
    pub(crate) union_offsets: HashMap<StructureId, u32>,
    pub(crate) discriminators: HashMap<StructureId, FieldId>,
}

impl Layout {
    /// Starts configuring a storage for this layout.
    pub fn storage(self: &Arc<Self>) -> StorageBuilder {
        StorageBuilder::new(Arc::clone(self))
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    pub fn field(&self, path: &str) -> Result<Field> {
        self.schema
            .find_field(path)
            .map(|id| self.fields[id.index()])
            .ok_or_else(|| eyre!("no field '{}' in structure '{}'", path, self.root_name()))
    }

    pub fn field_by_id(&self, id: FieldId) -> Result<Field> {
        self.fields
            .get(id.index())
            .copied()
            .ok_or_else(|| eyre!("field id {} is not part of this layout", id.index()))
    }

    pub fn field_def(&self, field: &Field) -> &FieldDef {
        self.schema.field(field.id)
    }

    pub fn fields(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter()
    }

    pub fn structure(&self, path: &str) -> Result<StructureId> {
        self.schema
            .find_structure(path)
            .ok_or_else(|| eyre!("no structure '{}' in '{}'", path, self.root_name()))
    }

    pub fn structure_def(&self, id: StructureId) -> &StructureDef {
        self.schema.structure(id)
    }

    /// Compiled width of a structure. Unions report the widest variant.
    pub fn bits(&self, id: StructureId) -> u32 {
        self.structure_bits[id.index()]
    }

    /// Space a structure reserves: unions wider than a word round up to
    /// whole words, home roots to their element width.
    pub fn reserved_bits(&self, id: StructureId) -> u32 {
        let bits = self.bits(id);
        let def = self.schema.structure(id);
        if def.is_union() && bits > WORD_BITS {
            return bits.div_ceil(WORD_BITS) * WORD_BITS;
        }
        match self.homes.iter().find(|h| h.root == id) {
            Some(home) => home.words_per_element as u32 * WORD_BITS,
            None => bits,
        }
    }

    pub fn structure_home(&self, id: StructureId) -> HomeId {
        self.structure_home[id.index()]
    }

    /// Bit offset of a union block within its home's element.
    pub fn union_offset(&self, id: StructureId) -> Option<u32> {
        self.union_offsets.get(&id).copied()
    }

    pub fn home(&self, id: HomeId) -> Result<&Home> {
        if id.is_global() {
            return self
                .globals
                .as_ref()
                .ok_or_else(|| eyre!("layout '{}' has no global fields", self.root_name()));
        }
        self.homes
            .get(id.index())
            .ok_or_else(|| eyre!("{} is not part of this layout", id))
    }

    pub fn homes(&self) -> &[Home] {
        &self.homes
    }

    pub fn primary(&self) -> &Home {
        &self.homes[HomeId::PRIMARY.index()]
    }

    pub fn globals(&self) -> Option<&Home> {
        self.globals.as_ref()
    }

    /// The injected `$variant` field of a union with metadata fields.
    pub fn discriminator(&self, union: StructureId) -> Option<Field> {
        self.discriminators
            .get(&union)
            .map(|id| self.fields[id.index()])
    }

    /// Variants of a union: its non-metadata fields, then its children.
    pub fn variant_count(&self, union: StructureId) -> usize {
        let def = self.schema.structure(union);
        if !def.is_union() {
            return 0;
        }
        let fields = def
            .fields()
            .iter()
            .filter(|f| !self.schema.field(**f).is_metadata())
            .count();
        fields + def.children().len()
    }

    /// Name of variant `k` of a union, in declaration order.
    pub fn variant_name(&self, union: StructureId, k: usize) -> Option<&str> {
        let def = self.schema.structure(union);
        let mut fields = def
            .fields()
            .iter()
            .map(|f| self.schema.field(*f))
            .filter(|f| !f.is_metadata())
            .map(|f| f.name());
        let count = fields.clone().count();
        if k < count {
            return fields.nth(k);
        }
        def.children()
            .get(k - count)
            .map(|c| self.schema.structure(*c).name())
    }

    fn root_name(&self) -> &str {
        self.schema.structure(self.schema.root()).name()
    }

    fn write_home(&self, f: &mut fmt::Formatter<'_>, home: &Home) -> fmt::Result {
        writeln!(
            f,
            "{} root='{}' {:?}: {} bits in {} words ({} content, {} padding), {} objects, {} optionals",
            home.id,
            self.schema.structure_path(home.root),
            home.kind,
            home.bits,
            home.words_per_element,
            home.content_bits,
            home.padding_bits(),
            home.objects,
            home.optionals
        )?;
        for id in home.fields.iter().chain(home.virtuals.iter()) {
            let field = &self.fields[id.index()];
            let location = match field.location {
                Location::Packed { offset } => format!(
                    "word {:>3} bit {:>2}{}",
                    offset / WORD_BITS,
                    offset % WORD_BITS,
                    if field.crosses_word() { " (crosses)" } else { "" }
                ),
                Location::Optional { slot } => format!("optional slot {}", slot),
                Location::Object { slot } => format!("object slot {}", slot),
                Location::Virtual => "virtual".to_string(),
            };
            writeln!(
                f,
                "  #{:<3} {:<32} {:<6} {:>2} bits  {}",
                field.index,
                self.schema.field_path(field.id),
                field.kind,
                field.bits,
                location
            )?;
        }
        Ok(())
    }
}

impl fmt::Display for Layout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "layout '{}' ({:?})", self.root_name(), self.strategy)?;
        for home in &self.homes {
            self.write_home(f, home)?;
        }
        if let Some(globals) = &self.globals {
            self.write_home(f, globals)?;
        }
        Ok(())
    }
}
