//! # Re-Materialization
//!
//! Turns packer output back into a [`Layout`]: absolute offsets for every
//! packed field, slots for optional and object fields, and a home for every
//! storage root.
//!
//! ## Pipeline
//!
//! ```text
//! Schema ──inject $variant──> working schema
//!    │
//!    ├── assign homes (primary, optional/list children, global)
//!    │
//!    ├── per home, children first:
//!    │     gather candidates ──> pack ──> walk buckets ──> Block
//!    │        │
//!    │        └── union child: compile each variant standalone (memoized),
//!    │            width = widest variant, candidate = one atomic unit
//!    │
//!    ├── global block: every Global field, packed on its own
//!    │
//!    └── structure widths, fixed point over the pending set
//! ```
//!
//! ## Metadata Hoisting
//!
//! Metadata fields of a union are shared by every variant, so they are not
//! part of the union block. They are packed as ordinary candidates of the
//! enclosing block, next to the union unit, together with the injected
//! discriminator `$variant` (`bit_length(variants)` bits, 0 = no variant,
//! `k` = variant `k - 1`). The working schema attaches the discriminator to
//! the union itself, so the compiled layout presents union, metadata and
//! discriminator as one structure.

use bumpalo::Bump;
use eyre::{bail, ensure, eyre, Result};
use hashbrown::HashMap;
use tracing::{debug, trace};

use crate::compiler::bucket::total_bits;
use crate::compiler::candidate::{Candidate, Unit};
use crate::compiler::layout::{Field, Home, HomeId, HomeKind, Layout, Location};
use crate::compiler::Packer;
use crate::config::WORD_BITS;
use crate::schema::{Category, ChildKind, FieldDef, FieldId, Schema, StructureId};
use crate::types::{bit_length, Kind};

#[derive(Debug, Default)]
struct Block {
    bits: u32,
    content: u32,
    placements: Vec<(FieldId, u32)>,
    unions: Vec<(StructureId, u32)>,
    bucket_fill: Vec<u32>,
}

#[derive(Debug)]
struct CompiledUnion {
    bits: u32,
    variants: Vec<Block>,
}

struct HomePlan {
    root: StructureId,
    kind: HomeKind,
    parent: Option<HomeId>,
}

pub(crate) fn compile(schema: &Schema, packer: &dyn Packer) -> Result<Layout> {
    let (schema, discriminators) = inject_discriminators(schema)?;
    let mut m = Materializer {
        schema: &schema,
        packer,
        arena: Bump::new(),
        unions: HashMap::new(),
        structure_bits: vec![None; schema.structure_count()],
        fields: vec![None; schema.field_count()],
        union_offsets: HashMap::new(),
    };

    let (plans, structure_home) = plan_homes(&schema);
    let mut homes = Vec::with_capacity(plans.len());
    for (i, plan) in plans.iter().enumerate().rev() {
        let id = HomeId(i as u32);
        let members: Vec<StructureId> = schema
            .descendants(plan.root)
            .into_iter()
            .filter(|s| structure_home[s.index()] == id)
            .collect();
        homes.push(m.compile_home(id, plan, &members)?);
    }
    homes.reverse();

    let globals = m.compile_globals()?;
    let structure_bits = m.resolve_widths()?;

    let mut fields = Vec::with_capacity(m.fields.len());
    for (i, field) in m.fields.iter().enumerate() {
        match field {
            Some(f) => fields.push(*f),
            None => bail!(
                "internal error: field '{}' was never placed",
                schema.field_path(FieldId(i as u32))
            ),
        }
    }
    let union_offsets = std::mem::take(&mut m.union_offsets);
    drop(m);

    debug!(
        root = %schema.structure(schema.root()).name(),
        strategy = ?packer.strategy(),
        homes = homes.len(),
        globals = globals.is_some(),
        primary_bits = homes[0].bits,
        "compiled layout"
    );

    Ok(Layout {
        schema,
        strategy: packer.strategy(),
        fields,
        homes,
        globals,
        structure_bits,
        structure_home,
        union_offsets,
        discriminators,
    })
}

/// Clones the schema and attaches `$variant` to every union that declares
/// metadata fields.
fn inject_discriminators(schema: &Schema) -> Result<(Schema, HashMap<StructureId, FieldId>)> {
    let mut working = schema.clone();
    let mut discriminators = HashMap::new();

    let unions: Vec<StructureId> = schema
        .structures()
        .filter(|(_, s)| s.is_union())
        .filter(|(_, s)| s.fields().iter().any(|f| schema.field(*f).is_metadata()))
        .map(|(id, _)| id)
        .collect();

    for union in unions {
        let def = schema.structure(union);
        let variants = def
            .fields()
            .iter()
            .filter(|f| !schema.field(**f).is_metadata())
            .count()
            + def.children().len();
        let bits = bit_length(variants as u64).max(1);
        let id = working.push_field(FieldDef::discriminator(union, bits))?;
        working.attach_field(union, id);
        discriminators.insert(union, id);
        trace!(union = %schema.structure_path(union), bits, variants, "injected discriminator");
    }
    Ok((working, discriminators))
}

fn plan_homes(schema: &Schema) -> (Vec<HomePlan>, Vec<HomeId>) {
    let mut plans = vec![HomePlan {
        root: schema.root(),
        kind: HomeKind::Primary,
        parent: None,
    }];
    let mut structure_home = vec![HomeId::PRIMARY; schema.structure_count()];

    for id in schema.descendants(schema.root()).into_iter().skip(1) {
        let def = schema.structure(id);
        let parent_home = match def.parent() {
            Some(parent) => structure_home[parent.index()],
            None => HomeId::PRIMARY,
        };
        structure_home[id.index()] = match def.kind() {
            ChildKind::Inline => parent_home,
            detached => {
                let home = HomeId(plans.len() as u32);
                plans.push(HomePlan {
                    root: id,
                    kind: if detached == ChildKind::List {
                        HomeKind::List
                    } else {
                        HomeKind::Optional
                    },
                    parent: Some(parent_home),
                });
                home
            }
        };
    }
    (plans, structure_home)
}

struct Materializer<'s> {
    schema: &'s Schema,
    packer: &'s dyn Packer,
    arena: Bump,
    unions: HashMap<StructureId, CompiledUnion>,
    structure_bits: Vec<Option<u32>>,
    fields: Vec<Option<Field>>,
    union_offsets: HashMap<StructureId, u32>,
}

impl Materializer<'_> {
    fn compile_home(&mut self, id: HomeId, plan: &HomePlan, members: &[StructureId]) -> Result<Home> {
        let schema = self.schema;
        let block = self.compile_block(plan.root)?;
        self.arena.reset();

        if !schema.structure(plan.root).is_union() {
            self.structure_bits[plan.root.index()] = Some(block.bits);
        }
        for (union, offset) in &block.unions {
            self.union_offsets.insert(*union, *offset);
        }

        let mut index = 0u32;
        let mut stored = Vec::new();
        for (field, offset) in &block.placements {
            self.place(*field, id, Location::Packed { offset: *offset }, index);
            stored.push(*field);
            index += 1;
        }

        let mut objects = 0u32;
        let mut optionals = 0u32;
        let mut virtuals = Vec::new();
        for structure in members {
            for field in schema.structure(*structure).fields() {
                let def = schema.field(*field);
                let location = match (def.category(), def.kind()) {
                    (Category::Global, _) => continue,
                    (Category::Virtual, _) => {
                        virtuals.push(*field);
                        Location::Virtual
                    }
                    (Category::Optional, _) => {
                        optionals += 1;
                        stored.push(*field);
                        Location::Optional { slot: optionals - 1 }
                    }
                    (Category::Plain, Kind::Object) => {
                        objects += 1;
                        stored.push(*field);
                        Location::Object { slot: objects - 1 }
                    }
                    (Category::Plain, _) => continue,
                };
                self.place(*field, id, location, index);
                index += 1;
            }
        }

        let words = block.bits.div_ceil(WORD_BITS) as usize;
        debug!(
            home = %id,
            root = %schema.structure_path(plan.root),
            bits = block.bits,
            words,
            padding = words as u32 * WORD_BITS - block.content,
            "compiled home"
        );

        Ok(Home {
            id,
            root: plan.root,
            kind: plan.kind,
            parent: plan.parent,
            bits: block.bits,
            content_bits: block.content,
            words_per_element: words,
            objects: objects as usize,
            optionals: optionals as usize,
            fields: stored,
            virtuals,
            bucket_fill: block.bucket_fill,
        })
    }

    fn compile_globals(&mut self) -> Result<Option<Home>> {
        let candidates: Vec<Candidate> = self
            .schema
            .fields()
            .filter(|(_, def)| def.category() == Category::Global)
            .map(|(id, def)| Candidate::field(id, def.bits(), self.schema.field_path(id)))
            .collect();
        if candidates.is_empty() {
            return Ok(None);
        }

        let block = self.pack_block(&candidates)?;
        self.arena.reset();

        let mut stored = Vec::with_capacity(block.placements.len());
        for (index, (field, offset)) in block.placements.iter().enumerate() {
            self.place(
                *field,
                HomeId::GLOBAL,
                Location::Packed { offset: *offset },
                index as u32,
            );
            stored.push(*field);
        }
        let words = block.bits.div_ceil(WORD_BITS) as usize;
        debug!(fields = stored.len(), bits = block.bits, words, "compiled global block");

        Ok(Some(Home {
            id: HomeId::GLOBAL,
            root: self.schema.root(),
            kind: HomeKind::Global,
            parent: None,
            bits: block.bits,
            content_bits: block.content,
            words_per_element: words,
            objects: 0,
            optionals: 0,
            fields: stored,
            virtuals: Vec::new(),
            bucket_fill: block.bucket_fill,
        }))
    }

    fn place(&mut self, id: FieldId, home: HomeId, location: Location, index: u32) {
        let def = self.schema.field(id);
        self.fields[id.index()] = Some(Field {
            id,
            kind: def.kind(),
            bits: def.bits(),
            home,
            location,
            index,
            owner: def.owner(),
        });
    }

    /// Compiles one structure on its own: a home root or a union variant.
    fn compile_block(&mut self, id: StructureId) -> Result<Block> {
        let mut candidates = Vec::new();
        if self.schema.structure(id).is_union() {
            self.union_candidates(id, &mut candidates)?;
        } else {
            self.gather(id, &mut candidates)?;
        }
        self.pack_block(&candidates)
    }

    /// Flattens a non-union structure and its inline children into
    /// candidates. Detached children belong to other homes.
    fn gather(&mut self, id: StructureId, out: &mut Vec<Candidate>) -> Result<()> {
        let schema = self.schema;
        let def = schema.structure(id);
        for field in def.fields() {
            let fd = schema.field(*field);
            if fd.is_packed() {
                out.push(Candidate::field(*field, fd.bits(), schema.field_path(*field)));
            }
        }
        for child in def.children() {
            let cd = schema.structure(*child);
            if cd.kind().is_detached() {
                continue;
            }
            if cd.is_union() {
                self.union_candidates(*child, out)?;
            } else {
                self.gather(*child, out)?;
            }
        }
        Ok(())
    }

    /// Hoisted metadata (discriminator included) plus the atomic union unit.
    fn union_candidates(&mut self, union: StructureId, out: &mut Vec<Candidate>) -> Result<()> {
        let schema = self.schema;
        for field in schema.structure(union).fields() {
            let fd = schema.field(*field);
            if fd.is_metadata() {
                out.push(Candidate::field(*field, fd.bits(), schema.field_path(*field)));
            }
        }
        let bits = self.compile_union(union)?;
        out.push(Candidate::union(union, bits, schema.structure_path(union)));
        Ok(())
    }

    fn compile_union(&mut self, union: StructureId) -> Result<u32> {
        if let Some(compiled) = self.unions.get(&union) {
            return Ok(compiled.bits);
        }
        let schema = self.schema;
        let def = schema.structure(union);

        let mut variants = Vec::with_capacity(def.fields().len() + def.children().len());
        for field in def.fields() {
            let fd = schema.field(*field);
            if fd.is_metadata() {
                continue;
            }
            let single = [Candidate::field(*field, fd.bits(), schema.field_path(*field))];
            variants.push(self.pack_block(&single)?);
        }
        for child in def.children() {
            let block = self.compile_block(*child)?;
            if !schema.structure(*child).is_union() {
                self.structure_bits[child.index()] = Some(block.bits);
            }
            variants.push(block);
        }

        let bits = variants.iter().map(|v| v.bits).max().unwrap_or(0);
        self.structure_bits[union.index()] = Some(bits);
        trace!(
            union = %schema.structure_path(union),
            variants = variants.len(),
            bits,
            "compiled union standalone"
        );
        self.unions.insert(union, CompiledUnion { bits, variants });
        Ok(bits)
    }

    /// Packs candidates and walks the buckets in order, expanding union
    /// units through the memo table.
    fn pack_block(&self, candidates: &[Candidate]) -> Result<Block> {
        let buckets = self.packer.pack(&self.arena, candidates)?;
        let mut block = Block::default();

        for (i, bucket) in buckets.iter().enumerate() {
            bucket.padding()?;
            block.bucket_fill.push(bucket.size);
            let base = i as u32 * WORD_BITS;
            for slot in &bucket.slots {
                let Some(idx) = slot.candidate else {
                    continue;
                };
                let offset = base + slot.offset;
                match candidates[idx].unit {
                    Unit::Field(field) => block.placements.push((field, offset)),
                    Unit::Union(union) => {
                        let compiled = self.unions.get(&union).ok_or_else(|| {
                            eyre!(
                                "internal error: union '{}' with no matching compiled entry",
                                self.schema.structure_path(union)
                            )
                        })?;
                        block.unions.push((union, offset));
                        for variant in &compiled.variants {
                            block
                                .placements
                                .extend(variant.placements.iter().map(|(f, o)| (*f, offset + o)));
                            block
                                .unions
                                .extend(variant.unions.iter().map(|(u, o)| (*u, offset + o)));
                        }
                    }
                }
            }
        }

        block.bits = total_bits(&buckets);
        block.content = candidates.iter().map(|c| c.bits).sum();
        ensure!(
            block.bits >= block.content,
            "internal error: negative padding, {} bits packed into {}",
            block.content,
            block.bits
        );
        Ok(block)
    }

    /// Widths of structures absorbed into a parent block: own packed fields
    /// plus inline children, resolved once every inline child is known.
    fn resolve_widths(&mut self) -> Result<Vec<u32>> {
        let schema = self.schema;
        let mut pending: Vec<StructureId> = schema
            .structures()
            .filter(|(id, _)| self.structure_bits[id.index()].is_none())
            .map(|(id, _)| id)
            .collect();

        while !pending.is_empty() {
            let before = pending.len();
            let mut still = Vec::with_capacity(pending.len());
            for id in pending {
                match self.absorbed_width(id) {
                    Some(bits) => self.structure_bits[id.index()] = Some(bits),
                    None => still.push(id),
                }
            }
            if still.len() == before {
                let names: Vec<String> = still.iter().map(|s| schema.structure_path(*s)).collect();
                bail!("cannot resolve dependency cycle among structures {:?}", names);
            }
            pending = still;
        }

        self.structure_bits
            .iter()
            .enumerate()
            .map(|(i, bits)| {
                bits.ok_or_else(|| {
                    eyre!(
                        "internal error: structure '{}' has no width",
                        schema.structure_path(StructureId(i as u32))
                    )
                })
            })
            .collect()
    }

    fn absorbed_width(&self, id: StructureId) -> Option<u32> {
        let schema = self.schema;
        let def = schema.structure(id);
        let mut bits: u32 = def
            .fields()
            .iter()
            .map(|f| schema.field(*f))
            .filter(|f| f.is_packed())
            .map(|f| f.bits())
            .sum();
        for child in def.children() {
            let cd = schema.structure(*child);
            if cd.kind().is_detached() {
                continue;
            }
            bits += self.structure_bits[child.index()]?;
            if cd.is_union() {
                bits += cd
                    .fields()
                    .iter()
                    .map(|f| schema.field(*f))
                    .filter(|f| f.is_metadata())
                    .map(|f| f.bits())
                    .sum::<u32>();
            }
        }
        Some(bits)
    }
}
