//! # Structure Arena
//!
//! A schema is a tree of named structures. Rather than a tree of owned nodes
//! with parent back-pointers, every structure and field is interned into one
//! arena per schema and referenced by index ([`StructureId`], [`FieldId`]).
//! Ids are stable: the ids handed out by [`Schema::build`] stay valid in the
//! compiled [`Layout`](crate::compiler::Layout).
//!
//! ## Child Kinds
//!
//! | Kind | Storage |
//! |------|---------|
//! | **Inline** | absorbed into the parent's packed element |
//! | **Optional** | detached home, at most one child per parent element |
//! | **List** | detached home, dense positions `0..len` per parent element |
//!
//! ## Unions
//!
//! A union's inline children and its non-metadata fields are its variants:
//! exactly one is live, all share space sized to the largest. Fields marked
//! metadata belong to every variant and are packed outside the union block.
//!
//! ## Paths
//!
//! Structures and fields are addressed by dotted paths relative to the root,
//! e.g. `shape.circle.radius`. The root itself has the empty path.

use eyre::{bail, ensure, Result};
use hashbrown::HashSet;

use crate::config::PATH_SEPARATOR;
use crate::schema::field::validate_name;
use crate::schema::{Category, FieldDef, FieldId, FieldSpec};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StructureId(pub(crate) u32);

impl StructureId {
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ChildKind {
    #[default]
    Inline,
    Optional,
    List,
}

impl ChildKind {
    pub fn is_detached(&self) -> bool {
        !matches!(self, ChildKind::Inline)
    }
}

#[derive(Debug, Clone)]
pub struct StructureSpec {
    name: String,
    union: bool,
    fields: Vec<FieldSpec>,
    children: Vec<(ChildKind, StructureSpec)>,
}

impl StructureSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            union: false,
            fields: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn union(name: impl Into<String>) -> Self {
        Self {
            union: true,
            ..Self::new(name)
        }
    }

    pub fn with_field(mut self, field: FieldSpec) -> Self {
        self.fields.push(field);
        self
    }

    pub fn with_fields(mut self, fields: impl IntoIterator<Item = FieldSpec>) -> Self {
        self.fields.extend(fields);
        self
    }

    pub fn with_child(mut self, child: StructureSpec) -> Self {
        self.children.push((ChildKind::Inline, child));
        self
    }

    pub fn with_optional_child(mut self, child: StructureSpec) -> Self {
        self.children.push((ChildKind::Optional, child));
        self
    }

    pub fn with_list_child(mut self, child: StructureSpec) -> Self {
        self.children.push((ChildKind::List, child));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_union(&self) -> bool {
        self.union
    }
}

#[derive(Debug, Clone)]
pub struct StructureDef {
    name: String,
    union: bool,
    kind: ChildKind,
    parent: Option<StructureId>,
    fields: Vec<FieldId>,
    children: Vec<StructureId>,
}

impl StructureDef {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_union(&self) -> bool {
        self.union
    }

    pub fn kind(&self) -> ChildKind {
        self.kind
    }

    pub fn parent(&self) -> Option<StructureId> {
        self.parent
    }

    pub fn fields(&self) -> &[FieldId] {
        &self.fields
    }

    pub fn children(&self) -> &[StructureId] {
        &self.children
    }
}

#[derive(Debug, Clone)]
pub struct Schema {
    structures: Vec<StructureDef>,
    fields: Vec<FieldDef>,
    root: StructureId,
}

impl Schema {
    /// Validates a structure tree and interns it into an arena.
    pub fn build(spec: StructureSpec) -> Result<Self> {
        let mut schema = Self {
            structures: Vec::new(),
            fields: Vec::new(),
            root: StructureId(0),
        };
        schema.root = schema.intern(spec, None, ChildKind::Inline, false)?;
        Ok(schema)
    }

    fn intern(
        &mut self,
        spec: StructureSpec,
        parent: Option<StructureId>,
        kind: ChildKind,
        in_variant: bool,
    ) -> Result<StructureId> {
        validate_name(&spec.name, "structure")?;
        ensure!(
            self.structures.len() < u32::MAX as usize,
            "schema has too many structures"
        );

        let id = StructureId(self.structures.len() as u32);
        self.structures.push(StructureDef {
            name: spec.name.clone(),
            union: spec.union,
            kind,
            parent,
            fields: Vec::with_capacity(spec.fields.len()),
            children: Vec::with_capacity(spec.children.len()),
        });

        let mut names = HashSet::with_capacity(spec.fields.len() + spec.children.len());
        let mut variants = 0usize;

        for field in spec.fields {
            ensure!(
                names.insert(field.name().to_string()),
                "duplicate name '{}' in structure '{}'",
                field.name(),
                spec.name
            );
            let def = field.into_def(id)?;
            if def.is_metadata() {
                ensure!(
                    spec.union,
                    "metadata field '{}' declared outside a union in '{}'",
                    def.name(),
                    spec.name
                );
                ensure!(
                    def.is_packed(),
                    "metadata field '{}' of union '{}' must be a plain primitive",
                    def.name(),
                    spec.name
                );
            } else if spec.union {
                ensure!(
                    def.is_packed(),
                    "variant field '{}' of union '{}' must be a plain primitive, not {:?} {}",
                    def.name(),
                    spec.name,
                    def.category(),
                    def.kind()
                );
                variants += 1;
            }
            if in_variant || spec.union {
                ensure!(
                    def.category() != Category::Global,
                    "global field '{}' cannot live inside union '{}'",
                    def.name(),
                    spec.name
                );
            }
            let field_id = self.push_field(def)?;
            self.structures[id.index()].fields.push(field_id);
        }

        for (child_kind, child) in spec.children {
            ensure!(
                names.insert(child.name.clone()),
                "duplicate name '{}' in structure '{}'",
                child.name,
                spec.name
            );
            if spec.union {
                ensure!(
                    child_kind == ChildKind::Inline,
                    "union '{}' variant '{}' must be inline, not {:?}",
                    spec.name,
                    child.name,
                    child_kind
                );
                variants += 1;
            }
            let nested_variant = (in_variant || spec.union) && !child_kind.is_detached();
            let child_id = self.intern(child, Some(id), child_kind, nested_variant)?;
            self.structures[id.index()].children.push(child_id);
        }

        if spec.union && variants == 0 {
            bail!("union '{}' has no variants", spec.name);
        }

        Ok(id)
    }

    pub(crate) fn push_field(&mut self, def: FieldDef) -> Result<FieldId> {
        ensure!(self.fields.len() < u32::MAX as usize, "schema has too many fields");
        let id = FieldId(self.fields.len() as u32);
        self.fields.push(def);
        Ok(id)
    }

    pub(crate) fn attach_field(&mut self, owner: StructureId, field: FieldId) {
        self.structures[owner.index()].fields.push(field);
    }

    pub fn root(&self) -> StructureId {
        self.root
    }

    pub fn structure(&self, id: StructureId) -> &StructureDef {
        &self.structures[id.index()]
    }

    pub fn field(&self, id: FieldId) -> &FieldDef {
        &self.fields[id.index()]
    }

    pub fn structures(&self) -> impl Iterator<Item = (StructureId, &StructureDef)> {
        self.structures
            .iter()
            .enumerate()
            .map(|(i, s)| (StructureId(i as u32), s))
    }

    pub fn fields(&self) -> impl Iterator<Item = (FieldId, &FieldDef)> {
        self.fields
            .iter()
            .enumerate()
            .map(|(i, f)| (FieldId(i as u32), f))
    }

    pub fn structure_count(&self) -> usize {
        self.structures.len()
    }

    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    /// Dotted path of a structure relative to the root.
    pub fn structure_path(&self, id: StructureId) -> String {
        let mut parts = Vec::new();
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            if current == self.root {
                break;
            }
            let def = self.structure(current);
            parts.push(def.name.as_str());
            cursor = def.parent;
        }
        parts.reverse();
        parts.join(&PATH_SEPARATOR.to_string())
    }

    pub fn field_path(&self, id: FieldId) -> String {
        let def = self.field(id);
        let owner = self.structure_path(def.owner());
        if owner.is_empty() {
            def.name().to_string()
        } else {
            format!("{}{}{}", owner, PATH_SEPARATOR, def.name())
        }
    }

    pub fn find_structure(&self, path: &str) -> Option<StructureId> {
        let mut current = self.root;
        if path.is_empty() {
            return Some(current);
        }
        for part in path.split(PATH_SEPARATOR) {
            current = *self
                .structure(current)
                .children
                .iter()
                .find(|c| self.structure(**c).name == part)?;
        }
        Some(current)
    }

    pub fn find_field(&self, path: &str) -> Option<FieldId> {
        let (owner, name) = match path.rsplit_once(PATH_SEPARATOR) {
            Some((owner, name)) => (self.find_structure(owner)?, name),
            None => (self.root, path),
        };
        self.structure(owner)
            .fields
            .iter()
            .copied()
            .find(|f| self.field(*f).name() == name)
    }

    /// All structures below `id` (inclusive), parents before children.
    pub fn descendants(&self, id: StructureId) -> Vec<StructureId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            out.push(current);
            stack.extend(self.structure(current).children.iter().rev().copied());
        }
        out
    }
}
