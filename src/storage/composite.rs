//! # Composite Storage
//!
//! A sparse primary storage plus one sparse storage per detached child home
//! (optional and list children). Field access routes by the field's home:
//!
//! ```text
//! CompositeStorage
//!     ├── primary: SparseStorage          HomeId(0) and global fields
//!     ├── children[0]: ChildStore         HomeId(1), owned by HomeId(0)
//!     │     keys: (owner, position) -> key
//!     └── children[1]: ChildStore         HomeId(2), owned by HomeId(1)
//! ```
//!
//! A child element is addressed by its owner (the selected element of the
//! parent home) and a position: always 0 for optional children, `0..len`
//! for lists. Each child element gets an internal key that never changes
//! while it lives; the key is its logical index in the child's sparse
//! storage and is what commit records report as `element`.
//!
//! Removing an owner removes everything it owns, recursively. Removing a
//! list entry shifts the following positions down so `0..len` stays dense.

use std::sync::Arc;

use eyre::{bail, ensure, eyre, Result};
use hashbrown::HashMap;
use tracing::trace;

use crate::compiler::{Field, HomeId, HomeKind, Layout};
use crate::schema::StructureId;
use crate::storage::{SparseStorage, Store};
use crate::transaction::ChangeRecord;
use crate::types::{ObjectRef, Value};

#[derive(Debug)]
struct ChildStore {
    home: HomeId,
    parent: HomeId,
    kind: HomeKind,
    storage: SparseStorage,
    keys: HashMap<(usize, usize), usize>,
    owners: HashMap<usize, (usize, usize)>,
    lens: HashMap<usize, usize>,
    next_key: usize,
    selected: Option<usize>,
}

impl ChildStore {
    fn len_of(&self, owner: usize) -> usize {
        self.lens.get(&owner).copied().unwrap_or(0)
    }
}

#[derive(Debug)]
pub struct CompositeStorage {
    layout: Arc<Layout>,
    primary: SparseStorage,
    children: Vec<ChildStore>,
}

impl CompositeStorage {
    pub(crate) fn new(
        layout: Arc<Layout>,
        primary: SparseStorage,
        storages: Vec<SparseStorage>,
    ) -> Result<Self> {
        let mut children = Vec::with_capacity(storages.len());
        for (home, storage) in layout.homes().iter().skip(1).zip(storages) {
            let parent = home
                .parent()
                .ok_or_else(|| eyre!("internal error: {} has no parent home", home.id()))?;
            children.push(ChildStore {
                home: home.id(),
                parent,
                kind: home.kind(),
                storage,
                keys: HashMap::new(),
                owners: HashMap::new(),
                lens: HashMap::new(),
                next_key: 0,
                selected: None,
            });
        }
        Ok(Self {
            layout,
            primary,
            children,
        })
    }

    pub fn primary(&self) -> &SparseStorage {
        &self.primary
    }

    pub fn child(&self, home: HomeId) -> Option<&SparseStorage> {
        self.child_index(home)
            .ok()
            .map(|i| &self.children[i].storage)
    }

    fn child_index(&self, home: HomeId) -> Result<usize> {
        let index = home
            .index()
            .checked_sub(1)
            .filter(|i| *i < self.children.len() && !home.is_global())
            .ok_or_else(|| eyre!("{} is not a child home", home))?;
        Ok(index)
    }

    /// Child home rooted at `structure`.
    fn child_of(&self, structure: StructureId) -> Result<usize> {
        let home = self.layout.structure_home(structure);
        let index = self.child_index(home)?;
        ensure!(
            self.layout.home(home)?.root() == structure,
            "'{}' is not an optional or list structure",
            self.layout.schema().structure_path(structure)
        );
        Ok(index)
    }

    /// Selected element of `home`: the primary's logical index or a child key.
    fn selected_in(&self, home: HomeId) -> Result<usize> {
        let selected = if home == HomeId::PRIMARY {
            self.primary.selected()
        } else {
            self.children[self.child_index(home)?].selected
        };
        selected.ok_or_else(|| eyre!("no element selected in {}", home))
    }

    fn deselect_below(&mut self, home: HomeId) {
        for index in 0..self.children.len() {
            if self.children[index].parent == home {
                self.children[index].selected = None;
                let below = self.children[index].home;
                self.deselect_below(below);
            }
        }
    }

    /// Selects the child element at `position` under the current owner,
    /// creating it when `position` is one past the end. Returns whether it
    /// already existed.
    pub fn select_child(&mut self, structure: StructureId, position: usize) -> Result<bool> {
        let index = self.child_of(structure)?;
        let owner = self.selected_in(self.children[index].parent)?;
        let child = &mut self.children[index];
        let len = child.len_of(owner);
        match child.kind {
            HomeKind::Optional => ensure!(
                position == 0,
                "optional child has only position 0, got {}",
                position
            ),
            _ => ensure!(
                position <= len,
                "list position {} out of range, length is {}",
                position,
                len
            ),
        }

        let existed = match child.keys.get(&(owner, position)) {
            Some(key) => {
                child.storage.select(*key)?;
                child.selected = Some(*key);
                true
            }
            None => {
                let key = child.next_key;
                child.next_key += 1;
                child.storage.select(key)?;
                child.keys.insert((owner, position), key);
                child.owners.insert(key, (owner, position));
                child.lens.insert(owner, len + 1);
                child.selected = Some(key);
                trace!(home = %child.home, owner, position, key, "created child element");
                false
            }
        };
        let home = self.children[index].home;
        self.deselect_below(home);
        Ok(existed)
    }

    /// Number of child elements under the current owner: 0 or 1 for
    /// optional children.
    pub fn child_len(&self, structure: StructureId) -> Result<usize> {
        let index = self.child_of(structure)?;
        let owner = self.selected_in(self.children[index].parent)?;
        Ok(self.children[index].len_of(owner))
    }

    /// Removes the child element at `position` under the current owner,
    /// together with everything it owns.
    pub fn clear_child(&mut self, structure: StructureId, position: usize) -> Result<bool> {
        let index = self.child_of(structure)?;
        let owner = self.selected_in(self.children[index].parent)?;
        let len = self.children[index].len_of(owner);
        if position >= len {
            return Ok(false);
        }
        let key = self.children[index]
            .keys
            .remove(&(owner, position))
            .ok_or_else(|| eyre!("internal error: missing child key"))?;
        self.remove_key(index, key)?;

        let child = &mut self.children[index];
        for p in position + 1..len {
            if let Some(moved) = child.keys.remove(&(owner, p)) {
                child.keys.insert((owner, p - 1), moved);
                child.owners.insert(moved, (owner, p - 1));
            }
        }
        if len == 1 {
            child.lens.remove(&owner);
        } else {
            child.lens.insert(owner, len - 1);
        }
        Ok(true)
    }

    /// Removes positions `len..` under the current owner.
    pub fn truncate_child(&mut self, structure: StructureId, len: usize) -> Result<()> {
        let current = self.child_len(structure)?;
        for position in (len..current).rev() {
            self.clear_child(structure, position)?;
        }
        Ok(())
    }

    /// Drops one child element: its descendants, its key and its storage
    /// slot. Position bookkeeping is the caller's.
    fn remove_key(&mut self, index: usize, key: usize) -> Result<()> {
        let home = self.children[index].home;
        self.remove_owned(home, key)?;

        let child = &mut self.children[index];
        child.owners.remove(&key);
        child.storage.remove(key)?;
        match child.selected {
            Some(selected) if selected == key => {
                self.children[index].selected = None;
                self.deselect_below(home);
            }
            Some(selected) => {
                self.children[index].storage.select(selected)?;
            }
            None => {}
        }
        Ok(())
    }

    /// Removes every child element owned by `owner` of `home`.
    fn remove_owned(&mut self, home: HomeId, owner: usize) -> Result<()> {
        for index in 0..self.children.len() {
            if self.children[index].parent != home {
                continue;
            }
            let child = &mut self.children[index];
            let len = child.lens.remove(&owner).unwrap_or(0);
            let keys: Vec<usize> = (0..len)
                .filter_map(|p| child.keys.remove(&(owner, p)))
                .collect();
            for key in keys {
                self.remove_key(index, key)?;
            }
        }
        Ok(())
    }

    fn route(&self, field: &Field) -> Result<&SparseStorage> {
        if field.home() == HomeId::PRIMARY || field.is_global() {
            return Ok(&self.primary);
        }
        let child = &self.children[self.child_index(field.home())?];
        if child.selected.is_none() {
            bail!("no element selected in {}", child.home);
        }
        Ok(&child.storage)
    }

    fn route_mut(&mut self, field: &Field) -> Result<&mut SparseStorage> {
        if field.home() == HomeId::PRIMARY || field.is_global() {
            return Ok(&mut self.primary);
        }
        let index = self.child_index(field.home())?;
        let child = &mut self.children[index];
        if child.selected.is_none() {
            bail!("no element selected in {}", child.home);
        }
        Ok(&mut child.storage)
    }
}

impl Store for CompositeStorage {
    fn layout(&self) -> &Arc<Layout> {
        &self.layout
    }

    fn select(&mut self, index: usize) -> Result<bool> {
        let existed = self.primary.select(index)?;
        self.deselect_below(HomeId::PRIMARY);
        Ok(existed)
    }

    fn selected(&self) -> Option<usize> {
        self.primary.selected()
    }

    /// Removes the selected primary element and every child element it owns.
    fn clear(&mut self) -> Result<()> {
        let owner = self
            .primary
            .selected()
            .ok_or_else(|| eyre!("no element selected"))?;
        self.remove_owned(HomeId::PRIMARY, owner)?;
        self.primary.clear()?;
        self.deselect_below(HomeId::PRIMARY);
        Ok(())
    }

    fn read_value(&self, field: &Field) -> Result<Value> {
        self.route(field)?.read_value(field)
    }

    fn write_value(&mut self, field: &Field, value: Value) -> Result<Value> {
        self.route_mut(field)?.write_value(field, value)
    }

    fn read_object(&self, field: &Field) -> Result<Option<ObjectRef>> {
        self.route(field)?.read_object(field)
    }

    fn write_object(
        &mut self,
        field: &Field,
        value: Option<ObjectRef>,
    ) -> Result<Option<ObjectRef>> {
        self.route_mut(field)?.write_object(field, value)
    }

    /// Primary records first, then each child home in home order.
    fn commit(&mut self) -> Result<Vec<ChangeRecord>> {
        let mut records = self.primary.commit()?;
        for child in &mut self.children {
            records.extend(child.storage.commit()?);
        }
        Ok(records)
    }

    fn rollback(&mut self) -> Result<()> {
        self.primary.rollback()?;
        for child in &mut self.children {
            child.storage.rollback()?;
        }
        Ok(())
    }

    fn capacity(&self) -> usize {
        self.primary.capacity()
    }

    fn len(&self) -> usize {
        self.primary.len()
    }

    fn resize(&mut self, capacity: usize) -> Result<()> {
        self.primary.resize(capacity)
    }
}
