//! # Packed Storage
//!
//! The dense storage engine. One home's elements live back to back in a
//! single `Vec<u64>`; every access is a mask-and-shift at an offset the
//! compiler fixed ahead of time.
//!
//! ## Routing
//!
//! | Field | Goes to |
//! |-------|---------|
//! | packed | `words[element * words_per_element ..]` via [`bits`](super::bits) |
//! | optional | `OptionalStore` keyed by `(element, slot)`, default when absent |
//! | object | `objects[element * object_slots + slot]` |
//! | virtual | the field's mapper, handed `self` as `&dyn Store` |
//! | global | the capacity-1 global storage behind `RwLock` |
//!
//! ## Global Block
//!
//! A primary storage owns its global block unless it was built with a
//! parent, in which case it shares the parent's block read-only: reads go
//! through, writes fail. Commit and rollback of an owned global block happen
//! together with the owning storage; its records carry element 0.
//!
//! ## Transactions
//!
//! With a commit log, the first mutation of an element in a cycle copies the
//! element (words, objects, optional entries) into a [`Snapshot`]. Writes are
//! applied immediately; `commit()` diffs, `rollback()` restores.

use std::sync::Arc;

use eyre::{bail, ensure, eyre, Result, WrapErr};
use parking_lot::RwLock;
use smallvec::SmallVec;
use tracing::{debug, trace};

use crate::compiler::{Field, HomeId, Layout, Location};
use crate::config::{MAX_ARITY, MAX_CAPACITY, WORD_BITS};
use crate::schema::VirtualMapper;
use crate::storage::bits;
use crate::storage::builder::StorageOptions;
use crate::storage::optional::OptionalStore;
use crate::storage::{StorageImage, Store};
use crate::transaction::{ChangeRecord, CommitLog, ElementState, Snapshot};
use crate::types::{ObjectRef, Value};

pub(crate) enum GlobalSource {
    /// Child homes never see globals.
    Detached,
    Own,
    Shared(Arc<RwLock<PackedStorage>>),
}

#[derive(Debug)]
struct GlobalCell {
    storage: Arc<RwLock<PackedStorage>>,
    shared: bool,
}

#[derive(Debug)]
pub struct PackedStorage {
    layout: Arc<Layout>,
    home: HomeId,
    words_per_element: usize,
    object_slots: usize,
    words: Vec<u64>,
    objects: Vec<Option<ObjectRef>>,
    optionals: OptionalStore,
    globals: Option<GlobalCell>,
    capacity: usize,
    selected: Option<usize>,
    arity: usize,
    read_only: bool,
    default_init: bool,
    log: Option<CommitLog>,
}

fn check_capacity(capacity: usize) -> Result<()> {
    ensure!(
        (1..=MAX_CAPACITY).contains(&capacity),
        "capacity {} outside 1..={}",
        capacity,
        MAX_CAPACITY
    );
    Ok(())
}

impl PackedStorage {
    pub(crate) fn create(
        layout: Arc<Layout>,
        home: HomeId,
        options: StorageOptions,
        globals: GlobalSource,
    ) -> Result<Self> {
        check_capacity(options.capacity)?;
        ensure!(
            (1..=MAX_ARITY).contains(&options.arity),
            "arity {} outside 1..={}",
            options.arity,
            MAX_ARITY
        );

        let (words_per_element, object_slots) = {
            let h = layout.home(home)?;
            (h.words_per_element(), h.object_slots())
        };
        let word_count = options
            .capacity
            .checked_mul(words_per_element)
            .ok_or_else(|| eyre!("{} elements of {} words overflow", options.capacity, words_per_element))?;

        let globals = match globals {
            GlobalSource::Detached => None,
            _ if layout.globals().is_none() => None,
            GlobalSource::Own => {
                let global_options = StorageOptions {
                    capacity: 1,
                    arity: 1,
                    ..options
                };
                let mut block = PackedStorage::create(
                    Arc::clone(&layout),
                    HomeId::GLOBAL,
                    global_options,
                    GlobalSource::Detached,
                )?;
                block.selected = Some(0);
                Some(GlobalCell {
                    storage: Arc::new(RwLock::new(block)),
                    shared: false,
                })
            }
            GlobalSource::Shared(storage) => {
                ensure!(
                    Arc::ptr_eq(&storage.read().layout, &layout),
                    "parent storage was built from a different layout"
                );
                Some(GlobalCell {
                    storage,
                    shared: true,
                })
            }
        };

        let mut storage = Self {
            layout,
            home,
            words_per_element,
            object_slots,
            words: vec![0; word_count],
            objects: vec![None; options.capacity * object_slots],
            optionals: OptionalStore::default(),
            globals,
            capacity: options.capacity,
            selected: None,
            arity: options.arity,
            read_only: false,
            default_init: options.default_init,
            log: options.transactional.then(CommitLog::new),
        };
        if storage.default_init {
            storage.initialize_range(0, storage.capacity)?;
        }
        storage.read_only = options.read_only;
        trace!(
            home = %storage.home,
            capacity = storage.capacity,
            words = storage.words.len(),
            "created packed storage"
        );
        Ok(storage)
    }

    pub(crate) fn options(&self) -> StorageOptions {
        StorageOptions {
            capacity: self.capacity,
            transactional: self.log.is_some(),
            default_init: self.default_init,
            arity: self.arity,
            read_only: self.read_only,
        }
    }

    fn global_source(&self) -> GlobalSource {
        match &self.globals {
            Some(cell) if cell.shared => GlobalSource::Shared(Arc::clone(&cell.storage)),
            Some(_) => GlobalSource::Own,
            None if self.home == HomeId::PRIMARY => GlobalSource::Own,
            None => GlobalSource::Detached,
        }
    }

    /// A storage with the same configuration and no data. A secondary
    /// storage's copy keeps sharing the same parent globals.
    pub fn blank_copy(&self) -> Result<Self> {
        Self::create(
            Arc::clone(&self.layout),
            self.home,
            self.options(),
            self.global_source(),
        )
    }

    /// A deep copy. Owned globals are copied too; no arrays are shared.
    /// Pending changes are not carried over.
    pub fn duplicate(&self) -> Result<Self> {
        let globals = match &self.globals {
            Some(cell) if cell.shared => Some(GlobalCell {
                storage: Arc::clone(&cell.storage),
                shared: true,
            }),
            Some(cell) => Some(GlobalCell {
                storage: Arc::new(RwLock::new(cell.storage.read().duplicate()?)),
                shared: false,
            }),
            None => None,
        };
        Ok(Self {
            layout: Arc::clone(&self.layout),
            home: self.home,
            words_per_element: self.words_per_element,
            object_slots: self.object_slots,
            words: self.words.clone(),
            objects: self.objects.clone(),
            optionals: self.optionals.clone(),
            globals,
            capacity: self.capacity,
            selected: self.selected,
            arity: self.arity,
            read_only: self.read_only,
            default_init: self.default_init,
            log: self.log.as_ref().map(|_| CommitLog::new()),
        })
    }

    pub fn home(&self) -> HomeId {
        self.home
    }

    pub fn words_per_element(&self) -> usize {
        self.words_per_element
    }

    /// Raw word array, `capacity * words_per_element` long.
    pub fn words(&self) -> &[u64] {
        &self.words
    }

    pub fn arity(&self) -> usize {
        self.arity
    }

    pub fn is_transactional(&self) -> bool {
        self.log.is_some()
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// True when the global block is borrowed from a parent storage.
    pub fn is_secondary(&self) -> bool {
        self.globals.as_ref().is_some_and(|c| c.shared)
    }

    pub fn element_state(&self, element: usize) -> ElementState {
        match &self.log {
            Some(log) => log.state(element as u32),
            None => ElementState::Idle,
        }
    }

    pub(crate) fn global_storage(&self) -> Option<&Arc<RwLock<PackedStorage>>> {
        self.globals.as_ref().map(|c| &c.storage)
    }

    #[inline]
    fn element(&self) -> Result<usize> {
        self.selected.ok_or_else(|| eyre!("no element selected"))
    }

    #[inline]
    fn bit_base(&self, element: usize) -> usize {
        element * self.words_per_element * WORD_BITS as usize
    }

    fn check_writable(&self) -> Result<()> {
        ensure!(!self.read_only, "storage is read-only");
        Ok(())
    }

    fn check_field(&self, field: &Field) -> Result<()> {
        ensure!(
            self.layout.fields.get(field.id().index()) == Some(field),
            "field #{} does not belong to this layout",
            field.id().index()
        );
        if !field.is_global() {
            ensure!(
                field.home() == self.home,
                "field '{}' lives in {}, this storage holds {}",
                self.layout.schema().field_path(field.id()),
                field.home(),
                self.home
            );
        }
        Ok(())
    }

    fn routes_to_globals(&self, field: &Field) -> bool {
        field.is_global() && !self.home.is_global()
    }

    fn global_cell(&self) -> Result<&GlobalCell> {
        self.globals
            .as_ref()
            .ok_or_else(|| eyre!("{} has no access to global fields", self.home))
    }

    fn default_of(&self, field: &Field) -> Result<Value> {
        self.layout
            .field_def(field)
            .default_value()
            .ok_or_else(|| eyre!("{} field has no default", field.kind()))
    }

    fn mapper(&self, field: &Field) -> Result<Arc<dyn VirtualMapper>> {
        self.layout
            .field_def(field)
            .mapper()
            .cloned()
            .ok_or_else(|| eyre!("virtual field #{} has no mapper", field.id().index()))
    }

    fn object_index(&self, field: &Field) -> Result<usize> {
        match field.location() {
            Location::Object { slot } => Ok(self.element()? * self.object_slots + slot as usize),
            _ => bail!(
                "'{}' is a {} field, not an object field",
                self.layout.schema().field_path(field.id()),
                field.kind()
            ),
        }
    }

    fn snapshot(&self, element: usize) -> Snapshot {
        let words = element * self.words_per_element;
        let objects = element * self.object_slots;
        Snapshot {
            words: SmallVec::from_slice(&self.words[words..words + self.words_per_element]),
            objects: self.objects[objects..objects + self.object_slots]
                .iter()
                .cloned()
                .collect(),
            optionals: self.optionals.element_entries(element as u32),
        }
    }

    fn restore(&mut self, element: usize, snapshot: &Snapshot) {
        let words = element * self.words_per_element;
        self.words[words..words + self.words_per_element].copy_from_slice(&snapshot.words);
        let objects = element * self.object_slots;
        self.objects[objects..objects + self.object_slots].clone_from_slice(&snapshot.objects);
        self.optionals.set_element(element as u32, &snapshot.optionals);
    }

    #[inline]
    fn capture(&mut self, element: usize) {
        let element = element as u32;
        if self.log.as_ref().is_some_and(|log| !log.is_dirty(element)) {
            let snapshot = self.snapshot(element as usize);
            if let Some(log) = self.log.as_mut() {
                log.capture(element, snapshot);
            }
        }
    }

    /// Zeroes an element without logging or mapper callbacks.
    fn reset_element(&mut self, element: usize) {
        let words = element * self.words_per_element;
        self.words[words..words + self.words_per_element].fill(0);
        let objects = element * self.object_slots;
        self.objects[objects..objects + self.object_slots].fill(None);
        self.optionals.remove_element(element as u32);
    }

    /// Materializes optional defaults for a fresh element.
    fn init_defaults(&mut self, element: usize) -> Result<()> {
        let layout = Arc::clone(&self.layout);
        for id in layout.home(self.home)?.fields() {
            let field = layout.field_by_id(*id)?;
            if let Location::Optional { slot } = field.location() {
                let default = self.default_of(&field)?;
                self.optionals.insert(element as u32, slot, default);
            }
        }
        Ok(())
    }

    /// Moves element `from` into slot `to` and zeroes `from`.
    pub(crate) fn move_element(&mut self, from: usize, to: usize) {
        let wpe = self.words_per_element;
        self.words.copy_within(from * wpe..(from + 1) * wpe, to * wpe);
        for slot in 0..self.object_slots {
            let moved = self.objects[from * self.object_slots + slot].take();
            self.objects[to * self.object_slots + slot] = moved;
        }
        self.optionals.relocate(from as u32, to as u32);
        if let Some(log) = self.log.as_mut() {
            log.relocate(from as u32, to as u32);
        }
        self.reset_element(from);
    }

    /// Removes `slot` by moving `last` into it. Pending changes of the
    /// removed element are dropped.
    pub(crate) fn remove_element(&mut self, slot: usize, last: usize) -> Result<()> {
        self.check_writable()?;
        ensure!(
            slot <= last && last < self.capacity,
            "internal error: removing slot {} with last slot {} of {}",
            slot,
            last,
            self.capacity
        );
        if let Some(log) = self.log.as_mut() {
            log.forget(slot as u32);
        }
        if slot != last {
            self.move_element(last, slot);
        } else {
            self.reset_element(slot);
        }
        Ok(())
    }

    pub(crate) fn deselect(&mut self) {
        self.selected = None;
    }

    /// Calls `clear` on every virtual mapper of the home with `element`
    /// selected. The previous selection is restored afterwards.
    fn clear_virtuals(&mut self, element: usize) -> Result<()> {
        let layout = Arc::clone(&self.layout);
        let home = layout.home(self.home)?;
        if home.virtuals().is_empty() {
            return Ok(());
        }
        let selected = self.selected.replace(element);
        let cleared = home.virtuals().iter().try_for_each(|id| {
            let field = layout.field_by_id(*id)?;
            match layout.field_def(&field).mapper() {
                Some(mapper) => mapper.clear(field.owner(), self),
                None => Ok(()),
            }
        });
        self.selected = selected;
        cleared
    }

    /// Brings an element to its cleared state: zeroed words and objects,
    /// optional defaults when `default_init` is set, then mapper `clear`.
    fn reinitialize(&mut self, element: usize) -> Result<()> {
        self.reset_element(element);
        if self.default_init {
            self.init_defaults(element)?;
        }
        self.clear_virtuals(element)
    }

    /// Default-initializes the fresh elements `from..to`. Nothing is logged.
    fn initialize_range(&mut self, from: usize, to: usize) -> Result<()> {
        let log = self.log.take();
        let initialized = (from..to).try_for_each(|element| self.reinitialize(element));
        self.log = log;
        initialized
    }

    /// Prepares a freshly inserted element.
    pub(crate) fn init_element(&mut self, element: usize) -> Result<()> {
        if self.default_init {
            self.initialize_range(element, element + 1)
        } else {
            self.reset_element(element);
            Ok(())
        }
    }

    fn diff(&self, log: &CommitLog) -> Result<Vec<ChangeRecord>> {
        let home = self.layout.home(self.home)?;
        let mut records = Vec::new();
        for (element, snapshot) in log.iter() {
            let element = element as usize;
            for id in home.fields() {
                let field = self.layout.field_by_id(*id)?;
                let (old, new) = match field.location() {
                    Location::Packed { offset } => {
                        let old = bits::read_bits(&snapshot.words, offset as usize, field.bits());
                        let new = bits::read_bits(
                            &self.words,
                            self.bit_base(element) + offset as usize,
                            field.bits(),
                        );
                        if old == new {
                            continue;
                        }
                        let kind = field.kind();
                        match (Value::from_bits(kind, old), Value::from_bits(kind, new)) {
                            (Some(old), Some(new)) => (old, new),
                            _ => bail!("internal error: {} field packed into bits", kind),
                        }
                    }
                    Location::Optional { slot } => {
                        let default = self.default_of(&field)?;
                        let old = snapshot.optional(slot).unwrap_or(default);
                        let new = self.optionals.get(element as u32, slot).unwrap_or(default);
                        if old.same_bits(&new) {
                            continue;
                        }
                        (old, new)
                    }
                    Location::Object { .. } | Location::Virtual => continue,
                };
                let def = self.layout.field_def(&field);
                records.push(ChangeRecord::new(field, def, element, old, new)?);
            }
        }
        Ok(records)
    }

    pub fn image(&self) -> StorageImage {
        let globals = match &self.globals {
            Some(cell) if !cell.shared => Some(Box::new(cell.storage.read().image())),
            _ => None,
        };
        StorageImage {
            home: self.home,
            capacity: self.capacity,
            arity: self.arity,
            transactional: self.log.is_some(),
            default_init: self.default_init,
            read_only: self.read_only,
            words: self.words.clone(),
            objects: self.objects.clone(),
            optionals: self.optionals.entries(),
            globals,
            logical_order: None,
        }
    }

    /// Rebuilds a storage from an image produced for the same layout.
    pub fn from_image(layout: Arc<Layout>, image: &StorageImage) -> Result<Self> {
        let source = if image.home == HomeId::PRIMARY {
            GlobalSource::Own
        } else {
            GlobalSource::Detached
        };
        let options = StorageOptions {
            capacity: image.capacity,
            transactional: image.transactional,
            default_init: false,
            arity: image.arity,
            read_only: false,
        };
        let mut storage = Self::create(layout, image.home, options, source)
            .wrap_err("image does not match the layout")?;

        ensure!(
            image.words.len() == storage.words.len(),
            "image has {} words, {} elements of {} words need {}",
            image.words.len(),
            image.capacity,
            storage.words_per_element,
            storage.words.len()
        );
        ensure!(
            image.objects.len() == storage.objects.len(),
            "image has {} object slots, layout needs {}",
            image.objects.len(),
            storage.objects.len()
        );
        let optional_slots = storage.layout.home(image.home)?.optional_slots() as u32;
        for (element, slot, value) in &image.optionals {
            ensure!(
                (*element as usize) < image.capacity && *slot < optional_slots,
                "image optional entry ({}, {}) is out of range",
                element,
                slot
            );
            storage.optionals.insert(*element, *slot, *value);
        }
        storage.words.copy_from_slice(&image.words);
        storage.objects.clone_from_slice(&image.objects);

        if let (Some(cell), Some(globals)) = (&storage.globals, &image.globals) {
            ensure!(
                globals.home == HomeId::GLOBAL,
                "image global block belongs to {}",
                globals.home
            );
            let mut block = Self::from_image(Arc::clone(&storage.layout), globals)?;
            block.selected = Some(0);
            *cell.storage.write() = block;
        }
        storage.default_init = image.default_init;
        storage.read_only = image.read_only;
        Ok(storage)
    }
}

impl Store for PackedStorage {
    fn layout(&self) -> &Arc<Layout> {
        &self.layout
    }

    fn select(&mut self, index: usize) -> Result<bool> {
        ensure!(
            index < self.capacity,
            "element {} out of range, capacity is {}",
            index,
            self.capacity
        );
        self.selected = Some(index);
        Ok(true)
    }

    fn selected(&self) -> Option<usize> {
        self.selected
    }

    fn clear(&mut self) -> Result<()> {
        self.check_writable()?;
        let element = self.element()?;
        self.capture(element);
        self.reinitialize(element)?;
        trace!(home = %self.home, element, "cleared element");
        Ok(())
    }

    fn read_value(&self, field: &Field) -> Result<Value> {
        self.check_field(field)?;
        if self.routes_to_globals(field) {
            return self.global_cell()?.storage.read().read_value(field);
        }
        match field.location() {
            Location::Packed { offset } => {
                let element = self.element()?;
                let raw = bits::read_bits(
                    &self.words,
                    self.bit_base(element) + offset as usize,
                    field.bits(),
                );
                Value::from_bits(field.kind(), raw)
                    .ok_or_else(|| eyre!("internal error: {} field packed into bits", field.kind()))
            }
            Location::Optional { slot } => {
                let element = self.element()?;
                match self.optionals.get(element as u32, slot) {
                    Some(value) => Ok(value),
                    None => self.default_of(field),
                }
            }
            Location::Object { .. } => bail!(
                "'{}' is an object field, use read_object",
                self.layout.schema().field_path(field.id())
            ),
            Location::Virtual => {
                let mapper = self.mapper(field)?;
                let value = mapper.read(field.owner(), self)?;
                ensure!(
                    value.kind() == field.kind(),
                    "mapper for '{}' returned {}, field is {}",
                    self.layout.schema().field_path(field.id()),
                    value.kind(),
                    field.kind()
                );
                Ok(value)
            }
        }
    }

    fn write_value(&mut self, field: &Field, value: Value) -> Result<Value> {
        self.check_field(field)?;
        ensure!(
            value.kind() == field.kind(),
            "cannot write {} value to {} field '{}'",
            value.kind(),
            field.kind(),
            self.layout.schema().field_path(field.id())
        );
        self.check_writable()?;

        if self.routes_to_globals(field) {
            let cell = self.global_cell()?;
            ensure!(
                !cell.shared,
                "global field '{}' is shared read-only from a parent storage",
                self.layout.schema().field_path(field.id())
            );
            return cell.storage.write().write_value(field, value);
        }

        match field.location() {
            Location::Packed { offset } => {
                let element = self.element()?;
                self.capture(element);
                let base = self.bit_base(element);
                let old = bits::write_bits(
                    &mut self.words,
                    base + offset as usize,
                    field.bits(),
                    value.to_bits(),
                );
                Value::from_bits(field.kind(), old)
                    .ok_or_else(|| eyre!("internal error: {} field packed into bits", field.kind()))
            }
            Location::Optional { slot } => {
                let element = self.element()?;
                self.capture(element);
                match self
                    .optionals
                    .insert(element as u32, slot, value.truncated(field.bits()))
                {
                    Some(old) => Ok(old),
                    None => self.default_of(field),
                }
            }
            Location::Object { .. } => bail!(
                "'{}' is an object field, use write_object",
                self.layout.schema().field_path(field.id())
            ),
            Location::Virtual => {
                let mapper = self.mapper(field)?;
                let old = mapper.read(field.owner(), self)?;
                mapper.write(value, field.owner(), self)?;
                Ok(old)
            }
        }
    }

    fn read_object(&self, field: &Field) -> Result<Option<ObjectRef>> {
        self.check_field(field)?;
        let index = self.object_index(field)?;
        Ok(self.objects[index].clone())
    }

    fn write_object(
        &mut self,
        field: &Field,
        value: Option<ObjectRef>,
    ) -> Result<Option<ObjectRef>> {
        self.check_field(field)?;
        self.check_writable()?;
        let index = self.object_index(field)?;
        self.capture(self.element()?);
        Ok(std::mem::replace(&mut self.objects[index], value))
    }

    fn commit(&mut self) -> Result<Vec<ChangeRecord>> {
        let mut log = self
            .log
            .take()
            .ok_or_else(|| eyre!("commit() on a non-transactional storage"))?;
        let diffed = self.diff(&log);
        if diffed.is_ok() {
            log.reset();
        }
        self.log = Some(log);
        let mut records = diffed?;

        if let Some(cell) = self.globals.as_ref().filter(|c| !c.shared) {
            let mut block = cell.storage.write();
            if block.is_transactional() {
                let mut global_records = block.commit().wrap_err("committing global block")?;
                global_records.append(&mut records);
                records = global_records;
            }
        }
        records.sort_by_key(|r| r.element);
        debug!(home = %self.home, records = records.len(), "committed");
        Ok(records)
    }

    fn rollback(&mut self) -> Result<()> {
        let mut log = self
            .log
            .take()
            .ok_or_else(|| eyre!("rollback() on a non-transactional storage"))?;
        let restored = log.len();
        for (element, snapshot) in log.iter() {
            self.restore(element as usize, snapshot);
        }
        log.reset();
        self.log = Some(log);

        if let Some(cell) = self.globals.as_ref().filter(|c| !c.shared) {
            let mut block = cell.storage.write();
            if block.is_transactional() {
                block.rollback()?;
            }
        }
        debug!(home = %self.home, restored, "rolled back");
        Ok(())
    }

    fn capacity(&self) -> usize {
        self.capacity
    }

    fn len(&self) -> usize {
        self.capacity
    }

    fn resize(&mut self, capacity: usize) -> Result<()> {
        self.check_writable()?;
        check_capacity(capacity)?;
        let word_count = capacity
            .checked_mul(self.words_per_element)
            .ok_or_else(|| eyre!("{} elements of {} words overflow", capacity, self.words_per_element))?;

        let old = self.capacity;
        self.words.resize(word_count, 0);
        self.objects.resize(capacity * self.object_slots, None);
        if capacity < old {
            self.optionals.retain_below(capacity as u32);
            if let Some(log) = self.log.as_mut() {
                log.truncate(capacity as u32);
            }
        }
        self.capacity = capacity;
        if capacity > old && self.default_init {
            self.initialize_range(old, capacity)?;
        }
        self.selected = self.selected.map(|s| s.min(capacity - 1));
        debug!(home = %self.home, from = old, to = capacity, "resized storage");
        Ok(())
    }
}
