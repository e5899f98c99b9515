//! # Sparse Storage
//!
//! Logical indices map to physical slots of an inner [`PackedStorage`].
//! Physical slots `0..len` are always occupied:
//!
//! ```text
//! select(900)  index {900 -> 0}              order [900]
//! select(7)    index {900 -> 0, 7 -> 1}      order [900, 7]
//! select(42)   index {.., 42 -> 2}           order [900, 7, 42]
//! clear() @900 last slot moves into slot 0   order [42, 7]
//! ```
//!
//! Selecting an unknown index inserts it, growing the inner storage through
//! the [`SizingStrategy`] when the physical slots run out. Clearing removes
//! the element, compacts by moving the last slot into the hole, and may
//! shrink the inner storage. Commit records report logical indices.

use std::sync::Arc;

use eyre::{ensure, eyre, Result};
use hashbrown::HashMap;
use tracing::{debug, trace};

use crate::compiler::{Field, Layout};
use crate::storage::{PackedStorage, SizingStrategy, StorageImage, Store};
use crate::transaction::ChangeRecord;
use crate::types::{ObjectRef, Value};

#[derive(Debug)]
pub struct SparseStorage {
    inner: PackedStorage,
    index: HashMap<usize, usize>,
    order: Vec<usize>,
    selected: Option<usize>,
    sizing: Arc<dyn SizingStrategy>,
}

impl SparseStorage {
    pub(crate) fn new(mut inner: PackedStorage, sizing: Arc<dyn SizingStrategy>) -> Result<Self> {
        ensure!(
            inner.capacity() <= sizing.max_capacity(),
            "initial capacity {} exceeds the sizing maximum {}",
            inner.capacity(),
            sizing.max_capacity()
        );
        inner.deselect();
        Ok(Self {
            inner,
            index: HashMap::new(),
            order: Vec::new(),
            selected: None,
            sizing,
        })
    }

    /// Rebuilds a sparse storage from an image carrying a logical order.
    pub fn from_image(
        layout: Arc<Layout>,
        image: &StorageImage,
        sizing: impl SizingStrategy + 'static,
    ) -> Result<Self> {
        let order = image
            .logical_order
            .clone()
            .ok_or_else(|| eyre!("image has no logical order, it was not taken from a sparse storage"))?;
        ensure!(
            order.len() <= image.capacity,
            "image lists {} elements for capacity {}",
            order.len(),
            image.capacity
        );
        let mut index = HashMap::with_capacity(order.len());
        for (slot, logical) in order.iter().enumerate() {
            ensure!(
                index.insert(*logical, slot).is_none(),
                "image lists logical index {} twice",
                logical
            );
        }
        let inner = PackedStorage::from_image(layout, image)?;
        let mut storage = Self::new(inner, Arc::new(sizing))?;
        storage.index = index;
        storage.order = order;
        Ok(storage)
    }

    pub fn image(&self) -> StorageImage {
        let mut image = self.inner.image();
        image.logical_order = Some(self.order.clone());
        image
    }

    pub fn contains(&self, logical: usize) -> bool {
        self.index.contains_key(&logical)
    }

    /// Live logical indices in physical order.
    pub fn logical_indices(&self) -> &[usize] {
        &self.order
    }

    pub fn physical_slot(&self, logical: usize) -> Option<usize> {
        self.index.get(&logical).copied()
    }

    pub fn inner(&self) -> &PackedStorage {
        &self.inner
    }

    /// Removes `logical` if present. The selection is gone afterwards either
    /// way when it pointed at `logical`.
    pub fn remove(&mut self, logical: usize) -> Result<bool> {
        if !self.contains(logical) {
            return Ok(false);
        }
        let previous = self.selected.filter(|s| *s != logical);
        self.select(logical)?;
        self.clear()?;
        if let Some(previous) = previous {
            self.select(previous)?;
        }
        Ok(true)
    }

    fn insert(&mut self, logical: usize) -> Result<usize> {
        let slot = self.order.len();
        if slot == self.inner.capacity() {
            let target = self.sizing.grow(self.inner.capacity(), slot + 1)?;
            ensure!(
                target > slot,
                "sizing strategy returned {} for {} required elements",
                target,
                slot + 1
            );
            debug!(from = self.inner.capacity(), to = target, "growing sparse storage");
            self.inner.resize(target)?;
        }
        self.inner.init_element(slot)?;
        self.order.push(logical);
        self.index.insert(logical, slot);
        trace!(logical, slot, "inserted sparse element");
        Ok(slot)
    }

    fn shrink(&mut self) -> Result<()> {
        let len = self.order.len();
        if let Some(target) = self.sizing.shrink(len, self.inner.capacity()) {
            ensure!(
                target >= len.max(1),
                "sizing strategy shrank to {} below {} live elements",
                target,
                len
            );
            debug!(from = self.inner.capacity(), to = target, "shrinking sparse storage");
            self.inner.resize(target)?;
        }
        Ok(())
    }
}

impl Store for SparseStorage {
    fn layout(&self) -> &Arc<Layout> {
        self.inner.layout()
    }

    fn select(&mut self, index: usize) -> Result<bool> {
        let (slot, existed) = match self.index.get(&index) {
            Some(slot) => (*slot, true),
            None => (self.insert(index)?, false),
        };
        self.inner.select(slot)?;
        self.selected = Some(index);
        Ok(existed)
    }

    fn selected(&self) -> Option<usize> {
        self.selected
    }

    fn clear(&mut self) -> Result<()> {
        let logical = self
            .selected
            .take()
            .ok_or_else(|| eyre!("no element selected"))?;
        let slot = self
            .index
            .remove(&logical)
            .ok_or_else(|| eyre!("internal error: selected element {} has no slot", logical))?;
        let last = self.order.len() - 1;

        self.inner.remove_element(slot, last)?;
        self.order.swap_remove(slot);
        if let Some(moved) = self.order.get(slot) {
            self.index.insert(*moved, slot);
        }
        self.inner.deselect();
        trace!(logical, slot, last, "removed sparse element");
        self.shrink()
    }

    fn read_value(&self, field: &Field) -> Result<Value> {
        self.inner.read_value(field)
    }

    fn write_value(&mut self, field: &Field, value: Value) -> Result<Value> {
        self.inner.write_value(field, value)
    }

    fn read_object(&self, field: &Field) -> Result<Option<ObjectRef>> {
        self.inner.read_object(field)
    }

    fn write_object(
        &mut self,
        field: &Field,
        value: Option<ObjectRef>,
    ) -> Result<Option<ObjectRef>> {
        self.inner.write_object(field, value)
    }

    fn commit(&mut self) -> Result<Vec<ChangeRecord>> {
        let mut records = self.inner.commit()?;
        for record in records.iter_mut().filter(|r| !r.field.is_global()) {
            record.element = *self.order.get(record.element).ok_or_else(|| {
                eyre!("internal error: change record for empty slot {}", record.element)
            })?;
        }
        records.sort_by_key(|r| r.element);
        Ok(records)
    }

    fn rollback(&mut self) -> Result<()> {
        self.inner.rollback()
    }

    fn capacity(&self) -> usize {
        self.inner.capacity()
    }

    fn len(&self) -> usize {
        self.order.len()
    }

    fn resize(&mut self, capacity: usize) -> Result<()> {
        ensure!(
            capacity >= self.order.len(),
            "cannot resize to {} with {} live elements",
            capacity,
            self.order.len()
        );
        ensure!(
            capacity <= self.sizing.max_capacity(),
            "capacity {} exceeds the sizing maximum {}",
            capacity,
            self.sizing.max_capacity()
        );
        self.inner.resize(capacity)
    }
}
