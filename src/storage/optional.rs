//! # Optional Value Store
//!
//! Optional fields do not occupy packed bits. Their values live in a sparse
//! map from element to that element's `(slot, value)` entries, where `slot`
//! is the field's position among the optional fields of its home. An absent
//! entry reads as the field's default.
//!
//! Every per-element operation touches one map entry, so insertion,
//! compaction and snapshot capture stay constant-time in the element count.

use hashbrown::HashMap;
use smallvec::SmallVec;

use crate::types::Value;

/// Entries of one element, kept sorted by slot.
type Entries = SmallVec<[(u32, Value); 4]>;

#[derive(Debug, Clone, Default)]
pub(crate) struct OptionalStore {
    elements: HashMap<u32, Entries>,
}

impl OptionalStore {
    pub fn get(&self, element: u32, slot: u32) -> Option<Value> {
        let entries = self.elements.get(&element)?;
        entries
            .binary_search_by_key(&slot, |(s, _)| *s)
            .ok()
            .map(|i| entries[i].1)
    }

    pub fn insert(&mut self, element: u32, slot: u32, value: Value) -> Option<Value> {
        let entries = self.elements.entry(element).or_default();
        match entries.binary_search_by_key(&slot, |(s, _)| *s) {
            Ok(i) => Some(std::mem::replace(&mut entries[i].1, value)),
            Err(i) => {
                entries.insert(i, (slot, value));
                None
            }
        }
    }

    pub fn remove_element(&mut self, element: u32) {
        self.elements.remove(&element);
    }

    /// Moves every entry of `from` to `to`, discarding what `to` held.
    pub fn relocate(&mut self, from: u32, to: u32) {
        match self.elements.remove(&from) {
            Some(entries) => {
                self.elements.insert(to, entries);
            }
            None => {
                self.elements.remove(&to);
            }
        }
    }

    pub fn retain_below(&mut self, len: u32) {
        self.elements.retain(|e, _| *e < len);
    }

    /// Entries of one element, sorted by slot.
    pub fn element_entries<const N: usize>(&self, element: u32) -> SmallVec<[(u32, Value); N]> {
        self.elements
            .get(&element)
            .map(|entries| entries.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Replaces the entries of one element with `entries`, which must be
    /// sorted by slot.
    pub fn set_element(&mut self, element: u32, entries: &[(u32, Value)]) {
        if entries.is_empty() {
            self.elements.remove(&element);
        } else {
            self.elements.insert(element, Entries::from_slice(entries));
        }
    }

    /// Every entry as `(element, slot, value)`, sorted.
    pub fn entries(&self) -> Vec<(u32, u32, Value)> {
        let mut all: Vec<(u32, u32, Value)> = self
            .elements
            .iter()
            .flat_map(|(e, entries)| entries.iter().map(move |(s, v)| (*e, *s, *v)))
            .collect();
        all.sort_by_key(|(e, s, _)| (*e, *s));
        all
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relocate_replaces_target_entries() {
        let mut store = OptionalStore::default();
        store.insert(1, 0, Value::Int(1));
        store.insert(1, 1, Value::Int(2));
        store.insert(4, 0, Value::Int(40));
        store.relocate(4, 1);

        assert_eq!(store.get(1, 0), Some(Value::Int(40)));
        assert_eq!(store.get(1, 1), None);
        assert_eq!(store.get(4, 0), None);
        assert_eq!(store.entries().len(), 1);
    }

    #[test]
    fn relocating_an_empty_element_empties_the_target() {
        let mut store = OptionalStore::default();
        store.insert(2, 0, Value::Short(7));
        store.relocate(9, 2);
        assert!(store.entries().is_empty());
    }

    #[test]
    fn insert_returns_the_replaced_value() {
        let mut store = OptionalStore::default();
        assert_eq!(store.insert(0, 2, Value::Long(1)), None);
        assert_eq!(store.insert(0, 2, Value::Long(5)), Some(Value::Long(1)));
        assert_eq!(store.get(0, 2), Some(Value::Long(5)));
        assert_eq!(store.get(0, 1), None);
    }

    #[test]
    fn element_entries_are_sorted_by_slot() {
        let mut store = OptionalStore::default();
        store.insert(2, 3, Value::Byte(3));
        store.insert(2, 0, Value::Byte(0));
        store.insert(5, 1, Value::Byte(9));
        let entries = store.element_entries::<2>(2);
        assert_eq!(entries.as_slice(), &[(0, Value::Byte(0)), (3, Value::Byte(3))]);
    }

    #[test]
    fn set_element_replaces_and_removes() {
        let mut store = OptionalStore::default();
        store.insert(3, 0, Value::Int(1));
        store.set_element(3, &[(1, Value::Int(2))]);
        assert_eq!(store.get(3, 0), None);
        assert_eq!(store.get(3, 1), Some(Value::Int(2)));
        store.set_element(3, &[]);
        assert!(store.entries().is_empty());
    }

    #[test]
    fn retain_below_drops_tail_elements() {
        let mut store = OptionalStore::default();
        for e in 0..5 {
            store.insert(e, 0, Value::Bool(true));
        }
        store.retain_below(2);
        assert_eq!(store.entries().len(), 2);
    }
}
