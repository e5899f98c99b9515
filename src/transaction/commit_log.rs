//! # Commit Log
//!
//! Dirty elements are tracked in a `RoaringBitmap`, which keeps membership
//! tests cheap and iterates in ascending element order for free. Snapshots
//! live in a side map keyed by element.
//!
//! Snapshots are small: an element is usually one or two words, so the
//! word copy sits inline in a `SmallVec`.

use hashbrown::HashMap;
use roaring::RoaringBitmap;
use smallvec::SmallVec;

use crate::types::{ObjectRef, Value};

/// The captured "before" image of one element.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub words: SmallVec<[u64; 4]>,
    pub objects: SmallVec<[Option<ObjectRef>; 2]>,
    pub optionals: SmallVec<[(u32, Value); 2]>,
}

impl Snapshot {
    pub fn optional(&self, slot: u32) -> Option<Value> {
        self.optionals
            .iter()
            .find(|(s, _)| *s == slot)
            .map(|(_, v)| *v)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementState {
    Idle,
    Dirty,
}

#[derive(Debug, Default)]
pub struct CommitLog {
    dirty: RoaringBitmap,
    snapshots: HashMap<u32, Snapshot>,
}

impl CommitLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self, element: u32) -> ElementState {
        if self.dirty.contains(element) {
            ElementState::Dirty
        } else {
            ElementState::Idle
        }
    }

    #[inline]
    pub fn is_dirty(&self, element: u32) -> bool {
        self.dirty.contains(element)
    }

    /// Records `snapshot` for an idle element. Dirty elements keep the
    /// snapshot they already have.
    pub fn capture(&mut self, element: u32, snapshot: Snapshot) -> bool {
        if !self.dirty.insert(element) {
            return false;
        }
        self.snapshots.insert(element, snapshot);
        true
    }

    pub fn len(&self) -> usize {
        self.dirty.len() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.dirty.is_empty()
    }

    /// Dirty elements with their snapshots, ascending by element.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &Snapshot)> {
        self.dirty
            .iter()
            .filter_map(|e| self.snapshots.get(&e).map(|s| (e, s)))
    }

    pub fn reset(&mut self) {
        self.dirty.clear();
        self.snapshots.clear();
    }

    /// Drops tracking for an element that no longer exists.
    pub fn forget(&mut self, element: u32) {
        self.dirty.remove(element);
        self.snapshots.remove(&element);
    }

    /// Moves tracking from `from` to `to`, replacing whatever `to` had.
    pub fn relocate(&mut self, from: u32, to: u32) {
        self.forget(to);
        if self.dirty.remove(from) {
            if let Some(snapshot) = self.snapshots.remove(&from) {
                self.dirty.insert(to);
                self.snapshots.insert(to, snapshot);
            }
        }
    }

    /// Forgets every element at or above `len`.
    pub fn truncate(&mut self, len: u32) {
        self.dirty.remove_range(len..);
        self.snapshots.retain(|e, _| *e < len);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smallvec::smallvec;

    fn snap(word: u64) -> Snapshot {
        Snapshot {
            words: smallvec![word],
            ..Snapshot::default()
        }
    }

    #[test]
    fn capture_happens_once_per_cycle() {
        let mut log = CommitLog::new();
        assert_eq!(log.state(3), ElementState::Idle);
        assert!(log.capture(3, snap(1)));
        assert!(!log.capture(3, snap(2)));
        assert_eq!(log.state(3), ElementState::Dirty);
        let (_, s) = log.iter().next().unwrap();
        assert_eq!(s.words[0], 1);

        log.reset();
        assert!(log.is_empty());
        assert!(log.capture(3, snap(2)));
    }

    #[test]
    fn iteration_is_ascending() {
        let mut log = CommitLog::new();
        for e in [9, 2, 5] {
            log.capture(e, snap(e as u64));
        }
        let order: Vec<u32> = log.iter().map(|(e, _)| e).collect();
        assert_eq!(order, vec![2, 5, 9]);
    }

    #[test]
    fn relocate_moves_snapshot_and_drops_target() {
        let mut log = CommitLog::new();
        log.capture(1, snap(10));
        log.capture(7, snap(70));
        log.relocate(7, 1);
        assert_eq!(log.len(), 1);
        let (e, s) = log.iter().next().unwrap();
        assert_eq!((e, s.words[0]), (1, 70));

        log.relocate(4, 1);
        assert!(log.is_empty());
    }

    #[test]
    fn truncate_forgets_tail() {
        let mut log = CommitLog::new();
        for e in 0..6 {
            log.capture(e, snap(0));
        }
        log.truncate(3);
        assert_eq!(log.len(), 3);
        assert_eq!(log.state(4), ElementState::Idle);
    }

    #[test]
    fn snapshot_finds_optional_by_slot() {
        let s = Snapshot {
            optionals: smallvec![(2, Value::Int(5))],
            ..Snapshot::default()
        };
        assert_eq!(s.optional(2), Some(Value::Int(5)));
        assert_eq!(s.optional(0), None);
    }
}
