//! Plain-data view of a storage's arrays and configuration, for external
//! serializers. An image is only meaningful together with the layout that
//! produced it; [`PackedStorage::from_image`](super::PackedStorage::from_image)
//! and [`SparseStorage::from_image`](super::SparseStorage::from_image)
//! validate it against that layout.

use crate::compiler::HomeId;
use crate::types::{ObjectRef, Value};

#[derive(Debug, Clone)]
pub struct StorageImage {
    pub home: HomeId,
    pub capacity: usize,
    pub arity: usize,
    pub transactional: bool,
    pub default_init: bool,
    pub read_only: bool,
    pub words: Vec<u64>,
    pub objects: Vec<Option<ObjectRef>>,
    /// `(element, slot, value)`, sorted.
    pub optionals: Vec<(u32, u32, Value)>,
    /// Owned global block; `None` for secondary storages and child homes.
    pub globals: Option<Box<StorageImage>>,
    /// Logical index of each physical slot, for sparse storages.
    pub logical_order: Option<Vec<usize>>,
}

impl StorageImage {
    pub fn words_per_element(&self) -> usize {
        self.words.len().checked_div(self.capacity).unwrap_or(0)
    }

    pub fn is_sparse(&self) -> bool {
        self.logical_order.is_some()
    }
}
