//! # Storage Builder
//!
//! Fluent configuration for the three storage variants. Every option has a
//! default, so `layout.storage().build()` is a valid, plain storage:
//!
//! | Option | Default | Applies to |
//! |--------|---------|------------|
//! | `capacity` | `DEFAULT_INITIAL_CAPACITY` (dense), sizing strategy (sparse) | all |
//! | `transactional` | `false` | all |
//! | `default_init` | `false` | all |
//! | `arity` | `DEFAULT_ARITY` | all |
//! | `parent` | none | primary storages of layouts with globals |
//! | `read_only` | `false` | dense only |
//! | `sizing` | `Doubling::default()` | sparse and composite |
//!
//! Validation happens in `build*`, not in the setters, so a bad option is
//! reported once with the full configuration in view.

use std::fmt;
use std::sync::Arc;

use eyre::{ensure, Result, WrapErr};
use parking_lot::RwLock;

use crate::compiler::{HomeId, Layout};
use crate::config::{DEFAULT_ARITY, DEFAULT_INITIAL_CAPACITY};
use crate::storage::composite::CompositeStorage;
use crate::storage::packed::{GlobalSource, PackedStorage};
use crate::storage::sizing::{Doubling, SizingStrategy};
use crate::storage::sparse::SparseStorage;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct StorageOptions {
    pub capacity: usize,
    pub transactional: bool,
    pub default_init: bool,
    pub arity: usize,
    pub read_only: bool,
}

pub struct StorageBuilder {
    layout: Arc<Layout>,
    capacity: Option<usize>,
    transactional: bool,
    default_init: bool,
    arity: usize,
    parent: Option<Arc<RwLock<PackedStorage>>>,
    read_only: bool,
    sizing: Option<Arc<dyn SizingStrategy>>,
}

impl fmt::Debug for StorageBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageBuilder")
            .field("capacity", &self.capacity)
            .field("transactional", &self.transactional)
            .field("default_init", &self.default_init)
            .field("arity", &self.arity)
            .field("secondary", &self.parent.is_some())
            .field("read_only", &self.read_only)
            .field("sizing", &self.sizing)
            .finish()
    }
}

impl StorageBuilder {
    pub fn new(layout: Arc<Layout>) -> Self {
        Self {
            layout,
            capacity: None,
            transactional: false,
            default_init: false,
            arity: DEFAULT_ARITY,
            parent: None,
            read_only: false,
            sizing: None,
        }
    }

    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = Some(capacity);
        self
    }

    pub fn transactional(mut self, enabled: bool) -> Self {
        self.transactional = enabled;
        self
    }

    pub fn default_init(mut self, enabled: bool) -> Self {
        self.default_init = enabled;
        self
    }

    pub fn arity(mut self, arity: usize) -> Self {
        self.arity = arity;
        self
    }

    /// Shares `parent`'s global block read-only instead of owning one.
    pub fn parent(mut self, parent: &PackedStorage) -> Self {
        self.parent = parent.global_storage().map(Arc::clone);
        self
    }

    pub fn read_only(mut self, enabled: bool) -> Self {
        self.read_only = enabled;
        self
    }

    pub fn sizing(mut self, sizing: impl SizingStrategy + 'static) -> Self {
        self.sizing = Some(Arc::new(sizing));
        self
    }

    fn options(&self, capacity: usize) -> StorageOptions {
        StorageOptions {
            capacity,
            transactional: self.transactional,
            default_init: self.default_init,
            arity: self.arity,
            read_only: self.read_only,
        }
    }

    fn global_source(&self) -> GlobalSource {
        match &self.parent {
            Some(block) => GlobalSource::Shared(Arc::clone(block)),
            None => GlobalSource::Own,
        }
    }

    fn sizing_strategy(&self) -> Arc<dyn SizingStrategy> {
        self.sizing
            .clone()
            .unwrap_or_else(|| Arc::new(Doubling::default()))
    }

    /// Builds a dense storage of the primary home.
    pub fn build(self) -> Result<PackedStorage> {
        let capacity = self.capacity.unwrap_or(DEFAULT_INITIAL_CAPACITY);
        ensure!(
            self.sizing.is_none(),
            "sizing strategies apply to sparse storages, use build_sparse()"
        );
        PackedStorage::create(
            Arc::clone(&self.layout),
            HomeId::PRIMARY,
            self.options(capacity),
            self.global_source(),
        )
        .wrap_err("building packed storage")
    }

    pub fn build_sparse(self) -> Result<SparseStorage> {
        ensure!(!self.read_only, "sparse storages cannot be read-only");
        let sizing = self.sizing_strategy();
        let capacity = self.capacity.unwrap_or_else(|| sizing.initial_capacity());
        let inner = PackedStorage::create(
            Arc::clone(&self.layout),
            HomeId::PRIMARY,
            self.options(capacity),
            self.global_source(),
        )
        .wrap_err("building sparse storage")?;
        SparseStorage::new(inner, sizing)
    }

    /// Builds a sparse primary plus one sparse store for every optional or
    /// list child home, all sharing one sizing strategy.
    pub fn build_composite(self) -> Result<CompositeStorage> {
        ensure!(!self.read_only, "composite storages cannot be read-only");
        let sizing = self.sizing_strategy();
        let capacity = self.capacity.unwrap_or_else(|| sizing.initial_capacity());
        let options = self.options(capacity);

        let primary = PackedStorage::create(
            Arc::clone(&self.layout),
            HomeId::PRIMARY,
            options,
            self.global_source(),
        )
        .wrap_err("building composite primary")?;
        let primary = SparseStorage::new(primary, Arc::clone(&sizing))?;

        let mut children = Vec::new();
        for home in self.layout.homes().iter().skip(1) {
            let inner = PackedStorage::create(
                Arc::clone(&self.layout),
                home.id(),
                StorageOptions {
                    capacity: sizing.initial_capacity(),
                    ..options
                },
                GlobalSource::Detached,
            )
            .wrap_err_with(|| format!("building child storage for {}", home.id()))?;
            children.push(SparseStorage::new(inner, Arc::clone(&sizing))?);
        }
        CompositeStorage::new(Arc::clone(&self.layout), primary, children)
    }
}
