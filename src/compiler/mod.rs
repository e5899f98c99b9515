//! # Layout Compiler
//!
//! This module turns a validated [`Schema`] into a physical bit [`Layout`].
//! Packing is bin packing: every packed field (and every union, as one
//! atomic unit) is a candidate, every 64-bit word is a bucket.
//!
//! ## Strategies
//!
//! | Strategy | Fields cross words | Padding | Storage access |
//! |----------|--------------------|---------|----------------|
//! | `WordAligned` (default) | never | per-word tail | single-word mask |
//! | `BoundaryCrossing` | when it avoids padding | last word only | one or two words |
//!
//! For the same schema, boundary-crossing padding is never larger than
//! word-aligned padding, and both strategies place every candidate exactly
//! once.
//!
//! ## Architecture
//!
//! ```text
//! Compiler::compile(&Schema)
//!     │
//!     ├── candidate   Candidate { unit, bits, name }, descending order
//!     ├── Packer      aligned::WordAligned | crossing::BoundaryCrossing
//!     │                 -> bumpalo::Vec<Bucket>, arena-scoped
//!     ├── materialize walk buckets, expand unions, assign homes/slots
//!     └── layout      Layout { fields: Vec<Field>, homes, widths, ... }
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! let layout = Arc::new(Compiler::word_aligned().compile(&schema)?);
//! let energy = layout.field("energy")?;
//! let mut storage = layout.storage().capacity(1024).transactional(true).build()?;
//! storage.select(7)?;
//! storage.write_int(&energy, 12)?;
//! ```

mod aligned;
mod bucket;
mod candidate;
mod crossing;
mod layout;
mod materialize;


use std::sync::Arc;

use bumpalo::collections::Vec as BumpVec;
use bumpalo::Bump;
use eyre::{ensure, Result};

use crate::schema::Schema;
use crate::storage::PackedStorage;

use aligned::WordAligned;
use crossing::BoundaryCrossing;

pub use layout::{Field, Home, HomeId, HomeKind, Layout, Location};

pub(crate) use bucket::Bucket;
pub(crate) use candidate::Candidate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Strategy {
    #[default]
    WordAligned,
    BoundaryCrossing,
}

/// A bin-packing strategy over 64-bit buckets.
pub(crate) trait Packer {
    fn strategy(&self) -> Strategy;

    /// Places every candidate exactly once. Buckets live in `arena`.
    fn pack<'b>(&self, arena: &'b Bump, candidates: &[Candidate]) -> Result<BumpVec<'b, Bucket>>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Compiler {
    strategy: Strategy,
}

impl Compiler {
    pub fn new(strategy: Strategy) -> Self {
        Self { strategy }
    }

    pub fn word_aligned() -> Self {
        Self::new(Strategy::WordAligned)
    }

    pub fn boundary_crossing() -> Self {
        Self::new(Strategy::BoundaryCrossing)
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    pub fn compile(&self, schema: &Schema) -> Result<Layout> {
        match self.strategy {
            Strategy::WordAligned => materialize::compile(schema, &WordAligned),
            Strategy::BoundaryCrossing => materialize::compile(schema, &BoundaryCrossing),
        }
    }

    /// Builds a plain, non-transactional storage for a layout this compiler
    /// produced.
    pub fn init_storage(&self, layout: &Arc<Layout>, capacity: usize) -> Result<PackedStorage> {
        ensure!(
            layout.strategy() == self.strategy,
            "layout was compiled {:?}, this compiler is {:?}",
            layout.strategy(),
            self.strategy
        );
        layout.storage().capacity(capacity).build()
    }
}
