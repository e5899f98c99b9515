//! # Buckets
//!
//! A bucket is one 64-bit word's worth of packed candidates plus trailing
//! padding. Buckets exist only while a single block is being compiled; they
//! are allocated in the compiler's bump arena and dropped with it.
//!
//! ## Slots
//!
//! Each slot records which candidate starts in the bucket, at which bit
//! offset, and how many of the bucket's bits it consumes. A union wider than
//! one word starts in one bucket and continues in placeholder slots
//! (`candidate == None`) in the following buckets.
//!
//! With the boundary-crossing packer a slot may extend past bit 64; the
//! overflow is carried into the next bucket as its initial size.

use eyre::{ensure, Result};
use smallvec::SmallVec;

use crate::config::WORD_BITS;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Slot {
    pub candidate: Option<usize>,
    pub offset: u32,
    pub bits: u32,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct Bucket {
    pub size: u32,
    pub slots: SmallVec<[Slot; 8]>,
}

impl Bucket {
    pub fn carrying(overflow: u32) -> Self {
        Self {
            size: overflow,
            slots: SmallVec::new(),
        }
    }

    pub fn room(&self) -> u32 {
        WORD_BITS.saturating_sub(self.size)
    }

    pub fn is_full(&self) -> bool {
        self.size >= WORD_BITS
    }

    /// Appends a candidate at the current fill level and returns its offset.
    pub fn place(&mut self, candidate: usize, bits: u32) -> u32 {
        let offset = self.size;
        self.slots.push(Slot {
            candidate: Some(candidate),
            offset,
            bits,
        });
        self.size += bits;
        offset
    }

    pub fn placeholder(&mut self, bits: u32) {
        let offset = self.size;
        self.slots.push(Slot {
            candidate: None,
            offset,
            bits,
        });
        self.size += bits;
    }

    pub fn padding(&self) -> Result<u32> {
        ensure!(
            self.size <= WORD_BITS,
            "internal error: bucket overflow, {} bits packed into a {}-bit word",
            self.size,
            WORD_BITS
        );
        Ok(WORD_BITS - self.size)
    }
}

/// `(buckets - 1) * 64 + last.size`, or zero without buckets.
pub(crate) fn total_bits(buckets: &[Bucket]) -> u32 {
    match buckets.last() {
        Some(last) => (buckets.len() as u32 - 1) * WORD_BITS + last.size,
        None => 0,
    }
}
