//! # Sizing Strategies
//!
//! A sparse storage asks its sizing strategy how far to grow when a new
//! logical element does not fit, and whether to shrink after a removal.
//!
//! | Strategy | Grow | Shrink |
//! |----------|------|--------|
//! | `Doubling` | multiply by `GROWTH_FACTOR` until it fits | halve when `len * SHRINK_DIVISOR <= capacity` |
//! | `Linear` | add whole steps until it fits | drop one step when two are free |
//! | `Fixed` | never | never |
//!
//! Growth past `max_capacity` is a capacity-exhausted error.

use std::fmt::Debug;

use eyre::{ensure, Result};

use crate::config::{
    DEFAULT_INITIAL_CAPACITY, DEFAULT_MAX_SPARSE_CAPACITY, GROWTH_FACTOR, MAX_CAPACITY,
    MIN_SPARSE_CAPACITY, SHRINK_DIVISOR,
};

pub trait SizingStrategy: Debug + Send + Sync {
    fn initial_capacity(&self) -> usize;

    fn max_capacity(&self) -> usize;

    /// New capacity holding at least `required` elements.
    fn grow(&self, capacity: usize, required: usize) -> Result<usize>;

    /// A smaller capacity for `len` live elements, if shrinking is worthwhile.
    fn shrink(&self, len: usize, capacity: usize) -> Option<usize>;
}

fn exhausted(required: usize, max: usize) -> eyre::Report {
    eyre::eyre!(
        "capacity exhausted: {} elements needed, sizing strategy allows at most {}",
        required,
        max
    )
}

#[derive(Debug, Clone, Copy)]
pub struct Doubling {
    initial: usize,
    max: usize,
}

impl Doubling {
    pub fn new(initial: usize, max: usize) -> Result<Self> {
        ensure!(
            initial >= 1 && initial <= max && max <= MAX_CAPACITY,
            "doubling sizing needs 1 <= initial ({}) <= max ({}) <= {}",
            initial,
            max,
            MAX_CAPACITY
        );
        Ok(Self { initial, max })
    }
}

impl Default for Doubling {
    fn default() -> Self {
        Self {
            initial: DEFAULT_INITIAL_CAPACITY,
            max: DEFAULT_MAX_SPARSE_CAPACITY,
        }
    }
}

impl SizingStrategy for Doubling {
    fn initial_capacity(&self) -> usize {
        self.initial
    }

    fn max_capacity(&self) -> usize {
        self.max
    }

    fn grow(&self, capacity: usize, required: usize) -> Result<usize> {
        if required > self.max {
            return Err(exhausted(required, self.max));
        }
        let mut next = capacity.max(1);
        while next < required {
            next = next.saturating_mul(GROWTH_FACTOR);
        }
        Ok(next.min(self.max))
    }

    fn shrink(&self, len: usize, capacity: usize) -> Option<usize> {
        if len.saturating_mul(SHRINK_DIVISOR) > capacity {
            return None;
        }
        let floor = self.initial.min(MIN_SPARSE_CAPACITY).max(1);
        let target = (capacity / GROWTH_FACTOR).max(floor).max(len);
        (target < capacity).then_some(target)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Linear {
    step: usize,
    initial: usize,
    max: usize,
}

impl Linear {
    pub fn new(step: usize, initial: usize, max: usize) -> Result<Self> {
        ensure!(step >= 1, "linear sizing step must be positive");
        ensure!(
            initial >= 1 && initial <= max && max <= MAX_CAPACITY,
            "linear sizing needs 1 <= initial ({}) <= max ({}) <= {}",
            initial,
            max,
            MAX_CAPACITY
        );
        Ok(Self { step, initial, max })
    }
}

impl SizingStrategy for Linear {
    fn initial_capacity(&self) -> usize {
        self.initial
    }

    fn max_capacity(&self) -> usize {
        self.max
    }

    fn grow(&self, capacity: usize, required: usize) -> Result<usize> {
        if required > self.max {
            return Err(exhausted(required, self.max));
        }
        let missing = required.saturating_sub(capacity);
        let steps = missing.div_ceil(self.step).max(1);
        Ok(capacity
            .saturating_add(steps.saturating_mul(self.step))
            .min(self.max))
    }

    fn shrink(&self, len: usize, capacity: usize) -> Option<usize> {
        let free = capacity.saturating_sub(len);
        if free < 2 * self.step || capacity - self.step < self.initial {
            return None;
        }
        Some(capacity - self.step)
    }
}

/// A sparse storage that never resizes.
#[derive(Debug, Clone, Copy)]
pub struct Fixed {
    capacity: usize,
}

impl Fixed {
    pub fn new(capacity: usize) -> Result<Self> {
        ensure!(
            capacity >= 1 && capacity <= MAX_CAPACITY,
            "fixed capacity {} outside 1..={}",
            capacity,
            MAX_CAPACITY
        );
        Ok(Self { capacity })
    }
}

impl SizingStrategy for Fixed {
    fn initial_capacity(&self) -> usize {
        self.capacity
    }

    fn max_capacity(&self) -> usize {
        self.capacity
    }

    fn grow(&self, _capacity: usize, required: usize) -> Result<usize> {
        if required > self.capacity {
            return Err(exhausted(required, self.capacity));
        }
        Ok(self.capacity)
    }

    fn shrink(&self, _len: usize, _capacity: usize) -> Option<usize> {
        None
    }
}
