//! # wordpack Configuration Constants
//!
//! All constants are grouped by the component that consumes them. When
//! changing one, check the dependency graph first.
//!
//! ```text
//! WORD_BITS (64)
//!       │
//!       ├─> MAX_FIELD_BITS (must be ==)
//!       │     A single field never exceeds one word; only unions may.
//!       │
//!       └─> bucket capacity in both packing strategies
//!
//! MAX_CAPACITY (2^31 - 1 elements)
//!       │
//!       ├─> element indices are tracked in a RoaringBitmap (u32 keys)
//!       │
//!       └─> DEFAULT_MAX_SPARSE_CAPACITY (must be <=)
//!
//! DEFAULT_INITIAL_CAPACITY (16)
//!       │
//!       └─> MIN_SPARSE_CAPACITY (must be <=)
//!             Shrinking never goes below the minimum.
//! ```
//!
//! ## Critical Invariants
//!
//! 1. `MAX_FIELD_BITS == WORD_BITS`
//! 2. `MAX_CAPACITY <= u32::MAX` (dirty-set keys)
//! 3. `MIN_SPARSE_CAPACITY <= DEFAULT_INITIAL_CAPACITY`
//! 4. `SHRINK_DIVISOR > GROWTH_FACTOR` (no grow/shrink oscillation)

// ============================================================================
// WORD GEOMETRY
// ============================================================================

/// Width of one storage word in bits.
pub const WORD_BITS: u32 = 64;

/// Widest single field. Only unions may span multiple words.
pub const MAX_FIELD_BITS: u32 = WORD_BITS;

const _: () = assert!(MAX_FIELD_BITS == WORD_BITS);

// ============================================================================
// CAPACITY LIMITS
// ============================================================================

/// Hard upper bound on the number of elements in a single storage.
pub const MAX_CAPACITY: usize = i32::MAX as usize;

/// Capacity used when a builder is not told otherwise.
pub const DEFAULT_INITIAL_CAPACITY: usize = 16;

/// Smallest capacity a sparse storage shrinks to.
pub const MIN_SPARSE_CAPACITY: usize = 8;

/// Default ceiling for the built-in sizing strategies.
pub const DEFAULT_MAX_SPARSE_CAPACITY: usize = MAX_CAPACITY;

const _: () = assert!(
    MAX_CAPACITY <= u32::MAX as usize,
    "element indices must fit the u32 keys of the dirty-element bitmap"
);
const _: () = assert!(DEFAULT_MAX_SPARSE_CAPACITY <= MAX_CAPACITY);
const _: () = assert!(MIN_SPARSE_CAPACITY <= DEFAULT_INITIAL_CAPACITY);

// ============================================================================
// SIZING STRATEGY DEFAULTS
// ============================================================================

/// Multiplier applied by the doubling strategy when a sparse storage is full.
pub const GROWTH_FACTOR: usize = 2;

/// A sparse storage shrinks when `len * SHRINK_DIVISOR <= capacity`.
pub const SHRINK_DIVISOR: usize = 4;

const _: () = assert!(
    SHRINK_DIVISOR > GROWTH_FACTOR,
    "shrink threshold must sit below the post-growth fill level"
);

// ============================================================================
// MULTI-DIMENSIONAL ADDRESSING
// ============================================================================

/// Arity used by storages that are addressed by a flat index.
pub const DEFAULT_ARITY: usize = 1;

/// Largest number of coordinate dimensions a storage may declare.
pub const MAX_ARITY: usize = 8;

// ============================================================================
// COMPILER
// ============================================================================

/// Name of the discriminator field injected into unions with metadata.
pub const DISCRIMINATOR_NAME: &str = "$variant";

/// Separator between structure and field names in qualified paths.
pub const PATH_SEPARATOR: char = '.';
