//! # Storable Kinds
//!
//! `Kind` is the closed set of things a field can hold. Eight of them are
//! primitives that pack into words; `Object` is stored by reference in a
//! parallel per-element object array and never occupies bits.
//!
//! ## Natural Widths
//!
//! | Kind | Natural bits | Sub-width allowed |
//! |------|--------------|-------------------|
//! | Bool | 1 | - |
//! | Byte | 8 | yes |
//! | Char | 16 | yes |
//! | Short | 16 | yes |
//! | Int | 32 | yes |
//! | Long | 64 | yes |
//! | Float | 32 | no |
//! | Double | 64 | no |
//! | Object | 0 | - |
//!
//! ## Discriminant Values
//!
//! `#[repr(u8)]` discriminants are stable and used by [`Kind::from_u8`], the
//! closed constructor table that external deserializers use to rebuild
//! field descriptors.

use eyre::{bail, Result};

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Kind {
    Bool = 0,
    Byte = 1,
    Char = 2,
    Short = 3,
    Int = 4,
    Long = 5,
    Float = 6,
    Double = 7,
    Object = 8,
}

impl Kind {
    /// Every kind that packs into words, in discriminant order.
    pub const PRIMITIVES: [Kind; 8] = [
        Kind::Bool,
        Kind::Byte,
        Kind::Char,
        Kind::Short,
        Kind::Int,
        Kind::Long,
        Kind::Float,
        Kind::Double,
    ];

    pub fn natural_bits(&self) -> u32 {
        match self {
            Kind::Bool => 1,
            Kind::Byte => 8,
            Kind::Char | Kind::Short => 16,
            Kind::Int | Kind::Float => 32,
            Kind::Long | Kind::Double => 64,
            Kind::Object => 0,
        }
    }

    pub fn is_primitive(&self) -> bool {
        !matches!(self, Kind::Object)
    }

    /// Floating point kinds reinterpret raw bits and cannot be narrowed.
    pub fn is_fixed_width(&self) -> bool {
        matches!(self, Kind::Bool | Kind::Float | Kind::Double | Kind::Object)
    }

    pub fn accepts_bits(&self, bits: u32) -> bool {
        if self.is_fixed_width() {
            bits == self.natural_bits()
        } else {
            bits >= 1 && bits <= self.natural_bits()
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Kind::Bool => "bool",
            Kind::Byte => "byte",
            Kind::Char => "char",
            Kind::Short => "short",
            Kind::Int => "int",
            Kind::Long => "long",
            Kind::Float => "float",
            Kind::Double => "double",
            Kind::Object => "object",
        }
    }

    pub fn from_u8(tag: u8) -> Result<Self> {
        Ok(match tag {
            0 => Kind::Bool,
            1 => Kind::Byte,
            2 => Kind::Char,
            3 => Kind::Short,
            4 => Kind::Int,
            5 => Kind::Long,
            6 => Kind::Float,
            7 => Kind::Double,
            8 => Kind::Object,
            other => bail!("unknown field kind tag {}", other),
        })
    }
}

impl std::fmt::Display for Kind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
