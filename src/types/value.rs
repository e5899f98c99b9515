//! # Primitive Values
//!
//! `Value` is the stored representation of a primitive field. Every variant
//! maps to and from a raw `u64` bit pattern, which is what the storage engine
//! actually masks and shifts into words.
//!
//! ## Bit Patterns
//!
//! | Variant | Raw pattern |
//! |---------|-------------|
//! | Bool | 0 or 1 |
//! | Byte, Short, Int | two's complement, zero-extended to 64 bits |
//! | Char | UTF-16 code unit |
//! | Long | two's complement |
//! | Float | IEEE-754 binary32 |
//! | Double | IEEE-754 binary64 |
//!
//! A field narrower than its kind's natural width stores the low `bits` of
//! the pattern. Reading zero-extends, so a 20-bit `Int` field holds
//! `0..=0xF_FFFF`; negative values need the full width or an
//! [`OffsetConverter`](crate::types::OffsetConverter).
//!
//! ## Equality
//!
//! Change detection compares raw patterns via [`Value::same_bits`], so a
//! rewrite of `NaN` with the same payload is a no-op and `0.0` vs `-0.0` is a
//! change.

use super::Kind;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    Bool(bool),
    Byte(i8),
    Char(u16),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
}

impl Value {
    pub fn kind(&self) -> Kind {
        match self {
            Value::Bool(_) => Kind::Bool,
            Value::Byte(_) => Kind::Byte,
            Value::Char(_) => Kind::Char,
            Value::Short(_) => Kind::Short,
            Value::Int(_) => Kind::Int,
            Value::Long(_) => Kind::Long,
            Value::Float(_) => Kind::Float,
            Value::Double(_) => Kind::Double,
        }
    }

    /// Zero value of a primitive kind; `None` for `Object`.
    pub fn zero(kind: Kind) -> Option<Value> {
        Some(match kind {
            Kind::Bool => Value::Bool(false),
            Kind::Byte => Value::Byte(0),
            Kind::Char => Value::Char(0),
            Kind::Short => Value::Short(0),
            Kind::Int => Value::Int(0),
            Kind::Long => Value::Long(0),
            Kind::Float => Value::Float(0.0),
            Kind::Double => Value::Double(0.0),
            Kind::Object => return None,
        })
    }

    #[inline]
    pub fn to_bits(self) -> u64 {
        match self {
            Value::Bool(v) => v as u64,
            Value::Byte(v) => v as u8 as u64,
            Value::Char(v) => v as u64,
            Value::Short(v) => v as u16 as u64,
            Value::Int(v) => v as u32 as u64,
            Value::Long(v) => v as u64,
            Value::Float(v) => v.to_bits() as u64,
            Value::Double(v) => v.to_bits(),
        }
    }

    /// Rebuilds a value from a raw pattern. Returns `None` for `Object`.
    #[inline]
    pub fn from_bits(kind: Kind, raw: u64) -> Option<Value> {
        Some(match kind {
            Kind::Bool => Value::Bool(raw & 1 != 0),
            Kind::Byte => Value::Byte(raw as u8 as i8),
            Kind::Char => Value::Char(raw as u16),
            Kind::Short => Value::Short(raw as u16 as i16),
            Kind::Int => Value::Int(raw as u32 as i32),
            Kind::Long => Value::Long(raw as i64),
            Kind::Float => Value::Float(f32::from_bits(raw as u32)),
            Kind::Double => Value::Double(f64::from_bits(raw)),
            Kind::Object => return None,
        })
    }

    #[inline]
    pub fn same_bits(&self, other: &Value) -> bool {
        self.kind() == other.kind() && self.to_bits() == other.to_bits()
    }

    /// Truncates the pattern to `bits`, the value a field of that width
    /// would read back.
    pub fn truncated(self, bits: u32) -> Value {
        let raw = if bits >= 64 {
            self.to_bits()
        } else {
            self.to_bits() & ((1u64 << bits) - 1)
        };
        match Value::from_bits(self.kind(), raw) {
            Some(value) => value,
            None => self,
        }
    }

    /// Widens integer-like values to `i64`; floats are truncated.
    pub fn as_i64(&self) -> i64 {
        match *self {
            Value::Bool(v) => v as i64,
            Value::Byte(v) => v as i64,
            Value::Char(v) => v as i64,
            Value::Short(v) => v as i64,
            Value::Int(v) => v as i64,
            Value::Long(v) => v,
            Value::Float(v) => v as i64,
            Value::Double(v) => v as i64,
        }
    }

    /// Builds a value of `kind` from an `i64`, wrapping to the kind's width.
    pub fn from_i64(kind: Kind, v: i64) -> Option<Value> {
        Some(match kind {
            Kind::Bool => Value::Bool(v != 0),
            Kind::Byte => Value::Byte(v as i8),
            Kind::Char => Value::Char(v as u16),
            Kind::Short => Value::Short(v as i16),
            Kind::Int => Value::Int(v as i32),
            Kind::Long => Value::Long(v),
            Kind::Float => Value::Float(v as f32),
            Kind::Double => Value::Double(v as f64),
            Kind::Object => return None,
        })
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Bool(v) => write!(f, "{}", v),
            Value::Byte(v) => write!(f, "{}", v),
            Value::Char(v) => match char::from_u32(*v as u32) {
                Some(c) => write!(f, "'{}'", c),
                None => write!(f, "\\u{:04x}", v),
            },
            Value::Short(v) => write!(f, "{}", v),
            Value::Int(v) => write!(f, "{}", v),
            Value::Long(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Double(v) => write!(f, "{}", v),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_byte_pattern_is_zero_extended() {
        assert_eq!(Value::Byte(-1).to_bits(), 0xFF);
        assert_eq!(Value::from_bits(Kind::Byte, 0xFF), Some(Value::Byte(-1)));
    }

    #[test]
    fn float_and_double_use_ieee_patterns() {
        let f = Value::Float(1.5);
        assert_eq!(f.to_bits(), 1.5f32.to_bits() as u64);
        assert_eq!(Value::from_bits(Kind::Float, f.to_bits()), Some(f));

        let d = Value::Double(-2.25);
        assert_eq!(Value::from_bits(Kind::Double, d.to_bits()), Some(d));
    }

    #[test]
    fn same_bits_distinguishes_signed_zero() {
        assert!(!Value::Double(0.0).same_bits(&Value::Double(-0.0)));
        assert!(Value::Float(f32::NAN).same_bits(&Value::Float(f32::NAN)));
    }

    #[test]
    fn same_bits_requires_matching_kind() {
        assert!(!Value::Int(1).same_bits(&Value::Long(1)));
    }

    #[test]
    fn truncated_keeps_low_bits_only() {
        assert_eq!(Value::Int(0x1F_FFFF).truncated(20), Value::Int(0xF_FFFF));
        assert_eq!(Value::Long(-1).truncated(64), Value::Long(-1));
    }

    #[test]
    fn zero_is_none_for_object() {
        assert_eq!(Value::zero(Kind::Object), None);
        assert_eq!(Value::zero(Kind::Char), Some(Value::Char(0)));
    }
}
