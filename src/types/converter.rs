//! # Converters
//!
//! A converter maps between the logical value a caller thinks in (`Datum`)
//! and one of the eight storable primitive kinds (`Value`). It also declares
//! how many bits the stored form needs, which is what the layout compiler
//! packs.
//!
//! ## Shipped Converters
//!
//! | Converter | Logical side | Stored kind | Bits |
//! |-----------|--------------|-------------|------|
//! | `IdentityConverter` | the primitive itself | any primitive | declared |
//! | `EnumConverter` | `Datum::Text(name)` | Int (ordinal) | bit length of `names - 1` |
//! | `OffsetConverter` | `Datum::Value(Long)` in `min..=max` | Int or Long (`v - min`) | bit length of `max - min` |
//!
//! Custom converters implement the trait directly. A field whose converter
//! disagrees with its declared kind or width is rejected when the schema is
//! built.

use std::fmt::Debug;

use eyre::{bail, ensure, Result};

use super::{Datum, Kind, Value};

pub trait Converter: Debug + Send + Sync {
    /// Primitive kind the converted value is stored as.
    fn kind(&self) -> Kind;

    fn bits(&self) -> u32;

    fn from_logical(&self, datum: &Datum) -> Result<Value>;

    fn to_logical(&self, value: Value) -> Result<Datum>;
}

/// Bit length of `n`, i.e. `ceil(log2(n + 1))`.
pub(crate) fn bit_length(n: u64) -> u32 {
    u64::BITS - n.leading_zeros()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdentityConverter {
    kind: Kind,
    bits: u32,
}

impl IdentityConverter {
    pub fn new(kind: Kind, bits: u32) -> Self {
        Self { kind, bits }
    }

    pub fn natural(kind: Kind) -> Self {
        Self::new(kind, kind.natural_bits())
    }
}

impl Converter for IdentityConverter {
    fn kind(&self) -> Kind {
        self.kind
    }

    fn bits(&self) -> u32 {
        self.bits
    }

    fn from_logical(&self, datum: &Datum) -> Result<Value> {
        match datum {
            Datum::Value(v) if v.kind() == self.kind => Ok(*v),
            other => bail!("expected a {} value, got {:?}", self.kind, other),
        }
    }

    fn to_logical(&self, value: Value) -> Result<Datum> {
        Ok(Datum::Value(value))
    }
}

/// Stores one of a fixed list of names as its ordinal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumConverter {
    names: Vec<String>,
    bits: u32,
}

impl EnumConverter {
    pub fn new<I, S>(names: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        ensure!(!names.is_empty(), "enum converter needs at least one name");
        for (i, name) in names.iter().enumerate() {
            ensure!(
                !names[..i].contains(name),
                "enum converter has duplicate name '{}'",
                name
            );
        }
        let bits = bit_length(names.len() as u64 - 1).max(1);
        Ok(Self { names, bits })
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn ordinal(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }
}

impl Converter for EnumConverter {
    fn kind(&self) -> Kind {
        Kind::Int
    }

    fn bits(&self) -> u32 {
        self.bits
    }

    fn from_logical(&self, datum: &Datum) -> Result<Value> {
        let ordinal = match datum {
            Datum::Text(name) => self
                .ordinal(name)
                .ok_or_else(|| eyre::eyre!("'{}' is not one of {:?}", name, self.names))?,
            Datum::Value(Value::Int(i)) if *i >= 0 && (*i as usize) < self.names.len() => {
                *i as usize
            }
            other => bail!("cannot convert {:?} to an enum ordinal", other),
        };
        Ok(Value::Int(ordinal as i32))
    }

    fn to_logical(&self, value: Value) -> Result<Datum> {
        let ordinal = value.as_i64();
        match usize::try_from(ordinal).ok().and_then(|i| self.names.get(i)) {
            Some(name) => Ok(Datum::Text(name.clone())),
            None => bail!(
                "stored ordinal {} is outside the {} enum names",
                ordinal,
                self.names.len()
            ),
        }
    }
}

/// Stores an integer range `min..=max` as the unsigned offset `v - min`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OffsetConverter {
    min: i64,
    max: i64,
    bits: u32,
}

impl OffsetConverter {
    pub fn new(min: i64, max: i64) -> Result<Self> {
        ensure!(min <= max, "offset converter range {}..={} is empty", min, max);
        let span = (max as i128 - min as i128) as u64;
        let bits = bit_length(span).max(1);
        Ok(Self { min, max, bits })
    }

    pub fn min(&self) -> i64 {
        self.min
    }

    pub fn max(&self) -> i64 {
        self.max
    }
}

impl Converter for OffsetConverter {
    fn kind(&self) -> Kind {
        if self.bits <= 32 {
            Kind::Int
        } else {
            Kind::Long
        }
    }

    fn bits(&self) -> u32 {
        self.bits
    }

    fn from_logical(&self, datum: &Datum) -> Result<Value> {
        let v = match datum {
            Datum::Value(v) => v.as_i64(),
            other => bail!("cannot convert {:?} to an integer offset", other),
        };
        ensure!(
            v >= self.min && v <= self.max,
            "{} is outside {}..={}",
            v,
            self.min,
            self.max
        );
        let offset = v.wrapping_sub(self.min);
        Ok(match self.kind() {
            Kind::Int => Value::Int(offset as u32 as i32),
            _ => Value::Long(offset),
        })
    }

    fn to_logical(&self, value: Value) -> Result<Datum> {
        let raw = value.to_bits();
        Ok(Datum::Value(Value::Long(self.min.wrapping_add(raw as i64))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bit_length_is_ceil_log2_of_successor() {
        assert_eq!(bit_length(0), 0);
        assert_eq!(bit_length(1), 1);
        assert_eq!(bit_length(2), 2);
        assert_eq!(bit_length(3), 2);
        assert_eq!(bit_length(4), 3);
        assert_eq!(bit_length(u64::MAX), 64);
    }

    #[test]
    fn identity_rejects_other_kinds() {
        let conv = IdentityConverter::natural(Kind::Int);
        assert_eq!(conv.from_logical(&Value::Int(7).into()).unwrap(), Value::Int(7));
        assert!(conv.from_logical(&Value::Long(7).into()).is_err());
    }

    #[test]
    fn enum_converter_sizes_to_name_count() {
        let conv = EnumConverter::new(["red", "green", "blue"]).unwrap();
        assert_eq!(conv.bits(), 2);
        assert_eq!(conv.kind(), Kind::Int);
        assert_eq!(conv.from_logical(&"blue".into()).unwrap(), Value::Int(2));
        assert_eq!(conv.to_logical(Value::Int(1)).unwrap(), Datum::from("green"));
        assert!(conv.from_logical(&"purple".into()).is_err());
        assert!(conv.to_logical(Value::Int(3)).is_err());
    }

    #[test]
    fn single_name_enum_still_needs_one_bit() {
        let conv = EnumConverter::new(["only"]).unwrap();
        assert_eq!(conv.bits(), 1);
    }

    #[test]
    fn enum_converter_rejects_duplicates() {
        let err = EnumConverter::new(["a", "b", "a"]).unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn offset_converter_stores_negative_range_unsigned() {
        let conv = OffsetConverter::new(-100, 100).unwrap();
        assert_eq!(conv.bits(), 8);
        let stored = conv.from_logical(&Value::Long(-100).into()).unwrap();
        assert_eq!(stored, Value::Int(0));
        let stored = conv.from_logical(&Value::Int(27).into()).unwrap();
        assert_eq!(conv.to_logical(stored).unwrap(), Datum::Value(Value::Long(27)));
        assert!(conv.from_logical(&Value::Long(101).into()).is_err());
    }

    #[test]
    fn wide_offset_range_stores_as_long() {
        let conv = OffsetConverter::new(0, 1 << 40).unwrap();
        assert_eq!(conv.kind(), Kind::Long);
        assert_eq!(conv.bits(), 41);
    }
}
