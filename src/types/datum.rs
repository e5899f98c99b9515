//! # Logical Values
//!
//! A `Datum` is what callers see through [`Store::read_any`] and
//! [`Store::write_any`]: the converter-mapped logical value of a field.
//! Identity-converted fields surface as `Datum::Value`; enum converters
//! surface as `Datum::Text`; object fields surface as `Datum::Object`.
//!
//! Objects are opaque shared references. Two object datums are equal only if
//! they point at the same allocation.
//!
//! [`Store::read_any`]: crate::storage::Store::read_any
//! [`Store::write_any`]: crate::storage::Store::write_any

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use super::Value;

/// Opaque reference stored in object-typed fields.
pub type ObjectRef = Arc<dyn Any + Send + Sync>;

#[derive(Clone)]
pub enum Datum {
    Value(Value),
    Text(String),
    Object(Option<ObjectRef>),
}

impl Datum {
    pub fn as_value(&self) -> Option<Value> {
        match self {
            Datum::Value(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Datum::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Datum::Object(o) => o.as_ref(),
            _ => None,
        }
    }
}

impl From<Value> for Datum {
    fn from(value: Value) -> Self {
        Datum::Value(value)
    }
}

impl From<&str> for Datum {
    fn from(value: &str) -> Self {
        Datum::Text(value.to_string())
    }
}

impl PartialEq for Datum {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Datum::Value(a), Datum::Value(b)) => a == b,
            (Datum::Text(a), Datum::Text(b)) => a == b,
            (Datum::Object(None), Datum::Object(None)) => true,
            (Datum::Object(Some(a)), Datum::Object(Some(b))) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Datum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Datum::Value(v) => f.debug_tuple("Value").field(v).finish(),
            Datum::Text(s) => f.debug_tuple("Text").field(s).finish(),
            Datum::Object(None) => f.write_str("Object(None)"),
            Datum::Object(Some(o)) => write!(f, "Object({:p})", Arc::as_ptr(o)),
        }
    }
}
