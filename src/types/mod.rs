//! # Field Value Types
//!
//! This module provides the value vocabulary shared by the schema, the layout
//! compiler and the storage engine.
//!
//! ## Module Structure
//!
//! - `kind`: `Kind`, the closed set of storable kinds and their widths
//! - `value`: `Value`, a primitive with a raw 64-bit pattern
//! - `datum`: `Datum`, the converter-mapped logical value, and `ObjectRef`
//! - `converter`: the `Converter` trait and the shipped converters
//!
//! ## Key Types
//!
//! | Type | Purpose |
//! |------|---------|
//! | `Kind` | Which primitive (or object) a field holds |
//! | `Value` | Stored primitive, convertible to/from raw bits |
//! | `Datum` | Logical value seen by generic walkers |
//! | `Converter` | Maps `Datum` <-> `Value` and declares bit width |
//!
//! ## Usage
//!
//! ```ignore
//! use wordpack::types::{Converter, EnumConverter, Datum, Value};
//!
//! let colour = EnumConverter::new(["red", "green", "blue"])?;
//! assert_eq!(colour.bits(), 2);
//! assert_eq!(colour.from_logical(&Datum::from("blue"))?, Value::Int(2));
//! ```

mod converter;
mod datum;
mod kind;
mod value;

pub(crate) use converter::bit_length;
pub use converter::{Converter, EnumConverter, IdentityConverter, OffsetConverter};
pub use datum::{Datum, ObjectRef};
pub use kind::Kind;
pub use value::Value;
