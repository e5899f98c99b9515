//! # Internal Macros
//!
//! This module provides internal macros for reducing boilerplate in wordpack.
//!
//! ## store_accessors!
//!
//! Generates the typed `read_<kind>` / `write_<kind>` pairs of the
//! [`Store`](crate::storage::Store) trait on top of its untyped
//! `read_value` / `write_value`.
//!
//! ### Usage
//!
//! ```ignore
//! pub trait Store {
//!     fn read_value(&self, field: &Field) -> Result<Value>;
//!     fn write_value(&mut self, field: &Field, value: Value) -> Result<Value>;
//!
//!     store_accessors! {
//!         int: i32 => Int,
//!         long: i64 => Long,
//!     }
//! }
//!
//! // Generates:
//! // fn read_int(&self, field: &Field) -> Result<i32>
//! // fn write_int(&mut self, field: &Field, value: i32) -> Result<i32>
//! // fn read_long(&self, field: &Field) -> Result<i64>
//! // fn write_long(&mut self, field: &Field, value: i64) -> Result<i64>
//! ```
//!
//! A kind mismatch between the accessor and the field is an error, never a
//! silent conversion.

/// Generates typed read/write accessors over `read_value`/`write_value`.
#[macro_export]
#[doc(hidden)]
macro_rules! store_accessors {
    (@impl $name:ident, $ty:ty, $variant:ident) => {
        ::paste::paste! {
            #[inline]
            fn [<read_ $name>](
                &self,
                field: &$crate::compiler::Field,
            ) -> ::eyre::Result<$ty> {
                match self.read_value(field)? {
                    $crate::types::Value::$variant(v) => Ok(v),
                    other => ::eyre::bail!(
                        "cannot read {} field as {}",
                        other.kind(),
                        $crate::types::Kind::$variant
                    ),
                }
            }

            #[inline]
            fn [<write_ $name>](
                &mut self,
                field: &$crate::compiler::Field,
                value: $ty,
            ) -> ::eyre::Result<$ty> {
                ::eyre::ensure!(
                    field.kind() == $crate::types::Kind::$variant,
                    "cannot write {} to a {} field",
                    $crate::types::Kind::$variant,
                    field.kind()
                );
                match self.write_value(field, $crate::types::Value::$variant(value))? {
                    $crate::types::Value::$variant(v) => Ok(v),
                    other => ::eyre::bail!(
                        "write to {} field returned a {} value",
                        $crate::types::Kind::$variant,
                        other.kind()
                    ),
                }
            }
        }
    };
    ($($name:ident : $ty:ty => $variant:ident),* $(,)?) => {
        $(
            $crate::store_accessors!(@impl $name, $ty, $variant);
        )*
    };
}
