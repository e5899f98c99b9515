//! # Virtual Field Mappers
//!
//! A virtual field has no storage. Reads and writes are forwarded to a
//! stateless mapper that receives the structure owning the field and the
//! storage the access was made through, so it can derive its value from
//! other fields of the selected element.
//!
//! ```ignore
//! #[derive(Debug)]
//! struct Area { width: Field, height: Field }
//!
//! impl VirtualMapper for Area {
//!     fn read(&self, _owner: StructureId, store: &dyn Store) -> Result<Value> {
//!         Ok(Value::Int(store.read_int(&self.width)? * store.read_int(&self.height)?))
//!     }
//!     fn write(&self, _: Value, _: StructureId, _: &mut dyn Store) -> Result<()> {
//!         eyre::bail!("area is derived")
//!     }
//! }
//! ```
//!
//! Mappers see the storage that holds the virtual field, so they can only
//! reach fields of the same home (plus globals).

use std::fmt::Debug;

use eyre::Result;

use crate::schema::StructureId;
use crate::storage::Store;
use crate::types::Value;

pub trait VirtualMapper: Debug + Send + Sync {
    fn read(&self, owner: StructureId, store: &dyn Store) -> Result<Value>;

    fn write(&self, value: Value, owner: StructureId, store: &mut dyn Store) -> Result<()>;

    /// Called when the selected element is cleared or default-initialized.
    fn clear(&self, _owner: StructureId, _store: &mut dyn Store) -> Result<()> {
        Ok(())
    }
}
