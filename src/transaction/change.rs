use crate::compiler::Field;
use crate::schema::FieldDef;
use crate::types::{Datum, Kind, Value};
use eyre::Result;

/// One field of one element that differs between snapshot and commit.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeRecord {
    pub field: Field,
    pub element: usize,
    pub old: Value,
    pub new: Value,
    pub old_datum: Datum,
    pub new_datum: Datum,
}

impl ChangeRecord {
    pub(crate) fn new(
        field: Field,
        def: &FieldDef,
        element: usize,
        old: Value,
        new: Value,
    ) -> Result<Self> {
        let converter = def.converter();
        Ok(Self {
            field,
            element,
            old,
            new,
            old_datum: converter.to_logical(old)?,
            new_datum: converter.to_logical(new)?,
        })
    }

    pub fn kind(&self) -> Kind {
        self.field.kind()
    }
}
