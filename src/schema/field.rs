//! # Field Definitions
//!
//! A field is an immutable descriptor: a name, a storable [`Kind`], a bit
//! width, a [`Category`] and a converter. Callers describe fields with the
//! fluent [`FieldSpec`]; [`Schema::build`](super::Schema::build) validates
//! each spec and interns it as a [`FieldDef`] addressed by [`FieldId`].
//!
//! ## Categories
//!
//! | Category | Storage | Shared by |
//! |----------|---------|-----------|
//! | **Plain** | packed bits in every element | one element |
//! | **Global** | packed bits in a capacity-1 global block | all elements |
//! | **Optional** | sparse value store, default when absent | one element |
//! | **Virtual** | none, computed by a [`VirtualMapper`] | - |
//!
//! Object-kind fields are always Plain and live in a per-element object
//! array rather than in bits.
//!
//! ## Validation
//!
//! - width must be accepted by the kind (`1..=natural`, floats exact)
//! - a converter must agree with the declared kind and width
//! - defaults only on Optional fields, and must fit the width
//! - mappers only on Virtual fields, and Virtual fields need one

use std::sync::Arc;

use eyre::{bail, ensure, Result};

use crate::config::{DISCRIMINATOR_NAME, PATH_SEPARATOR};
use crate::schema::{StructureId, VirtualMapper};
use crate::types::{Converter, IdentityConverter, Kind, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldId(pub(crate) u32);

impl FieldId {
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Category {
    #[default]
    Plain,
    Global,
    Optional,
    Virtual,
}

#[derive(Debug, Clone)]
pub struct FieldSpec {
    name: String,
    kind: Kind,
    bits: Option<u32>,
    category: Category,
    metadata: bool,
    converter: Option<Arc<dyn Converter>>,
    mapper: Option<Arc<dyn VirtualMapper>>,
    default: Option<Value>,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, kind: Kind) -> Self {
        Self {
            name: name.into(),
            kind,
            bits: None,
            category: Category::Plain,
            metadata: false,
            converter: None,
            mapper: None,
            default: None,
        }
    }

    /// Closed constructor table keyed by kind tag, used by deserializers.
    pub fn of_kind(name: impl Into<String>, tag: u8) -> Result<Self> {
        Ok(Self::new(name, Kind::from_u8(tag)?))
    }

    pub fn bool(name: impl Into<String>) -> Self {
        Self::new(name, Kind::Bool)
    }

    pub fn byte(name: impl Into<String>) -> Self {
        Self::new(name, Kind::Byte)
    }

    pub fn char(name: impl Into<String>) -> Self {
        Self::new(name, Kind::Char)
    }

    pub fn short(name: impl Into<String>) -> Self {
        Self::new(name, Kind::Short)
    }

    pub fn int(name: impl Into<String>) -> Self {
        Self::new(name, Kind::Int)
    }

    pub fn long(name: impl Into<String>) -> Self {
        Self::new(name, Kind::Long)
    }

    pub fn float(name: impl Into<String>) -> Self {
        Self::new(name, Kind::Float)
    }

    pub fn double(name: impl Into<String>) -> Self {
        Self::new(name, Kind::Double)
    }

    pub fn object(name: impl Into<String>) -> Self {
        Self::new(name, Kind::Object)
    }

    /// A field whose kind and width come from its converter.
    pub fn converted(name: impl Into<String>, converter: Arc<dyn Converter>) -> Self {
        let mut spec = Self::new(name, converter.kind());
        spec.bits = Some(converter.bits());
        spec.converter = Some(converter);
        spec
    }

    pub fn with_bits(mut self, bits: u32) -> Self {
        self.bits = Some(bits);
        self
    }

    pub fn with_category(mut self, category: Category) -> Self {
        self.category = category;
        self
    }

    pub fn global(self) -> Self {
        self.with_category(Category::Global)
    }

    pub fn optional(mut self, default: Option<Value>) -> Self {
        self.category = Category::Optional;
        self.default = default;
        self
    }

    pub fn virtual_with(mut self, mapper: Arc<dyn VirtualMapper>) -> Self {
        self.category = Category::Virtual;
        self.mapper = Some(mapper);
        self
    }

    pub fn with_converter(mut self, converter: Arc<dyn Converter>) -> Self {
        self.converter = Some(converter);
        self
    }

    /// Marks a union field as shared by every variant.
    pub fn as_metadata(mut self) -> Self {
        self.metadata = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_metadata(&self) -> bool {
        self.metadata
    }

    pub(crate) fn into_def(self, owner: StructureId) -> Result<FieldDef> {
        validate_name(&self.name, "field")?;
        ensure!(
            self.name != DISCRIMINATOR_NAME,
            "field name '{}' is reserved for union discriminators",
            self.name
        );

        let bits = self.bits.unwrap_or_else(|| self.kind.natural_bits());
        if self.kind == Kind::Object {
            ensure!(
                self.category == Category::Plain,
                "object field '{}' must be plain, not {:?}",
                self.name,
                self.category
            );
            ensure!(
                self.converter.is_none() && self.default.is_none(),
                "object field '{}' cannot carry a converter or default",
                self.name
            );
            ensure!(!self.metadata, "object field '{}' cannot be metadata", self.name);
        } else {
            ensure!(
                self.kind.accepts_bits(bits),
                "field '{}' declares {} bits, {} accepts {}",
                self.name,
                bits,
                self.kind,
                if self.kind.is_fixed_width() {
                    format!("exactly {}", self.kind.natural_bits())
                } else {
                    format!("1..={}", self.kind.natural_bits())
                }
            );
        }

        let converter: Arc<dyn Converter> = match self.converter {
            Some(conv) => {
                ensure!(
                    conv.kind() == self.kind,
                    "converter for '{}' stores {}, field is {}",
                    self.name,
                    conv.kind(),
                    self.kind
                );
                ensure!(
                    conv.bits() == bits,
                    "converter for '{}' needs {} bits, field declares {}",
                    self.name,
                    conv.bits(),
                    bits
                );
                conv
            }
            None => Arc::new(IdentityConverter::new(self.kind, bits)),
        };

        match (self.category, &self.mapper) {
            (Category::Virtual, None) => {
                bail!("virtual field '{}' has no mapper", self.name)
            }
            (Category::Virtual, Some(_)) => {}
            (_, Some(_)) => bail!(
                "field '{}' has a mapper but is {:?}, not virtual",
                self.name,
                self.category
            ),
            _ => {}
        }

        if let Some(default) = self.default {
            ensure!(
                self.category == Category::Optional,
                "field '{}' has a default but is {:?}, not optional",
                self.name,
                self.category
            );
            ensure!(
                default.kind() == self.kind,
                "default for '{}' is {}, field is {}",
                self.name,
                default.kind(),
                self.kind
            );
            ensure!(
                default.same_bits(&default.truncated(bits)),
                "default {} for '{}' does not fit in {} bits",
                default,
                self.name,
                bits
            );
        }

        Ok(FieldDef {
            name: self.name,
            kind: self.kind,
            bits,
            category: self.category,
            metadata: self.metadata,
            converter,
            mapper: self.mapper,
            default: self.default,
            owner,
        })
    }
}

pub(crate) fn validate_name(name: &str, what: &str) -> Result<()> {
    ensure!(!name.is_empty(), "{} name cannot be empty", what);
    ensure!(
        !name.contains(PATH_SEPARATOR),
        "{} name '{}' cannot contain '{}'",
        what,
        name,
        PATH_SEPARATOR
    );
    Ok(())
}

#[derive(Debug, Clone)]
pub struct FieldDef {
    name: String,
    kind: Kind,
    bits: u32,
    category: Category,
    metadata: bool,
    converter: Arc<dyn Converter>,
    mapper: Option<Arc<dyn VirtualMapper>>,
    default: Option<Value>,
    owner: StructureId,
}

impl FieldDef {
    /// The `$variant` field injected into a union during compilation.
    pub(crate) fn discriminator(owner: StructureId, bits: u32) -> Self {
        Self {
            name: DISCRIMINATOR_NAME.to_string(),
            kind: Kind::Int,
            bits,
            category: Category::Plain,
            metadata: true,
            converter: Arc::new(IdentityConverter::new(Kind::Int, bits)),
            mapper: None,
            default: None,
            owner,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> Kind {
        self.kind
    }

    pub fn bits(&self) -> u32 {
        self.bits
    }

    pub fn category(&self) -> Category {
        self.category
    }

    pub fn is_metadata(&self) -> bool {
        self.metadata
    }

    pub fn converter(&self) -> &Arc<dyn Converter> {
        &self.converter
    }

    pub fn mapper(&self) -> Option<&Arc<dyn VirtualMapper>> {
        self.mapper.as_ref()
    }

    pub fn owner(&self) -> StructureId {
        self.owner
    }

    /// Value an optional field reads as when nothing is stored.
    pub fn default_value(&self) -> Option<Value> {
        self.default.or_else(|| Value::zero(self.kind))
    }

    /// True for fields packed into the bits of every element.
    pub fn is_packed(&self) -> bool {
        self.category == Category::Plain && self.kind.is_primitive()
    }
}
