//! Host model boundary
//!
//! The host application describes its persisted models with these types. The
//! descriptor builder only reads them; it never defines schema.

use crate::core::field::{FieldType, FieldValue};
use crate::core::store::Store;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Internal field kinds reported by the host model layer
///
/// Kinds without an adapter type (see [`HostFieldKind::field_type`]) are
/// rejected when a model is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostFieldKind {
    CharField,
    TextField,
    GenericIpAddressField,
    DecimalField,
    IntegerField,
    SmallIntegerField,
    PositiveIntegerField,
    PositiveSmallIntegerField,
    AutoField,
    FloatField,
    BooleanField,
    NullBooleanField,
    DateField,
    DateTimeField,
    TimeField,
    FileField,
    ImageField,
    ForeignKey,
    OneToOneField,
    ManyToManyField,
    BigIntegerField,
    BinaryField,
    DurationField,
    JsonField,
    UuidField,
    /// Anything the host reports that this crate does not know about
    Other(String),
}

impl HostFieldKind {
    /// Total mapping from host kind to adapter type
    ///
    /// `None` means the kind is unsupported.
    pub fn field_type(&self) -> Option<FieldType> {
        use HostFieldKind::*;
        match self {
            CharField | TextField | GenericIpAddressField => Some(FieldType::String),
            DecimalField | IntegerField | SmallIntegerField | PositiveIntegerField
            | PositiveSmallIntegerField | AutoField => Some(FieldType::Integer),
            FloatField => Some(FieldType::Float),
            BooleanField | NullBooleanField => Some(FieldType::Boolean),
            DateField | DateTimeField | TimeField => Some(FieldType::DateTime),
            FileField | ImageField => Some(FieldType::File),
            ForeignKey | OneToOneField | ManyToManyField => Some(FieldType::Model),
            BigIntegerField | BinaryField | DurationField | JsonField | UuidField | Other(_) => {
                None
            }
        }
    }

    pub fn as_str(&self) -> &str {
        use HostFieldKind::*;
        match self {
            CharField => "CharField",
            TextField => "TextField",
            GenericIpAddressField => "GenericIPAddressField",
            DecimalField => "DecimalField",
            IntegerField => "IntegerField",
            SmallIntegerField => "SmallIntegerField",
            PositiveIntegerField => "PositiveIntegerField",
            PositiveSmallIntegerField => "PositiveSmallIntegerField",
            AutoField => "AutoField",
            FloatField => "FloatField",
            BooleanField => "BooleanField",
            NullBooleanField => "NullBooleanField",
            DateField => "DateField",
            DateTimeField => "DateTimeField",
            TimeField => "TimeField",
            FileField => "FileField",
            ImageField => "ImageField",
            ForeignKey => "ForeignKey",
            OneToOneField => "OneToOneField",
            ManyToManyField => "ManyToManyField",
            BigIntegerField => "BigIntegerField",
            BinaryField => "BinaryField",
            DurationField => "DurationField",
            JsonField => "JSONField",
            UuidField => "UUIDField",
            Other(name) => name.as_str(),
        }
    }
}

impl fmt::Display for HostFieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HostFieldKind {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        use HostFieldKind::*;
        Ok(match s {
            "CharField" => CharField,
            "TextField" => TextField,
            "GenericIPAddressField" => GenericIpAddressField,
            "DecimalField" => DecimalField,
            "IntegerField" => IntegerField,
            "SmallIntegerField" => SmallIntegerField,
            "PositiveIntegerField" => PositiveIntegerField,
            "PositiveSmallIntegerField" => PositiveSmallIntegerField,
            "AutoField" => AutoField,
            "FloatField" => FloatField,
            "BooleanField" => BooleanField,
            "NullBooleanField" => NullBooleanField,
            "DateField" => DateField,
            "DateTimeField" => DateTimeField,
            "TimeField" => TimeField,
            "FileField" => FileField,
            "ImageField" => ImageField,
            "ForeignKey" => ForeignKey,
            "OneToOneField" => OneToOneField,
            "ManyToManyField" => ManyToManyField,
            "BigIntegerField" => BigIntegerField,
            "BinaryField" => BinaryField,
            "DurationField" => DurationField,
            "JSONField" => JsonField,
            "UUIDField" => UuidField,
            other => Other(other.to_string()),
        })
    }
}

/// Linking structure of a many-to-many relation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkModel {
    /// Link table generated by the host, carrying nothing but the two keys
    AutoCreated,
    /// User-defined link model (identifier), which may carry its own attributes
    Explicit(String),
}

/// Target of a relational field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relation {
    /// Fully-qualified identifier of the related model (`module.Name`)
    pub target: String,
    /// Present for many-to-many relations only
    pub link: Option<LinkModel>,
}

/// One persisted attribute as reported by the host
#[derive(Debug, Clone)]
pub struct HostField {
    pub name: String,
    pub kind: HostFieldKind,
    pub help_text: Option<String>,
    /// Blank values accepted
    pub blank: bool,
    /// Null stored for missing values
    pub null: bool,
    /// `None` is the "no default provided" sentinel
    pub default: Option<FieldValue>,
    pub max_length: Option<usize>,
    pub choices: Option<Vec<FieldValue>>,
    pub editable: bool,
    pub primary_key: bool,
    /// Generated by the host itself (implicit ids, reverse accessors)
    pub auto_created: bool,
    /// Explicit adapter type, bypassing the kind table
    pub type_override: Option<FieldType>,
    /// Explicit multi-valued flag, used when the relation does not decide it
    pub is_array: Option<bool>,
    pub relation: Option<Relation>,
}

impl HostField {
    pub fn new(name: impl Into<String>, kind: HostFieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            help_text: None,
            blank: false,
            null: false,
            default: None,
            max_length: None,
            choices: None,
            editable: true,
            primary_key: false,
            auto_created: false,
            type_override: None,
            is_array: None,
            relation: None,
        }
    }

    /// Character field with a maximum length
    pub fn char(name: impl Into<String>, max_length: usize) -> Self {
        Self::new(name, HostFieldKind::CharField).max_length(max_length)
    }

    pub fn integer(name: impl Into<String>) -> Self {
        Self::new(name, HostFieldKind::IntegerField)
    }

    /// Host-generated integer primary key
    pub fn auto_id() -> Self {
        let mut field = Self::new("id", HostFieldKind::AutoField);
        field.primary_key = true;
        field.auto_created = true;
        field.blank = true;
        field
    }

    pub fn foreign_key(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self::new(name, HostFieldKind::ForeignKey).relation(Relation {
            target: target.into(),
            link: None,
        })
    }

    pub fn many_to_many(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self::new(name, HostFieldKind::ManyToManyField)
            .relation(Relation {
                target: target.into(),
                link: Some(LinkModel::AutoCreated),
            })
            .blank()
    }

    pub fn many_to_many_through(
        name: impl Into<String>,
        target: impl Into<String>,
        through: impl Into<String>,
    ) -> Self {
        Self::new(name, HostFieldKind::ManyToManyField)
            .relation(Relation {
                target: target.into(),
                link: Some(LinkModel::Explicit(through.into())),
            })
            .blank()
    }

    pub fn help_text(mut self, text: impl Into<String>) -> Self {
        self.help_text = Some(text.into());
        self
    }

    pub fn blank(mut self) -> Self {
        self.blank = true;
        self
    }

    pub fn null(mut self) -> Self {
        self.null = true;
        self
    }

    pub fn default_value(mut self, value: impl Into<FieldValue>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn max_length(mut self, max_length: usize) -> Self {
        self.max_length = Some(max_length);
        self
    }

    pub fn choices(mut self, choices: Vec<FieldValue>) -> Self {
        self.choices = Some(choices);
        self
    }

    pub fn not_editable(mut self) -> Self {
        self.editable = false;
        self
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    pub fn auto_created(mut self) -> Self {
        self.auto_created = true;
        self
    }

    pub fn type_override(mut self, field_type: FieldType) -> Self {
        self.type_override = Some(field_type);
        self
    }

    pub fn array(mut self, is_array: bool) -> Self {
        self.is_array = Some(is_array);
        self
    }

    pub fn relation(mut self, relation: Relation) -> Self {
        self.relation = Some(relation);
        self
    }

    /// A value must be supplied on create
    pub fn is_required(&self) -> bool {
        !self.blank && self.default.is_none()
    }

    pub fn is_many_to_many(&self) -> bool {
        self.relation.as_ref().is_some_and(|r| r.link.is_some())
    }
}

/// A host model definition: its identity, documentation, store and fields
#[derive(Clone)]
pub struct ModelDefinition {
    /// Module path the model lives in (e.g. `inventory.models`)
    pub module: String,
    /// Model name (e.g. `Widget`)
    pub name: String,
    pub doc: Option<String>,
    /// Fields in their natural order, many-to-many fields included
    pub fields: Vec<HostField>,
    pub store: Arc<dyn Store>,
}

impl ModelDefinition {
    pub fn new(module: impl Into<String>, name: impl Into<String>, store: Arc<dyn Store>) -> Self {
        Self {
            module: module.into(),
            name: name.into(),
            doc: None,
            fields: Vec::new(),
            store,
        }
    }

    pub fn doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = Some(doc.into());
        self
    }

    pub fn field(mut self, field: HostField) -> Self {
        self.fields.push(field);
        self
    }

    /// Fully-qualified registry identifier (`module.Name`)
    pub fn identifier(&self) -> String {
        format!("{}.{}", self.module, self.name)
    }

    pub fn primary_key(&self) -> Option<&HostField> {
        self.fields.iter().find(|field| field.primary_key)
    }
}

impl fmt::Debug for ModelDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelDefinition")
            .field("module", &self.module)
            .field("name", &self.name)
            .field("fields", &self.fields)
            .field("engine", &self.store.engine())
            .finish()
    }
}
