// Semantic model built by the resolver.
// - Top-level tables hold enums, messages and services by name.
// - Messages hold nested enums and fields in declaration order.
// - Field type is either a scalar or a custom (message or enum) type.
// - Nothing here is mutated once the resolver has returned it.

use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

/// Map key under which a message's tagged union is stored.
pub const ONEOF_FIELD_KEY: &str = "oneof message";

/// Map key prefix for retired field numbers.
pub const RESERVED_FIELD_KEY_PREFIX: &str = "reserved_field_number_";

/// Ordinal of the tagged-union container itself.
pub const ONEOF_ORDINAL: i32 = -1;

/// Largest field number protobuf allows; `max` in a reserved range.
pub const MAX_FIELD_NUMBER: i32 = 536_870_911;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarType {
    Double,
    Float,
    Int32,
    Int64,
    Uint32,
    Uint64,
    Sint32,
    Sint64,
    Fixed32,
    Fixed64,
    Sfixed32,
    Sfixed64,
    Bool,
    String,
    Bytes,
}

impl ScalarType {
    pub fn from_name(name: &str) -> Option<Self> {
        let scalar = match name {
            "double" => ScalarType::Double,
            "float" => ScalarType::Float,
            "int32" => ScalarType::Int32,
            "int64" => ScalarType::Int64,
            "uint32" => ScalarType::Uint32,
            "uint64" => ScalarType::Uint64,
            "sint32" => ScalarType::Sint32,
            "sint64" => ScalarType::Sint64,
            "fixed32" => ScalarType::Fixed32,
            "fixed64" => ScalarType::Fixed64,
            "sfixed32" => ScalarType::Sfixed32,
            "sfixed64" => ScalarType::Sfixed64,
            "bool" => ScalarType::Bool,
            "string" => ScalarType::String,
            "bytes" => ScalarType::Bytes,
            _ => return None,
        };
        Some(scalar)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ScalarType::Double => "double",
            ScalarType::Float => "float",
            ScalarType::Int32 => "int32",
            ScalarType::Int64 => "int64",
            ScalarType::Uint32 => "uint32",
            ScalarType::Uint64 => "uint64",
            ScalarType::Sint32 => "sint32",
            ScalarType::Sint64 => "sint64",
            ScalarType::Fixed32 => "fixed32",
            ScalarType::Fixed64 => "fixed64",
            ScalarType::Sfixed32 => "sfixed32",
            ScalarType::Sfixed64 => "sfixed64",
            ScalarType::Bool => "bool",
            ScalarType::String => "string",
            ScalarType::Bytes => "bytes",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldType {
    Scalar(ScalarType),
    Custom(String), // as written in the source, possibly qualified
}

impl FieldType {
    pub fn from_name(name: &str) -> Self {
        match ScalarType::from_name(name) {
            Some(scalar) => FieldType::Scalar(scalar),
            None => FieldType::Custom(name.to_string()),
        }
    }

    pub fn custom_name(&self) -> Option<&str> {
        match self {
            FieldType::Custom(name) => Some(name),
            FieldType::Scalar(_) => None,
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::Scalar(s) => f.write_str(s.as_str()),
            FieldType::Custom(name) => f.write_str(name),
        }
    }
}

// ---------------- Fields ----------------

#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    Typed {
        declared_type: FieldType,
        repeated: bool,
    },
    Map {
        key_type: FieldType,
        value_type: FieldType,
    },
    /// A tagged union; alternatives keep declaration order.
    Oneof { alternatives: Vec<FieldDefinition> },
    /// Retired numbers from the field's ordinal up to `end`, inclusive.
    Reserved { end: i32 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldDefinition {
    pub name: String,
    pub kind: FieldKind,
    pub ordinal: i32,
    pub description: String,
    pub deprecated: bool,
}

impl FieldDefinition {
    /// The single declared type; `None` for tagged unions, maps and reserved slots.
    pub fn declared_type(&self) -> Option<&FieldType> {
        match &self.kind {
            FieldKind::Typed { declared_type, .. } => Some(declared_type),
            _ => None,
        }
    }

    pub fn is_repeated(&self) -> bool {
        matches!(self.kind, FieldKind::Typed { repeated: true, .. })
    }

    pub fn is_oneof(&self) -> bool {
        matches!(self.kind, FieldKind::Oneof { .. })
    }

    pub fn is_map(&self) -> bool {
        matches!(self.kind, FieldKind::Map { .. })
    }

    pub fn is_reserved(&self) -> bool {
        matches!(self.kind, FieldKind::Reserved { .. })
    }

    /// `N`, `N to M` or `N to max` for a reserved slot.
    pub fn reserved_numbers(&self) -> Option<String> {
        match self.kind {
            FieldKind::Reserved { end } if end == self.ordinal => Some(end.to_string()),
            FieldKind::Reserved { end: MAX_FIELD_NUMBER } => Some(format!("{} to max", self.ordinal)),
            FieldKind::Reserved { end } => Some(format!("{} to {end}", self.ordinal)),
            _ => None,
        }
    }

    pub fn alternatives(&self) -> &[FieldDefinition] {
        match &self.kind {
            FieldKind::Oneof { alternatives } => alternatives,
            _ => &[],
        }
    }

    /// Every custom type this field points at: its own type, a map's value
    /// type, or the types of a union's alternatives.
    pub fn referenced_types(&self) -> Vec<&str> {
        match &self.kind {
            FieldKind::Typed { declared_type, .. } => declared_type.custom_name().into_iter().collect(),
            FieldKind::Map { value_type, .. } => value_type.custom_name().into_iter().collect(),
            FieldKind::Oneof { alternatives } => alternatives
                .iter()
                .flat_map(FieldDefinition::referenced_types)
                .collect(),
            FieldKind::Reserved { .. } => Vec::new(),
        }
    }
}

// ---------------- Enums ----------------

#[derive(Debug, Clone, PartialEq)]
pub struct EnumConstant {
    pub value: i32,
    pub description: String,
    pub deprecated: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumDefinition {
    pub name: String,
    pub constants: IndexMap<String, EnumConstant>,
    pub description: String,
    /// Declared at file scope rather than inside a message.
    pub is_global: bool,
}

// ---------------- Messages ----------------

#[derive(Debug, Clone, PartialEq)]
pub struct StructureDefinition {
    pub name: String,
    pub enums: IndexMap<String, EnumDefinition>,
    pub fields: IndexMap<String, FieldDefinition>,
    pub description: String,
}

impl StructureDefinition {
    pub fn oneof(&self) -> Option<&FieldDefinition> {
        self.fields.get(ONEOF_FIELD_KEY)
    }

    pub fn has_local_enum(&self, name: &str) -> bool {
        self.enums.contains_key(name)
    }

    /// False for a message declared with an empty body.
    pub fn has_fields(&self) -> bool {
        !self.fields.is_empty()
    }
}

// ---------------- Services ----------------

#[derive(Debug, Clone, PartialEq)]
pub struct RpcMethodDefinition {
    pub name: String,
    pub request: Rc<StructureDefinition>,
    pub response: Rc<StructureDefinition>,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServiceDefinition {
    pub name: String,
    pub methods: IndexMap<String, RpcMethodDefinition>,
    pub description: String,
}

// ---------------- Model ----------------

/// Every definition read from both source files, keyed by name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApiModel {
    pub enums: BTreeMap<String, Rc<EnumDefinition>>,
    pub structures: BTreeMap<String, Rc<StructureDefinition>>,
    pub services: BTreeMap<String, ServiceDefinition>,
}

impl ApiModel {
    pub fn structure(&self, type_name: &str) -> Option<&Rc<StructureDefinition>> {
        lookup(&self.structures, type_name)
    }

    pub fn global_enum(&self, type_name: &str) -> Option<&Rc<EnumDefinition>> {
        lookup(&self.enums, type_name)
    }

    pub fn is_known_type(&self, type_name: &str) -> bool {
        self.structure(type_name).is_some() || self.global_enum(type_name).is_some()
    }
}

/// Strips a leading `.` and any package qualification from a type reference.
pub fn simple_type_name(type_name: &str) -> &str {
    let name = type_name.strip_prefix('.').unwrap_or(type_name);
    name.rsplit('.').next().unwrap_or(name)
}

pub(crate) fn lookup<'m, V>(table: &'m BTreeMap<String, V>, type_name: &str) -> Option<&'m V> {
    let exact = type_name.strip_prefix('.').unwrap_or(type_name);
    table
        .get(exact)
        .or_else(|| table.get(simple_type_name(type_name)))
}
