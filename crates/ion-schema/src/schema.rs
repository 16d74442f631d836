use std::collections::HashMap;

use ion_types::ObjectType;
use serde::{Deserialize, Serialize};

use crate::error::{SchemaError, SchemaResult};
use crate::value::{Link, Value};

/// Declared kind of a field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldKind {
    Bool,
    Int,
    UInt,
    Double,
    String,
    Bytes,
    /// An embedded message of the given type, stored inside its owner.
    Message(ObjectType),
    /// A link to a separately hashed object. `None` accepts any target type.
    Link(Option<ObjectType>),
}

impl FieldKind {
    /// Returns `true` if `value` may be stored in a field of this kind.
    pub fn accepts(&self, value: &Value) -> bool {
        match (self, value) {
            (FieldKind::Bool, Value::Bool(_))
            | (FieldKind::Int, Value::Int(_))
            | (FieldKind::UInt, Value::UInt(_))
            | (FieldKind::Double, Value::Double(_))
            | (FieldKind::String, Value::String(_))
            | (FieldKind::Bytes, Value::Bytes(_)) => true,
            (FieldKind::Message(t), Value::Message(m)) => m.object_type() == *t,
            (FieldKind::Link(target), Value::Link(link)) => match (target, link.object_type) {
                (None, _) | (_, None) => true,
                (Some(expected), Some(actual)) => *expected == actual,
            },
            _ => false,
        }
    }

    /// Value read from an unset scalar or link field.
    ///
    /// Embedded messages have no scalar default; their default is an empty
    /// message built from the registry.
    pub fn default_value(&self) -> Option<Value> {
        Some(match self {
            FieldKind::Bool => Value::Bool(false),
            FieldKind::Int => Value::Int(0),
            FieldKind::UInt => Value::UInt(0),
            FieldKind::Double => Value::Double(0.0),
            FieldKind::String => Value::String(String::new()),
            FieldKind::Bytes => Value::Bytes(Vec::new()),
            FieldKind::Link(target) => Value::Link(Link::null(*target)),
            FieldKind::Message(_) => return None,
        })
    }

    pub fn is_link(&self) -> bool {
        matches!(self, FieldKind::Link(_))
    }

    pub fn is_message(&self) -> bool {
        matches!(self, FieldKind::Message(_))
    }

    pub fn name(&self) -> String {
        match self {
            FieldKind::Bool => "bool".into(),
            FieldKind::Int => "int".into(),
            FieldKind::UInt => "uint".into(),
            FieldKind::Double => "double".into(),
            FieldKind::String => "string".into(),
            FieldKind::Bytes => "bytes".into(),
            FieldKind::Message(t) => format!("message {t}"),
            FieldKind::Link(Some(t)) => format!("link to {t}"),
            FieldKind::Link(None) => "link".into(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Label {
    Optional,
    Repeated,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,
    pub kind: FieldKind,
    pub label: Label,
}

impl FieldDef {
    pub fn is_repeated(&self) -> bool {
        self.label == Label::Repeated
    }
}

/// Field table of one object type.
///
/// Fields are addressed by position; the name table is built once at
/// registration so name lookups never scan.
#[derive(Clone, Debug)]
pub struct Schema {
    name: String,
    object_type: ObjectType,
    fields: Vec<FieldDef>,
    by_name: HashMap<String, usize>,
}

impl Schema {
    pub fn builder(name: impl Into<String>, object_type: ObjectType) -> SchemaBuilder {
        SchemaBuilder {
            name: name.into(),
            object_type,
            fields: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn object_type(&self) -> ObjectType {
        self.object_type
    }

    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    pub fn field(&self, index: usize) -> Option<&FieldDef> {
        self.fields.get(index)
    }

    /// Position of the named field.
    pub fn field_index(&self, name: &str) -> SchemaResult<usize> {
        self.by_name
            .get(name)
            .copied()
            .ok_or_else(|| SchemaError::UnknownField {
                schema: self.name.clone(),
                field: name.to_string(),
            })
    }

    /// Returns `true` if any top-level field of this type is a link.
    pub fn has_link_fields(&self) -> bool {
        self.fields.iter().any(|f| f.kind.is_link())
    }
}

/// Incremental construction of a [`Schema`].
pub struct SchemaBuilder {
    name: String,
    object_type: ObjectType,
    fields: Vec<FieldDef>,
}

impl SchemaBuilder {
    fn push(mut self, name: &str, kind: FieldKind, label: Label) -> Self {
        self.fields.push(FieldDef {
            name: name.to_string(),
            kind,
            label,
        });
        self
    }

    pub fn field(self, name: &str, kind: FieldKind) -> Self {
        self.push(name, kind, Label::Optional)
    }

    pub fn repeated(self, name: &str, kind: FieldKind) -> Self {
        self.push(name, kind, Label::Repeated)
    }

    pub fn link(self, name: &str, target: ObjectType) -> Self {
        self.push(name, FieldKind::Link(Some(target)), Label::Optional)
    }

    pub fn repeated_link(self, name: &str, target: ObjectType) -> Self {
        self.push(name, FieldKind::Link(Some(target)), Label::Repeated)
    }

    pub fn message(self, name: &str, object_type: ObjectType) -> Self {
        self.push(name, FieldKind::Message(object_type), Label::Optional)
    }

    pub fn build(self) -> SchemaResult<Schema> {
        let mut by_name = HashMap::with_capacity(self.fields.len());
        for (i, field) in self.fields.iter().enumerate() {
            if by_name.insert(field.name.clone(), i).is_some() {
                return Err(SchemaError::DuplicateField {
                    schema: self.name,
                    field: field.name.clone(),
                });
            }
        }
        Ok(Schema {
            name: self.name,
            object_type: self.object_type,
            fields: self.fields,
            by_name,
        })
    }
}
