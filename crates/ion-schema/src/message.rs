use std::mem;

use ion_types::{ObjectKey, ObjectType};
use serde::{Deserialize, Serialize};

use crate::error::{SchemaError, SchemaResult};
use crate::schema::{FieldDef, Schema};
use crate::value::{Link, Value};

/// Storage for one field of a message.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub enum Slot {
    #[default]
    Unset,
    Single(Value),
    Repeated(Vec<Value>),
}

impl Slot {
    pub fn is_set(&self) -> bool {
        match self {
            Slot::Unset => false,
            Slot::Single(_) => true,
            Slot::Repeated(values) => !values.is_empty(),
        }
    }
}

/// One step of a path into a message: a field position, plus an element
/// index when the field is repeated.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PathStep {
    pub field: usize,
    pub index: Option<usize>,
}

impl PathStep {
    pub fn field(field: usize) -> Self {
        Self { field, index: None }
    }

    pub fn item(field: usize, index: usize) -> Self {
        Self {
            field,
            index: Some(index),
        }
    }
}

/// Path from a message to a value nested in it, descending through
/// embedded messages.
pub type FieldPath = Vec<PathStep>;

/// A structured object: a type tag plus one slot per schema field.
///
/// Only the slots are part of the serialized content; the type travels
/// beside the value in the stored element.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    object_type: ObjectType,
    slots: Vec<Slot>,
}

impl Message {
    /// An empty message with every field unset.
    pub fn new(schema: &Schema) -> Self {
        Self {
            object_type: schema.object_type(),
            slots: vec![Slot::Unset; schema.fields().len()],
        }
    }

    pub fn object_type(&self) -> ObjectType {
        self.object_type
    }

    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    pub fn slot(&self, field: usize) -> Option<&Slot> {
        self.slots.get(field)
    }

    pub fn slot_mut(&mut self, field: usize) -> Option<&mut Slot> {
        self.slots.get_mut(field)
    }

    /// Serialize the content for hashing and transfer.
    ///
    /// Fails if any link still carries a workspace-local key: such a message
    /// has no stable content yet.
    pub fn to_bytes(&self) -> SchemaResult<Vec<u8>> {
        if self.links().iter().any(|(_, link)| link.key.is_local()) {
            return Err(SchemaError::UnhashedLink(self.object_type));
        }
        bincode::serialize(&self.slots).map_err(|e| SchemaError::Serialization(e.to_string()))
    }

    /// Decode content produced by [`to_bytes`](Self::to_bytes).
    ///
    /// Only the slot count is checked here; use
    /// [`TypeRegistry::parse`](crate::TypeRegistry::parse) for full validation.
    pub fn from_bytes(schema: &Schema, bytes: &[u8]) -> SchemaResult<Self> {
        let slots: Vec<Slot> =
            bincode::deserialize(bytes).map_err(|e| SchemaError::Malformed {
                object_type: schema.object_type(),
                reason: e.to_string(),
            })?;
        if slots.len() != schema.fields().len() {
            return Err(SchemaError::Malformed {
                object_type: schema.object_type(),
                reason: format!(
                    "expected {} fields, found {}",
                    schema.fields().len(),
                    slots.len()
                ),
            });
        }
        Ok(Self {
            object_type: schema.object_type(),
            slots,
        })
    }

    /// Every link in this message and its embedded messages, with its path.
    /// Null links are included.
    pub fn links(&self) -> Vec<(FieldPath, Link)> {
        let mut out = Vec::new();
        self.collect_links(&mut Vec::new(), &mut out);
        out
    }

    fn collect_links(&self, prefix: &mut FieldPath, out: &mut Vec<(FieldPath, Link)>) {
        for (field, slot) in self.slots.iter().enumerate() {
            match slot {
                Slot::Unset => {}
                Slot::Single(value) => {
                    prefix.push(PathStep::field(field));
                    visit_links(value, prefix, out);
                    prefix.pop();
                }
                Slot::Repeated(values) => {
                    for (i, value) in values.iter().enumerate() {
                        prefix.push(PathStep::item(field, i));
                        visit_links(value, prefix, out);
                        prefix.pop();
                    }
                }
            }
        }
    }

    /// Apply `f` to every link in this message and its embedded messages.
    pub fn for_each_link_mut(&mut self, f: &mut impl FnMut(&[PathStep], &mut Link)) {
        let mut prefix = Vec::new();
        self.walk_links_mut(&mut prefix, f);
    }

    fn walk_links_mut(
        &mut self,
        prefix: &mut FieldPath,
        f: &mut impl FnMut(&[PathStep], &mut Link),
    ) {
        for (field, slot) in self.slots.iter_mut().enumerate() {
            match slot {
                Slot::Unset => {}
                Slot::Single(value) => {
                    prefix.push(PathStep::field(field));
                    visit_links_mut(value, prefix, f);
                    prefix.pop();
                }
                Slot::Repeated(values) => {
                    for (i, value) in values.iter_mut().enumerate() {
                        prefix.push(PathStep::item(field, i));
                        visit_links_mut(value, prefix, f);
                        prefix.pop();
                    }
                }
            }
        }
    }

    /// Hash keys of all committed children, in field order.
    pub fn child_keys(&self) -> Vec<ObjectKey> {
        self.links()
            .into_iter()
            .filter_map(|(_, link)| link.key.as_hash())
            .collect()
    }

    /// Returns `true` if no non-null link appears anywhere in the message.
    pub fn is_leaf(&self) -> bool {
        self.links().iter().all(|(_, link)| link.is_null())
    }

    /// The value addressed by `path`.
    pub fn value_at(&self, path: &[PathStep]) -> Option<&Value> {
        let (last, init) = path.split_last()?;
        let mut message = self;
        for step in init {
            message = message.step(step)?.as_message()?;
        }
        message.step(last)
    }

    pub fn value_at_mut(&mut self, path: &[PathStep]) -> Option<&mut Value> {
        let (last, init) = path.split_last()?;
        let mut message = self;
        for step in init {
            message = message.step_mut(step)?.as_message_mut()?;
        }
        message.step_mut(last)
    }

    /// The embedded message addressed by `path`; the empty path is `self`.
    pub fn message_at(&self, path: &[PathStep]) -> Option<&Message> {
        if path.is_empty() {
            return Some(self);
        }
        self.value_at(path)?.as_message()
    }

    pub fn message_at_mut(&mut self, path: &[PathStep]) -> Option<&mut Message> {
        if path.is_empty() {
            return Some(self);
        }
        self.value_at_mut(path)?.as_message_mut()
    }

    fn step(&self, step: &PathStep) -> Option<&Value> {
        match (self.slots.get(step.field)?, step.index) {
            (Slot::Single(value), None) => Some(value),
            (Slot::Repeated(values), Some(i)) => values.get(i),
            _ => None,
        }
    }

    fn step_mut(&mut self, step: &PathStep) -> Option<&mut Value> {
        match (self.slots.get_mut(step.field)?, step.index) {
            (Slot::Single(value), None) => Some(value),
            (Slot::Repeated(values), Some(i)) => values.get_mut(i),
            _ => None,
        }
    }
}

fn visit_links(value: &Value, prefix: &mut FieldPath, out: &mut Vec<(FieldPath, Link)>) {
    match value {
        Value::Link(link) => out.push((prefix.clone(), *link)),
        Value::Message(inner) => inner.collect_links(prefix, out),
        _ => {}
    }
}

fn visit_links_mut(
    value: &mut Value,
    prefix: &mut FieldPath,
    f: &mut impl FnMut(&[PathStep], &mut Link),
) {
    match value {
        Value::Link(link) => f(prefix, link),
        Value::Message(inner) => inner.walk_links_mut(prefix, f),
        _ => {}
    }
}

// ---------------------------------------------------------------------------
// Named field access
// ---------------------------------------------------------------------------

/// Name-based read access to a message through its schema.
pub trait FieldAccess {
    fn schema(&self) -> &Schema;
    fn message(&self) -> &Message;

    /// Value of a singular field, or `None` while unset.
    fn get_field(&self, name: &str) -> SchemaResult<Option<&Value>> {
        let (index, def) = lookup(self.schema(), name)?;
        if def.is_repeated() {
            return Err(SchemaError::NotSingular(name.to_string()));
        }
        match self.message().slot(index) {
            Some(Slot::Single(value)) => Ok(Some(value)),
            _ => Ok(None),
        }
    }

    /// Elements of a repeated field; empty while unset.
    fn get_repeated(&self, name: &str) -> SchemaResult<&[Value]> {
        let (index, def) = lookup(self.schema(), name)?;
        if !def.is_repeated() {
            return Err(SchemaError::NotRepeated(name.to_string()));
        }
        match self.message().slot(index) {
            Some(Slot::Repeated(values)) => Ok(values),
            _ => Ok(&[]),
        }
    }

    /// Names of fields that currently hold a value, in schema order.
    fn list_set_fields(&self) -> Vec<&str> {
        self.schema()
            .fields()
            .iter()
            .zip(self.message().slots())
            .filter(|(_, slot)| slot.is_set())
            .map(|(def, _)| def.name.as_str())
            .collect()
    }
}

fn lookup<'s>(schema: &'s Schema, name: &str) -> SchemaResult<(usize, &'s FieldDef)> {
    let index = schema.field_index(name)?;
    let def = schema
        .field(index)
        .ok_or_else(|| SchemaError::UnknownField {
            schema: schema.name().to_string(),
            field: name.to_string(),
        })?;
    Ok((index, def))
}

fn check_kind(def: &FieldDef, value: &Value) -> SchemaResult<()> {
    if def.kind.accepts(value) {
        Ok(())
    } else {
        Err(SchemaError::TypeMismatch {
            field: def.name.clone(),
            expected: def.kind.name(),
            found: value.kind_name(),
        })
    }
}

/// Read-only view of a message.
pub struct Record<'a> {
    schema: &'a Schema,
    message: &'a Message,
}

impl<'a> Record<'a> {
    pub fn new(schema: &'a Schema, message: &'a Message) -> Self {
        Self { schema, message }
    }
}

impl FieldAccess for Record<'_> {
    fn schema(&self) -> &Schema {
        self.schema
    }

    fn message(&self) -> &Message {
        self.message
    }
}

/// Type-checked write access to a message.
pub struct RecordMut<'a> {
    schema: &'a Schema,
    message: &'a mut Message,
}

impl<'a> RecordMut<'a> {
    pub fn new(schema: &'a Schema, message: &'a mut Message) -> Self {
        Self { schema, message }
    }

    /// Replace a singular field, returning the previous value.
    pub fn set_field(&mut self, name: &str, value: Value) -> SchemaResult<Option<Value>> {
        let (index, def) = lookup(self.schema, name)?;
        if def.is_repeated() {
            return Err(SchemaError::NotSingular(name.to_string()));
        }
        check_kind(def, &value)?;
        match mem::replace(&mut self.message.slots[index], Slot::Single(value)) {
            Slot::Single(old) => Ok(Some(old)),
            _ => Ok(None),
        }
    }

    /// Append to a repeated field, returning the new element's index.
    pub fn push_field(&mut self, name: &str, value: Value) -> SchemaResult<usize> {
        let (index, def) = lookup(self.schema, name)?;
        if !def.is_repeated() {
            return Err(SchemaError::NotRepeated(name.to_string()));
        }
        check_kind(def, &value)?;
        let slot = &mut self.message.slots[index];
        match slot {
            Slot::Repeated(values) => {
                values.push(value);
                Ok(values.len() - 1)
            }
            _ => {
                *slot = Slot::Repeated(vec![value]);
                Ok(0)
            }
        }
    }

    /// Overwrite one element of a repeated field, returning the old element.
    pub fn set_at(&mut self, name: &str, position: usize, value: Value) -> SchemaResult<Value> {
        let (index, def) = lookup(self.schema, name)?;
        if !def.is_repeated() {
            return Err(SchemaError::NotRepeated(name.to_string()));
        }
        check_kind(def, &value)?;
        let values = match &mut self.message.slots[index] {
            Slot::Repeated(values) => values,
            _ => {
                return Err(SchemaError::IndexOutOfRange {
                    field: name.to_string(),
                    index: position,
                    len: 0,
                })
            }
        };
        let len = values.len();
        let target = values
            .get_mut(position)
            .ok_or_else(|| SchemaError::IndexOutOfRange {
                field: name.to_string(),
                index: position,
                len,
            })?;
        Ok(mem::replace(target, value))
    }

    /// Reset a field to unset, returning what it held.
    pub fn clear_field(&mut self, name: &str) -> SchemaResult<Slot> {
        let (index, _) = lookup(self.schema, name)?;
        Ok(mem::take(&mut self.message.slots[index]))
    }
}

impl FieldAccess for RecordMut<'_> {
    fn schema(&self) -> &Schema {
        self.schema
    }

    fn message(&self) -> &Message {
        self.message
    }
}
