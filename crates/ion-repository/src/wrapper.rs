//! Field-level access to structured objects through [`ObjectHandle`]s.
//!
//! Every read and write names its object by handle and its field by name.
//! Writes are type-checked against the object's schema, refused on read-only
//! objects, and mark the object and all of its transitive parents modified.
//! Link fields are only assigned through the `*_link` operations, which keep
//! the parent bookkeeping and cycle checks in one place.

use std::borrow::Cow;
use std::sync::Arc;

use ion_schema::{
    FieldAccess, FieldDef, FieldKind, Link, Message, PathStep, Record, RecordMut, Schema,
    SchemaError, Value,
};
use ion_types::{ObjectKey, ObjectType};

use crate::error::{RepositoryError, RepositoryResult};
use crate::node::{LinkSite, ObjectHandle, Scope};
use crate::repository::Repository;

/// A field resolved against the schema of the object a handle names.
struct FieldInfo {
    index: usize,
    def: FieldDef,
    schema: Arc<Schema>,
    scope: Scope,
    read_only: bool,
    generation: u64,
}

#[derive(Clone, Copy)]
enum LinkSlot {
    Single,
    At(usize),
    Push,
}

impl Repository {
    // -----------------------------------------------------------------------
    // Resolution
    // -----------------------------------------------------------------------

    /// Type of the embedded message `path` names inside `root`, following
    /// the schema where the content is still unset.
    fn path_type(&self, root: &Message, path: &[PathStep]) -> RepositoryResult<ObjectType> {
        let mut object_type = root.object_type();
        let mut current = Some(root);
        for step in path {
            let schema = self.registry.get(&object_type)?;
            let def = schema.field(step.field).ok_or(RepositoryError::InvalidObject)?;
            let FieldKind::Message(inner) = def.kind else {
                return Err(RepositoryError::InvalidObject);
            };
            let value = current.and_then(|m| m.value_at(std::slice::from_ref(step)));
            if step.index.is_some() && value.is_none() {
                return Err(RepositoryError::InvalidObject);
            }
            object_type = inner;
            current = value.and_then(Value::as_message);
        }
        Ok(object_type)
    }

    /// The message a handle names. Unset embedded content reads as an empty
    /// message of the declared type.
    fn view(&self, handle: &ObjectHandle) -> RepositoryResult<(Arc<Schema>, Cow<'_, Message>)> {
        let node = self.check_handle(handle)?;
        let message = match node.message.message_at(&handle.path) {
            Some(message) => Cow::Borrowed(message),
            None => {
                let object_type = self.path_type(&node.message, &handle.path)?;
                Cow::Owned(self.registry.new_message(object_type)?)
            }
        };
        let schema = Arc::clone(self.registry.get(&message.object_type())?);
        Ok((schema, message))
    }

    fn field_info(&self, handle: &ObjectHandle, field: &str) -> RepositoryResult<FieldInfo> {
        let node = self.check_handle(handle)?;
        let object_type = match node.message.message_at(&handle.path) {
            Some(message) => message.object_type(),
            None => self.path_type(&node.message, &handle.path)?,
        };
        let schema = Arc::clone(self.registry.get(&object_type)?);
        let index = schema.field_index(field)?;
        let def = schema
            .field(index)
            .cloned()
            .ok_or(RepositoryError::InvalidObject)?;
        Ok(FieldInfo {
            index,
            def,
            schema,
            scope: node.scope,
            read_only: node.read_only,
            generation: node.generation,
        })
    }

    fn writable_field(&self, handle: &ObjectHandle, field: &str) -> RepositoryResult<FieldInfo> {
        let info = self.field_info(handle, field)?;
        if info.read_only {
            return Err(RepositoryError::ReadOnly);
        }
        Ok(info)
    }

    /// Mutable access to the message a handle names, creating unset
    /// embedded messages along the path.
    fn materialize(&mut self, handle: &ObjectHandle) -> RepositoryResult<&mut Message> {
        let registry = Arc::clone(&self.registry);
        let node = self
            .nodes
            .get_mut(&handle.node)
            .ok_or(RepositoryError::InvalidObject)?;
        let mut message = &mut node.message;
        for step in &handle.path {
            let schema = registry.get(&message.object_type())?;
            let def = schema.field(step.field).ok_or(RepositoryError::InvalidObject)?;
            let FieldKind::Message(inner) = def.kind else {
                return Err(RepositoryError::InvalidObject);
            };
            let slot = message
                .slot_mut(step.field)
                .ok_or(RepositoryError::InvalidObject)?;
            if step.index.is_none() && !slot.is_set() {
                *slot = ion_schema::Slot::Single(Value::Message(Box::new(
                    registry.new_message(inner)?,
                )));
            }
            message = message
                .message_at_mut(std::slice::from_ref(step))
                .ok_or(RepositoryError::InvalidObject)?;
        }
        Ok(message)
    }

    /// Composite content under `field` was replaced: drop the link sites it
    /// held and invalidate sub-object handles taken from it.
    fn replace_composite(&mut self, handle: &ObjectHandle, field: usize) {
        self.forget_sites_under(handle.node, &handle.path, field);
        if let Some(node) = self.nodes.get_mut(&handle.node) {
            node.generation += 1;
        }
    }

    fn check_value(&self, info: &FieldInfo, value: &Value) -> RepositoryResult<()> {
        if info.def.kind.is_link() {
            return Err(RepositoryError::LinkField(info.def.name.clone()));
        }
        if !info.def.kind.accepts(value) {
            return Err(SchemaError::TypeMismatch {
                field: info.def.name.clone(),
                expected: info.def.kind.name(),
                found: value.kind_name(),
            }
            .into());
        }
        if let Value::Message(message) = value {
            if !message.is_leaf() {
                return Err(RepositoryError::LinkField(info.def.name.clone()));
            }
            self.registry.validate(message)?;
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    pub fn object_type(&self, handle: &ObjectHandle) -> RepositoryResult<ObjectType> {
        Ok(self.view(handle)?.1.object_type())
    }

    /// Value of a singular field. Unset fields read as their default.
    pub fn get(&self, handle: &ObjectHandle, field: &str) -> RepositoryResult<Value> {
        let (schema, message) = self.view(handle)?;
        let record = Record::new(&schema, &message);
        if let Some(value) = record.get_field(field)? {
            return Ok(value.clone());
        }
        let index = schema.field_index(field)?;
        let def = schema.field(index).ok_or(RepositoryError::InvalidObject)?;
        Ok(self.registry.default_value(&def.kind)?)
    }

    /// One element of a repeated field.
    pub fn get_at(
        &self,
        handle: &ObjectHandle,
        field: &str,
        index: usize,
    ) -> RepositoryResult<Value> {
        let (schema, message) = self.view(handle)?;
        let record = Record::new(&schema, &message);
        let values = record.get_repeated(field)?;
        values.get(index).cloned().ok_or_else(|| {
            SchemaError::IndexOutOfRange {
                field: field.to_string(),
                index,
                len: values.len(),
            }
            .into()
        })
    }

    /// Number of elements in a repeated field.
    pub fn field_len(&self, handle: &ObjectHandle, field: &str) -> RepositoryResult<usize> {
        let (schema, message) = self.view(handle)?;
        let len = Record::new(&schema, &message).get_repeated(field)?.len();
        Ok(len)
    }

    pub fn list_set_fields(&self, handle: &ObjectHandle) -> RepositoryResult<Vec<String>> {
        let (schema, message) = self.view(handle)?;
        let names = Record::new(&schema, &message)
            .list_set_fields()
            .into_iter()
            .map(str::to_string)
            .collect();
        Ok(names)
    }

    /// A copy of the message the handle names.
    pub fn message(&self, handle: &ObjectHandle) -> RepositoryResult<Message> {
        Ok(self.view(handle)?.1.into_owned())
    }

    /// Returns `true` if the handle no longer names a live object.
    pub fn is_invalid(&self, handle: &ObjectHandle) -> bool {
        match self.check_handle(handle) {
            Err(_) => true,
            Ok(node) => {
                node.message.message_at(&handle.path).is_none()
                    && self.path_type(&node.message, &handle.path).is_err()
            }
        }
    }

    pub fn is_modified(&self, handle: &ObjectHandle) -> RepositoryResult<bool> {
        Ok(self.check_handle(handle)?.modified)
    }

    pub fn is_read_only(&self, handle: &ObjectHandle) -> RepositoryResult<bool> {
        Ok(self.check_handle(handle)?.read_only)
    }

    /// Content key of a whole object that has been hashed and not modified
    /// since.
    pub fn object_key(&self, handle: &ObjectHandle) -> RepositoryResult<Option<ObjectKey>> {
        let node = self.check_handle(handle)?;
        if !handle.is_root() || node.modified {
            return Ok(None);
        }
        Ok(node.key.as_hash())
    }

    // -----------------------------------------------------------------------
    // Navigation
    // -----------------------------------------------------------------------

    /// Follow a singular composite or link field.
    ///
    /// An embedded message yields a sub-object handle. A link is resolved
    /// (loading its target if needed) and yields the target's handle, or
    /// `None` when the link is null.
    pub fn get_object(
        &mut self,
        handle: &ObjectHandle,
        field: &str,
    ) -> RepositoryResult<Option<ObjectHandle>> {
        let info = self.field_info(handle, field)?;
        if info.def.is_repeated() {
            return Err(SchemaError::NotSingular(field.to_string()).into());
        }
        self.object_at(handle, &info, PathStep::field(info.index))
    }

    /// Follow one element of a repeated composite or link field.
    pub fn get_object_at(
        &mut self,
        handle: &ObjectHandle,
        field: &str,
        index: usize,
    ) -> RepositoryResult<Option<ObjectHandle>> {
        let info = self.field_info(handle, field)?;
        let len = self.field_len(handle, field)?;
        if index >= len {
            return Err(SchemaError::IndexOutOfRange {
                field: field.to_string(),
                index,
                len,
            }
            .into());
        }
        self.object_at(handle, &info, PathStep::item(info.index, index))
    }

    /// Resolve a link field, singular (`index == None`) or repeated.
    pub fn get_linked_object(
        &mut self,
        handle: &ObjectHandle,
        field: &str,
        index: Option<usize>,
    ) -> RepositoryResult<Option<ObjectHandle>> {
        let info = self.field_info(handle, field)?;
        if !info.def.kind.is_link() {
            return Err(RepositoryError::TypeMismatch {
                expected: "link".into(),
                found: info.def.kind.name(),
            });
        }
        match index {
            None => self.get_object(handle, field),
            Some(i) => self.get_object_at(handle, field, i),
        }
    }

    fn object_at(
        &mut self,
        handle: &ObjectHandle,
        info: &FieldInfo,
        step: PathStep,
    ) -> RepositoryResult<Option<ObjectHandle>> {
        match info.def.kind {
            FieldKind::Message(_) => Ok(Some(handle.child(step, info.generation))),
            FieldKind::Link(_) => {
                let mut path = handle.path.clone();
                path.push(step);
                let target = self.resolve_link(handle.node, &path)?;
                Ok(target.map(|id| ObjectHandle::root_of(self.id, id)))
            }
            other => Err(RepositoryError::TypeMismatch {
                expected: "message or link".into(),
                found: other.name(),
            }),
        }
    }

    // -----------------------------------------------------------------------
    // Writes
    // -----------------------------------------------------------------------

    /// Set a singular scalar or composite field.
    ///
    /// Link fields are refused with [`RepositoryError::LinkField`] unless the
    /// value is a null link, which clears the field.
    pub fn set(
        &mut self,
        handle: &ObjectHandle,
        field: &str,
        value: impl Into<Value>,
    ) -> RepositoryResult<()> {
        let value = value.into();
        let info = self.writable_field(handle, field)?;
        if info.def.kind.is_link() && matches!(&value, Value::Link(link) if link.is_null()) {
            return self.clear_field(handle, field);
        }
        if info.def.is_repeated() {
            return Err(SchemaError::NotSingular(field.to_string()).into());
        }
        self.check_value(&info, &value)?;

        let message = self.materialize(handle)?;
        RecordMut::new(&info.schema, message).set_field(field, value)?;
        if info.def.kind.is_message() {
            self.replace_composite(handle, info.index);
        }
        self.set_modified(handle.node)
    }

    /// Append to a repeated scalar or composite field. Returns the new
    /// element's index.
    pub fn push(
        &mut self,
        handle: &ObjectHandle,
        field: &str,
        value: impl Into<Value>,
    ) -> RepositoryResult<usize> {
        let value = value.into();
        let info = self.writable_field(handle, field)?;
        if !info.def.is_repeated() {
            return Err(SchemaError::NotRepeated(field.to_string()).into());
        }
        self.check_value(&info, &value)?;

        let message = self.materialize(handle)?;
        let index = RecordMut::new(&info.schema, message).push_field(field, value)?;
        self.set_modified(handle.node)?;
        Ok(index)
    }

    /// Overwrite one element of a repeated scalar or composite field.
    pub fn set_at(
        &mut self,
        handle: &ObjectHandle,
        field: &str,
        index: usize,
        value: impl Into<Value>,
    ) -> RepositoryResult<()> {
        let value = value.into();
        let info = self.writable_field(handle, field)?;
        if !info.def.is_repeated() {
            return Err(SchemaError::NotRepeated(field.to_string()).into());
        }
        self.check_value(&info, &value)?;
        let len = self.field_len(handle, field)?;
        if index >= len {
            return Err(SchemaError::IndexOutOfRange {
                field: field.to_string(),
                index,
                len,
            }
            .into());
        }

        let message = self.materialize(handle)?;
        RecordMut::new(&info.schema, message).set_at(field, index, value)?;
        if info.def.kind.is_message() {
            self.replace_composite(handle, info.index);
        }
        self.set_modified(handle.node)
    }

    /// Append an empty embedded message to a repeated composite field and
    /// return a handle to it.
    pub fn push_object(
        &mut self,
        handle: &ObjectHandle,
        field: &str,
    ) -> RepositoryResult<ObjectHandle> {
        let info = self.writable_field(handle, field)?;
        let FieldKind::Message(inner) = info.def.kind else {
            return Err(RepositoryError::TypeMismatch {
                expected: "message".into(),
                found: info.def.kind.name(),
            });
        };
        let empty = self.registry.new_message(inner)?;
        let index = self.push(handle, field, empty)?;
        let generation = self.check_handle(handle)?.generation;
        Ok(handle.child(PathStep::item(info.index, index), generation))
    }

    /// Reset a field to unset.
    pub fn clear_field(&mut self, handle: &ObjectHandle, field: &str) -> RepositoryResult<()> {
        let info = self.writable_field(handle, field)?;
        let present = self
            .check_handle(handle)?
            .message
            .message_at(&handle.path)
            .is_some();
        if !present {
            return Ok(());
        }
        let message = self.materialize(handle)?;
        let old = RecordMut::new(&info.schema, message).clear_field(field)?;
        if !old.is_set() {
            return Ok(());
        }
        match info.def.kind {
            FieldKind::Message(_) => self.replace_composite(handle, info.index),
            FieldKind::Link(_) => self.forget_sites_under(handle.node, &handle.path, info.index),
            _ => {}
        }
        self.set_modified(handle.node)
    }

    // -----------------------------------------------------------------------
    // Links
    // -----------------------------------------------------------------------

    /// Point a singular link field at `target`.
    ///
    /// The target must be a whole object of this repository. A target from
    /// a merge state is deep-copied into the workspace first. A link that
    /// would make the target its own ancestor is refused with
    /// [`RepositoryError::CycleDetected`] and leaves the graph unchanged.
    pub fn set_link(
        &mut self,
        handle: &ObjectHandle,
        field: &str,
        target: &ObjectHandle,
    ) -> RepositoryResult<()> {
        self.assign_link(handle, field, LinkSlot::Single, target)
            .map(|_| ())
    }

    /// Point one element of a repeated link field at `target`.
    pub fn set_link_at(
        &mut self,
        handle: &ObjectHandle,
        field: &str,
        index: usize,
        target: &ObjectHandle,
    ) -> RepositoryResult<()> {
        self.assign_link(handle, field, LinkSlot::At(index), target)
            .map(|_| ())
    }

    /// Append a link to `target` to a repeated link field.
    pub fn push_link(
        &mut self,
        handle: &ObjectHandle,
        field: &str,
        target: &ObjectHandle,
    ) -> RepositoryResult<usize> {
        self.assign_link(handle, field, LinkSlot::Push, target)
    }

    /// Link to an object held by another repository, deep-copying it here.
    pub fn set_link_from(
        &mut self,
        handle: &ObjectHandle,
        field: &str,
        source: &Repository,
        target: &ObjectHandle,
    ) -> RepositoryResult<()> {
        if source.id == self.id {
            return self.set_link(handle, field, target);
        }
        let copy = self.copy_object_from(source, target, true, false)?;
        self.set_link(handle, field, &copy)
    }

    fn assign_link(
        &mut self,
        handle: &ObjectHandle,
        field: &str,
        slot: LinkSlot,
        target: &ObjectHandle,
    ) -> RepositoryResult<usize> {
        let info = self.writable_field(handle, field)?;
        let FieldKind::Link(expected) = info.def.kind else {
            return Err(RepositoryError::TypeMismatch {
                expected: "link".into(),
                found: info.def.kind.name(),
            });
        };
        match (slot, info.def.is_repeated()) {
            (LinkSlot::Single, true) => {
                return Err(SchemaError::NotSingular(field.to_string()).into())
            }
            (LinkSlot::At(_) | LinkSlot::Push, false) => {
                return Err(SchemaError::NotRepeated(field.to_string()).into())
            }
            _ => {}
        }
        if !target.is_root() {
            return Err(RepositoryError::NotRootObject);
        }
        if target.repo != self.id {
            return Err(RepositoryError::ForeignObject);
        }
        let position = match slot {
            LinkSlot::Single => None,
            LinkSlot::Push => Some(self.field_len(handle, field)?),
            LinkSlot::At(index) => {
                let len = self.field_len(handle, field)?;
                if index >= len {
                    return Err(SchemaError::IndexOutOfRange {
                        field: field.to_string(),
                        index,
                        len,
                    }
                    .into());
                }
                Some(index)
            }
        };

        let (target_scope, target_type) = {
            let node = self.check_handle(target)?;
            (node.scope, node.message.object_type())
        };
        if let Some(expected) = expected {
            if expected != target_type {
                return Err(RepositoryError::TypeMismatch {
                    expected: expected.to_string(),
                    found: target_type.to_string(),
                });
            }
        }
        let target_id = if target_scope == info.scope {
            if target.node == handle.node || self.reaches(target.node, handle.node) {
                return Err(RepositoryError::CycleDetected);
            }
            target.node
        } else {
            self.copy_object(target, true)?.node
        };
        let (target_key, target_leaf) = {
            let node = self.nodes.get(&target_id).ok_or(RepositoryError::InvalidObject)?;
            (node.key, node.message.is_leaf())
        };

        let mut path = handle.path.clone();
        path.push(PathStep {
            field: info.index,
            index: position,
        });

        if !matches!(slot, LinkSlot::Push) {
            let old = self
                .nodes
                .get(&handle.node)
                .and_then(|n| n.message.value_at(&path))
                .and_then(Value::as_link)
                .copied()
                .filter(|link| !link.is_null());
            if let Some(old) = old {
                let site = LinkSite {
                    owner: handle.node,
                    path: path.clone(),
                };
                if let Some(old_node) = self
                    .workspace
                    .get(&(info.scope, old.key))
                    .copied()
                    .and_then(|id| self.nodes.get_mut(&id))
                {
                    old_node.parents.remove(&site);
                }
            }
        }

        let link = Value::Link(Link {
            key: target_key,
            object_type: Some(target_type),
            isleaf: target_leaf,
        });
        let message = self.materialize(handle)?;
        let mut record = RecordMut::new(&info.schema, message);
        match slot {
            LinkSlot::Single => {
                record.set_field(field, link)?;
            }
            LinkSlot::At(index) => {
                record.set_at(field, index, link)?;
            }
            LinkSlot::Push => {
                record.push_field(field, link)?;
            }
        }
        if let Some(node) = self.nodes.get_mut(&target_id) {
            node.parents.insert(LinkSite {
                owner: handle.node,
                path,
            });
        }
        self.set_modified(handle.node)?;
        Ok(position.unwrap_or(0))
    }
}
