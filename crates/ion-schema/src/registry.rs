use std::collections::HashMap;
use std::sync::Arc;

use ion_types::ObjectType;
use tracing::debug;

use crate::core_types;
use crate::error::{SchemaError, SchemaResult};
use crate::message::{Message, Slot};
use crate::schema::{FieldKind, Schema};
use crate::value::Value;

/// Lookup table from object type to schema.
///
/// Built once at start-up and then shared read-only (usually behind an
/// `Arc`) by every repository and workbench in the process.
#[derive(Debug, Default)]
pub struct TypeRegistry {
    by_type: HashMap<ObjectType, Arc<Schema>>,
    by_name: HashMap<String, ObjectType>,
}

impl TypeRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry pre-loaded with the association types.
    pub fn with_core_types() -> SchemaResult<Self> {
        let mut registry = Self::new();
        for schema in core_types::all()? {
            registry.register(schema)?;
        }
        Ok(registry)
    }

    pub fn register(&mut self, schema: Schema) -> SchemaResult<Arc<Schema>> {
        let object_type = schema.object_type();
        if self.by_type.contains_key(&object_type) {
            return Err(SchemaError::DuplicateType(object_type));
        }
        if let Some(existing) = self.by_name.get(schema.name()) {
            return Err(SchemaError::DuplicateType(*existing));
        }
        debug!(name = schema.name(), %object_type, "registered schema");
        let schema = Arc::new(schema);
        self.by_name.insert(schema.name().to_string(), object_type);
        self.by_type.insert(object_type, Arc::clone(&schema));
        Ok(schema)
    }

    pub fn get(&self, object_type: &ObjectType) -> SchemaResult<&Arc<Schema>> {
        self.by_type
            .get(object_type)
            .ok_or(SchemaError::UnknownType(*object_type))
    }

    pub fn contains(&self, object_type: &ObjectType) -> bool {
        self.by_type.contains_key(object_type)
    }

    /// Look a schema up by its registered name.
    pub fn by_name(&self, name: &str) -> SchemaResult<&Arc<Schema>> {
        let object_type = self
            .by_name
            .get(name)
            .ok_or_else(|| SchemaError::UnknownTypeName(name.to_string()))?;
        self.get(object_type)
    }

    /// An empty message of the given type.
    pub fn new_message(&self, object_type: ObjectType) -> SchemaResult<Message> {
        Ok(Message::new(self.get(&object_type)?))
    }

    /// Value read from an unset field of the given kind.
    pub fn default_value(&self, kind: &FieldKind) -> SchemaResult<Value> {
        match kind {
            FieldKind::Message(t) => Ok(Value::Message(Box::new(self.new_message(*t)?))),
            other => other
                .default_value()
                .ok_or_else(|| SchemaError::UnknownTypeName(other.name())),
        }
    }

    /// Decode and fully validate serialized content of `object_type`.
    pub fn parse(&self, object_type: ObjectType, bytes: &[u8]) -> SchemaResult<Message> {
        let schema = self.get(&object_type)?;
        let message = Message::from_bytes(schema, bytes)?;
        self.validate(&message)?;
        Ok(message)
    }

    /// Check a message, and every embedded message, against its schema.
    pub fn validate(&self, message: &Message) -> SchemaResult<()> {
        let schema = self.get(&message.object_type())?;
        if message.slots().len() != schema.fields().len() {
            return Err(SchemaError::Malformed {
                object_type: schema.object_type(),
                reason: "field count does not match schema".into(),
            });
        }
        for (def, slot) in schema.fields().iter().zip(message.slots()) {
            let values: &[Value] = match (slot, def.is_repeated()) {
                (Slot::Unset, _) => &[],
                (Slot::Single(v), false) => std::slice::from_ref(v),
                (Slot::Repeated(vs), true) => vs,
                _ => {
                    return Err(SchemaError::Malformed {
                        object_type: schema.object_type(),
                        reason: format!("wrong cardinality for {}", def.name),
                    })
                }
            };
            for value in values {
                if !def.kind.accepts(value) {
                    return Err(SchemaError::TypeMismatch {
                        field: def.name.clone(),
                        expected: def.kind.name(),
                        found: value.kind_name(),
                    });
                }
                if let Value::Message(inner) = value {
                    self.validate(inner)?;
                }
            }
        }
        Ok(())
    }

    /// Registered types in ascending order.
    pub fn types(&self) -> Vec<ObjectType> {
        let mut types: Vec<ObjectType> = self.by_type.keys().copied().collect();
        types.sort();
        types
    }

    pub fn len(&self) -> usize {
        self.by_type.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_type.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{FieldAccess, Record, RecordMut};
    use ion_types::well_known::{ASSOCIATION, IDREF};

    const PERSON: ObjectType = ObjectType::new(20001, 1);

    fn registry() -> TypeRegistry {
        let mut registry = TypeRegistry::with_core_types().unwrap();
        registry
            .register(
                Schema::builder("Person", PERSON)
                    .field("name", FieldKind::String)
                    .build()
                    .unwrap(),
            )
            .unwrap();
        registry
    }

    #[test]
    fn core_types_are_present() {
        let registry = TypeRegistry::with_core_types().unwrap();
        assert!(registry.contains(&IDREF));
        assert!(registry.contains(&ASSOCIATION));
        assert_eq!(registry.by_name("Association").unwrap().object_type(), ASSOCIATION);
    }

    #[test]
    fn duplicate_registration_fails() {
        let mut registry = registry();
        let again = Schema::builder("Person", PERSON).build().unwrap();
        assert_eq!(registry.register(again).unwrap_err(), SchemaError::DuplicateType(PERSON));
    }

    #[test]
    fn unknown_type_is_reported() {
        let registry = registry();
        let missing = ObjectType::new(99999, 1);
        assert_eq!(registry.new_message(missing).unwrap_err(), SchemaError::UnknownType(missing));
    }

    #[test]
    fn default_of_embedded_message_is_empty_message() {
        let registry = registry();
        let value = registry.default_value(&FieldKind::Message(IDREF)).unwrap();
        let inner = value.as_message().unwrap();
        let schema = registry.get(&IDREF).unwrap();
        assert!(Record::new(schema, inner).list_set_fields().is_empty());
    }

    #[test]
    fn parse_validates_embedded_messages() {
        let registry = registry();
        let assoc_schema = registry.get(&ASSOCIATION).unwrap();
        let idref_schema = registry.get(&IDREF).unwrap();

        let mut subject = Message::new(idref_schema);
        RecordMut::new(idref_schema, &mut subject)
            .set_field("key", "repo-a".into())
            .unwrap();
        let mut assoc = Message::new(assoc_schema);
        RecordMut::new(assoc_schema, &mut assoc)
            .set_field("subject", subject.into())
            .unwrap();

        let bytes = assoc.to_bytes().unwrap();
        assert_eq!(registry.parse(ASSOCIATION, &bytes).unwrap(), assoc);
        assert!(registry.parse(PERSON, &bytes).is_err());
    }
}
