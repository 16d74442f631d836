//! Object types used by the demo address book.

use std::sync::Arc;

use ion_schema::{FieldKind, Schema, SchemaResult, TypeRegistry};
use ion_types::ObjectType;

pub const PERSON: ObjectType = ObjectType::new(20001, 1);
pub const ADDRESS_BOOK: ObjectType = ObjectType::new(20003, 1);

pub fn registry() -> SchemaResult<Arc<TypeRegistry>> {
    let mut registry = TypeRegistry::with_core_types()?;
    registry.register(
        Schema::builder("Person", PERSON)
            .field("name", FieldKind::String)
            .field("email", FieldKind::String)
            .build()?,
    )?;
    registry.register(
        Schema::builder("AddressBook", ADDRESS_BOOK)
            .field("title", FieldKind::String)
            .link("owner", PERSON)
            .repeated_link("person", PERSON)
            .build()?,
    )?;
    Ok(Arc::new(registry))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn demo_types_are_registered_with_core_types() {
        let registry = registry().unwrap();
        assert_eq!(registry.by_name("AddressBook").unwrap().object_type(), ADDRESS_BOOK);
        assert!(registry.contains(&PERSON));
        assert!(registry.contains(&ion_types::well_known::ASSOCIATION));
    }
}
