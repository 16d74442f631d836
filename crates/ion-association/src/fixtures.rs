//! Helpers shared by the unit tests of this crate.

use std::sync::Arc;

use ion_schema::{FieldKind, Schema, TypeRegistry};
use ion_types::well_known::PREDICATE;
use ion_types::ObjectType;
use ion_workbench::{Workbench, WorkbenchConfig};

pub const PERSON: ObjectType = ObjectType::new(20001, 1);

pub fn workbench() -> Workbench {
    let mut registry = TypeRegistry::with_core_types().unwrap();
    registry
        .register(
            Schema::builder("Person", PERSON)
                .field("name", FieldKind::String)
                .build()
                .unwrap(),
        )
        .unwrap();
    Workbench::new("assoc", Arc::new(registry), WorkbenchConfig::default())
}

/// A committed repository of `root_type` whose `field` holds `text`.
pub fn committed(wb: &mut Workbench, root_type: ObjectType, field: &str, text: &str) -> String {
    let key = wb.create_repository(Some(root_type), None).unwrap();
    let repo = wb.repository_mut(key.as_str()).unwrap();
    let root = repo.root_object().unwrap();
    repo.set(&root, field, text).unwrap();
    repo.commit(text).unwrap();
    key.to_string()
}

/// Subject, predicate and object repositories: two people and "knows".
pub fn triple(wb: &mut Workbench) -> (String, String, String) {
    (
        committed(wb, PERSON, "name", "David"),
        committed(wb, PREDICATE, "word", "knows"),
        committed(wb, PERSON, "name", "Michael"),
    )
}
