//! Schemas and helpers shared by the unit tests of this crate.

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use ion_schema::{FieldKind, Schema, TypeRegistry, Value};
use ion_types::{ObjectType, RepositoryKey};

use crate::config::WorkbenchConfig;
use crate::workbench::Workbench;

pub const PERSON: ObjectType = ObjectType::new(20001, 1);
pub const ADDRESS_LINK: ObjectType = ObjectType::new(20003, 1);

pub fn registry() -> Arc<TypeRegistry> {
    let mut registry = TypeRegistry::with_core_types().unwrap();
    registry
        .register(
            Schema::builder("Person", PERSON)
                .field("name", FieldKind::String)
                .field("id", FieldKind::Int)
                .build()
                .unwrap(),
        )
        .unwrap();
    registry
        .register(
            Schema::builder("AddressLink", ADDRESS_LINK)
                .field("title", FieldKind::String)
                .link("owner", PERSON)
                .repeated_link("person", PERSON)
                .build()
                .unwrap(),
        )
        .unwrap();
    Arc::new(registry)
}

pub fn workbench(name: &str) -> Workbench {
    Workbench::new(name, registry(), WorkbenchConfig::default())
}

/// A committed address book titled "people" whose owner is `owner`.
pub fn person_repo(wb: &mut Workbench, owner: &str) -> RepositoryKey {
    let key = wb.create_repository(Some(ADDRESS_LINK), None).unwrap();
    let repo = wb.repository_mut(key.as_str()).unwrap();
    let root = repo.root_object().unwrap();
    repo.set(&root, "title", "people").unwrap();
    let person = repo.create_object(PERSON).unwrap();
    repo.set(&person, "name", owner).unwrap();
    repo.set_link(&root, "owner", &person).unwrap();
    repo.commit_with_date("address book", at(0)).unwrap();
    key
}

pub fn string(value: Value) -> String {
    match value {
        Value::String(s) => s,
        other => panic!("expected a string, got {other:?}"),
    }
}

/// Fixed instant `hours` after the test epoch.
pub fn at(hours: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::hours(hours)
}
