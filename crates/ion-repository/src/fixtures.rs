//! Schemas and helpers shared by the unit tests of this crate.

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use ion_schema::{FieldKind, Schema, TypeRegistry, Value};
use ion_types::ObjectType;

use crate::node::ObjectHandle;
use crate::repository::Repository;

pub const PERSON: ObjectType = ObjectType::new(20001, 1);
pub const PHONE: ObjectType = ObjectType::new(20002, 1);
pub const ADDRESS_LINK: ObjectType = ObjectType::new(20003, 1);
pub const TREE: ObjectType = ObjectType::new(20004, 1);

pub fn registry() -> Arc<TypeRegistry> {
    let mut registry = TypeRegistry::with_core_types().unwrap();
    registry
        .register(
            Schema::builder("PhoneNumber", PHONE)
                .field("number", FieldKind::String)
                .field("kind", FieldKind::Int)
                .build()
                .unwrap(),
        )
        .unwrap();
    registry
        .register(
            Schema::builder("Person", PERSON)
                .field("name", FieldKind::String)
                .field("id", FieldKind::Int)
                .field("email", FieldKind::String)
                .repeated("phone", FieldKind::Message(PHONE))
                .message("home", PHONE)
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
    registry
        .register(
            Schema::builder("Tree", TREE)
                .field("label", FieldKind::String)
                .link("left", TREE)
                .link("right", TREE)
                .field("any", FieldKind::Link(None))
                .repeated_link("items", TREE)
                .build()
                .unwrap(),
        )
        .unwrap();
    Arc::new(registry)
}

/// A new repository rooted at an empty tree node.
pub fn tree_repo() -> (Repository, ObjectHandle) {
    let repo = Repository::create(registry(), None, TREE).unwrap();
    let root = repo.root_object().unwrap();
    (repo, root)
}

/// A new, unlinked tree node with a label.
pub fn node(repo: &mut Repository, label: &str) -> ObjectHandle {
    let handle = repo.create_object(TREE).unwrap();
    repo.set(&handle, "label", label).unwrap();
    handle
}

pub fn label(repo: &Repository, handle: &ObjectHandle) -> String {
    match repo.get(handle, "label").unwrap() {
        Value::String(s) => s,
        other => panic!("label is {other:?}"),
    }
}

/// Fixed instant `hours` after the test epoch.
pub fn at(hours: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::hours(hours)
}
