//! Schemas of the structured types the repository layer itself relies on.
//!
//! Commits and mutable heads are native structures of the repository crate
//! and are not listed here.

use ion_types::well_known::{ASSOCIATION, IDREF, PREDICATE};

use crate::error::SchemaResult;
use crate::schema::{FieldKind, Schema};

/// Reference to another repository's state: key, branch, and optionally a
/// pinned commit. An empty key is the null reference.
pub fn idref() -> SchemaResult<Schema> {
    Schema::builder("IDRef", IDREF)
        .field("key", FieldKind::String)
        .field("branch", FieldKind::String)
        .field("commit", FieldKind::String)
        .build()
}

/// Subject / predicate / object triple, each an embedded [`idref`].
pub fn association() -> SchemaResult<Schema> {
    Schema::builder("Association", ASSOCIATION)
        .message("subject", IDREF)
        .message("predicate", IDREF)
        .message("object", IDREF)
        .build()
}

pub fn predicate() -> SchemaResult<Schema> {
    Schema::builder("Predicate", PREDICATE)
        .field("word", FieldKind::String)
        .build()
}

pub fn all() -> SchemaResult<Vec<Schema>> {
    Ok(vec![idref()?, association()?, predicate()?])
}
