//! Typed record schemas for the ION object repository.
//!
//! A structured object is a [`Message`]: a fixed table of field slots laid
//! out by a [`Schema`]. Schemas are registered once, at start-up, in a
//! [`TypeRegistry`] that is passed explicitly to every repository and
//! workbench. The registry is read-only after initialization.
//!
//! Field access goes through [`Record`] / [`RecordMut`], which resolve field
//! names against the schema's field table and type-check every write.
//! Links to other objects are first-class [`Value::Link`] values carrying a
//! [`LinkKey`]: `Null`, a workspace-local id before commit, or a content hash
//! after commit.

pub mod core_types;
pub mod error;
pub mod message;
pub mod registry;
pub mod schema;
pub mod value;

pub use error::{SchemaError, SchemaResult};
pub use message::{FieldAccess, FieldPath, Message, PathStep, Record, RecordMut, Slot};
pub use registry::TypeRegistry;
pub use schema::{FieldDef, FieldKind, Label, Schema, SchemaBuilder};
pub use value::{Link, LinkKey, Value};
