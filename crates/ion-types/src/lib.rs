//! Foundation types for the ION object repository.
//!
//! This crate provides the identifiers shared by every layer of the
//! repository stack. Every other ION crate depends on `ion-types`.
//!
//! # Key Types
//!
//! - [`ObjectKey`]: 20-byte SHA1-derived content hash of a structure element
//! - [`ObjectType`]: `{object_id, version}` pair naming a structured-message schema
//! - [`RepositoryKey`]: identity of one versioned object graph
//! - [`BranchKey`]: 8-hex-char branch identifier

pub mod error;
pub mod identity;
pub mod object;
pub mod object_type;

pub use error::TypeError;
pub use identity::{BranchKey, RepositoryKey};
pub use object::ObjectKey;
pub use object_type::{well_known, ObjectType};
