//! Associations between ION repositories.
//!
//! An association is itself a repository whose root names a subject, a
//! predicate and an object, each a pinned reference to another repository.
//! [`AssociationManager`] indexes associations by predicate.

pub mod error;
pub mod instance;
pub mod manager;

#[cfg(test)]
mod fixtures;

pub use error::{AssociationError, AssociationResult};
pub use instance::{AssociationInstance, IdRef};
pub use manager::AssociationManager;
