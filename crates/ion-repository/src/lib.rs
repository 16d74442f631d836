//! Versioned object repository for ION structured objects.
//!
//! A [`Repository`] holds one graph of structured objects: a mutable
//! workspace addressed through [`ObjectHandle`]s, a content-addressed index
//! of hashed elements, and a history of [`Commit`]s organized into branches.
//!
//! Objects are edited in place. Any write marks the object and every object
//! that links to it as modified; committing hashes the modified part of the
//! graph depth-first so each link records its target's content hash.
//! Identical content always hashes to the same key and is stored once.
//!
//! Checkout replaces the workspace with the tree of a chosen commit and
//! invalidates every outstanding handle. A branch holding more than one
//! head has diverged; it is resolved either by date or by loading the other
//! heads as read-only merge sources for the next commit.

pub mod codec;
pub mod commit;
pub mod copy;
pub mod error;
pub mod history;
pub mod node;
pub mod repository;
pub mod wrapper;

pub use codec::{element_child_keys, ObjectCodec};
pub use commit::{Branch, Commit, MutableHead, ObjectRoot, ParentRef, Relationship};
pub use error::{RepositoryError, RepositoryResult};
pub use history::{CheckoutOptions, MergeTarget};
pub use node::{NodeId, ObjectHandle, RepositoryStatus};
pub use repository::{Repository, DEFAULT_BRANCH};

#[cfg(test)]
mod fixtures;
