//! Content-addressed element storage for the ION object repository.
//!
//! Every committed object, commit node and mutable head travels as a
//! [`StructureElement`]: a serialized value keyed by the hash of its content
//! and type. Repositories keep the elements they have seen in an
//! [`IndexHash`]; several repositories in one process share hashed content
//! through an [`ElementCache`] that holds only weak references.
//!
//! # Design Rules
//!
//! 1. Elements are immutable once hashed. The key always equals the recomputed
//!    hash; a mismatch is corruption.
//! 2. The store is additive-only. The same key is only ever written with the
//!    same content; different content under one key is fatal.
//! 3. Concurrent reads of the shared cache are always safe.
//! 4. The store never interprets element values. Child links are supplied by
//!    the layer that understands the schema.

pub mod cache;
pub mod element;
pub mod error;
pub mod index;
pub mod traits;

pub use cache::{ElementCache, DEFAULT_PRUNE_INTERVAL};
pub use element::StructureElement;
pub use error::{StoreError, StoreResult};
pub use index::IndexHash;
pub use traits::{collect_reachable, ElementSource, Reachable};
