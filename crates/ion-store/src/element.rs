use std::collections::BTreeSet;

use ion_crypto::ContentHasher;
use ion_types::{ObjectKey, ObjectType};

use crate::error::{StoreError, StoreResult};

/// A stored element: content key, type tag, leaf flag and serialized bytes.
///
/// `StructureElement` is the unit of storage and of transfer. The key is
/// always derived from `value` and `object_type`; the child-link set is a
/// convenience index filled in by whoever can parse the value and is not
/// part of the hash.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StructureElement {
    /// Content hash of `value` and `object_type`.
    pub key: ObjectKey,
    /// Schema of the serialized value.
    pub object_type: ObjectType,
    /// `true` if the value holds no links to other elements.
    pub isleaf: bool,
    /// The serialized bytes of the object.
    pub value: Vec<u8>,
    child_links: BTreeSet<ObjectKey>,
}

impl StructureElement {
    /// Create an element from a freshly serialized value, computing its key.
    pub fn new(object_type: ObjectType, value: Vec<u8>, isleaf: bool) -> Self {
        let key = ContentHasher::element_key(&value, &object_type);
        Self {
            key,
            object_type,
            isleaf,
            value,
            child_links: BTreeSet::new(),
        }
    }

    /// Rebuild an element received from elsewhere, verifying its key.
    pub fn from_parts(
        key: ObjectKey,
        object_type: ObjectType,
        isleaf: bool,
        value: Vec<u8>,
    ) -> StoreResult<Self> {
        let element = Self {
            key,
            object_type,
            isleaf,
            value,
            child_links: BTreeSet::new(),
        };
        element.verify()?;
        Ok(element)
    }

    /// Attach the set of direct child keys.
    pub fn with_child_links(mut self, links: impl IntoIterator<Item = ObjectKey>) -> Self {
        self.child_links = links.into_iter().collect();
        self
    }

    /// Keys of the elements this one links to directly.
    pub fn child_links(&self) -> &BTreeSet<ObjectKey> {
        &self.child_links
    }

    /// Recompute the hash and compare it against the stored key.
    pub fn verify(&self) -> StoreResult<()> {
        let computed = ContentHasher::element_key(&self.value, &self.object_type);
        if computed != self.key {
            return Err(StoreError::HashMismatch {
                key: self.key,
                computed,
            });
        }
        Ok(())
    }

    /// Returns `true` if both elements carry the same hashed content.
    pub fn same_content(&self, other: &Self) -> bool {
        self.object_type == other.object_type && self.value == other.value
    }

    /// Size of the serialized value in bytes.
    pub fn size(&self) -> usize {
        self.value.len()
    }
}
