//! Serialization of a single object tree to and from a transfer container.

use std::collections::HashSet;
use std::sync::Arc;

use ion_protocol::Container;
use ion_schema::TypeRegistry;
use ion_store::{collect_reachable, ElementCache, StructureElement};
use ion_types::well_known::{COMMIT, MUTABLE_HEAD};
use ion_types::ObjectKey;
use tracing::debug;

use crate::commit::{Commit, MutableHead};
use crate::error::{RepositoryError, RepositoryResult};
use crate::node::{ObjectHandle, Scope};
use crate::repository::Repository;

/// Direct child keys of an element, parsed according to its type.
///
/// Commits link their root and parents, a mutable head links its branches'
/// commit refs, and structured objects link whatever their link fields
/// hold. Leaf elements have no children and are not parsed.
pub fn element_child_keys(
    registry: &TypeRegistry,
    element: &StructureElement,
) -> RepositoryResult<Vec<ObjectKey>> {
    if element.object_type == COMMIT {
        return Ok(Commit::from_element(element)?.child_keys());
    }
    if element.object_type == MUTABLE_HEAD {
        return Ok(MutableHead::from_element(element)?.all_commitrefs());
    }
    if element.isleaf {
        return Ok(Vec::new());
    }
    Ok(registry
        .parse(element.object_type, &element.value)?
        .child_keys())
}

/// Encodes one object tree as a self-contained [`Container`]: the root
/// element as the single head, everything it reaches as items.
pub struct ObjectCodec {
    registry: Arc<TypeRegistry>,
    cache: Option<Arc<ElementCache>>,
}

impl ObjectCodec {
    pub fn new(registry: Arc<TypeRegistry>) -> Self {
        Self {
            registry,
            cache: None,
        }
    }

    /// Decoded repositories share hashed content through `cache`.
    pub fn with_cache(registry: Arc<TypeRegistry>, cache: Arc<ElementCache>) -> Self {
        Self {
            registry,
            cache: Some(cache),
        }
    }

    /// Hash a copy of the object tree at `handle` and serialize it.
    ///
    /// The source repository is not modified.
    pub fn encode(&self, repo: &Repository, handle: &ObjectHandle) -> RepositoryResult<Vec<u8>> {
        let mut scratch = Repository::new(Arc::clone(&self.registry), None);
        let copy = scratch.copy_object_from(repo, handle, false, false)?;
        let root = scratch.hash_tree(copy.node)?;

        let reach = collect_reachable(
            &scratch.index,
            &[root.key],
            &HashSet::new(),
            &HashSet::new(),
        );
        if let Some(missing) = reach.missing.first() {
            return Err(RepositoryError::NotFound(*missing));
        }
        let (head, items) = reach
            .elements
            .split_first()
            .ok_or(RepositoryError::NotFound(root.key))?;
        let container = Container::new([head.as_ref()], items.iter().map(|e| e.as_ref()));
        debug!(root = %root.key.short_hex(), items = items.len(), "encoded object");
        Ok(container.to_bytes())
    }

    /// Rebuild an object tree in a fresh repository. The decoded root is
    /// hashed and unmodified; the repository has no commits.
    pub fn decode(&self, bytes: &[u8]) -> RepositoryResult<(Repository, ObjectHandle)> {
        let container = Container::from_bytes(bytes)?;
        let mut heads = container.head_elements()?;
        let head = match (heads.pop(), heads.is_empty()) {
            (Some(head), true) => head,
            _ => {
                return Err(RepositoryError::InvalidState(
                    "object container must carry exactly one head".into(),
                ))
            }
        };
        let root_key = head.key;

        let mut repo = Repository::new(Arc::clone(&self.registry), self.cache.clone());
        let mut elements = container.item_elements()?;
        elements.push(head);
        repo.receive_elements(elements)?;
        let root = repo.load_object(Scope::Workspace, root_key, false)?;
        repo.root = Some(root);
        let handle = ObjectHandle::root_of(repo.id, root);
        Ok((repo, handle))
    }
}
