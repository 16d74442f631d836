use std::collections::HashMap;
use std::sync::Arc;

use ion_types::ObjectKey;
use tracing::debug;

use crate::cache::ElementCache;
use crate::element::StructureElement;
use crate::error::{StoreError, StoreResult};
use crate::traits::ElementSource;

/// Hash-keyed map of every element one repository has seen.
///
/// Lookups fall back to the shared [`ElementCache`] when one is attached;
/// an element found there is promoted into the local map so it stays alive
/// for as long as this index does.
pub struct IndexHash {
    local: HashMap<ObjectKey, Arc<StructureElement>>,
    cache: Option<Arc<ElementCache>>,
}

impl IndexHash {
    /// Create an empty, unshared index.
    pub fn new() -> Self {
        Self {
            local: HashMap::new(),
            cache: None,
        }
    }

    /// Create an empty index backed by a shared cache.
    pub fn with_cache(cache: Arc<ElementCache>) -> Self {
        Self {
            local: HashMap::new(),
            cache: Some(cache),
        }
    }

    /// The shared cache, if any.
    pub fn cache(&self) -> Option<&Arc<ElementCache>> {
        self.cache.as_ref()
    }

    /// Fetch an element, promoting it from the shared cache if necessary.
    pub fn get(&mut self, key: &ObjectKey) -> Option<Arc<StructureElement>> {
        if let Some(element) = self.local.get(key) {
            return Some(Arc::clone(element));
        }
        let element = self.cache.as_ref()?.get(key)?;
        debug!(key = %key.short_hex(), "promoted element from shared cache");
        self.local.insert(*key, Arc::clone(&element));
        Some(element)
    }

    /// Fetch an element or fail with [`StoreError::NotFound`].
    pub fn require(&mut self, key: &ObjectKey) -> StoreResult<Arc<StructureElement>> {
        self.get(key).ok_or(StoreError::NotFound(*key))
    }

    /// Returns `true` if the element is held locally or in the shared cache.
    pub fn contains(&self, key: &ObjectKey) -> bool {
        self.local.contains_key(key) || self.cache.as_ref().is_some_and(|c| c.contains(key))
    }

    /// Returns `true` if the element is held by this index itself.
    pub fn contains_local(&self, key: &ObjectKey) -> bool {
        self.local.contains_key(key)
    }

    /// Store an element and return its key.
    ///
    /// Storing identical content twice is a no-op. Offering different content
    /// under a key already held is a hash collision and is rejected.
    pub fn put(&mut self, element: StructureElement) -> StoreResult<ObjectKey> {
        self.put_shared(Arc::new(element))
    }

    /// Store an element that is already shared.
    pub fn put_shared(&mut self, element: Arc<StructureElement>) -> StoreResult<ObjectKey> {
        let key = element.key;
        if let Some(existing) = self.local.get(&key) {
            if !existing.same_content(&element) {
                return Err(StoreError::HashCollision(key));
            }
            // Prefer the copy that carries a child-link index.
            if existing.child_links().is_empty() && !element.child_links().is_empty() {
                self.local.insert(key, element);
            }
            return Ok(key);
        }
        if let Some(cache) = &self.cache {
            cache.insert(&element)?;
        }
        self.local.insert(key, element);
        Ok(key)
    }

    /// Number of elements held locally.
    pub fn len(&self) -> usize {
        self.local.len()
    }

    /// Returns `true` if nothing is held locally.
    pub fn is_empty(&self) -> bool {
        self.local.is_empty()
    }

    /// Sorted list of locally held keys.
    pub fn keys(&self) -> Vec<ObjectKey> {
        let mut keys: Vec<ObjectKey> = self.local.keys().copied().collect();
        keys.sort();
        keys
    }

    /// Iterate over locally held elements in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<StructureElement>> {
        self.local.values()
    }
}

impl Default for IndexHash {
    fn default() -> Self {
        Self::new()
    }
}

impl ElementSource for IndexHash {
    fn element(&self, key: &ObjectKey) -> Option<Arc<StructureElement>> {
        self.local
            .get(key)
            .cloned()
            .or_else(|| self.cache.as_ref().and_then(|c| c.get(key)))
    }
}

impl std::fmt::Debug for IndexHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexHash")
            .field("element_count", &self.local.len())
            .field("shared", &self.cache.is_some())
            .finish()
    }
}
