use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock, Weak};

use ion_types::ObjectKey;
use tracing::debug;

use crate::element::StructureElement;
use crate::error::{StoreError, StoreResult};

/// Default number of inserts between sweeps of dead entries.
pub const DEFAULT_PRUNE_INTERVAL: usize = 256;

/// Process-wide cache of hashed elements shared by many repositories.
///
/// The cache holds only weak references: an element stays reachable through
/// the cache for as long as at least one [`IndexHash`](crate::IndexHash) keeps
/// it alive. Dead entries are swept every `prune_interval` inserts or on an
/// explicit [`prune`](Self::prune).
///
/// Writes are additive and keyed by content hash, so concurrent population
/// from several repositories needs no coordination beyond the map lock.
pub struct ElementCache {
    entries: RwLock<HashMap<ObjectKey, Weak<StructureElement>>>,
    inserts: AtomicUsize,
    prune_interval: usize,
}

impl ElementCache {
    pub fn new() -> Self {
        Self::with_prune_interval(DEFAULT_PRUNE_INTERVAL)
    }

    pub fn with_prune_interval(prune_interval: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            inserts: AtomicUsize::new(0),
            prune_interval: prune_interval.max(1),
        }
    }

    /// Look up a live element.
    pub fn get(&self, key: &ObjectKey) -> Option<Arc<StructureElement>> {
        let entries = self.entries.read().expect("lock poisoned");
        entries.get(key).and_then(Weak::upgrade)
    }

    /// Returns `true` if a live element is cached under `key`.
    pub fn contains(&self, key: &ObjectKey) -> bool {
        self.get(key).is_some()
    }

    /// Register an element.
    ///
    /// Re-inserting identical content is a no-op. Different content under a
    /// live key is a hash collision and is rejected.
    pub fn insert(&self, element: &Arc<StructureElement>) -> StoreResult<()> {
        {
            let mut entries = self.entries.write().expect("lock poisoned");
            if let Some(existing) = entries.get(&element.key).and_then(Weak::upgrade) {
                if !existing.same_content(element) {
                    return Err(StoreError::HashCollision(element.key));
                }
                return Ok(());
            }
            entries.insert(element.key, Arc::downgrade(element));
        }

        let count = self.inserts.fetch_add(1, Ordering::Relaxed) + 1;
        if count % self.prune_interval == 0 {
            self.prune();
        }
        Ok(())
    }

    /// Drop entries whose elements are no longer held by any repository.
    /// Returns the number of entries removed.
    pub fn prune(&self) -> usize {
        let mut entries = self.entries.write().expect("lock poisoned");
        let before = entries.len();
        entries.retain(|_, weak| weak.strong_count() > 0);
        let removed = before - entries.len();
        if removed > 0 {
            debug!(removed, remaining = entries.len(), "pruned element cache");
        }
        removed
    }

    /// Number of entries whose elements are still alive.
    pub fn live_count(&self) -> usize {
        let entries = self.entries.read().expect("lock poisoned");
        entries.values().filter(|w| w.strong_count() > 0).count()
    }

    /// Number of entries including dead ones not yet swept.
    pub fn len(&self) -> usize {
        self.entries.read().expect("lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ElementCache {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ElementCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ElementCache")
            .field("entries", &self.len())
            .field("prune_interval", &self.prune_interval)
            .finish()
    }
}
