use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::error::{AssociationError, AssociationResult};
use crate::instance::AssociationInstance;

/// Index of associations by predicate repository key.
///
/// Predicates can also be looked up through human-readable names mapped to
/// their repository keys.
#[derive(Clone, Debug, Default)]
pub struct AssociationManager {
    by_predicate: HashMap<String, HashSet<AssociationInstance>>,
    predicate_names: HashMap<String, String>,
}

impl AssociationManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map a readable predicate name to a predicate repository key.
    pub fn name_predicate(&mut self, name: &str, predicate_key: &str) {
        self.predicate_names
            .insert(name.to_string(), predicate_key.to_string());
    }

    /// Index an association. Returns `false` if it was already indexed.
    pub fn add(&mut self, association: AssociationInstance) -> AssociationResult<bool> {
        if association.is_null() {
            return Err(AssociationError::Dissolved(
                association.repository_key.to_string(),
            ));
        }
        let predicate = association.predicate.repository_key.clone();
        let added = self
            .by_predicate
            .entry(predicate)
            .or_default()
            .insert(association);
        Ok(added)
    }

    /// Remove an indexed association. Removing one that is not indexed is an
    /// error.
    pub fn remove(&mut self, association: &AssociationInstance) -> AssociationResult<()> {
        let predicate = &association.predicate.repository_key;
        let removed = self
            .by_predicate
            .get_mut(predicate)
            .is_some_and(|set| set.remove(association));
        if !removed {
            return Err(AssociationError::NotIndexed(
                association.repository_key.to_string(),
            ));
        }
        if self.by_predicate.get(predicate).is_some_and(HashSet::is_empty) {
            self.by_predicate.remove(predicate);
        }
        Ok(())
    }

    pub fn contains(&self, association: &AssociationInstance) -> bool {
        self.by_predicate
            .get(&association.predicate.repository_key)
            .is_some_and(|set| set.contains(association))
    }

    pub fn get_associations_by_predicate(
        &self,
        predicate_key: &str,
    ) -> Option<&HashSet<AssociationInstance>> {
        self.by_predicate.get(predicate_key)
    }

    pub fn get_associations_by_predicate_name(
        &self,
        name: &str,
    ) -> Option<&HashSet<AssociationInstance>> {
        self.predicate_names
            .get(name)
            .and_then(|key| self.by_predicate.get(key))
    }

    /// Predicate keys with at least one association.
    pub fn predicates(&self) -> impl Iterator<Item = &str> {
        self.by_predicate.keys().map(String::as_str)
    }

    /// Union another manager's index and predicate names into this one.
    pub fn update(&mut self, other: &AssociationManager) {
        for (predicate, set) in &other.by_predicate {
            self.by_predicate
                .entry(predicate.clone())
                .or_default()
                .extend(set.iter().cloned());
        }
        for (name, key) in &other.predicate_names {
            self.predicate_names
                .entry(name.clone())
                .or_insert_with(|| key.clone());
        }
        debug!(predicates = self.by_predicate.len(), total = self.len(), "merged association index");
    }

    /// Number of indexed associations.
    pub fn len(&self) -> usize {
        self.by_predicate.values().map(HashSet::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.by_predicate.is_empty()
    }
}
