use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use ion_types::{ObjectKey, ObjectType};

use crate::element::StructureElement;

/// Read-only access to hashed elements.
///
/// Implemented by [`IndexHash`](crate::IndexHash) and by plain maps of
/// received elements, so reachability walks work the same way over a
/// repository's index and over a freshly decoded transfer.
pub trait ElementSource {
    /// Look up an element without side effects.
    fn element(&self, key: &ObjectKey) -> Option<Arc<StructureElement>>;

    /// Returns `true` if the element is available.
    fn has_element(&self, key: &ObjectKey) -> bool {
        self.element(key).is_some()
    }
}

impl ElementSource for HashMap<ObjectKey, Arc<StructureElement>> {
    fn element(&self, key: &ObjectKey) -> Option<Arc<StructureElement>> {
        self.get(key).cloned()
    }
}

/// Result of a reachability walk.
#[derive(Clone, Debug, Default)]
pub struct Reachable {
    /// Elements reached, in breadth-first order.
    pub elements: Vec<Arc<StructureElement>>,
    /// Keys that were referenced but not available from the source.
    pub missing: Vec<ObjectKey>,
}

impl Reachable {
    pub fn keys(&self) -> impl Iterator<Item = ObjectKey> + '_ {
        self.elements.iter().map(|e| e.key)
    }
}

/// Walk child links breadth-first from `roots`.
///
/// The walk does not descend into keys in `known` (the receiver already has
/// them) nor into elements whose type is in `excluded`. Each element is
/// visited at most once.
pub fn collect_reachable(
    source: &impl ElementSource,
    roots: &[ObjectKey],
    known: &HashSet<ObjectKey>,
    excluded: &HashSet<ObjectType>,
) -> Reachable {
    let mut result = Reachable::default();
    let mut visited: HashSet<ObjectKey> = HashSet::new();
    let mut queue: VecDeque<ObjectKey> = VecDeque::new();

    for root in roots {
        if !known.contains(root) && visited.insert(*root) {
            queue.push_back(*root);
        }
    }

    while let Some(key) = queue.pop_front() {
        let Some(element) = source.element(&key) else {
            result.missing.push(key);
            continue;
        };
        if excluded.contains(&element.object_type) {
            continue;
        }
        for child in element.child_links() {
            if !known.contains(child) && visited.insert(*child) {
                queue.push_back(*child);
            }
        }
        result.elements.push(element);
    }

    result
}
