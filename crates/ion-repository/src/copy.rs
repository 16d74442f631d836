use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use ion_schema::{FieldPath, LinkKey, Message, Value};
use ion_store::{collect_reachable, ElementSource, StructureElement};
use ion_types::ObjectKey;
use tracing::{debug, warn};

use crate::error::{RepositoryError, RepositoryResult};
use crate::node::{LinkSite, Node, NodeId, ObjectHandle, Scope};
use crate::repository::Repository;

/// Everything a copy needs, gathered from the source before the target is
/// touched.
#[derive(Default)]
struct CopyPlan {
    objects: Vec<Message>,
    /// `(owner, path inside owner, child)` by position in `objects`.
    edges: Vec<(usize, FieldPath, usize)>,
    /// Hashed content referenced, not copied.
    elements: Vec<Arc<StructureElement>>,
}

struct CopyPlanner<'a> {
    source: &'a Repository,
    scope: Scope,
    deep: bool,
    ignore_errors: bool,
    plan: CopyPlan,
    memo: HashMap<LinkKey, usize>,
    shipped: HashSet<ObjectKey>,
}

impl<'a> CopyPlanner<'a> {
    fn new(source: &'a Repository, scope: Scope, deep: bool, ignore_errors: bool) -> Self {
        Self {
            source,
            scope,
            deep,
            ignore_errors,
            plan: CopyPlan::default(),
            memo: HashMap::new(),
            shipped: HashSet::new(),
        }
    }

    fn visit(&mut self, message: Message) -> RepositoryResult<usize> {
        let source: &'a Repository = self.source;
        let index = self.plan.objects.len();
        let links = message.links();
        self.plan.objects.push(message);

        for (path, link) in links {
            match link.key {
                LinkKey::Null => {}
                LinkKey::Local(_) => {
                    let child = match self.memo.get(&link.key) {
                        Some(child) => *child,
                        None => {
                            let node = source
                                .workspace
                                .get(&(self.scope, link.key))
                                .and_then(|id| source.nodes.get(id))
                                .ok_or_else(|| {
                                    RepositoryError::InvalidState(format!(
                                        "dangling workspace link {}",
                                        link.key
                                    ))
                                })?;
                            let child = self.visit(node.message.clone())?;
                            self.memo.insert(link.key, child);
                            child
                        }
                    };
                    self.plan.edges.push((index, path, child));
                }
                LinkKey::Hash(hash) if self.deep => {
                    if let Some(child) = self.memo.get(&link.key) {
                        self.plan.edges.push((index, path, *child));
                        continue;
                    }
                    let live = source
                        .workspace
                        .get(&(self.scope, link.key))
                        .and_then(|id| source.nodes.get(id));
                    let message = match live {
                        Some(node) => node.message.clone(),
                        None => match source.index.element(&hash) {
                            Some(element) => {
                                source.registry.parse(element.object_type, &element.value)?
                            }
                            None if self.ignore_errors => {
                                warn!(key = %hash.short_hex(), "skipping missing object during copy");
                                continue;
                            }
                            None => return Err(RepositoryError::NotFound(hash)),
                        },
                    };
                    let child = self.visit(message)?;
                    self.memo.insert(link.key, child);
                    self.plan.edges.push((index, path, child));
                }
                LinkKey::Hash(hash) => {
                    if self.shipped.contains(&hash) {
                        continue;
                    }
                    let reach = collect_reachable(
                        &source.index,
                        &[hash],
                        &self.shipped,
                        &HashSet::new(),
                    );
                    if let Some(missing) = reach.missing.first() {
                        if !self.ignore_errors {
                            return Err(RepositoryError::NotFound(*missing));
                        }
                        warn!(missing = reach.missing.len(), "copy is missing linked content");
                    }
                    self.shipped.extend(reach.keys());
                    self.plan.elements.extend(reach.elements);
                }
            }
        }
        Ok(index)
    }
}

impl Repository {
    /// Copy an object (or an embedded sub-object) of this repository into a
    /// new, modified, unlinked workspace object.
    ///
    /// Modified children are always copied. With `deep`, committed children
    /// are copied too; otherwise the copy links to the same hashed content.
    pub fn copy_object(
        &mut self,
        handle: &ObjectHandle,
        deep: bool,
    ) -> RepositoryResult<ObjectHandle> {
        let scope = self.check_handle(handle)?.scope;
        let message = self.message(handle)?;
        let mut planner = CopyPlanner::new(self, scope, deep, false);
        planner.visit(message)?;
        let plan = planner.plan;
        self.apply_copy(plan)
    }

    /// Copy an object held by another repository into this one.
    ///
    /// Hashed content the copy refers to is transferred along with it. With
    /// `ignore_copy_errors`, content missing from the source is skipped
    /// instead of failing the copy.
    pub fn copy_object_from(
        &mut self,
        source: &Repository,
        handle: &ObjectHandle,
        deep: bool,
        ignore_copy_errors: bool,
    ) -> RepositoryResult<ObjectHandle> {
        if source.id == self.id {
            return self.copy_object(handle, deep);
        }
        let scope = source.check_handle(handle)?.scope;
        let message = source.message(handle)?;
        let mut planner = CopyPlanner::new(source, scope, deep, ignore_copy_errors);
        planner.visit(message)?;
        self.apply_copy(planner.plan)
    }

    fn apply_copy(&mut self, plan: CopyPlan) -> RepositoryResult<ObjectHandle> {
        let shared = plan.elements.len();
        for element in plan.elements {
            self.index.put_shared(element)?;
        }
        let mut ids: Vec<NodeId> = Vec::with_capacity(plan.objects.len());
        for message in plan.objects {
            let key = self.fresh_local();
            ids.push(self.alloc_node(Node::new(message, key, Scope::Workspace, true, false)));
        }
        for (owner, path, child) in plan.edges {
            let (owner, child) = (ids[owner], ids[child]);
            let (child_key, child_leaf) = match self.nodes.get(&child) {
                Some(node) => (node.key, node.message.is_leaf()),
                None => continue,
            };
            if let Some(link) = self
                .nodes
                .get_mut(&owner)
                .and_then(|n| n.message.value_at_mut(&path))
                .and_then(Value::as_link_mut)
            {
                link.key = child_key;
                link.isleaf = child_leaf;
            }
            if let Some(node) = self.nodes.get_mut(&child) {
                node.parents.insert(LinkSite { owner, path });
            }
        }
        let root = ids.first().copied().ok_or(RepositoryError::InvalidObject)?;
        debug!(objects = ids.len(), shared, "copied object");
        Ok(ObjectHandle::root_of(self.id, root))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{label, node, tree_repo};

    fn committed_tree() -> (Repository, ObjectHandle, ObjectHandle) {
        let (mut repo, root) = tree_repo();
        repo.set(&root, "label", "root").unwrap();
        let left = node(&mut repo, "left");
        repo.set_link(&root, "left", &left).unwrap();
        repo.commit("tree").unwrap();
        (repo, root, left)
    }

    #[test]
    fn shallow_copy_shares_committed_children() {
        let (mut repo, root, left) = committed_tree();
        let copy = repo.copy_object(&root, false).unwrap();
        assert_ne!(copy, root);
        assert!(repo.is_modified(&copy).unwrap());
        assert_eq!(label(&repo, &copy), "root");
        assert_eq!(repo.get_object(&copy, "left").unwrap(), Some(left));
    }

    #[test]
    fn deep_copy_duplicates_committed_children() {
        let (mut repo, root, left) = committed_tree();
        let copy = repo.copy_object(&root, true).unwrap();
        let copied_left = repo.get_object(&copy, "left").unwrap().unwrap();
        assert_ne!(copied_left, left);
        assert!(repo.is_modified(&copied_left).unwrap());

        repo.set(&copied_left, "label", "changed").unwrap();
        assert_eq!(label(&repo, &left), "left");
        assert_eq!(label(&repo, &copied_left), "changed");
    }

    #[test]
    fn modified_children_are_always_copied() {
        let (mut repo, root) = tree_repo();
        let left = node(&mut repo, "left");
        repo.set_link(&root, "left", &left).unwrap();
        let copy = repo.copy_object(&root, false).unwrap();
        let copied_left = repo.get_object(&copy, "left").unwrap().unwrap();
        assert_ne!(copied_left, left);
        assert_eq!(label(&repo, &copied_left), "left");
    }

    #[test]
    fn shared_children_stay_shared_in_the_copy() {
        let (mut repo, root) = tree_repo();
        let item = node(&mut repo, "item");
        repo.push_link(&root, "items", &item).unwrap();
        repo.push_link(&root, "items", &item).unwrap();
        let copy = repo.copy_object(&root, false).unwrap();
        let first = repo.get_object_at(&copy, "items", 0).unwrap().unwrap();
        let second = repo.get_object_at(&copy, "items", 1).unwrap().unwrap();
        assert_eq!(first, second);
        assert_ne!(first, item);
    }

    #[test]
    fn copy_from_another_repository_brings_content() {
        let (source, root, left) = committed_tree();
        let left_key = source.object_key(&left).unwrap().unwrap();

        let (mut target, _) = tree_repo();
        let copy = target.copy_object_from(&source, &root, false, false).unwrap();
        assert!(target.has_content(&left_key));
        let copied_left = target.get_object(&copy, "left").unwrap().unwrap();
        assert_eq!(label(&target, &copied_left), "left");

        target.set_root_object(&copy).unwrap();
        target.commit("imported").unwrap();
        assert_eq!(
            target.object_key(&copy).unwrap(),
            source.object_key(&root).unwrap()
        );
    }

    #[test]
    fn handles_from_other_repositories_are_rejected_by_copy_object() {
        let (_, root, _) = committed_tree();
        let (mut target, _) = tree_repo();
        assert_eq!(
            target.copy_object(&root, false),
            Err(RepositoryError::ForeignObject)
        );
    }
}
