//! The repository: one versioned graph of structured objects.
//!
//! Live objects sit in an arena of [`Node`]s addressed by [`NodeId`]. The
//! workspace map resolves link keys (workspace-local ids before commit,
//! content hashes after) to nodes, so every link carrying the same key
//! resolves to the same live object. Hashed content lives in the
//! repository's [`IndexHash`]; nodes are parsed from it lazily on first
//! access.
//!
//! # Invariants
//!
//! - A node is `modified` exactly when its key is `Local`.
//! - A modified node's parents are modified too (propagation is eager).
//! - Node ids are never reused, so a dropped node leaves every handle to it
//!   invalid for good.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use ion_schema::{FieldPath, Link, LinkKey, PathStep, TypeRegistry, Value};
use ion_store::{ElementCache, ElementSource, IndexHash, StructureElement};
use ion_types::{BranchKey, ObjectKey, ObjectType, RepositoryKey};
use tracing::{debug, info, warn};

use crate::codec::element_child_keys;
use crate::commit::{Branch, Commit, MutableHead, ObjectRoot, ParentRef};
use crate::error::{RepositoryError, RepositoryResult};
use crate::node::{LinkSite, Node, NodeId, ObjectHandle, RepositoryStatus, Scope};

/// Nickname given to the first branch of every repository.
pub const DEFAULT_BRANCH: &str = "master";

static NEXT_REPOSITORY_ID: AtomicU64 = AtomicU64::new(1);

/// A diverged or explicitly merged state loaded beside the workspace.
#[derive(Clone, Debug)]
pub(crate) struct PendingMerge {
    pub commit: ObjectKey,
    pub root: NodeId,
}

/// One versioned object graph with its workspace, history and branches.
pub struct Repository {
    pub(crate) id: u64,
    pub(crate) registry: Arc<TypeRegistry>,

    pub(crate) nodes: HashMap<NodeId, Node>,
    next_node: NodeId,
    next_local: u64,
    pub(crate) workspace: HashMap<(Scope, LinkKey), NodeId>,
    pub(crate) root: Option<NodeId>,

    pub(crate) index: IndexHash,
    pub(crate) commits: HashMap<ObjectKey, Commit>,
    pub(crate) head: MutableHead,
    pub(crate) current_branch: Option<BranchKey>,
    pub(crate) head_commit: Option<ObjectKey>,
    pub(crate) detached: bool,
    pub(crate) merge: Vec<PendingMerge>,
    pub(crate) nicknames: HashMap<String, BranchKey>,
    pub(crate) excluded_types: HashSet<ObjectType>,

    /// Keep this repository when the owning workbench evicts.
    pub persistent: bool,
    /// Repository content is also held by a longer-lived store.
    pub cached: bool,
}

impl Repository {
    /// An empty repository with a fresh key and one empty `master` branch.
    pub fn new(registry: Arc<TypeRegistry>, cache: Option<Arc<ElementCache>>) -> Self {
        let mut head = MutableHead::new(RepositoryKey::generate());
        let master = BranchKey::generate();
        head.branches.push(Branch::new(master.clone()));
        let mut repo = Self::from_head(registry, cache, head);
        repo.current_branch = Some(master);
        repo
    }

    /// A new repository whose root is an empty object of `root_type`.
    pub fn create(
        registry: Arc<TypeRegistry>,
        cache: Option<Arc<ElementCache>>,
        root_type: ObjectType,
    ) -> RepositoryResult<Self> {
        let mut repo = Self::new(registry, cache);
        let root = repo.create_object(root_type)?;
        repo.root = Some(root.node);
        info!(repo = %repo.head.repository_key.short_id(), %root_type, "created repository");
        Ok(repo)
    }

    /// A repository known only by its mutable head, as received from a peer.
    /// Nothing is checked out.
    pub fn from_head(
        registry: Arc<TypeRegistry>,
        cache: Option<Arc<ElementCache>>,
        head: MutableHead,
    ) -> Self {
        let mut nicknames = HashMap::new();
        if let Some(first) = head.branches.first() {
            nicknames.insert(DEFAULT_BRANCH.to_string(), first.branchkey.clone());
        }
        let index = match cache {
            Some(cache) => IndexHash::with_cache(cache),
            None => IndexHash::new(),
        };
        Self {
            id: NEXT_REPOSITORY_ID.fetch_add(1, Ordering::Relaxed),
            registry,
            nodes: HashMap::new(),
            next_node: 1,
            next_local: 1,
            workspace: HashMap::new(),
            root: None,
            index,
            commits: HashMap::new(),
            head,
            current_branch: None,
            head_commit: None,
            detached: false,
            merge: Vec::new(),
            nicknames,
            excluded_types: HashSet::new(),
            persistent: false,
            cached: false,
        }
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn repository_key(&self) -> &RepositoryKey {
        &self.head.repository_key
    }

    pub fn registry(&self) -> &Arc<TypeRegistry> {
        &self.registry
    }

    /// Workspace state, derived from the root object alone.
    pub fn status(&self) -> RepositoryStatus {
        match self.root {
            None => RepositoryStatus::NotInitialized,
            Some(id) => match self.nodes.get(&id) {
                None => RepositoryStatus::Invalid,
                Some(node) if node.modified => RepositoryStatus::Modified,
                Some(_) => RepositoryStatus::UpToDate,
            },
        }
    }

    pub fn is_detached(&self) -> bool {
        self.detached
    }

    /// Key of the branch the workspace was checked out from.
    pub fn current_branch(&self) -> Option<&BranchKey> {
        self.current_branch.as_ref()
    }

    /// The commit the workspace was checked out from or last committed as.
    pub fn commit_head(&self) -> Option<ObjectKey> {
        self.head_commit
    }

    pub fn mutable_head(&self) -> &MutableHead {
        &self.head
    }

    /// Direct access to the branch table, for merge-on-receive.
    pub fn mutable_head_mut(&mut self) -> &mut MutableHead {
        &mut self.head
    }

    pub fn index(&self) -> &IndexHash {
        &self.index
    }

    /// Keys of every commit element held locally.
    pub fn known_commits(&self) -> HashSet<ObjectKey> {
        self.index
            .iter()
            .filter(|e| e.object_type == ion_types::well_known::COMMIT)
            .map(|e| e.key)
            .collect()
    }

    pub fn excluded_types(&self) -> &HashSet<ObjectType> {
        &self.excluded_types
    }

    pub fn set_excluded_types(&mut self, types: HashSet<ObjectType>) {
        self.excluded_types = types;
    }

    /// Number of live objects in the workspace and merge scopes.
    pub fn live_objects(&self) -> usize {
        self.nodes.len()
    }

    /// Handle to the checked-out root object.
    pub fn root_object(&self) -> RepositoryResult<ObjectHandle> {
        let id = self
            .root
            .ok_or_else(|| RepositoryError::InvalidState("repository is not initialized".into()))?;
        if !self.nodes.contains_key(&id) {
            return Err(RepositoryError::InvalidState("workspace root is missing".into()));
        }
        Ok(ObjectHandle::root_of(self.id, id))
    }

    /// Make an existing workspace object the root of the next commit.
    pub fn set_root_object(&mut self, handle: &ObjectHandle) -> RepositoryResult<()> {
        if !handle.is_root() {
            return Err(RepositoryError::NotRootObject);
        }
        let node = self.check_handle(handle)?;
        if node.scope != Scope::Workspace {
            return Err(RepositoryError::ReadOnly);
        }
        if self.detached {
            return Err(RepositoryError::DetachedHead);
        }
        self.root = Some(handle.node);
        self.set_modified(handle.node)
    }

    /// A new, empty, modified object that is not yet linked anywhere.
    pub fn create_object(&mut self, object_type: ObjectType) -> RepositoryResult<ObjectHandle> {
        let message = self.registry.new_message(object_type)?;
        let key = self.fresh_local();
        let id = self.alloc_node(Node::new(message, key, Scope::Workspace, true, false));
        Ok(ObjectHandle::root_of(self.id, id))
    }

    // -----------------------------------------------------------------------
    // Arena bookkeeping
    // -----------------------------------------------------------------------

    pub(crate) fn fresh_local(&mut self) -> LinkKey {
        let key = LinkKey::Local(self.next_local);
        self.next_local += 1;
        key
    }

    pub(crate) fn alloc_node(&mut self, node: Node) -> NodeId {
        let id = self.next_node;
        self.next_node += 1;
        self.workspace.insert((node.scope, node.key), id);
        self.nodes.insert(id, node);
        id
    }

    pub(crate) fn check_handle(&self, handle: &ObjectHandle) -> RepositoryResult<&Node> {
        if handle.repo != self.id {
            return Err(RepositoryError::ForeignObject);
        }
        let node = self
            .nodes
            .get(&handle.node)
            .ok_or(RepositoryError::InvalidObject)?;
        if !handle.path.is_empty() && node.generation != handle.generation {
            return Err(RepositoryError::InvalidObject);
        }
        Ok(node)
    }

    /// Drop a node so every handle to it becomes invalid.
    fn retire(&mut self, id: NodeId) {
        if let Some(node) = self.nodes.remove(&id) {
            let entry = (node.scope, node.key);
            if self.workspace.get(&entry) == Some(&id) {
                self.workspace.remove(&entry);
            }
        }
    }

    /// Drop every live object. All outstanding handles become invalid.
    pub(crate) fn invalidate_workspace(&mut self) {
        let dropped = self.nodes.len();
        self.nodes.clear();
        self.workspace.clear();
        self.merge.clear();
        self.root = None;
        debug!(dropped, "invalidated workspace");
    }

    pub(crate) fn discard_merge(&mut self) {
        if self.merge.is_empty() {
            return;
        }
        let merge_nodes: Vec<NodeId> = self
            .nodes
            .iter()
            .filter(|(_, n)| n.scope == Scope::Merge)
            .map(|(id, _)| *id)
            .collect();
        for id in merge_nodes {
            self.retire(id);
        }
        self.merge.clear();
    }

    // -----------------------------------------------------------------------
    // Content
    // -----------------------------------------------------------------------

    /// Parse a hashed object into a live node, or return the node already
    /// holding that content.
    pub(crate) fn load_object(
        &mut self,
        scope: Scope,
        key: ObjectKey,
        read_only: bool,
    ) -> RepositoryResult<NodeId> {
        if let Some(id) = self.workspace.get(&(scope, LinkKey::Hash(key))) {
            return Ok(*id);
        }
        let element = self.index.require(&key)?;
        if self.excluded_types.contains(&element.object_type) {
            return Err(RepositoryError::ExcludedType(element.object_type));
        }
        let message = self.registry.parse(element.object_type, &element.value)?;
        let id = self.alloc_node(Node::new(message, LinkKey::Hash(key), scope, false, read_only));
        debug!(key = %key.short_hex(), object_type = %element.object_type, "loaded object");
        Ok(id)
    }

    /// Resolve the link at `path` inside `owner`.
    ///
    /// Resolution tries the live workspace first, then the hashed index
    /// (parsing lazily). Content absent from both fails with
    /// [`RepositoryError::NotFound`] so the caller can fetch it. Every
    /// successful resolution records `owner`/`path` as a parent of the
    /// target.
    pub(crate) fn resolve_link(
        &mut self,
        owner: NodeId,
        path: &[PathStep],
    ) -> RepositoryResult<Option<NodeId>> {
        let (link, scope, read_only) = {
            let node = self.nodes.get(&owner).ok_or(RepositoryError::InvalidObject)?;
            let link = node
                .message
                .value_at(path)
                .and_then(Value::as_link)
                .copied();
            (link, node.scope, node.read_only)
        };
        let Some(link) = link.filter(|l| !l.is_null()) else {
            return Ok(None);
        };
        if let Some(t) = link.object_type {
            if self.excluded_types.contains(&t) {
                return Err(RepositoryError::ExcludedType(t));
            }
        }
        let target = match self.workspace.get(&(scope, link.key)) {
            Some(id) => *id,
            None => match link.key {
                LinkKey::Hash(hash) => self.load_object(scope, hash, read_only || self.detached)?,
                other => {
                    return Err(RepositoryError::InvalidState(format!(
                        "dangling workspace link {other}"
                    )))
                }
            },
        };
        if let Some(node) = self.nodes.get_mut(&target) {
            node.parents.insert(LinkSite {
                owner,
                path: path.to_vec(),
            });
        }
        Ok(Some(target))
    }

    /// Add hashed elements received from elsewhere, indexing their child
    /// links. Returns how many were new to this repository.
    pub fn receive_elements(
        &mut self,
        elements: impl IntoIterator<Item = StructureElement>,
    ) -> RepositoryResult<usize> {
        let mut added = 0;
        for element in elements {
            if self.index.contains_local(&element.key) {
                continue;
            }
            let children = element_child_keys(&self.registry, &element)?;
            self.index.put(element.with_child_links(children))?;
            added += 1;
        }
        Ok(added)
    }

    /// Look a commit up in the commit index, parsing it from the element
    /// index on first use.
    pub fn load_commit(&mut self, key: ObjectKey) -> RepositoryResult<Commit> {
        if let Some(commit) = self.commits.get(&key) {
            return Ok(commit.clone());
        }
        let element = self.index.require(&key)?;
        let commit = Commit::from_element(&element)?;
        self.commits.insert(key, commit.clone());
        Ok(commit)
    }

    /// Returns `true` if the commit or the element is held locally.
    pub fn has_content(&self, key: &ObjectKey) -> bool {
        self.commits.contains_key(key) || self.index.contains(key)
    }

    // -----------------------------------------------------------------------
    // Modification tracking
    // -----------------------------------------------------------------------

    /// Mark `start` and every transitive parent modified.
    ///
    /// Each newly modified node gets a fresh local key; the links that point
    /// at it are rewritten to that key and their owners are marked in turn.
    /// A node that was hashed first adopts every live link carrying its old
    /// hash, so links that were never resolved are rewritten too.
    pub(crate) fn set_modified(&mut self, start: NodeId) -> RepositoryResult<()> {
        if !self.nodes.contains_key(&start) {
            return Err(RepositoryError::InvalidObject);
        }
        let mut pending = vec![start];
        while let Some(id) = pending.pop() {
            let (old_key, scope) = match self.nodes.get(&id) {
                Some(node) if !node.modified => (node.key, node.scope),
                _ => continue,
            };
            if let LinkKey::Hash(hash) = old_key {
                self.adopt_hash_parents(id, scope, hash);
            }
            let new_key = self.fresh_local();
            if let Some(node) = self.nodes.get_mut(&id) {
                node.modified = true;
            }
            pending.extend(self.rekey(id, new_key, None));
        }
        Ok(())
    }

    fn adopt_hash_parents(&mut self, id: NodeId, scope: Scope, hash: ObjectKey) {
        let target = LinkKey::Hash(hash);
        let found: Vec<LinkSite> = self
            .nodes
            .iter()
            .filter(|(owner, node)| **owner != id && node.scope == scope)
            .flat_map(|(owner, node)| {
                node.message
                    .links()
                    .into_iter()
                    .filter(|(_, link)| link.key == target)
                    .map(move |(path, _)| LinkSite {
                        owner: *owner,
                        path,
                    })
            })
            .collect();
        if let Some(node) = self.nodes.get_mut(&id) {
            node.parents.extend(found);
        }
    }

    /// Give `id` a new key and rewrite every parent link still carrying the
    /// old one. Returns the owners that were rewritten.
    fn rekey(&mut self, id: NodeId, new_key: LinkKey, isleaf: Option<bool>) -> Vec<NodeId> {
        let Some(node) = self.nodes.get_mut(&id) else {
            return Vec::new();
        };
        let old_key = std::mem::replace(&mut node.key, new_key);
        let scope = node.scope;
        let sites: Vec<LinkSite> = node.parents.iter().cloned().collect();

        if self.workspace.get(&(scope, old_key)) == Some(&id) {
            self.workspace.remove(&(scope, old_key));
        }
        self.workspace.insert((scope, new_key), id);

        let mut owners = Vec::new();
        let mut stale = Vec::new();
        for site in sites {
            let link = self
                .nodes
                .get_mut(&site.owner)
                .and_then(|owner| owner.message.value_at_mut(&site.path))
                .and_then(Value::as_link_mut);
            match link {
                Some(link) if link.key == old_key => {
                    link.key = new_key;
                    if let Some(isleaf) = isleaf {
                        link.isleaf = isleaf;
                    }
                    owners.push(site.owner);
                }
                _ => stale.push(site),
            }
        }
        if !stale.is_empty() {
            debug!(stale = stale.len(), "dropped stale link sites");
            if let Some(node) = self.nodes.get_mut(&id) {
                for site in &stale {
                    node.parents.remove(site);
                }
            }
        }
        owners
    }

    /// Forget parent registrations made by links stored under `field` of the
    /// message at `prefix` inside `owner`.
    pub(crate) fn forget_sites_under(
        &mut self,
        owner: NodeId,
        prefix: &[PathStep],
        field: usize,
    ) {
        let depth = prefix.len();
        for node in self.nodes.values_mut() {
            node.parents.retain(|site| {
                !(site.owner == owner
                    && site.path.len() > depth
                    && site.path[..depth] == *prefix
                    && site.path[depth].field == field)
            });
        }
    }

    /// Returns `true` if `goal` is reachable from `from` through links,
    /// following live nodes where loaded and hashed elements otherwise.
    pub(crate) fn reaches(&self, from: NodeId, goal: NodeId) -> bool {
        enum Item {
            Node(NodeId),
            Element(ObjectKey),
        }
        let Some(goal_node) = self.nodes.get(&goal) else {
            return false;
        };
        let (goal_key, scope) = (goal_node.key, goal_node.scope);

        let mut visited: HashSet<LinkKey> = HashSet::new();
        let mut stack = vec![Item::Node(from)];
        while let Some(item) = stack.pop() {
            let next: Vec<LinkKey> = match item {
                Item::Node(id) => {
                    if id == goal {
                        return true;
                    }
                    match self.nodes.get(&id) {
                        Some(node) => node
                            .message
                            .links()
                            .into_iter()
                            .map(|(_, link)| link.key)
                            .filter(|key| !key.is_null())
                            .collect(),
                        None => continue,
                    }
                }
                Item::Element(key) => {
                    if LinkKey::Hash(key) == goal_key {
                        return true;
                    }
                    match self.index.element(&key) {
                        Some(element) => element
                            .child_links()
                            .iter()
                            .map(|k| LinkKey::Hash(*k))
                            .collect(),
                        None => continue,
                    }
                }
            };
            for key in next {
                if !visited.insert(key) {
                    continue;
                }
                match (self.workspace.get(&(scope, key)), key) {
                    (Some(id), _) => stack.push(Item::Node(*id)),
                    (None, LinkKey::Hash(hash)) => stack.push(Item::Element(hash)),
                    _ => {}
                }
            }
        }
        false
    }

    // -----------------------------------------------------------------------
    // Commit
    // -----------------------------------------------------------------------

    /// Commit the workspace on the current branch.
    pub fn commit(&mut self, comment: &str) -> RepositoryResult<ObjectKey> {
        self.commit_with_date(comment, Utc::now())
    }

    /// [`commit`](Self::commit) with an explicit commit date.
    pub fn commit_with_date(
        &mut self,
        comment: &str,
        date: DateTime<Utc>,
    ) -> RepositoryResult<ObjectKey> {
        match self.status() {
            RepositoryStatus::NotInitialized => {
                return Err(RepositoryError::InvalidState(
                    "cannot commit: repository is not initialized".into(),
                ))
            }
            RepositoryStatus::Invalid => {
                return Err(RepositoryError::InvalidState(
                    "cannot commit: workspace root is missing".into(),
                ))
            }
            RepositoryStatus::Modified | RepositoryStatus::UpToDate => {}
        }
        if self.detached {
            return Err(RepositoryError::DetachedHead);
        }
        let branch_key = self
            .current_branch
            .clone()
            .ok_or_else(|| RepositoryError::InvalidState("no branch checked out".into()))?;
        if self.head.branch(&branch_key).is_none() {
            return Err(RepositoryError::UnknownBranch(branch_key.to_string()));
        }
        let root = self
            .root
            .ok_or_else(|| RepositoryError::InvalidState("repository is not initialized".into()))?;

        let objectroot = self.hash_tree(root)?;

        let mut parentrefs = Vec::new();
        if let Some(head) = self.head_commit {
            parentrefs.push(ParentRef::parent(head));
        }
        for pending in &self.merge {
            if !parentrefs.iter().any(|p| p.commit == pending.commit) {
                parentrefs.push(ParentRef::merged_from(pending.commit));
            }
        }
        let root_seed = parentrefs
            .is_empty()
            .then(|| self.head.repository_key.clone());
        let commit = Commit {
            date,
            comment: comment.to_string(),
            parentrefs,
            objectroot,
            root_seed,
        };
        let key = self.index.put(commit.to_element()?)?;

        if let Some(branch) = self.head.branch_mut(&branch_key) {
            // Refs this commit did not descend from stay as divergent heads.
            let mut refs = vec![key];
            refs.extend(
                branch
                    .commitrefs
                    .iter()
                    .copied()
                    .filter(|r| *r != key && !commit.parentrefs.iter().any(|p| p.commit == *r)),
            );
            branch.commitrefs = refs;
        }
        self.commits.insert(key, commit);
        self.head_commit = Some(key);
        self.discard_merge();
        self.root = Some(self.load_object(Scope::Workspace, objectroot.key, false)?);

        info!(
            commit = %key.short_hex(),
            root = %objectroot.key.short_hex(),
            branch = %branch_key,
            "committed"
        );
        Ok(key)
    }

    /// Hash every modified object reachable from `root`, depth first.
    ///
    /// On failure the workspace is restored to its state before the call.
    pub(crate) fn hash_tree(&mut self, root: NodeId) -> RepositoryResult<ObjectRoot> {
        let checkpoint = (
            self.nodes.clone(),
            self.workspace.clone(),
            self.next_local,
            self.root,
        );
        let mut visiting = HashSet::new();
        match self.recurse_commit(root, &mut visiting) {
            Ok(objectroot) => Ok(objectroot),
            Err(err) => {
                warn!(error = %err, "hashing failed; workspace restored");
                (self.nodes, self.workspace, self.next_local, self.root) = checkpoint;
                Err(err)
            }
        }
    }

    fn recurse_commit(
        &mut self,
        id: NodeId,
        visiting: &mut HashSet<NodeId>,
    ) -> RepositoryResult<ObjectRoot> {
        let (key, modified, scope, object_type, isleaf) = {
            let node = self.nodes.get(&id).ok_or(RepositoryError::InvalidObject)?;
            (
                node.key,
                node.modified,
                node.scope,
                node.message.object_type(),
                node.message.is_leaf(),
            )
        };
        if !modified {
            if let LinkKey::Hash(hash) = key {
                return Ok(ObjectRoot {
                    key: hash,
                    object_type,
                    isleaf,
                });
            }
        }
        if !visiting.insert(id) {
            return Err(RepositoryError::CycleDetected);
        }

        let paths: Vec<FieldPath> = match self.nodes.get(&id) {
            Some(node) => node.message.links().into_iter().map(|(p, _)| p).collect(),
            None => Vec::new(),
        };
        for path in paths {
            // Re-read: committing an earlier child may already have rewritten it.
            let current: Option<Link> = self
                .nodes
                .get(&id)
                .and_then(|n| n.message.value_at(&path))
                .and_then(Value::as_link)
                .copied();
            let Some(link) = current.filter(|l| l.key.is_local()) else {
                continue;
            };
            let child = *self.workspace.get(&(scope, link.key)).ok_or_else(|| {
                RepositoryError::InvalidState(format!("dangling workspace link {}", link.key))
            })?;
            let child_root = self.recurse_commit(child, visiting)?;
            if let Some(slot) = self
                .nodes
                .get_mut(&id)
                .and_then(|n| n.message.value_at_mut(&path))
                .and_then(Value::as_link_mut)
            {
                if slot.key == link.key {
                    slot.key = LinkKey::Hash(child_root.key);
                    slot.isleaf = child_root.isleaf;
                }
            }
        }
        visiting.remove(&id);

        let element = {
            let node = self.nodes.get(&id).ok_or(RepositoryError::InvalidObject)?;
            let bytes = node.message.to_bytes()?;
            StructureElement::new(object_type, bytes, node.message.is_leaf())
                .with_child_links(node.message.child_keys())
        };
        let isleaf = element.isleaf;
        let hash = self.index.put(element)?;

        let duplicate = self
            .workspace
            .get(&(scope, LinkKey::Hash(hash)))
            .copied()
            .filter(|other| *other != id);
        if let Some(node) = self.nodes.get_mut(&id) {
            node.modified = false;
        }
        self.rekey(id, LinkKey::Hash(hash), Some(isleaf));
        if let Some(other) = duplicate {
            // Identical content collapses to one element; the next access
            // through any link loads a single canonical object.
            self.retire(id);
            self.retire(other);
            debug!(key = %hash.short_hex(), "collapsed duplicate objects");
        } else {
            debug!(key = %hash.short_hex(), %object_type, "hashed object");
        }

        Ok(ObjectRoot {
            key: hash,
            object_type,
            isleaf,
        })
    }
}

impl std::fmt::Debug for Repository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository")
            .field("key", &self.head.repository_key)
            .field("status", &self.status())
            .field("branches", &self.head.branches.len())
            .field("live_objects", &self.nodes.len())
            .field("elements", &self.index.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{label, node, registry, tree_repo, TREE};
    use ion_schema::RecordMut;
    use proptest::prelude::*;

    fn root_key(repo: &mut Repository, commit: ObjectKey) -> ObjectKey {
        repo.load_commit(commit).unwrap().objectroot.key
    }

    // -----------------------------------------------------------------------
    // Status
    // -----------------------------------------------------------------------

    #[test]
    fn status_follows_root_lifecycle() {
        let mut repo = Repository::new(registry(), None);
        assert_eq!(repo.status(), RepositoryStatus::NotInitialized);
        assert!(matches!(
            repo.commit("nothing"),
            Err(RepositoryError::InvalidState(_))
        ));

        let root = repo.create_object(TREE).unwrap();
        repo.set_root_object(&root).unwrap();
        assert_eq!(repo.status(), RepositoryStatus::Modified);

        repo.commit("first").unwrap();
        assert_eq!(repo.status(), RepositoryStatus::UpToDate);

        repo.set(&root, "label", "edited").unwrap();
        assert_eq!(repo.status(), RepositoryStatus::Modified);
    }

    #[test]
    fn first_commit_records_repository_seed() {
        let (mut repo, _) = tree_repo();
        let first = repo.commit("first").unwrap();
        let second = repo.commit("second").unwrap();
        let first = repo.load_commit(first).unwrap();
        let second = repo.load_commit(second).unwrap();
        assert_eq!(first.root_seed.as_ref(), Some(repo.repository_key()));
        assert!(first.parentrefs.is_empty());
        assert_eq!(second.root_seed, None);
        assert_eq!(second.parentrefs.len(), 1);
    }

    // -----------------------------------------------------------------------
    // Commit hashing
    // -----------------------------------------------------------------------

    #[test]
    fn commit_hashes_children_and_keeps_handles() {
        let (mut repo, root) = tree_repo();
        let child = node(&mut repo, "child");
        repo.set_link(&root, "left", &child).unwrap();
        assert_eq!(repo.object_key(&child).unwrap(), None);

        let commit = repo.commit("c").unwrap();
        let child_key = repo.object_key(&child).unwrap().expect("child hashed");
        assert!(!repo.is_modified(&child).unwrap());
        assert_eq!(label(&repo, &child), "child");

        let root_key = root_key(&mut repo, commit);
        let element = repo.index().element(&root_key).unwrap();
        assert!(element.child_links().contains(&child_key));
        assert!(!element.isleaf);

        let resolved = repo.get_object(&root, "left").unwrap().unwrap();
        assert_eq!(resolved, child);
    }

    #[test]
    fn commit_without_changes_keeps_root_key() {
        let (mut repo, root) = tree_repo();
        repo.set(&root, "label", "same").unwrap();
        let first = repo.commit("one").unwrap();
        assert_eq!(repo.status(), RepositoryStatus::UpToDate);
        let second = repo.commit("two").unwrap();
        assert_eq!(repo.status(), RepositoryStatus::UpToDate);
        assert!(!repo.is_modified(&root).unwrap());
        assert_ne!(first, second);
        assert_eq!(root_key(&mut repo, first), root_key(&mut repo, second));
        assert_eq!(repo.load_commit(second).unwrap().parent(), Some(first));
    }

    #[test]
    fn identical_children_collapse_to_one_element() {
        let (mut repo, root) = tree_repo();
        let a = node(&mut repo, "same");
        let b = node(&mut repo, "same");
        repo.set_link(&root, "left", &a).unwrap();
        repo.set_link(&root, "right", &b).unwrap();
        let commit = repo.commit("dedup").unwrap();

        assert!(repo.is_invalid(&a));
        assert!(repo.is_invalid(&b));
        let root_key = root_key(&mut repo, commit);
        assert_eq!(repo.index().element(&root_key).unwrap().child_links().len(), 1);

        let left = repo.get_object(&root, "left").unwrap().unwrap();
        let right = repo.get_object(&root, "right").unwrap().unwrap();
        assert_eq!(left, right);
        assert_eq!(label(&repo, &left), "same");
    }

    #[test]
    fn edits_propagate_to_loaded_parents() {
        let (mut repo, root) = tree_repo();
        let mid = node(&mut repo, "mid");
        let leaf = node(&mut repo, "leaf");
        repo.set_link(&mid, "left", &leaf).unwrap();
        repo.set_link(&root, "left", &mid).unwrap();
        let first = repo.commit("one").unwrap();

        repo.set(&leaf, "label", "changed").unwrap();
        assert!(repo.is_modified(&mid).unwrap());
        assert!(repo.is_modified(&root).unwrap());
        assert_eq!(repo.status(), RepositoryStatus::Modified);

        let second = repo.commit("two").unwrap();
        assert_ne!(root_key(&mut repo, first), root_key(&mut repo, second));
        let mid_again = repo.get_object(&root, "left").unwrap().unwrap();
        let leaf_again = repo.get_object(&mid_again, "left").unwrap().unwrap();
        assert_eq!(label(&repo, &leaf_again), "changed");
    }

    #[test]
    fn failed_commit_restores_workspace() {
        let (mut repo, root) = tree_repo();
        let a = node(&mut repo, "a");
        repo.set_link(&root, "left", &a).unwrap();

        // Forge a back-link the public API refuses to create.
        let back = Link {
            key: repo.nodes[&root.node].key,
            object_type: Some(TREE),
            isleaf: false,
        };
        let schema = Arc::clone(repo.registry.get(&TREE).unwrap());
        let message = &mut repo.nodes.get_mut(&a.node).unwrap().message;
        RecordMut::new(&schema, message)
            .set_field("right", Value::Link(back))
            .unwrap();

        let live = repo.live_objects();
        assert_eq!(repo.commit("cycle"), Err(RepositoryError::CycleDetected));
        assert_eq!(repo.status(), RepositoryStatus::Modified);
        assert_eq!(repo.live_objects(), live);
        assert!(repo.is_modified(&a).unwrap());
        assert_eq!(repo.commit_head(), None);
    }

    #[test]
    fn excluded_types_are_not_loaded() {
        let (mut repo, root) = tree_repo();
        let child = node(&mut repo, "child");
        repo.set_link(&root, "left", &child).unwrap();
        repo.commit("c").unwrap();
        repo.invalidate_workspace();
        let head = repo.commit_head().unwrap();
        let root_key = root_key(&mut repo, head);
        let root = repo.load_object(Scope::Workspace, root_key, false).unwrap();
        let root = ObjectHandle::root_of(repo.id, root);

        repo.set_excluded_types([TREE].into_iter().collect());
        assert_eq!(
            repo.get_object(&root, "left"),
            Err(RepositoryError::ExcludedType(TREE))
        );
    }

    proptest! {
        #[test]
        fn equal_trees_hash_equal(labels in proptest::collection::vec("[a-z]{0,6}", 1..6)) {
            let build = |labels: &[String]| {
                let (mut repo, root) = tree_repo();
                for l in labels {
                    let item = node(&mut repo, l);
                    repo.push_link(&root, "items", &item).unwrap();
                }
                let commit = repo.commit("c").unwrap();
                root_key(&mut repo, commit)
            };
            prop_assert_eq!(build(&labels), build(&labels));

            let mut changed = labels.clone();
            changed[0].push('!');
            prop_assert_ne!(build(&labels), build(&changed));
        }
    }
}
