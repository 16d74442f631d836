//! Branches, checkout, merge and commit ancestry.

use std::collections::{HashSet, VecDeque};

use chrono::{DateTime, Utc};
use ion_types::{BranchKey, ObjectKey, ObjectType};
use tracing::{debug, info, warn};

use crate::commit::{Branch, Commit, ParentRef};
use crate::error::{RepositoryError, RepositoryResult};
use crate::node::{ObjectHandle, RepositoryStatus, Scope};
use crate::repository::{PendingMerge, Repository};

/// How [`Repository::checkout`] picks the commit to load.
#[derive(Clone, Debug)]
pub struct CheckoutOptions {
    /// Load this commit from the branch's history. Leaves the head detached.
    pub commit_id: Option<ObjectKey>,
    /// Load the newest commit dated strictly before this instant. Leaves the
    /// head detached.
    pub older_than: Option<DateTime<Utc>>,
    /// Object types never loaded into the workspace.
    pub excluded_types: Option<HashSet<ObjectType>>,
    /// Merge a diverged branch by date instead of loading its heads as merge
    /// sources.
    pub auto_merge: bool,
}

impl Default for CheckoutOptions {
    fn default() -> Self {
        Self {
            commit_id: None,
            older_than: None,
            excluded_types: None,
            auto_merge: true,
        }
    }
}

impl CheckoutOptions {
    pub fn at_commit(commit: ObjectKey) -> Self {
        Self {
            commit_id: Some(commit),
            ..Self::default()
        }
    }

    pub fn older_than(date: DateTime<Utc>) -> Self {
        Self {
            older_than: Some(date),
            ..Self::default()
        }
    }

    pub fn without_auto_merge() -> Self {
        Self {
            auto_merge: false,
            ..Self::default()
        }
    }
}

/// What [`Repository::merge_with`] loads as a merge source.
#[derive(Clone, Copy, Debug)]
pub enum MergeTarget<'a> {
    /// Every head of the named branch.
    Branch(&'a str),
    /// One specific commit.
    Commit(ObjectKey),
}

/// A merge-by-date commit that has been built but not yet stored.
struct MergePlan {
    /// Set when the branch already has a single head and nothing is merged.
    existing: Option<ObjectKey>,
    commit: Commit,
    kept: ObjectKey,
    discarded: Vec<ObjectKey>,
    lossless: bool,
}

impl Repository {
    // -----------------------------------------------------------------------
    // Branches
    // -----------------------------------------------------------------------

    /// Look a branch up by nickname or by branch key.
    pub fn resolve_branch(&self, name: &str) -> RepositoryResult<BranchKey> {
        if let Some(key) = self.nicknames.get(name) {
            return Ok(key.clone());
        }
        match BranchKey::parse(name) {
            Ok(key) if self.head.branch(&key).is_some() => Ok(key),
            _ => Err(RepositoryError::UnknownBranch(name.to_string())),
        }
    }

    /// Branch keys with their local nicknames, in branch-table order.
    pub fn branch_names(&self) -> Vec<(BranchKey, Option<String>)> {
        self.head
            .branches
            .iter()
            .map(|b| {
                let nickname = self
                    .nicknames
                    .iter()
                    .find(|(_, k)| **k == b.branchkey)
                    .map(|(n, _)| n.clone());
                (b.branchkey.clone(), nickname)
            })
            .collect()
    }

    /// Give a branch a local nickname.
    pub fn set_nickname(&mut self, nickname: &str, key: &BranchKey) -> RepositoryResult<()> {
        if self.head.branch(key).is_none() {
            return Err(RepositoryError::UnknownBranch(key.to_string()));
        }
        self.nicknames.insert(nickname.to_string(), key.clone());
        Ok(())
    }

    /// Start a new branch at the current commit and make it current.
    ///
    /// From a detached head this is how the workspace becomes writable again.
    pub fn branch(&mut self, nickname: Option<&str>) -> RepositoryResult<BranchKey> {
        let head = self.head_commit.ok_or_else(|| {
            RepositoryError::EmptyBranch(
                self.current_branch
                    .as_ref()
                    .map(ToString::to_string)
                    .unwrap_or_default(),
            )
        })?;
        if let Some(nickname) = nickname {
            if self.nicknames.contains_key(nickname) {
                return Err(RepositoryError::InvalidState(format!(
                    "branch nickname {nickname} is already in use"
                )));
            }
        }
        let key = BranchKey::generate();
        let mut branch = Branch::new(key.clone());
        branch.commitrefs.push(head);
        self.head.branches.push(branch);
        if let Some(nickname) = nickname {
            self.nicknames.insert(nickname.to_string(), key.clone());
        }
        self.current_branch = Some(key.clone());
        if self.detached {
            self.detached = false;
            for node in self.nodes.values_mut() {
                if node.scope == Scope::Workspace {
                    node.read_only = false;
                }
            }
        }
        info!(
            branch = %key,
            nickname = nickname.unwrap_or(""),
            at = %head.short_hex(),
            "created branch"
        );
        Ok(key)
    }

    /// Remove a branch that is not checked out.
    pub fn remove_branch(&mut self, name: &str) -> RepositoryResult<Branch> {
        let key = self.resolve_branch(name)?;
        if self.current_branch.as_ref() == Some(&key) {
            return Err(RepositoryError::InvalidState(format!(
                "cannot remove checked-out branch {name}"
            )));
        }
        let branch = self
            .head
            .remove_branch(&key)
            .ok_or_else(|| RepositoryError::UnknownBranch(name.to_string()))?;
        self.nicknames.retain(|_, k| *k != key);
        info!(branch = %key, "removed branch");
        Ok(branch)
    }

    /// Remove repeated commit refs from every branch. Returns how many went.
    pub fn prune_duplicate_commitrefs(&mut self) -> usize {
        let pruned: usize = self
            .head
            .branches
            .iter_mut()
            .map(Branch::prune_duplicates)
            .sum();
        if pruned > 0 {
            warn!(pruned, "pruned duplicate commit refs");
        }
        pruned
    }

    fn branch_refs(&self, key: &BranchKey, name: &str) -> RepositoryResult<Vec<ObjectKey>> {
        let refs = self
            .head
            .branch(key)
            .map(|b| b.commitrefs.clone())
            .ok_or_else(|| RepositoryError::UnknownBranch(name.to_string()))?;
        if refs.is_empty() {
            return Err(RepositoryError::EmptyBranch(name.to_string()));
        }
        Ok(refs)
    }

    // -----------------------------------------------------------------------
    // Checkout
    // -----------------------------------------------------------------------

    /// Load a commit of `branch_name` into the workspace and return its root.
    ///
    /// Every live object is dropped, so all outstanding handles become
    /// invalid. The target's root content is verified to be available before
    /// anything is dropped; on failure the previous workspace stays intact.
    pub fn checkout(
        &mut self,
        branch_name: &str,
        mut options: CheckoutOptions,
    ) -> RepositoryResult<ObjectHandle> {
        if options.commit_id.is_some() && options.older_than.is_some() {
            return Err(RepositoryError::ConflictingSelectors);
        }
        let previous = options
            .excluded_types
            .take()
            .map(|types| std::mem::replace(&mut self.excluded_types, types));
        let result = self.checkout_selected(branch_name, options);
        if let (Err(_), Some(previous)) = (&result, previous) {
            self.excluded_types = previous;
        }
        result
    }

    fn checkout_selected(
        &mut self,
        branch_name: &str,
        options: CheckoutOptions,
    ) -> RepositoryResult<ObjectHandle> {
        let branch_key = self.resolve_branch(branch_name)?;
        let refs = self.branch_refs(&branch_key, branch_name)?;

        let (target, detached, merge_sources) = if let Some(commit_id) = options.commit_id {
            let found = self.walk_history(&refs, |key, _| key == commit_id)?;
            let target = found.ok_or_else(|| RepositoryError::CommitNotFound(commit_id.to_hex()))?;
            (target, true, Vec::new())
        } else if let Some(cutoff) = options.older_than {
            let target = self
                .newest_before(&refs, cutoff)?
                .ok_or_else(|| RepositoryError::CommitNotFound(format!("older than {cutoff}")))?;
            (target, true, Vec::new())
        } else if let [only] = refs.as_slice() {
            (*only, false, Vec::new())
        } else if options.auto_merge {
            let plan = self.plan_merge_by_date(&branch_key)?;
            self.require_root(&plan.commit)?;
            (self.apply_merge(&branch_key, plan)?, false, Vec::new())
        } else {
            let mut ordered = self.order_by_date(&refs)?;
            let (newest, _) = ordered
                .pop()
                .ok_or_else(|| RepositoryError::EmptyBranch(branch_name.to_string()))?;
            let others = ordered.into_iter().map(|(key, _)| key).collect();
            (newest, false, others)
        };

        let root = self.materialize_commit(target, detached, &merge_sources)?;
        self.current_branch = Some(branch_key.clone());
        info!(
            branch = %branch_key,
            commit = %target.short_hex(),
            detached,
            merge_sources = merge_sources.len(),
            "checked out"
        );
        Ok(root)
    }

    /// Drop the workspace and reload the current commit, keeping any merge
    /// sources that were loaded.
    pub fn reset(&mut self) -> RepositoryResult<ObjectHandle> {
        let head = self
            .head_commit
            .ok_or_else(|| RepositoryError::InvalidState("nothing committed to reset to".into()))?;
        let merge: Vec<ObjectKey> = self.merge.iter().map(|m| m.commit).collect();
        let detached = self.detached;
        let root = self.materialize_commit(head, detached, &merge)?;
        info!(commit = %head.short_hex(), "reset workspace");
        Ok(root)
    }

    fn materialize_commit(
        &mut self,
        commit_key: ObjectKey,
        detached: bool,
        merge_sources: &[ObjectKey],
    ) -> RepositoryResult<ObjectHandle> {
        let commit = self.load_commit(commit_key)?;
        self.require_root(&commit)?;
        let mut merges = Vec::with_capacity(merge_sources.len());
        for key in merge_sources {
            let merge_commit = self.load_commit(*key)?;
            self.require_root(&merge_commit)?;
            merges.push((*key, merge_commit.objectroot.key));
        }

        self.invalidate_workspace();
        let root = self.load_object(Scope::Workspace, commit.objectroot.key, detached)?;
        self.root = Some(root);
        self.head_commit = Some(commit_key);
        self.detached = detached;
        for (commit, root_key) in merges {
            let root = self.load_object(Scope::Merge, root_key, true)?;
            self.merge.push(PendingMerge { commit, root });
        }
        Ok(ObjectHandle::root_of(self.id, root))
    }

    fn require_root(&self, commit: &Commit) -> RepositoryResult<()> {
        let root = commit.objectroot;
        if self.excluded_types.contains(&root.object_type) {
            return Err(RepositoryError::ExcludedType(root.object_type));
        }
        if !self.index.contains(&root.key) {
            return Err(RepositoryError::NotFound(root.key));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Merge
    // -----------------------------------------------------------------------

    /// Resolve a diverged branch by keeping its newest head.
    ///
    /// The head with the greatest date (ties broken by key) becomes the
    /// parent of a new merge commit with the same object root; the other
    /// heads are recorded as merged-from. Content that differs in the
    /// discarded heads is lost, which is logged as a warning.
    pub fn merge_by_date(&mut self, branch: &BranchKey) -> RepositoryResult<ObjectKey> {
        let plan = self.plan_merge_by_date(branch)?;
        self.apply_merge(branch, plan)
    }

    /// Build the merge commit for a branch without writing anything. A
    /// branch with a single head plans no commit.
    fn plan_merge_by_date(&mut self, branch: &BranchKey) -> RepositoryResult<MergePlan> {
        let name = branch.to_string();
        let refs = self.branch_refs(branch, &name)?;
        if let [only] = refs.as_slice() {
            let commit = self.load_commit(*only)?;
            return Ok(MergePlan {
                existing: Some(*only),
                commit,
                kept: *only,
                discarded: Vec::new(),
                lossless: true,
            });
        }
        let ordered = self.order_by_date(&refs)?;
        let Some((newest_key, newest)) = ordered.last().cloned() else {
            return Err(RepositoryError::EmptyBranch(name));
        };
        let discarded: Vec<ObjectKey> = ordered
            .iter()
            .map(|(key, _)| *key)
            .filter(|key| *key != newest_key)
            .collect();
        let lossless = ordered
            .iter()
            .all(|(_, c)| c.objectroot.key == newest.objectroot.key);

        let mut parentrefs = vec![ParentRef::parent(newest_key)];
        parentrefs.extend(discarded.iter().copied().map(ParentRef::merged_from));
        let commit = Commit {
            date: Utc::now().max(newest.date),
            comment: format!("Merged {} diverged heads by date", ordered.len()),
            parentrefs,
            objectroot: newest.objectroot,
            root_seed: None,
        };
        Ok(MergePlan {
            existing: None,
            commit,
            kept: newest_key,
            discarded,
            lossless,
        })
    }

    /// Store a planned merge commit and make it the branch's only head.
    fn apply_merge(&mut self, branch: &BranchKey, plan: MergePlan) -> RepositoryResult<ObjectKey> {
        if let Some(existing) = plan.existing {
            return Ok(existing);
        }
        let key = self.index.put(plan.commit.to_element()?)?;
        self.commits.insert(key, plan.commit);
        if let Some(b) = self.head.branch_mut(branch) {
            b.commitrefs = vec![key];
        }

        let heads = plan.discarded.len() + 1;
        if plan.lossless {
            info!(
                branch = %branch,
                kept = %plan.kept.short_hex(),
                heads,
                "merged diverged branch"
            );
        } else {
            let discarded: Vec<String> = plan.discarded.iter().map(ObjectKey::short_hex).collect();
            warn!(
                branch = %branch,
                kept = %plan.kept.short_hex(),
                ?discarded,
                "merge by date discarded diverged content"
            );
        }
        Ok(key)
    }

    /// Load other states read-only beside the workspace. The next commit
    /// records them as merged-from.
    pub fn merge_with(&mut self, target: MergeTarget<'_>) -> RepositoryResult<Vec<ObjectHandle>> {
        match self.status() {
            RepositoryStatus::UpToDate => {}
            RepositoryStatus::Modified => return Err(RepositoryError::DirtyWorkspace),
            status => {
                return Err(RepositoryError::InvalidState(format!(
                    "cannot merge in state {status}"
                )))
            }
        }
        if self.detached {
            return Err(RepositoryError::DetachedHead);
        }
        let keys = match target {
            MergeTarget::Branch(name) => {
                let key = self.resolve_branch(name)?;
                self.branch_refs(&key, name)?
            }
            MergeTarget::Commit(key) => vec![key],
        };
        let loaded: HashSet<ObjectKey> = self.merge.iter().map(|m| m.commit).collect();
        let mut sources = Vec::new();
        for key in keys {
            if Some(key) == self.head_commit || loaded.contains(&key) {
                continue;
            }
            let commit = self.load_commit(key)?;
            self.require_root(&commit)?;
            sources.push((key, commit.objectroot.key));
        }

        let mut handles = Vec::with_capacity(sources.len());
        for (commit, root_key) in sources {
            let root = self.load_object(Scope::Merge, root_key, true)?;
            self.merge.push(PendingMerge { commit, root });
            handles.push(ObjectHandle::root_of(self.id, root));
        }
        info!(sources = handles.len(), "loaded merge sources");
        Ok(handles)
    }

    /// Root handles of the loaded merge sources.
    pub fn merge_roots(&self) -> Vec<ObjectHandle> {
        self.merge
            .iter()
            .map(|m| ObjectHandle::root_of(self.id, m.root))
            .collect()
    }

    /// Drop every loaded merge source.
    pub fn abort_merge(&mut self) {
        let count = self.merge.len();
        self.discard_merge();
        debug!(count, "aborted merge");
    }

    // -----------------------------------------------------------------------
    // Ancestry
    // -----------------------------------------------------------------------

    /// Commits `refs` paired with their records, oldest first. Ties on date
    /// are broken by key so the order is total.
    fn order_by_date(
        &mut self,
        refs: &[ObjectKey],
    ) -> RepositoryResult<Vec<(ObjectKey, Commit)>> {
        let mut ordered = Vec::with_capacity(refs.len());
        for key in refs {
            ordered.push((*key, self.load_commit(*key)?));
        }
        ordered.sort_by(|(ka, a), (kb, b)| a.date.cmp(&b.date).then(ka.cmp(kb)));
        ordered.dedup_by_key(|(key, _)| *key);
        Ok(ordered)
    }

    /// Breadth-first walk of the history behind `start`, stopping at the
    /// first commit `found` accepts.
    fn walk_history(
        &mut self,
        start: &[ObjectKey],
        mut found: impl FnMut(ObjectKey, &Commit) -> bool,
    ) -> RepositoryResult<Option<ObjectKey>> {
        let mut seen: HashSet<ObjectKey> = start.iter().copied().collect();
        let mut queue: VecDeque<ObjectKey> = start.iter().copied().collect();
        while let Some(key) = queue.pop_front() {
            let commit = self.load_commit(key)?;
            if found(key, &commit) {
                return Ok(Some(key));
            }
            for parent in commit.parent_keys() {
                if seen.insert(parent) {
                    queue.push_back(parent);
                }
            }
        }
        Ok(None)
    }

    fn newest_before(
        &mut self,
        start: &[ObjectKey],
        cutoff: DateTime<Utc>,
    ) -> RepositoryResult<Option<ObjectKey>> {
        let mut best: Option<(DateTime<Utc>, ObjectKey)> = None;
        self.walk_history(start, |key, commit| {
            if commit.date < cutoff && best.map_or(true, |b| (commit.date, key) > b) {
                best = Some((commit.date, key));
            }
            false
        })?;
        Ok(best.map(|(_, key)| key))
    }

    /// Returns `true` if `ancestor` is `descendant` or lies in its history.
    pub fn is_ancestor(
        &mut self,
        ancestor: ObjectKey,
        descendant: ObjectKey,
    ) -> RepositoryResult<bool> {
        Ok(self
            .walk_history(&[descendant], |key, _| key == ancestor)?
            .is_some())
    }

    /// The nearest commit (breadth-first from the first ref) that every ref
    /// descends from.
    pub fn get_common_ancestor(&mut self, refs: &[ObjectKey]) -> RepositoryResult<ObjectKey> {
        let (first, rest) = refs
            .split_first()
            .ok_or_else(|| RepositoryError::InvalidState("no commits to compare".into()))?;
        let mut seen: HashSet<ObjectKey> = HashSet::from([*first]);
        let mut queue: VecDeque<ObjectKey> = VecDeque::from([*first]);
        while let Some(candidate) = queue.pop_front() {
            let mut shared = true;
            for other in rest {
                if !self.is_ancestor(candidate, *other)? {
                    shared = false;
                    break;
                }
            }
            if shared {
                return Ok(candidate);
            }
            for parent in self.load_commit(candidate)?.parent_keys() {
                if seen.insert(parent) {
                    queue.push_back(parent);
                }
            }
        }
        Err(RepositoryError::NoCommonAncestor)
    }

    /// Resolve a tree-ish relative to the head of `branch_name`.
    ///
    /// `~N` walks N first parents back; `^N` selects the N-th parent ref of
    /// the current commit (`^0` is the commit itself). A bare `~` or `^`
    /// means 1. Steps chain left to right: `~2^2`.
    pub fn resolve_treeish(
        &mut self,
        treeish: &str,
        branch_name: &str,
    ) -> RepositoryResult<ObjectKey> {
        let key = self.resolve_branch(branch_name)?;
        let refs = self.branch_refs(&key, branch_name)?;
        let mut current = match refs.as_slice() {
            [only] => *only,
            _ => {
                return Err(RepositoryError::InvalidState(format!(
                    "branch {branch_name} has diverged; merge before resolving {treeish}"
                )))
            }
        };

        let mut chars = treeish.chars().peekable();
        while let Some(op) = chars.next() {
            let mut digits = String::new();
            while let Some(d) = chars.peek().copied().filter(char::is_ascii_digit) {
                digits.push(d);
                chars.next();
            }
            let count: usize = if digits.is_empty() {
                1
            } else {
                digits
                    .parse()
                    .map_err(|_| RepositoryError::InvalidTreeish(treeish.to_string()))?
            };
            match op {
                '~' => {
                    for _ in 0..count {
                        let commit = self.load_commit(current)?;
                        current = commit.parent().ok_or(RepositoryError::NoSuchParent {
                            commit: current,
                            index: 1,
                        })?;
                    }
                }
                '^' if count == 0 => {}
                '^' => {
                    let commit = self.load_commit(current)?;
                    current = commit
                        .parentrefs
                        .get(count - 1)
                        .map(|p| p.commit)
                        .ok_or(RepositoryError::NoSuchParent {
                            commit: current,
                            index: count,
                        })?;
                }
                _ => return Err(RepositoryError::InvalidTreeish(treeish.to_string())),
            }
        }
        Ok(current)
    }

    /// Commits of a branch, newest first, following first parents.
    pub fn log(
        &mut self,
        branch_name: &str,
        limit: Option<usize>,
    ) -> RepositoryResult<Vec<(ObjectKey, Commit)>> {
        let key = self.resolve_branch(branch_name)?;
        let refs = self.branch_refs(&key, branch_name)?;
        let start = match self.head_commit {
            Some(head) if self.current_branch.as_ref() == Some(&key) => head,
            _ => refs[0],
        };
        let limit = limit.unwrap_or(usize::MAX);
        let mut entries = Vec::new();
        let mut next = Some(start);
        while let Some(key) = next {
            if entries.len() >= limit {
                break;
            }
            let commit = self.load_commit(key)?;
            next = commit.parent();
            entries.push((key, commit));
        }
        Ok(entries)
    }

    /// Serialized mutable head, for transfer.
    pub fn head_element(&self) -> RepositoryResult<ion_store::StructureElement> {
        self.head.to_element()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commit::ObjectRoot;
    use crate::fixtures::{at, label, tree_repo, PERSON, TREE};
    use chrono::Duration;
    use ion_schema::Value;
    use proptest::prelude::*;

    /// `n` commits on master labelled `v1..vn`, dated one hour apart.
    fn linear(n: usize) -> (Repository, Vec<ObjectKey>) {
        let (mut repo, root) = tree_repo();
        let mut commits = Vec::new();
        for i in 1..=n {
            repo.set(&root, "label", format!("v{i}")).unwrap();
            commits.push(repo.commit_with_date(&format!("c{i}"), at(i as i64)).unwrap());
        }
        (repo, commits)
    }

    /// A base commit with two children: `a` on master, `b` on branch
    /// `side`. Returns `(repo, base, a, b)`; `side` is checked out.
    fn forked(hours_a: i64, hours_b: i64) -> (Repository, ObjectKey, ObjectKey, ObjectKey) {
        let (mut repo, root) = tree_repo();
        repo.set(&root, "label", "base").unwrap();
        let base = repo.commit_with_date("base", at(0)).unwrap();
        repo.set(&root, "label", "a").unwrap();
        let a = repo.commit_with_date("a", at(hours_a)).unwrap();

        repo.checkout("master", CheckoutOptions::at_commit(base)).unwrap();
        repo.branch(Some("side")).unwrap();
        let root = repo.root_object().unwrap();
        repo.set(&root, "label", "b").unwrap();
        let b = repo.commit_with_date("b", at(hours_b)).unwrap();
        (repo, base, a, b)
    }

    fn set_master_refs(repo: &mut Repository, refs: Vec<ObjectKey>) {
        let master = repo.resolve_branch("master").unwrap();
        repo.mutable_head_mut()
            .branch_mut(&master)
            .unwrap()
            .commitrefs = refs;
    }

    // -----------------------------------------------------------------------
    // Checkout
    // -----------------------------------------------------------------------

    #[test]
    fn checkout_by_commit_detaches_until_branching() {
        let (mut repo, commits) = linear(2);
        let root = repo
            .checkout("master", CheckoutOptions::at_commit(commits[0]))
            .unwrap();
        assert_eq!(label(&repo, &root), "v1");
        assert!(repo.is_detached());
        assert!(repo.is_read_only(&root).unwrap());
        assert_eq!(repo.set(&root, "label", "x"), Err(RepositoryError::ReadOnly));
        assert_eq!(repo.commit("detached"), Err(RepositoryError::DetachedHead));

        repo.branch(Some("fix")).unwrap();
        assert!(!repo.is_detached());
        repo.set(&root, "label", "v3").unwrap();
        let fix = repo.commit("fix").unwrap();
        assert_eq!(repo.load_commit(fix).unwrap().parent(), Some(commits[0]));

        let master = repo.checkout("master", CheckoutOptions::default()).unwrap();
        assert_eq!(label(&repo, &master), "v2");
        let fixed = repo.checkout("fix", CheckoutOptions::default()).unwrap();
        assert_eq!(label(&repo, &fixed), "v3");
    }

    #[test]
    fn checkout_invalidates_outstanding_handles() {
        let (mut repo, commits) = linear(2);
        let before = repo.root_object().unwrap();
        let after = repo.checkout("master", CheckoutOptions::default()).unwrap();
        assert!(repo.is_invalid(&before));
        assert_eq!(repo.get(&before, "label"), Err(RepositoryError::InvalidObject));
        assert_ne!(before, after);
        assert_eq!(repo.commit_head(), Some(commits[1]));
    }

    #[test]
    fn checkout_invalidates_sub_object_handles() {
        let mut repo = Repository::create(crate::fixtures::registry(), None, PERSON).unwrap();
        let person = repo.root_object().unwrap();
        repo.set(&person, "name", "David").unwrap();
        let home = repo.get_object(&person, "home").unwrap().unwrap();
        repo.set(&home, "number", "555-0100").unwrap();
        let mobile = repo.push_object(&person, "phone").unwrap();
        repo.set(&mobile, "number", "555-0199").unwrap();
        repo.commit("person").unwrap();

        let reloaded = repo.checkout("master", CheckoutOptions::default()).unwrap();
        for stale in [&person, &home, &mobile] {
            assert!(repo.is_invalid(stale));
        }
        assert_eq!(repo.get(&home, "number"), Err(RepositoryError::InvalidObject));
        assert_eq!(repo.get(&mobile, "number"), Err(RepositoryError::InvalidObject));

        let home = repo.get_object(&reloaded, "home").unwrap().unwrap();
        assert_eq!(repo.get(&home, "number").unwrap(), Value::from("555-0100"));
        let mobile = repo.get_object_at(&reloaded, "phone", 0).unwrap().unwrap();
        assert_eq!(repo.get(&mobile, "number").unwrap(), Value::from("555-0199"));
    }

    #[test]
    fn checkout_by_date_takes_newest_older_commit() {
        let (mut repo, commits) = linear(3);
        let cutoff = at(2) + Duration::minutes(30);
        let root = repo
            .checkout("master", CheckoutOptions::older_than(cutoff))
            .unwrap();
        assert_eq!(label(&repo, &root), "v2");
        assert_eq!(repo.commit_head(), Some(commits[1]));
        assert!(repo.is_detached());

        assert!(matches!(
            repo.checkout("master", CheckoutOptions::older_than(at(1))),
            Err(RepositoryError::CommitNotFound(_))
        ));
    }

    #[test]
    fn checkout_rejects_bad_selectors() {
        let (mut repo, commits) = linear(1);
        let both = CheckoutOptions {
            commit_id: Some(commits[0]),
            older_than: Some(at(9)),
            ..CheckoutOptions::default()
        };
        assert_eq!(
            repo.checkout("master", both),
            Err(RepositoryError::ConflictingSelectors)
        );
        assert_eq!(
            repo.checkout("nope", CheckoutOptions::default()),
            Err(RepositoryError::UnknownBranch("nope".into()))
        );
        let stranger = ObjectKey::from_hash([9; 20]);
        assert_eq!(
            repo.checkout("master", CheckoutOptions::at_commit(stranger)),
            Err(RepositoryError::CommitNotFound(stranger.to_hex()))
        );
    }

    #[test]
    fn empty_branches_cannot_be_checked_out_or_branched() {
        let (mut repo, _) = tree_repo();
        assert_eq!(
            repo.checkout("master", CheckoutOptions::default()),
            Err(RepositoryError::EmptyBranch("master".into()))
        );
        assert!(matches!(
            repo.branch(Some("early")),
            Err(RepositoryError::EmptyBranch(_))
        ));
    }

    /// A commit on top of `parent` whose root content is absent. Returns the
    /// commit and the missing root key.
    fn ghost_commit(repo: &mut Repository, parent: ObjectKey) -> (ObjectKey, ObjectKey) {
        let missing = ObjectKey::from_hash([7; 20]);
        let ghost = Commit {
            date: at(5),
            comment: "ghost".into(),
            parentrefs: vec![ParentRef::parent(parent)],
            objectroot: ObjectRoot {
                key: missing,
                object_type: TREE,
                isleaf: true,
            },
            root_seed: None,
        };
        (repo.index.put(ghost.to_element().unwrap()).unwrap(), missing)
    }

    fn master_refs(repo: &Repository) -> Vec<ObjectKey> {
        let master = repo.resolve_branch("master").unwrap();
        repo.mutable_head().branch(&master).unwrap().commitrefs.clone()
    }

    #[test]
    fn failed_checkout_keeps_the_workspace() {
        let (mut repo, commits) = linear(1);
        let root = repo.root_object().unwrap();
        let (ghost, missing) = ghost_commit(&mut repo, commits[0]);
        set_master_refs(&mut repo, vec![ghost]);

        assert_eq!(
            repo.checkout("master", CheckoutOptions::default()),
            Err(RepositoryError::NotFound(missing))
        );
        assert!(!repo.is_invalid(&root));
        assert_eq!(label(&repo, &root), "v1");
    }

    #[test]
    fn failed_merging_checkout_keeps_the_branch_heads() {
        let (mut repo, commits) = linear(1);
        let root = repo.root_object().unwrap();
        let (ghost, missing) = ghost_commit(&mut repo, commits[0]);
        set_master_refs(&mut repo, vec![commits[0], ghost]);
        let known = repo.known_commits().len();

        assert_eq!(
            repo.checkout("master", CheckoutOptions::default()),
            Err(RepositoryError::NotFound(missing))
        );
        assert_eq!(master_refs(&repo), vec![commits[0], ghost]);
        assert_eq!(repo.known_commits().len(), known);
        assert_eq!(repo.commit_head(), Some(commits[0]));
        assert_eq!(label(&repo, &root), "v1");
    }

    #[test]
    fn failed_checkout_restores_excluded_types() {
        let (mut repo, _) = linear(1);
        let options = CheckoutOptions {
            excluded_types: Some([TREE].into_iter().collect()),
            ..CheckoutOptions::default()
        };
        assert_eq!(
            repo.checkout("master", options),
            Err(RepositoryError::ExcludedType(TREE))
        );
        assert!(repo.excluded_types().is_empty());
    }

    #[test]
    fn reset_discards_uncommitted_edits() {
        let (mut repo, _) = linear(1);
        let root = repo.root_object().unwrap();
        repo.set(&root, "label", "scratch").unwrap();
        let fresh = repo.reset().unwrap();
        assert!(repo.is_invalid(&root));
        assert_eq!(label(&repo, &fresh), "v1");
        assert_eq!(repo.status(), RepositoryStatus::UpToDate);
    }

    // -----------------------------------------------------------------------
    // Merge
    // -----------------------------------------------------------------------

    #[test]
    fn diverged_checkout_merges_by_date() {
        let (mut repo, _, a, b) = forked(1, 2);
        set_master_refs(&mut repo, vec![a, b]);
        let root = repo.checkout("master", CheckoutOptions::default()).unwrap();
        assert_eq!(label(&repo, &root), "b");

        let master = repo.resolve_branch("master").unwrap();
        let refs = &repo.mutable_head().branch(&master).unwrap().commitrefs;
        assert_eq!(refs.len(), 1);
        let merge = repo.load_commit(refs[0]).unwrap();
        assert_eq!(merge.parent(), Some(b));
        assert_eq!(merge.merged_from(), vec![a]);
    }

    #[test]
    fn diverged_checkout_without_auto_merge_loads_merge_sources() {
        let (mut repo, _, a, b) = forked(1, 2);
        set_master_refs(&mut repo, vec![a, b]);
        let root = repo
            .checkout("master", CheckoutOptions::without_auto_merge())
            .unwrap();
        assert_eq!(label(&repo, &root), "b");

        let sources = repo.merge_roots();
        assert_eq!(sources.len(), 1);
        assert_eq!(label(&repo, &sources[0]), "a");
        assert_eq!(
            repo.set(&sources[0], "label", "x"),
            Err(RepositoryError::ReadOnly)
        );

        let merged = repo.commit("resolved").unwrap();
        let commit = repo.load_commit(merged).unwrap();
        assert_eq!(commit.parent(), Some(b));
        assert_eq!(commit.merged_from(), vec![a]);
        assert!(repo.merge_roots().is_empty());
        let master = repo.resolve_branch("master").unwrap();
        assert_eq!(
            repo.mutable_head().branch(&master).unwrap().commitrefs,
            vec![merged]
        );
    }

    #[test]
    fn merge_with_branch_records_merged_from() {
        let (mut repo, _, a, b) = forked(1, 2);
        let root = repo.checkout("master", CheckoutOptions::default()).unwrap();
        assert_eq!(repo.commit_head(), Some(a));

        repo.set(&root, "label", "dirty").unwrap();
        assert_eq!(
            repo.merge_with(MergeTarget::Branch("side")),
            Err(RepositoryError::DirtyWorkspace)
        );
        let root = repo.reset().unwrap();

        let sources = repo.merge_with(MergeTarget::Branch("side")).unwrap();
        assert_eq!(sources.len(), 1);
        assert_eq!(label(&repo, &sources[0]), "b");
        repo.set(&root, "label", "a+b").unwrap();
        let merged = repo.commit("merge side").unwrap();
        let commit = repo.load_commit(merged).unwrap();
        assert_eq!(commit.parent(), Some(a));
        assert_eq!(commit.merged_from(), vec![b]);
    }

    #[test]
    fn abort_merge_drops_sources() {
        let (mut repo, _, _, b) = forked(1, 2);
        repo.checkout("master", CheckoutOptions::default()).unwrap();
        let sources = repo.merge_with(MergeTarget::Commit(b)).unwrap();
        repo.abort_merge();
        assert!(repo.merge_roots().is_empty());
        assert!(repo.is_invalid(&sources[0]));
    }

    proptest! {
        #[test]
        fn merge_by_date_ignores_ref_order(
            hours_a in 1i64..500,
            hours_b in 1i64..500,
            swap in any::<bool>(),
        ) {
            let (mut repo, _, a, b) = forked(hours_a, hours_b);
            let refs = if swap { vec![b, a] } else { vec![a, b] };
            set_master_refs(&mut repo, refs);
            let (newest, older) = if (at(hours_a), a) > (at(hours_b), b) { (a, b) } else { (b, a) };

            let master = repo.resolve_branch("master").unwrap();
            let merged = repo.merge_by_date(&master).unwrap();
            let commit = repo.load_commit(merged).unwrap();
            let kept = repo.load_commit(newest).unwrap();
            prop_assert_eq!(commit.parent(), Some(newest));
            prop_assert_eq!(commit.merged_from(), vec![older]);
            prop_assert_eq!(commit.objectroot, kept.objectroot);
        }
    }

    // -----------------------------------------------------------------------
    // Ancestry
    // -----------------------------------------------------------------------

    #[test]
    fn treeish_walks_parents() {
        let (mut repo, c) = linear(3);
        assert_eq!(repo.resolve_treeish("~1", "master").unwrap(), c[1]);
        assert_eq!(repo.resolve_treeish("~2", "master").unwrap(), c[0]);
        assert_eq!(repo.resolve_treeish("^", "master").unwrap(), c[1]);
        assert_eq!(repo.resolve_treeish("^0", "master").unwrap(), c[2]);
        assert_eq!(repo.resolve_treeish("~1^1", "master").unwrap(), c[0]);
        assert_eq!(repo.resolve_treeish("", "master").unwrap(), c[2]);
        assert!(matches!(
            repo.resolve_treeish("~3", "master"),
            Err(RepositoryError::NoSuchParent { index: 1, .. })
        ));
        assert_eq!(
            repo.resolve_treeish("@{1}", "master"),
            Err(RepositoryError::InvalidTreeish("@{1}".into()))
        );
    }

    #[test]
    fn common_ancestor_of_forked_heads() {
        let (mut repo, base, a, b) = forked(1, 2);
        assert_eq!(repo.get_common_ancestor(&[a, b]).unwrap(), base);
        assert_eq!(repo.get_common_ancestor(&[a]).unwrap(), a);
        assert_eq!(repo.get_common_ancestor(&[base, b]).unwrap(), base);
        assert!(repo.is_ancestor(base, a).unwrap());
        assert!(!repo.is_ancestor(a, b).unwrap());
    }

    #[test]
    fn log_lists_first_parents_newest_first() {
        let (mut repo, c) = linear(3);
        let keys: Vec<ObjectKey> = repo
            .log("master", None)
            .unwrap()
            .into_iter()
            .map(|(k, _)| k)
            .collect();
        assert_eq!(keys, vec![c[2], c[1], c[0]]);
        assert_eq!(repo.log("master", Some(2)).unwrap().len(), 2);
    }

    // -----------------------------------------------------------------------
    // Branch table
    // -----------------------------------------------------------------------

    #[test]
    fn checked_out_branch_cannot_be_removed() {
        let (mut repo, _, _, _) = forked(1, 2);
        assert!(matches!(
            repo.remove_branch("side"),
            Err(RepositoryError::InvalidState(_))
        ));
        repo.checkout("master", CheckoutOptions::default()).unwrap();
        repo.remove_branch("side").unwrap();
        assert_eq!(
            repo.resolve_branch("side"),
            Err(RepositoryError::UnknownBranch("side".into()))
        );
        assert_eq!(repo.branch_names().len(), 1);
    }

    #[test]
    fn duplicate_refs_are_pruned() {
        let (mut repo, c) = linear(2);
        set_master_refs(&mut repo, vec![c[1], c[1], c[0], c[1]]);
        assert_eq!(repo.prune_duplicate_commitrefs(), 2);
        let master = repo.resolve_branch("master").unwrap();
        assert_eq!(
            repo.mutable_head().branch(&master).unwrap().commitrefs,
            vec![c[1], c[0]]
        );
    }
}
