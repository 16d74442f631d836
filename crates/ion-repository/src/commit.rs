//! Native history records: commits, branches and the mutable head.
//!
//! These are fixed structures of the repository itself, so they are plain
//! serde types rather than schema-driven messages. Each still travels as a
//! [`StructureElement`] with a well-known type id.

use chrono::{DateTime, Utc};
use ion_store::StructureElement;
use ion_types::well_known::{COMMIT, MUTABLE_HEAD};
use ion_types::{BranchKey, ObjectKey, ObjectType, RepositoryKey};
use serde::{Deserialize, Serialize};

use crate::error::{RepositoryError, RepositoryResult};

/// How a commit relates to one of its predecessors.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Relationship {
    /// Linear predecessor on the same branch.
    Parent,
    /// A diverged state folded in by a merge.
    MergedFrom,
}

impl std::fmt::Display for Relationship {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Parent => write!(f, "PARENT"),
            Self::MergedFrom => write!(f, "MERGEDFROM"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParentRef {
    pub relationship: Relationship,
    pub commit: ObjectKey,
}

impl ParentRef {
    pub fn parent(commit: ObjectKey) -> Self {
        Self {
            relationship: Relationship::Parent,
            commit,
        }
    }

    pub fn merged_from(commit: ObjectKey) -> Self {
        Self {
            relationship: Relationship::MergedFrom,
            commit,
        }
    }
}

/// Link from a commit to the root object of the committed tree.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectRoot {
    pub key: ObjectKey,
    pub object_type: ObjectType,
    pub isleaf: bool,
}

/// An immutable snapshot of a repository's object tree.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    pub date: DateTime<Utc>,
    pub comment: String,
    pub parentrefs: Vec<ParentRef>,
    pub objectroot: ObjectRoot,
    /// Repository key, recorded only on a repository's first commit.
    pub root_seed: Option<RepositoryKey>,
}

impl Commit {
    /// The first linear predecessor, if any.
    pub fn parent(&self) -> Option<ObjectKey> {
        self.parentrefs
            .iter()
            .find(|p| p.relationship == Relationship::Parent)
            .map(|p| p.commit)
    }

    /// Every predecessor regardless of relationship, in recorded order.
    pub fn parent_keys(&self) -> impl Iterator<Item = ObjectKey> + '_ {
        self.parentrefs.iter().map(|p| p.commit)
    }

    pub fn merged_from(&self) -> Vec<ObjectKey> {
        self.parentrefs
            .iter()
            .filter(|p| p.relationship == Relationship::MergedFrom)
            .map(|p| p.commit)
            .collect()
    }

    /// Keys this commit's element links to: the object root and every parent.
    pub fn child_keys(&self) -> Vec<ObjectKey> {
        std::iter::once(self.objectroot.key)
            .chain(self.parent_keys())
            .collect()
    }

    pub fn to_element(&self) -> RepositoryResult<StructureElement> {
        let bytes = bincode::serialize(self)?;
        Ok(StructureElement::new(COMMIT, bytes, false).with_child_links(self.child_keys()))
    }

    pub fn from_element(element: &StructureElement) -> RepositoryResult<Self> {
        expect_type(element, COMMIT)?;
        Ok(bincode::deserialize(&element.value)?)
    }

    /// One-line description for logs and the CLI.
    pub fn summary(&self) -> String {
        format!(
            "{} {} ({} parent{})",
            self.date.format("%Y-%m-%d %H:%M:%S"),
            self.comment,
            self.parentrefs.len(),
            if self.parentrefs.len() == 1 { "" } else { "s" }
        )
    }
}

/// A branch: stable key plus the commit refs it points at.
///
/// A healthy branch holds exactly one ref. More than one means the branch
/// diverged and awaits a merge.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Branch {
    pub branchkey: BranchKey,
    pub commitrefs: Vec<ObjectKey>,
}

impl Branch {
    pub fn new(branchkey: BranchKey) -> Self {
        Self {
            branchkey,
            commitrefs: Vec::new(),
        }
    }

    pub fn is_diverged(&self) -> bool {
        self.commitrefs.len() > 1
    }

    /// The single head commit, if the branch is neither empty nor diverged.
    pub fn head(&self) -> Option<ObjectKey> {
        match self.commitrefs.as_slice() {
            [only] => Some(*only),
            _ => None,
        }
    }

    /// Remove repeated refs, keeping first occurrences in order.
    /// Returns the number removed.
    pub fn prune_duplicates(&mut self) -> usize {
        let before = self.commitrefs.len();
        let mut seen = std::collections::HashSet::new();
        self.commitrefs.retain(|k| seen.insert(*k));
        before - self.commitrefs.len()
    }
}

/// Shared, mutable repository metadata: identity plus branch table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutableHead {
    pub repository_key: RepositoryKey,
    pub branches: Vec<Branch>,
}

impl MutableHead {
    pub fn new(repository_key: RepositoryKey) -> Self {
        Self {
            repository_key,
            branches: Vec::new(),
        }
    }

    pub fn branch(&self, key: &BranchKey) -> Option<&Branch> {
        self.branches.iter().find(|b| &b.branchkey == key)
    }

    pub fn branch_mut(&mut self, key: &BranchKey) -> Option<&mut Branch> {
        self.branches.iter_mut().find(|b| &b.branchkey == key)
    }

    pub fn remove_branch(&mut self, key: &BranchKey) -> Option<Branch> {
        let pos = self.branches.iter().position(|b| &b.branchkey == key)?;
        Some(self.branches.remove(pos))
    }

    /// Every commit ref on every branch, de-duplicated, in branch order.
    pub fn all_commitrefs(&self) -> Vec<ObjectKey> {
        let mut seen = std::collections::HashSet::new();
        self.branches
            .iter()
            .flat_map(|b| b.commitrefs.iter().copied())
            .filter(|k| seen.insert(*k))
            .collect()
    }

    pub fn to_element(&self) -> RepositoryResult<StructureElement> {
        let bytes = bincode::serialize(self)?;
        Ok(StructureElement::new(MUTABLE_HEAD, bytes, false)
            .with_child_links(self.all_commitrefs()))
    }

    pub fn from_element(element: &StructureElement) -> RepositoryResult<Self> {
        expect_type(element, MUTABLE_HEAD)?;
        Ok(bincode::deserialize(&element.value)?)
    }
}

fn expect_type(element: &StructureElement, expected: ObjectType) -> RepositoryResult<()> {
    if element.object_type != expected {
        return Err(RepositoryError::TypeMismatch {
            expected: expected.to_string(),
            found: element.object_type.to_string(),
        });
    }
    Ok(())
}
