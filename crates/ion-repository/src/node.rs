use std::collections::HashSet;

use ion_schema::{FieldPath, LinkKey, Message, PathStep};

/// Arena index of a live object. Ids are never reused within a repository.
pub type NodeId = u64;

/// Which object graph a live node belongs to.
///
/// Merge sources are loaded read-only beside the workspace so that content
/// they share with the workspace by hash never aliases a mutable node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) enum Scope {
    Workspace,
    Merge,
}

/// A place where one node links to another: the owning node and the path
/// of the link value inside the owner's message.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub(crate) struct LinkSite {
    pub owner: NodeId,
    pub path: FieldPath,
}

/// One live structured object.
#[derive(Clone, Debug)]
pub(crate) struct Node {
    pub message: Message,
    /// `Local` while modified, `Hash` once committed or loaded.
    pub key: LinkKey,
    pub scope: Scope,
    pub modified: bool,
    pub read_only: bool,
    /// Bumped whenever embedded content is cleared or replaced; handles to
    /// embedded messages from an older generation are invalid.
    pub generation: u64,
    /// Links known to point at this node. Registered when a link is assigned
    /// or resolved; sites whose link no longer matches are dropped lazily.
    pub parents: HashSet<LinkSite>,
}

impl Node {
    pub fn new(message: Message, key: LinkKey, scope: Scope, modified: bool, read_only: bool) -> Self {
        Self {
            message,
            key,
            scope,
            modified,
            read_only,
            generation: 0,
            parents: HashSet::new(),
        }
    }
}

/// Reference to a structured object held by a [`Repository`](crate::Repository).
///
/// Handles are plain values: two handles are equal exactly when they name
/// the same live object, so equality is object identity. A handle becomes
/// invalid when its object is dropped from the workspace (checkout, reset,
/// commit de-duplication) or, for an embedded sub-object, when the content
/// it was taken from is cleared.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ObjectHandle {
    pub(crate) repo: u64,
    pub(crate) node: NodeId,
    pub(crate) path: FieldPath,
    pub(crate) generation: u64,
}

impl ObjectHandle {
    pub(crate) fn root_of(repo: u64, node: NodeId) -> Self {
        Self {
            repo,
            node,
            path: Vec::new(),
            generation: 0,
        }
    }

    pub(crate) fn child(&self, step: PathStep, generation: u64) -> Self {
        let mut path = self.path.clone();
        path.push(step);
        Self {
            repo: self.repo,
            node: self.node,
            path,
            generation,
        }
    }

    /// Returns `true` for a whole object, `false` for an embedded sub-object.
    pub fn is_root(&self) -> bool {
        self.path.is_empty()
    }
}

/// Lifecycle state of a repository's workspace.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RepositoryStatus {
    NotInitialized,
    UpToDate,
    Modified,
    Invalid,
}

impl std::fmt::Display for RepositoryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotInitialized => write!(f, "NOTINITIALIZED"),
            Self::UpToDate => write!(f, "UPTODATE"),
            Self::Modified => write!(f, "MODIFIED"),
            Self::Invalid => write!(f, "INVALID"),
        }
    }
}
