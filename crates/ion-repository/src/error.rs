use ion_protocol::ProtocolError;
use ion_schema::SchemaError;
use ion_store::StoreError;
use ion_types::{ObjectKey, ObjectType};
use thiserror::Error;

/// Errors raised by repository and object-handle operations.
///
/// Variants fall into four groups: structural violations (the operation is
/// refused outright), not-found conditions (recoverable by fetching the
/// missing content), state preconditions (the caller must fix local state
/// first), and fatal history ambiguity.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RepositoryError {
    // Structural ------------------------------------------------------------
    #[error("object handle is invalid")]
    InvalidObject,

    #[error("object is read-only")]
    ReadOnly,

    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },

    #[error("link would create a cycle")]
    CycleDetected,

    #[error("link target must be a root object, not a sub-part")]
    NotRootObject,

    #[error("object belongs to a different repository")]
    ForeignObject,

    #[error("field {0} holds a link; assign it with set_link")]
    LinkField(String),

    #[error("object type {0} is excluded from this repository")]
    ExcludedType(ObjectType),

    // Not found -------------------------------------------------------------
    #[error("object {} not found locally", .0.short_hex())]
    NotFound(ObjectKey),

    #[error("unknown branch: {0}")]
    UnknownBranch(String),

    #[error("commit {0} not found in branch history")]
    CommitNotFound(String),

    // State preconditions ---------------------------------------------------
    #[error("invalid repository state: {0}")]
    InvalidState(String),

    #[error("workspace has uncommitted changes")]
    DirtyWorkspace,

    #[error("head is detached; create a branch before making changes")]
    DetachedHead,

    #[error("branch {0} has no commits")]
    EmptyBranch(String),

    #[error("commit_id and older_than are mutually exclusive")]
    ConflictingSelectors,

    // History ---------------------------------------------------------------
    #[error("commits share no common ancestor")]
    NoCommonAncestor,

    #[error("commit {} has no parent #{index}", .commit.short_hex())]
    NoSuchParent { commit: ObjectKey, index: usize },

    #[error("invalid tree-ish: {0}")]
    InvalidTreeish(String),

    // Lower layers ----------------------------------------------------------
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Store(StoreError),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl RepositoryError {
    /// Returns `true` for conditions a caller may recover from by fetching
    /// content from elsewhere.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            RepositoryError::NotFound(_)
                | RepositoryError::UnknownBranch(_)
                | RepositoryError::CommitNotFound(_)
        )
    }

    /// The content key whose absence caused this error, if any.
    pub fn missing_key(&self) -> Option<ObjectKey> {
        match self {
            RepositoryError::NotFound(key) => Some(*key),
            _ => None,
        }
    }
}

impl From<StoreError> for RepositoryError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(key) => RepositoryError::NotFound(key),
            other => RepositoryError::Store(other),
        }
    }
}

impl From<ProtocolError> for RepositoryError {
    fn from(err: ProtocolError) -> Self {
        match err {
            ProtocolError::Store(store) => store.into(),
            other => RepositoryError::Protocol(other.to_string()),
        }
    }
}

impl From<bincode::Error> for RepositoryError {
    fn from(err: bincode::Error) -> Self {
        RepositoryError::Serialization(err.to_string())
    }
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;
