use ion_protocol::{status, ProtocolError};
use ion_repository::RepositoryError;
use ion_store::StoreError;
use ion_types::TypeError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkbenchError {
    #[error("unknown repository: {0}")]
    UnknownRepository(String),

    #[error("unknown process: {0}")]
    UnknownProcess(String),

    #[error("repository {0} has uncommitted changes")]
    Uncommitted(String),

    #[error("no transport configured")]
    NoTransport,

    #[error("{op} timed out after {secs}s")]
    Timeout { op: &'static str, secs: u64 },

    #[error("remote error: status={status}, message={message}")]
    Remote { status: u32, message: String },

    #[error("malformed transfer: {0}")]
    MalformedTransfer(String),

    #[error("repository error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("protocol error: {0}")]
    Protocol(ProtocolError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("invalid identifier: {0}")]
    Type(#[from] TypeError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ProtocolError> for WorkbenchError {
    fn from(err: ProtocolError) -> Self {
        match err {
            ProtocolError::Remote { status, message } => Self::Remote { status, message },
            other => Self::Protocol(other),
        }
    }
}

impl WorkbenchError {
    /// Content or a repository that is absent, here or at the remote.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::UnknownRepository(_) => true,
            Self::Remote { status: s, .. } => *s == status::NOT_FOUND,
            Self::Repository(e) => e.is_not_found(),
            _ => false,
        }
    }

    /// Response status reported to a remote caller.
    pub fn status_code(&self) -> u32 {
        match self {
            Self::UnknownRepository(_) => status::NOT_FOUND,
            Self::Repository(e) if e.is_not_found() => status::NOT_FOUND,
            Self::Uncommitted(_)
            | Self::Repository(
                RepositoryError::InvalidState(_)
                | RepositoryError::DirtyWorkspace
                | RepositoryError::DetachedHead
                | RepositoryError::NoCommonAncestor,
            ) => status::CONFLICT,
            Self::MalformedTransfer(_) | Self::Protocol(_) | Self::Type(_) => status::BAD_REQUEST,
            _ => status::SERVER_ERROR,
        }
    }
}

pub type WorkbenchResult<T> = Result<T, WorkbenchError>;

#[cfg(test)]
mod tests {
    use super::*;
    use ion_types::ObjectKey;

    #[test]
    fn not_found_maps_to_404() {
        let missing = WorkbenchError::from(RepositoryError::NotFound(ObjectKey::from_hash([1; 20])));
        assert!(missing.is_not_found());
        assert_eq!(missing.status_code(), status::NOT_FOUND);
        assert_eq!(
            WorkbenchError::UnknownRepository("r".into()).status_code(),
            status::NOT_FOUND
        );
    }

    #[test]
    fn remote_errors_keep_their_status() {
        let err = WorkbenchError::from(ProtocolError::Remote {
            status: status::NOT_FOUND,
            message: "gone".into(),
        });
        assert!(matches!(err, WorkbenchError::Remote { status: 404, .. }));
        assert!(err.is_not_found());
    }

    #[test]
    fn state_errors_are_conflicts() {
        assert_eq!(
            WorkbenchError::Uncommitted("r".into()).status_code(),
            status::CONFLICT
        );
        assert_eq!(
            WorkbenchError::from(RepositoryError::DirtyWorkspace).status_code(),
            status::CONFLICT
        );
        assert_eq!(
            WorkbenchError::MalformedTransfer("no head".into()).status_code(),
            status::BAD_REQUEST
        );
    }
}
