use ion_repository::RepositoryError;
use ion_types::ObjectType;
use ion_workbench::WorkbenchError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AssociationError {
    #[error("association {0} is not indexed")]
    NotIndexed(String),

    #[error("association {0} is dissolved")]
    Dissolved(String),

    #[error("repository root is {0}, not an association")]
    NotAnAssociation(ObjectType),

    #[error("cannot reference repository {repository}: {reason}")]
    Unpinned { repository: String, reason: String },

    #[error("repository error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("workbench error: {0}")]
    Workbench(#[from] WorkbenchError),
}

pub type AssociationResult<T> = Result<T, AssociationError>;
