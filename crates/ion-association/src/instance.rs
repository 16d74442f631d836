//! Associations stored as repositories.
//!
//! An association repository's root is an `Association` object with three
//! embedded `IDRef`s. Each reference pins another repository's key, branch
//! and head commit at the time the association was made.

use ion_repository::{ObjectHandle, Repository, RepositoryError, RepositoryResult};
use ion_schema::Value;
use ion_types::well_known::ASSOCIATION;
use ion_types::{ObjectKey, RepositoryKey};
use ion_workbench::Workbench;
use tracing::info;

use crate::error::{AssociationError, AssociationResult};

/// A pinned reference to another repository's state. An empty repository
/// key is the null reference.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct IdRef {
    pub repository_key: String,
    pub branch: String,
    pub commit: String,
}

impl IdRef {
    pub fn null() -> Self {
        Self::default()
    }

    pub fn is_null(&self) -> bool {
        self.repository_key.is_empty()
    }

    /// Reference the current branch head of `repo`.
    pub fn pin(repo: &Repository) -> AssociationResult<Self> {
        let repository = repo.repository_key().to_string();
        let unpinned = |reason: &str| AssociationError::Unpinned {
            repository: repository.clone(),
            reason: reason.to_string(),
        };
        let branch = repo.current_branch().ok_or_else(|| unpinned("no branch checked out"))?;
        let commit = repo.commit_head().ok_or_else(|| unpinned("nothing committed"))?;
        Ok(Self {
            repository_key: repository.clone(),
            branch: branch.to_string(),
            commit: commit.to_hex(),
        })
    }

    /// The pinned commit, if the reference carries a well-formed one.
    pub fn commit_key(&self) -> Option<ObjectKey> {
        ObjectKey::from_hex(&self.commit).ok()
    }

    fn read(repo: &mut Repository, root: &ObjectHandle, field: &str) -> RepositoryResult<Self> {
        let sub = repo
            .get_object(root, field)?
            .ok_or(RepositoryError::InvalidObject)?;
        let text = |value: Value| value.as_str().unwrap_or_default().to_string();
        Ok(Self {
            repository_key: text(repo.get(&sub, "key")?),
            branch: text(repo.get(&sub, "branch")?),
            commit: text(repo.get(&sub, "commit")?),
        })
    }

    fn write(&self, repo: &mut Repository, root: &ObjectHandle, field: &str) -> RepositoryResult<()> {
        let sub = repo
            .get_object(root, field)?
            .ok_or(RepositoryError::InvalidObject)?;
        repo.set(&sub, "key", self.repository_key.as_str())?;
        repo.set(&sub, "branch", self.branch.as_str())?;
        repo.set(&sub, "commit", self.commit.as_str())?;
        Ok(())
    }
}

/// Snapshot of one association repository.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct AssociationInstance {
    pub repository_key: RepositoryKey,
    pub subject: IdRef,
    pub predicate: IdRef,
    pub object: IdRef,
}

impl AssociationInstance {
    /// Make a new association repository in `wb` linking three existing,
    /// committed repositories, and commit it.
    pub fn create(
        wb: &mut Workbench,
        subject: &str,
        predicate: &str,
        object: &str,
    ) -> AssociationResult<Self> {
        let subject = IdRef::pin(wb.repository(subject)?)?;
        let predicate = IdRef::pin(wb.repository(predicate)?)?;
        let object = IdRef::pin(wb.repository(object)?)?;

        let key = wb.create_repository(Some(ASSOCIATION), None)?;
        let repo = wb.repository_mut(key.as_str())?;
        let root = repo.root_object()?;
        subject.write(repo, &root, "subject")?;
        predicate.write(repo, &root, "predicate")?;
        object.write(repo, &root, "object")?;
        repo.commit("association")?;

        info!(
            association = %key.short_id(),
            subject = %subject.repository_key,
            predicate = %predicate.repository_key,
            object = %object.repository_key,
            "created association"
        );
        Ok(Self {
            repository_key: key,
            subject,
            predicate,
            object,
        })
    }

    /// Read the association checked out in `repo`.
    pub fn load(repo: &mut Repository) -> AssociationResult<Self> {
        let root = repo.root_object()?;
        let root_type = repo.object_type(&root)?;
        if root_type != ASSOCIATION {
            return Err(AssociationError::NotAnAssociation(root_type));
        }
        Ok(Self {
            repository_key: repo.repository_key().clone(),
            subject: IdRef::read(repo, &root, "subject")?,
            predicate: IdRef::read(repo, &root, "predicate")?,
            object: IdRef::read(repo, &root, "object")?,
        })
    }

    /// Dissolve the association: null every reference and commit.
    pub fn set_null(&mut self, wb: &mut Workbench) -> AssociationResult<()> {
        let repo = wb.repository_mut(self.repository_key.as_str())?;
        let root = repo.root_object()?;
        for field in ["subject", "predicate", "object"] {
            IdRef::null().write(repo, &root, field)?;
        }
        repo.commit("dissolve association")?;
        self.subject = IdRef::null();
        self.predicate = IdRef::null();
        self.object = IdRef::null();
        info!(association = %self.repository_key.short_id(), "dissolved association");
        Ok(())
    }

    /// An association with any null reference is dissolved.
    pub fn is_null(&self) -> bool {
        self.subject.is_null() || self.predicate.is_null() || self.object.is_null()
    }
}
