//! Repositories held by one process.

use std::collections::HashMap;
use std::sync::Arc;

use ion_repository::{CheckoutOptions, Repository};
use ion_schema::TypeRegistry;
use ion_store::{ElementCache, StructureElement};
use ion_types::{ObjectType, RepositoryKey};
use tracing::{debug, info};

use crate::config::WorkbenchConfig;
use crate::error::{WorkbenchError, WorkbenchResult};
use crate::transport::Transport;

/// Owner of every repository in a process.
///
/// Repositories created or received here share one [`ElementCache`], so
/// hashed content is held once no matter how many repositories reach it.
/// Remote operations go through the configured [`Transport`].
pub struct Workbench {
    pub(crate) name: String,
    pub(crate) config: WorkbenchConfig,
    pub(crate) registry: Arc<TypeRegistry>,
    pub(crate) cache: Arc<ElementCache>,
    pub(crate) repositories: HashMap<RepositoryKey, Repository>,
    pub(crate) nicknames: HashMap<String, RepositoryKey>,
    pub(crate) transport: Option<Arc<dyn Transport>>,
}

impl Workbench {
    pub fn new(name: impl Into<String>, registry: Arc<TypeRegistry>, config: WorkbenchConfig) -> Self {
        let cache = Arc::new(ElementCache::with_prune_interval(config.cache_prune_interval));
        Self {
            name: name.into(),
            config,
            registry,
            cache,
            repositories: HashMap::new(),
            nicknames: HashMap::new(),
            transport: None,
        }
    }

    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn set_transport(&mut self, transport: Arc<dyn Transport>) {
        self.transport = Some(transport);
    }

    /// Process name peers address this workbench by.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &WorkbenchConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<TypeRegistry> {
        &self.registry
    }

    pub fn cache(&self) -> &Arc<ElementCache> {
        &self.cache
    }

    // -----------------------------------------------------------------------
    // Repository table
    // -----------------------------------------------------------------------

    /// Create a repository, rooted at an empty object of `root_type` if
    /// given.
    pub fn create_repository(
        &mut self,
        root_type: Option<ObjectType>,
        nickname: Option<&str>,
    ) -> WorkbenchResult<RepositoryKey> {
        let cache = Some(Arc::clone(&self.cache));
        let mut repo = match root_type {
            Some(t) => Repository::create(Arc::clone(&self.registry), cache, t)?,
            None => Repository::new(Arc::clone(&self.registry), cache),
        };
        repo.set_excluded_types(self.config.excluded_set());
        let key = self.put_repository(repo);
        if let Some(nickname) = nickname {
            self.set_nickname(nickname, &key)?;
        }
        info!(process = %self.name, repo = %key.short_id(), "created repository");
        Ok(key)
    }

    /// Take ownership of an existing repository.
    pub fn put_repository(&mut self, repo: Repository) -> RepositoryKey {
        let key = repo.repository_key().clone();
        self.repositories.insert(key.clone(), repo);
        key
    }

    pub fn set_nickname(&mut self, nickname: &str, key: &RepositoryKey) -> WorkbenchResult<()> {
        if !self.repositories.contains_key(key) {
            return Err(WorkbenchError::UnknownRepository(key.to_string()));
        }
        self.nicknames.insert(nickname.to_string(), key.clone());
        Ok(())
    }

    /// Look a repository up by nickname or key.
    pub fn resolve(&self, name: &str) -> WorkbenchResult<RepositoryKey> {
        if let Some(key) = self.nicknames.get(name) {
            return Ok(key.clone());
        }
        match RepositoryKey::parse(name) {
            Ok(key) if self.repositories.contains_key(&key) => Ok(key),
            _ => Err(WorkbenchError::UnknownRepository(name.to_string())),
        }
    }

    pub fn repository(&self, name: &str) -> WorkbenchResult<&Repository> {
        let key = self.resolve(name)?;
        self.repositories
            .get(&key)
            .ok_or(WorkbenchError::UnknownRepository(key.to_string()))
    }

    pub fn repository_mut(&mut self, name: &str) -> WorkbenchResult<&mut Repository> {
        let key = self.resolve(name)?;
        self.repositories
            .get_mut(&key)
            .ok_or(WorkbenchError::UnknownRepository(key.to_string()))
    }

    pub fn repository_by_nickname(&self, nickname: &str) -> Option<&Repository> {
        self.nicknames
            .get(nickname)
            .and_then(|key| self.repositories.get(key))
    }

    /// Repository keys with their nicknames, ordered by key.
    pub fn list_repositories(&self) -> Vec<(RepositoryKey, Option<String>)> {
        let mut listed: Vec<(RepositoryKey, Option<String>)> = self
            .repositories
            .keys()
            .map(|key| {
                let nickname = self
                    .nicknames
                    .iter()
                    .find(|(_, k)| *k == key)
                    .map(|(n, _)| n.clone());
                (key.clone(), nickname)
            })
            .collect();
        listed.sort_by(|(a, _), (b, _)| a.as_str().cmp(b.as_str()));
        listed
    }

    pub fn remove_repository(&mut self, name: &str) -> WorkbenchResult<Repository> {
        let key = self.resolve(name)?;
        let repo = self
            .repositories
            .remove(&key)
            .ok_or(WorkbenchError::UnknownRepository(key.to_string()))?;
        self.nicknames.retain(|_, k| *k != key);
        debug!(repo = %key.short_id(), "removed repository");
        Ok(repo)
    }

    /// Drop every repository not marked persistent and sweep the cache.
    /// Returns how many repositories went.
    pub fn clear_non_persistent(&mut self) -> usize {
        let before = self.repositories.len();
        self.repositories.retain(|_, repo| repo.persistent);
        let repositories = &self.repositories;
        self.nicknames.retain(|_, key| repositories.contains_key(key));
        let cleared = before - self.repositories.len();
        let swept = self.cache.prune();
        info!(process = %self.name, cleared, swept, "cleared non-persistent repositories");
        cleared
    }

    /// Copy the committed state of a repository into a new repository with
    /// its own key. Uncommitted workspace changes are not copied.
    pub fn clone_repository(
        &mut self,
        name: &str,
        nickname: Option<&str>,
    ) -> WorkbenchResult<RepositoryKey> {
        let source = self.repository(name)?;
        let mut head = source.mutable_head().clone();
        head.repository_key = RepositoryKey::generate();
        let elements: Vec<StructureElement> =
            source.index().iter().map(|e| StructureElement::clone(e)).collect();
        let branch_names = source.branch_names();
        let current = source.current_branch().cloned();

        let mut clone = Repository::from_head(
            Arc::clone(&self.registry),
            Some(Arc::clone(&self.cache)),
            head,
        );
        clone.set_excluded_types(self.config.excluded_set());
        clone.receive_elements(elements)?;
        for (branch, nickname) in branch_names {
            if let Some(nickname) = nickname {
                clone.set_nickname(&nickname, &branch)?;
            }
        }
        if let Some(branch) = current {
            let has_commits = clone
                .mutable_head()
                .branch(&branch)
                .is_some_and(|b| !b.commitrefs.is_empty());
            if has_commits {
                clone.checkout(branch.as_str(), CheckoutOptions::default())?;
            }
        }

        let key = self.put_repository(clone);
        if let Some(nickname) = nickname {
            self.set_nickname(nickname, &key)?;
        }
        info!(process = %self.name, repo = %key.short_id(), "cloned repository");
        Ok(key)
    }
}

impl std::fmt::Debug for Workbench {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Workbench")
            .field("name", &self.name)
            .field("repositories", &self.repositories.len())
            .field("cached_elements", &self.cache.len())
            .finish()
    }
}
