//! Pull, push and lazy fetch between workbenches.
//!
//! A repository travels as a [`Container`] whose single head is its mutable
//! head. The items are the commits the receiver lacks and, when requested,
//! the object trees of the branch heads. Older content stays behind and is
//! fetched on demand when a checkout or link resolution misses it.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use ion_protocol::{
    Container, FetchRequest, IonCodec, Operation, PullRequest, PushRequest,
};
use ion_repository::{
    CheckoutOptions, MutableHead, ObjectHandle, Repository, RepositoryError, RepositoryResult,
    RepositoryStatus,
};
use ion_store::{collect_reachable, ElementSource, StructureElement};
use ion_types::well_known::MUTABLE_HEAD;
use ion_types::{BranchKey, ObjectKey, ObjectType};
use prost::Message;
use tracing::{debug, info, warn};

use crate::error::{WorkbenchError, WorkbenchResult};
use crate::types::{BranchUpdate, FetchResult, PushResult, ReceiveResult};
use crate::workbench::Workbench;

/// Commit elements reachable from every branch head, not descending into
/// commits in `known`.
pub(crate) fn history_elements(
    repo: &mut Repository,
    known: &HashSet<ObjectKey>,
) -> RepositoryResult<Vec<Arc<StructureElement>>> {
    let mut queue: VecDeque<ObjectKey> = repo.mutable_head().all_commitrefs().into();
    let mut seen: HashSet<ObjectKey> = HashSet::new();
    let mut elements = Vec::new();
    while let Some(key) = queue.pop_front() {
        if known.contains(&key) || !seen.insert(key) {
            continue;
        }
        let commit = repo.load_commit(key)?;
        let element = repo
            .index()
            .element(&key)
            .ok_or(RepositoryError::NotFound(key))?;
        elements.push(element);
        queue.extend(commit.parent_keys());
    }
    Ok(elements)
}

/// Content reachable from the root of every branch head. Content this
/// repository does not hold is left out.
pub(crate) fn head_content(
    repo: &mut Repository,
    excluded: &HashSet<ObjectType>,
) -> RepositoryResult<Vec<Arc<StructureElement>>> {
    let mut roots = Vec::new();
    for key in repo.mutable_head().all_commitrefs() {
        let root = repo.load_commit(key)?.objectroot;
        if !excluded.contains(&root.object_type) {
            roots.push(root.key);
        }
    }
    let reach = collect_reachable(repo.index(), &roots, &HashSet::new(), excluded);
    if !reach.missing.is_empty() {
        debug!(missing = reach.missing.len(), "head content is partly remote");
    }
    Ok(reach.elements)
}

/// The transfer container for a whole repository.
pub(crate) fn repository_container(
    repo: &mut Repository,
    known_commits: &HashSet<ObjectKey>,
    with_content: bool,
    excluded: &HashSet<ObjectType>,
) -> RepositoryResult<Container> {
    let head = repo.head_element()?;
    let mut items = history_elements(repo, known_commits)?;
    if with_content {
        items.extend(head_content(repo, excluded)?);
    }
    let mut shipped = HashSet::new();
    items.retain(|e| shipped.insert(e.key));
    Ok(Container::new([&head], items.iter().map(|e| e.as_ref())))
}

impl Workbench {
    /// Send one request to `target` and return the payload of its reply.
    async fn rpc(
        &self,
        target: &str,
        op: Operation,
        request: &(impl Message + Sync),
    ) -> WorkbenchResult<Vec<u8>> {
        let transport = self.transport.as_ref().ok_or(WorkbenchError::NoTransport)?;
        let frame = IonCodec::encode_request(op, request)?;
        let reply = tokio::time::timeout(self.config.timeout(), transport.send(target, frame))
            .await
            .map_err(|_| WorkbenchError::Timeout {
                op: op.name(),
                secs: self.config.request_timeout,
            })??;
        let response = IonCodec::decode_response(&reply)?;
        Ok(response.into_payload()?)
    }

    // -----------------------------------------------------------------------
    // Client operations
    // -----------------------------------------------------------------------

    /// Fetch a repository's head and the history this workbench lacks from
    /// `origin`, merging it into the local copy if there is one.
    pub async fn pull(&mut self, origin: &str, repository: &str) -> WorkbenchResult<ReceiveResult> {
        let (repository_key, known) = match self.resolve(repository) {
            Ok(key) => {
                let known = self
                    .repositories
                    .get(&key)
                    .map(Repository::known_commits)
                    .unwrap_or_default();
                (key.to_string(), known)
            }
            Err(_) => (repository.to_string(), HashSet::new()),
        };
        let request = PullRequest {
            repository_key,
            get_head_content: self.config.get_head_content,
            excluded_types: self.config.excluded_types.clone(),
            commit_keys: known.iter().map(ObjectKey::to_vec).collect(),
        };
        let payload = self.rpc(origin, Operation::Pull, &request).await?;
        let container = Container::from_bytes(&payload)?;
        let mut result = self.receive_repository(&container)?;
        result.bytes_transferred = payload.len() as u64;
        info!(
            process = %self.name,
            origin,
            repo = %result.repository_key.short_id(),
            elements = result.elements_received,
            "pulled repository"
        );
        Ok(result)
    }

    /// Send repositories with their full history to `origin`.
    ///
    /// Every repository must be committed; nothing is sent otherwise.
    pub async fn push(&mut self, origin: &str, repositories: &[&str]) -> WorkbenchResult<PushResult> {
        let excluded = self.config.excluded_set();
        let with_content = self.config.get_head_content;
        let mut containers = Vec::with_capacity(repositories.len());
        for name in repositories {
            let key = self.resolve(name)?;
            let repo = self
                .repositories
                .get_mut(&key)
                .ok_or_else(|| WorkbenchError::UnknownRepository(key.to_string()))?;
            if matches!(
                repo.status(),
                RepositoryStatus::Modified | RepositoryStatus::Invalid
            ) {
                return Err(WorkbenchError::Uncommitted(key.to_string()));
            }
            containers.push(repository_container(repo, &HashSet::new(), with_content, &excluded)?);
        }

        let elements_sent = containers.iter().map(|c| c.items.len()).sum();
        let request = PushRequest {
            repositories: containers,
        };
        let bytes_transferred = request.encoded_len() as u64;
        self.rpc(origin, Operation::Push, &request).await?;
        info!(
            process = %self.name,
            origin,
            repositories = repositories.len(),
            elements = elements_sent,
            "pushed repositories"
        );
        Ok(PushResult {
            repositories: repositories.len(),
            elements_sent,
            bytes_transferred,
        })
    }

    /// Fetch `keys` and everything they reach from `origin` into a
    /// repository's index.
    pub async fn fetch_linked_objects(
        &mut self,
        origin: &str,
        repository: &str,
        keys: &[ObjectKey],
    ) -> WorkbenchResult<FetchResult> {
        let key = self.resolve(repository)?;
        let mut request = FetchRequest::new(keys.iter().copied());
        request.excluded_types = self.config.excluded_types.clone();
        let payload = self.rpc(origin, Operation::FetchLinkedObjects, &request).await?;
        let container = Container::from_bytes(&payload)?;
        if !container.is_fetch() {
            return Err(WorkbenchError::MalformedTransfer(
                "fetch reply carries heads".into(),
            ));
        }
        let items = container.item_elements()?;
        let repo = self
            .repositories
            .get_mut(&key)
            .ok_or_else(|| WorkbenchError::UnknownRepository(key.to_string()))?;
        let elements_received = repo.receive_elements(items)?;
        debug!(
            origin,
            requested = keys.len(),
            received = elements_received,
            "fetched linked objects"
        );
        Ok(FetchResult {
            elements_received,
            bytes_transferred: payload.len() as u64,
        })
    }

    /// Run `op` against a repository, fetching missing content from `origin`
    /// and retrying, up to the configured number of attempts.
    async fn with_fetch<T>(
        &mut self,
        repository: &str,
        origin: Option<&str>,
        mut op: impl FnMut(&mut Repository) -> RepositoryResult<T>,
    ) -> WorkbenchResult<T> {
        let key = self.resolve(repository)?;
        let mut attempts = 0;
        loop {
            let repo = self
                .repositories
                .get_mut(&key)
                .ok_or_else(|| WorkbenchError::UnknownRepository(key.to_string()))?;
            let err = match op(repo) {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };
            let (Some(origin), Some(missing)) = (origin, err.missing_key()) else {
                return Err(err.into());
            };
            if attempts >= self.config.fetch_attempts {
                warn!(key = %missing.short_hex(), attempts, "giving up on remote content");
                return Err(err.into());
            }
            attempts += 1;
            self.fetch_linked_objects(origin, key.as_str(), &[missing])
                .await?;
        }
    }

    /// [`Repository::checkout`], fetching missing content from `origin`.
    pub async fn checkout(
        &mut self,
        repository: &str,
        branch: &str,
        options: CheckoutOptions,
        origin: Option<&str>,
    ) -> WorkbenchResult<ObjectHandle> {
        self.with_fetch(repository, origin, |repo| {
            repo.checkout(branch, options.clone())
        })
        .await
    }

    /// Follow a link field, fetching the target from `origin` if it is not
    /// held locally.
    pub async fn get_object(
        &mut self,
        repository: &str,
        handle: &ObjectHandle,
        field: &str,
        origin: Option<&str>,
    ) -> WorkbenchResult<Option<ObjectHandle>> {
        self.with_fetch(repository, origin, |repo| repo.get_object(handle, field))
            .await
    }

    // -----------------------------------------------------------------------
    // Offline transfer
    // -----------------------------------------------------------------------

    /// Serialize a committed repository, with its full history and head
    /// content, as a standalone container.
    pub fn export_repository(&mut self, name: &str) -> WorkbenchResult<Vec<u8>> {
        let excluded = self.config.excluded_set();
        let key = self.resolve(name)?;
        let repo = self
            .repositories
            .get_mut(&key)
            .ok_or_else(|| WorkbenchError::UnknownRepository(key.to_string()))?;
        if matches!(
            repo.status(),
            RepositoryStatus::Modified | RepositoryStatus::Invalid
        ) {
            return Err(WorkbenchError::Uncommitted(key.to_string()));
        }
        let container = repository_container(repo, &HashSet::new(), true, &excluded)?;
        debug!(repo = %key.short_id(), items = container.items.len(), "exported repository");
        Ok(container.to_bytes())
    }

    /// Take in a container written by [`Workbench::export_repository`].
    pub fn import_repository(&mut self, bytes: &[u8]) -> WorkbenchResult<ReceiveResult> {
        let container = Container::from_bytes(bytes)?;
        let mut result = self.receive_repository(&container)?;
        result.bytes_transferred = bytes.len() as u64;
        info!(
            process = %self.name,
            repo = %result.repository_key.short_id(),
            created = result.created,
            "imported repository"
        );
        Ok(result)
    }

    // -----------------------------------------------------------------------
    // Receiving
    // -----------------------------------------------------------------------

    /// Take in a repository container: create the repository if it is new
    /// here, otherwise merge its branches into the local head.
    pub(crate) fn receive_repository(
        &mut self,
        container: &Container,
    ) -> WorkbenchResult<ReceiveResult> {
        let mut heads = container.head_elements()?;
        let head = match (heads.pop(), heads.is_empty()) {
            (Some(head), true) if head.object_type == MUTABLE_HEAD => head,
            _ => {
                return Err(WorkbenchError::MalformedTransfer(
                    "repository container must carry one mutable head".into(),
                ))
            }
        };
        let remote = MutableHead::from_element(&head)?;
        let items = container.item_elements()?;
        let key = remote.repository_key.clone();

        if let Some(repo) = self.repositories.get_mut(&key) {
            let elements_received = repo.receive_elements(items)?;
            let branches = merge_repo_heads(repo, &remote)?;
            return Ok(ReceiveResult {
                repository_key: key,
                created: false,
                elements_received,
                branches,
                bytes_transferred: 0,
            });
        }

        let branches = remote
            .branches
            .iter()
            .map(|b| (b.branchkey.clone(), BranchUpdate::Added))
            .collect();
        let mut repo = Repository::from_head(
            Arc::clone(&self.registry),
            Some(Arc::clone(&self.cache)),
            remote,
        );
        repo.set_excluded_types(self.config.excluded_set());
        let elements_received = repo.receive_elements(items)?;
        self.put_repository(repo);
        Ok(ReceiveResult {
            repository_key: key,
            created: true,
            elements_received,
            branches,
            bytes_transferred: 0,
        })
    }
}

/// Merge received branch heads into a local repository, branch by branch.
///
/// A received head already present or already in local history changes
/// nothing. Local heads in the received head's history are replaced by it.
/// Otherwise both are kept and the branch is left diverged. Received
/// commits must already be in the repository's index.
pub(crate) fn merge_repo_heads(
    repo: &mut Repository,
    remote: &MutableHead,
) -> RepositoryResult<Vec<(BranchKey, BranchUpdate)>> {
    let mut updates = Vec::with_capacity(remote.branches.len());
    for incoming in &remote.branches {
        let key = incoming.branchkey.clone();
        let Some(local) = repo.mutable_head().branch(&key).map(|b| b.commitrefs.clone()) else {
            repo.mutable_head_mut().branches.push(incoming.clone());
            updates.push((key, BranchUpdate::Added));
            continue;
        };

        let mut refs = local.clone();
        let mut behind = false;
        for head in &incoming.commitrefs {
            if refs.contains(head) {
                continue;
            }
            let mut known = false;
            for r in &refs {
                if repo.is_ancestor(*head, *r)? {
                    known = true;
                    break;
                }
            }
            if known {
                behind = true;
                continue;
            }
            let mut kept = Vec::with_capacity(refs.len() + 1);
            for r in refs {
                if !repo.is_ancestor(r, *head)? {
                    kept.push(r);
                }
            }
            kept.push(*head);
            refs = kept;
        }

        let update = if refs == local {
            if behind {
                BranchUpdate::LocalAhead
            } else {
                BranchUpdate::Unchanged
            }
        } else if refs.len() > 1 {
            BranchUpdate::Diverged
        } else {
            BranchUpdate::FastForward
        };
        if let Some(branch) = repo.mutable_head_mut().branch_mut(&key) {
            branch.commitrefs = refs;
        }
        match update {
            BranchUpdate::Diverged => warn!(branch = %key, "branch diverged on receive"),
            BranchUpdate::FastForward => debug!(branch = %key, "fast-forwarded branch"),
            _ => {}
        }
        updates.push((key, update));
    }
    repo.prune_duplicate_commitrefs();
    Ok(updates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WorkbenchConfig;
    use crate::fixtures::{at, person_repo, registry, string, workbench};
    use crate::transport::{LocalTransport, Transport};
    use async_trait::async_trait;
    use ion_protocol::status;
    use std::time::Duration;
    use tokio::sync::Mutex;

    type Shared = Arc<Mutex<Workbench>>;

    async fn pair(config_b: WorkbenchConfig) -> (LocalTransport, Shared, Shared) {
        let transport = LocalTransport::new();
        let a = transport.attach(workbench("a")).await;
        let b = transport
            .attach(Workbench::new("b", registry(), config_b))
            .await;
        (transport, a, b)
    }

    fn retitle(wb: &mut Workbench, repository: &str, title: &str, hours: i64) {
        let repo = wb.repository_mut(repository).unwrap();
        let root = repo.root_object().unwrap();
        repo.set(&root, "title", title).unwrap();
        repo.commit_with_date(title, at(hours)).unwrap();
    }

    fn title(wb: &Workbench, repository: &str) -> String {
        let repo = wb.repository(repository).unwrap();
        let root = repo.root_object().unwrap();
        string(repo.get(&root, "title").unwrap())
    }

    // -----------------------------------------------------------------------
    // Push
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn pushed_repository_checks_out_equal_but_distinct() {
        let (_transport, a, b) = pair(WorkbenchConfig::default()).await;
        let mut a = a.lock().await;
        let key = person_repo(&mut a, "David");
        let pushed = a.push("b", &[key.as_str()]).await.unwrap();
        assert_eq!(pushed.repositories, 1);
        assert!(pushed.elements_sent >= 3);

        let source = a.repository(key.as_str()).unwrap();
        let source_root = source.root_object().unwrap();
        let source_message = source.message(&source_root).unwrap();

        let mut b = b.lock().await;
        let root = b
            .checkout(key.as_str(), "master", CheckoutOptions::default(), None)
            .await
            .unwrap();
        let copy = b.repository(key.as_str()).unwrap();
        assert_eq!(copy.commit_head(), source.commit_head());
        assert_eq!(copy.message(&root).unwrap(), source_message);
        assert_ne!(root, source_root);
    }

    #[tokio::test]
    async fn push_refuses_uncommitted_repositories() {
        let (_transport, a, b) = pair(WorkbenchConfig::default()).await;
        let mut a = a.lock().await;
        let key = person_repo(&mut a, "David");
        let repo = a.repository_mut(key.as_str()).unwrap();
        let root = repo.root_object().unwrap();
        repo.set(&root, "title", "draft").unwrap();

        assert!(matches!(
            a.push("b", &[key.as_str()]).await,
            Err(WorkbenchError::Uncommitted(_))
        ));
        assert!(b.lock().await.list_repositories().is_empty());
    }

    // -----------------------------------------------------------------------
    // Pull and merge-on-receive
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn pull_creates_then_fast_forwards() {
        let (_transport, a, b) = pair(WorkbenchConfig::default()).await;
        let key = person_repo(&mut *a.lock().await, "David");
        let mut b = b.lock().await;

        let first = b.pull("a", key.as_str()).await.unwrap();
        assert!(first.created);
        assert!(first.elements_received > 0);
        let master = b
            .repository(key.as_str())
            .unwrap()
            .resolve_branch("master")
            .unwrap();
        assert_eq!(first.update_of(&master), Some(BranchUpdate::Added));

        retitle(&mut *a.lock().await, key.as_str(), "friends", 1);
        let second = b.pull("a", key.as_str()).await.unwrap();
        assert!(!second.created);
        assert_eq!(second.update_of(&master), Some(BranchUpdate::FastForward));
        b.checkout(key.as_str(), "master", CheckoutOptions::default(), None)
            .await
            .unwrap();
        assert_eq!(title(&b, key.as_str()), "friends");

        let third = b.pull("a", key.as_str()).await.unwrap();
        assert_eq!(third.update_of(&master), Some(BranchUpdate::Unchanged));
        assert_eq!(third.elements_received, 0);
    }

    #[tokio::test]
    async fn concurrent_commits_diverge_then_merge_by_date() {
        let (_transport, a, b) = pair(WorkbenchConfig::default()).await;
        let key = person_repo(&mut *a.lock().await, "David");
        let mut b = b.lock().await;
        b.pull("a", key.as_str()).await.unwrap();
        b.checkout(key.as_str(), "master", CheckoutOptions::default(), None)
            .await
            .unwrap();
        retitle(&mut b, key.as_str(), "from b", 2);
        let master = b
            .repository(key.as_str())
            .unwrap()
            .resolve_branch("master")
            .unwrap();

        let behind = b.pull("a", key.as_str()).await.unwrap();
        assert_eq!(behind.update_of(&master), Some(BranchUpdate::LocalAhead));

        retitle(&mut *a.lock().await, key.as_str(), "from a", 1);
        let diverged = b.pull("a", key.as_str()).await.unwrap();
        assert_eq!(diverged.update_of(&master), Some(BranchUpdate::Diverged));
        let repo = b.repository(key.as_str()).unwrap();
        assert_eq!(repo.mutable_head().branch(&master).unwrap().commitrefs.len(), 2);

        b.checkout(key.as_str(), "master", CheckoutOptions::default(), None)
            .await
            .unwrap();
        assert_eq!(title(&b, key.as_str()), "from b");
        let repo = b.repository(key.as_str()).unwrap();
        assert_eq!(repo.mutable_head().branch(&master).unwrap().commitrefs.len(), 1);
    }

    #[tokio::test]
    async fn pull_of_unknown_repository_is_not_found() {
        let (_transport, _a, b) = pair(WorkbenchConfig::default()).await;
        let err = b.lock().await.pull("a", "0123456789abcdef").await.unwrap_err();
        assert!(matches!(err, WorkbenchError::Remote { status: 404, .. }));
        assert!(err.is_not_found());
    }

    // -----------------------------------------------------------------------
    // Lazy fetch
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn shallow_pull_fetches_content_on_demand() {
        let shallow = WorkbenchConfig {
            get_head_content: false,
            ..WorkbenchConfig::default()
        };
        let (_transport, a, b) = pair(shallow).await;
        let key = person_repo(&mut *a.lock().await, "David");
        let mut b = b.lock().await;
        let pulled = b.pull("a", key.as_str()).await.unwrap();
        assert_eq!(pulled.elements_received, 1);

        let offline = b
            .checkout(key.as_str(), "master", CheckoutOptions::default(), None)
            .await
            .unwrap_err();
        assert!(offline.is_not_found());

        let root = b
            .checkout(key.as_str(), "master", CheckoutOptions::default(), Some("a"))
            .await
            .unwrap();
        let owner = b
            .get_object(key.as_str(), &root, "owner", Some("a"))
            .await
            .unwrap()
            .unwrap();
        let repo = b.repository(key.as_str()).unwrap();
        assert_eq!(string(repo.get(&owner, "name").unwrap()), "David");
    }

    #[tokio::test]
    async fn fetching_absent_content_is_not_found() {
        let (_transport, a, b) = pair(WorkbenchConfig::default()).await;
        let key = person_repo(&mut *a.lock().await, "David");
        let mut b = b.lock().await;
        b.pull("a", key.as_str()).await.unwrap();
        let err = b
            .fetch_linked_objects("a", key.as_str(), &[ObjectKey::from_hash([3; 20])])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            WorkbenchError::Remote {
                status: status::NOT_FOUND,
                ..
            }
        ));
    }

    // -----------------------------------------------------------------------
    // Transport failures
    // -----------------------------------------------------------------------

    struct Stalled;

    #[async_trait]
    impl Transport for Stalled {
        async fn send(&self, _target: &str, _frame: Vec<u8>) -> WorkbenchResult<Vec<u8>> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn stalled_remote_times_out_without_local_changes() {
        let config = WorkbenchConfig {
            request_timeout: 0,
            ..WorkbenchConfig::default()
        };
        let mut wb = Workbench::new("a", registry(), config).with_transport(Arc::new(Stalled));
        let err = wb.pull("b", "0123456789abcdef").await.unwrap_err();
        assert!(matches!(err, WorkbenchError::Timeout { op: "pull", .. }));
        assert!(wb.list_repositories().is_empty());
    }

    #[tokio::test]
    async fn unknown_process_and_missing_transport_are_errors() {
        let (_transport, a, _b) = pair(WorkbenchConfig::default()).await;
        let mut a = a.lock().await;
        let key = person_repo(&mut a, "David");
        assert!(matches!(
            a.push("nobody", &[key.as_str()]).await,
            Err(WorkbenchError::UnknownProcess(_))
        ));

        let mut alone = workbench("alone");
        assert!(matches!(
            alone.pull("a", key.as_str()).await,
            Err(WorkbenchError::NoTransport)
        ));
    }

    #[test]
    fn malformed_frames_get_bad_request() {
        let mut wb = workbench("a");
        let reply = IonCodec::decode_response(&wb.handle_frame(&[0, 0])).unwrap();
        assert_eq!(reply.status, status::BAD_REQUEST);

        let frame = IonCodec::encode_frame(42, &[]).unwrap();
        let reply = IonCodec::decode_response(&wb.handle_frame(&frame)).unwrap();
        assert_eq!(reply.status, status::BAD_REQUEST);
    }

    // -----------------------------------------------------------------------
    // Offline transfer
    // -----------------------------------------------------------------------

    #[test]
    fn exported_repository_imports_elsewhere() {
        let mut a = workbench("a");
        let key = person_repo(&mut a, "David");
        let bytes = a.export_repository(key.as_str()).unwrap();

        let mut b = workbench("b");
        let received = b.import_repository(&bytes).unwrap();
        assert!(received.created);
        assert_eq!(received.repository_key, key);
        assert_eq!(received.bytes_transferred, bytes.len() as u64);

        let repo = b.repository_mut(key.as_str()).unwrap();
        let root = repo.checkout("master", CheckoutOptions::default()).unwrap();
        assert_eq!(string(repo.get(&root, "title").unwrap()), "people");

        let again = b.import_repository(&bytes).unwrap();
        assert!(!again.created);
        assert_eq!(
            again.update_of(&repo_branch(&b, key.as_str())),
            Some(BranchUpdate::Unchanged)
        );
    }

    #[test]
    fn uncommitted_repositories_are_not_exported() {
        let mut a = workbench("a");
        let key = a.create_repository(Some(crate::fixtures::PERSON), None).unwrap();
        assert!(matches!(
            a.export_repository(key.as_str()),
            Err(WorkbenchError::Uncommitted(_))
        ));
    }

    fn repo_branch(wb: &Workbench, name: &str) -> BranchKey {
        wb.repository(name).unwrap().current_branch().unwrap().clone()
    }
}
