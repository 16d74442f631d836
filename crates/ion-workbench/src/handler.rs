//! Serving pull, push and fetch requests from other workbenches.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use ion_protocol::{
    status, Container, FetchRequest, IonCodec, Operation, ProtocolError, PullRequest,
    PushRequest, Response,
};
use ion_repository::Repository;
use ion_store::{collect_reachable, ElementCache, ElementSource, StructureElement};
use ion_types::{ObjectKey, ObjectType, RepositoryKey};
use prost::Message;
use tracing::{debug, info, warn};

use crate::error::{WorkbenchError, WorkbenchResult};
use crate::sync::repository_container;
use crate::workbench::Workbench;

/// Every element held by a workbench: the shared cache first, then each
/// repository's own index.
struct HeldContent<'a> {
    cache: &'a ElementCache,
    repositories: &'a HashMap<RepositoryKey, Repository>,
}

impl ElementSource for HeldContent<'_> {
    fn element(&self, key: &ObjectKey) -> Option<Arc<StructureElement>> {
        self.cache.get(key).or_else(|| {
            self.repositories
                .values()
                .find_map(|repo| repo.index().element(key))
        })
    }
}

impl Workbench {
    /// Serve one framed request and return the framed response.
    pub fn handle_frame(&mut self, frame: &[u8]) -> Vec<u8> {
        let decoded = IonCodec::decode(frame).and_then(|(frame, _)| Ok((frame.operation()?, frame)));
        let response = match decoded {
            Ok((op, frame)) => self.handle_request(op, &frame.payload),
            Err(err) => {
                warn!(process = %self.name, %err, "rejected malformed request");
                Response::error(status::BAD_REQUEST, err.to_string())
            }
        };
        IonCodec::encode_response(&response).unwrap_or_else(|err| {
            warn!(process = %self.name, %err, "reply could not be framed");
            let fallback = Response::error(status::SERVER_ERROR, err.to_string());
            IonCodec::encode_response(&fallback).unwrap_or_default()
        })
    }

    /// Dispatch a decoded request. Failures become error responses carrying
    /// the matching status.
    pub fn handle_request(&mut self, op: Operation, payload: &[u8]) -> Response {
        let result = match op {
            Operation::Pull => self.op_pull(payload),
            Operation::Push => self.op_push(payload),
            Operation::FetchLinkedObjects => self.op_fetch_linked_objects(payload),
        };
        match result {
            Ok(reply) => Response::ok(reply),
            Err(err) => {
                warn!(process = %self.name, %op, %err, "request failed");
                Response::error(err.status_code(), err.to_string())
            }
        }
    }

    fn op_pull(&mut self, payload: &[u8]) -> WorkbenchResult<Vec<u8>> {
        let request = PullRequest::decode(payload).map_err(ProtocolError::from)?;
        let key = self.resolve(&request.repository_key)?;
        let known: HashSet<ObjectKey> = request.known_commits()?.into_iter().collect();
        let excluded: HashSet<ObjectType> = request.excluded_types.iter().copied().collect();
        let repo = self
            .repositories
            .get_mut(&key)
            .ok_or_else(|| WorkbenchError::UnknownRepository(key.to_string()))?;
        let container =
            repository_container(repo, &known, request.get_head_content, &excluded)?;
        info!(
            process = %self.name,
            repo = %key.short_id(),
            items = container.items.len(),
            "served pull"
        );
        Ok(container.to_bytes())
    }

    fn op_push(&mut self, payload: &[u8]) -> WorkbenchResult<Vec<u8>> {
        let request = PushRequest::decode(payload).map_err(ProtocolError::from)?;
        for container in &request.repositories {
            let result = self.receive_repository(container)?;
            info!(
                process = %self.name,
                repo = %result.repository_key.short_id(),
                created = result.created,
                elements = result.elements_received,
                "received push"
            );
        }
        Ok(Vec::new())
    }

    fn op_fetch_linked_objects(&mut self, payload: &[u8]) -> WorkbenchResult<Vec<u8>> {
        let request = FetchRequest::decode(payload).map_err(ProtocolError::from)?;
        let keys = request.object_keys()?;
        let excluded: HashSet<ObjectType> = request.excluded_types.iter().copied().collect();
        let held = HeldContent {
            cache: &self.cache,
            repositories: &self.repositories,
        };
        let reach = collect_reachable(&held, &keys, &HashSet::new(), &excluded);
        if reach.elements.is_empty() {
            if let Some(missing) = reach.missing.first() {
                return Err(WorkbenchError::Repository(
                    ion_repository::RepositoryError::NotFound(*missing),
                ));
            }
        }
        debug!(
            requested = keys.len(),
            sent = reach.elements.len(),
            missing = reach.missing.len(),
            "served fetch"
        );
        Ok(Container::fetch(reach.elements.iter().map(|e| e.as_ref())).to_bytes())
    }
}
