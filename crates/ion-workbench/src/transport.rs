use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

use crate::error::{WorkbenchError, WorkbenchResult};
use crate::workbench::Workbench;

/// Delivery of framed requests to another process's workbench.
///
/// A frame is an [`IonCodec`](ion_protocol::IonCodec) request; the reply is
/// a framed [`Response`](ion_protocol::Response). Connection handling and
/// retries belong to the implementation. Time bounds are applied by the
/// caller.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, target: &str, frame: Vec<u8>) -> WorkbenchResult<Vec<u8>>;
}

/// In-process transport: workbenches registered by process name.
///
/// An attached workbench and the transport refer to each other; call
/// [`detach`](Self::detach) to release a workbench.
#[derive(Clone, Default)]
pub struct LocalTransport {
    peers: Arc<RwLock<HashMap<String, Arc<Mutex<Workbench>>>>>,
}

impl LocalTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `workbench` under its name and route its own outgoing
    /// calls through this transport.
    pub async fn attach(&self, mut workbench: Workbench) -> Arc<Mutex<Workbench>> {
        workbench.set_transport(Arc::new(self.clone()));
        let name = workbench.name().to_string();
        let shared = Arc::new(Mutex::new(workbench));
        self.peers.write().await.insert(name.clone(), Arc::clone(&shared));
        debug!(process = %name, "attached workbench");
        shared
    }

    pub async fn detach(&self, name: &str) -> Option<Arc<Mutex<Workbench>>> {
        self.peers.write().await.remove(name)
    }

    pub async fn processes(&self) -> Vec<String> {
        let mut names: Vec<String> = self.peers.read().await.keys().cloned().collect();
        names.sort();
        names
    }
}

#[async_trait]
impl Transport for LocalTransport {
    async fn send(&self, target: &str, frame: Vec<u8>) -> WorkbenchResult<Vec<u8>> {
        let peer = self
            .peers
            .read()
            .await
            .get(target)
            .cloned()
            .ok_or_else(|| WorkbenchError::UnknownProcess(target.to_string()))?;
        let mut peer = peer.lock().await;
        Ok(peer.handle_frame(&frame))
    }
}
