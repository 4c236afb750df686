//! [`GlobalIdMap`] stored in a coordination service.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::debug;

use ebb_future::{make_failed, ExecutorRef, Failure, Future, Launch};
use ebb_runtime::RuntimeConfig;
use ebb_types::EbbId;

use crate::coordinator::CoordinationService;
use crate::error::{DirectoryError, Result};
use crate::global::GlobalIdMap;
use crate::path::{id_node, node_path, validate_path};
use crate::watch::WatchStream;

/// Directory whose entries live at `/<id>[/<path>]` in a coordination service.
pub struct CoordinatedIdMap<C> {
    coordinator: Arc<C>,
    executor: ExecutorRef,
    path_cache: Option<Mutex<HashMap<EbbId, String>>>,
}

impl<C: CoordinationService> CoordinatedIdMap<C> {
    /// Continuations on pending coordinator replies run on `executor`.
    pub fn new(coordinator: Arc<C>, executor: ExecutorRef, config: &RuntimeConfig) -> Self {
        Self {
            coordinator,
            executor,
            path_cache: config
                .directory_path_cache
                .then(|| Mutex::new(HashMap::new())),
        }
    }

    /// The coordination service entries are stored in.
    pub fn coordinator(&self) -> &Arc<C> {
        &self.coordinator
    }

    fn id_node(&self, id: EbbId) -> String {
        match &self.path_cache {
            Some(cache) => cache
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .entry(id)
                .or_insert_with(|| id_node(id))
                .clone(),
            None => id_node(id),
        }
    }

    fn node(&self, id: EbbId, path: &str) -> Result<String> {
        validate_path(path)?;
        Ok(node_path(&self.id_node(id), path))
    }

    /// Number of cached identifier nodes.
    pub fn cached_paths(&self) -> usize {
        self.path_cache.as_ref().map_or(0, |cache| {
            cache.lock().unwrap_or_else(PoisonError::into_inner).len()
        })
    }
}

/// Turn a coordinator `NoNode` into the directory's `NotFound`.
fn not_found(id: EbbId, path: &str) -> impl FnOnce(Failure) -> Failure {
    let path = path.to_string();
    move |failure| match failure.downcast_ref::<DirectoryError>() {
        Some(DirectoryError::NoNode(_)) => Failure::new(DirectoryError::NotFound { id, path }),
        _ => failure,
    }
}

impl<C: CoordinationService> GlobalIdMap for CoordinatedIdMap<C> {
    fn get(&self, id: EbbId, path: &str) -> Future<String> {
        let node = match self.node(id, path) {
            Ok(node) => node,
            Err(e) => return make_failed(e),
        };
        debug!(%id, path, "directory get");
        let missing = not_found(id, path);
        self.coordinator
            .get(&node)
            .then_try(&self.executor, Launch::Sync, move |reply| {
                let data = reply.get().map_err(missing)?.data;
                String::from_utf8(data).map_err(|_| DirectoryError::InvalidValue(node).into())
            })
    }

    fn set(&self, id: EbbId, value: String, path: &str) -> Future<()> {
        let node = match self.node(id, path) {
            Ok(node) => node,
            Err(e) => return make_failed(e),
        };
        debug!(%id, path, len = value.len(), "directory set");
        self.coordinator
            .set(&node, value.into_bytes())
            .map(&self.executor, |_version| ())
    }

    fn list(&self, id: EbbId, path: &str) -> Future<Vec<String>> {
        let node = match self.node(id, path) {
            Ok(node) => node,
            Err(e) => return make_failed(e),
        };
        debug!(%id, path, "directory list");
        let missing = not_found(id, path);
        self.coordinator
            .children(&node)
            .then_try(&self.executor, Launch::Sync, move |reply| reply.get().map_err(missing))
    }

    fn exists(&self, id: EbbId, path: &str) -> Future<bool> {
        match self.node(id, path) {
            Ok(node) => self.coordinator.exists(&node),
            Err(e) => make_failed(e),
        }
    }

    fn watch(&self, id: EbbId, path: &str) -> Result<WatchStream> {
        let node = self.node(id, path)?;
        debug!(%id, path, "directory watch");
        Ok(WatchStream::new(
            id,
            self.id_node(id),
            self.coordinator.subscribe(&node),
        ))
    }
}
