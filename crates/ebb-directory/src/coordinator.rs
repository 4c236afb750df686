//! Hierarchical coordination service used to back the global directory.
//!
//! The interface follows a ZooKeeper-style znode tree: nodes are addressed by
//! absolute `/`-separated paths, carry a byte payload and a version, and can
//! be watched. [`InMemoryCoordinator`] implements it inside one process.

use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};

use tokio::sync::broadcast;
use tracing::debug;

use ebb_future::{make_failed, make_ready, Future};

use crate::error::DirectoryError;
use crate::watch::{ChangeKind, NodeEvent, WatchRouter};

/// A node's payload and version. Versions start at 0 on creation and grow by
/// one on every write.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NodeData {
    pub data: Vec<u8>,
    pub version: u64,
}

/// Client of a hierarchical coordination service.
///
/// Failures are carried by the returned futures as [`DirectoryError`]s.
pub trait CoordinationService: Send + Sync {
    /// Create `node`; fails with `NodeExists` if present or `NoNode` if its
    /// parent is missing.
    fn create(&self, node: &str, data: Vec<u8>) -> Future<()>;

    /// Read `node`; fails with `NoNode` if absent.
    fn get(&self, node: &str) -> Future<NodeData>;

    /// Write `node`, creating it and any missing parents. Resolves to the new
    /// version.
    fn set(&self, node: &str, data: Vec<u8>) -> Future<u64>;

    /// Names of the direct children of `node`, sorted.
    fn children(&self, node: &str) -> Future<Vec<String>>;

    fn exists(&self, node: &str) -> Future<bool>;

    /// Events for `node` and everything below it.
    fn subscribe(&self, node: &str) -> broadcast::Receiver<NodeEvent>;
}

fn parent_of(node: &str) -> Option<&str> {
    match node.rfind('/') {
        Some(0) if node.len() > 1 => Some("/"),
        Some(0) | None => None,
        Some(i) => Some(&node[..i]),
    }
}

fn check_node(node: &str) -> Result<(), DirectoryError> {
    let well_formed = node.starts_with('/')
        && (node == "/" || !node.ends_with('/'))
        && !node.contains("//");
    if well_formed {
        Ok(())
    } else {
        Err(DirectoryError::InvalidPath {
            path: node.to_string(),
            reason: "not an absolute node path".into(),
        })
    }
}

/// In-process coordination service.
///
/// The whole tree lives in a `BTreeMap` keyed by node path behind a
/// `RwLock`; the root node `/` always exists. Writes are applied and their
/// events broadcast in lock order, so concurrent writers resolve as last
/// write wins and watchers observe the same order.
pub struct InMemoryCoordinator {
    nodes: RwLock<BTreeMap<String, NodeData>>,
    router: WatchRouter,
}

impl Default for InMemoryCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryCoordinator {
    /// An empty tree holding only the root node.
    pub fn new() -> Self {
        let mut nodes = BTreeMap::new();
        nodes.insert(
            "/".to_string(),
            NodeData {
                data: Vec::new(),
                version: 0,
            },
        );
        Self {
            nodes: RwLock::new(nodes),
            router: WatchRouter::new(),
        }
    }

    /// Number of nodes, including the root.
    pub fn len(&self) -> usize {
        self.nodes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn write(&self, node: &str, data: Vec<u8>, exclusive: bool) -> Result<u64, DirectoryError> {
        check_node(node)?;
        let mut events = Vec::new();
        let version = {
            let mut nodes = self.nodes.write().unwrap_or_else(PoisonError::into_inner);
            if exclusive {
                if nodes.contains_key(node) {
                    return Err(DirectoryError::NodeExists(node.to_string()));
                }
                if let Some(parent) = parent_of(node).filter(|p| !nodes.contains_key(*p)) {
                    return Err(DirectoryError::NoNode(parent.to_string()));
                }
            }
            let mut missing = Vec::new();
            let mut cursor = parent_of(node);
            while let Some(parent) = cursor {
                if nodes.contains_key(parent) {
                    break;
                }
                missing.push(parent.to_string());
                cursor = parent_of(parent);
            }
            for parent in missing.into_iter().rev() {
                nodes.insert(
                    parent.clone(),
                    NodeData {
                        data: Vec::new(),
                        version: 0,
                    },
                );
                events.push(NodeEvent {
                    node: parent,
                    kind: ChangeKind::Created,
                    version: 0,
                });
            }
            let (kind, version) = match nodes.get_mut(node) {
                Some(existing) => {
                    existing.data = data;
                    existing.version += 1;
                    (ChangeKind::Changed, existing.version)
                }
                None => {
                    nodes.insert(node.to_string(), NodeData { data, version: 0 });
                    (ChangeKind::Created, 0)
                }
            };
            events.push(NodeEvent {
                node: node.to_string(),
                kind,
                version,
            });
            // Routed under the write lock so watchers see versions in order.
            for event in &events {
                self.router.route(event);
            }
            version
        };
        debug!(node, version, "node written");
        Ok(version)
    }

    fn read(&self, node: &str) -> Result<NodeData, DirectoryError> {
        check_node(node)?;
        self.nodes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(node)
            .cloned()
            .ok_or_else(|| DirectoryError::NoNode(node.to_string()))
    }

    fn child_names(&self, node: &str) -> Result<Vec<String>, DirectoryError> {
        check_node(node)?;
        let nodes = self.nodes.read().unwrap_or_else(PoisonError::into_inner);
        if !nodes.contains_key(node) {
            return Err(DirectoryError::NoNode(node.to_string()));
        }
        let prefix = if node == "/" {
            "/".to_string()
        } else {
            format!("{node}/")
        };
        Ok(nodes
            .range(prefix.clone()..)
            .take_while(|(path, _)| path.starts_with(&prefix))
            .filter_map(|(path, _)| {
                let rest = &path[prefix.len()..];
                (!rest.is_empty() && !rest.contains('/')).then(|| rest.to_string())
            })
            .collect())
    }
}

fn settle<T>(result: Result<T, DirectoryError>) -> Future<T> {
    match result {
        Ok(value) => make_ready(value),
        Err(e) => make_failed(e),
    }
}

impl CoordinationService for InMemoryCoordinator {
    fn create(&self, node: &str, data: Vec<u8>) -> Future<()> {
        settle(self.write(node, data, true).map(|_| ()))
    }

    fn get(&self, node: &str) -> Future<NodeData> {
        settle(self.read(node))
    }

    fn set(&self, node: &str, data: Vec<u8>) -> Future<u64> {
        settle(self.write(node, data, false))
    }

    fn children(&self, node: &str) -> Future<Vec<String>> {
        settle(self.child_names(node))
    }

    fn exists(&self, node: &str) -> Future<bool> {
        settle(check_node(node).map(|()| {
            self.nodes
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .contains_key(node)
        }))
    }

    fn subscribe(&self, node: &str) -> broadcast::Receiver<NodeEvent> {
        self.router.subscribe(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_creates_missing_parents() {
        let zk = InMemoryCoordinator::new();
        assert_eq!(zk.set("/a/b/c", b"v".to_vec()).get().unwrap(), 0);
        assert!(zk.exists("/a").get().unwrap());
        assert!(zk.exists("/a/b").get().unwrap());
        assert_eq!(zk.get("/a/b/c").get().unwrap().data, b"v");
        assert_eq!(zk.len(), 4);
    }

    #[test]
    fn set_bumps_version_and_last_write_wins() {
        let zk = InMemoryCoordinator::new();
        zk.set("/k", b"one".to_vec()).get().unwrap();
        assert_eq!(zk.set("/k", b"two".to_vec()).get().unwrap(), 1);
        let node = zk.get("/k").get().unwrap();
        assert_eq!(node, NodeData { data: b"two".to_vec(), version: 1 });
    }

    #[test]
    fn create_is_exclusive_and_needs_parent() {
        let zk = InMemoryCoordinator::new();
        zk.create("/x", Vec::new()).get().unwrap();
        let again = zk.create("/x", Vec::new()).get().unwrap_err();
        assert!(matches!(again.downcast_ref::<DirectoryError>(), Some(DirectoryError::NodeExists(_))));
        let orphan = zk.create("/y/z", Vec::new()).get().unwrap_err();
        assert!(matches!(orphan.downcast_ref::<DirectoryError>(), Some(DirectoryError::NoNode(p)) if p == "/y"));
    }

    #[test]
    fn missing_node_fails() {
        let zk = InMemoryCoordinator::new();
        let err = zk.get("/nope").get().unwrap_err();
        assert!(err.is::<DirectoryError>());
        assert!(!zk.exists("/nope").get().unwrap());
        assert!(zk.children("/nope").get().is_err());
    }

    #[test]
    fn children_are_direct_and_sorted() {
        let zk = InMemoryCoordinator::new();
        for node in ["/p/b", "/p/a", "/p/a/deep", "/pq"] {
            zk.set(node, Vec::new()).get().unwrap();
        }
        assert_eq!(zk.children("/p").get().unwrap(), vec!["a", "b"]);
        assert_eq!(zk.children("/").get().unwrap(), vec!["p", "pq"]);
    }

    #[test]
    fn malformed_node_paths_are_rejected() {
        let zk = InMemoryCoordinator::new();
        for node in ["relative", "/trailing/", "/a//b"] {
            assert!(zk.set(node, Vec::new()).get().is_err(), "{node}");
        }
    }

    #[test]
    fn writes_notify_subscribers() {
        let zk = InMemoryCoordinator::new();
        let mut rx = zk.subscribe("/w");
        zk.set("/w/x", b"1".to_vec()).get().unwrap();
        zk.set("/w/x", b"2".to_vec()).get().unwrap();
        let events: Vec<_> = std::iter::from_fn(|| rx.try_recv().ok()).collect();
        let summary: Vec<_> = events.iter().map(|e| (e.node.as_str(), e.kind)).collect();
        assert_eq!(
            summary,
            vec![
                ("/w", ChangeKind::Created),
                ("/w/x", ChangeKind::Created),
                ("/w/x", ChangeKind::Changed),
            ]
        );
    }

    #[test]
    fn racing_writers_notify_in_version_order() {
        let zk = std::sync::Arc::new(InMemoryCoordinator::new());
        zk.set("/race", Vec::new()).get().unwrap();
        let mut rx = zk.subscribe("/race");

        let writers: Vec<_> = (0..8)
            .map(|w| {
                let zk = std::sync::Arc::clone(&zk);
                std::thread::spawn(move || {
                    for i in 0..20 {
                        zk.set("/race", format!("{w}-{i}").into_bytes()).get().unwrap();
                    }
                })
            })
            .collect();
        for writer in writers {
            writer.join().unwrap();
        }

        let versions: Vec<u64> = std::iter::from_fn(|| rx.try_recv().ok())
            .map(|event| event.version)
            .collect();
        assert_eq!(versions, (1..=160).collect::<Vec<_>>());
        assert_eq!(zk.get("/race").get().unwrap().version, 160);
    }
}
