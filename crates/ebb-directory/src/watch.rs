//! Change notification for directory nodes.

use std::fmt;
use std::sync::{PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::trace;

use ebb_types::EbbId;

use crate::error::{DirectoryError, Result};
use crate::path::relative_to;

/// Capacity of each watcher's broadcast channel.
pub const WATCH_CHANNEL_CAPACITY: usize = 256;

/// What happened to a node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeKind {
    Created,
    Changed,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Changed => write!(f, "changed"),
        }
    }
}

/// A change to one coordination-service node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NodeEvent {
    pub node: String,
    pub kind: ChangeKind,
    pub version: u64,
}

/// A change below a watched identifier, relative to its node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WatchEvent {
    pub id: EbbId,
    pub path: String,
    pub kind: ChangeKind,
}

struct Subscriber {
    prefix: String,
    sender: broadcast::Sender<NodeEvent>,
}

impl Subscriber {
    fn matches(&self, node: &str) -> bool {
        relative_to(&self.prefix, node).is_some()
    }
}

/// Fan-out router delivering node events to subscribers by path prefix.
pub struct WatchRouter {
    subscribers: RwLock<Vec<Subscriber>>,
}

impl Default for WatchRouter {
    fn default() -> Self {
        Self::new()
    }
}

impl WatchRouter {
    pub fn new() -> Self {
        Self {
            subscribers: RwLock::new(Vec::new()),
        }
    }

    /// Receive events for `prefix` and every node below it.
    pub fn subscribe(&self, prefix: &str) -> broadcast::Receiver<NodeEvent> {
        let (tx, rx) = broadcast::channel(WATCH_CHANNEL_CAPACITY);
        self.subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Subscriber {
                prefix: prefix.to_string(),
                sender: tx,
            });
        rx
    }

    /// Route an event to matching subscribers, pruning dropped ones.
    pub fn route(&self, event: &NodeEvent) {
        let mut subs = self
            .subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        subs.retain(|sub| {
            if sub.matches(&event.node) {
                sub.sender.send(event.clone()).is_ok()
            } else {
                sub.sender.receiver_count() > 0
            }
        });
        trace!(node = %event.node, kind = %event.kind, watchers = subs.len(), "node event routed");
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// Stream of changes at and below one identifier's node.
pub struct WatchStream {
    id: EbbId,
    id_node: String,
    receiver: broadcast::Receiver<NodeEvent>,
}

impl WatchStream {
    pub(crate) fn new(id: EbbId, id_node: String, receiver: broadcast::Receiver<NodeEvent>) -> Self {
        Self {
            id,
            id_node,
            receiver,
        }
    }

    /// The identifier being watched.
    pub fn id(&self) -> EbbId {
        self.id
    }

    fn translate(&self, event: NodeEvent) -> Option<WatchEvent> {
        relative_to(&self.id_node, &event.node).map(|path| WatchEvent {
            id: self.id,
            path: path.to_string(),
            kind: event.kind,
        })
    }

    /// Next buffered event, without waiting.
    pub fn try_next(&mut self) -> Result<Option<WatchEvent>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if let Some(event) = self.translate(event) {
                        return Ok(Some(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => return Ok(None),
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Err(DirectoryError::WatchLagged(n))
                }
                Err(broadcast::error::TryRecvError::Closed) => {
                    return Err(DirectoryError::WatchClosed)
                }
            }
        }
    }

    /// Wait for the next event.
    pub async fn next(&mut self) -> Result<WatchEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => {
                    if let Some(event) = self.translate(event) {
                        return Ok(event);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    return Err(DirectoryError::WatchLagged(n))
                }
                Err(broadcast::error::RecvError::Closed) => return Err(DirectoryError::WatchClosed),
            }
        }
    }
}

impl fmt::Debug for WatchStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchStream")
            .field("id", &self.id)
            .field("node", &self.id_node)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(node: &str, kind: ChangeKind) -> NodeEvent {
        NodeEvent {
            node: node.to_string(),
            kind,
            version: 1,
        }
    }

    #[test]
    fn routes_by_prefix() {
        let router = WatchRouter::new();
        let mut seven = router.subscribe("/7");
        let mut eight = router.subscribe("/8");
        router.route(&event("/7/a", ChangeKind::Created));
        router.route(&event("/70", ChangeKind::Created));
        assert_eq!(seven.try_recv().unwrap().node, "/7/a");
        assert!(seven.try_recv().is_err());
        assert!(eight.try_recv().is_err());
    }

    #[test]
    fn dropped_subscribers_are_pruned() {
        let router = WatchRouter::new();
        let rx = router.subscribe("/1");
        let _keep = router.subscribe("/2");
        assert_eq!(router.subscriber_count(), 2);
        drop(rx);
        router.route(&event("/1", ChangeKind::Changed));
        assert_eq!(router.subscriber_count(), 1);
    }

    #[test]
    fn stream_reports_relative_paths() {
        let router = WatchRouter::new();
        let id = EbbId::new(0, 7);
        let mut stream = WatchStream::new(id, "/7".into(), router.subscribe("/7"));
        router.route(&event("/7", ChangeKind::Created));
        router.route(&event("/7/cfg", ChangeKind::Changed));
        assert_eq!(
            stream.try_next().unwrap(),
            Some(WatchEvent {
                id,
                path: String::new(),
                kind: ChangeKind::Created
            })
        );
        assert_eq!(stream.try_next().unwrap().unwrap().path, "cfg");
        assert_eq!(stream.try_next().unwrap(), None);
    }

    #[test]
    fn stream_closes_with_router() {
        let router = WatchRouter::new();
        let mut stream = WatchStream::new(EbbId::new(0, 1), "/1".into(), router.subscribe("/1"));
        drop(router);
        assert!(matches!(stream.try_next(), Err(DirectoryError::WatchClosed)));
    }
}
