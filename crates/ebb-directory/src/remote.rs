//! Directory client forwarding every operation to a [`DirectoryServer`].
//!
//! [`DirectoryServer`]: crate::DirectoryServer

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use bytes::Bytes;
use tracing::{debug, warn};

use ebb_future::{make_failed, Future, Promise};
use ebb_runtime::{Context, EbbError, MessageHandler, Representative, Transport};
use ebb_types::{EbbId, Location};

use crate::codec::DirectoryCodec;
use crate::error::{DirectoryError, Result};
use crate::global::GlobalIdMap;
use crate::message::DirectoryMessage;
use crate::path::validate_path;
use crate::watch::WatchStream;

/// A request awaiting its reply, by expected reply kind.
enum Pending {
    Value(Promise<String>),
    Stored(Promise<()>),
    Children(Promise<Vec<String>>),
    Found(Promise<bool>),
}

impl Pending {
    fn fail(self, error: DirectoryError) {
        match self {
            Pending::Value(p) => p.set_failure(error),
            Pending::Stored(p) => p.set_failure(error),
            Pending::Children(p) => p.set_failure(error),
            Pending::Found(p) => p.set_failure(error),
        }
    }

    fn complete(self, reply: DirectoryMessage) {
        match (self, reply) {
            (Pending::Value(p), DirectoryMessage::Value { value, .. }) => p.set_value(value),
            (Pending::Stored(p), DirectoryMessage::Stored { .. }) => p.set_value(()),
            (Pending::Children(p), DirectoryMessage::Children { names, .. }) => p.set_value(names),
            (Pending::Found(p), DirectoryMessage::Found { exists, .. }) => p.set_value(exists),
            (pending, DirectoryMessage::Failed { error, .. }) => pending.fail(error.into()),
            (pending, other) => pending.fail(DirectoryError::Remote(format!(
                "unexpected {} reply",
                other.type_name()
            ))),
        }
    }
}

/// Client-side [`GlobalIdMap`] that asks the server at another location.
///
/// Requests are matched to replies by request id. If a request cannot be
/// sent, or [`fail_pending`](Self::fail_pending) is called because the
/// server is known to be gone, the affected futures fail with
/// [`DirectoryError::Remote`]. Watches are not forwarded.
pub struct RemoteIdMap {
    id: EbbId,
    server: Location,
    transport: Arc<dyn Transport>,
    next_request: AtomicU64,
    pending: Mutex<HashMap<u64, Pending>>,
}

impl RemoteIdMap {
    /// A client of the directory Ebb `id` served at `server`.
    pub fn new(id: EbbId, server: Location, transport: Arc<dyn Transport>) -> Self {
        Self {
            id,
            server,
            transport,
            next_request: AtomicU64::new(1),
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// A client using `ctx`'s transport.
    pub fn for_context(ctx: &Context, id: EbbId, server: Location) -> Result<Self> {
        let transport = ctx
            .runtime()
            .transport()
            .cloned()
            .ok_or(EbbError::NoTransport)?;
        Ok(Self::new(id, server, transport))
    }

    /// Location of the [`DirectoryServer`](crate::DirectoryServer) requests go to.
    pub fn server(&self) -> Location {
        self.server
    }

    /// Number of requests awaiting a reply.
    pub fn in_flight(&self) -> usize {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Fail every outstanding request. Returns how many were failed.
    pub fn fail_pending(&self, reason: &str) -> usize {
        let drained: Vec<Pending> = self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain()
            .map(|(_, pending)| pending)
            .collect();
        let count = drained.len();
        for pending in drained {
            pending.fail(DirectoryError::Remote(reason.to_string()));
        }
        if count > 0 {
            warn!(server = %self.server, count, reason, "pending directory requests failed");
        }
        count
    }

    fn request<T>(
        &self,
        path: &str,
        build: impl FnOnce(u64) -> DirectoryMessage,
        pending: impl FnOnce(Promise<T>) -> Pending,
    ) -> Future<T>
    where
        T: Send + 'static,
    {
        if let Err(e) = validate_path(path) {
            return make_failed(e);
        }
        let request_id = self.next_request.fetch_add(1, Ordering::Relaxed);
        let message = build(request_id);
        let frame = match DirectoryCodec::encode(&message) {
            Ok(frame) => frame,
            Err(e) => return make_failed(e),
        };

        let promise = Promise::new();
        let future = promise.get_future();
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(request_id, pending(promise));
        debug!(server = %self.server, request_id, kind = message.type_name(), "directory request sent");

        if let Err(e) = self.transport.send(self.server, self.id, Bytes::from(frame)) {
            let taken = self
                .pending
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&request_id);
            if let Some(pending) = taken {
                pending.fail(DirectoryError::Remote(e.to_string()));
            }
        }
        future
    }
}

impl GlobalIdMap for RemoteIdMap {
    fn get(&self, id: EbbId, path: &str) -> Future<String> {
        let path_owned = path.to_string();
        self.request(
            path,
            |request_id| DirectoryMessage::Get {
                request_id,
                id,
                path: path_owned,
            },
            Pending::Value,
        )
    }

    fn set(&self, id: EbbId, value: String, path: &str) -> Future<()> {
        let path_owned = path.to_string();
        self.request(
            path,
            |request_id| DirectoryMessage::Set {
                request_id,
                id,
                path: path_owned,
                value,
            },
            Pending::Stored,
        )
    }

    fn list(&self, id: EbbId, path: &str) -> Future<Vec<String>> {
        let path_owned = path.to_string();
        self.request(
            path,
            |request_id| DirectoryMessage::List {
                request_id,
                id,
                path: path_owned,
            },
            Pending::Children,
        )
    }

    fn exists(&self, id: EbbId, path: &str) -> Future<bool> {
        let path_owned = path.to_string();
        self.request(
            path,
            |request_id| DirectoryMessage::Exists {
                request_id,
                id,
                path: path_owned,
            },
            Pending::Found,
        )
    }

    fn watch(&self, _id: EbbId, _path: &str) -> Result<WatchStream> {
        Err(DirectoryError::Unsupported("watch through a remote directory"))
    }
}

impl Representative for RemoteIdMap {
    fn message_handler(&self) -> Option<&dyn MessageHandler> {
        Some(self)
    }
}

impl MessageHandler for RemoteIdMap {
    fn receive_message(&self, _ctx: &Context, from: Location, payload: Bytes) {
        let reply = match DirectoryCodec::decode(&payload) {
            Ok((message, _)) => message,
            Err(e) => {
                warn!(%from, error = %e, "undecodable directory reply");
                return;
            }
        };
        if reply.is_request() {
            warn!(%from, kind = reply.type_name(), "request sent to directory client");
            return;
        }
        let request_id = reply.request_id();
        let pending = self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&request_id);
        match pending {
            Some(pending) => pending.complete(reply),
            None => warn!(%from, request_id, "reply for unknown request"),
        }
    }
}
