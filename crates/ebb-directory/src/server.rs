//! Directory server representative.

use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, warn};

use ebb_future::{ExecutorRef, Failure, Future, Launch};
use ebb_runtime::{Context, MessageHandler, Representative, Transport};
use ebb_types::{EbbId, Location};

use crate::codec::DirectoryCodec;
use crate::error::DirectoryError;
use crate::global::GlobalIdMap;
use crate::message::{DirectoryMessage, WireError};

/// Answers directory requests from other locations out of a local
/// [`GlobalIdMap`].
///
/// Replies are addressed to the same Ebb identifier at the requesting
/// location.
pub struct DirectoryServer {
    id: EbbId,
    map: Arc<dyn GlobalIdMap>,
}

impl DirectoryServer {
    /// Serve requests addressed to `id` out of `map`.
    pub fn new(id: EbbId, map: Arc<dyn GlobalIdMap>) -> Self {
        Self { id, map }
    }

    /// The directory this server answers from.
    pub fn map(&self) -> &Arc<dyn GlobalIdMap> {
        &self.map
    }

    fn answer(
        &self,
        ctx: &Context,
        transport: Arc<dyn Transport>,
        to: Location,
        request: DirectoryMessage,
    ) {
        let request_id = request.request_id();
        let reply_to = self.id;
        let reply = move |result: Result<DirectoryMessage, Failure>| {
            let message = result.unwrap_or_else(|failure| DirectoryMessage::Failed {
                request_id,
                error: match failure.downcast_ref::<DirectoryError>() {
                    Some(e) => WireError::from(e),
                    None => WireError::Other(failure.to_string()),
                },
            });
            let sent = DirectoryCodec::encode(&message)
                .map_err(Failure::new)
                .and_then(|frame| {
                    transport
                        .send(to, reply_to, Bytes::from(frame))
                        .map_err(Failure::new)
                });
            if let Err(e) = sent {
                warn!(%to, request_id, error = %e, "directory reply lost");
            }
        };

        let exec = ctx.executor();
        match request {
            DirectoryMessage::Get { id, path, .. } => {
                respond(self.map.get(id, &path), &exec, reply, move |value| {
                    DirectoryMessage::Value { request_id, value }
                })
            }
            DirectoryMessage::Set { id, path, value, .. } => {
                respond(self.map.set(id, value, &path), &exec, reply, move |()| {
                    DirectoryMessage::Stored { request_id }
                })
            }
            DirectoryMessage::List { id, path, .. } => {
                respond(self.map.list(id, &path), &exec, reply, move |names| {
                    DirectoryMessage::Children { request_id, names }
                })
            }
            DirectoryMessage::Exists { id, path, .. } => {
                respond(self.map.exists(id, &path), &exec, reply, move |exists| {
                    DirectoryMessage::Found { request_id, exists }
                })
            }
            other => warn!(kind = other.type_name(), "reply sent to directory server"),
        }
    }
}

/// Reply once `future` settles.
fn respond<T, W, R>(future: Future<T>, exec: &ExecutorRef, reply: R, wrap: W)
where
    T: Send + 'static,
    W: FnOnce(T) -> DirectoryMessage + Send + 'static,
    R: FnOnce(Result<DirectoryMessage, Failure>) + Send + 'static,
{
    let _done = future.then(exec, Launch::Sync, move |settled| reply(settled.get().map(wrap)));
}

impl Representative for DirectoryServer {
    fn message_handler(&self) -> Option<&dyn MessageHandler> {
        Some(self)
    }
}

impl MessageHandler for DirectoryServer {
    fn receive_message(&self, ctx: &Context, from: Location, payload: Bytes) {
        let request = match DirectoryCodec::decode(&payload) {
            Ok((message, _)) => message,
            Err(e) => {
                warn!(%from, error = %e, "undecodable directory request");
                return;
            }
        };
        let Some(transport) = ctx.runtime().transport().cloned() else {
            warn!(%from, "directory server has no transport to reply on");
            return;
        };
        debug!(%from, kind = request.type_name(), request_id = request.request_id(), "directory request");
        self.answer(ctx, transport, from, request);
    }
}
