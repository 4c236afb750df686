//! Message transport between locations.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use bytes::Bytes;
use tracing::{trace, warn};

use ebb_future::{Executor, ExecutorRef, Task};
use ebb_types::{EbbId, Location};

use crate::context::Context;
use crate::error::{EbbError, Result};

/// Sends `(identifier, payload)` messages to other locations.
///
/// Incoming messages are handed to [`Runtime::deliver`](crate::Runtime::deliver)
/// by whoever drives the receiving side.
pub trait Transport: Send + Sync {
    /// Fails with [`EbbError::RemoteFailure`] when `to` is unreachable.
    fn send(&self, to: Location, id: EbbId, payload: Bytes) -> Result<()>;

    /// Wake `waker` whenever a message for this endpoint's location arrives,
    /// by spawning a task on it. Transports that deliver by themselves can
    /// ignore this.
    fn register_waker(&self, _waker: &ExecutorRef) {}

    /// Deliver messages already queued for `ctx`'s location. Returns how many
    /// were delivered.
    fn poll(&self, _ctx: &Context) -> usize {
        0
    }
}

/// A message in flight.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Envelope {
    pub from: Location,
    pub to: Location,
    pub id: EbbId,
    pub payload: Bytes,
}

/// Loopback network joining several runtimes inside one process.
///
/// Messages queue until the receiving side calls [`pump`](Self::pump), or
/// until a context at the destination polls its transport while blocked in
/// [`Context::block_on`]. Every enqueue wakes the event loops registered for
/// the destination. Locations can be cut off with
/// [`partition`](Self::partition) to simulate unreachable machines.
#[derive(Default)]
pub struct InProcessNetwork {
    queue: Mutex<VecDeque<Envelope>>,
    partitioned: Mutex<HashSet<Location>>,
    wakers: Mutex<HashMap<Location, Vec<Weak<dyn Executor>>>>,
}

impl InProcessNetwork {
    /// A network with no endpoints and nothing in flight.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// A transport sending from `location`.
    pub fn endpoint(self: &Arc<Self>, location: Location) -> Arc<dyn Transport> {
        Arc::new(Endpoint {
            network: Arc::clone(self),
            from: location,
        })
    }

    /// Drop every message sent to `location` until [`heal`](Self::heal).
    pub fn partition(&self, location: Location) {
        self.partitioned
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(location);
    }

    /// Deliver to `location` again.
    pub fn heal(&self, location: Location) {
        self.partitioned
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&location);
    }

    fn is_partitioned(&self, location: Location) -> bool {
        self.partitioned
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&location)
    }

    fn register_waker(&self, location: Location, waker: &ExecutorRef) {
        self.wakers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(location)
            .or_default()
            .push(Arc::downgrade(waker));
    }

    /// Spawn an empty task on every live loop registered for `location`, so a
    /// context parked in `block_on` gets to poll its transport.
    fn wake(&self, location: Location) {
        let live: Vec<ExecutorRef> = {
            let mut wakers = self.wakers.lock().unwrap_or_else(PoisonError::into_inner);
            let Some(registered) = wakers.get_mut(&location) else {
                return;
            };
            registered.retain(|waker| waker.strong_count() > 0);
            registered.iter().filter_map(Weak::upgrade).collect()
        };
        for waker in live {
            let task: Task = Box::new(|| {});
            waker.spawn(task);
        }
    }

    /// Number of undelivered messages.
    pub fn in_flight(&self) -> usize {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    fn take_for(&self, location: Location) -> Option<Envelope> {
        let mut queue = self.queue.lock().unwrap_or_else(PoisonError::into_inner);
        let index = queue.iter().position(|m| m.to == location)?;
        queue.remove(index)
    }

    /// Deliver every queued message addressed to `ctx`'s location, including
    /// ones sent while pumping. Returns how many were delivered.
    pub fn pump(&self, ctx: &Context) -> usize {
        let mut delivered = 0;
        while let Some(envelope) = self.take_for(ctx.location()) {
            let Envelope { from, id, payload, .. } = envelope;
            match ctx.runtime().deliver(ctx, from, id, payload) {
                Ok(()) => delivered += 1,
                Err(e) => warn!(%from, %id, error = %e, "dropping undeliverable message"),
            }
        }
        delivered
    }
}

struct Endpoint {
    network: Arc<InProcessNetwork>,
    from: Location,
}

impl Transport for Endpoint {
    fn send(&self, to: Location, id: EbbId, payload: Bytes) -> Result<()> {
        if self.network.is_partitioned(to) || self.network.is_partitioned(self.from) {
            return Err(EbbError::RemoteFailure {
                id,
                location: to,
                cause: "location unreachable".into(),
            });
        }
        trace!(from = %self.from, %to, %id, len = payload.len(), "message queued");
        self.network
            .queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(Envelope {
                from: self.from,
                to,
                id,
                payload,
            });
        self.network.wake(to);
        Ok(())
    }

    fn register_waker(&self, waker: &ExecutorRef) {
        self.network.register_waker(self.from, waker);
    }

    fn poll(&self, ctx: &Context) -> usize {
        self.network.pump(ctx)
    }
}
