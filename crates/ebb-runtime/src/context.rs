//! Execution contexts and their translation caches.

use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use tracing::trace;

use ebb_future::{EventLoop, ExecutorRef, Failure, Future};
use ebb_types::{ContextId, EbbId, Location};

use crate::error::Result;
use crate::manager::EbbManager;
use crate::representative::{RepRef, WeakRep};
use crate::runtime::Runtime;

/// One cooperative execution context.
///
/// A context is driven by a single thread at a time, so it is `Send` but not
/// `Sync`; its translation cache is read and filled without locking. Every
/// resolution and dispatch call takes the context explicitly.
pub struct Context {
    id: ContextId,
    runtime: Arc<Runtime>,
    event_loop: Arc<EventLoop>,
    cache: RefCell<HashMap<EbbId, WeakRep>>,
    manager: EbbManager,
}

impl Context {
    pub(crate) fn new(runtime: Arc<Runtime>, id: ContextId) -> Self {
        let manager = EbbManager::new(Arc::clone(&runtime), id);
        Self {
            id,
            runtime,
            event_loop: EventLoop::new(),
            cache: RefCell::new(HashMap::new()),
            manager,
        }
    }

    /// Index of this context within its runtime.
    pub fn id(&self) -> ContextId {
        self.id
    }

    /// Location of the owning runtime.
    pub fn location(&self) -> Location {
        self.runtime.location()
    }

    /// The runtime this context was created from.
    pub fn runtime(&self) -> &Arc<Runtime> {
        &self.runtime
    }

    /// The cooperative loop this context pumps.
    pub fn event_loop(&self) -> &Arc<EventLoop> {
        &self.event_loop
    }

    /// Handle for spawning onto this context's loop.
    pub fn executor(&self) -> ExecutorRef {
        self.event_loop.executor()
    }

    /// This context's identifier allocator.
    pub fn manager(&self) -> &EbbManager {
        &self.manager
    }

    /// Resolve `id` to its representative for this context.
    pub fn resolve(&self, id: EbbId) -> Result<RepRef> {
        self.runtime.resolve(self, id)
    }

    /// Send `payload` to the Ebb `id` at location `to`.
    pub fn send(&self, to: Location, id: EbbId, payload: Bytes) -> Result<()> {
        self.runtime.send(to, id, payload)
    }

    /// Pump this context until `future` is terminal.
    ///
    /// Besides running queued tasks, the wait delivers messages the transport
    /// holds for this location, so a future completed by a remote reply
    /// settles while the caller is blocked.
    pub fn block_on<T>(&self, future: Future<T>) -> std::result::Result<T, Failure>
    where
        T: Send + 'static,
    {
        let transport = self.runtime.transport().cloned();
        self.event_loop.block_on_polling(future, || {
            transport.as_ref().map_or(0, |transport| transport.poll(self))
        })
    }

    /// Translation cache lookup.
    pub fn cached(&self, id: EbbId) -> Option<RepRef> {
        self.cache.borrow().get(&id).and_then(WeakRep::upgrade)
    }

    /// Install a mapping in the translation cache. An existing live entry
    /// wins over `rep`.
    pub(crate) fn install(&self, id: EbbId, rep: RepRef) -> RepRef {
        let mut cache = self.cache.borrow_mut();
        if let Some(existing) = cache.get(&id).and_then(WeakRep::upgrade) {
            return existing;
        }
        trace!(context = %self.id, %id, "translation cache filled");
        cache.insert(id, rep.downgrade());
        rep
    }

    /// Number of translation cache entries.
    pub fn cache_len(&self) -> usize {
        self.cache.borrow().len()
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("id", &self.id)
            .field("location", &self.location())
            .field("cached", &self.cache_len())
            .finish()
    }
}
