//! Identifier allocation and dynamic binding.

use std::cell::Cell;
use std::sync::Arc;

use tracing::{debug, trace};

use ebb_types::{ContextId, EbbId, IdSpace};

use crate::error::{EbbError, Result};
use crate::managed::RootFactory;
use crate::root::Root;
use crate::runtime::Runtime;

/// Per-context allocator over a private slice of the runtime's space.
///
/// Context `i` owns `[base + i * range, base + (i + 1) * range)`, where
/// `range = 65536 / max_contexts`, so allocation never synchronizes with
/// other contexts. Identifiers are never reused.
pub struct EbbManager {
    runtime: Arc<Runtime>,
    context: ContextId,
    next: Cell<u32>,
    end: u32,
}

impl EbbManager {
    pub(crate) fn new(runtime: Arc<Runtime>, context: ContextId) -> Self {
        let range = runtime.config().range_per_context();
        let start = context.index() as u32 * range;
        Self {
            runtime,
            context,
            next: Cell::new(start),
            end: start + range,
        }
    }

    /// The space this manager allocates from.
    pub fn space(&self) -> IdSpace {
        self.runtime.config().id_space()
    }

    /// Identifiers still available to this context.
    pub fn remaining(&self) -> u32 {
        self.end - self.next.get()
    }

    /// Hand out the next identifier from this context's range.
    ///
    /// Fails with [`EbbError::IdSpaceExhausted`] once the range is used up.
    pub fn allocate_id(&self) -> Result<EbbId> {
        let local = self.next.get();
        if local >= self.end {
            return Err(EbbError::IdSpaceExhausted {
                context: self.context,
            });
        }
        self.next.set(local + 1);
        let id = EbbId::new(self.space().get(), local as u16);
        trace!(context = %self.context, %id, "id allocated");
        Ok(id)
    }

    /// Bind a root factory to `id` in the manager-backed table.
    ///
    /// Only identifiers of this runtime's own space can be bound here.
    pub fn bind<F>(&self, factory: F, id: EbbId) -> Result<()>
    where
        F: Fn() -> Arc<dyn Root> + Send + Sync + 'static,
    {
        self.bind_factory(Arc::new(factory), id)
    }

    /// Bind `id` to a factory registered on the runtime builder.
    pub fn bind_named(&self, name: &str, id: EbbId) -> Result<()> {
        let factory = self
            .runtime
            .named_factory(name)
            .ok_or_else(|| EbbError::UnknownFactory(name.to_string()))?;
        self.bind_factory(factory, id)
    }

    fn bind_factory(&self, factory: RootFactory, id: EbbId) -> Result<()> {
        let space = self.space();
        if !space.contains(id) {
            return Err(EbbError::RemoteBindUnsupported {
                id,
                owner: id.space(),
            });
        }
        self.runtime.managed().bind(id, factory)?;
        debug!(context = %self.context, %id, "id bound");
        Ok(())
    }
}

impl std::fmt::Debug for EbbManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EbbManager")
            .field("context", &self.context)
            .field("next", &self.next.get())
            .field("end", &self.end)
            .finish()
    }
}
