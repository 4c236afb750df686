//! Process-wide runtime: static bindings, managed roots and contexts.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, info, warn};

use ebb_types::{ContextId, EbbId, Location};

use crate::config::RuntimeConfig;
use crate::context::Context;
use crate::error::{EbbError, Result};
use crate::managed::{ManagedRoots, RootFactory};
use crate::representative::RepRef;
use crate::root::Root;
use crate::transport::Transport;

/// Shared state behind every [`Context`] of a process.
///
/// Built once through [`RuntimeBuilder`]; the static binding table and the
/// named factory registry are frozen by [`RuntimeBuilder::build`].
pub struct Runtime {
    config: RuntimeConfig,
    static_roots: HashMap<EbbId, Arc<dyn Root>>,
    factories: HashMap<String, RootFactory>,
    managed: ManagedRoots,
    transport: Option<Arc<dyn Transport>>,
    next_context: AtomicUsize,
}

impl Runtime {
    /// Start registering static roots and factories.
    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::default()
    }

    /// The configuration this runtime was built with.
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// This process's network location.
    pub fn location(&self) -> Location {
        self.config.location()
    }

    /// `true` if `id` has a static binding or a bound root factory.
    pub fn is_bound(&self, id: EbbId) -> bool {
        self.static_roots.contains_key(&id) || self.managed.is_bound(id)
    }

    /// The transport this runtime sends through, if one was configured.
    pub fn transport(&self) -> Option<&Arc<dyn Transport>> {
        self.transport.as_ref()
    }

    pub(crate) fn managed(&self) -> &ManagedRoots {
        &self.managed
    }

    pub(crate) fn named_factory(&self, name: &str) -> Option<RootFactory> {
        self.factories.get(name).cloned()
    }

    /// Create the next execution context.
    pub fn create_context(self: &Arc<Self>) -> Result<Context> {
        let max = self.config.max_contexts;
        let index = self
            .next_context
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| (n < max).then_some(n + 1))
            .map_err(|_| EbbError::ContextLimit { max })?;
        let id = ContextId::new(index);
        let ctx = Context::new(Arc::clone(self), id);
        if let Some(transport) = &self.transport {
            transport.register_waker(&ctx.executor());
        }
        info!(context = %id, location = %self.location(), "context created");
        Ok(ctx)
    }

    /// Resolve `id` for `ctx`: translation cache, then static binding, then
    /// the manager-backed table.
    pub fn resolve(&self, ctx: &Context, id: EbbId) -> Result<RepRef> {
        if let Some(rep) = ctx.cached(id) {
            return Ok(rep);
        }
        let rep = match self.static_roots.get(&id) {
            Some(root) => root.resolve(ctx, id)?,
            None => self.managed.resolve(ctx, id)?,
        };
        Ok(ctx.install(id, rep))
    }

    /// Hand an incoming transport message to the `MessageHandler` of `id`.
    pub fn deliver(&self, ctx: &Context, from: Location, id: EbbId, payload: Bytes) -> Result<()> {
        let rep = self.resolve(ctx, id)?;
        let handler = rep
            .representative()
            .message_handler()
            .ok_or(EbbError::MissingCapability {
                id,
                capability: "MessageHandler",
            })?;
        debug!(%id, %from, len = payload.len(), "message delivered");
        handler.receive_message(ctx, from, payload);
        Ok(())
    }

    /// Fire the `TimerHook` of `id`.
    pub fn fire_timer(&self, ctx: &Context, id: EbbId) -> Result<()> {
        let rep = self.resolve(ctx, id)?;
        let hook = rep
            .representative()
            .timer_hook()
            .ok_or(EbbError::MissingCapability {
                id,
                capability: "TimerHook",
            })?;
        hook.fire(ctx);
        Ok(())
    }

    /// Send `payload` to the Ebb `id` at location `to`.
    ///
    /// Fails with [`EbbError::NoTransport`] when none was installed.
    pub fn send(&self, to: Location, id: EbbId, payload: Bytes) -> Result<()> {
        let transport = self.transport.as_ref().ok_or(EbbError::NoTransport)?;
        transport.send(to, id, payload).inspect_err(|e| {
            warn!(%to, %id, error = %e, "send failed");
        })
    }
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("config", &self.config)
            .field("static_roots", &self.static_roots.len())
            .field("factories", &self.factories.len())
            .finish_non_exhaustive()
    }
}

/// Startup-phase registry for a [`Runtime`].
#[derive(Default)]
pub struct RuntimeBuilder {
    config: RuntimeConfig,
    static_roots: Vec<(EbbId, Arc<dyn Root>)>,
    factories: Vec<(String, RootFactory)>,
    transport: Option<Arc<dyn Transport>>,
}

impl RuntimeBuilder {
    /// Use `config` instead of the defaults.
    pub fn config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    /// Statically bind `root` to `id`.
    pub fn install(self, id: EbbId, root: impl Root + 'static) -> Self {
        self.install_shared(id, Arc::new(root))
    }

    /// Like [`install`](Self::install), keeping a handle to the root.
    pub fn install_shared(mut self, id: EbbId, root: Arc<dyn Root>) -> Self {
        self.static_roots.push((id, root));
        self
    }

    /// Register a root factory that managers can bind by name.
    pub fn register_factory<F>(mut self, name: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> Arc<dyn Root> + Send + Sync + 'static,
    {
        self.factories.push((name.into(), Arc::new(factory)));
        self
    }

    /// Transport used by [`Runtime::send`] and remote directories.
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Validate the configuration and freeze the registry.
    pub fn build(self) -> Result<Arc<Runtime>> {
        self.config.validate()?;
        let space = self.config.id_space();

        let mut static_roots = HashMap::with_capacity(self.static_roots.len());
        for (id, root) in self.static_roots {
            if space.contains(id) {
                return Err(EbbError::Config(format!(
                    "static binding {id} lies inside allocation {space}"
                )));
            }
            if static_roots.insert(id, root).is_some() {
                return Err(EbbError::AlreadyBound(id));
            }
        }

        let mut factories = HashMap::with_capacity(self.factories.len());
        for (name, factory) in self.factories {
            if factories.contains_key(&name) {
                return Err(EbbError::Config(format!("factory {name:?} registered twice")));
            }
            factories.insert(name, factory);
        }

        debug!(
            space = %space,
            statics = static_roots.len(),
            factories = factories.len(),
            "runtime built"
        );
        Ok(Arc::new(Runtime {
            config: self.config,
            static_roots,
            factories,
            managed: ManagedRoots::new(),
            transport: self.transport,
            next_context: AtomicUsize::new(0),
        }))
    }
}
