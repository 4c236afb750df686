//! Manager-backed root table.
//!
//! Identifiers allocated at run time are bound to a root factory. The first
//! resolution of such an identifier claims a construction slot in the
//! [`LocalIdMap`], runs the factory exactly once, and forwards to the root it
//! produced.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::debug;

use ebb_types::EbbId;

use crate::context::Context;
use crate::error::{EbbError, Result};
use crate::local_id_map::LocalIdMap;
use crate::representative::RepRef;
use crate::root::Root;
use crate::slot::ConstructionSlot;

/// Produces the root for a dynamically bound identifier.
pub type RootFactory = Arc<dyn Fn() -> Arc<dyn Root> + Send + Sync>;

type RootSlot = ConstructionSlot<Arc<dyn Root>>;

/// Roots of identifiers bound at run time through a [`RootFactory`].
///
/// Each bound identifier gets one construction slot, so racing lookups
/// run the factory once and share the resulting root.
pub struct ManagedRoots {
    roots: LocalIdMap,
    factories: Mutex<HashMap<EbbId, RootFactory>>,
}

impl ManagedRoots {
    pub(crate) fn new() -> Self {
        Self {
            roots: LocalIdMap::new(),
            factories: Mutex::new(HashMap::new()),
        }
    }

    pub(crate) fn bind(&self, id: EbbId, factory: RootFactory) -> Result<()> {
        let mut factories = self.factories.lock().unwrap_or_else(PoisonError::into_inner);
        if factories.contains_key(&id) {
            return Err(EbbError::AlreadyBound(id));
        }
        factories.insert(id, factory);
        debug!(%id, "root factory bound");
        Ok(())
    }

    /// Returns `true` once a factory has been bound to `id`.
    pub fn is_bound(&self, id: EbbId) -> bool {
        self.factories
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&id)
    }

    /// The root of `id`, built from its factory on first use.
    pub(crate) fn root(&self, id: EbbId) -> Result<Arc<dyn Root>> {
        if let Some(root) = self.roots.get::<RootSlot>(id).and_then(|slot| slot.get()) {
            return Ok(root);
        }
        let factory = self
            .factories
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned()
            .ok_or(EbbError::Unresolvable(id))?;
        // Winner or loser, every caller builds through the stored slot.
        let slot = self
            .roots
            .insert_typed(id, Arc::new(RootSlot::new()))?
            .into_value();
        slot.get_or_try_init(|| {
            debug!(%id, "invoking root factory");
            Ok(factory())
        })
    }

    pub(crate) fn resolve(&self, ctx: &Context, id: EbbId) -> Result<RepRef> {
        self.root(id)?.resolve(ctx, id)
    }
}

impl std::fmt::Debug for ManagedRoots {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManagedRoots")
            .field("roots", &self.roots)
            .finish_non_exhaustive()
    }
}
