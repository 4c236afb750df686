//! Resolution strategies.
//!
//! A [`Root`] is bound to one identifier and is consulted on a translation
//! cache miss. It either hands back an existing representative or constructs
//! one. Constructors always run with no lock held, because constructing a
//! representative commonly resolves further Ebbs.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::debug;

use ebb_future::{Failure, Future};
use ebb_types::{ContextId, EbbId, Location};

use crate::context::Context;
use crate::error::{EbbError, Result};
use crate::representative::{RepRef, Representative};
use crate::slot::ConstructionSlot;

/// Locates or constructs the representative of one identifier.
pub trait Root: Send + Sync {
    fn resolve(&self, ctx: &Context, id: EbbId) -> Result<RepRef>;
}

type Ctor<T> = Box<dyn Fn(&Context) -> std::result::Result<T, Failure> + Send + Sync>;

fn constructed<T: Representative>(id: EbbId, ctx: &Context, ctor: &Ctor<T>) -> Result<RepRef> {
    let rep = ctor(ctx).map_err(|cause| EbbError::Construction { id, cause })?;
    debug!(%id, context = %ctx.id(), "representative constructed");
    Ok(RepRef::new(Arc::new(rep)))
}

/// One representative for the whole process.
pub struct SharedRoot<T> {
    slot: ConstructionSlot<RepRef>,
    ctor: Ctor<T>,
}

impl<T: Representative> SharedRoot<T> {
    /// Construct lazily with an infallible constructor.
    pub fn new(ctor: impl Fn(&Context) -> T + Send + Sync + 'static) -> Self {
        Self::try_new(move |ctx| Ok(ctor(ctx)))
    }

    /// Construct lazily; a failed construction leaves the root unconstructed.
    pub fn try_new(
        ctor: impl Fn(&Context) -> std::result::Result<T, Failure> + Send + Sync + 'static,
    ) -> Self {
        Self {
            slot: ConstructionSlot::new(),
            ctor: Box::new(ctor),
        }
    }

    /// A root around an already constructed representative.
    pub fn from_instance(rep: Arc<T>) -> Self {
        Self {
            slot: ConstructionSlot::with_value(RepRef::new(rep)),
            ctor: Box::new(|_| Err(Failure::msg("shared instance was preconstructed"))),
        }
    }

    /// Returns `true` once the representative exists.
    pub fn is_constructed(&self) -> bool {
        self.slot.is_constructed()
    }
}

impl<T: Representative> Root for SharedRoot<T> {
    fn resolve(&self, ctx: &Context, id: EbbId) -> Result<RepRef> {
        self.slot
            .get_or_try_init(|| constructed(id, ctx, &self.ctor))
    }
}

impl<T> fmt::Debug for SharedRoot<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedRoot")
            .field("constructed", &self.slot.is_constructed())
            .finish()
    }
}

/// Map of lazily constructed representatives keyed by `K`.
///
/// The map lock only covers finding or creating the slot for a key; the
/// constructor runs under the slot's own claim.
struct Keyed<K> {
    slots: Mutex<HashMap<K, Arc<ConstructionSlot<RepRef>>>>,
}

impl<K: Eq + Hash + Copy> Keyed<K> {
    fn new() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
        }
    }

    fn slot(&self, key: K) -> Arc<ConstructionSlot<RepRef>> {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(slots.entry(key).or_default())
    }

    fn constructed(&self) -> usize {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|slot| slot.is_constructed())
            .count()
    }
}

/// One representative per execution context.
pub struct PerContextRoot<T> {
    reps: Keyed<ContextId>,
    ctor: Ctor<T>,
}

impl<T: Representative> PerContextRoot<T> {
    /// Construct one representative per context on first access.
    pub fn new(ctor: impl Fn(&Context) -> T + Send + Sync + 'static) -> Self {
        Self::try_new(move |ctx| Ok(ctor(ctx)))
    }

    /// Like [`new`](Self::new), with a fallible constructor.
    pub fn try_new(
        ctor: impl Fn(&Context) -> std::result::Result<T, Failure> + Send + Sync + 'static,
    ) -> Self {
        Self {
            reps: Keyed::new(),
            ctor: Box::new(ctor),
        }
    }

    /// Number of contexts holding a constructed representative.
    pub fn constructed(&self) -> usize {
        self.reps.constructed()
    }
}

impl<T: Representative> Root for PerContextRoot<T> {
    fn resolve(&self, ctx: &Context, id: EbbId) -> Result<RepRef> {
        self.reps
            .slot(ctx.id())
            .get_or_try_init(|| constructed(id, ctx, &self.ctor))
    }
}

/// One representative per network location.
///
/// Construction is asynchronous: the constructor returns a [`Future`] that is
/// driven to completion by [`Context::block_on`], which also delivers the
/// context's inbound messages while it waits.
pub struct PerLocationRoot<T> {
    reps: Keyed<Location>,
    ctor: Box<dyn Fn(&Context) -> Future<T> + Send + Sync>,
}

impl<T: Representative> PerLocationRoot<T> {
    /// Build each location's representative from the future `ctor` returns.
    pub fn new(ctor: impl Fn(&Context) -> Future<T> + Send + Sync + 'static) -> Self {
        Self {
            reps: Keyed::new(),
            ctor: Box::new(ctor),
        }
    }

    /// Number of locations holding a constructed representative.
    pub fn constructed(&self) -> usize {
        self.reps.constructed()
    }
}

impl<T: Representative> Root for PerLocationRoot<T> {
    fn resolve(&self, ctx: &Context, id: EbbId) -> Result<RepRef> {
        let location = ctx.location();
        self.reps.slot(location).get_or_try_init(|| {
            let rep = ctx
                .block_on((self.ctor)(ctx))
                .map_err(|failure| match failure.downcast_ref::<EbbError>() {
                    Some(err) => err.clone(),
                    None => EbbError::RemoteFailure {
                        id,
                        location,
                        cause: failure.to_string(),
                    },
                })?;
            debug!(%id, %location, "per-location representative constructed");
            Ok(RepRef::new(Arc::new(rep)))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::Runtime;
    use ebb_future::{make_failed, spawn_async};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Barrier;
    use std::thread;
    use std::time::Duration;

    const ID: EbbId = EbbId::new(0, 0x200);

    struct Counter {
        serial: usize,
    }
    impl Representative for Counter {}

    fn counting_ctor(calls: &Arc<AtomicUsize>) -> impl Fn(&Context) -> Counter + Send + Sync {
        let calls = Arc::clone(calls);
        move |_| {
            thread::sleep(Duration::from_millis(5));
            Counter {
                serial: calls.fetch_add(1, Ordering::SeqCst),
            }
        }
    }

    #[test]
    fn shared_root_constructs_once_across_racing_contexts() {
        let calls = Arc::new(AtomicUsize::new(0));
        let runtime = Runtime::builder()
            .config(crate::RuntimeConfig {
                max_contexts: 8,
                ..Default::default()
            })
            .install(ID, SharedRoot::new(counting_ctor(&calls)))
            .build()
            .unwrap();
        let barrier = Arc::new(Barrier::new(8));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let ctx = runtime.create_context().unwrap();
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    let first = ctx.resolve(ID).unwrap();
                    let second = ctx.resolve(ID).unwrap();
                    assert!(first.ptr_eq(&second));
                    first.downcast::<Counter>().unwrap().serial
                })
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), 0);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn per_context_root_isolates_contexts() {
        let calls = Arc::new(AtomicUsize::new(0));
        let root = Arc::new(PerContextRoot::new(counting_ctor(&calls)));
        let runtime = Runtime::builder()
            .install_shared(ID, Arc::clone(&root) as Arc<dyn Root>)
            .build()
            .unwrap();
        let a = runtime.create_context().unwrap();
        let b = runtime.create_context().unwrap();

        let a1 = a.resolve(ID).unwrap();
        let a2 = a.resolve(ID).unwrap();
        let b1 = b.resolve(ID).unwrap();
        assert!(a1.ptr_eq(&a2));
        assert!(!a1.ptr_eq(&b1));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(root.constructed(), 2);
    }

    #[test]
    fn per_context_root_constructs_once_per_racing_context() {
        let calls = Arc::new(AtomicUsize::new(0));
        let root = Arc::new(PerContextRoot::new(counting_ctor(&calls)));
        let runtime = Runtime::builder()
            .config(crate::RuntimeConfig {
                max_contexts: 8,
                ..Default::default()
            })
            .install_shared(ID, Arc::clone(&root) as Arc<dyn Root>)
            .build()
            .unwrap();
        let barrier = Arc::new(Barrier::new(8));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let ctx = runtime.create_context().unwrap();
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    let first = ctx.resolve(ID).unwrap();
                    assert!(first.ptr_eq(&ctx.resolve(ID).unwrap()));
                    first.downcast::<Counter>().unwrap().serial
                })
            })
            .collect();
        let mut serials: Vec<usize> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        serials.sort_unstable();

        assert_eq!(serials, (0..8).collect::<Vec<_>>());
        assert_eq!(calls.load(Ordering::SeqCst), 8);
        assert_eq!(root.constructed(), 8);
    }

    #[test]
    fn failed_construction_is_reported_and_retried() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&attempts);
        let runtime = Runtime::builder()
            .install(
                ID,
                SharedRoot::try_new(move |_| {
                    if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                        Err(Failure::msg("not yet"))
                    } else {
                        Ok(Counter { serial: 1 })
                    }
                }),
            )
            .build()
            .unwrap();
        let ctx = runtime.create_context().unwrap();
        let err = ctx.resolve(ID).unwrap_err();
        assert!(matches!(err, EbbError::Construction { id, .. } if id == ID));
        assert_eq!(ctx.cache_len(), 0);
        assert_eq!(ctx.resolve(ID).unwrap().downcast::<Counter>().unwrap().serial, 1);
    }

    #[test]
    fn preconstructed_shared_instance() {
        let rep = Arc::new(Counter { serial: 42 });
        let runtime = Runtime::builder()
            .install(ID, SharedRoot::from_instance(Arc::clone(&rep)))
            .build()
            .unwrap();
        let ctx = runtime.create_context().unwrap();
        let resolved = ctx.resolve(ID).unwrap().downcast::<Counter>().unwrap();
        assert!(Arc::ptr_eq(&resolved, &rep));
    }

    #[test]
    fn per_location_root_resolves_through_event_loop() {
        let root = Arc::new(PerLocationRoot::new(|ctx: &Context| {
            spawn_async(&ctx.executor(), || Counter { serial: 11 })
        }));
        let runtime = Runtime::builder()
            .install_shared(ID, Arc::clone(&root) as Arc<dyn Root>)
            .build()
            .unwrap();
        let a = runtime.create_context().unwrap();
        let b = runtime.create_context().unwrap();
        let ra = a.resolve(ID).unwrap();
        let rb = b.resolve(ID).unwrap();
        assert!(ra.ptr_eq(&rb), "one instance per location");
        assert_eq!(ra.downcast::<Counter>().unwrap().serial, 11);
        assert_eq!(root.constructed(), 1);
    }

    #[test]
    fn per_location_failure_surfaces_as_remote_failure() {
        let runtime = Runtime::builder()
            .install(
                ID,
                PerLocationRoot::new(|_: &Context| {
                    make_failed::<Counter>(Failure::msg("host unreachable"))
                }),
            )
            .build()
            .unwrap();
        let ctx = runtime.create_context().unwrap();
        match ctx.resolve(ID).unwrap_err() {
            EbbError::RemoteFailure { id, location, cause } => {
                assert_eq!(id, ID);
                assert_eq!(location, ctx.location());
                assert_eq!(cause, "host unreachable");
            }
            other => panic!("unexpected error {other}"),
        }
    }
}
