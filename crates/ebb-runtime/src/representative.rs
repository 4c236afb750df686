//! Representatives and the capabilities they may expose.
//!
//! A representative is an ordinary Rust value implementing
//! [`Representative`]. Protocol roles such as receiving transport messages or
//! timer expiries are separate traits, discovered at the call site through
//! the capability queries on [`Representative`].

use std::any::Any;
use std::sync::{Arc, Weak};

use bytes::Bytes;

use ebb_types::Location;

use crate::context::Context;

/// The live object implementing an Ebb for one resolution context.
pub trait Representative: Any + Send + Sync {
    fn message_handler(&self) -> Option<&dyn MessageHandler> {
        None
    }

    fn timer_hook(&self) -> Option<&dyn TimerHook> {
        None
    }
}

/// Capability: receive messages delivered by the transport.
pub trait MessageHandler {
    fn receive_message(&self, ctx: &Context, from: Location, payload: Bytes);
}

/// Capability: be notified when a timer registered for this Ebb expires.
pub trait TimerHook {
    fn fire(&self, ctx: &Context);
}

/// Type-erased, owning handle to a representative.
#[derive(Clone)]
pub struct RepRef {
    any: Arc<dyn Any + Send + Sync>,
    rep: Arc<dyn Representative>,
}

impl RepRef {
    /// Erase a concrete representative.
    pub fn new<T: Representative>(rep: Arc<T>) -> Self {
        Self {
            any: Arc::clone(&rep) as Arc<dyn Any + Send + Sync>,
            rep,
        }
    }

    /// The concrete representative, if it has type `T`.
    pub fn downcast<T: Representative>(&self) -> Option<Arc<T>> {
        Arc::clone(&self.any).downcast::<T>().ok()
    }

    /// The representative as a trait object.
    pub fn representative(&self) -> &dyn Representative {
        &*self.rep
    }

    /// `true` if both handles point at the same instance.
    pub fn ptr_eq(&self, other: &RepRef) -> bool {
        Arc::ptr_eq(&self.any, &other.any)
    }

    pub(crate) fn downgrade(&self) -> WeakRep {
        WeakRep {
            any: Arc::downgrade(&self.any),
            rep: Arc::downgrade(&self.rep),
        }
    }
}

impl std::fmt::Debug for RepRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "RepRef({:p})", Arc::as_ptr(&self.any))
    }
}

/// Non-owning form held by translation caches; roots own the instance.
pub(crate) struct WeakRep {
    any: Weak<dyn Any + Send + Sync>,
    rep: Weak<dyn Representative>,
}

impl WeakRep {
    pub(crate) fn upgrade(&self) -> Option<RepRef> {
        Some(RepRef {
            any: self.any.upgrade()?,
            rep: self.rep.upgrade()?,
        })
    }
}
