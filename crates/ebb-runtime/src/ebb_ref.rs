use std::any::type_name;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use ebb_types::EbbId;

use crate::context::Context;
use crate::error::{EbbError, Result};
use crate::representative::Representative;

/// Typed, copyable handle naming an Ebb whose representatives have type `T`.
///
/// The handle owns nothing. Every access goes through the calling context's
/// translation cache and, on a miss, the bound root.
pub struct EbbRef<T> {
    id: EbbId,
    _rep: PhantomData<fn() -> T>,
}

impl<T: Representative> EbbRef<T> {
    /// A handle naming `id`. Nothing is resolved until first use.
    pub const fn new(id: EbbId) -> Self {
        Self {
            id,
            _rep: PhantomData,
        }
    }

    /// The identifier this handle names.
    pub fn id(&self) -> EbbId {
        self.id
    }

    /// This context's representative.
    pub fn get(&self, ctx: &Context) -> Result<Arc<T>> {
        ctx.resolve(self.id)?
            .downcast::<T>()
            .ok_or(EbbError::TypeMismatch {
                id: self.id,
                expected: type_name::<T>(),
            })
    }

    /// Run `f` against this context's representative.
    pub fn with<R>(&self, ctx: &Context, f: impl FnOnce(&T) -> R) -> Result<R> {
        Ok(f(&*self.get(ctx)?))
    }
}

impl<T> Clone for EbbRef<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for EbbRef<T> {}

impl<T> PartialEq for EbbRef<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<T> Eq for EbbRef<T> {}

impl<T> fmt::Debug for EbbRef<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EbbRef<{}>({})", type_name::<T>(), self.id)
    }
}
