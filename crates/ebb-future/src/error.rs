use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

use anyhow::anyhow;

/// The error carried by a failed [`Future`](crate::Future).
///
/// A `Failure` is a shared [`anyhow::Error`], so it can be cloned and handed
/// to every continuation that observes the failure. Like `anyhow::Error` it
/// does not implement [`std::error::Error`] itself, so `?` converts any error
/// into a `Failure`.
#[derive(Clone)]
pub struct Failure(Arc<anyhow::Error>);

impl Failure {
    /// Wrap a concrete error; it stays reachable through
    /// [`downcast_ref`](Self::downcast_ref).
    pub fn new<E>(error: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self(Arc::new(anyhow::Error::new(error)))
    }

    /// A failure holding only a message.
    pub fn msg(message: impl Into<String>) -> Self {
        let message: String = message.into();
        Self(Arc::new(anyhow!(message)))
    }

    /// Adopt an error already erased by `anyhow`, keeping its context chain.
    pub fn from_anyhow(error: anyhow::Error) -> Self {
        Self(Arc::new(error))
    }

    /// Borrow the underlying error if it has type `E`.
    pub fn downcast_ref<E>(&self) -> Option<&E>
    where
        E: fmt::Display + fmt::Debug + Send + Sync + 'static,
    {
        self.0.downcast_ref::<E>()
    }

    /// Returns `true` if the underlying error has type `E`.
    pub fn is<E>(&self) -> bool
    where
        E: fmt::Display + fmt::Debug + Send + Sync + 'static,
    {
        self.0.is::<E>()
    }

    /// The wrapped `anyhow` error.
    pub fn as_anyhow(&self) -> &anyhow::Error {
        &self.0
    }
}

impl<E> From<E> for Failure
where
    E: StdError + Send + Sync + 'static,
{
    fn from(error: E) -> Self {
        Self::new(error)
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&*self.0, f)
    }
}

impl fmt::Debug for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Failure({:?})", &*self.0)
    }
}
