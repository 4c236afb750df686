use ebb_future::Failure;
use ebb_types::{ContextId, EbbId, IdSpace, Location, TypeError};

/// Errors produced while resolving, binding or messaging Ebbs.
#[derive(Debug, Clone, thiserror::Error)]
pub enum EbbError {
    /// No root, static binding or factory exists for the identifier.
    #[error("unresolvable identifier {0}")]
    Unresolvable(EbbId),

    /// The identifier already has a binding.
    #[error("identifier {0} is already bound")]
    AlreadyBound(EbbId),

    /// No root factory was registered under this name.
    #[error("no root factory registered as {0:?}")]
    UnknownFactory(String),

    /// The resolved representative is not of the requested type.
    #[error("representative of {id} is not a {expected}")]
    TypeMismatch { id: EbbId, expected: &'static str },

    /// The representative does not implement the requested capability.
    #[error("representative of {id} has no {capability} capability")]
    MissingCapability { id: EbbId, capability: &'static str },

    /// A representative constructor failed.
    #[error("construction of {id} failed: {cause}")]
    Construction { id: EbbId, cause: Failure },

    /// The context has handed out every identifier in its range.
    #[error("identifier range of {context} exhausted")]
    IdSpaceExhausted { context: ContextId },

    /// Binding an identifier owned by another allocation space.
    #[error("cannot bind {id}: it belongs to {owner}, remote binding is unsupported")]
    RemoteBindUnsupported { id: EbbId, owner: IdSpace },

    /// A remote location could not be reached or failed the request.
    #[error("remote failure at {location} for {id}: {cause}")]
    RemoteFailure {
        id: EbbId,
        location: Location,
        cause: String,
    },

    /// Messaging was attempted on a runtime built without a transport.
    #[error("no transport configured")]
    NoTransport,

    /// Every context slot of the runtime is taken.
    #[error("context limit of {max} reached")]
    ContextLimit { max: usize },

    /// Invalid runtime configuration.
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Type(#[from] TypeError),
}

/// Convenience alias used throughout the runtime crate.
pub type Result<T> = std::result::Result<T, EbbError>;
