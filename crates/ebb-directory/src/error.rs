use ebb_runtime::EbbError;
use ebb_types::EbbId;

/// Errors produced by directory operations.
#[derive(Debug, Clone, thiserror::Error)]
pub enum DirectoryError {
    /// No value is stored at the requested node.
    #[error("no directory entry for {id} at {path:?}")]
    NotFound { id: EbbId, path: String },

    /// A coordination-service node does not exist.
    #[error("no such node: {0}")]
    NoNode(String),

    /// A coordination-service node already exists.
    #[error("node already exists: {0}")]
    NodeExists(String),

    /// The path is not a valid directory path.
    #[error("invalid path {path:?}: {reason}")]
    InvalidPath { path: String, reason: String },

    /// A stored value is not valid UTF-8.
    #[error("value at {0} is not valid UTF-8")]
    InvalidValue(String),

    /// The operation is not offered by this directory variant.
    #[error("unsupported operation: {0}")]
    Unsupported(&'static str),

    /// The remote directory could not be reached or failed the request.
    #[error("remote directory failure: {0}")]
    Remote(String),

    /// Serialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Deserialization failure.
    #[error("deserialization error: {0}")]
    Deserialization(String),

    /// Malformed frame.
    #[error("framing error: {0}")]
    Framing(String),

    /// The frame was written by a peer speaking another protocol version.
    #[error("unsupported protocol version {got} (expected {expected})")]
    UnsupportedVersion { got: u8, expected: u8 },

    /// Message exceeds the maximum allowed size.
    #[error("message too large: {size} bytes (max {max})")]
    MessageTooLarge { size: usize, max: usize },

    /// The watcher fell behind and missed events.
    #[error("watch lagged by {0} events")]
    WatchLagged(u64),

    /// The watched directory was dropped.
    #[error("watch closed")]
    WatchClosed,

    #[error(transparent)]
    Ebb(#[from] EbbError),
}

/// Convenience alias used throughout the directory crate.
pub type Result<T> = std::result::Result<T, DirectoryError>;
