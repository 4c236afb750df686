use serde::{Deserialize, Serialize};

use ebb_types::EbbId;

use crate::error::DirectoryError;

/// Written into every frame header; decoding rejects any other value.
pub const PROTOCOL_VERSION: u8 = 1;
/// Largest bincode payload a frame may carry.
pub const MAX_MESSAGE_SIZE: usize = 4 * 1024 * 1024;

/// Directory requests and replies exchanged between locations.
///
/// Every reply echoes the `request_id` of the request it answers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DirectoryMessage {
    Get { request_id: u64, id: EbbId, path: String },
    Set { request_id: u64, id: EbbId, path: String, value: String },
    List { request_id: u64, id: EbbId, path: String },
    Exists { request_id: u64, id: EbbId, path: String },
    Value { request_id: u64, value: String },
    Stored { request_id: u64 },
    Children { request_id: u64, names: Vec<String> },
    Found { request_id: u64, exists: bool },
    Failed { request_id: u64, error: WireError },
}

/// A directory failure as carried on the wire.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum WireError {
    NotFound { id: EbbId, path: String },
    InvalidPath { path: String, reason: String },
    Other(String),
}

impl DirectoryMessage {
    /// Frame tag identifying the variant. Replies use the high half of the range.
    pub fn type_tag(&self) -> u8 {
        match self {
            Self::Get { .. } => 1,
            Self::Set { .. } => 2,
            Self::List { .. } => 3,
            Self::Exists { .. } => 4,
            Self::Value { .. } => 129,
            Self::Stored { .. } => 130,
            Self::Children { .. } => 131,
            Self::Found { .. } => 132,
            Self::Failed { .. } => 255,
        }
    }

    /// Variant name, for logs and framing errors.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Get { .. } => "Get",
            Self::Set { .. } => "Set",
            Self::List { .. } => "List",
            Self::Exists { .. } => "Exists",
            Self::Value { .. } => "Value",
            Self::Stored { .. } => "Stored",
            Self::Children { .. } => "Children",
            Self::Found { .. } => "Found",
            Self::Failed { .. } => "Failed",
        }
    }

    /// The request this message starts or answers.
    pub fn request_id(&self) -> u64 {
        match self {
            Self::Get { request_id, .. }
            | Self::Set { request_id, .. }
            | Self::List { request_id, .. }
            | Self::Exists { request_id, .. }
            | Self::Value { request_id, .. }
            | Self::Stored { request_id }
            | Self::Children { request_id, .. }
            | Self::Found { request_id, .. }
            | Self::Failed { request_id, .. } => *request_id,
        }
    }

    /// Requests carry tags below 128, replies at or above.
    pub fn is_request(&self) -> bool {
        self.type_tag() < 128
    }
}

impl From<&DirectoryError> for WireError {
    fn from(e: &DirectoryError) -> Self {
        match e {
            DirectoryError::NotFound { id, path } => WireError::NotFound {
                id: *id,
                path: path.clone(),
            },
            DirectoryError::InvalidPath { path, reason } => WireError::InvalidPath {
                path: path.clone(),
                reason: reason.clone(),
            },
            other => WireError::Other(other.to_string()),
        }
    }
}

impl From<WireError> for DirectoryError {
    fn from(e: WireError) -> Self {
        match e {
            WireError::NotFound { id, path } => DirectoryError::NotFound { id, path },
            WireError::InvalidPath { path, reason } => DirectoryError::InvalidPath { path, reason },
            WireError::Other(message) => DirectoryError::Remote(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requests_and_replies_are_partitioned_by_tag() {
        let get = DirectoryMessage::Get {
            request_id: 3,
            id: EbbId::new(1, 1),
            path: String::new(),
        };
        let stored = DirectoryMessage::Stored { request_id: 3 };
        assert!(get.is_request());
        assert!(!stored.is_request());
        assert_eq!(get.request_id(), stored.request_id());
        assert_eq!(get.type_name(), "Get");
    }

    #[test]
    fn wire_errors_keep_not_found_identity() {
        let original = DirectoryError::NotFound {
            id: EbbId::new(2, 9),
            path: "cfg".into(),
        };
        let back = DirectoryError::from(WireError::from(&original));
        assert!(matches!(back, DirectoryError::NotFound { id, ref path } if id == EbbId::new(2, 9) && path == "cfg"));

        let opaque = DirectoryError::from(WireError::from(&DirectoryError::WatchClosed));
        assert!(matches!(opaque, DirectoryError::Remote(msg) if msg == "watch closed"));
    }
}
