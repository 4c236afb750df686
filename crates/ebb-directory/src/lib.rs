//! Cluster-wide identifier directory.
//!
//! A [`GlobalIdMap`] stores string values (usually serialized configuration)
//! under an Ebb identifier and a relative path. Two implementations ship:
//!
//! - [`CoordinatedIdMap`] keeps entries in a hierarchical
//!   [`CoordinationService`] at `/<id>[/<path>]`; [`InMemoryCoordinator`]
//!   provides one inside the process.
//! - [`RemoteIdMap`] forwards requests over a
//!   [`Transport`](ebb_runtime::Transport) to a [`DirectoryServer`] running
//!   at another location.
//!
//! Requests and replies travel as [`DirectoryMessage`]s framed by
//! [`DirectoryCodec`].
//!
//! # Modules
//!
//! - [`global`] : the [`GlobalIdMap`] trait
//! - [`coordinated`] : [`CoordinatedIdMap`] over a coordination service
//! - [`coordinator`] : [`CoordinationService`] and [`InMemoryCoordinator`]
//! - [`watch`] : [`WatchRouter`] fan-out and [`WatchStream`]
//! - [`remote`] : [`RemoteIdMap`], the client side of the wire protocol
//! - [`server`] : [`DirectoryServer`], the answering side
//! - [`message`] : [`DirectoryMessage`] and [`WireError`]
//! - [`codec`] : [`DirectoryCodec`] framing with a protocol version byte
//! - [`path`] : relative path validation
//! - [`error`] : [`DirectoryError`]

pub mod codec;
pub mod coordinated;
pub mod coordinator;
pub mod error;
pub mod global;
pub mod message;
pub mod path;
pub mod remote;
pub mod server;
pub mod watch;

pub use codec::DirectoryCodec;
pub use coordinated::CoordinatedIdMap;
pub use coordinator::{CoordinationService, InMemoryCoordinator, NodeData};
pub use error::{DirectoryError, Result};
pub use global::GlobalIdMap;
pub use message::{DirectoryMessage, WireError, MAX_MESSAGE_SIZE, PROTOCOL_VERSION};
pub use path::validate_path;
pub use remote::RemoteIdMap;
pub use server::DirectoryServer;
pub use watch::{ChangeKind, NodeEvent, WatchEvent, WatchRouter, WatchStream, WATCH_CHANNEL_CAPACITY};
