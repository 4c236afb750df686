//! Foundation types for elastic building blocks (Ebbs).
//!
//! The runtime and directory crates build on these.
//!
//! # Key Types
//!
//! - [`EbbId`] : opaque Ebb name, split into allocation-space and local segments
//! - [`IdSpace`] : the 16-bit allocation space an identifier was drawn from
//! - [`ContextId`] : one execution context (core or thread) in a process
//! - [`Location`] : one process/machine in a cluster
//!
//! # Modules
//!
//! - [`id`] : identifiers and allocation spaces
//! - [`location`] : context and location identities
//! - [`static_ids`] : identifiers reserved for system Ebbs
//! - [`error`] : [`TypeError`] for malformed hex and byte input

pub mod error;
pub mod id;
pub mod location;
pub mod static_ids;

pub use error::TypeError;
pub use id::{EbbId, IdSpace, SPACE_SIZE};
pub use location::{ContextId, Location};
