//! Addressing and resolution of elastic building blocks (Ebbs).
//!
//! An Ebb is named by an [`EbbId`](ebb_types::EbbId) and implemented by
//! representatives. Each [`Context`] keeps a translation cache from id to
//! representative; a miss consults the [`Root`] bound to the id, which
//! decides whether the Ebb has one shared instance ([`SharedRoot`]), one per
//! context ([`PerContextRoot`]) or one per network location
//! ([`PerLocationRoot`]). Identifiers allocated at run time by an
//! [`EbbManager`] are bound to root factories in the manager-backed table.
//!
//! # Startup
//!
//! ```ignore
//! let runtime = Runtime::builder()
//!     .config(RuntimeConfig::default())
//!     .install(MY_ID, SharedRoot::new(|_| MyRep::default()))
//!     .build()?;
//! let ctx = runtime.create_context()?;
//! let rep = EbbRef::<MyRep>::new(MY_ID).get(&ctx)?;
//! ```
//!
//! # Modules
//!
//! - [`runtime`] : [`Runtime`] and its startup [`RuntimeBuilder`]
//! - [`context`] : per-thread [`Context`] with its translation cache
//! - [`root`] : the [`Root`] trait and the three standard roots
//! - [`slot`] : construct-once cells backing every root
//! - [`managed`] : roots bound at run time through a [`RootFactory`]
//! - [`manager`] : [`EbbManager`], the per-context identifier allocator
//! - [`local_id_map`] : [`LocalIdMap`], the process-wide id to payload map
//! - [`representative`] : [`Representative`] and its capability traits
//! - [`ebb_ref`] : typed [`EbbRef`] handles
//! - [`transport`] : the [`Transport`] seam and [`InProcessNetwork`]
//! - [`config`] : [`RuntimeConfig`] loaded from TOML
//! - [`error`] : [`EbbError`]

pub mod config;
pub mod context;
pub mod ebb_ref;
pub mod error;
pub mod local_id_map;
pub mod managed;
pub mod manager;
pub mod representative;
pub mod root;
pub mod runtime;
pub mod slot;
pub mod transport;

pub use config::RuntimeConfig;
pub use context::Context;
pub use ebb_ref::EbbRef;
pub use error::{EbbError, Result};
pub use local_id_map::{Insertion, LocalIdMap, Payload};
pub use managed::RootFactory;
pub use manager::EbbManager;
pub use representative::{MessageHandler, RepRef, Representative, TimerHook};
pub use root::{PerContextRoot, PerLocationRoot, Root, SharedRoot};
pub use runtime::{Runtime, RuntimeBuilder};
pub use transport::{Envelope, InProcessNetwork, Transport};
