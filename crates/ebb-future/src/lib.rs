//! Single-assignment futures for elastic building blocks.
//!
//! A [`Promise`] is written exactly once; the [`Future`] it hands out is read
//! once and may carry one continuation. Continuations registered before the
//! value arrives are handed to an [`Executor`] by whichever thread satisfies
//! the promise, so they never run on the setter's stack. Blocking is left to
//! whoever pumps the [`EventLoop`].
//!
//! # Misuse
//!
//! Setting a promise twice, registering a second continuation, or calling
//! [`Future::get`] on a pending or default-constructed future panics.
//!
//! # Modules
//!
//! - [`future`] : [`Promise`], [`Future`] and the continuation machinery
//! - [`combinators`] : [`when_all`], [`flatten`] and [`spawn_async`]
//! - [`executor`] : the [`Executor`] seam and the cooperative [`EventLoop`]
//! - [`error`] : [`Failure`], the shared error a failed future carries

pub mod combinators;
pub mod error;
pub mod executor;
pub mod future;

pub use combinators::{flatten, spawn_async, when_all};
pub use error::Failure;
pub use executor::{EventLoop, Executor, ExecutorRef, Task};
pub use future::{make_failed, make_ready, Future, Launch, Promise};
