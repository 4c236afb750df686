//! Execution of continuations.
//!
//! The core never runs a deferred continuation itself: it hands a [`Task`] to
//! an [`Executor`]. [`EventLoop`] is the cooperative FIFO loop that one
//! execution context pumps; a hosted process runs one per thread.

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex, PoisonError};

use tracing::trace;

use crate::error::Failure;
use crate::future::{Future, Launch};

/// A unit of deferred work.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Something that runs tasks later, in FIFO order, without priorities.
pub trait Executor: Send + Sync {
    fn spawn(&self, task: Task);
}

/// Shared handle to an executor.
pub type ExecutorRef = Arc<dyn Executor>;

/// Cooperative single-consumer event loop.
///
/// Tasks may be spawned from any thread; they run on whichever thread pumps
/// the loop with [`run_once`](Self::run_once), [`run_until`](Self::run_until)
/// or [`block_on`](Self::block_on).
#[derive(Default)]
pub struct EventLoop {
    queue: Mutex<VecDeque<Task>>,
    available: Condvar,
}

impl EventLoop {
    /// A loop with an empty queue.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// This loop as a shareable [`ExecutorRef`].
    pub fn executor(self: &Arc<Self>) -> ExecutorRef {
        Arc::clone(self) as ExecutorRef
    }

    /// Number of queued tasks.
    pub fn pending(&self) -> usize {
        self.queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Run the oldest queued task, if any. Returns `false` when idle.
    pub fn run_once(&self) -> bool {
        let task = self
            .queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        match task {
            Some(task) => {
                task();
                true
            }
            None => false,
        }
    }

    /// Run tasks until the queue is empty. Returns how many ran.
    pub fn run_until_idle(&self) -> usize {
        let mut ran = 0;
        while self.run_once() {
            ran += 1;
        }
        ran
    }

    /// Pump the loop until `done` returns `true`.
    ///
    /// When the queue is empty the calling thread sleeps until another thread
    /// spawns a task. If nothing ever does, this never returns.
    pub fn run_until(&self, mut done: impl FnMut() -> bool) {
        while !done() {
            self.run_one_blocking();
        }
    }

    /// Pump the loop until `future` is terminal and return its outcome.
    pub fn block_on<T>(self: &Arc<Self>, future: Future<T>) -> Result<T, Failure>
    where
        T: Send + 'static,
    {
        self.block_on_polling(future, || 0)
    }

    /// Like [`block_on`](Self::block_on), calling `poll` before every wait so
    /// work arriving outside the queue (inbound messages) is picked up.
    /// `poll` returns how much it handled; the loop only sleeps after a
    /// poll that handled nothing.
    ///
    /// Whatever feeds `poll` must also spawn a task on this loop when new
    /// work arrives, or a sleeping loop never wakes up.
    pub fn block_on_polling<T>(
        self: &Arc<Self>,
        future: Future<T>,
        mut poll: impl FnMut() -> usize,
    ) -> Result<T, Failure>
    where
        T: Send + 'static,
    {
        if future.is_ready() {
            return future.get();
        }
        let slot: Arc<Mutex<Option<Result<T, Failure>>>> = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&slot);
        future.on_settle(
            &self.executor(),
            Launch::Sync,
            Box::new(move |outcome| {
                *sink.lock().unwrap_or_else(PoisonError::into_inner) = Some(outcome);
            }),
        );
        loop {
            if let Some(outcome) = slot.lock().unwrap_or_else(PoisonError::into_inner).take() {
                return outcome;
            }
            if poll() > 0 {
                continue;
            }
            self.run_one_blocking();
        }
    }

    fn run_one_blocking(&self) {
        let task = {
            let mut queue = self.queue.lock().unwrap_or_else(PoisonError::into_inner);
            loop {
                if let Some(task) = queue.pop_front() {
                    break task;
                }
                queue = self
                    .available
                    .wait(queue)
                    .unwrap_or_else(PoisonError::into_inner);
            }
        };
        task();
    }
}

impl Executor for EventLoop {
    fn spawn(&self, task: Task) {
        let mut queue = self.queue.lock().unwrap_or_else(PoisonError::into_inner);
        queue.push_back(task);
        trace!(queued = queue.len(), "task spawned");
        self.available.notify_one();
    }
}
