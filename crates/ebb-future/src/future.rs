//! Single-assignment future/promise pair.
//!
//! A [`Promise`] and the [`Future`]s derived from it share one state box that
//! moves exactly once from pending to either fulfilled or failed. Readiness is
//! an atomic flag readable without locking; the value slot and the single
//! continuation slot sit behind a mutex that is never held while user code
//! runs.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::debug;

use crate::error::Failure;
use crate::executor::{ExecutorRef, Task};

/// When a continuation registered on an already-terminal future runs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Launch {
    /// Inline, before `then` returns.
    #[default]
    Sync,
    /// Scheduled onto the executor passed to `then`.
    Async,
}

pub(crate) type Callback<T> = Box<dyn FnOnce(Result<T, Failure>) + Send + 'static>;

struct Continuation<T> {
    executor: ExecutorRef,
    callback: Callback<T>,
}

struct Slot<T> {
    settled: bool,
    outcome: Option<Result<T, Failure>>,
    has_continuation: bool,
    continuation: Option<Continuation<T>>,
}

pub(crate) struct State<T> {
    ready: AtomicBool,
    slot: Mutex<Slot<T>>,
}

impl<T> State<T> {
    fn pending() -> Self {
        Self {
            ready: AtomicBool::new(false),
            slot: Mutex::new(Slot {
                settled: false,
                outcome: None,
                has_continuation: false,
                continuation: None,
            }),
        }
    }

    fn settled(outcome: Result<T, Failure>) -> Self {
        Self {
            ready: AtomicBool::new(true),
            slot: Mutex::new(Slot {
                settled: true,
                outcome: Some(outcome),
                has_continuation: false,
                continuation: None,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Slot<T>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }
}

impl<T: Send + 'static> State<T> {
    /// Move the state to its terminal outcome. A stored continuation is
    /// always scheduled, never run on the setter's stack.
    fn settle(&self, outcome: Result<T, Failure>) {
        let scheduled = {
            let mut slot = self.lock();
            if slot.settled {
                panic!("promise already satisfied: a value or failure was set twice");
            }
            slot.settled = true;
            let scheduled = match slot.continuation.take() {
                Some(continuation) => Some((continuation, outcome)),
                None => {
                    slot.outcome = Some(outcome);
                    None
                }
            };
            self.ready.store(true, Ordering::Release);
            scheduled
        };
        if let Some((Continuation { executor, callback }, outcome)) = scheduled {
            let task: Task = Box::new(move || callback(outcome));
            executor.spawn(task);
        }
    }

    fn register(&self, executor: &ExecutorRef, launch: Launch, callback: Callback<T>) {
        let outcome = {
            let mut slot = self.lock();
            if slot.has_continuation {
                panic!("a continuation is already registered on this future");
            }
            slot.has_continuation = true;
            if !slot.settled {
                slot.continuation = Some(Continuation {
                    executor: Arc::clone(executor),
                    callback,
                });
                return;
            }
            take_outcome(&mut slot)
        };
        match launch {
            Launch::Sync => callback(outcome),
            Launch::Async => executor.spawn(Box::new(move || callback(outcome))),
        }
    }
}

fn take_outcome<T>(slot: &mut Slot<T>) -> Result<T, Failure> {
    match slot.outcome.take() {
        Some(outcome) => outcome,
        None => panic!("future value already consumed"),
    }
}

/// Read side of a single-assignment result.
///
/// Futures are move-only. A default-constructed future is *invalid*: it has
/// no state, and every query on it panics.
pub struct Future<T> {
    state: Option<Arc<State<T>>>,
}

impl<T> Default for Future<T> {
    fn default() -> Self {
        Self { state: None }
    }
}

impl<T> std::fmt::Debug for Future<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let status = match &self.state {
            None => "invalid",
            Some(state) if state.is_ready() => "ready",
            Some(_) => "pending",
        };
        write!(f, "Future({status})")
    }
}

impl<T> Future<T> {
    pub(crate) fn settled(outcome: Result<T, Failure>) -> Self {
        Self {
            state: Some(Arc::new(State::settled(outcome))),
        }
    }

    fn state(&self) -> &Arc<State<T>> {
        match &self.state {
            Some(state) => state,
            None => panic!("use of an invalid (default-constructed) future"),
        }
    }

    /// `false` only for a default-constructed future.
    pub fn is_valid(&self) -> bool {
        self.state.is_some()
    }

    /// `true` once fulfilled or failed. Never blocks.
    pub fn is_ready(&self) -> bool {
        self.state().is_ready()
    }

    /// Take the value, or the failure that was set instead.
    ///
    /// # Panics
    ///
    /// If the future is still pending: this core has no blocking wait, pump
    /// an [`EventLoop`](crate::EventLoop) instead.
    pub fn get(self) -> Result<T, Failure> {
        let state = self.state();
        if !state.is_ready() {
            panic!("get() called on unready future");
        }
        take_outcome(&mut state.lock())
    }
}

impl<T: Send + 'static> Future<T> {
    pub(crate) fn on_settle(self, executor: &ExecutorRef, launch: Launch, callback: Callback<T>) {
        self.state().register(executor, launch, callback);
    }

    /// Register the continuation of this future.
    ///
    /// `f` receives the terminal future. If this future is already terminal
    /// `launch` decides between running `f` inline and scheduling it on
    /// `executor`; otherwise `f` is scheduled on `executor` by whichever
    /// thread completes the promise.
    ///
    /// # Panics
    ///
    /// If a continuation was already registered on the same state.
    pub fn then<R, F>(self, executor: &ExecutorRef, launch: Launch, f: F) -> Future<R>
    where
        R: Send + 'static,
        F: FnOnce(Future<T>) -> R + Send + 'static,
    {
        let promise = Promise::new();
        let future = promise.get_future();
        self.on_settle(
            executor,
            launch,
            Box::new(move |outcome| promise.set_value(f(Future::settled(outcome)))),
        );
        future
    }

    /// Like [`then`](Self::then) for continuations that can fail.
    pub fn then_try<R, F>(self, executor: &ExecutorRef, launch: Launch, f: F) -> Future<R>
    where
        R: Send + 'static,
        F: FnOnce(Future<T>) -> Result<R, Failure> + Send + 'static,
    {
        let promise = Promise::new();
        let future = promise.get_future();
        self.on_settle(
            executor,
            launch,
            Box::new(move |outcome| promise.set_result(f(Future::settled(outcome)))),
        );
        future
    }

    /// Like [`then`](Self::then) for continuations that return another
    /// future; the result tracks that inner future.
    pub fn then_future<R, F>(self, executor: &ExecutorRef, launch: Launch, f: F) -> Future<R>
    where
        R: Send + 'static,
        F: FnOnce(Future<T>) -> Future<R> + Send + 'static,
    {
        let promise = Promise::new();
        let future = promise.get_future();
        let inner_executor = Arc::clone(executor);
        self.on_settle(
            executor,
            launch,
            Box::new(move |outcome| {
                f(Future::settled(outcome)).on_settle(
                    &inner_executor,
                    Launch::Sync,
                    Box::new(move |inner| promise.set_result(inner)),
                );
            }),
        );
        future
    }

    /// Transform the value; a failure passes through untouched.
    pub fn map<R, F>(self, executor: &ExecutorRef, f: F) -> Future<R>
    where
        R: Send + 'static,
        F: FnOnce(T) -> R + Send + 'static,
    {
        let promise = Promise::new();
        let future = promise.get_future();
        self.on_settle(
            executor,
            Launch::Sync,
            Box::new(move |outcome| promise.set_result(outcome.map(f))),
        );
        future
    }
}

/// Write side of a single-assignment result.
///
/// Exactly one of [`set_value`](Self::set_value),
/// [`set_failure`](Self::set_failure) or [`set_result`](Self::set_result) may
/// be called, once. A second call panics.
pub struct Promise<T> {
    state: Arc<State<T>>,
}

impl<T> Default for Promise<T> {
    fn default() -> Self {
        Self {
            state: Arc::new(State::pending()),
        }
    }
}

impl<T> Promise<T> {
    /// A pending promise with no future handed out yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// The future tracking this promise. Repeated calls hand out handles to
    /// the same state; only one of them may register a continuation.
    pub fn get_future(&self) -> Future<T> {
        Future {
            state: Some(Arc::clone(&self.state)),
        }
    }

    /// Returns `true` once a value or failure has been set.
    pub fn is_satisfied(&self) -> bool {
        self.state.is_ready()
    }
}

impl<T: Send + 'static> Promise<T> {
    /// Fulfil the promise and run any registered continuation.
    ///
    /// A promise is settled once: setting it a second time panics.
    pub fn set_value(&self, value: T) {
        self.state.settle(Ok(value));
    }

    /// Fail the promise. See [`set_value`](Self::set_value).
    pub fn set_failure(&self, failure: impl Into<Failure>) {
        self.state.settle(Err(failure.into()));
    }

    /// Settle the promise from a `Result`.
    pub fn set_result(&self, result: Result<T, Failure>) {
        self.state.settle(result);
    }
}

impl<T> Drop for Promise<T> {
    fn drop(&mut self) {
        if !self.state.is_ready() {
            // No cancellation exists: the future stays pending forever.
            debug!("promise dropped before being satisfied");
        }
    }
}

/// A future that is already fulfilled with `value`.
pub fn make_ready<T>(value: T) -> Future<T> {
    Future::settled(Ok(value))
}

/// A future that has already failed with `failure`.
pub fn make_failed<T>(failure: impl Into<Failure>) -> Future<T> {
    Future::settled(Err(failure.into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::EventLoop;
    use std::sync::atomic::AtomicUsize;
    use std::thread;

    #[test]
    fn ready_future_yields_value() {
        let future = make_ready(5u32);
        assert!(future.is_valid());
        assert!(future.is_ready());
        assert_eq!(future.get().unwrap(), 5);
    }

    #[test]
    fn failed_future_yields_failure() {
        let future: Future<u32> = make_failed(Failure::msg("nope"));
        assert!(future.is_ready());
        assert_eq!(future.get().unwrap_err().to_string(), "nope");
    }

    #[test]
    fn default_future_is_invalid() {
        let future: Future<u8> = Future::default();
        assert!(!future.is_valid());
        assert_eq!(format!("{future:?}"), "Future(invalid)");
    }

    #[test]
    #[should_panic(expected = "invalid")]
    fn querying_invalid_future_panics() {
        let future: Future<u8> = Future::default();
        let _ = future.is_ready();
    }

    #[test]
    #[should_panic(expected = "unready")]
    fn get_on_pending_future_panics() {
        let promise: Promise<u8> = Promise::new();
        let _ = promise.get_future().get();
    }

    #[test]
    #[should_panic(expected = "already satisfied")]
    fn second_set_value_panics() {
        let promise = Promise::new();
        promise.set_value(1u8);
        promise.set_value(2u8);
    }

    #[test]
    #[should_panic(expected = "already satisfied")]
    fn set_failure_after_value_panics() {
        let promise = Promise::new();
        promise.set_value(1u8);
        promise.set_failure(Failure::msg("late"));
    }

    #[test]
    fn first_set_is_the_one_observed() {
        let promise = Promise::new();
        let future = promise.get_future();
        promise.set_value(1u8);
        let second = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            promise.set_value(2u8);
        }));
        assert!(second.is_err());
        assert_eq!(future.get().unwrap(), 1);
    }

    #[test]
    #[should_panic(expected = "already registered")]
    fn second_continuation_panics() {
        let el = EventLoop::new();
        let exec = el.executor();
        let promise: Promise<u8> = Promise::new();
        let _a = promise.get_future().then(&exec, Launch::Sync, |_| ());
        let _b = promise.get_future().then(&exec, Launch::Sync, |_| ());
    }

    #[test]
    fn pending_then_is_scheduled_not_inline() {
        let el = EventLoop::new();
        let exec = el.executor();
        let promise = Promise::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let chained = promise.get_future().then(&exec, Launch::Sync, move |f| {
            sink.lock().unwrap().push(f.get().unwrap());
        });

        promise.set_value(9u32);
        assert!(seen.lock().unwrap().is_empty(), "ran inside the setter");
        assert!(!chained.is_ready());

        assert_eq!(el.run_until_idle(), 1);
        assert_eq!(*seen.lock().unwrap(), vec![9]);
        assert!(chained.is_ready());
    }

    #[test]
    fn immediate_then_runs_before_returning() {
        let el = EventLoop::new();
        let exec = el.executor();
        let hits = Arc::new(AtomicUsize::new(0));
        let h = Arc::clone(&hits);
        let chained = make_ready(4u32).then(&exec, Launch::Sync, move |f| {
            h.fetch_add(1, Ordering::SeqCst);
            f.get().unwrap() * 2
        });
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(el.pending(), 0);
        assert_eq!(chained.get().unwrap(), 8);
    }

    #[test]
    fn deferred_then_on_ready_future_is_scheduled() {
        let el = EventLoop::new();
        let exec = el.executor();
        let chained = make_ready(4u32).then(&exec, Launch::Async, |f| f.get().unwrap() + 1);
        assert!(!chained.is_ready());
        assert_eq!(el.pending(), 1);
        el.run_until_idle();
        assert_eq!(chained.get().unwrap(), 5);
    }

    #[test]
    fn then_try_propagates_failure() {
        let el = EventLoop::new();
        let exec = el.executor();
        let chained: Future<u32> = make_failed::<u32>(Failure::msg("upstream"))
            .then_try(&exec, Launch::Sync, |f| Ok(f.get()? + 1));
        assert_eq!(chained.get().unwrap_err().to_string(), "upstream");
    }

    #[test]
    fn then_future_tracks_inner() {
        let el = EventLoop::new();
        let exec = el.executor();
        let inner = Promise::new();
        let inner_future = inner.get_future();
        let chained = make_ready(()).then_future(&exec, Launch::Sync, move |_| inner_future);
        assert!(!chained.is_ready());
        inner.set_value("inner");
        el.run_until_idle();
        assert_eq!(chained.get().unwrap(), "inner");
    }

    #[test]
    fn map_passes_failure_through() {
        let el = EventLoop::new();
        let exec = el.executor();
        let ok = make_ready(2u32).map(&exec, |v| v * 10);
        assert_eq!(ok.get().unwrap(), 20);
        let failed = make_failed::<u32>(Failure::msg("x")).map(&exec, |v| v * 10);
        assert_eq!(failed.get().unwrap_err().to_string(), "x");
    }

    #[test]
    fn continuation_runs_exactly_once_under_racing_setter() {
        for _ in 0..50 {
            let el = EventLoop::new();
            let exec = el.executor();
            let promise = Promise::new();
            let future = promise.get_future();
            let hits = Arc::new(AtomicUsize::new(0));
            let h = Arc::clone(&hits);
            let setter = thread::spawn(move || promise.set_value(3u8));
            let chained = future.then(&exec, Launch::Sync, move |f| {
                h.fetch_add(1, Ordering::SeqCst);
                f.get().unwrap()
            });
            setter.join().unwrap();
            el.run_until_idle();
            assert_eq!(hits.load(Ordering::SeqCst), 1);
            assert_eq!(chained.get().unwrap(), 3);
        }
    }

    #[test]
    fn dropped_promise_leaves_future_pending() {
        let promise: Promise<u8> = Promise::new();
        let future = promise.get_future();
        drop(promise);
        assert!(!future.is_ready());
    }
}
