use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::error::Failure;
use crate::executor::{ExecutorRef, Task};
use crate::future::{make_failed, make_ready, Future, Launch, Promise};

/// Collapse one level of nesting.
///
/// Chains with [`Launch::Sync`], so flattening a ready outer future whose
/// inner future is also ready yields a ready future before returning.
pub fn flatten<T>(executor: &ExecutorRef, outer: Future<Future<T>>) -> Future<T>
where
    T: Send + 'static,
{
    outer.then_future(executor, Launch::Sync, |outer| match outer.get() {
        Ok(inner) => inner,
        Err(failure) => make_failed(failure),
    })
}

struct Gather<T> {
    results: Mutex<Vec<Option<T>>>,
    remaining: AtomicUsize,
    failed: AtomicBool,
    promise: Promise<Vec<T>>,
}

impl<T: Send + 'static> Gather<T> {
    fn record(&self, index: usize, outcome: Result<T, Failure>) {
        match outcome {
            Ok(value) => {
                self.results
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)[index] = Some(value);
                if self.remaining.fetch_sub(1, Ordering::AcqRel) == 1
                    && !self.failed.load(Ordering::Acquire)
                {
                    let values = std::mem::take(
                        &mut *self.results.lock().unwrap_or_else(PoisonError::into_inner),
                    )
                    .into_iter()
                    .flatten()
                    .collect();
                    self.promise.set_value(values);
                }
            }
            Err(failure) => {
                if !self.failed.swap(true, Ordering::AcqRel) {
                    self.promise.set_failure(failure);
                }
            }
        }
    }
}

/// Wait for every input.
///
/// The result holds the values in input order. The first input to fail fails
/// the aggregate with its error; later outcomes are ignored.
pub fn when_all<T>(executor: &ExecutorRef, futures: Vec<Future<T>>) -> Future<Vec<T>>
where
    T: Send + 'static,
{
    if futures.is_empty() {
        return make_ready(Vec::new());
    }
    let count = futures.len();
    let gather = Arc::new(Gather {
        results: Mutex::new((0..count).map(|_| None).collect()),
        remaining: AtomicUsize::new(count),
        failed: AtomicBool::new(false),
        promise: Promise::new(),
    });
    let aggregate = gather.promise.get_future();
    for (index, future) in futures.into_iter().enumerate() {
        let gather = Arc::clone(&gather);
        future.on_settle(
            executor,
            Launch::Sync,
            Box::new(move |outcome| gather.record(index, outcome)),
        );
    }
    aggregate
}

/// Run `f` on `executor` and return a future of its result.
pub fn spawn_async<R, F>(executor: &ExecutorRef, f: F) -> Future<R>
where
    R: Send + 'static,
    F: FnOnce() -> R + Send + 'static,
{
    let promise = Promise::new();
    let future = promise.get_future();
    let task: Task = Box::new(move || promise.set_value(f()));
    executor.spawn(task);
    future
}
