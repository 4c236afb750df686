//! Lazily constructed, construct-once cells.
//!
//! A slot moves `Unconstructed -> Constructing -> Constructed`. The first
//! caller claims the slot and runs the constructor with no lock held; every
//! other caller waits on a condvar and then shares the winner's value. A
//! constructor that fails (or panics) returns the slot to `Unconstructed`.

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, ThreadId};

enum State<T> {
    Unconstructed,
    Constructing(ThreadId),
    Constructed(T),
}

/// A value constructed at most once, by whichever caller gets there first.
///
/// Other callers block until construction settles. A re-entrant call from
/// the constructing thread panics instead of deadlocking.
pub struct ConstructionSlot<T> {
    state: Mutex<State<T>>,
    settled: Condvar,
}

impl<T> Default for ConstructionSlot<T> {
    fn default() -> Self {
        Self {
            state: Mutex::new(State::Unconstructed),
            settled: Condvar::new(),
        }
    }
}

impl<T: Clone> ConstructionSlot<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// A slot that starts out constructed.
    pub fn with_value(value: T) -> Self {
        Self {
            state: Mutex::new(State::Constructed(value)),
            settled: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The constructed value, without waiting.
    pub fn get(&self) -> Option<T> {
        match &*self.lock() {
            State::Constructed(value) => Some(value.clone()),
            _ => None,
        }
    }

    /// Returns `true` once a value is stored.
    pub fn is_constructed(&self) -> bool {
        matches!(*self.lock(), State::Constructed(_))
    }

    /// Return the value, constructing it with `init` if nobody has yet.
    ///
    /// # Panics
    ///
    /// If `init` re-enters the same slot on the same thread, which could
    /// otherwise never finish.
    pub fn get_or_try_init<E>(&self, init: impl FnOnce() -> Result<T, E>) -> Result<T, E> {
        let me = thread::current().id();
        {
            let mut state = self.lock();
            loop {
                let owner = match &*state {
                    State::Constructed(value) => return Ok(value.clone()),
                    State::Constructing(owner) => Some(*owner),
                    State::Unconstructed => None,
                };
                match owner {
                    Some(owner) if owner == me => {
                        panic!("recursive construction of a representative on one thread");
                    }
                    Some(_) => {
                        state = self
                            .settled
                            .wait(state)
                            .unwrap_or_else(PoisonError::into_inner);
                    }
                    None => {
                        *state = State::Constructing(me);
                        break;
                    }
                }
            }
        }

        let mut claim = Claim {
            slot: self,
            armed: true,
        };
        let outcome = init();
        claim.armed = false;

        let mut state = self.lock();
        let result = match outcome {
            Ok(value) => {
                *state = State::Constructed(value.clone());
                Ok(value)
            }
            Err(e) => {
                *state = State::Unconstructed;
                Err(e)
            }
        };
        drop(state);
        self.settled.notify_all();
        result
    }
}

/// Resets a claimed slot if the constructor unwinds.
struct Claim<'a, T> {
    slot: &'a ConstructionSlot<T>,
    armed: bool,
}

impl<T> Drop for Claim<'_, T> {
    fn drop(&mut self) {
        if self.armed {
            *self
                .slot
                .state
                .lock()
                .unwrap_or_else(PoisonError::into_inner) = State::Unconstructed;
            self.slot.settled.notify_all();
        }
    }
}
