//! One-shot completion handles.
//!
//! Every submitted task gets a paired [`Promise`] / [`JoinHandle`].
//! The worker that executes the task resolves the promise exactly
//! once; the submitter blocks on [`JoinHandle::join`] to collect the
//! value or the captured panic. If the pool is torn down before the
//! task ever ran, dropping the unresolved promise wakes the waiter
//! with [`JoinError::Aborted`] instead of leaving it blocked.

use parking_lot::{Condvar, Mutex};
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Captured panic payload, as produced by `std::panic::catch_unwind`.
pub type Panic = Box<dyn Any + Send + 'static>;

enum State<T> {
    Pending,
    Ready(Result<T, Panic>),
    Abandoned,
    Claimed,
}

struct Slot<T> {
    state: Mutex<State<T>>,
    ready: Condvar,
}

/// Create a linked promise/handle pair.
pub(crate) fn completion<T>() -> (Promise<T>, JoinHandle<T>) {
    let slot = Arc::new(Slot {
        state: Mutex::new(State::Pending),
        ready: Condvar::new(),
    });
    (
        Promise {
            slot: Some(slot.clone()),
        },
        JoinHandle { slot },
    )
}

/// Write end of a completion slot. Held inside the task closure.
pub(crate) struct Promise<T> {
    slot: Option<Arc<Slot<T>>>,
}

impl<T> Promise<T> {
    /// Resolve the slot with the task's outcome and wake the waiter.
    pub(crate) fn complete(mut self, result: Result<T, Panic>) {
        if let Some(slot) = self.slot.take() {
            let mut state = slot.state.lock();
            *state = State::Ready(result);
            drop(state);
            slot.ready.notify_all();
        }
    }
}

impl<T> Drop for Promise<T> {
    fn drop(&mut self) {
        // Dropped without completing: the task never ran.
        if let Some(slot) = self.slot.take() {
            let mut state = slot.state.lock();
            if matches!(*state, State::Pending) {
                *state = State::Abandoned;
                drop(state);
                slot.ready.notify_all();
            }
        }
    }
}

/// Waitable handle to a submitted task's result.
///
/// Returned by [`Pool::submit`](crate::Pool::submit). Dropping the
/// handle detaches it; the task still runs.
pub struct JoinHandle<T> {
    slot: Arc<Slot<T>>,
}

impl<T> JoinHandle<T> {
    /// Block until the task finishes and return its result.
    ///
    /// A task that panicked yields [`JoinError::Panicked`] carrying
    /// the panic payload, mirroring `std::thread::JoinHandle::join`.
    pub fn join(self) -> Result<T, JoinError> {
        let mut state = self.slot.state.lock();
        while matches!(*state, State::Pending) {
            self.slot.ready.wait(&mut state);
        }
        match std::mem::replace(&mut *state, State::Claimed) {
            State::Ready(Ok(value)) => Ok(value),
            State::Ready(Err(payload)) => Err(JoinError::Panicked(payload)),
            State::Abandoned => Err(JoinError::Aborted),
            // join consumes the handle, so the slot can only be
            // claimed once.
            State::Pending | State::Claimed => unreachable!("completion slot claimed twice"),
        }
    }

    /// Whether the task has finished (or was abandoned).
    pub fn is_finished(&self) -> bool {
        !matches!(*self.slot.state.lock(), State::Pending)
    }
}

impl<T> fmt::Debug for JoinHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JoinHandle")
            .field("finished", &self.is_finished())
            .finish()
    }
}

/// Why a [`JoinHandle::join`] did not produce a value.
pub enum JoinError {
    /// The task panicked; the payload is what `catch_unwind` caught.
    Panicked(Panic),
    /// The pool shut down before the task ran.
    Aborted,
}

impl JoinError {
    /// True if the task panicked.
    pub fn is_panic(&self) -> bool {
        matches!(self, JoinError::Panicked(_))
    }

    /// Consume the error and return the panic payload, if any.
    pub fn try_into_panic(self) -> Option<Panic> {
        match self {
            JoinError::Panicked(payload) => Some(payload),
            JoinError::Aborted => None,
        }
    }

    fn panic_message(&self) -> Option<&str> {
        match self {
            JoinError::Panicked(payload) => payload
                .downcast_ref::<&'static str>()
                .copied()
                .or_else(|| payload.downcast_ref::<String>().map(String::as_str)),
            JoinError::Aborted => None,
        }
    }
}

impl fmt::Debug for JoinError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JoinError::Panicked(_) => f
                .debug_tuple("Panicked")
                .field(&self.panic_message().unwrap_or("..."))
                .finish(),
            JoinError::Aborted => f.write_str("Aborted"),
        }
    }
}

impl fmt::Display for JoinError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JoinError::Panicked(_) => match self.panic_message() {
                Some(msg) => write!(f, "task panicked: {}", msg),
                None => f.write_str("task panicked"),
            },
            JoinError::Aborted => f.write_str("task aborted before it ran"),
        }
    }
}

impl std::error::Error for JoinError {}
