//! Task representation and execution.
//!
//! A [`Task`] is the heap-allocated unit of work that moves through
//! the queues by raw pointer. It is allocated once at submission and
//! freed by whichever worker executes it; tasks are never recycled
//! onto a queue, which keeps the injector's CAS protocol free of ABA
//! hazards.

use std::ptr;
use std::sync::atomic::{AtomicU64, Ordering};

/// Global task ID counter
static TASK_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct TaskId(u64);

impl TaskId {
    fn next() -> Self {
        TaskId(TASK_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Internal task representation
pub(crate) struct Task {
    pub(crate) id: TaskId,
    func: Box<dyn FnOnce() + Send + 'static>,
    /// Intrusive forward link, meaningful only while the task is
    /// resident on the injector list. Written by the pushing thread
    /// before the task is published, read once by the popping thread.
    pub(crate) next: *mut Task,
}

impl Task {
    /// Create a new task around an erased callable.
    pub(crate) fn new<F>(f: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Task {
            id: TaskId::next(),
            func: Box::new(f),
            next: ptr::null_mut(),
        }
    }

    /// Move the task to the heap and leak it as a queue pointer.
    pub(crate) fn into_raw(self) -> *mut Task {
        Box::into_raw(Box::new(self))
    }

    /// Reclaim a task pointer produced by [`Task::into_raw`].
    ///
    /// # Safety
    ///
    /// `ptr` must have come from `into_raw` and must not be reclaimed
    /// twice; the queue protocol guarantees each pointer is consumed
    /// by exactly one thread.
    pub(crate) unsafe fn from_raw(ptr: *mut Task) -> Box<Task> {
        Box::from_raw(ptr)
    }

    /// Execute the task
    pub(crate) fn execute(self) {
        (self.func)()
    }
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task").field("id", &self.id).finish()
    }
}
