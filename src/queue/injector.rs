//! Unbounded multi-producer multi-consumer injector list.
//!
//! External submitters land here, and so does every task whose
//! owner's local ring was full. The list is an intrusive LIFO stack:
//! producers CAS themselves onto `head`, consumers CAS `head` to its
//! successor. Links live inside [`Task`] and are only meaningful
//! while a task is resident.
//!
//! # Reclamation
//!
//! `pop` reads `(*head).next` before its CAS, which is only sound
//! because tasks are never recycled onto a queue: every task pointer
//! is freshly allocated at submission and freed exactly once, by the
//! thread that won it. An allocator that reused a node while a
//! stale `pop` still holds its pointer would need hazard pointers or
//! epoch reclamation; this crate deliberately has no such path.

#[cfg(loom)]
use loom::sync::atomic::{AtomicPtr, AtomicUsize, Ordering};
#[cfg(not(loom))]
use std::sync::atomic::{AtomicPtr, AtomicUsize, Ordering};

use crate::task::Task;
use crossbeam_utils::CachePadded;
use std::ptr;

pub(crate) struct Injector {
    head: CachePadded<AtomicPtr<Task>>,
    len: CachePadded<AtomicUsize>,
}

impl Injector {
    pub(crate) fn new() -> Self {
        Self {
            head: CachePadded::new(AtomicPtr::new(ptr::null_mut())),
            len: CachePadded::new(AtomicUsize::new(0)),
        }
    }

    /// Push a task onto the list. Callable from any thread.
    pub(crate) fn push(&self, task: *mut Task) {
        let mut head = self.head.load(Ordering::Acquire);
        loop {
            // The link is written before the CAS publishes the task,
            // and no thread writes it again while resident.
            unsafe { (*task).next = head };
            match self
                .head
                .compare_exchange_weak(head, task, Ordering::Release, Ordering::Acquire)
            {
                Ok(_) => break,
                Err(current) => head = current,
            }
        }
        self.len.fetch_add(1, Ordering::Relaxed);
    }

    /// Pop the most recently pushed task, if any.
    pub(crate) fn pop(&self) -> Option<*mut Task> {
        let mut head = self.head.load(Ordering::Acquire);
        while !head.is_null() {
            let next = unsafe { (*head).next };
            match self
                .head
                .compare_exchange_weak(head, next, Ordering::Release, Ordering::Acquire)
            {
                Ok(_) => {
                    self.len.fetch_sub(1, Ordering::Relaxed);
                    return Some(head);
                }
                Err(current) => head = current,
            }
        }
        None
    }

    /// Approximate number of resident tasks.
    pub(crate) fn len(&self) -> usize {
        self.len.load(Ordering::Relaxed)
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.head.load(Ordering::Acquire).is_null()
    }

    /// Detach the whole chain and free every task on it, unexecuted.
    ///
    /// Used at pool teardown to reclaim stragglers. The swap detaches
    /// the chain atomically, so a racing `pop` either won its node
    /// before the swap or observes an empty list after it.
    pub(crate) fn drain(&self) -> usize {
        let mut head = self.head.swap(ptr::null_mut(), Ordering::AcqRel);
        let mut freed = 0;
        while !head.is_null() {
            let task = unsafe { Task::from_raw(head) };
            head = task.next;
            drop(task);
            freed += 1;
        }
        if freed > 0 {
            self.len.fetch_sub(freed, Ordering::Relaxed);
        }
        freed
    }
}

impl Drop for Injector {
    fn drop(&mut self) {
        self.drain();
    }
}


#[cfg(loom)]
mod loom_tests {
    use super::*;
    use loom::sync::Arc;
    use loom::thread;

    #[test]
    fn concurrent_pushes_all_survive() {
        loom::model(|| {
            let injector = Arc::new(Injector::new());

            let other = {
                let injector = Arc::clone(&injector);
                thread::spawn(move || {
                    injector.push(Task::new(|| {}).into_raw());
                })
            };
            injector.push(Task::new(|| {}).into_raw());
            other.join().unwrap();

            let mut popped = 0;
            while let Some(ptr) = injector.pop() {
                drop(unsafe { Task::from_raw(ptr) });
                popped += 1;
            }
            assert_eq!(popped, 2);
        });
    }

    #[test]
    fn pop_races_with_push() {
        loom::model(|| {
            let injector = Arc::new(Injector::new());

            let producer = {
                let injector = Arc::clone(&injector);
                thread::spawn(move || {
                    injector.push(Task::new(|| {}).into_raw());
                })
            };

            let mut got = 0;
            for _ in 0..2 {
                if let Some(ptr) = injector.pop() {
                    drop(unsafe { Task::from_raw(ptr) });
                    got += 1;
                }
            }
            producer.join().unwrap();

            got += injector.drain();
            assert_eq!(got, 1);
        });
    }
}
