//! Bounded single-producer multi-consumer ring.
//!
//! Each worker owns one ring. The owner pushes new task pointers at
//! `tail`; the owner and any thief consume from `head`, all through
//! `compare_exchange`, so a pop racing a steal can never hand the
//! same slot to two threads.
//!
//! # Indices
//!
//! `head` and `tail` are monotonically increasing counters; they are
//! reduced modulo the (power-of-two) capacity only when addressing a
//! slot. A CAS on the monotonic value cannot succeed against a stale
//! index that happens to alias after wrapping the ring, which rules
//! out the ABA window a masked-index CAS would have.
//!
//! # Ordering
//!
//! ```text
//! Producer: Release-store slot, then Release-store tail
//! Consumer: Acquire-load tail, then Acquire-load slot, then CAS head
//! ```
//!
//! The tail acquire synchronizes with the producer's tail release, so
//! a consumer that observes `head < tail` also observes the pointer
//! written into `slots[head & mask]`. The slot value is read *before*
//! the CAS; a release CAS keeps that read from sinking below it, and
//! a failed CAS discards the value without touching the slot.
//!
//! Both ends and every slot are cache-line padded so neighboring
//! slots never share a line between the producer and a thief.

#[cfg(loom)]
use loom::sync::atomic::{AtomicPtr, AtomicUsize, Ordering};
#[cfg(not(loom))]
use std::sync::atomic::{AtomicPtr, AtomicUsize, Ordering};

use crossbeam_utils::CachePadded;
use std::ptr;

pub(crate) struct Ring<T> {
    /// Consumer index. Advanced only through CAS, by owner and
    /// thieves alike.
    head: CachePadded<AtomicUsize>,
    /// Producer index. Advanced only by the owning worker.
    tail: CachePadded<AtomicUsize>,
    slots: Box<[CachePadded<AtomicPtr<T>>]>,
    mask: usize,
}

impl<T> Ring<T> {
    /// Create a ring with the given power-of-two capacity.
    pub(crate) fn new(capacity: usize) -> Self {
        assert!(
            capacity.is_power_of_two() && capacity >= 2,
            "ring capacity must be a power of two >= 2"
        );
        let slots = (0..capacity)
            .map(|_| CachePadded::new(AtomicPtr::new(ptr::null_mut())))
            .collect();
        Self {
            head: CachePadded::new(AtomicUsize::new(0)),
            tail: CachePadded::new(AtomicUsize::new(0)),
            slots,
            mask: capacity - 1,
        }
    }

    pub(crate) fn capacity(&self) -> usize {
        self.mask + 1
    }

    /// Publish `item` at the producer end.
    ///
    /// Returns `false` without mutation if the ring is full; the
    /// caller reroutes to the injector. Must only be called by the
    /// owning worker; there is exactly one producer per ring.
    pub(crate) fn push(&self, item: *mut T) -> bool {
        let tail = self.tail.load(Ordering::Relaxed);
        let head = self.head.load(Ordering::Acquire);

        // A stale head over-counts occupancy, so a racing consumer
        // can only make this check conservative, never unsound.
        if tail.wrapping_sub(head) == self.capacity() {
            return false;
        }

        self.slots[tail & self.mask].store(item, Ordering::Release);
        self.tail.store(tail.wrapping_add(1), Ordering::Release);
        true
    }

    /// Owner-side dequeue. Retries while thieves win the CAS, returns
    /// `None` once the ring is empty.
    pub(crate) fn pop(&self) -> Option<*mut T> {
        let mut head = self.head.load(Ordering::Relaxed);
        loop {
            let tail = self.tail.load(Ordering::Acquire);
            if head == tail {
                return None;
            }

            let item = self.slots[head & self.mask].load(Ordering::Acquire);
            match self.head.compare_exchange(
                head,
                head.wrapping_add(1),
                Ordering::Release,
                Ordering::Relaxed,
            ) {
                Ok(_) => return Some(item),
                // A thief advanced head first; retry from its value.
                Err(current) => head = current,
            }
        }
    }

    /// Thief-side dequeue. Best-effort: a lost CAS returns `None` and
    /// the caller moves on to another victim.
    pub(crate) fn steal(&self) -> Option<*mut T> {
        let head = self.head.load(Ordering::Acquire);
        let tail = self.tail.load(Ordering::Acquire);
        if head == tail {
            return None;
        }

        let item = self.slots[head & self.mask].load(Ordering::Acquire);
        if self
            .head
            .compare_exchange(
                head,
                head.wrapping_add(1),
                Ordering::Release,
                Ordering::Relaxed,
            )
            .is_ok()
        {
            Some(item)
        } else {
            None
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.head.load(Ordering::Acquire) == self.tail.load(Ordering::Acquire)
    }
}


#[cfg(loom)]
mod loom_tests {
    use super::*;
    use loom::sync::Arc;
    use loom::thread;

    fn raw(value: u32) -> *mut u32 {
        Box::into_raw(Box::new(value))
    }

    fn reclaim(ptr: *mut u32) -> u32 {
        *unsafe { Box::from_raw(ptr) }
    }

    #[test]
    fn pop_and_steal_split_the_ring_exactly() {
        loom::model(|| {
            let ring = Arc::new(Ring::new(4));
            assert!(ring.push(raw(1)));
            assert!(ring.push(raw(2)));

            let thief = {
                let ring = Arc::clone(&ring);
                thread::spawn(move || {
                    let mut got = Vec::new();
                    while let Some(ptr) = ring.steal() {
                        got.push(reclaim(ptr));
                    }
                    got
                })
            };

            let mut got = Vec::new();
            while let Some(ptr) = ring.pop() {
                got.push(reclaim(ptr));
            }
            got.extend(thief.join().unwrap());

            got.sort_unstable();
            assert_eq!(got, vec![1, 2]);
        });
    }

    #[test]
    fn steal_races_with_push() {
        loom::model(|| {
            let ring = Arc::new(Ring::new(2));

            let thief = {
                let ring = Arc::clone(&ring);
                thread::spawn(move || {
                    let mut got = Vec::new();
                    for _ in 0..2 {
                        if let Some(ptr) = ring.steal() {
                            got.push(reclaim(ptr));
                        }
                    }
                    got
                })
            };

            let mut got = Vec::new();
            for v in 1..=2u32 {
                let ptr = raw(v);
                if !ring.push(ptr) {
                    got.push(reclaim(ptr));
                }
            }
            while let Some(ptr) = ring.pop() {
                got.push(reclaim(ptr));
            }
            got.extend(thief.join().unwrap());

            got.sort_unstable();
            assert_eq!(got, vec![1, 2]);
        });
    }
}
