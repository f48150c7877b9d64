//! Worker threads: dispatch loop, victim selection, idle back-off.

use crate::pool::PoolCounters;
use crate::queue::{Injector, Ring};
use crate::task::Task;
use crate::util::{Backoff, IdleStage};
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64;
use std::cell::Cell;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

pub(crate) type WorkerId = usize;

/// Execution counters for one worker.
pub(crate) struct WorkerStats {
    pub(crate) tasks_executed: AtomicU64,
    pub(crate) tasks_stolen: AtomicU64,
}

/// Point-in-time copy of one worker's counters.
///
/// Returned by [`Pool::worker_metrics`](crate::Pool::worker_metrics).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerMetrics {
    /// Tasks this worker ran to completion.
    pub tasks_executed: u64,
    /// Tasks this worker took from the injector or a peer's ring.
    pub tasks_stolen: u64,
}

/// Per-worker block shared between the worker thread, thieves, and
/// the submit path.
pub(crate) struct WorkerState {
    pub(crate) ring: Ring<Task>,
    /// Advisory flag: set while the worker is in its deepest
    /// back-off sleep. The wake hint scans for it.
    pub(crate) sleeping: AtomicBool,
    pub(crate) backoff: Backoff,
    pub(crate) stats: WorkerStats,
}

impl WorkerState {
    pub(crate) fn new(queue_capacity: usize) -> Self {
        Self {
            ring: Ring::new(queue_capacity),
            sleeping: AtomicBool::new(false),
            backoff: Backoff::new(),
            stats: WorkerStats {
                tasks_executed: AtomicU64::new(0),
                tasks_stolen: AtomicU64::new(0),
            },
        }
    }

    pub(crate) fn metrics(&self) -> WorkerMetrics {
        WorkerMetrics {
            tasks_executed: self.stats.tasks_executed.load(Ordering::Relaxed),
            tasks_stolen: self.stats.tasks_stolen.load(Ordering::Relaxed),
        }
    }
}

thread_local! {
    // (pool id, worker index) while a worker thread is running its
    // loop. The pool id keeps a worker of pool A from pushing onto
    // pool B's single-producer rings when tasks cross pools.
    static CURRENT_WORKER: Cell<Option<(u64, WorkerId)>> = const { Cell::new(None) };
}

/// Index of the current thread within the pool identified by
/// `pool_id`, if this thread is one of its workers.
pub(crate) fn current_worker(pool_id: u64) -> Option<WorkerId> {
    CURRENT_WORKER.with(|current| match current.get() {
        Some((id, index)) if id == pool_id => Some(index),
        _ => None,
    })
}

struct IdentityGuard;

impl Drop for IdentityGuard {
    fn drop(&mut self) {
        CURRENT_WORKER.with(|current| current.set(None));
    }
}

fn register(pool_id: u64, index: WorkerId) -> IdentityGuard {
    CURRENT_WORKER.with(|current| current.set(Some((pool_id, index))));
    IdentityGuard
}

pub(crate) struct Worker {
    pub(crate) id: WorkerId,
    pool_id: u64,
}

impl Worker {
    pub(crate) fn new(id: WorkerId, pool_id: u64) -> Self {
        Self { id, pool_id }
    }

    // main loop
    pub(crate) fn run(
        &self,
        workers: Arc<Vec<WorkerState>>,
        injector: Arc<Injector>,
        counters: Arc<PoolCounters>,
        stop: Arc<AtomicBool>,
    ) {
        let _identity = register(self.pool_id, self.id);
        let mut rng = Pcg64::seed_from_u64(rand::thread_rng().gen());
        let me = &workers[self.id];

        while !stop.load(Ordering::Acquire) {
            // local -> injector -> steal
            if let Some(ptr) = self.find_task(me, &workers, &injector, &mut rng) {
                me.backoff.reset();
                self.execute_task(ptr, me, &counters);
            } else {
                self.idle(me);
            }
        }
    }

    fn find_task(
        &self,
        me: &WorkerState,
        workers: &[WorkerState],
        injector: &Injector,
        rng: &mut Pcg64,
    ) -> Option<*mut Task> {
        // 1. Own ring first (best cache locality).
        if let Some(ptr) = me.ring.pop() {
            return Some(ptr);
        }

        // 2. Shared injector.
        if let Some(ptr) = injector.pop() {
            me.stats.tasks_stolen.fetch_add(1, Ordering::Relaxed);
            return Some(ptr);
        }

        // 3. Rob a random peer.
        self.steal_from_peers(me, workers, rng)
    }

    /// Up to `2N` uniformly random victim picks per dispatch miss;
    /// self-picks are skipped and count as spent attempts.
    fn steal_from_peers(
        &self,
        me: &WorkerState,
        workers: &[WorkerState],
        rng: &mut Pcg64,
    ) -> Option<*mut Task> {
        let victim_count = workers.len();
        if victim_count <= 1 {
            return None;
        }

        for _ in 0..victim_count * 2 {
            let victim = rng.gen_range(0..victim_count);
            if victim == self.id {
                continue;
            }

            if let Some(ptr) = workers[victim].ring.steal() {
                me.stats.tasks_stolen.fetch_add(1, Ordering::Relaxed);
                return Some(ptr);
            }
        }

        None
    }

    fn execute_task(&self, ptr: *mut Task, me: &WorkerState, counters: &PoolCounters) {
        counters.active.fetch_add(1, Ordering::Relaxed);

        // SAFETY: the queue protocol hands each task pointer to
        // exactly one dequeuer; we own it from here on.
        let task = unsafe { Task::from_raw(ptr) };
        let tid = task.id;

        let result = catch_unwind(AssertUnwindSafe(|| task.execute()));
        if result.is_err() {
            // Handled tasks capture their panic into the completion
            // slot before it can reach us, so this is a
            // fire-and-forget task with nowhere else to report.
            eprintln!("task {} panicked", tid);
        }

        counters.active.fetch_sub(1, Ordering::Relaxed);
        // Release pairs with the Acquire in Pool::wait, making the
        // task's effects visible to whoever observes quiescence.
        counters.outstanding.fetch_sub(1, Ordering::Release);
        me.stats.tasks_executed.fetch_add(1, Ordering::Relaxed);
    }

    fn idle(&self, me: &WorkerState) {
        match me.backoff.miss() {
            IdleStage::Yield => thread::yield_now(),
            IdleStage::ShortSleep => thread::sleep(Duration::from_micros(10)),
            IdleStage::LongSleep => thread::sleep(Duration::from_micros(100)),
            IdleStage::Deep => {
                me.sleeping.store(true, Ordering::Release);
                thread::sleep(Duration::from_millis(1));
                me.sleeping.store(false, Ordering::Release);
            }
        }
    }
}
