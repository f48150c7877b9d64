//! Pool facade: construction, submission, quiescence, shutdown.

use crate::config::Config;
use crate::error::{Error, Result};
use crate::handle::{self, JoinHandle};
use crate::queue::Injector;
use crate::task::Task;
use crate::worker::{self, Worker, WorkerMetrics, WorkerState};
use crossbeam_utils::CachePadded;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

/// Distinguishes pools for the thread-local worker identity check.
static NEXT_POOL_ID: AtomicU64 = AtomicU64::new(1);

/// Shared task accounting.
pub(crate) struct PoolCounters {
    /// Tasks currently executing on some worker.
    pub(crate) active: CachePadded<AtomicUsize>,
    /// Tasks accepted but not yet finished: queued anywhere or
    /// executing. Incremented before a task is published, decremented
    /// after it ran, so there is no window where a live task is
    /// invisible to [`Pool::wait`].
    pub(crate) outstanding: CachePadded<AtomicUsize>,
}

impl PoolCounters {
    fn new() -> Self {
        Self {
            active: CachePadded::new(AtomicUsize::new(0)),
            outstanding: CachePadded::new(AtomicUsize::new(0)),
        }
    }
}

/// A fixed-size, work-stealing thread pool.
///
/// Tasks submitted from outside land on a shared injector list;
/// tasks submitted from inside a worker go to that worker's local
/// ring. Idle workers drain their ring, then the injector, then
/// steal from random peers. Dropping the pool waits for quiescence,
/// stops the workers, and joins them.
pub struct Pool {
    pool_id: u64,
    workers: Arc<Vec<WorkerState>>,
    injector: Arc<Injector>,
    counters: Arc<PoolCounters>,
    stop: Arc<AtomicBool>,
    threads: Vec<thread::JoinHandle<()>>,
    num_threads: usize,
}

impl Pool {
    /// Create a pool with one worker per available CPU.
    pub fn new() -> Result<Self> {
        Self::with_config(Config::default())
    }

    /// Create a pool with an explicit worker count.
    pub fn with_threads(num_threads: usize) -> Result<Self> {
        Self::with_config(Config::builder().num_threads(num_threads).build()?)
    }

    /// Create a pool from a full [`Config`].
    pub fn with_config(config: Config) -> Result<Self> {
        config.validate()?;
        let num_threads = config.worker_threads();
        let pool_id = NEXT_POOL_ID.fetch_add(1, Ordering::Relaxed);

        let workers: Arc<Vec<WorkerState>> = Arc::new(
            (0..num_threads)
                .map(|_| WorkerState::new(config.queue_capacity))
                .collect(),
        );
        let injector = Arc::new(Injector::new());
        let counters = Arc::new(PoolCounters::new());
        let stop = Arc::new(AtomicBool::new(false));

        let mut threads = Vec::with_capacity(num_threads);

        for id in 0..num_threads {
            let worker = Worker::new(id, pool_id);
            let workers = Arc::clone(&workers);
            let injector = Arc::clone(&injector);
            let counters = Arc::clone(&counters);
            let stop_flag = Arc::clone(&stop);
            let name = format!("{}-{}", config.thread_name_prefix, id);

            let mut builder = thread::Builder::new().name(name);
            if let Some(stack_size) = config.stack_size {
                builder = builder.stack_size(stack_size);
            }

            let spawned = builder.spawn(move || {
                worker.run(workers, injector, counters, stop_flag);
            });

            match spawned {
                Ok(thread) => threads.push(thread),
                Err(e) => {
                    // Unwind the workers we already started.
                    stop.store(true, Ordering::Release);
                    for thread in threads {
                        let _ = thread.join();
                    }
                    return Err(Error::executor(format!(
                        "failed to spawn worker {}: {}",
                        id, e
                    )));
                }
            }
        }

        Ok(Self {
            pool_id,
            workers,
            injector,
            counters,
            stop,
            threads,
            num_threads,
        })
    }

    /// Submit a task and get a handle to its result.
    ///
    /// The callable runs exactly once on some worker. Its return
    /// value, or the panic it raised, is delivered through the
    /// returned [`JoinHandle`].
    pub fn submit<F, R>(&self, f: F) -> JoinHandle<R>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        let (promise, join) = handle::completion();

        self.schedule(Task::new(move || {
            let result = catch_unwind(AssertUnwindSafe(f));
            promise.complete(result);
        }));

        join
    }

    /// Submit a task nobody will wait for.
    ///
    /// A panic in the task is caught by the worker and reported to
    /// stderr; the worker survives.
    pub fn execute<F>(&self, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.schedule(Task::new(f));
    }

    fn schedule(&self, task: Task) {
        self.counters.outstanding.fetch_add(1, Ordering::Relaxed);
        let ptr = task.into_raw();

        // Tasks spawned from inside one of our workers stay on that
        // worker's ring for locality. A full ring, or any other
        // submitter, goes through the shared injector instead, so
        // submission never blocks.
        if let Some(id) = worker::current_worker(self.pool_id) {
            if self.workers[id].ring.push(ptr) {
                self.notify_sleeper();
                return;
            }
        }

        self.injector.push(ptr);
        self.notify_sleeper();
    }

    /// Wake hint: drop one sleeping worker back to the cheap end of
    /// its back-off ladder so it re-checks the queues soon.
    fn notify_sleeper(&self) {
        for state in self.workers.iter() {
            if state.sleeping.load(Ordering::Acquire) {
                state.backoff.reset();
                break;
            }
        }
    }

    /// Block until the pool is quiescent: nothing queued on any ring
    /// or on the injector, and nothing executing.
    ///
    /// Callable from inside a task running on this pool; the caller's
    /// own task is then excluded from the accounting (it is, by
    /// definition, still executing). Polls cooperatively and does not
    /// starve workers.
    pub fn wait(&self) {
        let floor = if worker::current_worker(self.pool_id).is_some() {
            1
        } else {
            0
        };

        while self.counters.outstanding.load(Ordering::Acquire) > floor {
            thread::yield_now();
        }

        if floor == 0 {
            // Belt-and-suspenders sweep; with no concurrent
            // submitters this exits on the first pass.
            while !self.injector.is_empty()
                || !self.workers.iter().all(|state| state.ring.is_empty())
            {
                thread::yield_now();
            }
        }
    }

    /// Number of worker threads.
    pub fn thread_count(&self) -> usize {
        self.num_threads
    }

    /// Approximate number of injector-resident plus executing tasks.
    ///
    /// Local rings are not counted, so this is an estimate for
    /// monitoring only; use [`Pool::wait`] to observe quiescence.
    pub fn pending_tasks(&self) -> usize {
        self.injector.len() + self.counters.active.load(Ordering::Relaxed)
    }

    /// Per-worker execution counters, in worker-index order.
    pub fn worker_metrics(&self) -> Vec<WorkerMetrics> {
        self.workers.iter().map(WorkerState::metrics).collect()
    }

    /// Drain outstanding work, stop and join all workers, reclaim
    /// whatever never ran. Idempotent; also invoked by `Drop`.
    pub fn shutdown(&mut self) {
        if self.threads.is_empty() {
            return;
        }

        self.wait();
        self.stop.store(true, Ordering::Release);

        for thread in self.threads.drain(..) {
            let _ = thread.join();
        }

        // Stragglers can only exist if someone submitted while we
        // were tearing down. Free them unexecuted; dropping a task's
        // closure resolves its handle as aborted.
        self.injector.drain();
        for state in self.workers.iter() {
            while let Some(ptr) = state.ring.pop() {
                drop(unsafe { Task::from_raw(ptr) });
            }
        }
    }
}

impl Drop for Pool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for Pool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pool")
            .field("threads", &self.num_threads)
            .field("pending_tasks", &self.pending_tasks())
            .finish()
    }
}
