//! Pilfer - a lock-free, work-stealing thread pool.
//!
//! A fixed set of workers executes closures submitted from any
//! thread. Each worker owns a bounded ring of pending tasks; external
//! submissions and ring overflow go through a shared lock-free
//! injector list, and idle workers steal from random peers. Every
//! submission returns a one-shot [`JoinHandle`] that delivers the
//! task's value or its captured panic.
//!
//! # Quick Start
//!
//! ```
//! use pilfer::Pool;
//!
//! let pool = Pool::new()?;
//!
//! let handle = pool.submit(|| 6 * 7);
//! assert_eq!(handle.join().unwrap(), 42);
//!
//! pool.wait();
//! assert_eq!(pool.pending_tasks(), 0);
//! # Ok::<(), pilfer::Error>(())
//! ```
//!
//! # Design
//!
//! - **No locks on the hot paths**: rings and the injector are CAS
//!   based; the only blocking primitive is the completion slot the
//!   submitter waits on.
//! - **Submission locality**: a task spawned from inside a worker
//!   lands on that worker's own ring, so recursive fan-out stays
//!   cache-warm until someone steals it.
//! - **Backpressure without blocking**: a full ring reroutes to the
//!   unbounded injector instead of stalling the submitter.
//! - **Deterministic teardown**: dropping the pool waits for
//!   quiescence, stops and joins every worker, and reclaims anything
//!   that never ran.

// Lint configuration
#![warn(missing_docs, missing_debug_implementations)]

pub mod config;
pub mod error;
pub mod handle;
pub mod pool;
pub mod prelude;

mod queue;
mod task;
mod util;
mod worker;

// Re-export key types at crate root
pub use config::{Config, ConfigBuilder};
pub use error::{Error, Result};
pub use handle::{JoinError, JoinHandle};
pub use pool::Pool;
pub use worker::WorkerMetrics;
