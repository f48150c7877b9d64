//! Task distribution queues.
//!
//! Two structures move task pointers between threads: each worker's
//! bounded [`Ring`] and the shared unbounded [`Injector`]. Both are
//! lock-free; ownership of a task pointer transfers to whichever
//! thread dequeues it.

pub(crate) mod injector;
pub(crate) mod ring;

pub(crate) use injector::Injector;
pub(crate) use ring::Ring;
