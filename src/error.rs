//! Error types for the pool.

/// Result type alias for pool operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while building or running a pool.
///
/// Task-level failure is not represented here: a panicking task
/// resolves its [`JoinHandle`](crate::JoinHandle) with a
/// [`JoinError`](crate::JoinError) instead, and never surfaces
/// through pool APIs.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Executor error (worker spawn failure and the like)
    #[error("executor error: {0}")]
    Executor(String),
}

impl Error {
    /// Create a config error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Error::Config(msg.into())
    }

    /// Create an executor error
    pub fn executor<S: Into<String>>(msg: S) -> Self {
        Error::Executor(msg.into())
    }
}
