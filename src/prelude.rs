//! Convenient re-exports for common pool types.
//!
//! This module provides a single import for most use cases:
//! ```
//! use pilfer::prelude::*;
//! ```

pub use crate::config::{Config, ConfigBuilder};
pub use crate::error::{Error, Result};
pub use crate::handle::{JoinError, JoinHandle};
pub use crate::pool::Pool;
pub use crate::worker::WorkerMetrics;
