//! Pool configuration.

use crate::error::{Error, Result};

/// Tuning knobs for a [`Pool`](crate::Pool).
#[derive(Debug, Clone)]
pub struct Config {
    /// Worker thread count. `None` means one per available CPU.
    pub num_threads: Option<usize>,
    /// Capacity of each worker's local ring. Must be a power of two.
    pub queue_capacity: usize,
    /// Name prefix for worker threads (`"<prefix>-<index>"`).
    pub thread_name_prefix: String,
    /// Stack size for worker threads, if overridden.
    pub stack_size: Option<usize>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            num_threads: None,
            queue_capacity: 4096,
            thread_name_prefix: "pilfer-worker".to_string(),
            stack_size: None,
        }
    }
}

impl Config {
    /// Start building a config.
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }

    /// Check the config for nonsensical values.
    pub fn validate(&self) -> Result<()> {
        if let Some(n) = self.num_threads {
            if n == 0 {
                return Err(Error::config("num_threads must be > 0"));
            }
            if n > 1024 {
                return Err(Error::config("num_threads too large (max 1024)"));
            }
        }

        if !self.queue_capacity.is_power_of_two() {
            return Err(Error::config("queue_capacity must be a power of two"));
        }
        if self.queue_capacity < 2 {
            return Err(Error::config("queue_capacity must be >= 2"));
        }
        if self.queue_capacity > (1 << 20) {
            return Err(Error::config("queue_capacity too large (max 2^20)"));
        }

        Ok(())
    }

    /// Resolved worker count.
    pub fn worker_threads(&self) -> usize {
        self.num_threads.unwrap_or_else(num_cpus::get)
    }
}

/// Builder for [`Config`].
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// New builder with default values.
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    /// Set the worker thread count.
    pub fn num_threads(mut self, n: usize) -> Self {
        self.config.num_threads = Some(n);
        self
    }

    /// Set the local ring capacity (power of two).
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.config.queue_capacity = capacity;
        self
    }

    /// Set the worker thread name prefix.
    pub fn thread_name_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.config.thread_name_prefix = prefix.into();
        self
    }

    /// Set the worker thread stack size.
    pub fn stack_size(mut self, size: usize) -> Self {
        self.config.stack_size = Some(size);
        self
    }

    /// Validate and produce the config.
    pub fn build(self) -> Result<Config> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn rejects_zero_threads() {
        let result = Config::builder().num_threads(0).build();
        assert!(result.is_err());
    }

    #[test]
    fn rejects_non_power_of_two_capacity() {
        let result = Config::builder().queue_capacity(1000).build();
        assert!(result.is_err());

        let result = Config::builder().queue_capacity(1024).build();
        assert!(result.is_ok());
    }

    #[test]
    fn worker_threads_defaults_to_cpu_count() {
        let config = Config::default();
        assert_eq!(config.worker_threads(), num_cpus::get());
        assert!(config.worker_threads() >= 1);
    }
}
