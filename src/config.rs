//! Engine configuration.

mod error;

pub use error::ConfigError;

use std::time::Duration;

/// Default number of resident pages.
pub const DEFAULT_BUFFER_POOL_CAPACITY: usize = 1024;

/// Longest pause the locator may take between retries.
pub const MAX_RETRY_BACKOFF: Duration = Duration::from_secs(10);

/// Tunables of the replica tuple locator's retry loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LocatorConfig {
    /// Restarts allowed before the lookup fails. `None` retries until the
    /// contending transactions finish.
    pub max_retries: Option<u32>,
    /// Pause before restarting after a concurrent update.
    pub retry_backoff: Duration,
}

impl LocatorConfig {
    /// Caps the number of restarts.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    /// Sets the pause between restarts.
    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    /// Checks the settings.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.retry_backoff > MAX_RETRY_BACKOFF {
            return Err(ConfigError::RetryBackoffTooLong {
                backoff: self.retry_backoff,
                max: MAX_RETRY_BACKOFF,
            });
        }
        Ok(())
    }
}

/// Settings for an [`Engine`](crate::engine::Engine).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Pages the buffer pool may hold. The pool does not evict; running
    /// out of frames is an error.
    pub buffer_pool_capacity: usize,
    /// Replica tuple locator settings.
    pub locator: LocatorConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            buffer_pool_capacity: DEFAULT_BUFFER_POOL_CAPACITY,
            locator: LocatorConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Sets the buffer pool capacity in pages.
    pub fn with_buffer_pool_capacity(mut self, pages: usize) -> Self {
        self.buffer_pool_capacity = pages;
        self
    }

    /// Sets the locator settings.
    pub fn with_locator(mut self, locator: LocatorConfig) -> Self {
        self.locator = locator;
        self
    }

    /// Checks the settings.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.buffer_pool_capacity == 0 {
            return Err(ConfigError::ZeroBufferPoolCapacity);
        }
        self.locator.validate()
    }
}
