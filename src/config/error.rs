//! Configuration errors.

use std::time::Duration;

/// Invalid configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The buffer pool must hold at least one page.
    #[error("buffer pool capacity must be at least 1 page")]
    ZeroBufferPoolCapacity,

    /// The locator backoff exceeds the allowed maximum.
    #[error("locator retry backoff {backoff:?} exceeds {max:?}")]
    RetryBackoffTooLong {
        /// Configured backoff.
        backoff: Duration,
        /// Largest allowed backoff.
        max: Duration,
    },
}
