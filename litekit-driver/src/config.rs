//! Driver configuration.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use litekit_db::logger::{LogCrateLogger, Logger};

/// Settings applied to every connection a [`SqliteDriver`](crate::SqliteDriver)
/// opens.
#[derive(Clone)]
pub struct DriverConfig {
    /// How long a connection retries on a locked database before reporting
    /// busy. Defaults to 500 ms.
    pub busy_timeout: Duration,
    /// Logger handed to each connection. Defaults to the `log` crate facade.
    pub logger: Arc<dyn Logger>,
}

impl DriverConfig {
    /// Default busy timeout.
    pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_millis(500);

    /// Replaces the busy timeout.
    #[must_use]
    pub const fn with_busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    /// Replaces the logger.
    #[must_use]
    pub fn with_logger(mut self, logger: Arc<dyn Logger>) -> Self {
        self.logger = logger;
        self
    }
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            busy_timeout: Self::DEFAULT_BUSY_TIMEOUT,
            logger: Arc::new(LogCrateLogger),
        }
    }
}

impl fmt::Debug for DriverConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DriverConfig")
            .field("busy_timeout", &self.busy_timeout)
            .finish_non_exhaustive()
    }
}
