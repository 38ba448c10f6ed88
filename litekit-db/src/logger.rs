//! Injectable logging for database events.

use std::fmt;
use std::sync::Arc;

/// Trait representing a logger that can log messages at various levels.
///
/// A logger is handed to each [`Connection`](crate::Connection) through
/// [`OpenOptions::logger`](crate::OpenOptions::logger); there is no
/// process-wide hook. Implement it to route database events into whatever
/// sink the host application uses.
///
/// # Examples
///
/// ```rust
/// use litekit_db::logger::{LogLevel, Logger};
///
/// struct StderrLogger;
///
/// impl Logger for StderrLogger {
///     fn log(&self, level: LogLevel, message: String) {
///         eprintln!("[{level:?}] {message}");
///     }
/// }
/// ```
pub trait Logger: Sync + Send {
    /// Logs a message at the specified log level.
    ///
    /// # Arguments
    ///
    /// * `level` - The severity level of the log message.
    /// * `message` - The log message to be recorded.
    fn log(&self, level: LogLevel, message: String);

    /// Whether messages at `level` would be recorded. Callers skip
    /// formatting when this returns `false`.
    fn enabled(&self, _level: LogLevel) -> bool {
        true
    }
}

/// Enumeration of possible log levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    /// Designates very low priority, often extremely detailed messages.
    Trace,
    /// Designates lower priority debugging information.
    Debug,
    /// Designates informational messages that highlight the progress of the application.
    Info,
    /// Designates potentially harmful situations.
    Warn,
    /// Designates error events that might still allow the application to continue running.
    Error,
}

/// Forwards every message to the [`log`] crate facade under the `litekit`
/// target. This is the logger connections use unless one is injected.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogCrateLogger;

impl Logger for LogCrateLogger {
    fn log(&self, level: LogLevel, message: String) {
        log::log!(target: "litekit", log_level(level), "{message}");
    }

    fn enabled(&self, level: LogLevel) -> bool {
        log::log_enabled!(target: "litekit", log_level(level))
    }
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopLogger;

impl Logger for NoopLogger {
    fn log(&self, _level: LogLevel, _message: String) {}

    fn enabled(&self, _level: LogLevel) -> bool {
        false
    }
}

/// Converts a `LogLevel` to a `log::Level`.
const fn log_level(level: LogLevel) -> log::Level {
    match level {
        LogLevel::Error => log::Level::Error,
        LogLevel::Warn => log::Level::Warn,
        LogLevel::Info => log::Level::Info,
        LogLevel::Debug => log::Level::Debug,
        LogLevel::Trace => log::Level::Trace,
    }
}

/// Shared handle to an injected logger.
#[derive(Clone)]
pub(crate) struct LogHandle(Arc<dyn Logger>);

impl LogHandle {
    pub(crate) fn new(logger: Arc<dyn Logger>) -> Self {
        Self(logger)
    }

    pub(crate) fn shared(&self) -> Arc<dyn Logger> {
        Arc::clone(&self.0)
    }

    /// Emits a message, formatting it only when the level is enabled.
    pub(crate) fn emit(&self, level: LogLevel, message: impl FnOnce() -> String) {
        if self.0.enabled(level) {
            self.0.log(level, message());
        }
    }

    pub(crate) fn trace(&self, message: impl FnOnce() -> String) {
        self.emit(LogLevel::Trace, message);
    }

    pub(crate) fn debug(&self, message: impl FnOnce() -> String) {
        self.emit(LogLevel::Debug, message);
    }

    pub(crate) fn warn(&self, message: impl FnOnce() -> String) {
        self.emit(LogLevel::Warn, message);
    }
}

impl Default for LogHandle {
    fn default() -> Self {
        Self(Arc::new(LogCrateLogger))
    }
}

impl fmt::Debug for LogHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogHandle").finish_non_exhaustive()
    }
}
