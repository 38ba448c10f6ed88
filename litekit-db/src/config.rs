//! Connection configuration.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use super::logger::{LogHandle, Logger};

/// Options used when opening a [`Connection`](crate::Connection).
///
/// ```rust
/// use std::time::Duration;
/// use litekit_db::{Connection, OpenOptions};
///
/// let conn = OpenOptions::new()
///     .busy_timeout(Duration::from_millis(250))
///     .open(":memory:")
///     .expect("open");
/// # drop(conn);
/// ```
#[derive(Clone)]
pub struct OpenOptions {
    pub(crate) read_only: bool,
    pub(crate) create: bool,
    pub(crate) uri: bool,
    pub(crate) busy_timeout: Option<Duration>,
    pub(crate) logger: LogHandle,
}

impl OpenOptions {
    /// Read-write, create-if-missing, URI filenames accepted, no busy
    /// timeout, logging through the `log` crate.
    #[must_use]
    pub fn new() -> Self {
        Self {
            read_only: false,
            create: true,
            uri: true,
            busy_timeout: None,
            logger: LogHandle::default(),
        }
    }

    /// Opens the database read-only. Implies `create(false)`.
    #[must_use]
    pub const fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    /// Creates the database file when it does not exist.
    #[must_use]
    pub const fn create(mut self, create: bool) -> Self {
        self.create = create;
        self
    }

    /// Lets the engine interpret `file:` URIs (`file:x.db?mode=ro`).
    #[must_use]
    pub const fn uri(mut self, uri: bool) -> Self {
        self.uri = uri;
        self
    }

    /// How long the engine sleeps and retries on a locked database before
    /// reporting `SQLITE_BUSY`.
    #[must_use]
    pub const fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = Some(timeout);
        self
    }

    /// Logger receiving this connection's events.
    #[must_use]
    pub fn logger(mut self, logger: Arc<dyn Logger>) -> Self {
        self.logger = LogHandle::new(logger);
        self
    }

    /// Opens a connection with these options.
    ///
    /// # Errors
    ///
    /// See [`Connection::open_with`](crate::Connection::open_with).
    pub fn open(
        &self,
        path: impl AsRef<std::path::Path>,
    ) -> crate::DbResult<crate::Connection> {
        crate::Connection::open_with(path.as_ref(), self)
    }

    pub(crate) const fn flags(&self) -> i32 {
        use super::ffi;

        let mut flags = if self.read_only {
            ffi::SQLITE_OPEN_READONLY
        } else if self.create {
            ffi::SQLITE_OPEN_READWRITE | ffi::SQLITE_OPEN_CREATE
        } else {
            ffi::SQLITE_OPEN_READWRITE
        };
        if self.uri {
            flags |= ffi::SQLITE_OPEN_URI;
        }
        // Connections are never shared between threads, so the per-connection
        // mutex is unnecessary.
        flags | ffi::SQLITE_OPEN_NOMUTEX
    }
}

impl Default for OpenOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for OpenOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenOptions")
            .field("read_only", &self.read_only)
            .field("create", &self.create)
            .field("uri", &self.uri)
            .field("busy_timeout", &self.busy_timeout)
            .finish_non_exhaustive()
    }
}
