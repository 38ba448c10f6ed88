//! Database error types for the safe `SQLite` wrapper.

use std::fmt;

use thiserror::Error;

use super::ffi;

/// Result code returned by `SQLite` operations.
///
/// Extended result codes are enabled on every connection, so the raw value
/// may carry extra bits above the primary code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DbErrorCode(pub i32);

impl DbErrorCode {
    /// The primary result code (low byte of the extended code).
    #[must_use]
    pub const fn primary(self) -> i32 {
        self.0 & 0xff
    }

    /// `true` for `SQLITE_BUSY` and `SQLITE_LOCKED`, the transient
    /// "held by another session" conditions.
    #[must_use]
    pub const fn is_busy(self) -> bool {
        matches!(self.primary(), ffi::SQLITE_BUSY | ffi::SQLITE_LOCKED)
    }

    /// The engine's English description of this code.
    #[must_use]
    pub fn description(self) -> String {
        ffi::errstr(self.0)
    }
}

impl fmt::Display for DbErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Error returned by database operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DbError {
    /// The engine rejected an operation.
    #[error("{context}: sqlite error {code}: {message}")]
    Engine {
        /// `SQLite` result code, verbatim.
        code: DbErrorCode,
        /// Message from `sqlite3_errmsg` (or `sqlite3_errstr` when absent).
        message: String,
        /// Operation and target the error happened on.
        context: String,
    },

    /// The engine reported success but handed back a null handle.
    #[error("sqlite reported success without returning a {0} handle")]
    NullHandle(&'static str),

    /// The caller broke the API contract (closed handle, nested
    /// transaction, wrong argument count, ...).
    #[error("misuse: {0}")]
    Usage(String),

    /// A blob read or write window falls outside the blob.
    #[error("blob {op} of {len} bytes at offset {offset} exceeds blob size {size}")]
    Range {
        /// `"read"` or `"write"`.
        op: &'static str,
        /// Requested start offset.
        offset: usize,
        /// Requested length.
        len: usize,
        /// Size of the blob.
        size: usize,
    },

    /// A [`Value`](crate::Value) could not be converted to the requested type.
    #[error("cannot convert {found} value to {expected}")]
    InvalidType {
        /// Target type name.
        expected: &'static str,
        /// Storage class of the value.
        found: &'static str,
    },

    /// An introspected schema object does not exist.
    #[error("no such {kind}: {name}")]
    NoSuchObject {
        /// `"table"`, `"index"`, ...
        kind: &'static str,
        /// Qualified object name.
        name: String,
    },

    /// A backup was stopped through its stop signal before completing.
    #[error("backup stopped with {remaining} of {page_count} pages remaining")]
    Stopped {
        /// Pages not yet copied.
        remaining: u32,
        /// Pages in the source at the last step.
        page_count: u32,
    },
}

impl DbError {
    /// Creates an engine error.
    pub(crate) fn engine(
        code: i32,
        message: impl Into<String>,
        context: impl Into<String>,
    ) -> Self {
        Self::Engine {
            code: DbErrorCode(code),
            message: message.into(),
            context: context.into(),
        }
    }

    /// Creates a usage error.
    pub(crate) fn usage(message: impl Into<String>) -> Self {
        Self::Usage(message.into())
    }

    /// The engine result code, if this error came from the engine.
    #[must_use]
    pub const fn code(&self) -> Option<DbErrorCode> {
        match self {
            Self::Engine { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// `true` when the engine reported `SQLITE_BUSY` or `SQLITE_LOCKED`.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.code().is_some_and(DbErrorCode::is_busy)
    }
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;
