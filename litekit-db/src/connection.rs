//! Safe wrapper around a `SQLite` database connection.
//!
//! This file contains **no `unsafe` code**. All FFI interaction is delegated to
//! [`ffi::RawDb`] which encapsulates the raw pointers and C type conversions.

use std::os::raw::c_int;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use super::blob::{BlobReadWriter, BlobReader};
use super::config::OpenOptions;
use super::error::{DbError, DbResult};
use super::ffi::RawDb;
use super::logger::{LogHandle, Logger};
use super::statement::{ExecResult, Statement, StepResult};
use super::transaction::{Transaction, TransactionBehavior};
use super::value::Value;

/// A `SQLite` database connection.
///
/// Closed when dropped, or explicitly with [`close`](Self::close). `Send`
/// but not `Sync`: a connection may move between threads but is used by
/// one thread at a time.
pub struct Connection {
    db: RawDb,
    log: LogHandle,
}

impl Connection {
    /// Opens (or creates) a database at `path`.
    ///
    /// # Errors
    ///
    /// Engine errors from `sqlite3_open_v2`.
    pub fn open(path: &Path, read_only: bool) -> DbResult<Self> {
        Self::open_with(path, &OpenOptions::new().read_only(read_only))
    }

    /// Opens a database with explicit [`OpenOptions`].
    ///
    /// # Errors
    ///
    /// Engine errors from `sqlite3_open_v2` or from installing the busy
    /// timeout.
    pub fn open_with(path: &Path, options: &OpenOptions) -> DbResult<Self> {
        let path_str = path.to_string_lossy();
        let log = options.logger.clone();
        let db = RawDb::open(&path_str, options.flags()).inspect_err(|e| {
            log.debug(|| format!("{e}"));
        })?;
        let conn = Self { db, log };
        if let Some(timeout) = options.busy_timeout {
            conn.busy_timeout(timeout)?;
        }
        conn.log.debug(|| format!("opened {path_str}"));
        Ok(conn)
    }

    /// Opens a private in-memory database.
    ///
    /// # Errors
    ///
    /// Engine errors from `sqlite3_open_v2`.
    pub fn open_in_memory() -> DbResult<Self> {
        Self::open(Path::new(":memory:"), false)
    }

    /// Executes one or more SQL statements separated by semicolons.
    ///
    /// No result rows are returned. Suitable for DDL, PRAGMAs, and
    /// multi-statement scripts.
    ///
    /// # Errors
    ///
    /// The first engine error raised by the script.
    pub fn execute_batch(&self, sql: &str) -> DbResult<()> {
        self.db
            .exec(sql)
            .inspect_err(|e| self.log.debug(|| format!("{e}")))
    }

    /// Prepares a single SQL statement.
    ///
    /// # Errors
    ///
    /// Engine errors from compilation; [`DbError::Usage`] when `sql` holds
    /// no statement.
    pub fn prepare(&self, sql: &str) -> DbResult<Statement<'_>> {
        let raw_stmt = self
            .db
            .prepare(sql)
            .inspect_err(|e| self.log.debug(|| format!("{e}")))?;
        Ok(Statement::new(raw_stmt, &self.log))
    }

    /// Prepares and executes a single SQL statement with the given parameters.
    ///
    /// # Errors
    ///
    /// See [`Statement::execute`].
    pub fn execute(&self, sql: &str, params: &[Value]) -> DbResult<ExecResult> {
        let mut stmt = self.prepare(sql)?;
        stmt.execute(params)
    }

    /// Prepares and executes a statement, mapping exactly one result row.
    ///
    /// # Errors
    ///
    /// [`DbError::NoSuchObject`] if no row is returned, plus any error from
    /// execution or `mapper`.
    pub fn query_row<T>(
        &self,
        sql: &str,
        params: &[Value],
        mapper: impl FnOnce(&Statement<'_>) -> DbResult<T>,
    ) -> DbResult<T> {
        self.query_row_optional(sql, params, mapper)?
            .ok_or_else(|| DbError::NoSuchObject {
                kind: "row",
                name: sql.to_string(),
            })
    }

    /// Like [`query_row`](Self::query_row) but returns `Ok(None)` when no row
    /// is returned.
    ///
    /// # Errors
    ///
    /// Any error from execution or `mapper`.
    pub fn query_row_optional<T>(
        &self,
        sql: &str,
        params: &[Value],
        mapper: impl FnOnce(&Statement<'_>) -> DbResult<T>,
    ) -> DbResult<Option<T>> {
        let mut stmt = self.prepare(sql)?;
        stmt.bind_values(params)?;
        match stmt.step()? {
            StepResult::Row => mapper(&stmt).map(Some),
            StepResult::Done => Ok(None),
        }
    }

    /// Prepares and executes a statement, mapping every result row.
    ///
    /// # Errors
    ///
    /// Any error from execution or `mapper`.
    pub fn query_map<T>(
        &self,
        sql: &str,
        params: &[Value],
        mapper: impl FnMut(&Statement<'_>) -> DbResult<T>,
    ) -> DbResult<Vec<T>> {
        let mut stmt = self.prepare(sql)?;
        let mut rows = stmt.query(params)?;
        rows.map(mapper)
    }

    /// Begins a deferred transaction.
    ///
    /// # Errors
    ///
    /// [`DbError::Usage`] if a transaction is already open on this
    /// connection; engine errors from `BEGIN`.
    pub fn transaction(&self) -> DbResult<Transaction<'_>> {
        Transaction::begin(self, TransactionBehavior::Deferred)
    }

    /// Begins an immediate transaction (acquires a RESERVED lock right away).
    ///
    /// # Errors
    ///
    /// Same as [`transaction`](Self::transaction).
    pub fn transaction_immediate(&self) -> DbResult<Transaction<'_>> {
        Transaction::begin(self, TransactionBehavior::Immediate)
    }

    /// `false` while a transaction is open.
    #[must_use]
    pub fn is_autocommit(&self) -> bool {
        self.db.is_autocommit()
    }

    /// Returns the rowid of the most recent successful INSERT.
    #[must_use]
    pub fn last_insert_rowid(&self) -> i64 {
        self.db.last_insert_rowid()
    }

    /// Returns the number of rows changed by the most recently completed
    /// INSERT, UPDATE or DELETE.
    #[must_use]
    pub fn changes(&self) -> u64 {
        u64::try_from(self.db.changes()).unwrap_or(0)
    }

    /// Rows changed since the connection was opened.
    #[must_use]
    pub fn total_changes(&self) -> u64 {
        u64::try_from(self.db.total_changes()).unwrap_or(0)
    }

    /// Sets how long the engine retries on a locked database before
    /// reporting `SQLITE_BUSY`. A zero duration removes the handler.
    ///
    /// # Errors
    ///
    /// Engine errors from `sqlite3_busy_timeout`.
    pub fn busy_timeout(&self, timeout: Duration) -> DbResult<()> {
        let millis = c_int::try_from(timeout.as_millis()).unwrap_or(c_int::MAX);
        self.db.busy_timeout(millis)
    }

    /// Path of the file backing `schema` (`"main"`, `"temp"`, an attached
    /// name). `None` for in-memory and temporary databases.
    ///
    /// # Errors
    ///
    /// [`DbError::Usage`] if `schema` contains a NUL byte.
    pub fn filename(&self, schema: &str) -> DbResult<Option<String>> {
        self.db.filename(schema)
    }

    /// Opens a read-only incremental I/O handle on one blob cell.
    ///
    /// # Errors
    ///
    /// See [`BlobReader::open`].
    pub fn blob_reader(
        &self,
        schema: &str,
        table: &str,
        column: &str,
        rowid: i64,
    ) -> DbResult<BlobReader<'_>> {
        BlobReader::open(self, schema, table, column, rowid)
    }

    /// Opens a read-write incremental I/O handle on one blob cell.
    ///
    /// # Errors
    ///
    /// See [`BlobReadWriter::open`].
    pub fn blob_read_writer(
        &self,
        schema: &str,
        table: &str,
        column: &str,
        rowid: i64,
    ) -> DbResult<BlobReadWriter<'_>> {
        BlobReadWriter::open(self, schema, table, column, rowid)
    }

    /// Closes the connection, reporting the engine status.
    ///
    /// Statements and blob handles borrow the connection, so they must be
    /// gone before this compiles. One leaked past the borrow checker makes
    /// the close fail with `SQLITE_BUSY`; the leaked statements are then
    /// finalized and the handle closed on drop.
    ///
    /// # Errors
    ///
    /// Engine errors from `sqlite3_close`.
    pub fn close(self) -> DbResult<()> {
        let Self { db, log } = self;
        match db.close() {
            Ok(()) => {
                log.debug(|| "connection closed".to_string());
                Ok(())
            }
            Err(e) => {
                log.warn(|| format!("{e}"));
                Err(e)
            }
        }
    }

    /// The logger events on this connection go to.
    #[must_use]
    pub fn logger(&self) -> Arc<dyn Logger> {
        self.log.shared()
    }

    pub(super) const fn raw(&self) -> &RawDb {
        &self.db
    }

    pub(super) const fn log(&self) -> &LogHandle {
        &self.log
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("main", &self.db.filename("main").ok().flatten())
            .finish_non_exhaustive()
    }
}
