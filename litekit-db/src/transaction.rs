//! Safe wrapper around a `SQLite` transaction.

use super::connection::Connection;
use super::error::{DbError, DbResult};
use super::statement::{ExecResult, Statement};
use super::value::Value;

/// Transaction isolation / locking behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionBehavior {
    /// `BEGIN DEFERRED` (the default).
    Deferred,
    /// `BEGIN IMMEDIATE` – acquires a RESERVED lock immediately.
    Immediate,
}

/// An open database transaction.
///
/// Automatically rolls back on drop unless committed or rolled back
/// explicitly.
pub struct Transaction<'conn> {
    conn: &'conn Connection,
    finished: bool,
}

impl<'conn> Transaction<'conn> {
    /// Begins a new transaction on `conn`.
    ///
    /// The engine has no nested `BEGIN`, so a second one while a
    /// transaction (ours or a manual `BEGIN`) is open is refused here.
    pub(super) fn begin(
        conn: &'conn Connection,
        behavior: TransactionBehavior,
    ) -> DbResult<Self> {
        if !conn.is_autocommit() {
            return Err(DbError::usage(
                "a transaction is already open on this connection",
            ));
        }
        let sql = match behavior {
            TransactionBehavior::Deferred => "BEGIN DEFERRED",
            TransactionBehavior::Immediate => "BEGIN IMMEDIATE",
        };
        conn.execute_batch(sql)?;
        Ok(Self {
            conn,
            finished: false,
        })
    }

    /// Commits the transaction.
    ///
    /// # Errors
    ///
    /// Engine errors from `COMMIT`. The transaction is rolled back when the
    /// failed handle is dropped.
    pub fn commit(mut self) -> DbResult<()> {
        self.conn.execute_batch("COMMIT")?;
        self.finished = true;
        Ok(())
    }

    /// Rolls the transaction back.
    ///
    /// # Errors
    ///
    /// Engine errors from `ROLLBACK`.
    pub fn rollback(mut self) -> DbResult<()> {
        self.finished = true;
        self.conn.execute_batch("ROLLBACK")
    }

    // ── Delegated Connection methods ────────────────────────────────────

    /// See [`Connection::execute_batch`].
    ///
    /// # Errors
    ///
    /// See [`Connection::execute_batch`].
    pub fn execute_batch(&self, sql: &str) -> DbResult<()> {
        self.conn.execute_batch(sql)
    }

    /// See [`Connection::execute`].
    ///
    /// # Errors
    ///
    /// See [`Connection::execute`].
    pub fn execute(&self, sql: &str, params: &[Value]) -> DbResult<ExecResult> {
        self.conn.execute(sql, params)
    }

    /// See [`Connection::query_row`].
    ///
    /// # Errors
    ///
    /// See [`Connection::query_row`].
    pub fn query_row<T>(
        &self,
        sql: &str,
        params: &[Value],
        mapper: impl FnOnce(&Statement<'_>) -> DbResult<T>,
    ) -> DbResult<T> {
        self.conn.query_row(sql, params, mapper)
    }

    /// See [`Connection::prepare`].
    ///
    /// # Errors
    ///
    /// See [`Connection::prepare`].
    pub fn prepare(&self, sql: &str) -> DbResult<Statement<'conn>> {
        self.conn.prepare(sql)
    }

    /// The connection this transaction runs on.
    #[must_use]
    pub const fn connection(&self) -> &'conn Connection {
        self.conn
    }
}

impl std::fmt::Debug for Transaction<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transaction")
            .field("finished", &self.finished)
            .finish_non_exhaustive()
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.conn
                .log()
                .warn(|| "transaction dropped without commit; rolling back".to_string());
            if let Err(e) = self.conn.execute_batch("ROLLBACK") {
                self.conn.log().warn(|| format!("{e}"));
            }
        }
    }
}
