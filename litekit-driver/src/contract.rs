//! Database-agnostic SQL access traits.
//!
//! The shape follows the classic driver layering: a [`Driver`] opens a
//! [`Conn`], which prepares [`Stmt`]s and begins [`Tx`]s; a statement runs
//! to an [`ExecResult`] or yields a [`Rows`] cursor. Borrowed objects are
//! generic associated types, so a statement cannot outlive its connection
//! and a cursor cannot outlive its statement.
//!
//! Arguments are positional [`Value`]s bound from index 1. Passing a
//! different number of arguments than the statement declares is an error.

use litekit_db::{ExecResult, Next, Value};

/// Opens connections from a data source name.
pub trait Driver {
    /// Connection type produced by this driver.
    type Conn: Conn;

    /// Opens a connection to `dsn`.
    ///
    /// # Errors
    ///
    /// Returns an error if `dsn` is empty or the database cannot be opened.
    fn open(&self, dsn: &str) -> Result<Self::Conn, <Self::Conn as Conn>::Error>;
}

/// An open database session.
pub trait Conn {
    /// Error type shared by everything this connection produces.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Prepared statement borrowing the connection.
    type Stmt<'c>: Stmt<Error = Self::Error>
    where
        Self: 'c;

    /// Transaction borrowing the connection.
    type Tx<'c>: Tx<Error = Self::Error>
    where
        Self: 'c;

    /// Compiles one statement.
    ///
    /// # Errors
    ///
    /// Returns an error if the SQL does not compile.
    fn prepare(&self, sql: &str) -> Result<Self::Stmt<'_>, Self::Error>;

    /// Prepares, executes and closes one statement.
    ///
    /// # Errors
    ///
    /// Returns the first error from preparing, executing or closing.
    fn exec(&self, sql: &str, args: &[Value]) -> Result<ExecResult, Self::Error> {
        let mut stmt = self.prepare(sql)?;
        let result = stmt.exec(args);
        let closed = stmt.close();
        let result = result?;
        closed?;
        Ok(result)
    }

    /// Starts a transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if a transaction is already open on this connection.
    fn begin(&self) -> Result<Self::Tx<'_>, Self::Error>;

    /// Closes the connection.
    ///
    /// # Errors
    ///
    /// Returns an error if the session cannot be released.
    fn close(self) -> Result<(), Self::Error>;
}

/// A prepared statement.
pub trait Stmt {
    /// Error type.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Cursor borrowing the statement.
    type Rows<'s>: Rows<Error = Self::Error>
    where
        Self: 's;

    /// Number of positional parameters the statement declares.
    fn num_input(&self) -> usize;

    /// Binds `args` and runs the statement to completion.
    ///
    /// # Errors
    ///
    /// Returns an error on argument-count mismatch or execution failure.
    fn exec(&mut self, args: &[Value]) -> Result<ExecResult, Self::Error>;

    /// Binds `args` and returns a lazy cursor over the result rows.
    ///
    /// # Errors
    ///
    /// Returns an error on argument-count mismatch.
    fn query(&mut self, args: &[Value]) -> Result<Self::Rows<'_>, Self::Error>;

    /// Releases the statement.
    ///
    /// # Errors
    ///
    /// Returns an error if the statement's last execution failed.
    fn close(self) -> Result<(), Self::Error>;
}

/// A forward-only cursor over result rows.
pub trait Rows {
    /// Error type.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Result column names.
    fn columns(&self) -> &[String];

    /// Copies the next row into `dest`.
    ///
    /// Returns [`Next::EndOfSequence`] once the rows are exhausted, and keeps
    /// returning it on later calls. A failed step also finishes the cursor.
    ///
    /// # Errors
    ///
    /// Returns an error if stepping fails or `dest` is wider than the row.
    fn next(&mut self, dest: &mut [Value]) -> Result<Next, Self::Error>;

    /// Releases the cursor. Calling it twice is harmless.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying reset fails.
    fn close(&mut self) -> Result<(), Self::Error>;
}

/// An open transaction.
pub trait Tx {
    /// Error type.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Makes the transaction's changes permanent.
    ///
    /// # Errors
    ///
    /// Returns an error if the commit fails.
    fn commit(self) -> Result<(), Self::Error>;

    /// Discards the transaction's changes.
    ///
    /// # Errors
    ///
    /// Returns an error if the rollback fails.
    fn rollback(self) -> Result<(), Self::Error>;
}
