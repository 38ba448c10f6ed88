//! `SQLite` implementation of the [`contract`](crate::contract) traits.

use litekit_db::logger::LogLevel;
use litekit_db::{
    Connection, DbError, ExecResult, Next, OpenOptions, Rows as DbRows, Statement, Transaction,
    Value,
};

use super::config::DriverConfig;
use super::contract::{Conn, Driver, Rows, Stmt, Tx};

/// Opens `SQLite` connections.
///
/// The DSN is handed to the engine as a filename with URI parsing enabled,
/// so both plain paths and `file:` URIs (`file:app.db?mode=ro`) work.
#[derive(Debug, Clone, Default)]
pub struct SqliteDriver {
    config: DriverConfig,
}

impl SqliteDriver {
    /// Creates a driver with explicit settings.
    #[must_use]
    pub const fn new(config: DriverConfig) -> Self {
        Self { config }
    }

    /// The settings this driver applies.
    #[must_use]
    pub const fn config(&self) -> &DriverConfig {
        &self.config
    }
}

impl Driver for SqliteDriver {
    type Conn = SqliteConn;

    fn open(&self, dsn: &str) -> Result<SqliteConn, DbError> {
        if dsn.is_empty() {
            return Err(DbError::Usage("empty data source name".to_string()));
        }
        let conn = OpenOptions::new()
            .uri(true)
            .busy_timeout(self.config.busy_timeout)
            .logger(self.config.logger.clone())
            .open(dsn)?;
        self.config
            .logger
            .log(LogLevel::Debug, format!("driver opened {dsn}"));
        Ok(SqliteConn { conn })
    }
}

/// A connection opened by [`SqliteDriver`].
#[derive(Debug)]
pub struct SqliteConn {
    conn: Connection,
}

impl SqliteConn {
    /// Wraps an already open connection.
    #[must_use]
    pub const fn from_connection(conn: Connection) -> Self {
        Self { conn }
    }

    /// The underlying connection, for operations outside the contract
    /// (blob I/O, backup, introspection).
    #[must_use]
    pub const fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Unwraps the underlying connection.
    #[must_use]
    pub fn into_inner(self) -> Connection {
        self.conn
    }
}

impl Conn for SqliteConn {
    type Error = DbError;
    type Stmt<'c> = SqliteStmt<'c>;
    type Tx<'c> = SqliteTx<'c>;

    fn prepare(&self, sql: &str) -> Result<SqliteStmt<'_>, DbError> {
        Ok(SqliteStmt {
            stmt: self.conn.prepare(sql)?,
        })
    }

    fn begin(&self) -> Result<SqliteTx<'_>, DbError> {
        Ok(SqliteTx {
            tx: self.conn.transaction()?,
        })
    }

    fn close(self) -> Result<(), DbError> {
        self.conn.close()
    }
}

/// A statement prepared on a [`SqliteConn`].
#[derive(Debug)]
pub struct SqliteStmt<'c> {
    stmt: Statement<'c>,
}

impl<'c> Stmt for SqliteStmt<'c> {
    type Error = DbError;
    type Rows<'s>
        = SqliteRows<'s, 'c>
    where
        Self: 's;

    fn num_input(&self) -> usize {
        self.stmt.bind_parameter_count()
    }

    fn exec(&mut self, args: &[Value]) -> Result<ExecResult, DbError> {
        self.stmt.execute(args)
    }

    fn query(&mut self, args: &[Value]) -> Result<SqliteRows<'_, 'c>, DbError> {
        Ok(SqliteRows {
            rows: self.stmt.query(args)?,
        })
    }

    fn close(self) -> Result<(), DbError> {
        self.stmt.finalize()
    }
}

/// A cursor over the rows of a [`SqliteStmt`].
pub struct SqliteRows<'s, 'c> {
    rows: DbRows<'s, 'c>,
}

impl Rows for SqliteRows<'_, '_> {
    type Error = DbError;

    fn columns(&self) -> &[String] {
        self.rows.columns()
    }

    fn next(&mut self, dest: &mut [Value]) -> Result<Next, DbError> {
        self.rows.next_into(dest)
    }

    fn close(&mut self) -> Result<(), DbError> {
        self.rows.close()
    }
}

impl std::fmt::Debug for SqliteRows<'_, '_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteRows")
            .field("columns", &self.rows.columns())
            .finish_non_exhaustive()
    }
}

/// A transaction on a [`SqliteConn`]. Rolled back if dropped unfinished.
pub struct SqliteTx<'c> {
    tx: Transaction<'c>,
}

impl Tx for SqliteTx<'_> {
    type Error = DbError;

    fn commit(self) -> Result<(), DbError> {
        self.tx.commit()
    }

    fn rollback(self) -> Result<(), DbError> {
        self.tx.rollback()
    }
}

impl std::fmt::Debug for SqliteTx<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteTx").finish_non_exhaustive()
    }
}
