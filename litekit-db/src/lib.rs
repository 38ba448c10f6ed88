//! Minimal safe `SQLite` wrapper over the bundled engine.
//!
//! This crate provides a small, safe Rust API over the `SQLite` C FFI:
//! connections, prepared statements with a lazy row cursor, transactions,
//! incremental blob I/O, online backup with progress reporting, and schema
//! introspection. The engine is compiled from the amalgamation shipped with
//! `libsqlite3-sys`.
//!
//! The `ffi` module is the **only** file that contains `unsafe` code or C
//! types. Everything else works with the owned handles it exposes.
//!
//! ```rust
//! use litekit_db::{params, Connection};
//!
//! let conn = Connection::open_in_memory().expect("open");
//! conn.execute_batch("CREATE TABLE t (id INTEGER PRIMARY KEY, name TEXT)")
//!     .expect("create");
//! let done = conn.execute("INSERT INTO t (name) VALUES (?1)", params!["a"]).expect("insert");
//! assert_eq!(done.rows_affected, 1);
//! let name: String = conn
//!     .query_row("SELECT name FROM t WHERE id = ?1", params![done.last_insert_rowid], |row| {
//!         Ok(row.column_text(0))
//!     })
//!     .expect("select");
//! assert_eq!(name, "a");
//! ```

mod ffi;

pub mod backup;
mod blob;
mod config;
mod connection;
pub mod date;
pub mod error;
pub mod logger;
pub mod meta;
mod statement;
mod transaction;
pub mod value;

pub use backup::{Backup, BackupOptions, BackupStatus, StopSignal};
pub use blob::{BlobReadWriter, BlobReader};
pub use config::OpenOptions;
pub use connection::Connection;
pub use error::{DbError, DbErrorCode, DbResult};
pub use meta::Affinity;
pub use statement::{ColumnType, ExecResult, Next, Rows, StatementState, Statement, StepResult};
pub use transaction::{Transaction, TransactionBehavior};
pub use value::Value;

/// Version string of the linked engine, e.g. `"3.46.0"`.
#[must_use]
pub fn sqlite_version() -> String {
    ffi::libversion()
}

#[cfg(test)]
mod tests;
