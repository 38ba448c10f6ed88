//! Generic SQL-access contract and the `SQLite` adapter implementing it.
//!
//! [`contract`] defines the driver / connection / statement / rows /
//! transaction traits that database-agnostic code is written against.
//! [`sqlite`] implements them on top of `litekit-db`.
//!
//! ```rust
//! use litekit_driver::contract::{Conn, Driver, Rows, Stmt};
//! use litekit_driver::{Next, SqliteDriver, Value};
//!
//! let conn = SqliteDriver::default().open(":memory:").expect("open");
//! conn.exec("CREATE TABLE t (name TEXT)", &[]).expect("create");
//! conn.exec("INSERT INTO t VALUES (?1)", &[Value::from("a")]).expect("insert");
//!
//! let mut stmt = conn.prepare("SELECT name FROM t").expect("prepare");
//! let mut rows = stmt.query(&[]).expect("query");
//! let mut dest = [Value::Null];
//! assert_eq!(rows.next(&mut dest).expect("next"), Next::Row);
//! assert_eq!(dest[0], Value::from("a"));
//! assert_eq!(rows.next(&mut dest).expect("next"), Next::EndOfSequence);
//! ```

mod config;
pub mod contract;
pub mod sqlite;

pub use config::DriverConfig;
pub use litekit_db::{DbError, ExecResult, Next, Value};
pub use sqlite::{SqliteConn, SqliteDriver, SqliteRows, SqliteStmt, SqliteTx};
