//! Safe wrapper around a `SQLite` prepared statement and its row cursor.
//!
//! This file contains **no `unsafe` code**. All FFI interaction is delegated to
//! [`ffi::RawStmt`] which encapsulates the raw pointers and C type conversions.

use std::cell::OnceCell;
use std::os::raw::c_int;

use chrono::{DateTime, Utc};

use super::date;
use super::error::{DbError, DbResult};
use super::ffi::{self, RawStmt};
use super::logger::LogHandle;
use super::meta::Affinity;
use super::value::Value;

/// Result of a single `sqlite3_step` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepResult {
    /// A result row is available.
    Row,
    /// The statement has finished executing.
    Done,
}

/// Outcome of [`Rows::next_into`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Next {
    /// The destination slots hold the next row.
    Row,
    /// The cursor is exhausted. Not an error; repeated calls keep
    /// returning this.
    EndOfSequence,
}

/// Where a statement is in its execution cycle.
///
/// `Idle -> Bound -> Executing -> (RowAvailable | Exhausted) -> Idle`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementState {
    /// Freshly prepared or reset; ready for binding or stepping.
    Idle,
    /// Parameters are bound; not stepped yet.
    Bound,
    /// A cursor was handed out; not advanced yet.
    Executing,
    /// The last step produced a row.
    RowAvailable,
    /// The last step reported completion. Further steps stay here until
    /// the statement is reset.
    Exhausted,
}

/// Storage class of a result column value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    /// `SQLITE_INTEGER`
    Integer,
    /// `SQLITE_FLOAT`
    Real,
    /// `SQLITE_TEXT`
    Text,
    /// `SQLITE_BLOB`
    Blob,
    /// `SQLITE_NULL`
    Null,
}

/// Counters captured right after one execution of a statement.
///
/// They are read on the executing thread before control returns to the
/// caller, so later statements on the same connection cannot change them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecResult {
    /// Rows inserted, updated or deleted by this execution. Zero when the
    /// statement did not modify the database (DDL, `SELECT`, ...).
    pub rows_affected: u64,
    /// Connection rowid of the most recent successful `INSERT` as of the
    /// end of this execution.
    pub last_insert_rowid: i64,
}

fn c_index(idx: usize) -> c_int {
    c_int::try_from(idx).unwrap_or(c_int::MAX)
}

/// A prepared `SQLite` statement.
///
/// Created via [`Connection::prepare`](super::Connection::prepare).
/// Tied to the lifetime of the connection that created it.
/// Finalized when dropped, or explicitly with [`finalize`](Self::finalize).
pub struct Statement<'conn> {
    raw: RawStmt<'conn>,
    state: StatementState,
    log: &'conn LogHandle,
}

impl<'conn> Statement<'conn> {
    /// Wraps a raw statement handle.
    pub(super) const fn new(raw: RawStmt<'conn>, log: &'conn LogHandle) -> Self {
        Self {
            raw,
            state: StatementState::Idle,
            log,
        }
    }

    /// Current execution state.
    #[must_use]
    pub const fn state(&self) -> StatementState {
        self.state
    }

    /// SQL text the statement was prepared from.
    #[must_use]
    pub fn sql(&self) -> String {
        self.raw.sql()
    }

    /// `true` when the statement makes no direct changes to the database.
    #[must_use]
    pub fn is_readonly(&self) -> bool {
        self.raw.readonly()
    }

    // ── Binding ─────────────────────────────────────────────────────────

    /// Number of parameters the statement expects.
    #[must_use]
    pub fn bind_parameter_count(&self) -> usize {
        usize::try_from(self.raw.bind_parameter_count()).unwrap_or(0)
    }

    fn ensure_bindable(&self) -> DbResult<()> {
        match self.state {
            StatementState::Idle | StatementState::Bound => Ok(()),
            state => Err(DbError::usage(format!(
                "cannot bind while statement is {state:?}; reset it first"
            ))),
        }
    }

    /// Binds a slice of [`Value`]s to the statement parameters (1-indexed).
    ///
    /// An empty slice on a statement already in [`StatementState::Bound`]
    /// keeps the parameters set through [`bind_value`](Self::bind_value) or
    /// [`bind_zeroblob`](Self::bind_zeroblob).
    ///
    /// # Errors
    ///
    /// [`DbError::Usage`] if `values.len()` differs from
    /// [`bind_parameter_count`](Self::bind_parameter_count) or the statement
    /// is mid-execution; engine errors from the bind calls otherwise.
    pub fn bind_values(&mut self, values: &[Value]) -> DbResult<()> {
        self.ensure_bindable()?;
        if values.is_empty() && self.state == StatementState::Bound {
            return Ok(());
        }
        let expected = self.bind_parameter_count();
        if values.len() != expected {
            return Err(DbError::usage(format!(
                "statement expects {expected} argument(s), got {}",
                values.len()
            )));
        }
        for (i, val) in values.iter().enumerate() {
            self.bind_raw(i + 1, val)?;
        }
        if !values.is_empty() {
            self.state = StatementState::Bound;
        }
        Ok(())
    }

    /// Binds one parameter by its 1-based index.
    ///
    /// # Errors
    ///
    /// [`DbError::Usage`] while mid-execution; `SQLITE_RANGE` from the
    /// engine for an index outside `1..=bind_parameter_count()`.
    pub fn bind_value(&mut self, idx: usize, value: &Value) -> DbResult<()> {
        self.ensure_bindable()?;
        self.bind_raw(idx, value)?;
        self.state = StatementState::Bound;
        Ok(())
    }

    /// Binds a blob of `len` zero bytes, reserving space for later
    /// incremental writes through a [`BlobReadWriter`](crate::BlobReadWriter).
    ///
    /// # Errors
    ///
    /// Same as [`bind_value`](Self::bind_value).
    pub fn bind_zeroblob(&mut self, idx: usize, len: usize) -> DbResult<()> {
        self.ensure_bindable()?;
        self.raw.bind_zeroblob(c_index(idx), len)?;
        self.state = StatementState::Bound;
        Ok(())
    }

    fn bind_raw(&self, idx: usize, value: &Value) -> DbResult<()> {
        let idx = c_index(idx);
        match value {
            Value::Null => self.raw.bind_null(idx),
            Value::Integer(v) => self.raw.bind_i64(idx, *v),
            Value::Real(v) => self.raw.bind_f64(idx, *v),
            Value::Text(v) => self.raw.bind_text(idx, v),
            Value::Blob(v) => self.raw.bind_blob(idx, v),
        }
    }

    /// Resets every parameter to NULL.
    ///
    /// # Errors
    ///
    /// [`DbError::Usage`] while mid-execution.
    pub fn clear_bindings(&mut self) -> DbResult<()> {
        self.ensure_bindable()?;
        self.raw.clear_bindings()?;
        self.state = StatementState::Idle;
        Ok(())
    }

    // ── Stepping ────────────────────────────────────────────────────────

    /// Executes a single step.
    ///
    /// Once the statement reports [`StepResult::Done`] it keeps reporting
    /// it without touching the engine (which would otherwise restart the
    /// statement) until [`reset`](Self::reset) is called.
    ///
    /// On an engine error the statement is reset so that it releases its
    /// locks; bindings are kept.
    ///
    /// # Errors
    ///
    /// Engine errors (constraint violations, busy, ...).
    pub fn step(&mut self) -> DbResult<StepResult> {
        if self.state == StatementState::Exhausted {
            return Ok(StepResult::Done);
        }
        match self.raw.step() {
            Ok(ffi::SQLITE_ROW) => {
                self.state = StatementState::RowAvailable;
                Ok(StepResult::Row)
            }
            Ok(_) => {
                self.state = StatementState::Exhausted;
                Ok(StepResult::Done)
            }
            Err(err) => {
                // The reset reports the same failure again; it is already in `err`.
                let _ = self.raw.reset();
                self.state = StatementState::Idle;
                self.log.debug(|| format!("{err}"));
                Err(err)
            }
        }
    }

    /// Resets the statement so it can be re-bound and stepped again.
    ///
    /// # Errors
    ///
    /// Engine errors reported by `sqlite3_reset`.
    pub fn reset(&mut self) -> DbResult<()> {
        self.state = StatementState::Idle;
        self.raw.reset()
    }

    /// Brings a finished statement back to `Idle` before a new run. A
    /// statement that is mid-row is a usage error.
    fn begin_run(&mut self) -> DbResult<()> {
        match self.state {
            StatementState::Idle | StatementState::Bound => Ok(()),
            StatementState::Exhausted => self.reset(),
            state => Err(DbError::usage(format!(
                "statement is {state:?}; close its rows before running it again"
            ))),
        }
    }

    /// Binds `params`, runs the statement to completion discarding any
    /// rows, and resets it.
    ///
    /// # Errors
    ///
    /// [`DbError::Usage`] on argument-count mismatch; engine errors on
    /// execution failure.
    pub fn execute(&mut self, params: &[Value]) -> DbResult<ExecResult> {
        self.begin_run()?;
        self.bind_values(params)?;
        let db = self.raw.db();
        let changes_before = db.total_changes();
        while self.step()? == StepResult::Row {}
        let rows_affected = if db.total_changes() == changes_before {
            0
        } else {
            u64::try_from(db.changes()).unwrap_or(0)
        };
        let result = ExecResult {
            rows_affected,
            last_insert_rowid: db.last_insert_rowid(),
        };
        self.reset()?;
        Ok(result)
    }

    /// Binds `params` and returns a lazy cursor over the result rows.
    ///
    /// Nothing is executed until the cursor is advanced.
    ///
    /// # Errors
    ///
    /// [`DbError::Usage`] on argument-count mismatch.
    pub fn query(&mut self, params: &[Value]) -> DbResult<Rows<'_, 'conn>> {
        self.begin_run()?;
        self.bind_values(params)?;
        self.state = StatementState::Executing;
        Ok(Rows {
            stmt: self,
            columns: OnceCell::new(),
            closed: false,
            failed: false,
        })
    }

    /// Finalizes the statement, reporting the engine status.
    ///
    /// # Errors
    ///
    /// The error of the most recent failed step, if any.
    pub fn finalize(self) -> DbResult<()> {
        self.raw.finalize()
    }

    // ── Column reading ──────────────────────────────────────────────────

    /// Returns the number of columns in the result set.
    #[must_use]
    pub fn column_count(&self) -> usize {
        usize::try_from(self.raw.column_count()).unwrap_or(0)
    }

    /// Name of result column `idx`.
    #[must_use]
    pub fn column_name(&self, idx: usize) -> String {
        self.raw.column_name(c_index(idx))
    }

    /// Names of all result columns.
    #[must_use]
    pub fn column_names(&self) -> Vec<String> {
        (0..self.column_count()).map(|i| self.column_name(i)).collect()
    }

    /// Returns the storage class of column `idx` in the current row.
    #[must_use]
    pub fn column_type(&self, idx: usize) -> ColumnType {
        match self.raw.column_type(c_index(idx)) {
            ffi::SQLITE_INTEGER => ColumnType::Integer,
            ffi::SQLITE_FLOAT => ColumnType::Real,
            ffi::SQLITE_TEXT => ColumnType::Text,
            ffi::SQLITE_BLOB => ColumnType::Blob,
            _ => ColumnType::Null,
        }
    }

    /// Returns `true` if the column is SQL NULL.
    #[must_use]
    pub fn is_column_null(&self, idx: usize) -> bool {
        self.column_type(idx) == ColumnType::Null
    }

    /// Reads a column as `i64`.
    #[must_use]
    pub fn column_i64(&self, idx: usize) -> i64 {
        self.raw.column_i64(c_index(idx))
    }

    /// Reads a column as `f64`.
    #[must_use]
    pub fn column_f64(&self, idx: usize) -> f64 {
        self.raw.column_f64(c_index(idx))
    }

    /// Reads a column as a UTF-8 string. Returns an empty string for NULL.
    #[must_use]
    pub fn column_text(&self, idx: usize) -> String {
        self.raw.column_text(c_index(idx))
    }

    /// Reads a column as a blob. Returns an empty `Vec` for NULL.
    #[must_use]
    pub fn column_blob(&self, idx: usize) -> Vec<u8> {
        self.raw.column_blob(c_index(idx))
    }

    /// Reads a column as an optional `i64` (returns `None` for NULL).
    #[must_use]
    pub fn column_optional_i64(&self, idx: usize) -> Option<i64> {
        if self.is_column_null(idx) {
            None
        } else {
            Some(self.column_i64(idx))
        }
    }

    /// Reads a column as an optional blob (returns `None` for NULL).
    #[must_use]
    pub fn column_optional_blob(&self, idx: usize) -> Option<Vec<u8>> {
        if self.is_column_null(idx) {
            None
        } else {
            Some(self.column_blob(idx))
        }
    }

    /// Reads a column in its native storage class.
    #[must_use]
    pub fn column_value(&self, idx: usize) -> Value {
        match self.column_type(idx) {
            ColumnType::Integer => Value::Integer(self.column_i64(idx)),
            ColumnType::Real => Value::Real(self.column_f64(idx)),
            ColumnType::Text => Value::Text(self.column_text(idx)),
            ColumnType::Blob => Value::Blob(self.column_blob(idx)),
            ColumnType::Null => Value::Null,
        }
    }

    /// Reads a date, time or timestamp column.
    ///
    /// # Errors
    ///
    /// See [`date::datetime_from_value`].
    pub fn column_datetime(&self, idx: usize) -> DbResult<DateTime<Utc>> {
        date::datetime_from_value(&self.column_value(idx))
    }

    // ── Column metadata ─────────────────────────────────────────────────

    /// Schema (`main`, `temp`, ...) the column originates from; `None` for
    /// expressions.
    #[must_use]
    pub fn column_database_name(&self, idx: usize) -> Option<String> {
        self.raw.column_database_name(c_index(idx))
    }

    /// Table the column originates from; `None` for expressions.
    #[must_use]
    pub fn column_table_name(&self, idx: usize) -> Option<String> {
        self.raw.column_table_name(c_index(idx))
    }

    /// Unaliased name of the originating table column.
    #[must_use]
    pub fn column_origin_name(&self, idx: usize) -> Option<String> {
        self.raw.column_origin_name(c_index(idx))
    }

    /// Declared type of the originating table column.
    #[must_use]
    pub fn column_decltype(&self, idx: usize) -> Option<String> {
        self.raw.column_decltype(c_index(idx))
    }

    /// Type affinity derived from the declared type.
    #[must_use]
    pub fn column_affinity(&self, idx: usize) -> Affinity {
        Affinity::from_declared_type(self.column_decltype(idx).as_deref().unwrap_or(""))
    }
}

impl std::fmt::Debug for Statement<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Statement")
            .field("sql", &self.raw.sql())
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

/// A lazy, forward-only cursor over the rows of a [`Statement`].
///
/// Created by [`Statement::query`]. Each advance runs one engine step.
/// A step error ends the cursor: the error is returned once and later
/// advances report the end of the sequence. Closing (or dropping) the
/// cursor resets the statement to [`StatementState::Idle`].
pub struct Rows<'stmt, 'conn> {
    stmt: &'stmt mut Statement<'conn>,
    columns: OnceCell<Vec<String>>,
    closed: bool,
    failed: bool,
}

impl<'conn> Rows<'_, 'conn> {
    /// Column names, read from the engine on first access and memoized.
    #[must_use]
    pub fn columns(&self) -> &[String] {
        self.columns.get_or_init(|| self.stmt.column_names())
    }

    /// Advances to the next row. `Ok(None)` marks the end of the sequence
    /// and is returned again on every later call.
    ///
    /// # Errors
    ///
    /// Engine errors raised while stepping. The cursor is finished after
    /// one; the statement is not re-run.
    pub fn next_row(&mut self) -> DbResult<Option<&Statement<'conn>>> {
        if self.closed || self.failed {
            return Ok(None);
        }
        match self.stmt.step() {
            Ok(StepResult::Row) => Ok(Some(&*self.stmt)),
            Ok(StepResult::Done) => Ok(None),
            Err(err) => {
                self.failed = true;
                Err(err)
            }
        }
    }

    /// Advances to the next row and copies its values into `dest`.
    ///
    /// `dest` may be shorter than the row; extra columns are skipped.
    ///
    /// # Errors
    ///
    /// [`DbError::Usage`] when `dest` is longer than the column count;
    /// engine errors raised while stepping.
    pub fn next_into(&mut self, dest: &mut [Value]) -> DbResult<Next> {
        let width = self.stmt.column_count();
        if dest.len() > width {
            return Err(DbError::usage(format!(
                "destination has {} slots but the row has {width} columns",
                dest.len()
            )));
        }
        match self.next_row()? {
            Some(row) => {
                for (i, slot) in dest.iter_mut().enumerate() {
                    *slot = row.column_value(i);
                }
                Ok(Next::Row)
            }
            None => Ok(Next::EndOfSequence),
        }
    }

    /// Collects the remaining rows through `mapper`.
    ///
    /// # Errors
    ///
    /// The first error from stepping or from `mapper`.
    pub fn map<T>(
        &mut self,
        mut mapper: impl FnMut(&Statement<'conn>) -> DbResult<T>,
    ) -> DbResult<Vec<T>> {
        let mut results = Vec::new();
        while let Some(row) = self.next_row()? {
            results.push(mapper(row)?);
        }
        Ok(results)
    }

    /// Resets the underlying statement. Safe to call more than once.
    ///
    /// # Errors
    ///
    /// Engine errors reported by `sqlite3_reset` on the first call.
    pub fn close(&mut self) -> DbResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        if self.failed {
            // The failed step already reset the statement.
            return Ok(());
        }
        self.stmt.reset()
    }
}

impl Drop for Rows<'_, '_> {
    fn drop(&mut self) {
        if !self.closed {
            let _ = self.stmt.reset();
        }
    }
}
