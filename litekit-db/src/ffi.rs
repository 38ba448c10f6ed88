//! Owned handles over the raw `SQLite` C API.
//!
//! Every engine object the crate touches (`sqlite3`, `sqlite3_stmt`,
//! `sqlite3_blob`, `sqlite3_backup`) is wrapped here in a type that releases
//! it on drop. Borrowed handles carry the lifetime of the connection that
//! produced them, so the borrow checker enforces the engine's ownership rules.
//!
//! This is the **only** file in the crate that contains `unsafe` code or C
//! types. Symbols come from `libsqlite3-sys`, which compiles the bundled
//! amalgamation.

#![allow(dead_code)]

use std::ffi::{CStr, CString};
use std::marker::PhantomData;
use std::os::raw::{c_char, c_int, c_void};
use std::ptr::{self, NonNull};

use libsqlite3_sys as sys;

use super::error::{DbError, DbResult};

// ── SQLite constants ────────────────────────────────────────────────────

pub const SQLITE_OK: c_int = 0;
pub const SQLITE_ERROR: c_int = 1;
pub const SQLITE_BUSY: c_int = 5;
pub const SQLITE_LOCKED: c_int = 6;
pub const SQLITE_MISUSE: c_int = 21;
pub const SQLITE_RANGE: c_int = 25;
pub const SQLITE_ROW: c_int = 100;
pub const SQLITE_DONE: c_int = 101;

// Column type constants
pub const SQLITE_INTEGER: c_int = 1;
pub const SQLITE_FLOAT: c_int = 2;
pub const SQLITE_TEXT: c_int = 3;
pub const SQLITE_BLOB: c_int = 4;
pub const SQLITE_NULL: c_int = 5;

// Open flags
pub const SQLITE_OPEN_READONLY: c_int = 0x0000_0001;
pub const SQLITE_OPEN_READWRITE: c_int = 0x0000_0002;
pub const SQLITE_OPEN_CREATE: c_int = 0x0000_0004;
pub const SQLITE_OPEN_URI: c_int = 0x0000_0040;
pub const SQLITE_OPEN_NOMUTEX: c_int = 0x0000_8000;

// ── Helpers ─────────────────────────────────────────────────────────────

fn c_string(value: &str, what: &str) -> DbResult<CString> {
    CString::new(value)
        .map_err(|e| DbError::usage(format!("nul byte in {what}: {e}")))
}

/// Copies a NUL-terminated C string owned by the engine.
///
/// # Safety
///
/// `ptr` must be null or point to a valid NUL-terminated string that stays
/// alive for the duration of the call.
unsafe fn owned_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        None
    } else {
        Some(CStr::from_ptr(ptr).to_string_lossy().into_owned())
    }
}

fn len_to_c_int(len: usize, what: &str) -> DbResult<c_int> {
    c_int::try_from(len)
        .map_err(|_| DbError::usage(format!("{what} of {len} bytes is too large")))
}

/// Returns the English description of a result code (`sqlite3_errstr`).
pub fn errstr(code: c_int) -> String {
    // SAFETY: sqlite3_errstr returns a pointer to a static string.
    unsafe { owned_string(sys::sqlite3_errstr(code)) }
        .unwrap_or_else(|| format!("unknown result code {code}"))
}

/// Returns the version string of the linked engine.
pub fn libversion() -> String {
    // SAFETY: sqlite3_libversion returns a pointer to a static string.
    unsafe { owned_string(sys::sqlite3_libversion()) }.unwrap_or_default()
}

// ── Connection ──────────────────────────────────────────────────────────

/// An open `sqlite3*` session.
pub struct RawDb {
    ptr: NonNull<sys::sqlite3>,
}

// SAFETY: the bundled engine is compiled thread-safe and the handle is only
// ever used by one thread at a time (`RawDb` is not `Sync`).
unsafe impl Send for RawDb {}

impl RawDb {
    /// Opens a session with `sqlite3_open_v2`.
    ///
    /// A handle allocated by a failed open is closed before returning.
    pub fn open(path: &str, flags: c_int) -> DbResult<Self> {
        let c_path = c_string(path, "database path")?;
        let mut db: *mut sys::sqlite3 = ptr::null_mut();
        // SAFETY: c_path is a valid C string and db is a valid out-pointer.
        let rc = unsafe {
            sys::sqlite3_open_v2(c_path.as_ptr(), &mut db, flags, ptr::null())
        };
        let Some(ptr) = NonNull::new(db) else {
            if rc == SQLITE_OK {
                return Err(DbError::NullHandle("connection"));
            }
            return Err(DbError::engine(rc, errstr(rc), format!("open {path}")));
        };
        let raw = Self { ptr };
        if rc != SQLITE_OK {
            // Dropping `raw` closes the partially opened handle.
            return Err(raw.error(rc, format!("open {path}")));
        }
        // SAFETY: ptr is an open connection.
        unsafe { sys::sqlite3_extended_result_codes(ptr.as_ptr(), 1) };
        Ok(raw)
    }

    fn as_ptr(&self) -> *mut sys::sqlite3 {
        self.ptr.as_ptr()
    }

    /// Builds an engine error from `code` and the connection's last message.
    pub fn error(&self, code: c_int, context: impl Into<String>) -> DbError {
        // SAFETY: the connection is open; errmsg returns a string owned by it.
        let message = unsafe { owned_string(sys::sqlite3_errmsg(self.as_ptr())) }
            .unwrap_or_else(|| errstr(code));
        DbError::engine(code, message, context)
    }

    /// Runs one or more semicolon-separated statements via `sqlite3_exec`.
    pub fn exec(&self, sql: &str) -> DbResult<()> {
        let c_sql = c_string(sql, "SQL")?;
        let mut errmsg: *mut c_char = ptr::null_mut();
        // SAFETY: all pointers are valid; no callback is installed.
        let rc = unsafe {
            sys::sqlite3_exec(
                self.as_ptr(),
                c_sql.as_ptr(),
                None,
                ptr::null_mut(),
                &mut errmsg,
            )
        };
        if rc == SQLITE_OK {
            return Ok(());
        }
        // SAFETY: errmsg is either null or allocated by sqlite3_malloc.
        let message = unsafe {
            let msg = owned_string(errmsg);
            if !errmsg.is_null() {
                sys::sqlite3_free(errmsg.cast::<c_void>());
            }
            msg
        };
        Err(match message {
            Some(message) => DbError::engine(rc, message, "exec"),
            None => self.error(rc, "exec"),
        })
    }

    /// Compiles a single statement.
    pub fn prepare(&self, sql: &str) -> DbResult<RawStmt<'_>> {
        let c_sql = c_string(sql, "SQL")?;
        let mut stmt: *mut sys::sqlite3_stmt = ptr::null_mut();
        // SAFETY: all pointers are valid; nByte = -1 reads up to the NUL.
        let rc = unsafe {
            sys::sqlite3_prepare_v2(
                self.as_ptr(),
                c_sql.as_ptr(),
                -1,
                &mut stmt,
                ptr::null_mut(),
            )
        };
        if rc != SQLITE_OK {
            let err = self.error(rc, format!("prepare `{sql}`"));
            if !stmt.is_null() {
                // SAFETY: stmt was produced by prepare and is not used again.
                unsafe { sys::sqlite3_finalize(stmt) };
            }
            return Err(err);
        }
        // A null statement with SQLITE_OK means the text held no SQL.
        let ptr = NonNull::new(stmt).ok_or_else(|| {
            DbError::usage(format!("prepare `{sql}`: no SQL statement found"))
        })?;
        Ok(RawStmt { ptr, db: self })
    }

    /// `sqlite3_changes64`.
    pub fn changes(&self) -> i64 {
        // SAFETY: the connection is open.
        unsafe { sys::sqlite3_changes64(self.as_ptr()) }
    }

    /// `sqlite3_total_changes64`.
    pub fn total_changes(&self) -> i64 {
        // SAFETY: the connection is open.
        unsafe { sys::sqlite3_total_changes64(self.as_ptr()) }
    }

    /// `sqlite3_last_insert_rowid`.
    pub fn last_insert_rowid(&self) -> i64 {
        // SAFETY: the connection is open.
        unsafe { sys::sqlite3_last_insert_rowid(self.as_ptr()) }
    }

    /// `sqlite3_get_autocommit`; `false` while a transaction is open.
    pub fn is_autocommit(&self) -> bool {
        // SAFETY: the connection is open.
        unsafe { sys::sqlite3_get_autocommit(self.as_ptr()) != 0 }
    }

    /// Installs the engine's sleeping busy handler.
    pub fn busy_timeout(&self, millis: c_int) -> DbResult<()> {
        // SAFETY: the connection is open.
        let rc = unsafe { sys::sqlite3_busy_timeout(self.as_ptr(), millis) };
        if rc != SQLITE_OK {
            return Err(self.error(rc, "busy_timeout"));
        }
        Ok(())
    }

    /// File name backing `schema`, `None` for unknown or in-memory schemas.
    pub fn filename(&self, schema: &str) -> DbResult<Option<String>> {
        let c_schema = c_string(schema, "schema name")?;
        // SAFETY: the returned pointer is owned by the connection.
        let name = unsafe {
            owned_string(sys::sqlite3_db_filename(self.as_ptr(), c_schema.as_ptr()))
        };
        Ok(name.filter(|n| !n.is_empty()))
    }

    /// `sqlite3_table_column_metadata`.
    pub fn table_column_metadata(
        &self,
        schema: Option<&str>,
        table: &str,
        column: &str,
    ) -> DbResult<RawColumnMetadata> {
        let c_schema = schema.map(|s| c_string(s, "schema name")).transpose()?;
        let c_table = c_string(table, "table name")?;
        let c_column = c_string(column, "column name")?;
        let mut data_type: *const c_char = ptr::null();
        let mut coll_seq: *const c_char = ptr::null();
        let mut not_null: c_int = 0;
        let mut primary_key: c_int = 0;
        let mut autoinc: c_int = 0;
        // SAFETY: all input strings are valid; out-pointers point to locals.
        let rc = unsafe {
            sys::sqlite3_table_column_metadata(
                self.as_ptr(),
                c_schema.as_ref().map_or(ptr::null(), |s| s.as_ptr()),
                c_table.as_ptr(),
                c_column.as_ptr(),
                &mut data_type,
                &mut coll_seq,
                &mut not_null,
                &mut primary_key,
                &mut autoinc,
            )
        };
        if rc != SQLITE_OK {
            return Err(self.error(rc, format!("column metadata {table}.{column}")));
        }
        // SAFETY: the strings are valid until the next call on this connection.
        let (data_type, collation) =
            unsafe { (owned_string(data_type), owned_string(coll_seq)) };
        Ok(RawColumnMetadata {
            data_type: data_type.unwrap_or_default(),
            collation: collation.unwrap_or_default(),
            not_null: not_null != 0,
            primary_key: primary_key != 0,
            autoincrement: autoinc != 0,
        })
    }

    /// Opens an incremental I/O handle on one blob cell.
    ///
    /// "Success but null handle" is reported as [`DbError::NullHandle`]; a
    /// handle returned alongside a failure code is closed first.
    pub fn blob_open(
        &self,
        schema: &str,
        table: &str,
        column: &str,
        rowid: i64,
        writable: bool,
    ) -> DbResult<RawBlob<'_>> {
        let c_schema = c_string(schema, "schema name")?;
        let c_table = c_string(table, "table name")?;
        let c_column = c_string(column, "column name")?;
        let mut blob: *mut sys::sqlite3_blob = ptr::null_mut();
        // SAFETY: all input strings are valid; blob is a valid out-pointer.
        let rc = unsafe {
            sys::sqlite3_blob_open(
                self.as_ptr(),
                c_schema.as_ptr(),
                c_table.as_ptr(),
                c_column.as_ptr(),
                rowid,
                c_int::from(writable),
                &mut blob,
            )
        };
        if rc != SQLITE_OK {
            let err = self.error(
                rc,
                format!("blob open {schema}.{table}.{column} row {rowid}"),
            );
            if !blob.is_null() {
                // SAFETY: blob was produced by blob_open and is not used again.
                unsafe { sys::sqlite3_blob_close(blob) };
            }
            return Err(err);
        }
        let ptr = NonNull::new(blob).ok_or(DbError::NullHandle("blob"))?;
        Ok(RawBlob { ptr, db: self })
    }

    /// Closes the session with `sqlite3_close`, reporting `SQLITE_BUSY` when
    /// statements or blobs are still open.
    ///
    /// On failure `Drop` finalizes any statements still attached and closes
    /// the handle.
    pub fn close(self) -> DbResult<()> {
        // SAFETY: the connection is open and not used after this call.
        let rc = unsafe { sys::sqlite3_close(self.as_ptr()) };
        if rc != SQLITE_OK {
            return Err(self.error(rc, "close"));
        }
        std::mem::forget(self);
        Ok(())
    }
}

impl Drop for RawDb {
    fn drop(&mut self) {
        // SAFETY: the handle is open. Statements still attached can only be
        // leaked ones (`mem::forget`), so nothing will touch them again.
        unsafe {
            let db = self.as_ptr();
            let mut stmt = sys::sqlite3_next_stmt(db, ptr::null_mut());
            while !stmt.is_null() {
                let next = sys::sqlite3_next_stmt(db, stmt);
                sys::sqlite3_finalize(stmt);
                stmt = next;
            }
            sys::sqlite3_close(db);
        }
    }
}

/// Raw output of `sqlite3_table_column_metadata`.
pub struct RawColumnMetadata {
    pub data_type: String,
    pub collation: String,
    pub not_null: bool,
    pub primary_key: bool,
    pub autoincrement: bool,
}

// ── Statement ───────────────────────────────────────────────────────────

/// A compiled `sqlite3_stmt*` tied to the connection that prepared it.
pub struct RawStmt<'db> {
    ptr: NonNull<sys::sqlite3_stmt>,
    db: &'db RawDb,
}

impl<'db> RawStmt<'db> {
    fn as_ptr(&self) -> *mut sys::sqlite3_stmt {
        self.ptr.as_ptr()
    }

    fn check(&self, rc: c_int, context: impl Into<String>) -> DbResult<()> {
        if rc == SQLITE_OK {
            Ok(())
        } else {
            Err(self.db.error(rc, context))
        }
    }

    /// The connection this statement belongs to.
    pub const fn db(&self) -> &'db RawDb {
        self.db
    }

    pub fn bind_i64(&self, idx: c_int, value: i64) -> DbResult<()> {
        // SAFETY: the statement is live.
        let rc = unsafe { sys::sqlite3_bind_int64(self.as_ptr(), idx, value) };
        self.check(rc, format!("bind parameter {idx}"))
    }

    pub fn bind_f64(&self, idx: c_int, value: f64) -> DbResult<()> {
        // SAFETY: the statement is live.
        let rc = unsafe { sys::sqlite3_bind_double(self.as_ptr(), idx, value) };
        self.check(rc, format!("bind parameter {idx}"))
    }

    pub fn bind_text(&self, idx: c_int, value: &str) -> DbResult<()> {
        let len = len_to_c_int(value.len(), "text parameter")?;
        // SAFETY: SQLITE_TRANSIENT makes the engine copy the bytes.
        let rc = unsafe {
            sys::sqlite3_bind_text(
                self.as_ptr(),
                idx,
                value.as_ptr().cast::<c_char>(),
                len,
                sys::SQLITE_TRANSIENT(),
            )
        };
        self.check(rc, format!("bind parameter {idx}"))
    }

    pub fn bind_blob(&self, idx: c_int, value: &[u8]) -> DbResult<()> {
        let len = len_to_c_int(value.len(), "blob parameter")?;
        // SAFETY: SQLITE_TRANSIENT makes the engine copy the bytes.
        let rc = unsafe {
            sys::sqlite3_bind_blob(
                self.as_ptr(),
                idx,
                value.as_ptr().cast::<c_void>(),
                len,
                sys::SQLITE_TRANSIENT(),
            )
        };
        self.check(rc, format!("bind parameter {idx}"))
    }

    pub fn bind_zeroblob(&self, idx: c_int, len: usize) -> DbResult<()> {
        let len = len_to_c_int(len, "zeroblob parameter")?;
        // SAFETY: the statement is live.
        let rc = unsafe { sys::sqlite3_bind_zeroblob(self.as_ptr(), idx, len) };
        self.check(rc, format!("bind parameter {idx}"))
    }

    pub fn bind_null(&self, idx: c_int) -> DbResult<()> {
        // SAFETY: the statement is live.
        let rc = unsafe { sys::sqlite3_bind_null(self.as_ptr(), idx) };
        self.check(rc, format!("bind parameter {idx}"))
    }

    pub fn bind_parameter_count(&self) -> c_int {
        // SAFETY: the statement is live.
        unsafe { sys::sqlite3_bind_parameter_count(self.as_ptr()) }
    }

    pub fn clear_bindings(&self) -> DbResult<()> {
        // SAFETY: the statement is live.
        let rc = unsafe { sys::sqlite3_clear_bindings(self.as_ptr()) };
        self.check(rc, "clear bindings")
    }

    /// Advances the statement. Returns `SQLITE_ROW` or `SQLITE_DONE`; any
    /// other code becomes an error.
    pub fn step(&self) -> DbResult<c_int> {
        // SAFETY: the statement is live.
        let rc = unsafe { sys::sqlite3_step(self.as_ptr()) };
        match rc {
            SQLITE_ROW | SQLITE_DONE => Ok(rc),
            _ => Err(self.db.error(rc, format!("step `{}`", self.sql()))),
        }
    }

    pub fn reset(&self) -> DbResult<()> {
        // SAFETY: the statement is live.
        let rc = unsafe { sys::sqlite3_reset(self.as_ptr()) };
        self.check(rc, "reset")
    }

    pub fn column_count(&self) -> c_int {
        // SAFETY: the statement is live.
        unsafe { sys::sqlite3_column_count(self.as_ptr()) }
    }

    pub fn column_name(&self, idx: c_int) -> String {
        // SAFETY: the returned string is valid until the next name lookup.
        unsafe { owned_string(sys::sqlite3_column_name(self.as_ptr(), idx)) }
            .unwrap_or_default()
    }

    pub fn column_type(&self, idx: c_int) -> c_int {
        // SAFETY: the statement is live.
        unsafe { sys::sqlite3_column_type(self.as_ptr(), idx) }
    }

    pub fn column_i64(&self, idx: c_int) -> i64 {
        // SAFETY: the statement is live.
        unsafe { sys::sqlite3_column_int64(self.as_ptr(), idx) }
    }

    pub fn column_f64(&self, idx: c_int) -> f64 {
        // SAFETY: the statement is live.
        unsafe { sys::sqlite3_column_double(self.as_ptr(), idx) }
    }

    /// Reads a column as text. Returns an empty string for NULL.
    pub fn column_text(&self, idx: c_int) -> String {
        // SAFETY: text must be fetched before bytes; the buffer is valid
        // until the next step/reset and is copied out immediately.
        unsafe {
            let ptr = sys::sqlite3_column_text(self.as_ptr(), idx);
            let len = sys::sqlite3_column_bytes(self.as_ptr(), idx);
            match usize::try_from(len) {
                Ok(len) if !ptr.is_null() && len > 0 => {
                    let bytes = std::slice::from_raw_parts(ptr.cast::<u8>(), len);
                    String::from_utf8_lossy(bytes).into_owned()
                }
                _ => String::new(),
            }
        }
    }

    /// Reads a column as a blob. Returns an empty `Vec` for NULL.
    pub fn column_blob(&self, idx: c_int) -> Vec<u8> {
        // SAFETY: blob must be fetched before bytes; the buffer is valid
        // until the next step/reset and is copied out immediately.
        unsafe {
            let ptr = sys::sqlite3_column_blob(self.as_ptr(), idx);
            let len = sys::sqlite3_column_bytes(self.as_ptr(), idx);
            match usize::try_from(len) {
                Ok(len) if !ptr.is_null() && len > 0 => {
                    std::slice::from_raw_parts(ptr.cast::<u8>(), len).to_vec()
                }
                _ => Vec::new(),
            }
        }
    }

    pub fn column_decltype(&self, idx: c_int) -> Option<String> {
        // SAFETY: the statement is live.
        unsafe { owned_string(sys::sqlite3_column_decltype(self.as_ptr(), idx)) }
    }

    pub fn column_database_name(&self, idx: c_int) -> Option<String> {
        // SAFETY: the statement is live.
        unsafe {
            owned_string(sys::sqlite3_column_database_name(self.as_ptr(), idx))
        }
    }

    pub fn column_table_name(&self, idx: c_int) -> Option<String> {
        // SAFETY: the statement is live.
        unsafe { owned_string(sys::sqlite3_column_table_name(self.as_ptr(), idx)) }
    }

    pub fn column_origin_name(&self, idx: c_int) -> Option<String> {
        // SAFETY: the statement is live.
        unsafe {
            owned_string(sys::sqlite3_column_origin_name(self.as_ptr(), idx))
        }
    }

    /// `true` when the statement makes no direct changes to the database.
    pub fn readonly(&self) -> bool {
        // SAFETY: the statement is live.
        unsafe { sys::sqlite3_stmt_readonly(self.as_ptr()) != 0 }
    }

    /// The SQL text the statement was prepared from.
    pub fn sql(&self) -> String {
        // SAFETY: the text is owned by the statement.
        unsafe { owned_string(sys::sqlite3_sql(self.as_ptr())) }.unwrap_or_default()
    }

    /// Finalizes the statement and reports the engine status.
    pub fn finalize(self) -> DbResult<()> {
        let db = self.db;
        let ptr = self.as_ptr();
        std::mem::forget(self);
        // SAFETY: the statement is live and never touched again.
        let rc = unsafe { sys::sqlite3_finalize(ptr) };
        if rc != SQLITE_OK {
            return Err(db.error(rc, "finalize"));
        }
        Ok(())
    }
}

impl Drop for RawStmt<'_> {
    fn drop(&mut self) {
        // SAFETY: the statement is live and never touched again.
        unsafe {
            sys::sqlite3_finalize(self.as_ptr());
        }
    }
}

// ── Blob ────────────────────────────────────────────────────────────────

/// An open `sqlite3_blob*` incremental I/O handle.
pub struct RawBlob<'db> {
    ptr: NonNull<sys::sqlite3_blob>,
    db: &'db RawDb,
}

impl RawBlob<'_> {
    fn as_ptr(&self) -> *mut sys::sqlite3_blob {
        self.ptr.as_ptr()
    }

    /// `sqlite3_blob_bytes`.
    pub fn bytes(&self) -> usize {
        // SAFETY: the blob handle is open.
        let n = unsafe { sys::sqlite3_blob_bytes(self.as_ptr()) };
        usize::try_from(n).unwrap_or(0)
    }

    /// Reads exactly `buf.len()` bytes starting at `offset`.
    pub fn read(&self, buf: &mut [u8], offset: usize) -> DbResult<()> {
        let len = len_to_c_int(buf.len(), "blob read")?;
        let off = len_to_c_int(offset, "blob offset")?;
        // SAFETY: buf is writable for len bytes.
        let rc = unsafe {
            sys::sqlite3_blob_read(
                self.as_ptr(),
                buf.as_mut_ptr().cast::<c_void>(),
                len,
                off,
            )
        };
        if rc != SQLITE_OK {
            return Err(self.db.error(rc, format!("blob read at {offset}")));
        }
        Ok(())
    }

    /// Writes all of `buf` starting at `offset`.
    pub fn write(&self, buf: &[u8], offset: usize) -> DbResult<()> {
        let len = len_to_c_int(buf.len(), "blob write")?;
        let off = len_to_c_int(offset, "blob offset")?;
        // SAFETY: buf is readable for len bytes.
        let rc = unsafe {
            sys::sqlite3_blob_write(
                self.as_ptr(),
                buf.as_ptr().cast::<c_void>(),
                len,
                off,
            )
        };
        if rc != SQLITE_OK {
            return Err(self.db.error(rc, format!("blob write at {offset}")));
        }
        Ok(())
    }

    /// Moves the handle to another row of the same column.
    pub fn reopen(&self, rowid: i64) -> DbResult<()> {
        // SAFETY: the blob handle is open.
        let rc = unsafe { sys::sqlite3_blob_reopen(self.as_ptr(), rowid) };
        if rc != SQLITE_OK {
            return Err(self.db.error(rc, format!("blob reopen row {rowid}")));
        }
        Ok(())
    }

    /// Closes the handle and reports the engine status.
    pub fn close(self) -> DbResult<()> {
        let db = self.db;
        let ptr = self.as_ptr();
        std::mem::forget(self);
        // SAFETY: the handle is open and never touched again.
        let rc = unsafe { sys::sqlite3_blob_close(ptr) };
        if rc != SQLITE_OK {
            return Err(db.error(rc, "blob close"));
        }
        Ok(())
    }
}

impl Drop for RawBlob<'_> {
    fn drop(&mut self) {
        // SAFETY: the handle is open and never touched again.
        unsafe {
            sys::sqlite3_blob_close(self.as_ptr());
        }
    }
}

// ── Backup ──────────────────────────────────────────────────────────────

/// An in-progress `sqlite3_backup*` between two connections.
pub struct RawBackup<'a> {
    ptr: NonNull<sys::sqlite3_backup>,
    dst: &'a RawDb,
    _src: PhantomData<&'a RawDb>,
}

impl<'a> RawBackup<'a> {
    /// `sqlite3_backup_init`. Errors are recorded on the destination.
    pub fn init(
        dst: &'a RawDb,
        dst_name: &str,
        src: &'a RawDb,
        src_name: &str,
    ) -> DbResult<Self> {
        let c_dst = c_string(dst_name, "destination schema")?;
        let c_src = c_string(src_name, "source schema")?;
        // SAFETY: both connections are open and the names are valid.
        let ptr = unsafe {
            sys::sqlite3_backup_init(
                dst.as_ptr(),
                c_dst.as_ptr(),
                src.as_ptr(),
                c_src.as_ptr(),
            )
        };
        match NonNull::new(ptr) {
            Some(ptr) => Ok(Self {
                ptr,
                dst,
                _src: PhantomData,
            }),
            None => {
                // SAFETY: the destination connection is open.
                let rc = unsafe { sys::sqlite3_extended_errcode(dst.as_ptr()) };
                Err(dst.error(rc, format!("backup init {src_name} -> {dst_name}")))
            }
        }
    }

    fn as_ptr(&self) -> *mut sys::sqlite3_backup {
        self.ptr.as_ptr()
    }

    /// Copies up to `pages` pages (negative copies everything). Returns the
    /// raw status so the caller can tell retryable codes apart.
    pub fn step(&self, pages: c_int) -> c_int {
        // SAFETY: the backup handle is live.
        unsafe { sys::sqlite3_backup_step(self.as_ptr(), pages) }
    }

    pub fn remaining(&self) -> c_int {
        // SAFETY: the backup handle is live.
        unsafe { sys::sqlite3_backup_remaining(self.as_ptr()) }
    }

    pub fn pagecount(&self) -> c_int {
        // SAFETY: the backup handle is live.
        unsafe { sys::sqlite3_backup_pagecount(self.as_ptr()) }
    }

    /// The engine error for a failed step, read from the destination.
    pub fn error(&self, code: c_int) -> DbError {
        self.dst.error(code, "backup step")
    }

    /// Releases the handle and reports the final status.
    pub fn finish(self) -> DbResult<()> {
        let dst = self.dst;
        let ptr = self.as_ptr();
        std::mem::forget(self);
        // SAFETY: the backup handle is live and never touched again.
        let rc = unsafe { sys::sqlite3_backup_finish(ptr) };
        if rc != SQLITE_OK {
            return Err(dst.error(rc, "backup finish"));
        }
        Ok(())
    }
}

impl Drop for RawBackup<'_> {
    fn drop(&mut self) {
        // SAFETY: the backup handle is live and never touched again.
        unsafe {
            sys::sqlite3_backup_finish(self.as_ptr());
        }
    }
}
