//! Incremental I/O on a single blob cell.
//!
//! A handle addresses one `(schema, table, column, rowid)` cell. Reads and
//! writes are positional: each handle keeps its own read offset and, for
//! [`BlobReadWriter`], an independent write offset. A request either covers
//! its whole window or fails with [`DbError::Range`] without moving the
//! offset. Writes never change the size of the blob; reserve space up front
//! with [`Statement::bind_zeroblob`](crate::Statement::bind_zeroblob).

use super::connection::Connection;
use super::error::{DbError, DbResult};
use super::ffi::RawBlob;
use super::logger::LogHandle;

/// State shared by the reader and read-writer.
struct BlobCell<'conn> {
    handle: Option<RawBlob<'conn>>,
    log: &'conn LogHandle,
    target: String,
    read_offset: usize,
}

impl<'conn> BlobCell<'conn> {
    fn open(
        conn: &'conn Connection,
        schema: &str,
        table: &str,
        column: &str,
        rowid: i64,
        writable: bool,
    ) -> DbResult<Self> {
        let target = format!("{schema}.{table}.{column}");
        let log = conn.log();
        let handle = conn
            .raw()
            .blob_open(schema, table, column, rowid, writable)
            .inspect_err(|e| log.debug(|| format!("{e}")))?;
        log.trace(|| format!("blob open {target} row {rowid} writable={writable}"));
        Ok(Self {
            handle: Some(handle),
            log,
            target,
            read_offset: 0,
        })
    }

    fn handle(&self) -> DbResult<&RawBlob<'conn>> {
        self.handle
            .as_ref()
            .ok_or_else(|| DbError::usage(format!("blob {} is closed", self.target)))
    }

    fn size(&self) -> DbResult<usize> {
        Ok(self.handle()?.bytes())
    }

    /// Validates `[offset, offset + len)` against the blob size.
    fn window(&self, op: &'static str, offset: usize, len: usize) -> DbResult<&RawBlob<'conn>> {
        let handle = self.handle()?;
        let size = handle.bytes();
        match offset.checked_add(len) {
            Some(end) if end <= size => Ok(handle),
            _ => Err(DbError::Range {
                op,
                offset,
                len,
                size,
            }),
        }
    }

    fn read(&mut self, buf: &mut [u8]) -> DbResult<()> {
        let offset = self.read_offset;
        self.window("read", offset, buf.len())?.read(buf, offset)?;
        self.read_offset = offset + buf.len();
        Ok(())
    }

    fn seek_checked(&self, offset: usize) -> DbResult<()> {
        let size = self.size()?;
        if offset > size {
            return Err(DbError::Range {
                op: "seek",
                offset,
                len: 0,
                size,
            });
        }
        Ok(())
    }

    fn reopen(&mut self, rowid: i64) -> DbResult<()> {
        self.handle()?
            .reopen(rowid)
            .inspect_err(|e| self.log.debug(|| format!("{e}")))?;
        self.read_offset = 0;
        self.log
            .trace(|| format!("blob reopen {} row {rowid}", self.target));
        Ok(())
    }

    fn close(&mut self) -> DbResult<()> {
        let handle = self.handle.take().ok_or_else(|| {
            DbError::usage(format!("blob {} is already closed", self.target))
        })?;
        self.log.trace(|| format!("blob close {}", self.target));
        handle.close()
    }
}

/// Read-only handle on one blob cell.
///
/// Obtained from [`Connection::blob_reader`]. The handle is released on
/// [`close`](Self::close) or drop.
pub struct BlobReader<'conn> {
    cell: BlobCell<'conn>,
}

impl<'conn> BlobReader<'conn> {
    /// Opens `schema.table.column` at `rowid` for reading.
    ///
    /// # Errors
    ///
    /// Engine errors (missing row, table, column; non-blob column ...);
    /// [`DbError::NullHandle`] if the engine reported success without a
    /// handle.
    pub fn open(
        conn: &'conn Connection,
        schema: &str,
        table: &str,
        column: &str,
        rowid: i64,
    ) -> DbResult<Self> {
        Ok(Self {
            cell: BlobCell::open(conn, schema, table, column, rowid, false)?,
        })
    }

    /// Fills `buf` from the current read offset and advances it by
    /// `buf.len()`.
    ///
    /// # Errors
    ///
    /// [`DbError::Range`] if fewer than `buf.len()` bytes remain; the offset
    /// is left unchanged. [`DbError::Usage`] once closed.
    pub fn read(&mut self, buf: &mut [u8]) -> DbResult<()> {
        self.cell.read(buf)
    }

    /// Byte length of the blob in the current row.
    ///
    /// # Errors
    ///
    /// [`DbError::Usage`] once closed.
    pub fn size(&self) -> DbResult<usize> {
        self.cell.size()
    }

    /// Current read offset.
    #[must_use]
    pub const fn read_offset(&self) -> usize {
        self.cell.read_offset
    }

    /// Moves the read offset. `offset == size()` is allowed.
    ///
    /// # Errors
    ///
    /// [`DbError::Range`] past the end; [`DbError::Usage`] once closed.
    pub fn set_read_offset(&mut self, offset: usize) -> DbResult<()> {
        self.cell.seek_checked(offset)?;
        self.cell.read_offset = offset;
        Ok(())
    }

    /// Points the handle at another row of the same column and rewinds the
    /// read offset to zero.
    ///
    /// # Errors
    ///
    /// Engine errors if the row does not exist or holds no blob.
    pub fn reopen(&mut self, rowid: i64) -> DbResult<()> {
        self.cell.reopen(rowid)
    }

    /// Releases the handle.
    ///
    /// # Errors
    ///
    /// [`DbError::Usage`] if already closed; engine errors from
    /// `sqlite3_blob_close`.
    pub fn close(&mut self) -> DbResult<()> {
        self.cell.close()
    }
}

impl std::fmt::Debug for BlobReader<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlobReader")
            .field("target", &self.cell.target)
            .field("open", &self.cell.handle.is_some())
            .field("read_offset", &self.cell.read_offset)
            .finish_non_exhaustive()
    }
}

/// Read-write handle on one blob cell.
///
/// Reads and writes track separate offsets. Obtained from
/// [`Connection::blob_read_writer`].
pub struct BlobReadWriter<'conn> {
    cell: BlobCell<'conn>,
    write_offset: usize,
}

impl<'conn> BlobReadWriter<'conn> {
    /// Opens `schema.table.column` at `rowid` for reading and writing.
    ///
    /// # Errors
    ///
    /// As [`BlobReader::open`], plus `SQLITE_READONLY` on a read-only
    /// connection.
    pub fn open(
        conn: &'conn Connection,
        schema: &str,
        table: &str,
        column: &str,
        rowid: i64,
    ) -> DbResult<Self> {
        Ok(Self {
            cell: BlobCell::open(conn, schema, table, column, rowid, true)?,
            write_offset: 0,
        })
    }

    /// See [`BlobReader::read`].
    ///
    /// # Errors
    ///
    /// See [`BlobReader::read`].
    pub fn read(&mut self, buf: &mut [u8]) -> DbResult<()> {
        self.cell.read(buf)
    }

    /// Writes all of `buf` at the current write offset and advances it by
    /// `buf.len()`. The blob never grows.
    ///
    /// # Errors
    ///
    /// [`DbError::Range`] if the window runs past the end of the blob; the
    /// offset is left unchanged. [`DbError::Usage`] once closed.
    pub fn write(&mut self, buf: &[u8]) -> DbResult<()> {
        let offset = self.write_offset;
        self.cell.window("write", offset, buf.len())?.write(buf, offset)?;
        self.write_offset = offset + buf.len();
        Ok(())
    }

    /// Byte length of the blob in the current row.
    ///
    /// # Errors
    ///
    /// [`DbError::Usage`] once closed.
    pub fn size(&self) -> DbResult<usize> {
        self.cell.size()
    }

    /// Current read offset.
    #[must_use]
    pub const fn read_offset(&self) -> usize {
        self.cell.read_offset
    }

    /// Current write offset.
    #[must_use]
    pub const fn write_offset(&self) -> usize {
        self.write_offset
    }

    /// Moves the read offset. `offset == size()` is allowed.
    ///
    /// # Errors
    ///
    /// [`DbError::Range`] past the end; [`DbError::Usage`] once closed.
    pub fn set_read_offset(&mut self, offset: usize) -> DbResult<()> {
        self.cell.seek_checked(offset)?;
        self.cell.read_offset = offset;
        Ok(())
    }

    /// Moves the write offset. `offset == size()` is allowed.
    ///
    /// # Errors
    ///
    /// [`DbError::Range`] past the end; [`DbError::Usage`] once closed.
    pub fn set_write_offset(&mut self, offset: usize) -> DbResult<()> {
        self.cell.seek_checked(offset)?;
        self.write_offset = offset;
        Ok(())
    }

    /// Points the handle at another row of the same column and rewinds both
    /// offsets to zero.
    ///
    /// # Errors
    ///
    /// Engine errors if the row does not exist or holds no blob.
    pub fn reopen(&mut self, rowid: i64) -> DbResult<()> {
        self.cell.reopen(rowid)?;
        self.write_offset = 0;
        Ok(())
    }

    /// Releases the handle.
    ///
    /// # Errors
    ///
    /// [`DbError::Usage`] if already closed; engine errors from
    /// `sqlite3_blob_close`.
    pub fn close(&mut self) -> DbResult<()> {
        self.cell.close()
    }
}

impl std::fmt::Debug for BlobReadWriter<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlobReadWriter")
            .field("target", &self.cell.target)
            .field("open", &self.cell.handle.is_some())
            .field("read_offset", &self.cell.read_offset)
            .field("write_offset", &self.write_offset)
            .finish_non_exhaustive()
    }
}
