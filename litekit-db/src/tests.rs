//! Unit tests for the safe SQLite db wrapper.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;

use super::logger::{LogLevel, Logger};
use super::*;

fn conn_with_table() -> Connection {
    let conn = Connection::open_in_memory().expect("open in-memory db");
    conn.execute_batch("CREATE TABLE t (id INTEGER PRIMARY KEY, val TEXT);")
        .expect("create table");
    conn
}

fn fill(conn: &Connection, rows: i64) {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS test (id INTEGER PRIMARY KEY NOT NULL, \
         float_num REAL, int_num INTEGER, a_string TEXT);",
    )
    .expect("create test table");
    let tx = conn.transaction().expect("begin tx");
    {
        let mut stmt = tx
            .prepare("INSERT INTO test (float_num, int_num, a_string) VALUES (?1, ?2, ?3)")
            .expect("prepare insert");
        for i in 0..rows {
            stmt.execute(params![1.5_f64, i, format!("row {i}")])
                .expect("insert row");
        }
    }
    tx.commit().expect("commit");
}

fn drain(rx: &mut mpsc::Receiver<BackupStatus>) -> Vec<BackupStatus> {
    let mut out = Vec::new();
    while let Ok(status) = rx.try_recv() {
        out.push(status);
    }
    out
}

#[derive(Default)]
struct CaptureLogger(Mutex<Vec<(LogLevel, String)>>);

impl Logger for CaptureLogger {
    fn log(&self, level: LogLevel, message: String) {
        self.0.lock().expect("logger lock").push((level, message));
    }
}

impl CaptureLogger {
    fn contains(&self, level: LogLevel, needle: &str) -> bool {
        self.0
            .lock()
            .expect("logger lock")
            .iter()
            .any(|(l, m)| *l == level && m.contains(needle))
    }
}

// ── Connection ──────────────────────────────────────────────────────────

#[test]
fn test_open_in_memory() {
    let conn = conn_with_table();
    conn.execute(
        "INSERT INTO t (id, val) VALUES (?1, ?2)",
        params![Value::Integer(1), Value::from("hello")],
    )
    .expect("insert");
    let result = conn
        .query_row("SELECT val FROM t WHERE id = ?1", params![1_i64], |stmt| {
            Ok(stmt.column_text(0))
        })
        .expect("query");
    assert_eq!(result, "hello");
}

#[test]
fn test_query_row_optional_none() {
    let conn = conn_with_table();
    let result = conn
        .query_row_optional("SELECT id FROM t WHERE id = 999", &[], |stmt| {
            Ok(stmt.column_i64(0))
        })
        .expect("query");
    assert!(result.is_none());
    let err = conn
        .query_row("SELECT id FROM t WHERE id = 999", &[], |stmt| Ok(stmt.column_i64(0)))
        .expect_err("no row");
    assert!(matches!(err, DbError::NoSuchObject { kind: "row", .. }));
}

#[test]
fn test_query_map_collects_all_rows() {
    let conn = Connection::open_in_memory().expect("open in-memory db");
    fill(&conn, 5);
    let ids = conn
        .query_map("SELECT int_num FROM test ORDER BY id", &[], |row| Ok(row.column_i64(0)))
        .expect("query map");
    assert_eq!(ids, vec![0, 1, 2, 3, 4]);
}

#[test]
fn test_prepare_error_carries_engine_message() {
    let conn = Connection::open_in_memory().expect("open in-memory db");
    let err = conn.prepare("SELECT * FROM missing").expect_err("no such table");
    match err {
        DbError::Engine { code, message, .. } => {
            assert_eq!(code.primary(), 1);
            assert!(message.contains("no such table"), "{message}");
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert!(matches!(
        conn.prepare("   ").expect_err("empty"),
        DbError::Usage(_)
    ));
}

#[test]
fn test_open_options_read_only_rejects_writes() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("ro.db");
    {
        let conn = Connection::open(&path, false).expect("create");
        conn.execute_batch("CREATE TABLE t (id INTEGER);").expect("create table");
        conn.close().expect("close");
    }
    let conn = OpenOptions::new().read_only(true).open(&path).expect("open read-only");
    let err = conn.execute_batch("INSERT INTO t VALUES (1);").expect_err("read-only");
    assert_eq!(err.code().map(DbErrorCode::primary), Some(8));
    let filename = conn.filename("main").expect("filename").expect("file backed");
    assert!(filename.ends_with("ro.db"), "{filename}");
}

#[test]
fn test_open_options_create_false_on_missing_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let err = OpenOptions::new()
        .create(false)
        .open(dir.path().join("absent.db"))
        .expect_err("missing file");
    assert_eq!(err.code().map(DbErrorCode::primary), Some(14));
}

#[test]
fn test_in_memory_has_no_filename() {
    let conn = Connection::open_in_memory().expect("open in-memory db");
    assert_eq!(conn.filename("main").expect("filename"), None);
}

#[test]
fn test_close_reports_leaked_statement() {
    let conn = Connection::open_in_memory().expect("open in-memory db");
    let stmt = conn.prepare("SELECT 1").expect("prepare");
    std::mem::forget(stmt);
    let err = conn.close().expect_err("statement still open");
    assert!(err.is_busy(), "{err:?}");
}

#[test]
fn test_close_clean_connection() {
    let conn = conn_with_table();
    {
        let mut stmt = conn.prepare("SELECT * FROM t").expect("prepare");
        let mut rows = stmt.query(&[]).expect("query");
        assert!(rows.next_row().expect("step").is_none());
    }
    conn.close().expect("close");
}

#[test]
fn test_injected_logger_receives_events() {
    let logger = Arc::new(CaptureLogger::default());
    let conn = OpenOptions::new()
        .logger(logger.clone())
        .open(":memory:")
        .expect("open");
    assert!(logger.contains(LogLevel::Debug, "opened"));
    conn.execute_batch("CREATE TABLE t (id INTEGER);").expect("create");
    {
        let tx = conn.transaction().expect("begin");
        tx.execute("INSERT INTO t VALUES (1)", &[]).expect("insert");
    }
    assert!(logger.contains(LogLevel::Warn, "rolling back"));
}

#[test]
fn test_sqlite_version() {
    assert!(sqlite_version().starts_with("3."));
}

// ── Transactions ────────────────────────────────────────────────────────

#[test]
fn test_transaction_commit() {
    let conn = conn_with_table();
    {
        let tx = conn.transaction().expect("begin tx");
        tx.execute("INSERT INTO t (id) VALUES (?1)", params![42_i64])
            .expect("insert");
        tx.commit().expect("commit");
    }
    let result = conn
        .query_row("SELECT id FROM t WHERE id = 42", &[], |stmt| {
            Ok(stmt.column_i64(0))
        })
        .expect("query");
    assert_eq!(result, 42);
}

#[test]
fn test_transaction_rollback_on_drop() {
    let conn = conn_with_table();
    {
        let tx = conn.transaction().expect("begin tx");
        tx.execute("INSERT INTO t (id) VALUES (?1)", params![99_i64])
            .expect("insert");
        // Drop without commit -> rollback
    }
    assert!(conn.is_autocommit());
    let result = conn
        .query_row_optional("SELECT id FROM t WHERE id = 99", &[], |stmt| {
            Ok(stmt.column_i64(0))
        })
        .expect("query");
    assert!(result.is_none());
}

#[test]
fn test_transaction_explicit_rollback() {
    let conn = conn_with_table();
    let tx = conn.transaction_immediate().expect("begin tx");
    tx.execute("INSERT INTO t (id) VALUES (1)", &[]).expect("insert");
    tx.rollback().expect("rollback");
    let count = conn
        .query_row("SELECT count(*) FROM t", &[], |s| Ok(s.column_i64(0)))
        .expect("count");
    assert_eq!(count, 0);
}

#[test]
fn test_nested_begin_is_usage_error() {
    let conn = conn_with_table();
    let tx = conn.transaction().expect("begin tx");
    let err = conn.transaction().expect_err("nested");
    assert!(matches!(err, DbError::Usage(_)), "{err:?}");
    tx.commit().expect("outer commit still works");

    conn.execute_batch("BEGIN").expect("manual begin");
    assert!(matches!(conn.transaction_immediate(), Err(DbError::Usage(_))));
    conn.execute_batch("ROLLBACK").expect("manual rollback");
}

// ── Statements and rows ─────────────────────────────────────────────────

#[test]
fn test_exec_result_is_scoped_to_its_statement() {
    let conn = conn_with_table();
    let mut insert = conn
        .prepare("INSERT INTO t (val) VALUES (?1)")
        .expect("prepare insert");
    let first = insert.execute(params!["a"]).expect("insert a");
    let second = insert.execute(params!["b"]).expect("insert b");
    assert_eq!(first.rows_affected, 1);
    assert_eq!(second.rows_affected, 1);
    assert_eq!(second.last_insert_rowid, first.last_insert_rowid + 1);

    let update = conn
        .execute("UPDATE t SET val = 'z'", &[])
        .expect("update");
    assert_eq!(update.rows_affected, 2);
    // The captured result does not move when later statements run.
    assert_eq!(first.last_insert_rowid, 1);

    let ddl = conn
        .execute("CREATE TABLE other (x INTEGER)", &[])
        .expect("ddl");
    assert_eq!(ddl.rows_affected, 0);
    let select = conn.execute("SELECT * FROM t", &[]).expect("select");
    assert_eq!(select.rows_affected, 0);
    assert_eq!(conn.total_changes(), 4);
}

#[test]
fn test_bind_count_mismatch_is_usage_error() {
    let conn = conn_with_table();
    let mut stmt = conn
        .prepare("INSERT INTO t (id, val) VALUES (?1, ?2)")
        .expect("prepare");
    assert_eq!(stmt.bind_parameter_count(), 2);
    assert!(matches!(
        stmt.execute(params![1_i64]),
        Err(DbError::Usage(_))
    ));
    assert!(matches!(
        stmt.execute(params![1_i64, "a", "extra"]),
        Err(DbError::Usage(_))
    ));
    stmt.execute(params![1_i64, "a"]).expect("correct arity");
}

#[test]
fn test_constraint_violation_resets_statement() {
    let conn = conn_with_table();
    let mut stmt = conn
        .prepare("INSERT INTO t (id, val) VALUES (?1, ?2)")
        .expect("prepare");
    stmt.execute(params![1_i64, "a"]).expect("first insert");
    let err = stmt.execute(params![1_i64, "b"]).expect_err("duplicate key");
    assert_eq!(err.code().map(DbErrorCode::primary), Some(19));
    assert_eq!(stmt.state(), StatementState::Idle);
    stmt.execute(params![2_i64, "b"]).expect("statement reusable");
}

#[test]
fn test_rows_do_not_restart_after_step_error() {
    let conn = Connection::open_in_memory().expect("open in-memory db");
    conn.execute_batch("CREATE TABLE p (x INTEGER); INSERT INTO p VALUES (1), (2), (3);")
        .expect("seed");
    let mut stmt = conn
        .prepare(
            "SELECT CASE WHEN x = 2 THEN abs(-9223372036854775807 - 1) ELSE x END \
             FROM p ORDER BY x",
        )
        .expect("prepare");
    let mut rows = stmt.query(&[]).expect("query");
    let mut dest = [Value::Null];
    assert_eq!(rows.next_into(&mut dest).expect("first row"), Next::Row);
    assert_eq!(dest[0], Value::Integer(1));
    let err = rows.next_into(&mut dest).expect_err("integer overflow");
    assert!(matches!(err, DbError::Engine { .. }), "{err:?}");
    for _ in 0..3 {
        assert_eq!(rows.next_into(&mut dest).expect("finished"), Next::EndOfSequence);
    }
    assert_eq!(dest[0], Value::Integer(1));
    rows.close().expect("close");
    drop(rows);

    // A fresh query runs the statement again from the start.
    let mut rows = stmt.query(&[]).expect("query again");
    assert!(rows.next_row().expect("first row again").is_some());
}

#[test]
fn test_execute_keeps_manual_bindings() {
    let conn = conn_with_table();
    let mut stmt = conn
        .prepare("INSERT INTO t (id, val) VALUES (?1, ?2)")
        .expect("prepare");
    stmt.bind_value(1, &Value::Integer(7)).expect("bind id");
    stmt.bind_value(2, &Value::from("seven")).expect("bind val");
    assert_eq!(stmt.state(), StatementState::Bound);
    let done = stmt.execute(&[]).expect("execute with manual bindings");
    assert_eq!(done.rows_affected, 1);
    assert_eq!(done.last_insert_rowid, 7);

    // Once reset, an empty argument list is checked against the count again.
    assert!(matches!(stmt.execute(&[]), Err(DbError::Usage(_))));

    let mut select = conn.prepare("SELECT val FROM t WHERE id = ?1").expect("prepare");
    select.bind_value(1, &Value::Integer(7)).expect("bind");
    let mut rows = select.query(&[]).expect("query with manual bindings");
    let mut dest = [Value::Null];
    assert_eq!(rows.next_into(&mut dest).expect("row"), Next::Row);
    assert_eq!(dest[0], Value::from("seven"));
}

#[test]
fn test_rows_end_of_sequence_is_idempotent() {
    let conn = Connection::open_in_memory().expect("open in-memory db");
    fill(&conn, 3);
    let mut stmt = conn
        .prepare("SELECT id, a_string FROM test ORDER BY id")
        .expect("prepare");
    let mut rows = stmt.query(&[]).expect("query");
    let mut dest = vec![Value::Null; 2];
    let mut seen = Vec::new();
    while rows.next_into(&mut dest).expect("next") == Next::Row {
        seen.push(dest[0].clone());
    }
    assert_eq!(seen.len(), 3);
    for _ in 0..3 {
        assert_eq!(rows.next_into(&mut dest).expect("next"), Next::EndOfSequence);
    }
    assert!(rows.next_row().expect("next").is_none());
}

#[test]
fn test_rows_columns_are_memoized() {
    let conn = Connection::open_in_memory().expect("open in-memory db");
    fill(&conn, 1);
    let mut stmt = conn
        .prepare("SELECT id, int_num AS n FROM test")
        .expect("prepare");
    let rows = stmt.query(&[]).expect("query");
    let first = rows.columns();
    assert_eq!(first, ["id".to_string(), "n".to_string()]);
    assert!(std::ptr::eq(first, rows.columns()));
}

#[test]
fn test_rows_destination_wider_than_row() {
    let conn = Connection::open_in_memory().expect("open in-memory db");
    let mut stmt = conn.prepare("SELECT 1").expect("prepare");
    let mut rows = stmt.query(&[]).expect("query");
    let mut dest = vec![Value::Null; 2];
    assert!(matches!(rows.next_into(&mut dest), Err(DbError::Usage(_))));
}

#[test]
fn test_rows_close_resets_statement() {
    let conn = Connection::open_in_memory().expect("open in-memory db");
    fill(&conn, 4);
    let mut stmt = conn
        .prepare("SELECT int_num FROM test WHERE int_num >= ?1 ORDER BY id")
        .expect("prepare");
    {
        let mut rows = stmt.query(params![2_i64]).expect("query");
        let row = rows.next_row().expect("step").expect("row");
        assert_eq!(row.column_i64(0), 2);
        rows.close().expect("close");
        rows.close().expect("second close is a no-op");
        assert!(rows.next_row().expect("closed cursor").is_none());
    }
    assert_eq!(stmt.state(), StatementState::Idle);
    let mut rows = stmt.query(params![3_i64]).expect("rebind");
    let all = rows.map(|r| Ok(r.column_i64(0))).expect("map");
    assert_eq!(all, vec![3]);
}

#[test]
fn test_step_after_done_does_not_restart() {
    let conn = Connection::open_in_memory().expect("open in-memory db");
    fill(&conn, 1);
    let mut stmt = conn.prepare("SELECT id FROM test").expect("prepare");
    assert_eq!(stmt.state(), StatementState::Idle);
    assert_eq!(stmt.step().expect("step"), StepResult::Row);
    assert_eq!(stmt.state(), StatementState::RowAvailable);
    assert_eq!(stmt.step().expect("step"), StepResult::Done);
    assert_eq!(stmt.step().expect("step"), StepResult::Done);
    assert_eq!(stmt.state(), StatementState::Exhausted);
    assert!(matches!(
        stmt.bind_value(1, &Value::Null),
        Err(DbError::Usage(_))
    ));
    stmt.reset().expect("reset");
    assert_eq!(stmt.step().expect("step"), StepResult::Row);
    stmt.finalize().expect("finalize");
}

#[test]
fn test_column_values_and_types() {
    let conn = Connection::open_in_memory().expect("open in-memory db");
    let mut stmt = conn
        .prepare("SELECT 1, 2.5, 'x', x'0102', NULL")
        .expect("prepare");
    assert_eq!(stmt.step().expect("step"), StepResult::Row);
    assert_eq!(stmt.column_type(0), ColumnType::Integer);
    assert_eq!(
        (0..5).map(|i| stmt.column_value(i)).collect::<Vec<_>>(),
        vec![
            Value::Integer(1),
            Value::Real(2.5),
            Value::Text("x".into()),
            Value::Blob(vec![1, 2]),
            Value::Null,
        ]
    );
    assert_eq!(stmt.column_optional_i64(4), None);
    assert_eq!(stmt.column_optional_blob(3), Some(vec![1, 2]));
    assert!(stmt.is_readonly());
}

#[test]
fn test_column_datetime() {
    let conn = Connection::open_in_memory().expect("open in-memory db");
    for sql in [
        "SELECT date('now')",
        "SELECT time('now')",
        "SELECT strftime('%Y-%m-%dT%H:%M:%f', 'now')",
        "SELECT CAST(strftime('%J', 'now') AS NUMERIC)",
        "SELECT CAST(strftime('%s', 'now') AS NUMERIC)",
    ] {
        let dt = conn
            .query_row(sql, &[], |row| row.column_datetime(0))
            .expect(sql);
        assert!(dt.timestamp() > 0, "{sql}");
    }
}

// ── Blob I/O ────────────────────────────────────────────────────────────

fn blob_table(conn: &Connection, size: usize) -> i64 {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS b (id INTEGER PRIMARY KEY, data BLOB);")
        .expect("create blob table");
    let mut stmt = conn.prepare("INSERT INTO b (data) VALUES (?1)").expect("prepare");
    stmt.bind_zeroblob(1, size).expect("bind zeroblob");
    while stmt.step().expect("step") == StepResult::Row {}
    conn.last_insert_rowid()
}

#[test]
fn test_blob_round_trip() {
    let conn = Connection::open_in_memory().expect("open in-memory db");
    let rowid = blob_table(&conn, 10);

    let mut writer = conn
        .blob_read_writer("main", "b", "data", rowid)
        .expect("open writer");
    assert_eq!(writer.size().expect("size"), 10);
    writer.write(b"0123").expect("write head");
    writer.write(b"456789").expect("write tail");
    assert_eq!(writer.write_offset(), 10);
    assert_eq!(writer.read_offset(), 0);
    writer.close().expect("close writer");

    let mut reader = conn.blob_reader("main", "b", "data", rowid).expect("open reader");
    let mut buf = [0_u8; 10];
    reader.read(&mut buf).expect("read");
    assert_eq!(&buf, b"0123456789");
    assert_eq!(reader.read_offset(), 10);
}

#[test]
fn test_blob_out_of_range_keeps_offsets() {
    let conn = Connection::open_in_memory().expect("open in-memory db");
    let rowid = blob_table(&conn, 8);
    let mut blob = conn
        .blob_read_writer("main", "b", "data", rowid)
        .expect("open");

    blob.write(b"abcdef").expect("write");
    let err = blob.write(b"xyz").expect_err("does not grow");
    assert_eq!(
        err,
        DbError::Range {
            op: "write",
            offset: 6,
            len: 3,
            size: 8
        }
    );
    assert_eq!(blob.write_offset(), 6);
    assert_eq!(blob.size().expect("size"), 8);

    let mut buf = [0_u8; 5];
    blob.read(&mut buf).expect("read");
    let err = blob.read(&mut buf).expect_err("no partial read");
    assert!(matches!(err, DbError::Range { op: "read", .. }));
    assert_eq!(blob.read_offset(), 5);

    assert!(blob.set_read_offset(9).is_err());
    blob.set_read_offset(8).expect("end is a valid offset");
    blob.read(&mut [0_u8; 0]).expect("empty read at end");
}

#[test]
fn test_blob_reopen_resets_both_offsets() {
    let conn = Connection::open_in_memory().expect("open in-memory db");
    let first = blob_table(&conn, 4);
    let second = blob_table(&conn, 6);
    conn.execute("UPDATE b SET data = x'0a0b0c0d0e0f' WHERE id = ?1", params![second])
        .expect("fill second");

    let mut blob = conn
        .blob_read_writer("main", "b", "data", first)
        .expect("open");
    blob.write(&[1, 2]).expect("write");
    let mut buf = [0_u8; 3];
    blob.read(&mut buf).expect("read");
    assert_eq!((blob.read_offset(), blob.write_offset()), (3, 2));

    blob.reopen(second).expect("reopen");
    assert_eq!((blob.read_offset(), blob.write_offset()), (0, 0));
    assert_eq!(blob.size().expect("size"), 6);
    blob.read(&mut buf).expect("read second row");
    assert_eq!(buf, [0x0a, 0x0b, 0x0c]);
}

#[test]
fn test_blob_close_twice_is_usage_error() {
    let conn = Connection::open_in_memory().expect("open in-memory db");
    let rowid = blob_table(&conn, 4);
    let mut blob = conn.blob_reader("main", "b", "data", rowid).expect("open");
    blob.close().expect("close");
    assert!(matches!(blob.close(), Err(DbError::Usage(_))));
    let mut buf = [0_u8; 1];
    assert!(matches!(blob.read(&mut buf), Err(DbError::Usage(_))));
    assert!(matches!(blob.size(), Err(DbError::Usage(_))));
}

#[test]
fn test_blob_open_missing_row() {
    let conn = Connection::open_in_memory().expect("open in-memory db");
    blob_table(&conn, 4);
    let err = conn
        .blob_reader("main", "b", "data", 404)
        .expect_err("missing row");
    assert!(matches!(err, DbError::Engine { .. }), "{err:?}");
}

// ── Backup ──────────────────────────────────────────────────────────────

#[test]
fn test_backup_all_at_once_notifies_once() {
    let src = Connection::open_in_memory().expect("open src");
    fill(&src, 100);
    let mut dst = Connection::open_in_memory().expect("open dst");
    let (tx, mut rx) = mpsc::channel(16);

    Backup::new(&mut dst, "main", &src, "main")
        .expect("init")
        .run(&BackupOptions::new(0), Some(&tx))
        .expect("run");

    let statuses = drain(&mut rx);
    assert_eq!(statuses.len(), 1);
    assert_eq!(statuses[0].remaining, 0);
    assert!(statuses[0].page_count > 0);
}

#[test]
fn test_backup_notifications_per_step() {
    let src = Connection::open_in_memory().expect("open src");
    src.execute_batch(
        "CREATE TABLE big (data BLOB);
         WITH RECURSIVE n(i) AS (SELECT 1 UNION ALL SELECT i + 1 FROM n WHERE i < 200)
         INSERT INTO big SELECT randomblob(1000) FROM n;",
    )
    .expect("fill");
    let mut dst = Connection::open_in_memory().expect("open dst");
    let (tx, mut rx) = mpsc::channel(1024);
    let pages_per_step = 5_u32;

    Backup::new(&mut dst, "main", &src, "main")
        .expect("init")
        .run(&BackupOptions::new(5), Some(&tx))
        .expect("run");

    let statuses = drain(&mut rx);
    let page_count = statuses.last().expect("at least one").page_count;
    assert_eq!(statuses.len(), page_count.div_ceil(pages_per_step) as usize);
    assert!(statuses.windows(2).all(|w| w[1].remaining < w[0].remaining));
    assert_eq!(statuses.last().map(|s| s.remaining), Some(0));
}

#[test]
fn test_backup_thousand_rows_in_steps_of_ten() {
    let src = Connection::open_in_memory().expect("open src");
    fill(&src, 1000);
    let mut dst = Connection::open_in_memory().expect("open dst");
    let (tx, _rx) = mpsc::channel(1024);
    Backup::new(&mut dst, "main", &src, "main")
        .expect("init")
        .run(&BackupOptions::new(10), Some(&tx))
        .expect("run");
    let count = dst
        .query_row("SELECT count(*) FROM test", &[], |s| Ok(s.column_i64(0)))
        .expect("count");
    assert_eq!(count, 1000);
}

#[test]
fn test_backup_unconsumed_sink_does_not_block() {
    let src = Connection::open_in_memory().expect("open src");
    fill(&src, 500);
    let mut dst = Connection::open_in_memory().expect("open dst");
    let (tx, mut rx) = mpsc::channel(1);
    Backup::new(&mut dst, "main", &src, "main")
        .expect("init")
        .run(&BackupOptions::new(1), Some(&tx))
        .expect("run completes with a full channel");
    // Only the first snapshot fit; the rest were dropped.
    assert_eq!(drain(&mut rx).len(), 1);
}

#[test]
fn test_backup_closed_sink_does_not_stop_copy() {
    let src = Connection::open_in_memory().expect("open src");
    fill(&src, 50);
    let mut dst = Connection::open_in_memory().expect("open dst");
    let (tx, rx) = mpsc::channel(4);
    drop(rx);
    Backup::new(&mut dst, "main", &src, "main")
        .expect("init")
        .run(&BackupOptions::new(2), Some(&tx))
        .expect("run");
    let count = dst
        .query_row("SELECT count(*) FROM test", &[], |s| Ok(s.column_i64(0)))
        .expect("count");
    assert_eq!(count, 50);
}

#[test]
fn test_backup_stop_signal() {
    let src = Connection::open_in_memory().expect("open src");
    fill(&src, 10);
    let mut dst = Connection::open_in_memory().expect("open dst");
    let stop = StopSignal::new();
    stop.stop();
    let err = Backup::new(&mut dst, "main", &src, "main")
        .expect("init")
        .run_until(&BackupOptions::new(1), None, &stop)
        .expect_err("stopped");
    assert!(matches!(err, DbError::Stopped { .. }), "{err:?}");
}

#[test_case::test_case(Duration::ZERO ; "no step delay")]
#[test_case::test_case(Duration::from_millis(20) ; "with step delay")]
fn test_backup_retries_locked_source(step_delay: Duration) {
    let dir = tempfile::tempdir().expect("tempdir");
    let src_path = dir.path().join("src.db");
    let src = Connection::open(&src_path, false).expect("open src");
    fill(&src, 100);
    let locker = Connection::open(&src_path, false).expect("open locker");
    locker
        .execute_batch("BEGIN EXCLUSIVE; INSERT INTO test (int_num) VALUES (100);")
        .expect("lock source");

    let logger = Arc::new(CaptureLogger::default());
    let mut dst = OpenOptions::new()
        .logger(logger.clone())
        .open(dir.path().join("dst.db"))
        .expect("open dst");

    let release = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(200));
        locker.execute_batch("COMMIT").expect("release lock");
        locker
    });
    Backup::new(&mut dst, "main", &src, "main")
        .expect("init")
        .run(&BackupOptions::new(4).step_delay(step_delay), None)
        .expect("backup completes once the lock is gone");
    release.join().expect("locker thread");

    assert!(logger.contains(LogLevel::Debug, "busy"));
    let count = dst
        .query_row("SELECT count(*) FROM test", &[], |s| Ok(s.column_i64(0)))
        .expect("count");
    assert_eq!(count, 101);
}

#[test]
fn test_backup_unknown_schema() {
    let src = Connection::open_in_memory().expect("open src");
    let mut dst = Connection::open_in_memory().expect("open dst");
    let err = Backup::new(&mut dst, "main", &src, "bim").expect_err("unknown schema");
    assert!(matches!(err, DbError::Engine { .. }), "{err:?}");
}

#[test]
fn test_backup_manual_steps() {
    let src = Connection::open_in_memory().expect("open src");
    fill(&src, 200);
    let mut dst = Connection::open_in_memory().expect("open dst");
    let mut backup = Backup::new(&mut dst, "main", &src, "main").expect("init");
    assert!(!backup.step(1).expect("first page"));
    let status = backup.status();
    assert_eq!(status.remaining, status.page_count - 1);
    assert!(backup.step(-1).expect("rest"));
    backup.finish().expect("finish");
}

#[test]
fn test_backup_spawned_on_thread() {
    let dir = tempfile::tempdir().expect("tempdir");
    let src = Connection::open(&dir.path().join("src.db"), false).expect("open src");
    fill(&src, 300);
    let dst = Connection::open(&dir.path().join("dst.db"), false).expect("open dst");
    let (tx, mut rx) = mpsc::channel(8);

    let handle = backup::spawn(dst, "main", src, "main", BackupOptions::new(3), Some(tx));
    let mut received = 0;
    while let Some(status) = rx.blocking_recv() {
        assert!(status.remaining <= status.page_count);
        received += 1;
    }
    let outcome = handle.join().expect("backup thread");
    outcome.result.expect("backup result");
    assert!(received > 0);
    let count = outcome
        .destination
        .query_row("SELECT count(*) FROM test", &[], |s| Ok(s.column_i64(0)))
        .expect("count");
    assert_eq!(count, 300);
    outcome.source.close().expect("close src");
}

// ── Introspection ───────────────────────────────────────────────────────

fn create_test_table(conn: &Connection) {
    conn.execute_batch(
        "CREATE TABLE test (id INTEGER PRIMARY KEY NOT NULL, float_num REAL, \
         int_num INTEGER, a_string TEXT);",
    )
    .expect("create table");
}

#[test]
fn test_databases() {
    let conn = Connection::open_in_memory().expect("open");
    let databases = conn.databases().expect("databases");
    assert_eq!(databases.len(), 1);
    assert!(databases.contains_key("main"));
}

#[test]
fn test_tables_and_views() {
    let conn = Connection::open_in_memory().expect("open");
    assert!(conn.tables(None, false).expect("tables").is_empty());
    create_test_table(&conn);
    assert_eq!(conn.tables(Some("main"), false).expect("tables"), vec!["test"]);
    assert!(conn.tables(None, true).expect("temp tables").is_empty());
    assert!(conn.tables(Some("bim"), false).is_err());

    conn.execute_batch("CREATE VIEW myview AS SELECT 1").expect("view");
    assert_eq!(conn.views(None, false).expect("views"), vec!["myview"]);
    assert!(conn.views(None, true).expect("temp views").is_empty());
    assert!(conn.views(Some("bim"), false).is_err());
}

#[test]
fn test_indexes() {
    let conn = Connection::open_in_memory().expect("open");
    create_test_table(&conn);
    conn.execute_batch("CREATE INDEX idx ON test(a_string)").expect("index");
    let indexes = conn.indexes(None, false).expect("indexes");
    assert_eq!(indexes.len(), 1);
    assert_eq!(indexes.get("idx").map(String::as_str), Some("test"));
    conn.indexes(None, true).expect("temp indexes");
    assert!(conn.indexes(Some("bim"), false).is_err());
}

#[test]
fn test_columns() {
    let conn = Connection::open_in_memory().expect("open");
    create_test_table(&conn);
    let columns = conn.columns(None, "test").expect("columns");
    assert_eq!(columns.len(), 4);
    assert_eq!(columns[2].name, "int_num");
    assert_eq!(columns[0].pk, 1);
    assert!(columns[0].not_null);
    assert!(conn.columns(Some("bim"), "test").is_err());
    assert!(matches!(
        conn.columns(None, "bim"),
        Err(DbError::NoSuchObject { kind: "table", .. })
    ));
}

#[test]
fn test_column_metadata() {
    let conn = Connection::open_in_memory().expect("open");
    create_test_table(&conn);
    let column = conn.column(None, "test", "id").expect("column");
    assert_eq!(column.name, "id");
    assert_eq!(column.data_type, "INTEGER");
    assert!(column.primary_key);
    assert!(!column.autoincrement);
    conn.column(Some("main"), "test", "id").expect("qualified");
    assert!(conn.column(None, "test", "bim").is_err());
}

#[test]
fn test_foreign_keys() {
    let conn = Connection::open_in_memory().expect("open");
    conn.execute_batch(
        "CREATE TABLE parent (id INTEGER PRIMARY KEY NOT NULL);
         CREATE TABLE child (id INTEGER PRIMARY KEY NOT NULL, parentId INTEGER,
             FOREIGN KEY (parentId) REFERENCES parent(id));",
    )
    .expect("create tables");
    let fks = conn.foreign_keys(None, "child").expect("fks");
    assert_eq!(fks.len(), 1);
    assert_eq!(fks[0].table, "parent");
    assert_eq!(fks[0].from, vec!["parentId"]);
    assert_eq!(fks[0].to, vec!["id"]);
    conn.foreign_keys(Some("main"), "child").expect("qualified");
    assert!(conn.foreign_keys(Some("bim"), "child").is_err());
    assert!(conn.foreign_keys(None, "bim").is_err());
}

#[test]
fn test_table_indexes_and_index_columns() {
    let conn = Connection::open_in_memory().expect("open");
    create_test_table(&conn);
    conn.execute_batch("CREATE INDEX test_index ON test(a_string)")
        .expect("index");
    let indexes = conn.table_indexes(None, "test").expect("indexes");
    assert_eq!(
        indexes,
        vec![meta::IndexInfo {
            name: "test_index".into(),
            unique: false
        }]
    );
    let columns = conn.index_columns(None, "test_index").expect("columns");
    assert_eq!(columns.len(), 1);
    assert_eq!(columns[0].name, "a_string");
    assert!(conn.table_indexes(Some("bim"), "test").is_err());
    assert!(conn.index_columns(Some("bim"), "test_index").is_err());
    assert!(matches!(
        conn.index_columns(None, "nope"),
        Err(DbError::NoSuchObject { kind: "index", .. })
    ));
}

#[test]
fn test_statement_column_metadata() {
    let conn = Connection::open_in_memory().expect("open");
    conn.execute_batch("CREATE TABLE doc (title varchar(20), body)")
        .expect("create");
    let stmt = conn
        .prepare("SELECT title AS heading, body FROM doc")
        .expect("prepare");
    assert_eq!(stmt.column_database_name(0).as_deref(), Some("main"));
    assert_eq!(stmt.column_table_name(0).as_deref(), Some("doc"));
    assert_eq!(stmt.column_origin_name(0).as_deref(), Some("title"));
    assert_eq!(stmt.column_decltype(0).as_deref(), Some("varchar(20)"));
    assert_eq!(stmt.column_affinity(0), Affinity::Textual);
    assert_eq!(stmt.column_decltype(1), None);
    assert_eq!(stmt.column_affinity(1), Affinity::None);
}

#[test]
fn test_statement_column_metadata_on_expression() {
    let conn = Connection::open_in_memory().expect("open");
    conn.execute_batch("CREATE VIEW vtest AS SELECT date('now') AS tic")
        .expect("view");
    let stmt = conn.prepare("SELECT tic FROM vtest").expect("prepare");
    assert_eq!(stmt.column_database_name(0), None);
    assert_eq!(stmt.column_table_name(0), None);
    assert_eq!(stmt.column_decltype(0), None);
    assert_eq!(stmt.column_affinity(0), Affinity::None);
}

#[test]
fn test_column_type_affinity() {
    let conn = Connection::open_in_memory().expect("open");
    conn.execute_batch("CREATE TABLE test (i INT, f REAL, n NUM, b BLOB, t TEXT, v);")
        .expect("create");
    let stmt = conn
        .prepare("SELECT i, f, n, b, t, v FROM test")
        .expect("prepare");
    let affinities: Vec<_> = (0..6).map(|i| stmt.column_affinity(i)).collect();
    assert_eq!(
        affinities,
        vec![
            Affinity::Integral,
            Affinity::Real,
            Affinity::Numerical,
            Affinity::None,
            Affinity::Textual,
            Affinity::None,
        ]
    );
}

#[test]
fn test_quote_identifier() {
    assert_eq!(meta::quote_identifier("a\"b"), "\"a\"\"b\"");
}
