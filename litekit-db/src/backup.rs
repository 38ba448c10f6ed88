//! Online backup: page-by-page copy of one schema into another connection.
//!
//! A [`Backup`] binds a destination `(connection, schema)` to a source
//! `(connection, schema)`. [`Backup::run`] steps it to completion, sleeping
//! between steps and retrying while the source is busy or locked. Each
//! successful step reports a [`BackupStatus`] snapshot.
//!
//! Progress goes to a bounded [`tokio::sync::mpsc`] channel through
//! `try_send`, so the copy loop never waits on its consumer:
//!
//! * channel full: the snapshot is dropped (the receiver keeps the older ones
//!   already queued) and the copy continues;
//! * channel closed: notifications stop and the copy continues.
//!
//! The receiver can be drained synchronously with `blocking_recv` or
//! `try_recv`, or awaited from an async task.

use std::os::raw::c_int;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::mpsc::Sender;

use super::connection::Connection;
use super::error::{DbError, DbErrorCode, DbResult};
use super::ffi::{self, RawBackup};
use super::logger::LogHandle;

/// Snapshot reported after every successful step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackupStatus {
    /// Pages still to be copied.
    pub remaining: u32,
    /// Pages in the source database.
    pub page_count: u32,
}

/// Tuning for [`Backup::run`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackupOptions {
    /// Pages copied per step. Zero or negative copies everything in one step.
    pub pages_per_step: i32,
    /// Pause between steps, and before retrying a busy source. A busy
    /// retry waits at least [`BUSY_BACKOFF`] even when this is zero.
    pub step_delay: Duration,
}

/// Shortest wait before retrying a step that found the source busy or
/// locked.
pub const BUSY_BACKOFF: Duration = Duration::from_millis(10);

impl BackupOptions {
    /// Copies `pages_per_step` pages per step without pausing.
    #[must_use]
    pub const fn new(pages_per_step: i32) -> Self {
        Self {
            pages_per_step,
            step_delay: Duration::ZERO,
        }
    }

    /// Sets the pause between steps.
    #[must_use]
    pub const fn step_delay(mut self, delay: Duration) -> Self {
        self.step_delay = delay;
        self
    }

    const fn engine_pages(&self) -> c_int {
        if self.pages_per_step <= 0 {
            -1
        } else {
            self.pages_per_step
        }
    }
}

impl Default for BackupOptions {
    fn default() -> Self {
        Self::new(-1)
    }
}

/// Cooperative cancellation flag, checked between backup steps.
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    /// A signal that has not been raised.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Asks the backup to stop before its next step.
    pub fn stop(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Whether [`stop`](Self::stop) has been called.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Forwards snapshots without ever blocking the copy loop.
struct ProgressSink<'a> {
    tx: Option<&'a Sender<BackupStatus>>,
    log: &'a LogHandle,
}

impl ProgressSink<'_> {
    fn notify(&mut self, status: BackupStatus) {
        let Some(tx) = self.tx else { return };
        match tx.try_send(status) {
            Ok(()) => {}
            Err(TrySendError::Full(dropped)) => {
                self.log.debug(|| format!("progress channel full; dropped {dropped:?}"));
            }
            Err(TrySendError::Closed(_)) => {
                self.log
                    .debug(|| "progress channel closed; no further notifications".to_string());
                self.tx = None;
            }
        }
    }
}

/// An in-progress backup between two connections.
///
/// The destination is borrowed mutably: it must not be used while the copy
/// runs. The engine handle is released when the backup is run, finished or
/// dropped.
pub struct Backup<'a> {
    raw: RawBackup<'a>,
    log: &'a LogHandle,
}

impl<'a> Backup<'a> {
    /// Binds `dst.dst_schema` to `src.src_schema`.
    ///
    /// # Errors
    ///
    /// The engine error recorded on the destination (unknown schema, same
    /// connection on both sides, destination in a read transaction, ...).
    pub fn new(
        dst: &'a mut Connection,
        dst_schema: &str,
        src: &'a Connection,
        src_schema: &str,
    ) -> DbResult<Self> {
        let dst: &'a Connection = dst;
        let raw = RawBackup::init(dst.raw(), dst_schema, src.raw(), src_schema)
            .inspect_err(|e| dst.log().debug(|| format!("{e}")))?;
        Ok(Self {
            raw,
            log: dst.log(),
        })
    }

    /// Current progress, as of the last step.
    #[must_use]
    pub fn status(&self) -> BackupStatus {
        BackupStatus {
            remaining: u32::try_from(self.raw.remaining()).unwrap_or(0),
            page_count: u32::try_from(self.raw.pagecount()).unwrap_or(0),
        }
    }

    /// Copies up to `pages` pages (`<= 0` copies everything). Returns
    /// `true` once the copy is complete.
    ///
    /// # Errors
    ///
    /// Any engine error, busy and locked included. The backup stays usable
    /// after a busy error.
    pub fn step(&mut self, pages: i32) -> DbResult<bool> {
        let pages = BackupOptions::new(pages).engine_pages();
        match self.raw.step(pages) {
            ffi::SQLITE_OK => Ok(false),
            ffi::SQLITE_DONE => Ok(true),
            rc => Err(self.raw.error(rc)),
        }
    }

    /// Runs the backup to completion.
    ///
    /// # Errors
    ///
    /// The first non-retryable engine error.
    pub fn run(
        self,
        options: &BackupOptions,
        progress: Option<&Sender<BackupStatus>>,
    ) -> DbResult<()> {
        self.run_inner(options, progress, None)
    }

    /// Like [`run`](Self::run), but checks `stop` before every step.
    ///
    /// # Errors
    ///
    /// [`DbError::Stopped`] when the signal was raised; otherwise as
    /// [`run`](Self::run).
    pub fn run_until(
        self,
        options: &BackupOptions,
        progress: Option<&Sender<BackupStatus>>,
        stop: &StopSignal,
    ) -> DbResult<()> {
        self.run_inner(options, progress, Some(stop))
    }

    fn run_inner(
        self,
        options: &BackupOptions,
        progress: Option<&Sender<BackupStatus>>,
        stop: Option<&StopSignal>,
    ) -> DbResult<()> {
        let pages = options.engine_pages();
        let mut sink = ProgressSink {
            tx: progress,
            log: self.log,
        };
        let outcome = loop {
            if stop.is_some_and(StopSignal::is_stopped) {
                let status = self.status();
                break Err(DbError::Stopped {
                    remaining: status.remaining,
                    page_count: status.page_count,
                });
            }
            let rc = self.raw.step(pages);
            match rc {
                ffi::SQLITE_OK | ffi::SQLITE_DONE => {
                    let status = self.status();
                    self.log.trace(|| {
                        format!(
                            "backup step: {} of {} pages remaining",
                            status.remaining, status.page_count
                        )
                    });
                    sink.notify(status);
                    if rc == ffi::SQLITE_DONE {
                        break Ok(());
                    }
                }
                rc if DbErrorCode(rc).is_busy() => {
                    self.log
                        .debug(|| format!("backup source busy ({rc}); retrying"));
                    thread::sleep(options.step_delay.max(BUSY_BACKOFF));
                    continue;
                }
                rc => break Err(self.raw.error(rc)),
            }
            if !options.step_delay.is_zero() {
                thread::sleep(options.step_delay);
            }
        };
        let log = self.log;
        let finished = self.raw.finish();
        if let Err(e) = &outcome {
            log.debug(|| format!("{e}"));
        }
        // A failed step is reported again by finish; keep the first error.
        outcome.and(finished)
    }

    /// Releases the backup handle without copying further.
    ///
    /// # Errors
    ///
    /// The error of the most recent failed step, if any.
    pub fn finish(self) -> DbResult<()> {
        self.raw.finish()
    }
}

impl std::fmt::Debug for Backup<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Backup")
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}

/// What a spawned backup hands back: both connections and the result.
#[derive(Debug)]
pub struct BackupOutcome {
    /// The destination connection.
    pub destination: Connection,
    /// The source connection.
    pub source: Connection,
    /// Result of the copy.
    pub result: DbResult<()>,
}

/// A backup running on its own thread. See [`spawn`].
#[derive(Debug)]
pub struct BackupHandle {
    thread: JoinHandle<BackupOutcome>,
    stop: StopSignal,
}

impl BackupHandle {
    /// Asks the backup to stop before its next step.
    pub fn stop(&self) {
        self.stop.stop();
    }

    /// `true` once the backup thread has exited.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Waits for the backup thread.
    ///
    /// # Errors
    ///
    /// The panic payload if the thread panicked.
    pub fn join(self) -> thread::Result<BackupOutcome> {
        self.thread.join()
    }
}

/// Runs a backup of `source.src_schema` into `destination.dst_schema` on a
/// dedicated thread.
///
/// Both connections move to the thread and come back through
/// [`BackupHandle::join`].
#[must_use]
pub fn spawn(
    destination: Connection,
    dst_schema: impl Into<String>,
    source: Connection,
    src_schema: impl Into<String>,
    options: BackupOptions,
    progress: Option<Sender<BackupStatus>>,
) -> BackupHandle {
    let dst_schema = dst_schema.into();
    let src_schema = src_schema.into();
    let stop = StopSignal::new();
    let thread_stop = stop.clone();
    let thread = thread::spawn(move || {
        let mut destination = destination;
        let result = Backup::new(&mut destination, &dst_schema, &source, &src_schema)
            .and_then(|backup| backup.run_until(&options, progress.as_ref(), &thread_stop));
        BackupOutcome {
            destination,
            source,
            result,
        }
    });
    BackupHandle { thread, stop }
}
