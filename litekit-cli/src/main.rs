//! litekit command-line interface.
//!
//! ```bash
//! # Run a statement, binding positional parameters
//! litekit query app.db "SELECT * FROM users WHERE id = ?1" --param 7
//!
//! # Print tables, views, columns and indexes
//! litekit schema app.db
//!
//! # Copy a live database, 64 pages at a time
//! litekit backup app.db copy.db --pages-per-step 64 --delay-ms 5
//!
//! # Shell completion candidates
//! litekit complete pragma fo
//! litekit complete column na --db app.db --table users
//! ```

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use eyre::{Result, WrapErr};
use litekit_db::backup::{self, BackupOptions};
use litekit_db::{Connection, OpenOptions, Value};
use litekit_driver::contract::{Conn, Driver, Rows, Stmt};
use litekit_driver::{DriverConfig, Next, SqliteDriver};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

mod completion;

use completion::CompletionCache;

/// Developer tool for SQLite databases.
#[derive(Parser, Debug)]
#[command(name = "litekit", version, about)]
struct Args {
    /// How long to wait on a locked database, in milliseconds
    #[arg(long, default_value_t = 500, env = "LITEKIT_BUSY_TIMEOUT_MS")]
    busy_timeout_ms: u64,

    /// Log database events (overridden by RUST_LOG)
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one SQL statement and print its rows
    Query {
        /// Database path or `file:` URI
        database: String,
        /// SQL text
        sql: String,
        /// Positional parameter, repeatable; integers and reals are bound as numbers
        #[arg(short, long = "param")]
        params: Vec<String>,
    },
    /// Describe the schema of a database
    Schema {
        /// Database path
        database: PathBuf,
    },
    /// Copy a database with the online backup API
    Backup {
        /// Source database path
        source: PathBuf,
        /// Destination database path
        destination: PathBuf,
        /// Pages per step; zero copies everything at once
        #[arg(long, default_value_t = 100)]
        pages_per_step: i32,
        /// Pause between steps, in milliseconds
        #[arg(long, default_value_t = 0)]
        delay_ms: u64,
    },
    /// List completion candidates
    Complete {
        /// What to complete
        #[arg(value_enum)]
        kind: CompletionKind,
        /// Prefix typed so far
        #[arg(default_value = "")]
        prefix: String,
        /// Database to read table and column names from
        #[arg(long)]
        db: Option<PathBuf>,
        /// Restrict column completion to one table
        #[arg(long)]
        table: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CompletionKind {
    Pragma,
    Func,
    Cmd,
    Table,
    Column,
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:?}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);
    let busy_timeout = Duration::from_millis(args.busy_timeout_ms);

    match args.command {
        Command::Query {
            database,
            sql,
            params,
        } => query(&database, &sql, &params, busy_timeout),
        Command::Schema { database } => schema(&open(&database, busy_timeout)?),
        Command::Backup {
            source,
            destination,
            pages_per_step,
            delay_ms,
        } => backup(
            open(&source, busy_timeout)?,
            open(&destination, busy_timeout)?,
            BackupOptions::new(pages_per_step).step_delay(Duration::from_millis(delay_ms)),
        ),
        Command::Complete {
            kind,
            prefix,
            db,
            table,
        } => {
            let conn = db.map(|path| open(&path, busy_timeout)).transpose()?;
            for candidate in complete(kind, &prefix, conn.as_ref(), table.as_deref())? {
                println!("{candidate}");
            }
            Ok(())
        }
    }
}

fn init_logging(verbose: bool) {
    let fallback = if verbose { "litekit=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn open(path: &Path, busy_timeout: Duration) -> Result<Connection> {
    OpenOptions::new()
        .busy_timeout(busy_timeout)
        .open(path)
        .wrap_err_with(|| format!("opening {}", path.display()))
}

fn parse_param(raw: &str) -> Value {
    if let Ok(v) = raw.parse::<i64>() {
        Value::Integer(v)
    } else if let Ok(v) = raw.parse::<f64>() {
        Value::Real(v)
    } else if raw.eq_ignore_ascii_case("null") {
        Value::Null
    } else {
        Value::Text(raw.to_string())
    }
}

fn render(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Integer(v) => v.to_string(),
        Value::Real(v) => v.to_string(),
        Value::Text(v) => v.clone(),
        Value::Blob(v) => format!("<{} bytes>", v.len()),
    }
}

fn query(dsn: &str, sql: &str, params: &[String], busy_timeout: Duration) -> Result<()> {
    let driver = SqliteDriver::new(DriverConfig::default().with_busy_timeout(busy_timeout));
    let conn = driver.open(dsn).wrap_err_with(|| format!("opening {dsn}"))?;
    let args: Vec<Value> = params.iter().map(|p| parse_param(p)).collect();
    let mut stmt = conn.prepare(sql)?;
    debug!(inputs = stmt.num_input(), "prepared statement");

    let mut rows = stmt.query(&args)?;
    let columns = rows.columns().to_vec();
    if !columns.is_empty() {
        println!("{}", columns.join("\t"));
    }
    let mut dest = vec![Value::Null; columns.len()];
    let mut count = 0_u64;
    while rows.next(&mut dest)? == Next::Row {
        let line: Vec<String> = dest.iter().map(render).collect();
        println!("{}", line.join("\t"));
        count += 1;
    }
    rows.close()?;
    drop(rows);
    stmt.close()?;
    info!(rows = count, "query finished");
    conn.close()?;
    Ok(())
}

fn schema(conn: &Connection) -> Result<()> {
    for (name, file) in conn.databases()? {
        println!("database {name} {file}");
    }
    for table in conn.tables(None, false)? {
        println!("table {table}");
        for column in conn.columns(None, &table)? {
            let pk = if column.pk > 0 { " PRIMARY KEY" } else { "" };
            let not_null = if column.not_null { " NOT NULL" } else { "" };
            println!("  {} {}{pk}{not_null}", column.name, column.data_type);
        }
        for fk in conn.foreign_keys(None, &table)? {
            println!(
                "  foreign key ({}) references {}({})",
                fk.from.join(", "),
                fk.table,
                fk.to.join(", ")
            );
        }
        for index in conn.table_indexes(None, &table)? {
            let columns: Vec<String> = conn
                .index_columns(None, &index.name)?
                .into_iter()
                .map(|c| c.name)
                .collect();
            let unique = if index.unique { "unique " } else { "" };
            println!("  {unique}index {} ({})", index.name, columns.join(", "));
        }
    }
    for view in conn.views(None, false)? {
        println!("view {view}");
    }
    Ok(())
}

fn backup(source: Connection, destination: Connection, options: BackupOptions) -> Result<()> {
    let (tx, mut rx) = tokio::sync::mpsc::channel(64);
    let handle = backup::spawn(destination, "main", source, "main", options, Some(tx));
    while let Some(status) = rx.blocking_recv() {
        let done = status.page_count.saturating_sub(status.remaining);
        println!("{done}/{} pages", status.page_count);
    }
    let outcome = handle
        .join()
        .map_err(|_| eyre::eyre!("backup thread panicked"))?;
    outcome.result.wrap_err("backup failed")?;
    outcome.destination.close()?;
    outcome.source.close()?;
    info!("backup complete");
    Ok(())
}

fn complete(
    kind: CompletionKind,
    prefix: &str,
    conn: Option<&Connection>,
    table: Option<&str>,
) -> Result<Vec<String>> {
    let cache = || -> Result<CompletionCache> {
        let conn =
            conn.ok_or_else(|| eyre::eyre!("--db is required for table and column completion"))?;
        let mut cache = CompletionCache::new();
        cache.update(conn)?;
        Ok(cache)
    };
    Ok(match kind {
        CompletionKind::Pragma => completion::complete_pragma(prefix),
        CompletionKind::Func => completion::complete_func(prefix),
        CompletionKind::Cmd => completion::complete_cmd(prefix),
        CompletionKind::Table => cache()?.complete_table(prefix),
        CompletionKind::Column => cache()?.complete_column(table, prefix),
    })
}
