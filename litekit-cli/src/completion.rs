//! Completion candidates for an interactive shell.
//!
//! Keyword lists are static and sorted, so a prefix lookup is a binary
//! search followed by a scan. Entries that take an argument end with `(`.
//! Table and column names come from a [`CompletionCache`] snapshot of the
//! connected database.

use std::collections::BTreeMap;

use litekit_db::{Connection, DbResult};

const PRAGMAS: &[&str] = &[
    "application_id",
    "auto_vacuum",
    "automatic_index",
    "busy_timeout",
    "cache_size",
    "cache_spill",
    "case_sensitive_like",
    "cell_size_check",
    "checkpoint_fullfsync",
    "collation_list",
    "compile_options",
    "data_version",
    "database_list",
    "defer_foreign_keys",
    "encoding",
    "foreign_key_check",
    "foreign_key_list(",
    "foreign_keys",
    "freelist_count",
    "fullfsync",
    "function_list",
    "hard_heap_limit",
    "ignore_check_constraints",
    "incremental_vacuum",
    "index_info(",
    "index_list(",
    "index_xinfo(",
    "integrity_check",
    "journal_mode",
    "journal_size_limit",
    "legacy_alter_table",
    "locking_mode",
    "max_page_count",
    "mmap_size",
    "module_list",
    "optimize",
    "page_count",
    "page_size",
    "pragma_list",
    "query_only",
    "quick_check",
    "read_uncommitted",
    "recursive_triggers",
    "reverse_unordered_selects",
    "secure_delete",
    "shrink_memory",
    "soft_heap_limit",
    "synchronous",
    "table_info(",
    "table_list",
    "table_xinfo(",
    "temp_store",
    "threads",
    "trusted_schema",
    "user_version",
    "wal_autocheckpoint",
    "wal_checkpoint",
    "writable_schema",
];

const FUNCTIONS: &[&str] = &[
    "abs(",
    "avg(",
    "changes(",
    "char(",
    "coalesce(",
    "count(",
    "date(",
    "datetime(",
    "glob(",
    "group_concat(",
    "hex(",
    "ifnull(",
    "iif(",
    "instr(",
    "julianday(",
    "last_insert_rowid(",
    "length(",
    "like(",
    "likelihood(",
    "likely(",
    "lower(",
    "ltrim(",
    "max(",
    "min(",
    "nullif(",
    "printf(",
    "quote(",
    "random(",
    "randomblob(",
    "replace(",
    "round(",
    "rtrim(",
    "sqlite_compileoption_get(",
    "sqlite_compileoption_used(",
    "sqlite_source_id(",
    "sqlite_version(",
    "strftime(",
    "substr(",
    "sum(",
    "time(",
    "total(",
    "total_changes(",
    "trim(",
    "typeof(",
    "unicode(",
    "unlikely(",
    "upper(",
    "zeroblob(",
];

const COMMANDS: &[&str] = &[
    ".backup",
    ".bail",
    ".databases",
    ".dump",
    ".echo",
    ".exit",
    ".explain",
    ".headers",
    ".help",
    ".import",
    ".indices",
    ".load",
    ".mode",
    ".nullvalue",
    ".output",
    ".print",
    ".prompt",
    ".quit",
    ".read",
    ".restore",
    ".schema",
    ".separator",
    ".show",
    ".stats",
    ".tables",
    ".timeout",
    ".timer",
    ".width",
];

fn complete<S: AsRef<str>>(sorted: &[S], prefix: &str) -> Vec<String> {
    let start = sorted.partition_point(|name| name.as_ref() < prefix);
    let mut out = Vec::new();
    for name in &sorted[start..] {
        let name: &str = name.as_ref();
        if !name.starts_with(prefix) {
            break;
        }
        out.push(name.to_string());
    }
    out
}

/// Pragma names starting with `prefix`.
#[must_use]
pub fn complete_pragma(prefix: &str) -> Vec<String> {
    complete(PRAGMAS, prefix)
}

/// Built-in function names starting with `prefix`.
#[must_use]
pub fn complete_func(prefix: &str) -> Vec<String> {
    complete(FUNCTIONS, prefix)
}

/// Shell dot-commands starting with `prefix`.
#[must_use]
pub fn complete_cmd(prefix: &str) -> Vec<String> {
    complete(COMMANDS, prefix)
}

/// Snapshot of table, view and column names.
#[derive(Debug, Default)]
pub struct CompletionCache {
    tables: Vec<String>,
    columns: BTreeMap<String, Vec<String>>,
}

impl CompletionCache {
    /// An empty cache; call [`update`](Self::update) to fill it.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Re-reads names from `conn`, main and temp schemas.
    ///
    /// # Errors
    ///
    /// Engine errors from the schema queries; the cache is left unchanged.
    pub fn update(&mut self, conn: &Connection) -> DbResult<()> {
        let mut columns = BTreeMap::new();
        for (schema, temp) in [(None, false), (Some("temp"), true)] {
            let mut names = conn.tables(None, temp)?;
            names.extend(conn.views(None, temp)?);
            for name in names {
                let mut cols: Vec<String> = conn
                    .columns(schema, &name)?
                    .into_iter()
                    .map(|c| c.name)
                    .collect();
                cols.sort();
                columns.insert(name, cols);
            }
        }
        self.tables = columns.keys().cloned().collect();
        self.columns = columns;
        Ok(())
    }

    /// Table and view names starting with `prefix`.
    #[must_use]
    pub fn complete_table(&self, prefix: &str) -> Vec<String> {
        complete(&self.tables, prefix)
    }

    /// Column names starting with `prefix`, from `table` or from every
    /// cached table.
    #[must_use]
    pub fn complete_column(&self, table: Option<&str>, prefix: &str) -> Vec<String> {
        match table {
            Some(table) => self
                .columns
                .get(table)
                .map(|cols| complete(cols, prefix))
                .unwrap_or_default(),
            None => {
                let mut all: Vec<String> = self.columns.values().flatten().cloned().collect();
                all.sort();
                all.dedup();
                complete(&all, prefix)
            }
        }
    }
}
