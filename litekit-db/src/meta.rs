//! Schema introspection.
//!
//! Everything here is plain SQL over `sqlite_master` and the schema pragmas,
//! plus `sqlite3_table_column_metadata` for [`Connection::column`]. A `None`
//! schema means `main`. Unknown schemas surface the engine's "unknown
//! database" error; unknown tables and indexes surface
//! [`DbError::NoSuchObject`].

use std::collections::BTreeMap;

use super::connection::Connection;
use super::error::{DbError, DbResult};
use super::params;

/// Type affinity of a column, from its declared type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Affinity {
    /// `INTEGER` affinity.
    Integral,
    /// `REAL` affinity.
    Real,
    /// `NUMERIC` affinity.
    Numerical,
    /// `BLOB` affinity (no conversion), also used for expressions.
    None,
    /// `TEXT` affinity.
    Textual,
}

impl Affinity {
    /// Applies the engine's declared-type rules, in order: `INT`, then
    /// `CHAR`/`CLOB`/`TEXT`, then `BLOB` or empty, then
    /// `REAL`/`FLOA`/`DOUB`, otherwise numeric.
    #[must_use]
    pub fn from_declared_type(declared: &str) -> Self {
        let upper = declared.to_ascii_uppercase();
        let has = |needle: &str| upper.contains(needle);
        if has("INT") {
            Self::Integral
        } else if has("CHAR") || has("CLOB") || has("TEXT") {
            Self::Textual
        } else if upper.is_empty() || has("BLOB") {
            Self::None
        } else if has("REAL") || has("FLOA") || has("DOUB") {
            Self::Real
        } else {
            Self::Numerical
        }
    }
}

/// One row of `PRAGMA table_info`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    /// Column position, from zero.
    pub cid: i64,
    /// Column name.
    pub name: String,
    /// Declared type, possibly empty.
    pub data_type: String,
    /// `NOT NULL` constraint present.
    pub not_null: bool,
    /// Default value expression as written.
    pub default_value: Option<String>,
    /// Position in the primary key from 1, or 0 when not part of it.
    pub pk: i64,
}

/// Output of `sqlite3_table_column_metadata`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMetadata {
    /// Column name as requested.
    pub name: String,
    /// Declared type.
    pub data_type: String,
    /// Collation sequence name.
    pub collation: String,
    /// `NOT NULL` constraint present.
    pub not_null: bool,
    /// Part of the primary key.
    pub primary_key: bool,
    /// `AUTOINCREMENT` column.
    pub autoincrement: bool,
}

/// A foreign key constraint, grouped over its columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKey {
    /// Referenced table.
    pub table: String,
    /// Referencing columns.
    pub from: Vec<String>,
    /// Referenced columns; empty names mean the parent's primary key.
    pub to: Vec<String>,
}

/// One row of `PRAGMA index_list`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexInfo {
    /// Index name.
    pub name: String,
    /// `UNIQUE` index.
    pub unique: bool,
}

/// One row of `PRAGMA index_info`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexColumn {
    /// Rank within the index.
    pub seqno: i64,
    /// Table column position, `-1` for the rowid, `-2` for an expression.
    pub cid: i64,
    /// Column name, empty for expressions.
    pub name: String,
}

/// Double-quotes an identifier.
#[must_use]
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn schema_name(schema: Option<&str>) -> &str {
    match schema {
        Some(s) if !s.is_empty() => s,
        _ => "main",
    }
}

fn master_table(schema: Option<&str>, temp: bool) -> String {
    if temp {
        "sqlite_temp_master".to_string()
    } else {
        format!("{}.sqlite_master", quote_identifier(schema_name(schema)))
    }
}

impl Connection {
    /// Attached databases, by schema name, with their file names (empty for
    /// in-memory ones).
    ///
    /// # Errors
    ///
    /// Engine errors.
    pub fn databases(&self) -> DbResult<BTreeMap<String, String>> {
        let rows = self.query_map("PRAGMA database_list", &[], |row| {
            Ok((row.column_text(1), row.column_text(2)))
        })?;
        Ok(rows.into_iter().collect())
    }

    fn master_names(&self, kind: &str, schema: Option<&str>, temp: bool) -> DbResult<Vec<String>> {
        let sql = format!(
            "SELECT name FROM {} WHERE type = ?1 AND name NOT LIKE 'sqlite_%' ORDER BY name",
            master_table(schema, temp)
        );
        self.query_map(&sql, params![kind], |row| Ok(row.column_text(0)))
    }

    /// Table names in `schema`, or in the temp schema when `temp` is set.
    ///
    /// # Errors
    ///
    /// Engine error for an unknown schema.
    pub fn tables(&self, schema: Option<&str>, temp: bool) -> DbResult<Vec<String>> {
        self.master_names("table", schema, temp)
    }

    /// View names in `schema`, or in the temp schema when `temp` is set.
    ///
    /// # Errors
    ///
    /// Engine error for an unknown schema.
    pub fn views(&self, schema: Option<&str>, temp: bool) -> DbResult<Vec<String>> {
        self.master_names("view", schema, temp)
    }

    /// Explicit indexes, mapped to the table they index.
    ///
    /// # Errors
    ///
    /// Engine error for an unknown schema.
    pub fn indexes(&self, schema: Option<&str>, temp: bool) -> DbResult<BTreeMap<String, String>> {
        let sql = format!(
            "SELECT name, tbl_name FROM {} WHERE type = 'index' AND name NOT LIKE 'sqlite_%'",
            master_table(schema, temp)
        );
        let rows = self.query_map(&sql, &[], |row| Ok((row.column_text(0), row.column_text(1))))?;
        Ok(rows.into_iter().collect())
    }

    fn ensure_object(&self, kind: &'static str, schema: Option<&str>, name: &str) -> DbResult<()> {
        let schema = schema_name(schema);
        let types: &[&str] = if kind == "index" {
            &["index"]
        } else {
            &["table", "view"]
        };
        let sql = format!(
            "SELECT count(*) FROM {}.sqlite_master WHERE name = ?1 AND type IN (?2, ?3)",
            quote_identifier(schema)
        );
        let found = self.query_row(
            &sql,
            params![name, types[0], types[types.len() - 1]],
            |row| Ok(row.column_i64(0)),
        )?;
        if found == 0 {
            return Err(DbError::NoSuchObject {
                kind,
                name: format!("{schema}.{name}"),
            });
        }
        Ok(())
    }

    fn pragma_sql(pragma: &str, schema: Option<&str>, arg: &str) -> String {
        format!(
            "PRAGMA {}.{pragma}({})",
            quote_identifier(schema_name(schema)),
            quote_identifier(arg)
        )
    }

    /// Columns of a table or view.
    ///
    /// # Errors
    ///
    /// [`DbError::NoSuchObject`] if `table` does not exist; engine error for
    /// an unknown schema.
    pub fn columns(&self, schema: Option<&str>, table: &str) -> DbResult<Vec<ColumnInfo>> {
        let columns = self.query_map(
            &Self::pragma_sql("table_info", schema, table),
            &[],
            |row| {
                Ok(ColumnInfo {
                    cid: row.column_i64(0),
                    name: row.column_text(1),
                    data_type: row.column_text(2),
                    not_null: row.column_i64(3) != 0,
                    default_value: (!row.is_column_null(4)).then(|| row.column_text(4)),
                    pk: row.column_i64(5),
                })
            },
        )?;
        if columns.is_empty() {
            return Err(DbError::NoSuchObject {
                kind: "table",
                name: format!("{}.{table}", schema_name(schema)),
            });
        }
        Ok(columns)
    }

    /// Declared metadata of one table column.
    ///
    /// # Errors
    ///
    /// Engine error when the schema, table or column does not exist.
    pub fn column(&self, schema: Option<&str>, table: &str, column: &str) -> DbResult<ColumnMetadata> {
        let raw = self
            .raw()
            .table_column_metadata(schema.filter(|s| !s.is_empty()), table, column)?;
        Ok(ColumnMetadata {
            name: column.to_string(),
            data_type: raw.data_type,
            collation: raw.collation,
            not_null: raw.not_null,
            primary_key: raw.primary_key,
            autoincrement: raw.autoincrement,
        })
    }

    /// Foreign keys declared on `table`, one entry per constraint.
    ///
    /// # Errors
    ///
    /// [`DbError::NoSuchObject`] if `table` does not exist; engine error for
    /// an unknown schema.
    pub fn foreign_keys(&self, schema: Option<&str>, table: &str) -> DbResult<Vec<ForeignKey>> {
        self.ensure_object("table", schema, table)?;
        let rows = self.query_map(
            &Self::pragma_sql("foreign_key_list", schema, table),
            &[],
            |row| {
                Ok((
                    row.column_i64(0),
                    row.column_text(2),
                    row.column_text(3),
                    row.column_text(4),
                ))
            },
        )?;
        let mut grouped: BTreeMap<i64, ForeignKey> = BTreeMap::new();
        for (id, parent, from, to) in rows {
            let fk = grouped.entry(id).or_insert_with(|| ForeignKey {
                table: parent,
                from: Vec::new(),
                to: Vec::new(),
            });
            fk.from.push(from);
            fk.to.push(to);
        }
        Ok(grouped.into_values().collect())
    }

    /// Indexes on `table`, automatic ones included.
    ///
    /// # Errors
    ///
    /// [`DbError::NoSuchObject`] if `table` does not exist; engine error for
    /// an unknown schema.
    pub fn table_indexes(&self, schema: Option<&str>, table: &str) -> DbResult<Vec<IndexInfo>> {
        self.ensure_object("table", schema, table)?;
        self.query_map(&Self::pragma_sql("index_list", schema, table), &[], |row| {
            Ok(IndexInfo {
                name: row.column_text(1),
                unique: row.column_i64(2) != 0,
            })
        })
    }

    /// Key columns of `index`, in index order.
    ///
    /// # Errors
    ///
    /// [`DbError::NoSuchObject`] if `index` does not exist; engine error for
    /// an unknown schema.
    pub fn index_columns(&self, schema: Option<&str>, index: &str) -> DbResult<Vec<IndexColumn>> {
        self.ensure_object("index", schema, index)?;
        self.query_map(&Self::pragma_sql("index_info", schema, index), &[], |row| {
            Ok(IndexColumn {
                seqno: row.column_i64(0),
                cid: row.column_i64(1),
                name: row.column_text(2),
            })
        })
    }
}
