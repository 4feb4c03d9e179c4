//! Row-by-row extraction from a SQLite database file.
//!
//! Used when the input is a `.db` file instead of a dump. Schema comes from
//! `sqlite_master` and the `table_info`/`foreign_key_list` pragmas rather
//! than from re-parsing DDL text, and rows are read through `rusqlite` so
//! text in any encoding survives.

use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags};
use tracing::{debug, info, warn};

use crate::convert::{creation_order, ConversionStats, ConvertedScript};
use crate::core::identifier::{oracle_ident, truncate_ident};
use crate::core::{ColumnDefinition, ForeignKey, SqlValue, TableConstraint, TableDefinition};
use crate::dialect::create_table::{oracle_default, retain_key_columns};
use crate::dialect::tokenizer::{render, tokenize, TokenKind};
use crate::error::{MigrateError, Result};
use crate::typemap::{map_column_type, parse_flexible_date, sanitize_literal, TextMapping};

/// First 16 bytes of every SQLite 3 database file.
pub const SQLITE_MAGIC: &[u8; 16] = b"SQLite format 3\0";

/// Declared types whose text values are converted with `TO_DATE`.
const DATE_TYPES: &[&str] = &["DATE", "DATETIME", "TIMESTAMP"];

/// Whether `path` starts with the SQLite database header.
///
/// Returns `false` for missing, short or non-SQLite files.
pub fn is_sqlite_database(path: &Path) -> bool {
    let mut header = [0u8; 16];
    File::open(path)
        .and_then(|mut f| f.read_exact(&mut header))
        .map(|_| header == *SQLITE_MAGIC)
        .unwrap_or(false)
}

/// One row of `PRAGMA table_info`.
#[derive(Debug, Clone)]
struct ColumnInfo {
    name: String,
    declared_type: String,
    not_null: bool,
    default: Option<String>,
    /// 1-based position in the primary key, 0 when not part of it.
    pk_position: i64,
}

impl ColumnInfo {
    fn is_date(&self) -> bool {
        let upper = self.declared_type.trim().to_uppercase();
        DATE_TYPES.contains(&upper.as_str())
    }
}

/// Read-only handle on a SQLite database file.
pub struct SqliteSource {
    conn: Connection,
    path: PathBuf,
}

impl SqliteSource {
    /// Open `path` read-only.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        debug!("Opened SQLite database {}", path.display());
        Ok(Self {
            conn,
            path: path.to_path_buf(),
        })
    }

    /// User tables in `sqlite_master` order.
    pub fn table_names(&self) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT name FROM sqlite_master \
             WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY rowid",
        )?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(names)
    }

    /// Oracle definition of one table.
    ///
    /// An `INTEGER` single-column primary key becomes an identity column,
    /// since SQLite fills such a rowid alias on insert. The dump rewriter
    /// only does this for `AUTOINCREMENT`, so a plain `INTEGER PRIMARY KEY`
    /// read from a dump stays `NUMBER PRIMARY KEY`. TEXT maps to CLOB. Foreign keys get generated names
    /// `fk_<table>_<col>_<ref>_<refcol>`, truncated to Oracle's limit.
    pub fn extract_table(&self, name: &str) -> Result<TableDefinition> {
        let columns = self.column_info(name)?;
        if columns.is_empty() {
            return Err(MigrateError::Extraction(format!(
                "table {} has no columns",
                name
            )));
        }
        Ok(build_table(name, &columns, self.foreign_keys(name)?))
    }

    /// One sanitized INSERT per row of `table`.
    pub fn extract_rows(&self, table: &str) -> Result<Vec<String>> {
        let columns = self.column_info(table)?;
        let head = format!(
            "INSERT INTO {} ({})",
            oracle_ident(table),
            columns
                .iter()
                .map(|c| oracle_ident(&c.name))
                .collect::<Vec<_>>()
                .join(", ")
        );

        let mut stmt = self
            .conn
            .prepare(&format!("SELECT * FROM {}", sqlite_ident(table)))?;
        let mut rows = stmt.query([])?;
        let mut statements = Vec::new();

        while let Some(row) = rows.next()? {
            let mut values = Vec::with_capacity(columns.len());
            for (i, col) in columns.iter().enumerate() {
                values.push(render_value(row.get_ref(i)?, col));
            }
            statements.push(format!("{} VALUES ({});", head, values.join(", ")));
        }
        Ok(statements)
    }

    /// User-defined indexes as Oracle-quoted DDL. Partial indexes are skipped.
    pub fn extract_indexes(&self) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT name, sql FROM sqlite_master \
             WHERE type = 'index' AND sql IS NOT NULL ORDER BY rowid",
        )?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut indexes = Vec::new();
        for (name, sql) in rows {
            let tokens = tokenize(&sql);
            if tokens.iter().any(|t| t.is_word(&sql, "WHERE")) {
                warn!("Partial index {} has no Oracle equivalent, skipped", name);
                continue;
            }
            let kept: Vec<_> = tokens
                .into_iter()
                .filter(|t| t.kind != TokenKind::Semicolon)
                .collect();
            indexes.push(format!("{};", render(&sql, &kept)));
        }
        Ok(indexes)
    }

    /// Full Oracle script: tables in dependency order, indexes, then rows.
    ///
    /// With `only_key_columns` set, tables keep only key columns and no rows
    /// are read. A table whose rows cannot be read is logged and skipped.
    pub fn extract_script(&self, only_key_columns: bool) -> Result<ConvertedScript> {
        let names = self.table_names()?;
        if names.is_empty() {
            return Err(MigrateError::Extraction(format!(
                "no tables found in {}",
                self.path.display()
            )));
        }
        info!("Found {} tables in {}", names.len(), self.path.display());

        let mut tables = Vec::with_capacity(names.len());
        for name in &names {
            let mut table = self.extract_table(name)?;
            if only_key_columns {
                retain_key_columns(&mut table);
            }
            tables.push(table);
        }

        let keyed: Vec<(String, Vec<String>)> = tables
            .iter()
            .map(|t| (t.key(), t.referenced_tables.iter().cloned().collect()))
            .collect();
        let order = creation_order(&keyed);

        let mut stats = ConversionStats {
            tables: tables.len(),
            ..ConversionStats::default()
        };
        let mut statements: Vec<String> = order.iter().map(|&i| tables[i].to_sql()).collect();
        let table_order: Vec<String> = order.iter().map(|&i| tables[i].name.clone()).collect();

        let indexes = self.extract_indexes()?;
        stats.other_statements = indexes.len();
        statements.extend(indexes);

        if !only_key_columns {
            for name in &table_order {
                match self.extract_rows(name) {
                    Ok(rows) => {
                        debug!("Extracted {} rows from {}", rows.len(), name);
                        stats.inserts += rows.len();
                        statements.extend(rows);
                    }
                    Err(e) => warn!("Cannot read rows of {}: {}", name, e),
                }
            }
        }

        info!(
            "Extracted {} tables and {} rows from {}",
            stats.tables,
            stats.inserts,
            self.path.display()
        );
        Ok(ConvertedScript {
            statements,
            table_order,
            stats,
        })
    }

    fn column_info(&self, table: &str) -> Result<Vec<ColumnInfo>> {
        let mut stmt = self
            .conn
            .prepare(&format!("PRAGMA table_info({})", sqlite_ident(table)))?;
        let columns = stmt
            .query_map([], |row| {
                Ok(ColumnInfo {
                    name: row.get(1)?,
                    declared_type: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                    not_null: row.get::<_, i64>(3)? != 0,
                    default: row.get(4)?,
                    pk_position: row.get(5)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(columns)
    }

    fn foreign_keys(&self, table: &str) -> Result<Vec<ForeignKey>> {
        let mut stmt = self
            .conn
            .prepare(&format!("PRAGMA foreign_key_list({})", sqlite_ident(table)))?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, Option<String>>(4)?,
                    row.get::<_, String>(6)?,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        // Composite keys arrive as several rows sharing an id.
        let mut grouped: BTreeMap<i64, ForeignKey> = BTreeMap::new();
        for (id, ref_table, from, to, on_delete) in rows {
            let fk = grouped.entry(id).or_insert_with(|| ForeignKey {
                name: None,
                columns: Vec::new(),
                ref_table: ref_table.clone(),
                ref_columns: Vec::new(),
                on_delete: delete_action(&on_delete),
            });
            fk.columns.push(from);
            if let Some(to) = to {
                fk.ref_columns.push(to);
            }
        }

        Ok(grouped
            .into_values()
            .map(|mut fk| {
                fk.name = Some(truncate_ident(&format!(
                    "fk_{}_{}_{}_{}",
                    table,
                    fk.columns.first().map(String::as_str).unwrap_or_default(),
                    fk.ref_table,
                    fk.ref_columns.first().map(String::as_str).unwrap_or("id")
                )));
                fk
            })
            .collect())
    }
}

fn build_table(name: &str, columns: &[ColumnInfo], foreign_keys: Vec<ForeignKey>) -> TableDefinition {
    let mut pk: Vec<&ColumnInfo> = columns.iter().filter(|c| c.pk_position > 0).collect();
    pk.sort_by_key(|c| c.pk_position);
    let single_pk = pk.len() == 1;

    let column_defs = columns
        .iter()
        .map(|col| {
            let is_pk = single_pk && col.pk_position > 0;
            let is_identity = is_pk && col.declared_type.trim().eq_ignore_ascii_case("INTEGER");
            ColumnDefinition {
                name: col.name.clone(),
                raw_type: col.declared_type.clone(),
                oracle_type: map_column_type(&col.declared_type, TextMapping::Clob),
                default: if is_identity {
                    None
                } else {
                    col.default.as_deref().map(oracle_default)
                },
                extra: Vec::new(),
                not_null: col.not_null,
                is_primary_key: is_pk,
                is_identity,
                references: None,
            }
        })
        .collect();

    let mut constraints = Vec::new();
    if pk.len() > 1 {
        constraints.push(TableConstraint::PrimaryKey {
            name: None,
            columns: pk.iter().map(|c| c.name.clone()).collect(),
        });
    }
    let referenced_tables: BTreeSet<String> =
        foreign_keys.iter().map(ForeignKey::ref_key).collect();
    constraints.extend(foreign_keys.into_iter().map(TableConstraint::ForeignKey));

    TableDefinition {
        name: name.to_string(),
        columns: column_defs,
        constraints,
        referenced_tables,
    }
}

fn render_value(value: ValueRef<'_>, col: &ColumnInfo) -> String {
    match value {
        ValueRef::Null => "NULL".to_string(),
        ValueRef::Integer(v) => sanitize_literal(&SqlValue::Integer(v)),
        ValueRef::Real(v) => sanitize_literal(&SqlValue::Real(v)),
        ValueRef::Text(bytes) => {
            let text = String::from_utf8_lossy(bytes);
            if col.is_date() {
                parse_flexible_date(&text)
            } else {
                sanitize_literal(&SqlValue::Text(text))
            }
        }
        ValueRef::Blob(_) => "NULL".to_string(),
    }
}

/// Same delete-action policy as the DDL parser: only actions that differ
/// from Oracle's default are carried.
fn delete_action(action: &str) -> Option<String> {
    match action.trim().to_uppercase().as_str() {
        "CASCADE" => Some("CASCADE".to_string()),
        "SET NULL" => Some("SET NULL".to_string()),
        _ => None,
    }
}

fn sqlite_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shop.db");
        let conn = Connection::open(&path).unwrap();
        conn.execute_batch(
            "CREATE TABLE orders (
                 id INTEGER PRIMARY KEY,
                 customer_id INTEGER NOT NULL REFERENCES customers(id) ON DELETE CASCADE,
                 placed_at DATETIME,
                 note TEXT DEFAULT 'none',
                 receipt BLOB
             );
             CREATE TABLE customers (id INTEGER PRIMARY KEY, name TEXT NOT NULL);
             CREATE TABLE order_tags (order_id INTEGER, tag TEXT, PRIMARY KEY (order_id, tag));
             CREATE INDEX idx_orders_customer ON orders(customer_id);
             INSERT INTO customers VALUES (1, 'O''Neil');
             INSERT INTO orders VALUES (10, 1, '2024-03-01 12:30:00', 'rush; fragile', X'CAFE');
             INSERT INTO order_tags VALUES (10, 'gift');",
        )
        .unwrap();
        (dir, path)
    }

    #[test]
    fn test_detects_sqlite_header() {
        let (dir, path) = fixture();
        assert!(is_sqlite_database(&path));

        let dump = dir.path().join("dump.sql");
        std::fs::write(&dump, "CREATE TABLE t (a INT);").unwrap();
        assert!(!is_sqlite_database(&dump));
        assert!(!is_sqlite_database(&dir.path().join("missing.db")));
    }

    #[test]
    fn test_extract_table_definition() {
        let (_dir, path) = fixture();
        let source = SqliteSource::open(&path).unwrap();
        let orders = source.extract_table("orders").unwrap();

        assert!(orders.columns[0].is_identity);
        assert!(orders.columns[0].is_primary_key);
        assert_eq!(orders.columns[2].oracle_type, "DATE");
        assert_eq!(orders.columns[3].oracle_type, "CLOB");
        assert_eq!(orders.columns[3].default.as_deref(), Some("'none'"));

        let fks = orders.foreign_keys();
        assert_eq!(fks.len(), 1);
        assert_eq!(fks[0].name.as_deref(), Some("fk_orders_customer_id_customer"));
        assert_eq!(fks[0].on_delete.as_deref(), Some("CASCADE"));
        assert!(orders.referenced_tables.contains("customers"));
    }

    #[test]
    fn test_rowid_alias_is_identity_only_on_extraction() {
        let (_dir, path) = fixture();
        let source = SqliteSource::open(&path).unwrap();
        let extracted = source.extract_table("customers").unwrap();
        assert!(extracted.columns[0].is_identity);

        let ddl = "CREATE TABLE customers (id INTEGER PRIMARY KEY, name TEXT NOT NULL)";
        let crate::dialect::CreateTable::Parsed(from_dump) =
            crate::dialect::rewrite_create_table(ddl, TextMapping::Clob, false)
        else {
            panic!("dump DDL should parse");
        };
        assert!(!from_dump.columns[0].is_identity);
        assert!(from_dump.columns[0].is_primary_key);
    }

    #[test]
    fn test_composite_primary_key() {
        let (_dir, path) = fixture();
        let source = SqliteSource::open(&path).unwrap();
        let tags = source.extract_table("order_tags").unwrap();
        assert!(tags.columns.iter().all(|c| !c.is_primary_key && !c.is_identity));
        assert_eq!(
            tags.primary_key_columns(),
            vec!["order_id".to_string(), "tag".to_string()]
        );
    }

    #[test]
    fn test_extract_rows() {
        let (_dir, path) = fixture();
        let source = SqliteSource::open(&path).unwrap();
        let rows = source.extract_rows("orders").unwrap();
        assert_eq!(
            rows,
            vec![
                "INSERT INTO orders (id, customer_id, placed_at, note, receipt) VALUES \
                 (10, 1, TO_DATE('2024-03-01 12:30:00', 'YYYY-MM-DD HH24:MI:SS'), \
                 'rush\\; fragile', NULL);"
                    .to_string()
            ]
        );
        let customers = source.extract_rows("customers").unwrap();
        assert!(customers[0].ends_with("VALUES (1, 'O''Neil');"));
    }

    #[test]
    fn test_extract_script_orders_parents_first() {
        let (_dir, path) = fixture();
        let source = SqliteSource::open(&path).unwrap();
        let script = source.extract_script(false).unwrap();

        assert_eq!(script.table_order, vec!["customers", "orders", "order_tags"]);
        let text = script.render();
        assert!(text.find("CREATE TABLE customers").unwrap() < text.find("CREATE TABLE orders").unwrap());
        assert!(text.contains("CREATE INDEX idx_orders_customer ON orders(customer_id);"));
        assert!(text.find("INSERT INTO customers").unwrap() < text.find("INSERT INTO orders").unwrap());
        assert_eq!(script.stats.inserts, 3);
    }

    #[test]
    fn test_extract_script_schema_only() {
        let (_dir, path) = fixture();
        let script = SqliteSource::open(&path).unwrap().extract_script(true).unwrap();
        let text = script.render();
        assert!(!text.contains("INSERT"));
        assert!(!text.contains("placed_at"));
        assert!(text.contains("customer_id"));
    }

    #[test]
    fn test_empty_database_is_an_extraction_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.db");
        Connection::open(&path)
            .unwrap()
            .execute_batch("PRAGMA user_version = 1;")
            .unwrap();
        let source = SqliteSource::open(&path).unwrap();
        assert!(matches!(
            source.extract_script(false),
            Err(MigrateError::Extraction(_))
        ));
    }
}
