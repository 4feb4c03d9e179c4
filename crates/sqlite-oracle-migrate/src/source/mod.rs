//! Migration input: a SQLite dump file or a SQLite database file.

pub mod sqlite;

pub use sqlite::{is_sqlite_database, SqliteSource};

use std::path::Path;

use tracing::info;

use crate::convert::{convert_dump, ConvertOptions, ConvertedScript};
use crate::error::{MigrateError, Result};

/// Kind of input file, decided by its header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    /// Text produced by `sqlite3 .dump` or similar.
    Dump,
    /// A SQLite 3 database file.
    Database,
}

impl InputKind {
    pub fn detect(path: &Path) -> Self {
        if is_sqlite_database(path) {
            InputKind::Database
        } else {
            InputKind::Dump
        }
    }
}

/// Produce the Oracle script for `path`, whichever kind of input it is.
///
/// Database files are extracted row by row (TEXT always maps to CLOB on
/// that path); dumps go through the text converter.
pub fn load_script(path: &Path, options: &ConvertOptions) -> Result<ConvertedScript> {
    if !path.exists() {
        return Err(MigrateError::Config(format!(
            "input file not found: {}",
            path.display()
        )));
    }

    match InputKind::detect(path) {
        InputKind::Database => {
            info!("Reading SQLite database {}", path.display());
            SqliteSource::open(path)?.extract_script(options.only_key_columns)
        }
        InputKind::Dump => {
            info!("Reading SQLite dump {}", path.display());
            let bytes = std::fs::read(path)?;
            let text = String::from_utf8_lossy(&bytes);
            let script = convert_dump(&text, options);
            if script.statements.is_empty() {
                return Err(MigrateError::Extraction(format!(
                    "no convertible statements in {}",
                    path.display()
                )));
            }
            Ok(script)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_dump() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dump.sql");
        std::fs::write(&path, "PRAGMA foreign_keys=OFF;\nCREATE TABLE t (a INTEGER);\n").unwrap();

        assert_eq!(InputKind::detect(&path), InputKind::Dump);
        let script = load_script(&path, &ConvertOptions::default()).unwrap();
        assert_eq!(script.statements, vec!["CREATE TABLE t (\n  a NUMBER\n);".to_string()]);
    }

    #[test]
    fn test_load_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.db");
        rusqlite::Connection::open(&path)
            .unwrap()
            .execute_batch("CREATE TABLE t (a INTEGER); INSERT INTO t VALUES (7);")
            .unwrap();

        assert_eq!(InputKind::detect(&path), InputKind::Database);
        let script = load_script(&path, &ConvertOptions::default()).unwrap();
        assert_eq!(script.statements.len(), 2);
        assert_eq!(script.statements[1], "INSERT INTO t (a) VALUES (7);");
    }

    #[test]
    fn test_missing_and_empty_inputs() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            load_script(&dir.path().join("nope.sql"), &ConvertOptions::default()),
            Err(MigrateError::Config(_))
        ));

        let empty = dir.path().join("empty.sql");
        std::fs::write(&empty, "BEGIN TRANSACTION;\nCOMMIT;\n").unwrap();
        assert!(matches!(
            load_script(&empty, &ConvertOptions::default()),
            Err(MigrateError::Extraction(_))
        ));
    }
}
