//! Error types for the migration library.

use thiserror::Error;

use crate::target::TargetError;

/// Exit code for configuration errors (bad YAML/JSON, missing fields).
pub const EXIT_CONFIG_ERROR: u8 = 1;
/// Exit code when the Oracle connection cannot be established.
pub const EXIT_CONNECTION_ERROR: u8 = 2;
/// Exit code when the SQLite source cannot be read or extracted.
pub const EXIT_SOURCE_ERROR: u8 = 3;
/// Exit code for target errors that escaped the executor.
pub const EXIT_TARGET_ERROR: u8 = 4;
/// Exit code for file I/O errors.
pub const EXIT_IO_ERROR: u8 = 7;

/// Main error type for migration operations.
///
/// Only fatal conditions are represented here. Per-table and per-row
/// failures during execution are recovered inside the executor and surface
/// in the [`ExecutionReport`](crate::executor::ExecutionReport) instead.
#[derive(Error, Debug)]
pub enum MigrateError {
    /// Configuration error (invalid YAML/JSON, missing fields, bad DSN).
    #[error("Configuration error: {0}")]
    Config(String),

    /// Target connection could not be established.
    #[error("Cannot connect to Oracle at {dsn}: {message}")]
    Connection { dsn: String, message: String },

    /// SQLite source database error.
    #[error("Source database error: {0}")]
    Source(#[from] rusqlite::Error),

    /// Source extraction produced nothing usable.
    #[error("Extraction failed: {0}")]
    Extraction(String),

    /// Target database error outside of a recoverable phase.
    #[error("Target database error: {0}")]
    Target(#[from] TargetError),

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl MigrateError {
    /// Create a Connection error for the given DSN.
    pub fn connection(dsn: impl Into<String>, message: impl Into<String>) -> Self {
        MigrateError::Connection {
            dsn: dsn.into(),
            message: message.into(),
        }
    }

    /// Process exit code for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            MigrateError::Config(_) | MigrateError::Yaml(_) | MigrateError::Json(_) => {
                EXIT_CONFIG_ERROR
            }
            MigrateError::Connection { .. } => EXIT_CONNECTION_ERROR,
            MigrateError::Source(_) | MigrateError::Extraction(_) => EXIT_SOURCE_ERROR,
            MigrateError::Target(_) => EXIT_TARGET_ERROR,
            MigrateError::Io(_) => EXIT_IO_ERROR,
        }
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Result type alias for migration operations.
pub type Result<T> = std::result::Result<T, MigrateError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(MigrateError::Config("x".into()).exit_code(), EXIT_CONFIG_ERROR);
        assert_eq!(
            MigrateError::connection("localhost:1521/free", "refused").exit_code(),
            EXIT_CONNECTION_ERROR
        );
        assert_eq!(
            MigrateError::Extraction("no tables".into()).exit_code(),
            EXIT_SOURCE_ERROR
        );
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        assert_eq!(MigrateError::from(io).exit_code(), EXIT_IO_ERROR);
    }

    #[test]
    fn test_format_detailed_includes_message() {
        let err = MigrateError::connection("db:1521/xe", "ORA-12541: no listener");
        let detailed = err.format_detailed();
        assert!(detailed.starts_with("Error: Cannot connect to Oracle at db:1521/xe"));
        assert!(detailed.contains("ORA-12541"));
    }
}
