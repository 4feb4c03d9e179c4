//! Configuration type definitions.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

pub const DEFAULT_ORACLE_USER: &str = "system";
pub const DEFAULT_ORACLE_PASSWORD: &str = "YourPassword";
pub const DEFAULT_ORACLE_DSN: &str = "localhost:1521/free";

/// Root configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Oracle connection settings.
    #[serde(default)]
    pub oracle: OracleConfig,

    /// Migration behavior.
    #[serde(default)]
    pub migration: MigrationConfig,
}

/// Oracle connection settings.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OracleConfig {
    /// Username (default: "system").
    #[serde(default = "default_user")]
    pub user: String,

    /// Password.
    #[serde(default = "default_password")]
    pub password: String,

    /// Easy Connect string `host[:port]/service`, or a TNS alias.
    #[serde(default = "default_dsn")]
    pub dsn: String,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            user: default_user(),
            password: default_password(),
            dsn: default_dsn(),
        }
    }
}

impl fmt::Debug for OracleConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OracleConfig")
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("dsn", &self.dsn)
            .finish()
    }
}

/// Migration behavior configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MigrationConfig {
    /// Drop every existing table in the target schema before loading.
    #[serde(default)]
    pub drop_tables: bool,

    /// Emit and load only key columns, no rows.
    #[serde(default)]
    pub schema_only: bool,

    /// Map SQLite TEXT to CLOB instead of VARCHAR2(4000) in dumps.
    #[serde(default)]
    pub text_as_clob: bool,

    /// Where the converted script is written (default: next to the input).
    #[serde(default)]
    pub output_file: Option<PathBuf>,

    /// Restrict execution to these tables. Empty means every table.
    #[serde(default)]
    pub tables: Vec<String>,
}

/// Values supplied on the command line. `None` leaves the setting alone.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub user: Option<String>,
    pub password: Option<String>,
    pub dsn: Option<String>,
    pub drop_tables: Option<bool>,
    pub schema_only: Option<bool>,
    pub text_as_clob: Option<bool>,
    pub output_file: Option<PathBuf>,
    pub tables: Option<Vec<String>>,
}

/// Older flat `{user, password, dsn}` JSON files are still accepted.
#[derive(Deserialize)]
#[serde(untagged)]
pub(super) enum FileConfig {
    Nested(Config),
    Flat(OracleConfig),
}

impl From<FileConfig> for Config {
    fn from(file: FileConfig) -> Self {
        match file {
            FileConfig::Nested(config) => config,
            FileConfig::Flat(oracle) => Config {
                oracle,
                migration: MigrationConfig::default(),
            },
        }
    }
}

fn default_user() -> String {
    DEFAULT_ORACLE_USER.to_string()
}

fn default_password() -> String {
    DEFAULT_ORACLE_PASSWORD.to_string()
}

fn default_dsn() -> String {
    DEFAULT_ORACLE_DSN.to_string()
}
