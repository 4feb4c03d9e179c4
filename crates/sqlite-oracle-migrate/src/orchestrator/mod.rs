//! Migration orchestrator - main workflow coordinator.
//!
//! Ties the pieces together: load or extract the SQLite input, write the
//! Oracle script, connect, and hand the script to the staged executor.

use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::config::Config;
use crate::convert::{ConversionStats, ConvertOptions, ConvertedScript};
use crate::error::{MigrateError, Result};
use crate::events::EventSink;
use crate::executor::{ExecutionReport, ExecutorOptions, StagedExecutor};
use crate::source::load_script;
use crate::target::TargetConnection;
use crate::typemap::TextMapping;

#[cfg(feature = "oracle")]
use crate::target::oracle::OracleConnection;

const HEALTH_CHECK_SQL: &str = "SELECT 1 FROM DUAL";
const BANNER_SQL: &str = "SELECT banner FROM v$version";
const DB_NAME_SQL: &str = "SELECT SYS_CONTEXT('USERENV', 'DB_NAME') FROM DUAL";
const INSTANCE_SQL: &str = "SELECT SYS_CONTEXT('USERENV', 'INSTANCE_NAME') FROM DUAL";

/// Migration orchestrator.
pub struct Orchestrator {
    config: Config,
    events: EventSink,
}

/// Result of converting one input file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionResult {
    pub input: PathBuf,
    pub output: PathBuf,
    pub statements: usize,
    /// Tables in creation order.
    pub tables: Vec<String>,
    /// SHA-256 of the written script.
    pub checksum: String,
    pub stats: ConversionStats,
}

/// Result of a migration run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationResult {
    /// Unique run identifier.
    pub run_id: String,

    /// `completed`, or `completed_with_errors` when anything was skipped or failed.
    pub status: String,

    /// Total duration in seconds.
    pub duration_seconds: f64,

    /// When the migration started.
    pub started_at: DateTime<Utc>,

    /// When the migration completed.
    pub completed_at: DateTime<Utc>,

    /// Script that was applied.
    pub script: PathBuf,

    /// SHA-256 of the script text.
    pub script_checksum: String,

    /// Conversion outcome, when the run started from a SQLite input.
    pub conversion: Option<ConversionResult>,

    pub execution: ExecutionReport,
}

/// Target connectivity report.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HealthCheckResult {
    pub dsn: String,
    pub connected: bool,
    pub latency_ms: u64,
    pub banner: Option<String>,
    pub database: Option<String>,
    pub instance: Option<String>,
    pub error: Option<String>,
    pub healthy: bool,
}

impl Orchestrator {
    /// Create a new orchestrator.
    pub fn new(config: Config) -> Self {
        Self {
            config,
            events: EventSink::disabled(),
        }
    }

    /// Send executor progress to `events`.
    pub fn with_events(mut self, events: EventSink) -> Self {
        self.events = events;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Conversion options derived from the migration settings.
    pub fn convert_options(&self) -> ConvertOptions {
        ConvertOptions {
            text_mapping: if self.config.migration.text_as_clob {
                TextMapping::Clob
            } else {
                TextMapping::Varchar2
            },
            only_key_columns: self.config.migration.schema_only,
        }
    }

    /// Where the script for `input` is written: the configured file, or
    /// `<input stem>_oracle.sql` beside the input.
    pub fn output_path(&self, input: &Path) -> PathBuf {
        if let Some(path) = &self.config.migration.output_file {
            return path.clone();
        }
        let stem = input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "output".to_string());
        input.with_file_name(format!("{}_oracle.sql", stem))
    }

    /// Convert `input` and write the script.
    pub fn convert(&self, input: &Path) -> Result<ConversionResult> {
        let output = self.output_path(input);
        if output.as_path() == input {
            return Err(MigrateError::Config(format!(
                "output file {} would overwrite the input",
                output.display()
            )));
        }

        let script = load_script(input, &self.convert_options())?;
        script.write_to(&output)?;
        info!(
            "Converted {} tables ({} inserts) from {}",
            script.table_order.len(),
            script.stats.inserts,
            input.display()
        );
        Ok(conversion_result(input, output, &script))
    }

    /// Apply an existing script to the configured Oracle schema.
    #[cfg(feature = "oracle")]
    pub async fn execute(&self, script_path: &Path) -> Result<MigrationResult> {
        let script = read_script(script_path)?;
        let conn = OracleConnection::connect(&self.config.oracle).await?;
        let result = self.execute_with(&conn, script_path, &script).await;
        if let Err(e) = conn.close().await {
            tracing::warn!("Error closing Oracle connection: {}", e);
        }
        Ok(result)
    }

    #[cfg(not(feature = "oracle"))]
    pub async fn execute(&self, _script_path: &Path) -> Result<MigrationResult> {
        Err(no_driver())
    }

    /// Apply `script` through an already open connection.
    pub async fn execute_with(
        &self,
        conn: &dyn TargetConnection,
        script_path: &Path,
        script: &str,
    ) -> MigrationResult {
        let started_at = Utc::now();
        let run_id = uuid::Uuid::new_v4().to_string();
        info!("Starting run {} with {}", run_id, script_path.display());

        let options = ExecutorOptions {
            drop_tables: self.config.migration.drop_tables,
            tables: self.config.migration.tables.clone(),
        };
        let execution = StagedExecutor::new(conn, options, &self.events)
            .run(script)
            .await;

        let completed_at = Utc::now();
        let status = if execution.is_clean() {
            "completed"
        } else {
            "completed_with_errors"
        };
        info!("Run {} {}", run_id, status);

        MigrationResult {
            run_id,
            status: status.to_string(),
            duration_seconds: (completed_at - started_at).num_milliseconds() as f64 / 1000.0,
            started_at,
            completed_at,
            script: script_path.to_path_buf(),
            script_checksum: format!("{:x}", Sha256::digest(script.as_bytes())),
            conversion: None,
            execution,
        }
    }

    /// Convert `input`, write the script, then apply it.
    pub async fn run(&self, input: &Path) -> Result<MigrationResult> {
        let conversion = self.convert(input)?;
        let mut result = self.execute(&conversion.output).await?;
        result.conversion = Some(conversion);
        Ok(result)
    }

    /// Connect and report server details.
    pub async fn health_check(&self) -> HealthCheckResult {
        let started = Instant::now();

        #[cfg(feature = "oracle")]
        let result = match OracleConnection::connect(&self.config.oracle).await {
            Ok(conn) => {
                let result = check_target(&conn, started).await;
                if let Err(e) = conn.close().await {
                    debug!("Error closing health check connection: {}", e);
                }
                result
            }
            Err(e) => HealthCheckResult {
                latency_ms: started.elapsed().as_millis() as u64,
                error: Some(e.to_string()),
                ..Default::default()
            },
        };

        #[cfg(not(feature = "oracle"))]
        let result = HealthCheckResult {
            latency_ms: started.elapsed().as_millis() as u64,
            error: Some(no_driver().to_string()),
            ..Default::default()
        };

        HealthCheckResult {
            dsn: self.config.oracle.dsn.clone(),
            ..result
        }
    }
}

/// Check an open connection. Server details are best-effort; only the
/// `DUAL` query decides health.
pub async fn check_target(conn: &dyn TargetConnection, started: Instant) -> HealthCheckResult {
    let mut result = HealthCheckResult {
        connected: true,
        ..Default::default()
    };

    match conn.query_strings(HEALTH_CHECK_SQL).await {
        Ok(_) => result.healthy = true,
        Err(e) => result.error = Some(e.to_string()),
    }
    result.latency_ms = started.elapsed().as_millis() as u64;

    if result.healthy {
        result.banner = first_value(conn, BANNER_SQL).await;
        result.database = first_value(conn, DB_NAME_SQL).await;
        result.instance = first_value(conn, INSTANCE_SQL).await;
    }
    result
}

async fn first_value(conn: &dyn TargetConnection, sql: &str) -> Option<String> {
    match conn.query_strings(sql).await {
        Ok(rows) => rows.into_iter().next()?.into_iter().next(),
        Err(e) => {
            debug!("{} failed: {}", sql, e);
            None
        }
    }
}

/// Read a script file as UTF-8 (invalid bytes are replaced).
pub fn read_script(path: &Path) -> Result<String> {
    if !path.exists() {
        return Err(MigrateError::Config(format!(
            "script file not found: {}",
            path.display()
        )));
    }
    let bytes = std::fs::read(path)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

fn conversion_result(input: &Path, output: PathBuf, script: &ConvertedScript) -> ConversionResult {
    ConversionResult {
        input: input.to_path_buf(),
        output,
        statements: script.statements.len(),
        tables: script.table_order.clone(),
        checksum: script.checksum(),
        stats: script.stats.clone(),
    }
}

#[cfg(not(feature = "oracle"))]
fn no_driver() -> MigrateError {
    MigrateError::Config("built without Oracle support (enable the `oracle` feature)".to_string())
}

impl MigrationResult {
    /// Convert to JSON string.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MigrationConfig;
    use crate::target::testing::FakeConnection;

    const DUMP: &str = "PRAGMA foreign_keys=OFF;
BEGIN TRANSACTION;
CREATE TABLE child (id INTEGER PRIMARY KEY, parent_id INTEGER REFERENCES parent(id));
INSERT INTO child VALUES(1,1);
CREATE TABLE parent (id INTEGER PRIMARY KEY, name TEXT);
INSERT INTO parent VALUES(1,'root');
COMMIT;
";

    fn orchestrator(migration: MigrationConfig) -> Orchestrator {
        Orchestrator::new(Config {
            migration,
            ..Config::default()
        })
    }

    #[test]
    fn test_default_output_path() {
        let orch = orchestrator(MigrationConfig::default());
        assert_eq!(
            orch.output_path(Path::new("/data/shop.sqlite")),
            PathBuf::from("/data/shop_oracle.sql")
        );
        assert_eq!(
            orch.output_path(Path::new("dump.sql")),
            PathBuf::from("dump_oracle.sql")
        );
    }

    #[test]
    fn test_configured_output_path() {
        let orch = orchestrator(MigrationConfig {
            output_file: Some(PathBuf::from("/tmp/out.sql")),
            ..Default::default()
        });
        assert_eq!(orch.output_path(Path::new("a.sql")), PathBuf::from("/tmp/out.sql"));
    }

    #[test]
    fn test_convert_writes_script() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("shop.sql");
        std::fs::write(&input, DUMP).unwrap();

        let result = orchestrator(MigrationConfig::default()).convert(&input).unwrap();
        assert_eq!(result.output, dir.path().join("shop_oracle.sql"));
        assert_eq!(result.tables, vec!["parent", "child"]);

        let written = std::fs::read_to_string(&result.output).unwrap();
        assert!(!written.contains("PRAGMA"));
        assert!(written.find("CREATE TABLE parent").unwrap() < written.find("CREATE TABLE child").unwrap());
        assert_eq!(result.checksum, format!("{:x}", Sha256::digest(written.as_bytes())));
    }

    #[test]
    fn test_convert_refuses_to_overwrite_input() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("shop.sql");
        std::fs::write(&input, DUMP).unwrap();

        let orch = orchestrator(MigrationConfig {
            output_file: Some(input.clone()),
            ..Default::default()
        });
        assert!(matches!(orch.convert(&input), Err(MigrateError::Config(_))));
        assert_eq!(std::fs::read_to_string(&input).unwrap(), DUMP);
    }

    #[test]
    fn test_convert_options_follow_config() {
        let orch = orchestrator(MigrationConfig {
            schema_only: true,
            text_as_clob: true,
            ..Default::default()
        });
        let options = orch.convert_options();
        assert!(options.only_key_columns);
        assert_eq!(options.text_mapping, TextMapping::Clob);
    }

    #[tokio::test]
    async fn test_execute_with_fake_target() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("shop.sql");
        std::fs::write(&input, DUMP).unwrap();

        let orch = orchestrator(MigrationConfig::default());
        let conversion = orch.convert(&input).unwrap();
        let script = read_script(&conversion.output).unwrap();

        let conn = FakeConnection::new();
        let result = orch.execute_with(&conn, &conversion.output, &script).await;

        assert_eq!(result.status, "completed");
        assert_eq!(result.script_checksum, conversion.checksum);
        assert_eq!(result.execution.tables_created, vec!["parent", "child"]);
        assert_eq!(result.execution.inserts_succeeded, 2);
        assert!(result.to_json().unwrap().contains("\"run_id\""));
    }

    #[tokio::test]
    async fn test_execute_with_reports_errors() {
        let conn = FakeConnection::new().fail_on("INSERT", 1438);
        let orch = orchestrator(MigrationConfig::default());
        let result = orch
            .execute_with(
                &conn,
                Path::new("inline.sql"),
                "CREATE TABLE t (id NUMBER);\n\nINSERT INTO t (id) VALUES (123456);",
            )
            .await;
        assert_eq!(result.status, "completed_with_errors");
        assert_eq!(result.execution.inserts_failed, 1);
    }

    #[tokio::test]
    async fn test_execute_with_table_filter() {
        let conn = FakeConnection::new().with_tables(&["parent"]);
        let orch = orchestrator(MigrationConfig {
            tables: vec!["child".to_string()],
            ..Default::default()
        });
        let result = orch
            .execute_with(
                &conn,
                Path::new("inline.sql"),
                "CREATE TABLE parent (id NUMBER PRIMARY KEY);\n\n\
                 CREATE TABLE child (id NUMBER, parent_id NUMBER REFERENCES parent (id));\n\n\
                 INSERT INTO parent (id) VALUES (5);\n\n\
                 INSERT INTO child (id, parent_id) VALUES (1, 5);",
            )
            .await;

        assert_eq!(result.status, "completed");
        assert_eq!(result.execution.tables_created, vec!["child"]);
        assert!(conn.executed_matching("INSERT INTO parent").is_empty());
        assert_eq!(result.execution.inserts_succeeded, 1);
    }

    #[test]
    fn test_read_missing_script() {
        assert!(matches!(
            read_script(Path::new("/nonexistent/script.sql")),
            Err(MigrateError::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_check_target_healthy() {
        let conn = FakeConnection::new().with_tables(&["Oracle Database 23ai Free"]);
        let result = check_target(&conn, Instant::now()).await;
        assert!(result.connected);
        assert!(result.healthy);
        assert_eq!(result.banner.as_deref(), Some("ORACLE DATABASE 23AI FREE"));
        assert!(result.error.is_none());
    }

    #[tokio::test]
    async fn test_check_target_query_failure() {
        let conn = FakeConnection::new().with_inventory_error("ORA-01031: insufficient privileges");
        let result = check_target(&conn, Instant::now()).await;
        assert!(result.connected);
        assert!(!result.healthy);
        assert!(result.banner.is_none());
        assert!(result.error.unwrap().contains("ORA-01031"));
    }
}
