//! sqlite-oracle-migrate CLI - SQLite to Oracle migration.

use clap::{Args, Parser, Subcommand};
use sqlite_oracle_migrate::{
    Config, ConfigOverrides, ConversionResult, EventSink, ExecutionReport, MigrateError,
    MigrationResult, Orchestrator,
};
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::task::JoinHandle;
use tracing::{info, Level};
use tracing_subscriber::fmt::format::FmtSpan;

#[derive(Parser)]
#[command(name = "sqlite-oracle-migrate")]
#[command(about = "Convert SQLite dumps and databases to Oracle and load them")]
#[command(version)]
struct Cli {
    /// Path to YAML (or .json) configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Environment file to load before reading ORACLE_* variables [default: ./.env if present]
    #[arg(long)]
    env_file: Option<PathBuf>,

    /// Output JSON result to stdout
    #[arg(long)]
    output_json: bool,

    /// Log format: text or json
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "info")]
    verbosity: String,

    /// Print progress updates as JSON lines to stderr
    #[arg(long)]
    progress: bool,

    #[command(flatten)]
    oracle: OracleArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct OracleArgs {
    /// Oracle user (overrides ORACLE_ADMIN_USER and the config file)
    #[arg(long, global = true)]
    oracle_user: Option<String>,

    /// Oracle password (overrides ORACLE_ADMIN_PASSWORD and the config file)
    #[arg(long, global = true)]
    oracle_password: Option<String>,

    /// Oracle DSN, e.g. localhost:1521/FREEPDB1 (overrides ORACLE_ADMIN_DSN)
    #[arg(long, global = true)]
    oracle_dsn: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a SQLite dump or database file to an Oracle script
    Convert {
        /// SQLite dump (.sql) or database file
        input: PathBuf,

        /// Output script [default: <input>_oracle.sql]
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Keep only key columns and emit no rows
        #[arg(long)]
        schema_only: bool,

        /// Map TEXT columns to CLOB instead of VARCHAR2(4000)
        #[arg(long)]
        text_as_clob: bool,
    },

    /// Apply an Oracle script to the target schema
    Execute {
        /// Oracle script produced by `convert`
        script: PathBuf,

        /// Drop every existing table in the schema first
        #[arg(long)]
        drop_tables: bool,

        /// Only create and load this table (repeatable); with --drop-tables
        /// only the named tables are dropped
        #[arg(long = "table", value_name = "TABLE")]
        tables: Vec<String>,
    },

    /// Convert, write the script, then apply it
    Run {
        /// SQLite dump (.sql) or database file
        input: PathBuf,

        /// Output script [default: <input>_oracle.sql]
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Drop every existing table in the schema first
        #[arg(long)]
        drop_tables: bool,

        /// Keep only key columns and emit no rows
        #[arg(long)]
        schema_only: bool,

        /// Only create and load this table (repeatable)
        #[arg(long = "table", value_name = "TABLE")]
        tables: Vec<String>,
    },

    /// Test the Oracle connection
    HealthCheck,
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> Result<(), MigrateError> {
    let cli = Cli::parse();

    setup_logging(&cli.verbosity, &cli.log_format)
        .map_err(|e| MigrateError::Config(e.to_string()))?;

    let mut overrides = ConfigOverrides {
        user: cli.oracle.oracle_user.clone(),
        password: cli.oracle.oracle_password.clone(),
        dsn: cli.oracle.oracle_dsn.clone(),
        ..ConfigOverrides::default()
    };
    match &cli.command {
        Commands::Convert {
            output,
            schema_only,
            text_as_clob,
            ..
        } => {
            overrides.output_file = output.clone();
            overrides.schema_only = schema_only.then_some(true);
            overrides.text_as_clob = text_as_clob.then_some(true);
        }
        Commands::Execute {
            drop_tables,
            tables,
            ..
        } => {
            overrides.drop_tables = drop_tables.then_some(true);
            overrides.tables = (!tables.is_empty()).then(|| tables.clone());
        }
        Commands::Run {
            output,
            drop_tables,
            schema_only,
            tables,
            ..
        } => {
            overrides.output_file = output.clone();
            overrides.drop_tables = drop_tables.then_some(true);
            overrides.schema_only = schema_only.then_some(true);
            overrides.tables = (!tables.is_empty()).then(|| tables.clone());
        }
        Commands::HealthCheck => {}
    }

    let config = Config::resolve(cli.config.as_deref(), cli.env_file.as_deref(), &overrides)?;
    if let Some(path) = &cli.config {
        info!("Loaded configuration from {:?}", path);
    }

    match cli.command {
        Commands::Convert { input, .. } => {
            let result = Orchestrator::new(config).convert(&input)?;
            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                print_conversion(&result);
            }
        }

        Commands::Execute { script, .. } => {
            let (orchestrator, printer) = with_progress(Orchestrator::new(config), cli.progress);
            let result = orchestrator.execute(&script).await;
            drop(orchestrator);
            finish_progress(printer).await;
            print_result(&result?, cli.output_json)?;
        }

        Commands::Run { input, .. } => {
            let (orchestrator, printer) = with_progress(Orchestrator::new(config), cli.progress);
            let result = orchestrator.run(&input).await;
            drop(orchestrator);
            finish_progress(printer).await;
            print_result(&result?, cli.output_json)?;
        }

        Commands::HealthCheck => {
            let result = Orchestrator::new(config).health_check().await;

            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!("Health Check Results:");
                println!(
                    "  Target (Oracle {}): {} ({}ms)",
                    result.dsn,
                    if result.connected { "OK" } else { "FAILED" },
                    result.latency_ms
                );
                if let Some(ref banner) = result.banner {
                    println!("    Version: {}", banner);
                }
                if let (Some(db), Some(instance)) = (&result.database, &result.instance) {
                    println!("    Database: {} (instance {})", db, instance);
                }
                if let Some(ref err) = result.error {
                    println!("    Error: {}", err);
                }
                println!(
                    "\n  Overall: {}",
                    if result.healthy { "HEALTHY" } else { "UNHEALTHY" }
                );
            }

            if !result.healthy {
                return Err(MigrateError::connection(
                    result.dsn,
                    result.error.unwrap_or_else(|| "health check failed".to_string()),
                ));
            }
        }
    }

    Ok(())
}

/// Attach a JSON-lines progress printer when requested.
fn with_progress(orchestrator: Orchestrator, enabled: bool) -> (Orchestrator, Option<JoinHandle<()>>) {
    if !enabled {
        return (orchestrator, None);
    }
    let (sink, mut rx) = EventSink::channel();
    let printer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            if let Ok(line) = serde_json::to_string(&event) {
                eprintln!("{}", line);
            }
        }
    });
    (orchestrator.with_events(sink), Some(printer))
}

/// Wait for the printer to drain; the sender must already be dropped.
async fn finish_progress(printer: Option<JoinHandle<()>>) {
    if let Some(handle) = printer {
        let _ = handle.await;
    }
}

fn print_conversion(result: &ConversionResult) {
    println!("\nConversion completed!");
    println!("  Input: {}", result.input.display());
    println!("  Output: {}", result.output.display());
    println!("  Tables: {}", result.tables.len());
    println!(
        "  Inserts: {} ({} kept verbatim)",
        result.stats.inserts, result.stats.inserts_passed_through
    );
    println!("  Filtered SQLite statements: {}", result.stats.filtered_statements);
    println!("  SHA-256: {}", result.checksum);
}

fn print_result(result: &MigrationResult, output_json: bool) -> Result<(), MigrateError> {
    if output_json {
        println!("{}", result.to_json()?);
        return Ok(());
    }

    if let Some(ref conversion) = result.conversion {
        print_conversion(conversion);
    }
    let report: &ExecutionReport = &result.execution;
    println!(
        "\nMigration {}!",
        if result.status == "completed" {
            "completed"
        } else {
            "completed with errors"
        }
    );
    println!("  Run ID: {}", result.run_id);
    println!("  Duration: {:.2}s", result.duration_seconds);
    println!(
        "  Tables: {} created, {} already present, {} failed",
        report.tables_created.len(),
        report.tables_already_present.len(),
        report.tables_failed.len()
    );
    if !report.tables_without_foreign_keys.is_empty() {
        println!(
            "  Created without foreign keys: {:?}",
            report.tables_without_foreign_keys
        );
    }
    println!(
        "  Rows: {} inserted, {} duplicates, {} failed, {} skipped",
        report.inserts_succeeded,
        report.duplicates_ignored,
        report.inserts_failed,
        report.inserts_skipped
    );
    for (table, refs) in &report.missing_references {
        println!("  Missing references: {} -> {:?}", table, refs);
    }
    for failed in &report.tables_failed {
        println!("  Failed table {}: {}", failed.table, failed.error);
    }
    if !report.constraints_left_disabled.is_empty() {
        println!(
            "  Constraints left disabled: {}",
            report.constraints_left_disabled.join(", ")
        );
    }
    Ok(())
}

fn setup_logging(verbosity: &str, format: &str) -> Result<(), String> {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    // Logs go to stderr so --output-json keeps stdout clean.
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_span_events(FmtSpan::CLOSE)
        .with_target(false)
        .with_writer(std::io::stderr);

    if format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    Ok(())
}
