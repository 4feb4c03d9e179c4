//! # sqlite-oracle-migrate
//!
//! SQLite to Oracle migration library.
//!
//! This library converts SQLite schemas and data into an Oracle script and
//! applies it to a live schema:
//!
//! - **Dump conversion** with a quote-aware tokenizer and CREATE TABLE parser
//! - **Database extraction** straight from a SQLite file when no dump exists
//! - **Dependency ordering** so parent tables are created and loaded first
//! - **Staged execution** that survives missing references, duplicates and
//!   bad rows, and reports them at the end
//! - **Idempotent re-runs** against a schema that is already (partly) loaded
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::path::Path;
//! use sqlite_oracle_migrate::{Config, Orchestrator};
//!
//! #[tokio::main]
//! async fn main() -> sqlite_oracle_migrate::Result<()> {
//!     let config = Config::load("oracle.yaml")?;
//!     let orchestrator = Orchestrator::new(config);
//!     let result = orchestrator.run(Path::new("shop.sqlite")).await?;
//!     println!("Loaded {} rows", result.execution.inserts_succeeded);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod convert;
pub mod core;
pub mod dialect;
pub mod error;
pub mod events;
pub mod executor;
pub mod orchestrator;
pub mod source;
pub mod target;
pub mod typemap;

// Re-exports for convenient access
pub use config::{Config, ConfigOverrides, MigrationConfig, OracleConfig};
pub use convert::{convert_dump, ConversionStats, ConvertOptions, ConvertedScript};
pub use error::{MigrateError, Result};
pub use events::{EventSink, MigrationEvent, Phase};
pub use executor::{ExecutionReport, ExecutorOptions, StagedExecutor};
pub use orchestrator::{ConversionResult, HealthCheckResult, MigrationResult, Orchestrator};
pub use source::{load_script, InputKind, SqliteSource};
pub use target::{TargetConnection, TargetError};
pub use typemap::TextMapping;
