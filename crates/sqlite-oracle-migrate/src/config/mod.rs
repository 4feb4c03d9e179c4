//! Configuration loading and validation.
//!
//! Settings are resolved with the precedence command line > environment >
//! config file > built-in defaults. Environment variables may come from a
//! `.env` file.

mod types;
mod validation;

pub use types::*;

use std::path::Path;

use tracing::debug;

use crate::error::{MigrateError, Result};

pub const ENV_USER: &str = "ORACLE_ADMIN_USER";
pub const ENV_PASSWORD: &str = "ORACLE_ADMIN_PASSWORD";
pub const ENV_DSN: &str = "ORACLE_ADMIN_DSN";
pub const ENV_DROP_TABLES: &str = "ORACLE_DROP_TABLES";
pub const ENV_SCHEMA_ONLY: &str = "ORACLE_SCHEMA_ONLY";
pub const ENV_OUTPUT_FILE: &str = "ORACLE_OUTPUT_FILE";

impl Config {
    /// Load configuration from a YAML file, or JSON when the extension is `.json`.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if is_json {
            Self::from_json(&content)
        } else {
            Self::from_yaml(&content)
        }
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let file: FileConfig = serde_yaml::from_str(yaml)?;
        let config = Config::from(file);
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a JSON string.
    pub fn from_json(json: &str) -> Result<Self> {
        let file: FileConfig = serde_json::from_str(json)?;
        let config = Config::from(file);
        config.validate()?;
        Ok(config)
    }

    /// Defaults overlaid with the process environment.
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env(|key| std::env::var(key).ok());
        config
    }

    /// Resolve the effective configuration.
    ///
    /// `env_file` is loaded into the process environment first (a missing
    /// explicit file is an error; the implicit `./.env` is optional).
    pub fn resolve(
        config_file: Option<&Path>,
        env_file: Option<&Path>,
        overrides: &ConfigOverrides,
    ) -> Result<Self> {
        match env_file {
            Some(path) => {
                dotenv::from_path(path).map_err(|e| {
                    MigrateError::Config(format!("cannot load {}: {}", path.display(), e))
                })?;
                debug!("Loaded environment from {}", path.display());
            }
            None => {
                if let Ok(path) = dotenv::dotenv() {
                    debug!("Loaded environment from {}", path.display());
                }
            }
        }

        let mut config = match config_file {
            Some(path) => Self::load(path)?,
            None => Config::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        config.apply_overrides(overrides);
        config.validate()?;
        Ok(config)
    }

    /// Overlay non-empty variables from `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

        if let Some(user) = get(ENV_USER) {
            self.oracle.user = user;
        }
        if let Some(password) = get(ENV_PASSWORD) {
            self.oracle.password = password;
        }
        if let Some(dsn) = get(ENV_DSN) {
            self.oracle.dsn = dsn;
        }
        if let Some(flag) = get(ENV_DROP_TABLES).and_then(|v| parse_flag(&v)) {
            self.migration.drop_tables = flag;
        }
        if let Some(flag) = get(ENV_SCHEMA_ONLY).and_then(|v| parse_flag(&v)) {
            self.migration.schema_only = flag;
        }
        if let Some(path) = get(ENV_OUTPUT_FILE) {
            self.migration.output_file = Some(path.into());
        }
    }

    /// Overlay command-line values.
    pub fn apply_overrides(&mut self, overrides: &ConfigOverrides) {
        if let Some(user) = &overrides.user {
            self.oracle.user = user.clone();
        }
        if let Some(password) = &overrides.password {
            self.oracle.password = password.clone();
        }
        if let Some(dsn) = &overrides.dsn {
            self.oracle.dsn = dsn.clone();
        }
        if let Some(flag) = overrides.drop_tables {
            self.migration.drop_tables = flag;
        }
        if let Some(flag) = overrides.schema_only {
            self.migration.schema_only = flag;
        }
        if let Some(flag) = overrides.text_as_clob {
            self.migration.text_as_clob = flag;
        }
        if let Some(path) = &overrides.output_file {
            self.migration.output_file = Some(path.clone());
        }
        if let Some(tables) = &overrides.tables {
            self.migration.tables = tables.clone();
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        validation::validate(self)
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
