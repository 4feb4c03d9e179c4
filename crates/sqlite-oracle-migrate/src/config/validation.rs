//! Configuration validation.

use once_cell::sync::Lazy;
use regex::Regex;

use super::Config;
use crate::error::{MigrateError, Result};

/// Easy Connect: `[//]host[:port][/service[:server][/instance]]`.
static EASY_CONNECT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(//)?[A-Za-z0-9._\-]+(:(\d{1,5}))?(/[A-Za-z0-9._$\-]+(:[A-Za-z]+)?(/[A-Za-z0-9._\-]+)?)?$")
        .expect("valid regex")
});

/// Validate the configuration.
pub fn validate(config: &Config) -> Result<()> {
    if config.oracle.user.trim().is_empty() {
        return Err(MigrateError::Config("oracle.user is required".into()));
    }
    if config.oracle.dsn.trim().is_empty() {
        return Err(MigrateError::Config("oracle.dsn is required".into()));
    }
    validate_dsn(config.oracle.dsn.trim())?;

    if let Some(path) = &config.migration.output_file {
        if path.as_os_str().is_empty() {
            return Err(MigrateError::Config(
                "migration.output_file must not be empty".into(),
            ));
        }
    }

    Ok(())
}

/// Accept an Easy Connect string, a connect descriptor, or a TNS alias.
fn validate_dsn(dsn: &str) -> Result<()> {
    if dsn.starts_with('(') {
        let balanced = dsn.matches('(').count() == dsn.matches(')').count();
        if balanced && dsn.to_uppercase().contains("DESCRIPTION") {
            return Ok(());
        }
        return Err(MigrateError::Config(format!(
            "oracle.dsn '{}' is not a valid connect descriptor",
            dsn
        )));
    }

    let caps = EASY_CONNECT.captures(dsn).ok_or_else(|| {
        MigrateError::Config(format!(
            "oracle.dsn '{}' must look like host:port/service",
            dsn
        ))
    })?;

    if let Some(port) = caps.get(3) {
        match port.as_str().parse::<u32>() {
            Ok(p) if (1..=65535).contains(&p) => {}
            _ => {
                return Err(MigrateError::Config(format!(
                    "oracle.dsn port {} is out of range",
                    port.as_str()
                )))
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MigrationConfig, OracleConfig};

    fn valid_config() -> Config {
        Config {
            oracle: OracleConfig {
                user: "scott".to_string(),
                password: "tiger".to_string(),
                dsn: "localhost:1521/free".to_string(),
            },
            migration: MigrationConfig::default(),
        }
    }

    #[test]
    fn test_valid_config() {
        assert!(validate(&valid_config()).is_ok());
    }

    #[test]
    fn test_missing_user() {
        let mut config = valid_config();
        config.oracle.user = " ".to_string();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_missing_dsn() {
        let mut config = valid_config();
        config.oracle.dsn = String::new();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_dsn_formats() {
        for dsn in [
            "localhost:1521/free",
            "db.example.com/ORCLPDB1",
            "//10.0.0.5:1522/svc.example.com",
            "host:1521/svc:dedicated",
            "ORCL_ALIAS",
            "(DESCRIPTION=(ADDRESS=(PROTOCOL=TCP)(HOST=h)(PORT=1521))(CONNECT_DATA=(SERVICE_NAME=s)))",
        ] {
            let mut config = valid_config();
            config.oracle.dsn = dsn.to_string();
            assert!(validate(&config).is_ok(), "{} should be accepted", dsn);
        }

        for dsn in ["host:99999/svc", "host:port/svc", "has space/svc", "(DESCRIPTION=(", "a/b/c/d"] {
            let mut config = valid_config();
            config.oracle.dsn = dsn.to_string();
            assert!(validate(&config).is_err(), "{} should be rejected", dsn);
        }
    }

    #[test]
    fn test_oracle_config_debug_redacts_password() {
        let mut config = valid_config();
        config.oracle.password = "super_secret_password_123".to_string();
        let debug_output = format!("{:?}", config.oracle);
        assert!(
            debug_output.contains("[REDACTED]"),
            "Debug output should contain [REDACTED]"
        );
        assert!(
            !debug_output.contains("super_secret_password_123"),
            "Debug output should not contain actual password value"
        );
    }
}
