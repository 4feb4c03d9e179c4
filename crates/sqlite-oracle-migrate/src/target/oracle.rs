//! Oracle target through the `oracle` crate (OCI).
//!
//! **Requirements:** Oracle Instant Client (or a full client) must be
//! installed and on the loader path at runtime:
//! - Linux: `LD_LIBRARY_PATH` pointing at the Instant Client directory
//! - macOS: `DYLD_LIBRARY_PATH`, or the client in `~/lib`
//! - Windows: the client directory on `PATH`
//!
//! The driver is synchronous. Calls are serialized through a mutex and run
//! on the calling task, which matches the executor's one-statement-at-a-time
//! use of the connection.

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::{TargetConnection, TargetError};
use crate::config::OracleConfig;
use crate::error::{MigrateError, Result};

/// Single Oracle session.
pub struct OracleConnection {
    conn: Mutex<Option<oracle::Connection>>,
    dsn: String,
}

impl OracleConnection {
    /// Connect with the configured credentials.
    ///
    /// # Errors
    ///
    /// Returns [`MigrateError::Connection`] when the session cannot be
    /// established (bad credentials, no listener, unknown service, missing
    /// client libraries).
    pub async fn connect(config: &OracleConfig) -> Result<Self> {
        debug!(
            "Connecting to Oracle at {} as {} (password hidden)",
            config.dsn, config.user
        );
        let conn = oracle::Connection::connect(&config.user, &config.password, &config.dsn)
            .map_err(|e| MigrateError::connection(&config.dsn, describe_connect_error(&e, config)))?;
        info!("Connected to Oracle at {} as {}", config.dsn, config.user);

        Ok(Self {
            conn: Mutex::new(Some(conn)),
            dsn: config.dsn.clone(),
        })
    }

    pub fn dsn(&self) -> &str {
        &self.dsn
    }
}

#[async_trait]
impl TargetConnection for OracleConnection {
    async fn execute(&self, sql: &str) -> std::result::Result<(), TargetError> {
        let guard = self.conn.lock().await;
        let conn = guard.as_ref().ok_or_else(closed)?;
        conn.execute(sql, &[]).map_err(to_target_error)?;
        Ok(())
    }

    async fn query_strings(&self, sql: &str) -> std::result::Result<Vec<Vec<String>>, TargetError> {
        let guard = self.conn.lock().await;
        let conn = guard.as_ref().ok_or_else(closed)?;
        let rows = conn.query(sql, &[]).map_err(to_target_error)?;
        let width = rows.column_info().len();

        let mut out = Vec::new();
        for row in rows {
            let row = row.map_err(to_target_error)?;
            let mut values = Vec::with_capacity(width);
            for i in 0..width {
                let value: Option<String> = row.get(i).map_err(to_target_error)?;
                values.push(value.unwrap_or_default());
            }
            out.push(values);
        }
        Ok(out)
    }

    async fn commit(&self) -> std::result::Result<(), TargetError> {
        let guard = self.conn.lock().await;
        guard
            .as_ref()
            .ok_or_else(closed)?
            .commit()
            .map_err(to_target_error)
    }

    async fn rollback(&self) -> std::result::Result<(), TargetError> {
        let guard = self.conn.lock().await;
        guard
            .as_ref()
            .ok_or_else(closed)?
            .rollback()
            .map_err(to_target_error)
    }

    async fn close(&self) -> std::result::Result<(), TargetError> {
        let mut guard = self.conn.lock().await;
        match guard.take() {
            Some(conn) => {
                debug!("Closing Oracle connection to {}", self.dsn);
                conn.close().map_err(to_target_error)
            }
            None => Ok(()),
        }
    }
}

fn closed() -> TargetError {
    TargetError::new(None, "connection is closed")
}

fn to_target_error(err: oracle::Error) -> TargetError {
    match err.db_error() {
        Some(db) => TargetError::new(Some(db.code()), db.message().to_string()),
        None => TargetError::from_message(err.to_string()),
    }
}

/// Friendlier text for the common connection failures.
fn describe_connect_error(err: &oracle::Error, config: &OracleConfig) -> String {
    let code = err.db_error().map(|db| db.code());
    match code {
        Some(1017) => format!("invalid username/password for user {}", config.user),
        Some(12541) => format!("no listener at {}", config.dsn),
        Some(12514) => format!("service not known by the listener at {}", config.dsn),
        _ => err.to_string(),
    }
}
