//! Oracle target contract.
//!
//! The executor talks to the target through [`TargetConnection`] only. The
//! real implementation lives in [`oracle`] behind the `oracle` feature; tests
//! drive the executor with an in-memory fake.

#[cfg(feature = "oracle")]
pub mod oracle;

#[cfg(test)]
pub(crate) mod testing;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

/// A single open connection to the target database.
///
/// Calls are issued strictly one after another by the caller; implementations
/// do not need to support concurrent statements.
#[async_trait]
pub trait TargetConnection: Send + Sync {
    /// Execute a statement that returns no rows.
    async fn execute(&self, sql: &str) -> Result<(), TargetError>;

    /// Run a query and return every row, each column rendered as text.
    async fn query_strings(&self, sql: &str) -> Result<Vec<Vec<String>>, TargetError>;

    /// Commit the current transaction.
    async fn commit(&self) -> Result<(), TargetError>;

    /// Roll back the current transaction.
    async fn rollback(&self) -> Result<(), TargetError>;

    /// Close the connection.
    async fn close(&self) -> Result<(), TargetError>;
}

/// Error reported by the target database.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct TargetError {
    /// Numeric Oracle error code (`ORA-00942` is `942`), if known.
    pub code: Option<i32>,
    pub message: String,
}

static ORA_CODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"ORA-(\d{5})").expect("valid regex"));

impl TargetError {
    /// Build an error, falling back to the `ORA-NNNNN` prefix of the message
    /// when no code is supplied.
    pub fn new(code: Option<i32>, message: impl Into<String>) -> Self {
        let message = message.into();
        let code = code.or_else(|| parse_ora_code(&message));
        Self { code, message }
    }

    /// Build an error from a message alone.
    pub fn from_message(message: impl Into<String>) -> Self {
        Self::new(None, message)
    }

    /// Classify the error by its Oracle code.
    pub fn kind(&self) -> OracleErrorKind {
        self.code.map_or(OracleErrorKind::Other, OracleErrorKind::from_code)
    }
}

fn parse_ora_code(message: &str) -> Option<i32> {
    ORA_CODE
        .captures(message)
        .and_then(|caps| caps[1].parse::<i32>().ok())
}

/// Oracle error codes the executor reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OracleErrorKind {
    /// ORA-00001: unique constraint violated.
    UniqueViolation,
    /// ORA-00942: table or view does not exist.
    ObjectMissing,
    /// ORA-00955: name is already used by an existing object.
    NameInUse,
    /// ORA-01400: cannot insert NULL.
    CannotInsertNull,
    /// ORA-01408: such column list already indexed.
    AlreadyIndexed,
    /// ORA-01438: value larger than specified precision.
    ValueTooLarge,
    /// ORA-01920: user name conflicts with another user or role.
    UserExists,
    /// ORA-02275: such a referential constraint already exists.
    ConstraintExists,
    Other,
}

impl OracleErrorKind {
    pub fn from_code(code: i32) -> Self {
        match code {
            1 => OracleErrorKind::UniqueViolation,
            942 => OracleErrorKind::ObjectMissing,
            955 => OracleErrorKind::NameInUse,
            1400 => OracleErrorKind::CannotInsertNull,
            1408 => OracleErrorKind::AlreadyIndexed,
            1438 => OracleErrorKind::ValueTooLarge,
            1920 => OracleErrorKind::UserExists,
            2275 => OracleErrorKind::ConstraintExists,
            _ => OracleErrorKind::Other,
        }
    }
}
