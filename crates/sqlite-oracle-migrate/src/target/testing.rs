//! In-memory target used by unit tests.

use std::sync::Mutex;

use async_trait::async_trait;

use super::{TargetConnection, TargetError};

struct FailureRule {
    needle: String,
    error: TargetError,
    remaining: Option<usize>,
}

#[derive(Default)]
struct FakeState {
    objects: Vec<(String, String)>,
    /// (table, constraint, enabled) rows of `user_constraints`.
    foreign_keys: Vec<(String, String, bool)>,
    inventory_error: Option<TargetError>,
    executed: Vec<String>,
    queries: Vec<String>,
    failures: Vec<FailureRule>,
    commits: usize,
}

/// Records every statement and fails the ones matching configured rules.
#[derive(Default)]
pub(crate) struct FakeConnection {
    state: Mutex<FakeState>,
}

impl FakeConnection {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Objects returned by the `user_objects` inventory query.
    pub(crate) fn with_tables(self, names: &[&str]) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            for name in names {
                state
                    .objects
                    .push((name.to_uppercase(), "TABLE".to_string()));
            }
        }
        self
    }

    /// Objects of any type, e.g. an index named like a table.
    pub(crate) fn with_object(self, name: &str, kind: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .objects
            .push((name.to_uppercase(), kind.to_string()));
        self
    }

    /// A referential constraint, enabled or already disabled.
    pub(crate) fn with_foreign_key(self, table: &str, constraint: &str, enabled: bool) -> Self {
        self.state.lock().unwrap().foreign_keys.push((
            table.to_uppercase(),
            constraint.to_uppercase(),
            enabled,
        ));
        self
    }

    /// Error for the `user_objects` inventory and other non-constraint queries.
    pub(crate) fn with_inventory_error(self, message: &str) -> Self {
        self.state.lock().unwrap().inventory_error = Some(TargetError::from_message(message));
        self
    }

    /// Fail every statement containing `needle` with the given ORA code.
    pub(crate) fn fail_on(self, needle: &str, code: i32) -> Self {
        self.push_rule(needle, code, None)
    }

    /// Fail only the first `times` statements containing `needle`.
    pub(crate) fn fail_times(self, needle: &str, code: i32, times: usize) -> Self {
        self.push_rule(needle, code, Some(times))
    }

    fn push_rule(self, needle: &str, code: i32, remaining: Option<usize>) -> Self {
        self.state.lock().unwrap().failures.push(FailureRule {
            needle: needle.to_string(),
            error: TargetError::new(Some(code), format!("ORA-{:05}: simulated", code)),
            remaining,
        });
        self
    }

    pub(crate) fn executed(&self) -> Vec<String> {
        self.state.lock().unwrap().executed.clone()
    }

    pub(crate) fn executed_matching(&self, needle: &str) -> Vec<String> {
        self.executed()
            .into_iter()
            .filter(|sql| sql.contains(needle))
            .collect()
    }

    pub(crate) fn commits(&self) -> usize {
        self.state.lock().unwrap().commits
    }

    pub(crate) fn queries(&self) -> Vec<String> {
        self.state.lock().unwrap().queries.clone()
    }
}

#[async_trait]
impl TargetConnection for FakeConnection {
    async fn execute(&self, sql: &str) -> Result<(), TargetError> {
        let mut state = self.state.lock().unwrap();
        state.executed.push(sql.to_string());
        for rule in state.failures.iter_mut() {
            if !sql.contains(&rule.needle) {
                continue;
            }
            match rule.remaining {
                Some(0) => continue,
                Some(ref mut n) => *n -= 1,
                None => {}
            }
            return Err(rule.error.clone());
        }
        Ok(())
    }

    async fn query_strings(&self, sql: &str) -> Result<Vec<Vec<String>>, TargetError> {
        let mut state = self.state.lock().unwrap();
        state.queries.push(sql.to_string());
        if sql.contains("user_constraints") {
            return Ok(state
                .foreign_keys
                .iter()
                .filter(|(_, _, enabled)| *enabled)
                .map(|(table, name, _)| vec![table.clone(), name.clone()])
                .collect());
        }
        if let Some(err) = state.inventory_error.clone() {
            return Err(err);
        }
        Ok(state
            .objects
            .iter()
            .map(|(name, kind)| vec![name.clone(), kind.clone()])
            .collect())
    }

    async fn commit(&self) -> Result<(), TargetError> {
        self.state.lock().unwrap().commits += 1;
        Ok(())
    }

    async fn rollback(&self) -> Result<(), TargetError> {
        Ok(())
    }

    async fn close(&self) -> Result<(), TargetError> {
        Ok(())
    }
}
