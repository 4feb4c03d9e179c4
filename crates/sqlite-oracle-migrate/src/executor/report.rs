//! Execution state and the end-of-run report.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::Result;

/// Insert outcome for one table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableInsertStats {
    pub table: String,
    pub succeeded: usize,
    /// Unique constraint violations (ORA-00001).
    pub duplicates: usize,
    pub failed: usize,
    /// Statements that succeeded after the NULL repair.
    pub repaired: usize,
    /// ORA-00955 outcomes.
    pub ignored: usize,
    /// Statements not attempted because the table is unusable.
    pub skipped: usize,
}

/// A CREATE TABLE that failed even without its foreign keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedTable {
    pub table: String,
    pub error: String,
}

/// Mutable state of one executor run.
#[derive(Debug, Default)]
pub struct ExecutionState {
    /// Dictionary (upper-case) names of tables and indexes found at start.
    pub preexisting_objects: BTreeSet<String>,
    /// Dictionary names of tables found at start or reported as existing.
    pub preexisting_tables: BTreeSet<String>,
    /// Dictionary names of tables created by this run.
    pub tables_created: BTreeSet<String>,
    /// Tables created with their foreign keys removed.
    pub tables_without_fk: BTreeSet<String>,
    /// Table -> referenced tables whose constraint is still missing.
    pub missing_references: BTreeMap<String, BTreeSet<String>>,
    pub inserts_succeeded: usize,
    pub inserts_failed: usize,
    pub duplicates_ignored: usize,
    pub nulls_repaired: usize,
    pub table_stats: Vec<TableInsertStats>,
    /// (table, constraint) pairs this run disabled and must enable again.
    pub disabled_constraints: Vec<(String, String)>,
    pub report: ExecutionReport,
}

impl ExecutionState {
    /// Whether a table exists on the target, created now or before.
    pub fn is_usable(&self, dictionary_name: &str) -> bool {
        self.tables_created.contains(dictionary_name)
            || self.preexisting_tables.contains(dictionary_name)
    }

    pub fn warn(&mut self, message: String) {
        warn!("{}", message);
        self.report.warnings.push(message);
    }

    pub fn record_missing(&mut self, table: &str, refs: impl IntoIterator<Item = String>) {
        self.missing_references
            .entry(table.to_string())
            .or_default()
            .extend(refs);
    }

    /// Drop a missing reference once its constraint has been added.
    pub fn resolve_missing(&mut self, table: &str, reference: &str) {
        if let Some(refs) = self.missing_references.get_mut(table) {
            refs.remove(reference);
            if refs.is_empty() {
                self.missing_references.remove(table);
            }
        }
    }

    pub fn push_table_stats(&mut self, stats: TableInsertStats) {
        self.inserts_succeeded += stats.succeeded;
        self.inserts_failed += stats.failed;
        self.duplicates_ignored += stats.duplicates;
        self.nulls_repaired += stats.repaired;
        self.report.inserts_skipped += stats.skipped;
        self.table_stats.push(stats);
    }

    /// Fold counters into the final report.
    pub fn finish(self, duration_seconds: f64) -> ExecutionReport {
        let mut report = self.report;
        report.tables_without_foreign_keys = self.tables_without_fk.into_iter().collect();
        report.missing_references = self.missing_references;
        report.inserts_succeeded = self.inserts_succeeded;
        report.inserts_failed = self.inserts_failed;
        report.duplicates_ignored = self.duplicates_ignored;
        report.nulls_repaired = self.nulls_repaired;
        report.tables = self.table_stats;
        report.duration_seconds = duration_seconds;
        report
    }
}

/// Outcome of applying a script.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionReport {
    /// Tables created by this run, in creation order.
    pub tables_created: Vec<String>,
    /// Tables skipped because they already existed.
    pub tables_already_present: Vec<String>,
    /// Tables created with some or all foreign keys removed.
    pub tables_without_foreign_keys: Vec<String>,
    pub tables_failed: Vec<FailedTable>,
    /// Foreign keys that are still absent at the end of the run.
    pub missing_references: BTreeMap<String, BTreeSet<String>>,
    pub foreign_keys_added: usize,
    pub foreign_keys_failed: usize,
    /// Indexes, views and other statements.
    pub other_statements_succeeded: usize,
    pub other_statements_failed: usize,
    pub inserts_succeeded: usize,
    pub duplicates_ignored: usize,
    pub inserts_failed: usize,
    pub nulls_repaired: usize,
    pub inserts_skipped: usize,
    /// Foreign keys disabled for the load.
    pub constraints_disabled: usize,
    /// `TABLE.CONSTRAINT` names that could not be enabled again.
    pub constraints_left_disabled: Vec<String>,
    pub tables: Vec<TableInsertStats>,
    pub warnings: Vec<String>,
    pub duration_seconds: f64,
}

impl ExecutionReport {
    /// Convert to JSON string.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// True when nothing failed, was skipped, or was left without its
    /// foreign keys or with them disabled. Duplicates do not count against
    /// a run.
    pub fn is_clean(&self) -> bool {
        self.tables_failed.is_empty()
            && self.missing_references.is_empty()
            && self.foreign_keys_failed == 0
            && self.other_statements_failed == 0
            && self.inserts_failed == 0
            && self.inserts_skipped == 0
            && self.constraints_left_disabled.is_empty()
    }

    /// Log the end-of-run summary.
    pub fn log_summary(&self) {
        info!(
            "Tables: {} created, {} already present, {} without foreign keys, {} failed",
            self.tables_created.len(),
            self.tables_already_present.len(),
            self.tables_without_foreign_keys.len(),
            self.tables_failed.len()
        );
        info!(
            "Inserts: {} succeeded, {} duplicates ignored, {} failed, {} repaired, {} skipped",
            self.inserts_succeeded,
            self.duplicates_ignored,
            self.inserts_failed,
            self.nulls_repaired,
            self.inserts_skipped
        );
        for failed in &self.tables_failed {
            warn!("Table {} failed: {}", failed.table, failed.error);
        }
        if !self.missing_references.is_empty() {
            warn!("Tables with missing references:");
            for (table, refs) in &self.missing_references {
                let refs: Vec<&str> = refs.iter().map(String::as_str).collect();
                warn!("  {} -> {}", table, refs.join(", "));
            }
        }
        if !self.constraints_left_disabled.is_empty() {
            warn!(
                "Constraints left disabled: {}",
                self.constraints_left_disabled.join(", ")
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_finish_folds_counters() {
        let mut state = ExecutionState::default();
        state.tables_without_fk.insert("ORDERS".to_string());
        state.record_missing("orders", ["customers".to_string()]);
        state.push_table_stats(TableInsertStats {
            table: "orders".to_string(),
            succeeded: 3,
            duplicates: 1,
            failed: 1,
            repaired: 1,
            ..Default::default()
        });
        state.push_table_stats(TableInsertStats {
            table: "lines".to_string(),
            skipped: 4,
            ..Default::default()
        });

        let report = state.finish(1.5);
        assert_eq!(report.inserts_succeeded, 3);
        assert_eq!(report.duplicates_ignored, 1);
        assert_eq!(report.inserts_failed, 1);
        assert_eq!(report.nulls_repaired, 1);
        assert_eq!(report.inserts_skipped, 4);
        assert_eq!(report.tables.len(), 2);
        assert_eq!(report.tables_without_foreign_keys, vec!["ORDERS"]);
        assert!(!report.is_clean());
    }

    #[test]
    fn test_resolve_missing_removes_empty_entries() {
        let mut state = ExecutionState::default();
        state.record_missing("a", ["b".to_string(), "c".to_string()]);
        state.resolve_missing("a", "b");
        assert_eq!(state.missing_references["a"].len(), 1);
        state.resolve_missing("a", "c");
        assert!(state.missing_references.is_empty());
    }

    #[test]
    fn test_duplicates_keep_run_clean() {
        let report = ExecutionReport {
            duplicates_ignored: 7,
            ..Default::default()
        };
        assert!(report.is_clean());
        assert!(report.to_json().unwrap().contains("\"duplicates_ignored\": 7"));
    }

    #[test]
    fn test_constraint_left_disabled_is_not_clean() {
        let report = ExecutionReport {
            constraints_disabled: 2,
            constraints_left_disabled: vec!["ORDERS.FK_ORDERS_CUSTOMER".to_string()],
            ..Default::default()
        };
        assert!(!report.is_clean());
    }

    #[test]
    fn test_index_name_does_not_make_table_usable() {
        let mut state = ExecutionState::default();
        state.preexisting_objects.insert("ORDERS".to_string());
        assert!(!state.is_usable("ORDERS"));
        state.preexisting_tables.insert("ORDERS".to_string());
        assert!(state.is_usable("ORDERS"));
    }
}
