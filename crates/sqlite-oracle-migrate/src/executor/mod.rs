//! Staged executor: applies a converted script to a live Oracle schema.
//!
//! The run is split into phases that each commit on their own:
//!
//! 0. inventory of existing tables and indexes (optionally dropping tables)
//! 1. CREATE TABLE in script order, then indexes and other statements
//! 1.5. foreign keys removed in phase 1 are added with `ALTER TABLE`
//! 1.75. every enabled referential constraint is disabled, one by one
//! 2. INSERTs grouped by table, with literal repairs and per-row recovery
//! 3. the constraints disabled in 1.75 are enabled again
//!
//! Only connecting can fail a run, and that happens before the executor is
//! built. Every later failure is recorded in the [`ExecutionReport`].
//!
//! [`ExecutorOptions::tables`] narrows phases 0 to 2 to a set of tables, for
//! reloading tables a previous run could not create or fill.

pub mod repair;
pub mod report;

pub use report::{ExecutionReport, ExecutionState, FailedTable, TableInsertStats};

use std::collections::{BTreeSet, HashMap};
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::core::identifier::{canonical, dictionary_name};
use crate::core::ForeignKey;
use crate::dialect::{
    attached_table, classify, insert_target, rewrite_create_table, split_statements, CreateTable,
    StatementKind,
};
use crate::events::{EventSink, MigrationEvent, Phase};
use crate::target::{OracleErrorKind, TargetConnection};
use crate::typemap::TextMapping;
use repair::{null_to_empty, repair_insert};

const INVENTORY_SQL: &str =
    "SELECT object_name, object_type FROM user_objects WHERE object_type IN ('TABLE', 'INDEX')";

const ENABLED_FOREIGN_KEYS_SQL: &str = "SELECT table_name, constraint_name FROM user_constraints \
     WHERE constraint_type = 'R' AND status = 'ENABLED'";

const UNNAMED_TABLE: &str = "<unnamed>";

/// Executor settings.
#[derive(Debug, Clone, Default)]
pub struct ExecutorOptions {
    /// Drop existing tables (with their constraints) before creating. With a
    /// table filter only the selected tables are dropped.
    pub drop_tables: bool,

    /// Only create, drop and load these tables. Empty selects every table.
    pub tables: Vec<String>,
}

impl ExecutorOptions {
    /// Whether `table` passes the table filter.
    pub fn includes(&self, table: &str) -> bool {
        let name = dictionary_name(table);
        self.tables.is_empty() || self.tables.iter().any(|t| dictionary_name(t) == name)
    }
}

/// Script statements sorted into the buckets the phases consume.
#[derive(Debug, Default)]
struct ScriptPlan {
    creates: Vec<String>,
    others: Vec<String>,
    /// (table name, statements), creation order first, then first appearance.
    inserts: Vec<(String, Vec<String>)>,
}

impl ScriptPlan {
    fn from_script(script: &str) -> Self {
        let mut plan = ScriptPlan::default();
        let mut creation_keys = Vec::new();
        let mut loose: Vec<(String, String)> = Vec::new();

        for stmt in split_statements(script) {
            match classify(&stmt) {
                StatementKind::CreateTable => {
                    if let Some(name) = rewrite_create_table(&stmt, TextMapping::Varchar2, false).name() {
                        creation_keys.push(canonical(name));
                    }
                    plan.creates.push(stmt);
                }
                StatementKind::Insert => {
                    let table = insert_target(&stmt).unwrap_or_else(|| UNNAMED_TABLE.to_string());
                    loose.push((table, stmt));
                }
                StatementKind::Other => plan.others.push(stmt),
            }
        }

        let mut index: HashMap<String, usize> = HashMap::new();
        for key in creation_keys {
            if !index.contains_key(&key) {
                index.insert(key.clone(), plan.inserts.len());
                plan.inserts.push((key, Vec::new()));
            }
        }
        for (table, stmt) in loose {
            let key = canonical(&table);
            let slot = *index.entry(key).or_insert_with(|| {
                plan.inserts.push((table.clone(), Vec::new()));
                plan.inserts.len() - 1
            });
            let group = &mut plan.inserts[slot];
            if group.1.is_empty() {
                group.0 = table;
            }
            group.1.push(stmt);
        }
        plan.inserts.retain(|(_, stmts)| !stmts.is_empty());
        plan
    }

    /// Keep only statements for tables the filter selects. Indexes and
    /// triggers follow their table; statements on no table are dropped.
    fn retain_tables(&mut self, options: &ExecutorOptions) {
        if options.tables.is_empty() {
            return;
        }
        self.creates.retain(|sql| {
            rewrite_create_table(sql, TextMapping::Varchar2, false)
                .name()
                .is_some_and(|name| options.includes(name))
        });
        self.others
            .retain(|sql| attached_table(sql).is_some_and(|table| options.includes(&table)));
        self.inserts.retain(|(table, _)| options.includes(table));
    }

    /// Dictionary names of every table the plan creates or loads.
    fn table_names(&self) -> BTreeSet<String> {
        let created = self
            .creates
            .iter()
            .filter_map(|sql| rewrite_create_table(sql, TextMapping::Varchar2, false).name().map(dictionary_name));
        let loaded = self.inserts.iter().map(|(table, _)| dictionary_name(table));
        created.chain(loaded).collect()
    }
}

/// Applies a script against one connection, phase by phase.
pub struct StagedExecutor<'a> {
    conn: &'a dyn TargetConnection,
    options: ExecutorOptions,
    events: &'a EventSink,
    state: ExecutionState,
}

impl<'a> StagedExecutor<'a> {
    pub fn new(conn: &'a dyn TargetConnection, options: ExecutorOptions, events: &'a EventSink) -> Self {
        Self {
            conn,
            options,
            events,
            state: ExecutionState::default(),
        }
    }

    /// Apply `script`. Statements are split with quote awareness, so the
    /// script may be any output of the converter or a hand-edited variant.
    pub async fn run(mut self, script: &str) -> ExecutionReport {
        let started = Instant::now();
        let mut plan = ScriptPlan::from_script(script);
        if !self.options.tables.is_empty() {
            plan.retain_tables(&self.options);
            info!("Restricting run to tables: {}", self.options.tables.join(", "));
            let found = plan.table_names();
            for table in self.options.tables.clone() {
                if !found.contains(&dictionary_name(&table)) {
                    self.warn(format!("Table {} does not appear in the script", table));
                }
            }
        }
        info!(
            "Executing script: {} tables, {} other statements, {} insert groups",
            plan.creates.len(),
            plan.others.len(),
            plan.inserts.len()
        );

        self.inventory().await;

        let deferred = self.create_tables(&plan.creates).await;
        self.run_other_statements(&plan.others).await;
        self.commit("table creation").await;

        self.add_foreign_keys(deferred).await;
        self.commit("foreign key creation").await;

        self.disable_foreign_keys().await;
        self.load_data(&plan.inserts).await;
        self.enable_foreign_keys().await;

        self.commit("end of run").await;

        let report = self.state.finish(started.elapsed().as_secs_f64());
        report.log_summary();
        report
    }

    fn phase(&self, phase: Phase) {
        debug!("Phase {:?}", phase);
        self.events.emit(MigrationEvent::PhaseStarted { phase });
    }

    async fn commit(&mut self, checkpoint: &str) {
        if let Err(e) = self.conn.commit().await {
            self.state
                .warn(format!("Commit after {} failed: {}", checkpoint, e));
        }
    }

    async fn inventory(&mut self) {
        self.phase(Phase::Inventory);

        let mut tables = Vec::new();
        match self.conn.query_strings(INVENTORY_SQL).await {
            Ok(rows) => {
                for row in rows {
                    let Some(name) = row.first() else { continue };
                    let name = name.to_uppercase();
                    if row.get(1).is_some_and(|kind| kind.eq_ignore_ascii_case("TABLE")) {
                        self.state.preexisting_tables.insert(name.clone());
                        tables.push(name.clone());
                    }
                    self.state.preexisting_objects.insert(name);
                }
                info!(
                    "Found {} existing objects ({} tables)",
                    self.state.preexisting_objects.len(),
                    tables.len()
                );
            }
            Err(e) => {
                let message = format!("Could not list existing objects, assuming none: {}", e);
                self.warn(message);
            }
        }

        tables.retain(|table| self.options.includes(table));
        if self.options.drop_tables && !tables.is_empty() {
            info!("Dropping {} existing tables", tables.len());
            for table in &tables {
                let sql = format!(
                    "DROP TABLE \"{}\" CASCADE CONSTRAINTS",
                    table.replace('"', "\"\"")
                );
                match self.conn.execute(&sql).await {
                    Ok(()) => debug!("Dropped {}", table),
                    Err(e) if e.kind() == OracleErrorKind::ObjectMissing => {}
                    Err(e) => self.warn(format!("Could not drop table {}: {}", table, e)),
                }
            }
            self.commit("dropping tables").await;
            for table in &tables {
                self.state.preexisting_objects.remove(table);
                self.state.preexisting_tables.remove(table);
            }
        }
    }

    /// Phase 1. Returns the foreign keys removed from created tables.
    async fn create_tables(&mut self, creates: &[String]) -> Vec<(String, ForeignKey)> {
        self.phase(Phase::CreateTables);
        let mut deferred = Vec::new();
        for sql in creates {
            self.create_table(sql, &mut deferred).await;
        }
        info!(
            "Created {} tables, {} already present, {} failed",
            self.state.report.tables_created.len(),
            self.state.report.tables_already_present.len(),
            self.state.report.tables_failed.len()
        );
        deferred
    }

    async fn create_table(&mut self, sql: &str, deferred: &mut Vec<(String, ForeignKey)>) {
        let create = rewrite_create_table(sql, TextMapping::Varchar2, false);
        let name = create.name().unwrap_or(UNNAMED_TABLE).to_string();
        let dict = dictionary_name(&name);

        if self.state.preexisting_tables.contains(&dict) {
            debug!("Table {} already present", name);
            self.already_present(&name);
            return;
        }

        let table = match &create {
            CreateTable::Parsed(table) => Some(table),
            CreateTable::PassThrough { .. } => None,
        };

        let self_key = canonical(&name);
        let missing: BTreeSet<String> = create
            .referenced_tables()
            .into_iter()
            .filter(|r| *r != self_key && !self.state.is_usable(&dictionary_name(r)))
            .collect();

        // Parents not created yet: create without foreign keys right away.
        if let (Some(table), false) = (table, missing.is_empty()) {
            let (stripped, removed) = table.without_foreign_keys();
            debug!(
                "Creating {} without foreign keys, missing: {:?}",
                name, missing
            );
            match self.conn.execute(statement_text(&stripped.to_sql())).await {
                Ok(()) => {
                    self.created(&name, true);
                    self.state.record_missing(&name, missing);
                    deferred.extend(removed.into_iter().map(|fk| (name.clone(), fk)));
                }
                Err(e) if e.kind() == OracleErrorKind::NameInUse => self.already_present(&name),
                Err(e) => self.failed(&name, e.to_string()),
            }
            return;
        }

        match self.conn.execute(statement_text(sql)).await {
            Ok(()) => self.created(&name, false),
            Err(e) if e.kind() == OracleErrorKind::NameInUse => self.already_present(&name),
            Err(e) if e.kind() == OracleErrorKind::ObjectMissing => {
                let Some(table) = table.filter(|t| !t.foreign_keys().is_empty()) else {
                    self.failed(&name, e.to_string());
                    return;
                };
                let (stripped, removed) = table.without_foreign_keys();
                debug!("Retrying {} without foreign keys after: {}", name, e);
                match self.conn.execute(statement_text(&stripped.to_sql())).await {
                    Ok(()) => {
                        self.created(&name, true);
                        let refs = removed
                            .iter()
                            .map(ForeignKey::ref_key)
                            .filter(|r| *r != self_key);
                        self.state.record_missing(&name, refs.collect::<Vec<_>>());
                        deferred.extend(removed.into_iter().map(|fk| (name.clone(), fk)));
                    }
                    Err(e) => self.failed(&name, e.to_string()),
                }
            }
            Err(e) => self.failed(&name, e.to_string()),
        }
    }

    fn created(&mut self, name: &str, without_foreign_keys: bool) {
        info!(
            "Created table {}{}",
            name,
            if without_foreign_keys { " (without foreign keys)" } else { "" }
        );
        self.state.tables_created.insert(dictionary_name(name));
        self.state.report.tables_created.push(name.to_string());
        if without_foreign_keys {
            self.state.tables_without_fk.insert(name.to_string());
        }
        self.events.emit(MigrationEvent::TableCreated {
            table: name.to_string(),
            without_foreign_keys,
        });
    }

    fn already_present(&mut self, name: &str) {
        self.state.preexisting_tables.insert(dictionary_name(name));
        self.state.report.tables_already_present.push(name.to_string());
        self.events.emit(MigrationEvent::TableAlreadyPresent {
            table: name.to_string(),
        });
    }

    fn failed(&mut self, name: &str, error: String) {
        warn!("Failed to create table {}: {}", name, error);
        self.state.report.tables_failed.push(FailedTable {
            table: name.to_string(),
            error: error.clone(),
        });
        self.events.emit(MigrationEvent::TableFailed {
            table: name.to_string(),
            error,
        });
    }

    fn warn(&mut self, message: String) {
        self.events.emit(MigrationEvent::Warning {
            message: message.clone(),
        });
        self.state.warn(message);
    }

    async fn run_other_statements(&mut self, others: &[String]) {
        for sql in others {
            match self.conn.execute(&statement_text_plsql(sql)).await {
                Ok(()) => self.state.report.other_statements_succeeded += 1,
                Err(e)
                    if matches!(
                        e.kind(),
                        OracleErrorKind::NameInUse | OracleErrorKind::AlreadyIndexed
                    ) =>
                {
                    debug!("Already present: {}", e);
                }
                Err(e) => {
                    self.state.report.other_statements_failed += 1;
                    let head: String = sql.chars().take(60).collect();
                    self.warn(format!("Statement failed ({}...): {}", head, e));
                }
            }
        }
    }

    /// Phase 1.5.
    async fn add_foreign_keys(&mut self, deferred: Vec<(String, ForeignKey)>) {
        self.phase(Phase::AddForeignKeys);
        for (table, fk) in deferred {
            let reference = fk.ref_key();
            if !self.state.is_usable(&dictionary_name(&fk.ref_table)) {
                debug!("{} still references missing table {}", table, fk.ref_table);
                continue;
            }

            match self.conn.execute(&fk.alter_statement(&table)).await {
                Ok(()) => {
                    info!("Added foreign key {} -> {}", table, fk.ref_table);
                    self.state.report.foreign_keys_added += 1;
                    self.state.resolve_missing(&table, &reference);
                    self.events.emit(MigrationEvent::ForeignKeyAdded {
                        table,
                        references: fk.ref_table,
                    });
                }
                Err(e) if e.kind() == OracleErrorKind::ConstraintExists => {
                    self.state.resolve_missing(&table, &reference);
                }
                Err(e) => {
                    self.state.report.foreign_keys_failed += 1;
                    self.state.warn(format!(
                        "Could not add foreign key {} -> {}: {}",
                        table, fk.ref_table, e
                    ));
                    self.events.emit(MigrationEvent::ForeignKeyFailed {
                        table,
                        references: fk.ref_table,
                        error: e.to_string(),
                    });
                }
            }
        }
    }

    /// Phase 1.75. Only constraints enabled now are touched, so ones an
    /// operator disabled before the run stay disabled afterwards.
    async fn disable_foreign_keys(&mut self) {
        self.phase(Phase::DisableConstraints);
        let rows = match self.conn.query_strings(ENABLED_FOREIGN_KEYS_SQL).await {
            Ok(rows) => rows,
            Err(e) => {
                self.warn(format!(
                    "Could not list foreign key constraints, loading with them enabled: {}",
                    e
                ));
                return;
            }
        };

        for row in rows {
            let [table, constraint, ..] = row.as_slice() else { continue };
            match self
                .conn
                .execute(&constraint_statement(table, constraint, "DISABLE"))
                .await
            {
                Ok(()) => self
                    .state
                    .disabled_constraints
                    .push((table.clone(), constraint.clone())),
                Err(e) => self.warn(format!(
                    "Could not disable constraint {}.{}: {}",
                    table, constraint, e
                )),
            }
        }
        self.state.report.constraints_disabled = self.state.disabled_constraints.len();
        debug!(
            "Disabled {} foreign key constraints",
            self.state.report.constraints_disabled
        );
    }

    /// Phase 3.
    async fn enable_foreign_keys(&mut self) {
        self.phase(Phase::EnableConstraints);
        for (table, constraint) in std::mem::take(&mut self.state.disabled_constraints) {
            let sql = constraint_statement(&table, &constraint, "ENABLE");
            if let Err(e) = self.conn.execute(&sql).await {
                let name = format!("{}.{}", table, constraint);
                self.warn(format!("Constraint {} left disabled: {}", name, e));
                self.state.report.constraints_left_disabled.push(name);
            }
        }
    }

    /// Phase 2.
    async fn load_data(&mut self, groups: &[(String, Vec<String>)]) {
        self.phase(Phase::LoadData);
        for (table, statements) in groups {
            let mut stats = TableInsertStats {
                table: table.clone(),
                ..Default::default()
            };

            if !self.state.is_usable(&dictionary_name(table)) {
                stats.skipped = statements.len();
                warn!(
                    "Skipping {} inserts into {}: table was not created",
                    statements.len(),
                    table
                );
                self.events.emit(MigrationEvent::TableSkipped {
                    table: table.clone(),
                    statements: statements.len(),
                });
                self.state.push_table_stats(stats);
                continue;
            }

            for sql in statements {
                self.insert(sql, &mut stats).await;
            }

            info!(
                "{}: {} succeeded, {} errors",
                table,
                stats.succeeded,
                stats.failed + stats.duplicates
            );
            self.events.emit(MigrationEvent::TableLoaded {
                table: table.clone(),
                succeeded: stats.succeeded,
                duplicates: stats.duplicates,
                failed: stats.failed,
                repaired: stats.repaired,
            });
            self.state.push_table_stats(stats);
            self.commit(&format!("loading {}", table)).await;
        }
    }

    async fn insert(&mut self, sql: &str, stats: &mut TableInsertStats) {
        let repaired = repair_insert(statement_text(sql));
        let err = match self.conn.execute(&repaired).await {
            Ok(()) => {
                stats.succeeded += 1;
                return;
            }
            Err(e) => e,
        };

        match err.kind() {
            OracleErrorKind::UniqueViolation => stats.duplicates += 1,
            OracleErrorKind::NameInUse => stats.ignored += 1,
            OracleErrorKind::CannotInsertNull => {
                let retried = match null_to_empty(&repaired) {
                    Some(fixed) => self.conn.execute(&fixed).await,
                    None => Err(err),
                };
                match retried {
                    Ok(()) => {
                        stats.succeeded += 1;
                        stats.repaired += 1;
                    }
                    Err(e) => self.insert_failed(stats, &e.to_string()),
                }
            }
            _ => self.insert_failed(stats, &err.to_string()),
        }
    }

    fn insert_failed(&mut self, stats: &mut TableInsertStats, error: &str) {
        if stats.failed == 0 {
            warn!("Insert into {} failed: {}", stats.table, error);
        } else {
            debug!("Insert into {} failed: {}", stats.table, error);
        }
        stats.failed += 1;
    }
}

fn constraint_statement(table: &str, constraint: &str, action: &str) -> String {
    format!(
        "ALTER TABLE \"{}\" {} CONSTRAINT \"{}\"",
        table.replace('"', "\"\""),
        action,
        constraint.replace('"', "\"\"")
    )
}

/// Statement text without the trailing `;` OCI rejects.
fn statement_text(sql: &str) -> &str {
    sql.trim().trim_end_matches(';').trim_end()
}

/// Like [`statement_text`], but PL/SQL units keep their closing `END;`.
fn statement_text_plsql(sql: &str) -> String {
    let text = statement_text(sql);
    let ends_block = text
        .rsplit(|c: char| c.is_whitespace())
        .next()
        .is_some_and(|w| w.eq_ignore_ascii_case("END"));
    if ends_block {
        format!("{};", text)
    } else {
        text.to_string()
    }
}
