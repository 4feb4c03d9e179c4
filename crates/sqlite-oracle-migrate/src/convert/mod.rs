//! SQLite dump to Oracle script conversion.
//!
//! The converter is a pure text transform: it never touches a database and
//! never fails. Statements it cannot understand are passed through so the
//! executor (or a human) can deal with them.

pub mod dependency;

pub use dependency::{creation_order, sort_tables};

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::core::identifier::canonical;
use crate::dialect::{
    classify, insert_target, parse_insert, rewrite_create_table, split_statements, CreateTable,
    StatementKind,
};
use crate::dialect::tokenizer::tokenize;
use crate::error::Result;
use crate::typemap::TextMapping;

/// Options for [`convert_dump`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConvertOptions {
    /// Oracle type for SQLite TEXT columns.
    pub text_mapping: TextMapping,

    /// Keep only primary/foreign key columns and emit no INSERTs.
    pub only_key_columns: bool,
}

/// Counters collected during conversion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionStats {
    pub tables: usize,
    pub tables_passed_through: usize,
    pub inserts: usize,
    pub inserts_passed_through: usize,
    pub other_statements: usize,
    pub filtered_statements: usize,
}

/// Converted Oracle script.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConvertedScript {
    /// `;`-terminated statements in emission order.
    pub statements: Vec<String>,

    /// Table names in creation order.
    pub table_order: Vec<String>,

    pub stats: ConversionStats,
}

impl ConvertedScript {
    /// Script text: statements separated by blank lines.
    pub fn render(&self) -> String {
        let mut out = self.statements.join("\n\n");
        if !out.is_empty() {
            out.push('\n');
        }
        out
    }

    /// SHA-256 of the rendered script, hex encoded.
    pub fn checksum(&self) -> String {
        format!("{:x}", Sha256::digest(self.render().as_bytes()))
    }

    /// Write the rendered script as UTF-8.
    pub fn write_to(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.render())?;
        info!(
            "Wrote {} statements to {} (sha256 {})",
            self.statements.len(),
            path.display(),
            &self.checksum()[..12]
        );
        Ok(())
    }
}

/// Convert a SQLite dump to an Oracle script.
///
/// CREATE TABLEs come first in dependency order, then other statements
/// verbatim, then INSERTs grouped by table in the same order. INSERTs for
/// tables without a CREATE follow in first-appearance order.
pub fn convert_dump(dump: &str, options: &ConvertOptions) -> ConvertedScript {
    let mut stats = ConversionStats::default();
    let mut creates: Vec<CreateTable> = Vec::new();
    let mut others: Vec<String> = Vec::new();
    let mut inserts: Vec<(String, Vec<String>)> = Vec::new();
    let mut insert_groups: HashMap<String, usize> = HashMap::new();

    for stmt in split_statements(dump) {
        if is_sqlite_internal(&stmt) {
            debug!("Filtered SQLite statement: {}", first_line(&stmt));
            stats.filtered_statements += 1;
            continue;
        }

        match classify(&stmt) {
            StatementKind::CreateTable => {
                let table =
                    rewrite_create_table(&stmt, options.text_mapping, options.only_key_columns);
                if matches!(table, CreateTable::PassThrough { .. }) {
                    stats.tables_passed_through += 1;
                }
                stats.tables += 1;
                creates.push(table);
            }
            StatementKind::Insert => {
                if options.only_key_columns {
                    continue;
                }
                let key = insert_target(&stmt).map(|t| canonical(&t)).unwrap_or_default();
                let converted = match parse_insert(&stmt) {
                    Some(insert) => insert.to_statements(),
                    None => {
                        debug!("INSERT kept verbatim: {}", first_line(&stmt));
                        stats.inserts_passed_through += 1;
                        vec![terminate(&stmt)]
                    }
                };
                stats.inserts += converted.len();

                let group = *insert_groups.entry(key.clone()).or_insert_with(|| {
                    inserts.push((key, Vec::new()));
                    inserts.len() - 1
                });
                inserts[group].1.extend(converted);
            }
            StatementKind::Other => {
                stats.other_statements += 1;
                others.push(terminate(&stmt));
            }
        }
    }

    let keyed: Vec<(String, Vec<String>)> = creates
        .iter()
        .enumerate()
        .map(|(i, t)| {
            let key = t
                .name()
                .map(canonical)
                .unwrap_or_else(|| format!("#unnamed{}", i));
            (key, t.referenced_tables().into_iter().collect())
        })
        .collect();
    let order = creation_order(&keyed);

    let mut statements = Vec::new();
    let mut table_order = Vec::new();
    for &i in &order {
        statements.push(creates[i].to_sql());
        if let Some(name) = creates[i].name() {
            table_order.push(name.to_string());
        }
    }
    statements.append(&mut others);

    let mut emitted = vec![false; inserts.len()];
    for &i in &order {
        if let Some(&group) = insert_groups.get(&keyed[i].0) {
            if !emitted[group] {
                emitted[group] = true;
                statements.extend(inserts[group].1.iter().cloned());
            }
        }
    }
    for (group, (_, stmts)) in inserts.iter().enumerate() {
        if !emitted[group] {
            statements.extend(stmts.iter().cloned());
        }
    }

    info!(
        "Converted {} tables ({} passed through), {} inserts, {} other statements; {} filtered",
        stats.tables,
        stats.tables_passed_through,
        stats.inserts,
        stats.other_statements,
        stats.filtered_statements
    );

    ConvertedScript {
        statements,
        table_order,
        stats,
    }
}

/// Statements with no Oracle equivalent: transaction control, pragmas and
/// writes to SQLite's own bookkeeping tables.
fn is_sqlite_internal(stmt: &str) -> bool {
    let tokens = tokenize(stmt);
    let word = |i: usize| {
        tokens
            .get(i)
            .map(|t| t.text(stmt).to_ascii_uppercase())
            .unwrap_or_default()
    };
    let is_internal_name = |name: &str| name.to_ascii_lowercase().starts_with("sqlite_");

    match word(0).as_str() {
        "PRAGMA" | "BEGIN" | "COMMIT" | "END" | "ROLLBACK" | "VACUUM" | "ANALYZE" => true,
        "DELETE" if word(1) == "FROM" => tokens
            .get(2)
            .and_then(|t| t.ident(stmt))
            .is_some_and(is_internal_name),
        "INSERT" => insert_target(stmt).is_some_and(|t| is_internal_name(&t)),
        "CREATE" => match classify(stmt) {
            StatementKind::CreateTable => rewrite_create_table(stmt, TextMapping::default(), false)
                .name()
                .is_some_and(is_internal_name),
            _ => false,
        },
        _ => false,
    }
}

fn terminate(stmt: &str) -> String {
    format!("{};", stmt.trim().trim_end_matches(';').trim_end())
}

fn first_line(stmt: &str) -> &str {
    stmt.lines().next().unwrap_or_default()
}
