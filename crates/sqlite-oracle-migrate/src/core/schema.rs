//! Parsed table definitions.
//!
//! A [`TableDefinition`] is produced once per CREATE TABLE statement by the
//! dialect parser and is read-only afterwards. Rendering back to Oracle DDL
//! lives here so the converter and executor agree on the exact text.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::identifier::{canonical, oracle_ident};

/// Table metadata parsed from a CREATE TABLE statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableDefinition {
    /// Table name as written, without quoting.
    pub name: String,

    /// Column definitions, in declaration order.
    pub columns: Vec<ColumnDefinition>,

    /// Table-level constraints, in declaration order.
    pub constraints: Vec<TableConstraint>,

    /// Canonical names of tables referenced by any foreign key.
    pub referenced_tables: BTreeSet<String>,
}

impl TableDefinition {
    /// Canonical (lower-case) lookup key.
    pub fn key(&self) -> String {
        canonical(&self.name)
    }

    /// Every foreign key, table-level first, then inline column references.
    pub fn foreign_keys(&self) -> Vec<ForeignKey> {
        let table_level = self.constraints.iter().filter_map(|c| match c {
            TableConstraint::ForeignKey(fk) => Some(fk.clone()),
            _ => None,
        });
        let inline = self.columns.iter().filter_map(|col| {
            col.references.as_ref().map(|r| ForeignKey {
                name: r.name.clone(),
                columns: vec![col.name.clone()],
                ref_table: r.ref_table.clone(),
                ref_columns: r.ref_columns.clone(),
                on_delete: r.on_delete.clone(),
            })
        });
        table_level.chain(inline).collect()
    }

    /// Names of the primary key columns.
    pub fn primary_key_columns(&self) -> Vec<String> {
        for c in &self.constraints {
            if let TableConstraint::PrimaryKey { columns, .. } = c {
                return columns.clone();
            }
        }
        self.columns
            .iter()
            .filter(|c| c.is_primary_key)
            .map(|c| c.name.clone())
            .collect()
    }

    /// Copy of this table with every foreign key removed, plus the removed keys.
    pub fn without_foreign_keys(&self) -> (TableDefinition, Vec<ForeignKey>) {
        let removed = self.foreign_keys();
        let mut stripped = self.clone();
        stripped
            .constraints
            .retain(|c| !matches!(c, TableConstraint::ForeignKey(_)));
        for col in &mut stripped.columns {
            col.references = None;
        }
        stripped.referenced_tables.clear();
        (stripped, removed)
    }

    /// Render as an Oracle CREATE TABLE statement terminated with `;`.
    pub fn to_sql(&self) -> String {
        let items: Vec<String> = self
            .columns
            .iter()
            .map(ColumnDefinition::to_sql)
            .chain(self.constraints.iter().map(TableConstraint::to_sql))
            .collect();

        format!(
            "CREATE TABLE {} (\n  {}\n);",
            oracle_ident(&self.name),
            items.join(",\n  ")
        )
    }
}

/// Column metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDefinition {
    /// Column name, without quoting.
    pub name: String,

    /// Declared SQLite type (may be empty).
    pub raw_type: String,

    /// Mapped Oracle type.
    pub oracle_type: String,

    /// `DEFAULT` expression text, without the keyword.
    pub default: Option<String>,

    /// Remaining constraint text (`UNIQUE`, `CHECK (...)`), in order.
    pub extra: Vec<String>,

    pub not_null: bool,
    pub is_primary_key: bool,

    /// Rendered as `GENERATED BY DEFAULT AS IDENTITY`.
    pub is_identity: bool,

    /// Inline `REFERENCES` clause.
    pub references: Option<ColumnReference>,
}

impl ColumnDefinition {
    pub fn to_sql(&self) -> String {
        let mut parts = vec![oracle_ident(&self.name)];
        if !self.oracle_type.is_empty() {
            parts.push(self.oracle_type.clone());
        }
        if self.is_identity {
            parts.push("GENERATED BY DEFAULT AS IDENTITY".to_string());
        }
        if let Some(default) = &self.default {
            parts.push(format!("DEFAULT {}", default));
        }
        if self.not_null && !self.is_primary_key {
            parts.push("NOT NULL".to_string());
        }
        parts.extend(self.extra.iter().cloned());
        if self.is_primary_key {
            parts.push("PRIMARY KEY".to_string());
        }
        if let Some(r) = &self.references {
            parts.push(r.to_sql());
        }
        parts.join(" ")
    }
}

/// Inline `REFERENCES` clause on a column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnReference {
    /// Name from a preceding `CONSTRAINT <name>`.
    pub name: Option<String>,
    pub ref_table: String,
    pub ref_columns: Vec<String>,
    pub on_delete: Option<String>,
}

impl ColumnReference {
    fn to_sql(&self) -> String {
        let mut out = String::new();
        if let Some(name) = &self.name {
            out.push_str(&format!("CONSTRAINT {} ", oracle_ident(name)));
        }
        out.push_str(&references_clause(
            &self.ref_table,
            &self.ref_columns,
            self.on_delete.as_deref(),
        ));
        out
    }
}

/// Table-level constraint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TableConstraint {
    PrimaryKey {
        name: Option<String>,
        columns: Vec<String>,
    },

    /// `UNIQUE (...)` or `CHECK (...)`, kept as rewritten text after the name.
    Other { name: Option<String>, body: String },

    ForeignKey(ForeignKey),
}

impl TableConstraint {
    pub fn to_sql(&self) -> String {
        match self {
            TableConstraint::PrimaryKey { name, columns } => format!(
                "{}PRIMARY KEY ({})",
                constraint_prefix(name.as_deref()),
                ident_list(columns)
            ),
            TableConstraint::Other { name, body } => {
                format!("{}{}", constraint_prefix(name.as_deref()), body)
            }
            TableConstraint::ForeignKey(fk) => fk.to_sql(),
        }
    }
}

/// Foreign key metadata. `ON UPDATE` actions are never carried.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForeignKey {
    /// Constraint name, if declared.
    pub name: Option<String>,

    /// Source column names.
    pub columns: Vec<String>,

    /// Referenced table name.
    pub ref_table: String,

    /// Referenced column names (empty means the referenced primary key).
    pub ref_columns: Vec<String>,

    /// ON DELETE action.
    pub on_delete: Option<String>,
}

impl ForeignKey {
    /// Canonical key of the referenced table.
    pub fn ref_key(&self) -> String {
        canonical(&self.ref_table)
    }

    /// Render as a table-level constraint clause.
    pub fn to_sql(&self) -> String {
        format!(
            "{}FOREIGN KEY ({}) {}",
            constraint_prefix(self.name.as_deref()),
            ident_list(&self.columns),
            references_clause(&self.ref_table, &self.ref_columns, self.on_delete.as_deref())
        )
    }

    /// `ALTER TABLE <table> ADD ...` adding this key to an existing table.
    pub fn alter_statement(&self, table: &str) -> String {
        format!("ALTER TABLE {} ADD {}", oracle_ident(table), self.to_sql())
    }
}

fn constraint_prefix(name: Option<&str>) -> String {
    name.map(|n| format!("CONSTRAINT {} ", oracle_ident(n)))
        .unwrap_or_default()
}

fn ident_list(names: &[String]) -> String {
    names
        .iter()
        .map(|n| oracle_ident(n))
        .collect::<Vec<_>>()
        .join(", ")
}

fn references_clause(table: &str, columns: &[String], on_delete: Option<&str>) -> String {
    let mut out = format!("REFERENCES {}", oracle_ident(table));
    if !columns.is_empty() {
        out.push_str(&format!(" ({})", ident_list(columns)));
    }
    if let Some(action) = on_delete {
        out.push_str(&format!(" ON DELETE {}", action));
    }
    out
}
