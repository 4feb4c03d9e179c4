//! CREATE TABLE parser and Oracle rewriter.
//!
//! Grammar handled (SQLite):
//!
//! ```text
//! CREATE [TEMP|TEMPORARY] TABLE [IF NOT EXISTS] [schema.]name ( item [, item]* ) [options]
//! item   := column | table_constraint
//! column := name [type] column_constraint*
//! ```
//!
//! Anything that does not fit comes back as [`CreateTable::PassThrough`]
//! with the original text, so a dump with exotic DDL still converts.

use std::collections::{BTreeSet, HashSet};

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};

use super::tokenizer::{matching_paren, render, split_top_level, tokenize, Token, TokenKind};
use crate::core::identifier::{canonical, oracle_ident, unquote};
use crate::core::{ColumnDefinition, ColumnReference, ForeignKey, TableConstraint, TableDefinition};
use crate::typemap::{clamp_numeric_precision, map_column_type, TextMapping};

/// Result of rewriting one CREATE TABLE statement.
#[derive(Debug, Clone, PartialEq)]
pub enum CreateTable {
    Parsed(TableDefinition),
    /// Statement that could not be parsed; emitted unchanged.
    PassThrough { name: Option<String>, sql: String },
}

impl CreateTable {
    /// Table name, if one could be found.
    pub fn name(&self) -> Option<&str> {
        match self {
            CreateTable::Parsed(t) => Some(&t.name),
            CreateTable::PassThrough { name, .. } => name.as_deref(),
        }
    }

    /// Canonical names of referenced tables.
    ///
    /// Pass-through statements fall back to scanning for `REFERENCES <name>`.
    pub fn referenced_tables(&self) -> BTreeSet<String> {
        match self {
            CreateTable::Parsed(t) => t.referenced_tables.clone(),
            CreateTable::PassThrough { sql, .. } => scan_references(sql),
        }
    }

    /// Statement text, `;`-terminated.
    pub fn to_sql(&self) -> String {
        match self {
            CreateTable::Parsed(t) => t.to_sql(),
            CreateTable::PassThrough { sql, .. } => terminate(sql),
        }
    }
}

static REFERENCES: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)\bREFERENCES\s+["`\[]?([A-Za-z_][\w$#]*)"#).expect("valid regex")
});

fn scan_references(sql: &str) -> BTreeSet<String> {
    REFERENCES
        .captures_iter(sql)
        .map(|c| c[1].to_lowercase())
        .collect()
}

fn terminate(sql: &str) -> String {
    let trimmed = sql.trim().trim_end_matches(';').trim_end();
    format!("{};", trimmed)
}

/// Rewrite a SQLite CREATE TABLE statement for Oracle.
///
/// With `only_key_columns`, columns that are neither primary key nor
/// foreign key source columns are dropped.
pub fn rewrite_create_table(sql: &str, text: TextMapping, only_key_columns: bool) -> CreateTable {
    match parse_create_table(sql, text) {
        Some(mut table) => {
            if only_key_columns {
                retain_key_columns(&mut table);
            }
            CreateTable::Parsed(table)
        }
        None => {
            let tokens = tokenize(sql);
            let name = parse_header(sql, &tokens).map(|(name, _)| name);
            debug!(
                "CREATE TABLE {} not parsed, passing through",
                name.as_deref().unwrap_or("<unknown>")
            );
            CreateTable::PassThrough {
                name,
                sql: sql.to_string(),
            }
        }
    }
}

/// Parse a CREATE TABLE statement into a [`TableDefinition`].
///
/// Returns `None` when the statement does not match the grammar (missing
/// column list, unbalanced parentheses, no columns).
pub fn parse_create_table(sql: &str, text: TextMapping) -> Option<TableDefinition> {
    let tokens = tokenize(sql);
    let (name, open) = parse_header(sql, &tokens)?;
    let open = open?;
    let close = matching_paren(&tokens, open)?;

    let mut columns = Vec::new();
    let mut constraints = Vec::new();
    let mut autoincrement = Vec::new();

    for item in split_top_level(&tokens[open + 1..close]) {
        if is_table_constraint(sql, item) {
            constraints.push(parse_table_constraint(sql, item));
        } else {
            let (column, autoinc) = parse_column(sql, item, text)?;
            autoincrement.push(autoinc);
            columns.push(column);
        }
    }

    if columns.is_empty() {
        return None;
    }

    let inline_pk: Vec<usize> = columns
        .iter()
        .enumerate()
        .filter(|(_, c)| c.is_primary_key)
        .map(|(i, _)| i)
        .collect();

    if inline_pk.len() > 1 {
        // Several inline PRIMARY KEY flags: one composite key in column order.
        let names = inline_pk.iter().map(|&i| columns[i].name.clone()).collect();
        for &i in &inline_pk {
            let col = &mut columns[i];
            col.is_primary_key = false;
            col.is_identity = false;
        }
        constraints.insert(
            0,
            TableConstraint::PrimaryKey {
                name: None,
                columns: names,
            },
        );
    } else if let Some(&i) = inline_pk.first() {
        let col = &mut columns[i];
        if is_integer_type(&col.raw_type) {
            col.oracle_type = "NUMBER".to_string();
            col.is_identity = autoincrement[i];
        }
    }

    let mut table = TableDefinition {
        name,
        columns,
        constraints,
        referenced_tables: BTreeSet::new(),
    };
    table.referenced_tables = table.foreign_keys().iter().map(ForeignKey::ref_key).collect();
    Some(table)
}

fn is_integer_type(raw_type: &str) -> bool {
    raw_type.eq_ignore_ascii_case("INTEGER") || raw_type.eq_ignore_ascii_case("INT")
}

/// Returns the table name and the index of the opening parenthesis.
fn parse_header(src: &str, tokens: &[Token]) -> Option<(String, Option<usize>)> {
    let mut c = Cursor::new(src, tokens);
    if !c.eat_word("CREATE") {
        return None;
    }
    let _ = c.eat_word("TEMP") || c.eat_word("TEMPORARY");
    if !c.eat_word("TABLE") {
        return None;
    }
    c.eat_words(&["IF", "NOT", "EXISTS"]);

    let mut name = c.ident()?;
    if c.eat_symbol(".") {
        name = c.ident()?;
    }

    let open = match c.peek() {
        Some(t) if t.kind == TokenKind::LParen => Some(c.pos),
        _ => None,
    };
    Some((name, open))
}

fn is_table_constraint(src: &str, item: &[Token]) -> bool {
    let first = &item[0];
    ["PRIMARY", "UNIQUE", "CHECK", "FOREIGN", "CONSTRAINT"]
        .iter()
        .any(|kw| first.is_word(src, kw))
}

/// Keywords that end the type name of a column.
const COLUMN_CONSTRAINT_KEYWORDS: &[&str] = &[
    "CONSTRAINT",
    "PRIMARY",
    "NOT",
    "NULL",
    "UNIQUE",
    "CHECK",
    "DEFAULT",
    "REFERENCES",
    "COLLATE",
    "GENERATED",
    "AS",
    "AUTOINCREMENT",
];

fn parse_column(
    src: &str,
    item: &[Token],
    text: TextMapping,
) -> Option<(ColumnDefinition, bool)> {
    let mut c = Cursor::new(src, item);
    let name = match c.peek()?.kind {
        TokenKind::String => {
            let raw = c.bump()?.text(src);
            raw.trim_matches('\'').to_string()
        }
        _ => c.ident()?,
    };

    let type_start = c.pos;
    while let Some(tok) = c.peek() {
        if tok.kind != TokenKind::Word
            || COLUMN_CONSTRAINT_KEYWORDS
                .iter()
                .any(|kw| tok.is_word(src, kw))
        {
            break;
        }
        c.pos += 1;
    }
    if c.pos > type_start {
        c.group();
    }
    let raw_type = render(src, &item[type_start..c.pos]);

    let mut column = ColumnDefinition {
        name,
        oracle_type: clamp_numeric_precision(&map_column_type(&raw_type, text)),
        raw_type,
        default: None,
        extra: Vec::new(),
        not_null: false,
        is_primary_key: false,
        is_identity: false,
        references: None,
    };
    let mut autoincrement = false;
    let mut pending_name: Option<String> = None;

    while let Some(tok) = c.peek() {
        if c.eat_word("CONSTRAINT") {
            pending_name = c.ident();
        } else if c.eat_words(&["PRIMARY", "KEY"]) {
            column.is_primary_key = true;
            let _ = c.eat_word("ASC") || c.eat_word("DESC");
            c.skip_conflict_clause();
            if c.eat_word("AUTOINCREMENT") {
                autoincrement = true;
            }
            pending_name = None;
        } else if c.eat_word("AUTOINCREMENT") {
            autoincrement = true;
        } else if c.eat_words(&["NOT", "NULL"]) {
            column.not_null = true;
            c.skip_conflict_clause();
            pending_name = None;
        } else if c.eat_word("NULL") {
            pending_name = None;
        } else if c.eat_word("UNIQUE") {
            c.skip_conflict_clause();
            column.extra.push(with_name(pending_name.take(), "UNIQUE".to_string()));
        } else if tok.is_word(src, "CHECK") {
            c.pos += 1;
            let group = c.group().unwrap_or_default();
            column
                .extra
                .push(with_name(pending_name.take(), format!("CHECK {}", render(src, group))));
        } else if c.eat_word("DEFAULT") {
            column.default = c.default_expr().map(|toks| oracle_default(&render(src, toks)));
        } else if c.eat_word("COLLATE") {
            c.pos += 1;
        } else if c.eat_word("REFERENCES") {
            let (ref_table, ref_columns, on_delete) = c.references_tail();
            column.references = Some(ColumnReference {
                name: pending_name.take(),
                ref_table,
                ref_columns,
                on_delete,
            });
        } else if c.eat_words(&["GENERATED", "BY", "DEFAULT", "AS", "IDENTITY"])
            || c.eat_words(&["GENERATED", "ALWAYS", "AS", "IDENTITY"])
        {
            column.is_identity = true;
        } else if let Some(expr) = c.computed_expr() {
            column
                .extra
                .push(format!("GENERATED ALWAYS AS {} VIRTUAL", render(src, expr)));
        } else {
            debug!(
                "Keeping unrecognized column clause '{}' on {}",
                tok.text(src),
                column.name
            );
            column.extra.push(tok.text(src).to_string());
            c.pos += 1;
        }
    }

    Some((column, autoincrement))
}

fn with_name(name: Option<String>, clause: String) -> String {
    match name {
        Some(n) => format!("CONSTRAINT {} {}", oracle_ident(&n), clause),
        None => clause,
    }
}

/// Map SQLite default expressions Oracle rejects.
pub(crate) fn oracle_default(expr: &str) -> String {
    let compact: String = expr
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_lowercase();
    match compact.trim_start_matches('(').trim_end_matches(')') {
        "datetime('now'" | "datetime('now','localtime'" => "SYSDATE".to_string(),
        "date('now'" | "date('now','localtime'" => "TRUNC(SYSDATE)".to_string(),
        _ => expr.to_string(),
    }
}

fn parse_table_constraint(src: &str, item: &[Token]) -> TableConstraint {
    let mut c = Cursor::new(src, item);
    let name = if c.eat_word("CONSTRAINT") { c.ident() } else { None };

    if c.eat_words(&["PRIMARY", "KEY"]) {
        let columns = c.group().map(|g| ident_list(src, g)).unwrap_or_default();
        return TableConstraint::PrimaryKey { name, columns };
    }

    if c.eat_words(&["FOREIGN", "KEY"]) {
        let columns = c.group().map(|g| ident_list(src, g)).unwrap_or_default();
        if c.eat_word("REFERENCES") {
            let (ref_table, ref_columns, on_delete) = c.references_tail();
            return TableConstraint::ForeignKey(ForeignKey {
                name,
                columns,
                ref_table,
                ref_columns,
                on_delete,
            });
        }
    }

    if c.eat_word("UNIQUE") {
        let group = c.group().unwrap_or_default();
        c.skip_conflict_clause();
        return TableConstraint::Other {
            name,
            body: format!("UNIQUE {}", render(src, group)),
        };
    }

    let rest = &item[c.pos..];
    warn_unsupported_tail(src, rest);
    TableConstraint::Other {
        name,
        body: render(src, rest),
    }
}

fn warn_unsupported_tail(src: &str, rest: &[Token]) {
    if rest.iter().any(|t| t.is_word(src, "CONFLICT")) {
        warn!("ON CONFLICT clause kept verbatim: {}", render(src, rest));
    }
}

/// Column names from a parenthesized list, ignoring `ASC`/`DESC`/`COLLATE`.
fn ident_list(src: &str, group: &[Token]) -> Vec<String> {
    let inner = match group.len() {
        0..=2 => return Vec::new(),
        n => &group[1..n - 1],
    };
    split_top_level(inner)
        .into_iter()
        .filter_map(|toks| toks.first().and_then(|t| t.ident(src)))
        .map(|s| unquote(s).to_string())
        .collect()
}

pub(crate) fn retain_key_columns(table: &mut TableDefinition) {
    let mut keys: HashSet<String> = table
        .primary_key_columns()
        .iter()
        .map(|c| canonical(c))
        .collect();
    for fk in table.foreign_keys() {
        keys.extend(fk.columns.iter().map(|c| canonical(c)));
    }

    if keys.is_empty() {
        debug!("Table {} has no key columns, keeping all columns", table.name);
        return;
    }

    table.columns.retain(|c| keys.contains(&canonical(&c.name)));
    table
        .constraints
        .retain(|c| !matches!(c, TableConstraint::Other { .. }));
}

/// Position-tracking reader over the tokens of one item.
struct Cursor<'a> {
    src: &'a str,
    tokens: &'a [Token],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(src: &'a str, tokens: &'a [Token]) -> Self {
        Self { src, tokens, pos: 0 }
    }

    fn peek(&self) -> Option<Token> {
        self.tokens.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<Token> {
        let tok = self.peek()?;
        self.pos += 1;
        Some(tok)
    }

    fn eat_word(&mut self, keyword: &str) -> bool {
        match self.peek() {
            Some(t) if t.is_word(self.src, keyword) => {
                self.pos += 1;
                true
            }
            _ => false,
        }
    }

    /// Consume the whole keyword sequence or nothing.
    fn eat_words(&mut self, keywords: &[&str]) -> bool {
        let matched = keywords.iter().enumerate().all(|(i, kw)| {
            self.tokens
                .get(self.pos + i)
                .is_some_and(|t| t.is_word(self.src, kw))
        });
        if matched {
            self.pos += keywords.len();
        }
        matched
    }

    fn eat_symbol(&mut self, symbol: &str) -> bool {
        match self.peek() {
            Some(t) if t.kind == TokenKind::Symbol && t.text(self.src) == symbol => {
                self.pos += 1;
                true
            }
            _ => false,
        }
    }

    fn ident(&mut self) -> Option<String> {
        let name = self.peek()?.ident(self.src)?.to_string();
        self.pos += 1;
        Some(name)
    }

    /// Consume a parenthesized group, parentheses included.
    fn group(&mut self) -> Option<&'a [Token]> {
        let tok = self.peek()?;
        if tok.kind != TokenKind::LParen {
            return None;
        }
        let close = matching_paren(self.tokens, self.pos)?;
        let group = &self.tokens[self.pos..=close];
        self.pos = close + 1;
        Some(group)
    }

    fn default_expr(&mut self) -> Option<&'a [Token]> {
        let start = self.pos;
        if self.group().is_some() {
            return Some(&self.tokens[start..self.pos]);
        }
        if self.eat_symbol("-") || self.eat_symbol("+") {
            self.bump()?;
            return Some(&self.tokens[start..self.pos]);
        }
        self.bump()?;
        Some(&self.tokens[start..self.pos])
    }

    /// `[GENERATED ALWAYS] AS (expr) [STORED|VIRTUAL]`; consumes nothing on mismatch.
    fn computed_expr(&mut self) -> Option<&'a [Token]> {
        let start = self.pos;
        self.eat_words(&["GENERATED", "ALWAYS"]);
        if self.eat_word("AS") {
            if let Some(group) = self.group() {
                let _ = self.eat_word("STORED") || self.eat_word("VIRTUAL");
                return Some(group);
            }
        }
        self.pos = start;
        None
    }

    fn skip_conflict_clause(&mut self) {
        if self.eat_words(&["ON", "CONFLICT"]) {
            self.pos += 1;
        }
    }

    /// Parse what follows `REFERENCES`: table, optional columns and actions.
    ///
    /// `ON UPDATE` actions are dropped. `ON DELETE CASCADE` and
    /// `ON DELETE SET NULL` are kept; the other delete actions match
    /// Oracle's default behaviour and are dropped.
    fn references_tail(&mut self) -> (String, Vec<String>, Option<String>) {
        let mut table = self.ident().unwrap_or_default();
        if self.eat_symbol(".") {
            table = self.ident().unwrap_or(table);
        }
        let columns = self
            .group()
            .map(|g| ident_list(self.src, g))
            .unwrap_or_default();

        let mut on_delete = None;
        loop {
            if self.eat_words(&["ON", "DELETE"]) {
                on_delete = self.action();
            } else if self.eat_words(&["ON", "UPDATE"]) {
                let dropped = self.action();
                debug!("Dropping ON UPDATE {:?} on reference to {}", dropped, table);
            } else if self.eat_word("MATCH") {
                self.pos += 1;
            } else if self.eat_words(&["NOT", "DEFERRABLE"]) || self.eat_word("DEFERRABLE") {
                let _ = self.eat_words(&["INITIALLY", "DEFERRED"])
                    || self.eat_words(&["INITIALLY", "IMMEDIATE"]);
            } else {
                break;
            }
        }
        (table, columns, on_delete)
    }

    fn action(&mut self) -> Option<String> {
        if self.eat_word("CASCADE") {
            Some("CASCADE".to_string())
        } else if self.eat_words(&["SET", "NULL"]) {
            Some("SET NULL".to_string())
        } else {
            let _ = self.eat_words(&["SET", "DEFAULT"])
                || self.eat_words(&["NO", "ACTION"])
                || self.eat_word("RESTRICT");
            None
        }
    }
}
