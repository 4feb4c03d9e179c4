//! SQLite to Oracle statement rewriting.
//!
//! - [`tokenizer`]: quote-aware tokens shared by every parser here
//! - [`create_table`]: CREATE TABLE parser and Oracle DDL rewriter
//! - [`insert`]: INSERT literal parser and sanitizing re-emitter
//!
//! [`split_statements`] is the one statement splitter used by both the dump
//! converter and the executor.

pub mod create_table;
pub mod insert;
pub mod tokenizer;

pub use create_table::{parse_create_table, rewrite_create_table, CreateTable};
pub use insert::{insert_target, parse_insert, InsertStatement};

use crate::core::ForeignKey;
use crate::typemap::TextMapping;
use tokenizer::tokenize;

/// Coarse statement classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    CreateTable,
    Insert,
    Other,
}

/// Classify a statement by its leading keywords.
pub fn classify(sql: &str) -> StatementKind {
    let tokens = tokenize(sql);
    let word = |i: usize, kw: &str| tokens.get(i).is_some_and(|t| t.is_word(sql, kw));

    if word(0, "INSERT") {
        return StatementKind::Insert;
    }
    if word(0, "CREATE")
        && (word(1, "TABLE") || ((word(1, "TEMP") || word(1, "TEMPORARY")) && word(2, "TABLE")))
    {
        return StatementKind::CreateTable;
    }
    StatementKind::Other
}

/// Split a script into statements on `;` outside quotes and comments.
///
/// Comments are dropped, statements are trimmed and returned without the
/// terminating `;`. A `CREATE TRIGGER` body runs to its closing `END;`.
pub fn split_statements(script: &str) -> Vec<String> {
    #[derive(PartialEq)]
    enum State {
        Normal,
        Quoted(char),
        LineComment,
        BlockComment,
    }

    let mut statements = Vec::new();
    let mut current = String::new();
    let mut state = State::Normal;
    let mut chars = script.chars().peekable();

    while let Some(c) = chars.next() {
        match state {
            State::Normal => match c {
                '\'' | '"' | '`' => {
                    state = State::Quoted(c);
                    current.push(c);
                }
                '[' => {
                    state = State::Quoted(']');
                    current.push(c);
                }
                '-' if chars.peek() == Some(&'-') => {
                    chars.next();
                    state = State::LineComment;
                }
                '/' if chars.peek() == Some(&'*') => {
                    chars.next();
                    state = State::BlockComment;
                }
                ';' => {
                    let candidate = current.trim();
                    if is_open_trigger(candidate) {
                        current.push(c);
                    } else {
                        if !candidate.is_empty() {
                            statements.push(candidate.to_string());
                        }
                        current.clear();
                    }
                }
                _ => current.push(c),
            },
            State::Quoted(close) => {
                current.push(c);
                if c == close {
                    // A doubled quote is an escape and keeps us inside.
                    if close != ']' && chars.peek() == Some(&close) {
                        current.push(close);
                        chars.next();
                    } else {
                        state = State::Normal;
                    }
                }
            }
            State::LineComment => {
                if c == '\n' {
                    current.push('\n');
                    state = State::Normal;
                }
            }
            State::BlockComment => {
                if c == '*' && chars.peek() == Some(&'/') {
                    chars.next();
                    current.push(' ');
                    state = State::Normal;
                }
            }
        }
    }

    let rest = current.trim();
    if !rest.is_empty() {
        statements.push(rest.to_string());
    }
    statements
}

/// A trigger whose body has not reached `END` yet.
fn is_open_trigger(candidate: &str) -> bool {
    let mut words = candidate.split_whitespace();
    if !words.next().is_some_and(|w| w.eq_ignore_ascii_case("CREATE")) {
        return false;
    }
    let is_trigger = words
        .take(3)
        .any(|w| w.eq_ignore_ascii_case("TRIGGER"));
    let ended = candidate
        .rsplit(|c: char| c.is_whitespace() || c == ';')
        .find(|w| !w.is_empty())
        .is_some_and(|w| w.eq_ignore_ascii_case("END"));
    is_trigger && !ended
}

/// Table an index or trigger is defined on: the name after the first `ON`,
/// without any schema prefix.
pub fn attached_table(sql: &str) -> Option<String> {
    let tokens = tokenize(sql);
    let on = tokens.iter().position(|t| t.is_word(sql, "ON"))?;
    let mut name = tokens.get(on + 1)?.ident(sql)?;
    if tokens.get(on + 2).is_some_and(|t| t.text(sql) == ".") {
        name = tokens.get(on + 3)?.ident(sql)?;
    }
    Some(name.to_string())
}

/// Remove every foreign key from a CREATE TABLE statement.
///
/// Returns the rewritten DDL and the removed keys. Statements that do not
/// parse are returned unchanged with no keys.
pub fn strip_foreign_keys(ddl: &str) -> (String, Vec<ForeignKey>) {
    match parse_create_table(ddl, TextMapping::Varchar2) {
        Some(table) => {
            let (stripped, removed) = table.without_foreign_keys();
            (stripped.to_sql(), removed)
        }
        None => (ddl.to_string(), Vec::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_respects_quotes() {
        let script = "INSERT INTO t VALUES ('a;b');\nINSERT INTO t VALUES ('it''s; ok');";
        assert_eq!(
            split_statements(script),
            vec![
                "INSERT INTO t VALUES ('a;b')".to_string(),
                "INSERT INTO t VALUES ('it''s; ok')".to_string()
            ]
        );
    }

    #[test]
    fn test_split_drops_comments_and_blanks() {
        let script = "-- header; comment\nCREATE TABLE a (x INT); /* b; */ ;\n\nSELECT 1";
        assert_eq!(
            split_statements(script),
            vec!["CREATE TABLE a (x INT)".to_string(), "SELECT 1".to_string()]
        );
    }

    #[test]
    fn test_split_keeps_trigger_body() {
        let script = "CREATE TRIGGER trg AFTER INSERT ON t BEGIN UPDATE t SET a = 1; END;\nSELECT 2;";
        let stmts = split_statements(script);
        assert_eq!(stmts.len(), 2);
        assert!(stmts[0].ends_with("END"));
    }

    #[test]
    fn test_split_multiline_statement() {
        let script = "CREATE TABLE t (\n  a INT,\n  b TEXT\n);\n";
        assert_eq!(split_statements(script), vec!["CREATE TABLE t (\n  a INT,\n  b TEXT\n)"]);
    }

    #[test]
    fn test_classify() {
        assert_eq!(classify("CREATE TABLE t (a INT)"), StatementKind::CreateTable);
        assert_eq!(classify("create temp table t (a INT)"), StatementKind::CreateTable);
        assert_eq!(classify("INSERT INTO t VALUES (1)"), StatementKind::Insert);
        assert_eq!(classify("CREATE INDEX i ON t (a)"), StatementKind::Other);
    }

    #[test]
    fn test_attached_table() {
        assert_eq!(attached_table("CREATE INDEX i ON orders (a)").as_deref(), Some("orders"));
        assert_eq!(
            attached_table("CREATE UNIQUE INDEX i ON main.\"Order Lines\" (a)").as_deref(),
            Some("Order Lines")
        );
        assert_eq!(
            attached_table("CREATE TRIGGER trg AFTER INSERT ON t BEGIN NULL; END").as_deref(),
            Some("t")
        );
        assert_eq!(attached_table("CREATE VIEW v AS SELECT 1 FROM t"), None);
    }

    #[test]
    fn test_strip_foreign_keys() {
        let ddl = "CREATE TABLE child (\n  id NUMBER PRIMARY KEY,\n  \
                   parent_id NUMBER REFERENCES parent (id),\n  \
                   CONSTRAINT fk_other FOREIGN KEY (id) REFERENCES other (id)\n);";
        let (stripped, removed) = strip_foreign_keys(ddl);
        assert_eq!(
            stripped,
            "CREATE TABLE child (\n  id NUMBER PRIMARY KEY,\n  parent_id NUMBER\n);"
        );
        assert_eq!(removed.len(), 2);
        assert_eq!(removed[0].name.as_deref(), Some("fk_other"));
        assert_eq!(removed[1].ref_table, "parent");
    }

    #[test]
    fn test_strip_foreign_keys_unparsable() {
        let (out, removed) = strip_foreign_keys("CREATE VIEW v AS SELECT 1");
        assert_eq!(out, "CREATE VIEW v AS SELECT 1");
        assert!(removed.is_empty());
    }
}
