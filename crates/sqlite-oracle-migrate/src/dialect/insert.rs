//! INSERT statement parsing and re-emission.
//!
//! Only the shape SQLite dumps produce is recognized:
//! `INSERT [OR <action>] INTO <table> [(<cols>)] VALUES (<literals>)[, (...)]`.
//! Each literal becomes a [`SqlValue`] and is re-rendered with
//! [`sanitize_literal`], so Oracle sees one clean single-row INSERT per tuple.

use std::borrow::Cow;

use tracing::debug;

use super::tokenizer::{matching_paren, split_top_level, tokenize, Token, TokenKind};
use crate::core::identifier::oracle_ident;
use crate::core::SqlValue;
use crate::typemap::sanitize_literal;

/// A parsed INSERT statement.
#[derive(Debug, Clone, PartialEq)]
pub struct InsertStatement<'a> {
    /// Target table, without quoting.
    pub table: String,

    /// Explicit column list, if present.
    pub columns: Option<Vec<String>>,

    /// One entry per VALUES tuple.
    pub rows: Vec<Vec<SqlValue<'a>>>,
}

impl InsertStatement<'_> {
    /// Render one sanitized `INSERT ... VALUES (...);` per row.
    pub fn to_statements(&self) -> Vec<String> {
        let head = match &self.columns {
            Some(cols) => format!(
                "INSERT INTO {} ({})",
                oracle_ident(&self.table),
                cols.iter()
                    .map(|c| oracle_ident(c))
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
            None => format!("INSERT INTO {}", oracle_ident(&self.table)),
        };

        self.rows
            .iter()
            .map(|row| {
                let values: Vec<String> = row.iter().map(sanitize_literal).collect();
                format!("{} VALUES ({});", head, values.join(", "))
            })
            .collect()
    }
}

/// Table name of an `INSERT INTO` statement, even when the rest does not parse.
pub fn insert_target(sql: &str) -> Option<String> {
    let tokens = tokenize(sql);
    parse_head(sql, &tokens).map(|(table, _)| table)
}

/// Parse an INSERT statement. Returns `None` for any other shape.
pub fn parse_insert(sql: &str) -> Option<InsertStatement<'_>> {
    let tokens = tokenize(sql);
    let (table, mut pos) = parse_head(sql, &tokens)?;

    let mut columns = None;
    if tokens.get(pos)?.kind == TokenKind::LParen {
        let close = matching_paren(&tokens, pos)?;
        let names = split_top_level(&tokens[pos + 1..close])
            .into_iter()
            .map(|item| match item {
                [tok] => tok.ident(sql).map(str::to_string),
                _ => None,
            })
            .collect::<Option<Vec<_>>>()?;
        columns = Some(names);
        pos = close + 1;
    }

    if !tokens.get(pos)?.is_word(sql, "VALUES") {
        return None;
    }
    pos += 1;

    let mut rows = Vec::new();
    loop {
        let tok = tokens.get(pos)?;
        if tok.kind != TokenKind::LParen {
            return None;
        }
        let close = matching_paren(&tokens, pos)?;
        let row = split_top_level(&tokens[pos + 1..close])
            .into_iter()
            .map(|item| parse_value(sql, item))
            .collect::<Option<Vec<_>>>()?;
        rows.push(row);
        pos = close + 1;

        match tokens.get(pos).map(|t| t.kind) {
            Some(TokenKind::Comma) => pos += 1,
            Some(TokenKind::Semicolon) | None => break,
            Some(_) => return None,
        }
    }

    if tokens[pos..]
        .iter()
        .any(|t| t.kind != TokenKind::Semicolon)
    {
        return None;
    }

    Some(InsertStatement {
        table,
        columns,
        rows,
    })
}

/// `INSERT [OR x] INTO [schema.]table`; returns the table and next position.
fn parse_head(src: &str, tokens: &[Token]) -> Option<(String, usize)> {
    let mut pos = 0;
    if !tokens.get(pos)?.is_word(src, "INSERT") {
        return None;
    }
    pos += 1;
    if tokens.get(pos)?.is_word(src, "OR") {
        pos += 2;
    }
    if !tokens.get(pos)?.is_word(src, "INTO") {
        return None;
    }
    pos += 1;

    let mut table = tokens.get(pos)?.ident(src)?;
    pos += 1;
    if let Some(dot) = tokens.get(pos) {
        if dot.kind == TokenKind::Symbol && dot.text(src) == "." {
            table = tokens.get(pos + 1)?.ident(src)?;
            pos += 2;
        }
    }
    Some((table.to_string(), pos))
}

/// Convert the tokens of one literal into a value.
fn parse_value<'a>(src: &'a str, tokens: &[Token]) -> Option<SqlValue<'a>> {
    match tokens {
        [tok] => match tok.kind {
            TokenKind::String => Some(SqlValue::Text(unescape(tok.text(src)))),
            TokenKind::Word => parse_word(tok.text(src)),
            _ => None,
        },
        [sign, num] if sign.kind == TokenKind::Symbol && num.kind == TokenKind::Word => {
            let negate = match sign.text(src) {
                "-" => true,
                "+" => false,
                _ => return None,
            };
            match parse_word(num.text(src))? {
                SqlValue::Integer(v) if negate => v.checked_neg().map(SqlValue::Integer),
                SqlValue::Real(v) if negate => Some(SqlValue::Real(-v)),
                v @ (SqlValue::Integer(_) | SqlValue::Real(_)) => Some(v),
                _ => None,
            }
        }
        [x, blob]
            if x.kind == TokenKind::Word
                && x.text(src).eq_ignore_ascii_case("x")
                && blob.kind == TokenKind::String
                && x.end == blob.start =>
        {
            debug!("BLOB literal replaced by NULL");
            Some(SqlValue::Null)
        }
        [func, ..] if func.is_word(src, "replace") => parse_replace(src, tokens),
        _ => None,
    }
}

fn parse_word(text: &str) -> Option<SqlValue<'static>> {
    if text.eq_ignore_ascii_case("NULL") {
        return Some(SqlValue::Null);
    }
    if text.eq_ignore_ascii_case("TRUE") {
        return Some(SqlValue::Bool(true));
    }
    if text.eq_ignore_ascii_case("FALSE") {
        return Some(SqlValue::Bool(false));
    }
    if !text.starts_with(|c: char| c.is_ascii_digit()) {
        return None;
    }
    if let Ok(v) = text.parse::<i64>() {
        return Some(SqlValue::Integer(v));
    }
    text.parse::<f64>().ok().map(SqlValue::Real)
}

/// Strip the wrapping quotes and collapse doubled quotes.
fn unescape(literal: &str) -> Cow<'_, str> {
    let inner = literal
        .strip_prefix('\'')
        .map(|s| s.strip_suffix('\'').unwrap_or(s))
        .unwrap_or(literal);
    if inner.contains("''") {
        Cow::Owned(inner.replace("''", "'"))
    } else {
        Cow::Borrowed(inner)
    }
}

/// `replace(<text>, '<needle>', char(<n>))`, which `sqlite3 .dump` emits for
/// strings containing newlines.
fn parse_replace<'a>(src: &'a str, tokens: &[Token]) -> Option<SqlValue<'a>> {
    if tokens.get(1)?.kind != TokenKind::LParen {
        return None;
    }
    let close = matching_paren(tokens, 1)?;
    if close != tokens.len() - 1 {
        return None;
    }
    let args = split_top_level(&tokens[2..close]);
    let [haystack, needle, replacement] = args[..] else {
        return None;
    };

    let haystack = match parse_value(src, haystack)? {
        SqlValue::Text(t) => t,
        _ => return None,
    };
    let needle = match needle {
        [tok] if tok.kind == TokenKind::String => unescape(tok.text(src)),
        _ => return None,
    };
    let replacement = parse_char_call(src, replacement)?;
    Some(SqlValue::Text(Cow::Owned(
        haystack.replace(needle.as_ref(), &replacement),
    )))
}

fn parse_char_call(src: &str, tokens: &[Token]) -> Option<String> {
    match tokens {
        [func, open, code, close]
            if (func.is_word(src, "char") || func.is_word(src, "chr"))
                && open.kind == TokenKind::LParen
                && close.kind == TokenKind::RParen =>
        {
            let code = code.text(src).parse::<u32>().ok()?;
            char::from_u32(code).map(String::from)
        }
        _ => None,
    }
}
