//! Literal repairs applied to INSERT statements before execution.
//!
//! Edits are made on token boundaries, so text inside string literals is
//! never touched except when the whole literal is an ISO date.

use std::borrow::Cow;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::dialect::tokenizer::{tokenize, Token, TokenKind};

static ISO_DATETIME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2}$").expect("valid regex")
});

static ISO_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("valid regex"));

/// Rewrite ISO date/datetime string literals as `TO_DATE(...)` and quote
/// bare `0`/`1` values so they also load into character columns.
pub fn repair_insert(sql: &str) -> Cow<'_, str> {
    let tokens = tokenize(sql);
    let mut edits = Vec::new();

    for (i, tok) in tokens.iter().enumerate() {
        match tok.kind {
            TokenKind::String => {
                let text = tok.text(sql);
                let inner = &text[1..text.len().saturating_sub(1).max(1)];
                if ISO_DATETIME.is_match(inner) {
                    edits.push((tok, format!("TO_DATE('{}', 'YYYY-MM-DD HH24:MI:SS')", inner)));
                } else if ISO_DATE.is_match(inner) {
                    edits.push((tok, format!("TO_DATE('{}', 'YYYY-MM-DD')", inner)));
                }
            }
            TokenKind::Word if is_value_slot(&tokens, i) => {
                let text = tok.text(sql);
                if text == "0" || text == "1" {
                    edits.push((tok, format!("'{}'", text)));
                }
            }
            _ => {}
        }
    }

    apply(sql, edits)
}

/// Replace every bare `NULL` value with `''`. Returns `None` when there is
/// nothing to replace.
pub fn null_to_empty(sql: &str) -> Option<String> {
    let tokens = tokenize(sql);
    let edits: Vec<(&Token, String)> = tokens
        .iter()
        .enumerate()
        .filter(|(i, tok)| tok.is_word(sql, "NULL") && is_value_slot(&tokens, *i))
        .map(|(_, tok)| (tok, "''".to_string()))
        .collect();

    if edits.is_empty() {
        return None;
    }
    Some(apply(sql, edits).into_owned())
}

/// A token standing alone between `(`/`,` and `,`/`)`.
fn is_value_slot(tokens: &[Token], i: usize) -> bool {
    let before = i
        .checked_sub(1)
        .and_then(|p| tokens.get(p))
        .is_some_and(|t| matches!(t.kind, TokenKind::LParen | TokenKind::Comma));
    let after = tokens
        .get(i + 1)
        .is_some_and(|t| matches!(t.kind, TokenKind::RParen | TokenKind::Comma));
    before && after
}

fn apply<'a>(sql: &'a str, edits: Vec<(&Token, String)>) -> Cow<'a, str> {
    if edits.is_empty() {
        return Cow::Borrowed(sql);
    }
    let mut out = String::with_capacity(sql.len() + edits.len() * 32);
    let mut last = 0;
    for (tok, replacement) in edits {
        out.push_str(&sql[last..tok.start]);
        out.push_str(&replacement);
        last = tok.end;
    }
    out.push_str(&sql[last..]);
    Cow::Owned(out)
}
