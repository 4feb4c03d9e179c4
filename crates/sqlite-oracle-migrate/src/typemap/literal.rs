//! Rendering SQLite values as Oracle SQL literals.

use crate::core::SqlValue;

/// Render a value as an Oracle literal.
///
/// Strings have `'` doubled, NUL bytes removed, CR/LF replaced by spaces and
/// `;` escaped so line-oriented tools never see a statement terminator inside
/// a literal. Booleans become the quoted strings `'1'`/`'0'`.
pub fn sanitize_literal(value: &SqlValue<'_>) -> String {
    match value {
        SqlValue::Null => "NULL".to_string(),
        SqlValue::Integer(v) => v.to_string(),
        SqlValue::Real(v) if v.is_finite() => v.to_string(),
        SqlValue::Real(_) => "NULL".to_string(),
        SqlValue::Bool(true) => "'1'".to_string(),
        SqlValue::Bool(false) => "'0'".to_string(),
        SqlValue::Text(s) => quote_text(s),
        SqlValue::Bytes(b) => quote_text(&String::from_utf8_lossy(b)),
    }
}

fn quote_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for c in s.chars() {
        match c {
            '\'' => out.push_str("''"),
            '\0' => {}
            '\r' | '\n' => out.push(' '),
            ';' => out.push_str("\\;"),
            _ => out.push(c),
        }
    }
    out.push('\'');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::borrow::Cow;

    #[test]
    fn test_null_and_numbers() {
        assert_eq!(sanitize_literal(&SqlValue::Null), "NULL");
        assert_eq!(sanitize_literal(&SqlValue::Integer(-42)), "-42");
        assert_eq!(sanitize_literal(&SqlValue::Real(3.25)), "3.25");
        assert_eq!(sanitize_literal(&SqlValue::Real(f64::NAN)), "NULL");
    }

    #[test]
    fn test_booleans_are_quoted() {
        assert_eq!(sanitize_literal(&SqlValue::Bool(true)), "'1'");
        assert_eq!(sanitize_literal(&SqlValue::Bool(false)), "'0'");
    }

    #[test]
    fn test_plain_string_only_gets_quoted() {
        assert_eq!(sanitize_literal(&SqlValue::text("hello world")), "'hello world'");
        assert_eq!(sanitize_literal(&SqlValue::text("")), "''");
    }

    #[test]
    fn test_quotes_are_doubled() {
        let out = sanitize_literal(&SqlValue::text("O'Brien's"));
        assert_eq!(out, "'O''Brien''s'");

        // Inside the wrapping quotes every quote must come in a pair.
        let inner = &out[1..out.len() - 1];
        assert_eq!(inner.replace("''", "").matches('\'').count(), 0);
    }

    #[test]
    fn test_control_characters() {
        let value = SqlValue::Text(Cow::Owned("a\0b\r\nc".to_string()));
        assert_eq!(sanitize_literal(&value), "'ab  c'");
    }

    #[test]
    fn test_semicolon_escaped() {
        assert_eq!(sanitize_literal(&SqlValue::text("a;b")), "'a\\;b'");
    }

    #[test]
    fn test_bytes_use_string_path() {
        let value = SqlValue::Bytes(Cow::Borrowed(b"it's"));
        assert_eq!(sanitize_literal(&value), "'it''s'");
    }
}
