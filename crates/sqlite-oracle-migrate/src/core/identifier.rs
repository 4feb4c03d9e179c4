//! Identifier handling between SQLite and Oracle.
//!
//! SQLite accepts `"x"`, `` `x` `` and `[x]` quoting and is case-insensitive
//! for unquoted names. Oracle folds unquoted names to upper case. Generated
//! statements therefore emit simple names bare and quote (upper-cased) only
//! names Oracle would otherwise reject, so both forms resolve to the same
//! object.

/// Longest identifier accepted by Oracle releases before 12.2.
pub const MAX_ORACLE_IDENTIFIER_LENGTH: usize = 30;

/// Words Oracle rejects as bare identifiers that commonly appear as
/// SQLite column names.
const RESERVED_WORDS: &[&str] = &[
    "ACCESS", "ADD", "ALL", "ALTER", "AND", "ANY", "AS", "ASC", "AUDIT", "BETWEEN", "BY",
    "CHAR", "CHECK", "CLUSTER", "COLUMN", "COMMENT", "COMPRESS", "CONNECT", "CREATE",
    "CURRENT", "DATE", "DECIMAL", "DEFAULT", "DELETE", "DESC", "DISTINCT", "DROP", "ELSE",
    "EXCLUSIVE", "EXISTS", "FILE", "FLOAT", "FOR", "FROM", "GRANT", "GROUP", "HAVING",
    "IDENTIFIED", "IMMEDIATE", "IN", "INCREMENT", "INDEX", "INITIAL", "INSERT", "INTEGER",
    "INTERSECT", "INTO", "IS", "LEVEL", "LIKE", "LOCK", "LONG", "MAXEXTENTS", "MINUS",
    "MODE", "MODIFY", "NOAUDIT", "NOCOMPRESS", "NOT", "NOWAIT", "NULL", "NUMBER", "OF",
    "OFFLINE", "ON", "ONLINE", "OPTION", "OR", "ORDER", "PCTFREE", "PRIOR", "PUBLIC",
    "RAW", "RENAME", "RESOURCE", "REVOKE", "ROW", "ROWID", "ROWNUM", "ROWS", "SELECT",
    "SESSION", "SET", "SHARE", "SIZE", "SMALLINT", "START", "SUCCESSFUL", "SYNONYM",
    "SYSDATE", "TABLE", "THEN", "TO", "TRIGGER", "UID", "UNION", "UNIQUE", "UPDATE", "USER",
    "VALIDATE", "VALUES", "VARCHAR", "VARCHAR2", "VIEW", "WHENEVER", "WHERE", "WITH",
];

/// Strip SQLite identifier quoting from a single name.
pub fn unquote(name: &str) -> &str {
    let name = name.trim();
    let bytes = name.as_bytes();
    if bytes.len() >= 2 {
        let (first, last) = (bytes[0], bytes[bytes.len() - 1]);
        if (first == b'"' && last == b'"')
            || (first == b'`' && last == b'`')
            || (first == b'[' && last == b']')
        {
            return &name[1..name.len() - 1];
        }
    }
    name
}

/// Canonical lookup key for a table or column name.
pub fn canonical(name: &str) -> String {
    unquote(name).to_lowercase()
}

/// Whether Oracle accepts the name without quoting.
pub fn is_plain(name: &str) -> bool {
    let mut chars = name.chars();
    let starts_alpha = chars.next().is_some_and(|c| c.is_ascii_alphabetic());
    starts_alpha
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$' || c == '#')
        && !RESERVED_WORDS.contains(&name.to_uppercase().as_str())
}

/// Render a name for use in generated Oracle SQL.
pub fn oracle_ident(name: &str) -> String {
    let name = unquote(name);
    if is_plain(name) {
        name.to_string()
    } else {
        format!("\"{}\"", name.to_uppercase().replace('"', "\"\""))
    }
}

/// Upper-cased name as Oracle stores it in the data dictionary.
pub fn dictionary_name(name: &str) -> String {
    unquote(name).to_uppercase()
}

/// Truncate a generated identifier to Oracle's length limit.
pub fn truncate_ident(name: &str) -> String {
    name.chars().take(MAX_ORACLE_IDENTIFIER_LENGTH).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unquote_styles() {
        assert_eq!(unquote("\"users\""), "users");
        assert_eq!(unquote("`users`"), "users");
        assert_eq!(unquote("[users]"), "users");
        assert_eq!(unquote(" users "), "users");
        assert_eq!(unquote("\""), "\"");
    }

    #[test]
    fn test_oracle_ident_plain_names_stay_bare() {
        assert_eq!(oracle_ident("users"), "users");
        assert_eq!(oracle_ident("\"Order_Items\""), "Order_Items");
    }

    #[test]
    fn test_oracle_ident_quotes_reserved_and_odd_names() {
        assert_eq!(oracle_ident("date"), "\"DATE\"");
        assert_eq!(oracle_ident("[order]"), "\"ORDER\"");
        assert_eq!(oracle_ident("my table"), "\"MY TABLE\"");
        assert_eq!(oracle_ident("1st"), "\"1ST\"");
    }

    #[test]
    fn test_dictionary_name_matches_oracle_folding() {
        assert_eq!(dictionary_name("`Users`"), "USERS");
        assert_eq!(dictionary_name("date"), "DATE");
    }

    #[test]
    fn test_truncate_ident() {
        let long = "fk_order_items_product_id_products_id";
        assert_eq!(truncate_ident(long).len(), MAX_ORACLE_IDENTIFIER_LENGTH);
        assert_eq!(truncate_ident("short"), "short");
    }
}
