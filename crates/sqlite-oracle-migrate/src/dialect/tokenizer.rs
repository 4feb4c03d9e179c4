//! SQL tokenizer for the subset of SQLite found in dumps.
//!
//! Tokens are spans into the source text. String literals and quoted
//! identifiers are single tokens, so commas, parentheses and semicolons inside
//! them never affect structure. Comments are dropped.

use crate::core::identifier::{oracle_ident, unquote};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Keyword, bare identifier or number.
    Word,
    /// `"x"`, `` `x` `` or `[x]`.
    QuotedIdent,
    /// `'...'` string literal, quotes included.
    String,
    LParen,
    RParen,
    Comma,
    Semicolon,
    /// Any other punctuation (`.`, `=`, `-`, ...).
    Symbol,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub start: usize,
    pub end: usize,
}

impl Token {
    pub fn text<'a>(&self, src: &'a str) -> &'a str {
        &src[self.start..self.end]
    }

    /// Case-insensitive keyword match on a `Word` token.
    pub fn is_word(&self, src: &str, keyword: &str) -> bool {
        self.kind == TokenKind::Word && self.text(src).eq_ignore_ascii_case(keyword)
    }

    /// Identifier value for `Word` and `QuotedIdent` tokens.
    pub fn ident<'a>(&self, src: &'a str) -> Option<&'a str> {
        match self.kind {
            TokenKind::Word => Some(self.text(src)),
            TokenKind::QuotedIdent => Some(unquote(self.text(src))),
            _ => None,
        }
    }
}

/// Tokenize `src`. Unterminated strings and quoted identifiers run to the end
/// of the input.
pub fn tokenize(src: &str) -> Vec<Token> {
    let bytes = src.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        let start = i;

        if b.is_ascii_whitespace() {
            i += 1;
            continue;
        }

        if b == b'-' && bytes.get(i + 1) == Some(&b'-') {
            while i < bytes.len() && bytes[i] != b'\n' {
                i += 1;
            }
            continue;
        }

        if b == b'/' && bytes.get(i + 1) == Some(&b'*') {
            i = match src[i + 2..].find("*/") {
                Some(off) => i + 2 + off + 2,
                None => bytes.len(),
            };
            continue;
        }

        let kind = match b {
            b'\'' => {
                i = scan_quoted(bytes, i, b'\'');
                TokenKind::String
            }
            b'"' | b'`' => {
                i = scan_quoted(bytes, i, b);
                TokenKind::QuotedIdent
            }
            b'[' => {
                i = match src[i..].find(']') {
                    Some(off) => i + off + 1,
                    None => bytes.len(),
                };
                TokenKind::QuotedIdent
            }
            b'(' => {
                i += 1;
                TokenKind::LParen
            }
            b')' => {
                i += 1;
                TokenKind::RParen
            }
            b',' => {
                i += 1;
                TokenKind::Comma
            }
            b';' => {
                i += 1;
                TokenKind::Semicolon
            }
            b'0'..=b'9' => {
                while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'.') {
                    // exponent sign: 1e-5
                    if (bytes[i] == b'e' || bytes[i] == b'E')
                        && matches!(bytes.get(i + 1), Some(b'-') | Some(b'+'))
                    {
                        i += 1;
                    }
                    i += 1;
                }
                TokenKind::Word
            }
            _ if is_word_byte(b) => {
                while i < bytes.len() && is_word_byte(bytes[i]) {
                    i += 1;
                }
                TokenKind::Word
            }
            _ => {
                // Advance a full UTF-8 character.
                i += src[i..].chars().next().map_or(1, char::len_utf8);
                TokenKind::Symbol
            }
        };

        tokens.push(Token {
            kind,
            start,
            end: i,
        });
    }

    tokens
}

fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'$' || b == b'#' || b >= 0x80
}

/// Scan a quoted run starting at `start`; a doubled quote is an escape.
fn scan_quoted(bytes: &[u8], start: usize, quote: u8) -> usize {
    let mut i = start + 1;
    while i < bytes.len() {
        if bytes[i] == quote {
            if bytes.get(i + 1) == Some(&quote) {
                i += 2;
                continue;
            }
            return i + 1;
        }
        i += 1;
    }
    bytes.len()
}

/// Index of the `RParen` matching the `LParen` at `open`.
pub fn matching_paren(tokens: &[Token], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (i, tok) in tokens.iter().enumerate().skip(open) {
        match tok.kind {
            TokenKind::LParen => depth += 1,
            TokenKind::RParen => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Split a token slice on depth-0 commas. Empty items are dropped.
pub fn split_top_level(tokens: &[Token]) -> Vec<&[Token]> {
    let mut items = Vec::new();
    let mut depth = 0i32;
    let mut item_start = 0;

    for (i, tok) in tokens.iter().enumerate() {
        match tok.kind {
            TokenKind::LParen => depth += 1,
            TokenKind::RParen => depth -= 1,
            TokenKind::Comma if depth == 0 => {
                if i > item_start {
                    items.push(&tokens[item_start..i]);
                }
                item_start = i + 1;
            }
            _ => {}
        }
    }
    if tokens.len() > item_start {
        items.push(&tokens[item_start..]);
    }
    items
}

/// Re-render tokens as Oracle text.
///
/// Whitespace between tokens collapses to one space, quoted identifiers are
/// re-quoted for Oracle, and everything else is copied from the source.
pub fn render(src: &str, tokens: &[Token]) -> String {
    let mut out = String::new();
    let mut prev_end: Option<usize> = None;

    for tok in tokens {
        if let Some(end) = prev_end {
            if end < tok.start {
                out.push(' ');
            }
        }
        match tok.kind {
            TokenKind::QuotedIdent => out.push_str(&oracle_ident(tok.text(src))),
            _ => out.push_str(tok.text(src)),
        }
        prev_end = Some(tok.end);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        tokenize(src).iter().map(|t| t.kind).collect()
    }

    fn texts(src: &str) -> Vec<&str> {
        tokenize(src).iter().map(|t| t.text(src)).collect()
    }

    #[test]
    fn test_basic_tokens() {
        assert_eq!(
            texts("CREATE TABLE t (a INTEGER, b TEXT);"),
            vec!["CREATE", "TABLE", "t", "(", "a", "INTEGER", ",", "b", "TEXT", ")", ";"]
        );
    }

    #[test]
    fn test_strings_hide_punctuation() {
        let src = "VALUES ('a,b;(c)', 'it''s')";
        assert_eq!(
            kinds(src),
            vec![
                TokenKind::Word,
                TokenKind::LParen,
                TokenKind::String,
                TokenKind::Comma,
                TokenKind::String,
                TokenKind::RParen
            ]
        );
        assert_eq!(texts(src)[4], "'it''s'");
    }

    #[test]
    fn test_quoted_identifiers() {
        let src = "\"my col\" `other` [third]";
        let tokens = tokenize(src);
        assert!(tokens.iter().all(|t| t.kind == TokenKind::QuotedIdent));
        assert_eq!(tokens[0].ident(src), Some("my col"));
        assert_eq!(tokens[2].ident(src), Some("third"));
    }

    #[test]
    fn test_comments_dropped() {
        assert_eq!(texts("a -- comment ; here\nb /* c; */ d"), vec!["a", "b", "d"]);
    }

    #[test]
    fn test_numbers() {
        assert_eq!(texts("-1.5e-3, 42"), vec!["-", "1.5e-3", ",", "42"]);
    }

    #[test]
    fn test_unterminated_string_runs_to_end() {
        let src = "x 'abc";
        let tokens = tokenize(src);
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[1].text(src), "'abc");
    }

    #[test]
    fn test_matching_paren() {
        let tokens = tokenize("(a (b) c) d");
        assert_eq!(matching_paren(&tokens, 0), Some(6));
        let unbalanced = tokenize("(a (b c");
        assert_eq!(matching_paren(&unbalanced, 0), None);
    }

    #[test]
    fn test_split_top_level_drops_empty_items() {
        let src = ", a INT, , b DECIMAL(10, 2),";
        let tokens = tokenize(src);
        let items = split_top_level(&tokens);
        assert_eq!(items.len(), 2);
        assert_eq!(render(src, items[1]), "b DECIMAL(10, 2)");
    }

    #[test]
    fn test_render_requotes_identifiers() {
        let src = "CHECK (\"price\"   >   0)";
        let tokens = tokenize(src);
        assert_eq!(render(src, &tokens), "CHECK (price > 0)");
    }
}
