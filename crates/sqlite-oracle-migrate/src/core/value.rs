//! Literal values carried from SQLite into generated Oracle statements.

use std::borrow::Cow;

/// A single SQL literal value.
///
/// Uses `Cow` for text and byte data so literals scanned out of a dump can
/// borrow from the dump text unless unescaping forces a copy.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue<'a> {
    Null,

    /// Boolean value (`TRUE`/`FALSE` in the dump, or a bool column).
    Bool(bool),

    /// Integer value.
    Integer(i64),

    /// Floating point value.
    Real(f64),

    /// Text data, already unescaped.
    Text(Cow<'a, str>),

    /// Binary data.
    Bytes(Cow<'a, [u8]>),
}

impl<'a> SqlValue<'a> {
    /// Returns true if this is a NULL value.
    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }

    /// Convert to an owned value with 'static lifetime.
    pub fn into_owned(self) -> SqlValue<'static> {
        match self {
            SqlValue::Null => SqlValue::Null,
            SqlValue::Bool(v) => SqlValue::Bool(v),
            SqlValue::Integer(v) => SqlValue::Integer(v),
            SqlValue::Real(v) => SqlValue::Real(v),
            SqlValue::Text(v) => SqlValue::Text(Cow::Owned(v.into_owned())),
            SqlValue::Bytes(v) => SqlValue::Bytes(Cow::Owned(v.into_owned())),
        }
    }

    /// Borrow text without copying.
    pub fn text(s: &'a str) -> Self {
        SqlValue::Text(Cow::Borrowed(s))
    }
}

impl From<i64> for SqlValue<'static> {
    fn from(v: i64) -> Self {
        SqlValue::Integer(v)
    }
}

impl From<f64> for SqlValue<'static> {
    fn from(v: f64) -> Self {
        SqlValue::Real(v)
    }
}

impl From<bool> for SqlValue<'static> {
    fn from(v: bool) -> Self {
        SqlValue::Bool(v)
    }
}

impl From<String> for SqlValue<'static> {
    fn from(v: String) -> Self {
        SqlValue::Text(Cow::Owned(v))
    }
}

impl<'a> From<&'a str> for SqlValue<'a> {
    fn from(v: &'a str) -> Self {
        SqlValue::Text(Cow::Borrowed(v))
    }
}

impl<T> From<Option<T>> for SqlValue<'static>
where
    T: Into<SqlValue<'static>>,
{
    fn from(v: Option<T>) -> Self {
        v.map_or(SqlValue::Null, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_into_owned_keeps_content() {
        let source = String::from("borrowed");
        let owned = SqlValue::text(&source).into_owned();
        drop(source);
        assert_eq!(owned, SqlValue::Text(Cow::Owned("borrowed".to_string())));
    }

    #[test]
    fn test_option_conversion() {
        assert!(SqlValue::from(None::<i64>).is_null());
        assert_eq!(SqlValue::from(Some(5i64)), SqlValue::Integer(5));
    }
}
