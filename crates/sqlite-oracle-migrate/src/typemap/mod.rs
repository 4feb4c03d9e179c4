//! Type mapping between SQLite and Oracle.
//!
//! SQLite column types are free-form text with type affinity rules; Oracle
//! needs concrete types. The mapping here is intentionally small and only
//! covers what SQLite dumps commonly contain. Anything unrecognized passes
//! through unchanged so user-defined or already-Oracle types survive.

pub mod date;
pub mod literal;

pub use date::parse_flexible_date;
pub use literal::sanitize_literal;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::warn;

/// Largest precision Oracle accepts for NUMBER.
pub const MAX_NUMBER_PRECISION: u32 = 38;

/// Oracle type used for SQLite TEXT columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextMapping {
    /// `VARCHAR2(4000)`, used by the dump converter.
    #[default]
    Varchar2,
    /// `CLOB`, used by the row-by-row extraction path.
    Clob,
}

impl TextMapping {
    fn oracle_type(self) -> &'static str {
        match self {
            TextMapping::Varchar2 => "VARCHAR2(4000)",
            TextMapping::Clob => "CLOB",
        }
    }
}

/// Map a SQLite column type to Oracle.
///
/// `raw_type` is the declared type as written in the CREATE TABLE, e.g.
/// `INTEGER`, `varchar(255)`, `DECIMAL(10, 2)`.
pub fn map_column_type(raw_type: &str, text: TextMapping) -> String {
    let trimmed = raw_type.trim();
    if trimmed.is_empty() {
        return String::new();
    }

    let (base, args) = split_type_args(trimmed);
    let base_upper = base.to_uppercase();

    match base_upper.as_str() {
        // Integer affinity
        "INTEGER" | "INT" => "NUMBER".to_string(),

        // Text affinity
        "TEXT" => text.oracle_type().to_string(),

        // Real affinity
        "REAL" | "FLOAT" | "DOUBLE" | "DOUBLE PRECISION" => "NUMBER(38,10)".to_string(),

        // Exact numerics
        "DECIMAL" | "NUMERIC" => match args {
            Some(args) => clamp_numeric_precision(&format!("NUMBER({})", compact_args(args))),
            None => "NUMBER".to_string(),
        },

        // Strings with explicit length
        "VARCHAR" => match args {
            Some(args) => format!("VARCHAR2({})", compact_args(args)),
            None => text.oracle_type().to_string(),
        },

        "BLOB" => "BLOB".to_string(),

        // Oracle DATE carries a time component
        "DATETIME" => "DATE".to_string(),

        _ => trimmed.to_string(),
    }
}

/// Split `NAME(args)` into `("NAME", Some("args"))`.
fn split_type_args(type_text: &str) -> (&str, Option<&str>) {
    match (type_text.find('('), type_text.rfind(')')) {
        (Some(open), Some(close)) if close > open => (
            type_text[..open].trim(),
            Some(type_text[open + 1..close].trim()),
        ),
        _ => (type_text, None),
    }
}

fn compact_args(args: &str) -> String {
    args.split(',')
        .map(str::trim)
        .collect::<Vec<_>>()
        .join(",")
}

static NUMBER_PRECISION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bNUMBER\s*\(\s*(-?\d+)(?:\s*,\s*(-?\d+))?\s*\)").expect("valid regex")
});

/// Clamp every `NUMBER(p[,s])` in `type_text` into Oracle's valid range.
///
/// Precision is clamped to `[1, 38]` and scale to `[0, precision]`. A zero
/// scale renders as `NUMBER(p)`. If the digits cannot be parsed the type
/// degrades to a bare `NUMBER`.
pub fn clamp_numeric_precision(type_text: &str) -> String {
    if !NUMBER_PRECISION.is_match(type_text) {
        return type_text.to_string();
    }

    let mut degraded = false;
    let clamped = NUMBER_PRECISION.replace_all(type_text, |caps: &regex::Captures<'_>| {
        let precision = caps[1].parse::<i64>();
        let scale = caps.get(2).map(|m| m.as_str().parse::<i64>());

        let (precision, scale) = match (precision, scale) {
            (Ok(p), None) => (p, 0),
            (Ok(p), Some(Ok(s))) => (p, s),
            _ => {
                degraded = true;
                return "NUMBER".to_string();
            }
        };

        let mut p = precision;
        if p < 1 {
            warn!("NUMBER precision {} below minimum, clamped to 1", precision);
            p = 1;
        } else if p > MAX_NUMBER_PRECISION as i64 {
            warn!(
                "NUMBER precision {} above maximum, clamped to {}",
                precision, MAX_NUMBER_PRECISION
            );
            p = MAX_NUMBER_PRECISION as i64;
        }

        let mut s = scale;
        if s < 0 {
            warn!("NUMBER scale {} is negative, clamped to 0", scale);
            s = 0;
        } else if s > p {
            warn!("NUMBER scale {} exceeds precision {}, clamped", scale, p);
            s = p;
        }

        if s == 0 {
            format!("NUMBER({})", p)
        } else {
            format!("NUMBER({},{})", p, s)
        }
    });

    if degraded {
        warn!("Unparsable NUMBER precision in '{}', using NUMBER", type_text);
    }
    clamped.into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_types() {
        assert_eq!(map_column_type("INTEGER", TextMapping::Varchar2), "NUMBER");
        assert_eq!(map_column_type("integer", TextMapping::Varchar2), "NUMBER");
        assert_eq!(map_column_type("INT", TextMapping::Varchar2), "NUMBER");
    }

    #[test]
    fn test_text_types() {
        assert_eq!(map_column_type("TEXT", TextMapping::Varchar2), "VARCHAR2(4000)");
        assert_eq!(map_column_type("TEXT", TextMapping::Clob), "CLOB");
        assert_eq!(map_column_type("varchar(255)", TextMapping::Varchar2), "VARCHAR2(255)");
        assert_eq!(map_column_type("VARCHAR ( 20 )", TextMapping::Varchar2), "VARCHAR2(20)");
    }

    #[test]
    fn test_real_types() {
        assert_eq!(map_column_type("REAL", TextMapping::Varchar2), "NUMBER(38,10)");
        assert_eq!(map_column_type("FLOAT", TextMapping::Varchar2), "NUMBER(38,10)");
        assert_eq!(map_column_type("DOUBLE", TextMapping::Varchar2), "NUMBER(38,10)");
        assert_eq!(
            map_column_type("double precision", TextMapping::Varchar2),
            "NUMBER(38,10)"
        );
    }

    #[test]
    fn test_decimal_types() {
        assert_eq!(map_column_type("DECIMAL(10,2)", TextMapping::Varchar2), "NUMBER(10,2)");
        assert_eq!(map_column_type("DECIMAL(10, 2)", TextMapping::Varchar2), "NUMBER(10,2)");
        assert_eq!(map_column_type("NUMERIC(8)", TextMapping::Varchar2), "NUMBER(8)");
        assert_eq!(map_column_type("DECIMAL", TextMapping::Varchar2), "NUMBER");
        assert_eq!(map_column_type("DECIMAL(50,60)", TextMapping::Varchar2), "NUMBER(38,38)");
    }

    #[test]
    fn test_passthrough_types() {
        assert_eq!(map_column_type("BLOB", TextMapping::Varchar2), "BLOB");
        assert_eq!(map_column_type("DATE", TextMapping::Varchar2), "DATE");
        assert_eq!(map_column_type("datetime", TextMapping::Varchar2), "DATE");
        assert_eq!(map_column_type("BOOLEAN", TextMapping::Varchar2), "BOOLEAN");
        assert_eq!(map_column_type("", TextMapping::Varchar2), "");
    }

    #[test]
    fn test_clamp_precision_in_range() {
        assert_eq!(clamp_numeric_precision("NUMBER(10,2)"), "NUMBER(10,2)");
        assert_eq!(clamp_numeric_precision("NUMBER(10)"), "NUMBER(10)");
        assert_eq!(clamp_numeric_precision("NUMBER"), "NUMBER");
        assert_eq!(clamp_numeric_precision("VARCHAR2(100)"), "VARCHAR2(100)");
    }

    #[test]
    fn test_clamp_precision_out_of_range() {
        assert_eq!(clamp_numeric_precision("NUMBER(50)"), "NUMBER(38)");
        assert_eq!(clamp_numeric_precision("NUMBER(0)"), "NUMBER(1)");
        assert_eq!(clamp_numeric_precision("NUMBER(5,9)"), "NUMBER(5,5)");
        assert_eq!(clamp_numeric_precision("NUMBER(10,0)"), "NUMBER(10)");
        assert_eq!(clamp_numeric_precision("NUMBER(10,-2)"), "NUMBER(10)");
        assert_eq!(
            clamp_numeric_precision("amount NUMBER(64,70) NOT NULL"),
            "amount NUMBER(38,38) NOT NULL"
        );
    }

    #[test]
    fn test_clamp_precision_unparsable_degrades() {
        assert_eq!(
            clamp_numeric_precision("NUMBER(99999999999999999999999)"),
            "NUMBER"
        );
    }

    #[test]
    fn test_clamp_precision_idempotent_and_bounded() {
        for p in [-3i64, 0, 1, 10, 38, 39, 100] {
            for s in [-1i64, 0, 5, 38, 60] {
                let input = format!("NUMBER({},{})", p, s);
                let once = clamp_numeric_precision(&input);
                let twice = clamp_numeric_precision(&once);
                assert_eq!(once, twice, "not idempotent for {}", input);

                let caps = NUMBER_PRECISION.captures(&once).unwrap();
                let out_p: i64 = caps[1].parse().unwrap();
                let out_s: i64 = caps.get(2).map_or(0, |m| m.as_str().parse().unwrap());
                assert!((1..=38).contains(&out_p), "{} -> {}", input, once);
                assert!((0..=out_p).contains(&out_s), "{} -> {}", input, once);
            }
        }
    }
}
