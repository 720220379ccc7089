//! SQL building blocks: identifier validation and bound values.

use std::fmt;

use time::format_description::well_known::Rfc3339;
use time::{Date, OffsetDateTime};

use crate::error::SearchError;

/// Validate an identifier (table or column name).
///
/// Only `[A-Za-z_][A-Za-z0-9_]*` is accepted, so the name can be placed into
/// SQL text without quoting.
pub fn validate_identifier(name: &str) -> Result<(), SearchError> {
    let mut chars = name.chars();
    let valid = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(SearchError::InvalidIdentifier(name.to_string()))
    }
}

/// Validate a table name, optionally schema-qualified (`schema.table`).
pub fn validate_table_name(name: &str) -> Result<(), SearchError> {
    let parts: Vec<&str> = name.split('.').collect();
    if parts.len() > 2 {
        return Err(SearchError::InvalidIdentifier(name.to_string()));
    }
    parts.into_iter().try_for_each(validate_identifier)
}

/// Validate a static ordering clause: `column [ASC|DESC]` items separated by commas.
pub fn validate_order_by(clause: &str) -> Result<(), SearchError> {
    for item in clause.split(',') {
        let mut words = item.split_whitespace();
        let column = words
            .next()
            .ok_or_else(|| SearchError::InvalidIdentifier(clause.to_string()))?;
        validate_identifier(column)?;
        match (words.next(), words.next()) {
            (None, None) => {}
            (Some(dir), None)
                if dir.eq_ignore_ascii_case("asc") || dir.eq_ignore_ascii_case("desc") => {}
            _ => return Err(SearchError::InvalidIdentifier(clause.to_string())),
        }
    }
    Ok(())
}

/// Escapes `\`, `%` and `_` so a value matches literally inside a LIKE pattern.
pub fn escape_like(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// A value bound to a positional placeholder.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Text(String),
    Integer(i64),
    Float(f64),
    Date(Date),
    Timestamp(OffsetDateTime),
}

impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => write!(f, "'{}'", s.replace('\'', "''")),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Date(d) => write!(f, "DATE '{d}'"),
            Self::Timestamp(ts) => {
                let formatted = ts.format(&Rfc3339).map_err(|_| fmt::Error)?;
                write!(f, "TIMESTAMPTZ '{formatted}'")
            }
        }
    }
}

/// A SQL statement with its positional arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltQuery {
    pub sql: String,
    pub params: Vec<SqlValue>,
}

impl fmt::Display for BuiltQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.sql)
    }
}

/// Collects bound values and hands out their placeholder numbers.
#[derive(Debug, Default, Clone)]
pub(crate) struct Arguments {
    values: Vec<SqlValue>,
}

impl Arguments {
    pub(crate) fn starting_after(values: Vec<SqlValue>) -> Self {
        Self { values }
    }

    /// Binds a value and returns its `$n` placeholder.
    pub(crate) fn bind(&mut self, value: SqlValue) -> String {
        self.values.push(value);
        format!("${}", self.values.len())
    }

    pub(crate) fn into_values(self) -> Vec<SqlValue> {
        self.values
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::{date, datetime};

    #[test]
    fn test_validate_identifier() {
        assert!(validate_identifier("name").is_ok());
        assert!(validate_identifier("_created_at2").is_ok());
        assert!(validate_identifier("").is_err());
        assert!(validate_identifier("2name").is_err());
        assert!(validate_identifier("na-me").is_err());
        assert!(validate_identifier("name\"").is_err());
        assert!(validate_identifier("naïve").is_err());
    }

    #[test]
    fn test_validate_table_name() {
        assert!(validate_table_name("basic").is_ok());
        assert!(validate_table_name("fhir.basic").is_ok());
        assert!(validate_table_name("a.b.c").is_err());
        assert!(validate_table_name("fhir.").is_err());
        assert!(validate_table_name("basic; DROP TABLE x").is_err());
    }

    #[test]
    fn test_validate_order_by() {
        assert!(validate_order_by("name").is_ok());
        assert!(validate_order_by("created_at DESC, id asc").is_ok());
        assert!(validate_order_by("name DESC NULLS").is_err());
        assert!(validate_order_by("name, ").is_err());
        assert!(validate_order_by("(SELECT 1)").is_err());
    }

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("acme"), "acme");
        assert_eq!(escape_like("100%_a\\b"), "100\\%\\_a\\\\b");
    }

    #[test]
    fn test_arguments_numbering() {
        let mut args = Arguments::starting_after(vec![SqlValue::Integer(1)]);
        assert_eq!(args.bind(SqlValue::Text("a".into())), "$2");
        assert_eq!(args.bind(SqlValue::Float(1.5)), "$3");
        assert_eq!(args.into_values().len(), 3);
    }

    #[test]
    fn test_sql_value_display() {
        assert_eq!(SqlValue::Text("o'neil".into()).to_string(), "'o''neil'");
        assert_eq!(SqlValue::Integer(5).to_string(), "5");
        assert_eq!(SqlValue::Date(date!(2024 - 01 - 02)).to_string(), "DATE '2024-01-02'");
        assert_eq!(
            SqlValue::Timestamp(datetime!(2024-01-02 03:04:05 UTC)).to_string(),
            "TIMESTAMPTZ '2024-01-02T03:04:05Z'"
        );
    }
}
