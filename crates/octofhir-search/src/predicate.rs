//! Compiles one search parameter value into a parameterized SQL predicate.
//!
//! Only the configured column name and fixed operators ever reach SQL text.
//! Everything derived from the request is bound through [`Arguments`].

use octofhir_core::PartialDateTime;
use time::{Date, Duration};

use crate::error::SearchError;
use crate::parameters::{SearchModifier, SearchParamConfig, SearchParamType, SearchPrefix};
use crate::sql::{Arguments, SqlValue, escape_like};

/// Relative tolerance of `ap` on numbers.
const APPROXIMATE_NUMBER_RATIO: f64 = 0.1;

/// Tolerance of `ap` on dates.
const APPROXIMATE_DATE_DAYS: i64 = 1;

/// One raw search parameter from the query string.
#[derive(Debug, Clone, Copy)]
pub(crate) struct RawParam<'a> {
    pub name: &'a str,
    pub modifier: Option<SearchModifier>,
    pub value: &'a str,
}

/// Compiles a parameter into a predicate, or `None` if it carries no values.
pub(crate) fn compile(
    param: RawParam<'_>,
    config: &SearchParamConfig,
    args: &mut Arguments,
) -> Result<Option<String>, SearchError> {
    let column = config.column.as_str();

    if param.modifier == Some(SearchModifier::Missing) {
        let sql = match param.value {
            "true" => format!("{column} IS NULL"),
            "false" => format!("{column} IS NOT NULL"),
            other => {
                return Err(SearchError::invalid_value(
                    param.name,
                    format!("':missing' expects true or false, got '{other}'"),
                ));
            }
        };
        return Ok(Some(sql));
    }

    let mut alternatives = Vec::new();
    for value in split_alternatives(param.value) {
        if value.is_empty() {
            continue;
        }
        let sql = match config.param_type {
            SearchParamType::Token | SearchParamType::Reference => {
                format!("{column} = {}", args.bind(SqlValue::Text(value)))
            }
            SearchParamType::String if param.modifier == Some(SearchModifier::Exact) => {
                format!("{column} = {}", args.bind(SqlValue::Text(value)))
            }
            SearchParamType::String => {
                let pattern = format!("%{}%", escape_like(&value));
                format!("{column} ILIKE {}", args.bind(SqlValue::Text(pattern)))
            }
            SearchParamType::Date => compile_date(param.name, column, &value, args)?,
            SearchParamType::Number => compile_number(param.name, column, &value, args)?,
        };
        alternatives.push(sql);
    }

    Ok(match alternatives.len() {
        0 => None,
        1 => alternatives.pop(),
        _ => Some(format!("({})", alternatives.join(" OR "))),
    })
}

/// Splits a value on commas that are not escaped as `\,`.
pub(crate) fn split_alternatives(raw: &str) -> Vec<String> {
    let mut values = Vec::new();
    let mut current = String::new();
    let mut chars = raw.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' if chars.peek() == Some(&',') => {
                current.push(',');
                chars.next();
            }
            ',' => values.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    values.push(current);
    values
}

/// A parsed comparison target.
enum Bound {
    /// A single value compared with the usual operators.
    Point(SqlValue),
    /// A half-open period `[start, end)` such as a whole year.
    Range(SqlValue, SqlValue),
}

fn compare_point(column: &str, prefix: SearchPrefix, value: SqlValue, args: &mut Arguments) -> String {
    let op = match prefix {
        SearchPrefix::Eq | SearchPrefix::Ap => "=",
        SearchPrefix::Ne => "<>",
        SearchPrefix::Gt | SearchPrefix::Sa => ">",
        SearchPrefix::Lt | SearchPrefix::Eb => "<",
        SearchPrefix::Ge => ">=",
        SearchPrefix::Le => "<=",
    };
    format!("{column} {op} {}", args.bind(value))
}

fn compare_range(
    column: &str,
    prefix: SearchPrefix,
    start: SqlValue,
    end: SqlValue,
    args: &mut Arguments,
) -> String {
    match prefix {
        SearchPrefix::Eq | SearchPrefix::Ap => {
            let start = args.bind(start);
            let end = args.bind(end);
            format!("({column} >= {start} AND {column} < {end})")
        }
        SearchPrefix::Ne => {
            let start = args.bind(start);
            let end = args.bind(end);
            format!("({column} < {start} OR {column} >= {end})")
        }
        SearchPrefix::Gt | SearchPrefix::Sa => format!("{column} >= {}", args.bind(end)),
        SearchPrefix::Lt | SearchPrefix::Eb => format!("{column} < {}", args.bind(start)),
        SearchPrefix::Ge => format!("{column} >= {}", args.bind(start)),
        SearchPrefix::Le => format!("{column} < {}", args.bind(end)),
    }
}

fn compile_bound(column: &str, prefix: SearchPrefix, bound: Bound, args: &mut Arguments) -> String {
    match bound {
        Bound::Point(value) => compare_point(column, prefix, value, args),
        Bound::Range(start, end) => compare_range(column, prefix, start, end, args),
    }
}

fn compile_date(
    name: &str,
    column: &str,
    raw: &str,
    args: &mut Arguments,
) -> Result<String, SearchError> {
    let (prefix, rest) = SearchPrefix::split(raw);
    let invalid = |message: String| SearchError::invalid_value(name, message);
    let value: PartialDateTime = rest.parse().map_err(|e| invalid(format!("{e}")))?;
    let overflow = || invalid(format!("date '{rest}' is out of range"));
    let tolerance = Duration::days(APPROXIMATE_DATE_DAYS);

    let bound = match value {
        PartialDateTime::DateTime(instant) if prefix == SearchPrefix::Ap => Bound::Range(
            SqlValue::Timestamp(instant.checked_sub(tolerance).ok_or_else(overflow)?),
            SqlValue::Timestamp(instant.checked_add(tolerance).ok_or_else(overflow)?),
        ),
        PartialDateTime::DateTime(instant) => Bound::Point(SqlValue::Timestamp(instant)),
        PartialDateTime::Date(day) if prefix != SearchPrefix::Ap => Bound::Point(SqlValue::Date(day)),
        partial => {
            let (start, end) = partial
                .period()
                .map_err(|e| invalid(format!("{e}")))?
                .ok_or_else(overflow)?;
            let (start, end) = if prefix == SearchPrefix::Ap {
                widen(start, end, tolerance).ok_or_else(overflow)?
            } else {
                (start, end)
            };
            Bound::Range(SqlValue::Date(start), SqlValue::Date(end))
        }
    };
    Ok(compile_bound(column, prefix, bound, args))
}

fn widen(start: Date, end: Date, by: Duration) -> Option<(Date, Date)> {
    Some((start.checked_sub(by)?, end.checked_add(by)?))
}

fn compile_number(
    name: &str,
    column: &str,
    raw: &str,
    args: &mut Arguments,
) -> Result<String, SearchError> {
    let (prefix, rest) = SearchPrefix::split(raw);
    let invalid = || SearchError::invalid_value(name, format!("'{rest}' is not a number"));

    let bound = if let Ok(integer) = rest.parse::<i64>() {
        if prefix == SearchPrefix::Ap {
            approximate(integer as f64)
        } else {
            Bound::Point(SqlValue::Integer(integer))
        }
    } else {
        let float = rest
            .parse::<f64>()
            .ok()
            .filter(|f| f.is_finite())
            .ok_or_else(invalid)?;
        if prefix == SearchPrefix::Ap {
            approximate(float)
        } else {
            Bound::Point(SqlValue::Float(float))
        }
    };

    Ok(match bound {
        Bound::Range(low, high) => {
            let low = args.bind(low);
            let high = args.bind(high);
            format!("({column} >= {low} AND {column} <= {high})")
        }
        point => compile_bound(column, prefix, point, args),
    })
}

fn approximate(value: f64) -> Bound {
    let delta = value.abs() * APPROXIMATE_NUMBER_RATIO;
    Bound::Range(SqlValue::Float(value - delta), SqlValue::Float(value + delta))
}
