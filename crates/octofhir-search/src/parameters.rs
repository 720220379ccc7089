use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::SearchError;
use crate::sql::validate_identifier;

/// Comparison semantics of a search parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchParamType {
    Token,
    String,
    Reference,
    Date,
    Number,
}

impl fmt::Display for SearchParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Token => "token",
            Self::String => "string",
            Self::Reference => "reference",
            Self::Date => "date",
            Self::Number => "number",
        };
        f.write_str(s)
    }
}

/// Supported modifiers, written as `name:modifier`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchModifier {
    /// `:missing=true|false` tests the column for NULL. Valid on every type.
    Missing,
    /// `:exact` turns a string search into a case-sensitive equality.
    Exact,
}

impl SearchModifier {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "missing" => Some(Self::Missing),
            "exact" => Some(Self::Exact),
            _ => None,
        }
    }

    pub fn applicable_to(self, param_type: SearchParamType) -> bool {
        match self {
            Self::Missing => true,
            Self::Exact => param_type == SearchParamType::String,
        }
    }
}

/// Comparator prefix on date and number values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchPrefix {
    Eq,
    Ne,
    Gt,
    Lt,
    Ge,
    Le,
    Sa, // starts after
    Eb, // ends before
    Ap, // approximately
}

impl fmt::Display for SearchPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SearchPrefix::Eq => "eq",
            SearchPrefix::Ne => "ne",
            SearchPrefix::Gt => "gt",
            SearchPrefix::Lt => "lt",
            SearchPrefix::Ge => "ge",
            SearchPrefix::Le => "le",
            SearchPrefix::Sa => "sa",
            SearchPrefix::Eb => "eb",
            SearchPrefix::Ap => "ap",
        };
        f.write_str(s)
    }
}

impl SearchPrefix {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "eq" => Some(Self::Eq),
            "ne" => Some(Self::Ne),
            "gt" => Some(Self::Gt),
            "lt" => Some(Self::Lt),
            "ge" => Some(Self::Ge),
            "le" => Some(Self::Le),
            "sa" => Some(Self::Sa),
            "eb" => Some(Self::Eb),
            "ap" => Some(Self::Ap),
            _ => None,
        }
    }

    /// Splits a leading two-letter prefix off a value; defaults to `eq`.
    pub fn split(value: &str) -> (Self, &str) {
        value
            .get(..2)
            .and_then(Self::parse)
            .map_or((Self::Eq, value), |prefix| (prefix, &value[2..]))
    }
}

/// Static mapping of one FHIR search parameter onto a SQL column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchParamConfig {
    #[serde(rename = "type")]
    pub param_type: SearchParamType,
    pub column: String,
}

impl SearchParamConfig {
    pub fn new(param_type: SearchParamType, column: impl Into<String>) -> Self {
        Self {
            param_type,
            column: column.into(),
        }
    }
}

/// The declared search parameters of one resource type, in declaration order.
///
/// Declaration order fixes the order in which predicates (and their
/// placeholders) are emitted, so the same request always compiles to the
/// same SQL.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SearchParamTable {
    params: IndexMap<String, SearchParamConfig>,
}

impl SearchParamTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a parameter, replacing any previous declaration with that name.
    #[must_use]
    pub fn with(
        mut self,
        name: impl Into<String>,
        param_type: SearchParamType,
        column: impl Into<String>,
    ) -> Self {
        self.params
            .insert(name.into(), SearchParamConfig::new(param_type, column));
        self
    }

    pub fn get(&self, name: &str) -> Option<&SearchParamConfig> {
        self.params.get(name)
    }

    /// Position of a parameter in declaration order.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.params.get_index_of(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &SearchParamConfig)> {
        self.params.iter()
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Checks that every configured column is a plain SQL identifier.
    pub fn validate(&self) -> Result<(), SearchError> {
        self.params
            .values()
            .try_for_each(|config| validate_identifier(&config.column))
    }
}

impl FromIterator<(String, SearchParamConfig)> for SearchParamTable {
    fn from_iter<I: IntoIterator<Item = (String, SearchParamConfig)>>(iter: I) -> Self {
        Self {
            params: iter.into_iter().collect(),
        }
    }
}
