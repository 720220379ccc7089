//! FHIR search compilation.
//!
//! A [`SearchParamTable`] declares, per resource type, which search
//! parameters exist and which column each one filters. [`SearchQueryBuilder`]
//! combines that table with untrusted query-string values into parameterized
//! count and data statements. Request values only ever travel as bound
//! arguments.

pub mod builder;
pub mod error;
pub mod executor;
pub mod pagination;
pub mod parameters;
mod predicate;
pub mod sql;

pub use builder::{CompiledSearch, MAX_BOUND_VALUES, SearchQueryBuilder};
pub use error::SearchError;
pub use executor::{SearchExecutor, SearchPage, execute};
pub use pagination::Pagination;
pub use parameters::{
    SearchModifier, SearchParamConfig, SearchParamTable, SearchParamType, SearchPrefix,
};
pub use sql::{BuiltQuery, SqlValue, escape_like, validate_identifier, validate_table_name};

pub type SearchResult<T> = Result<T, SearchError>;
