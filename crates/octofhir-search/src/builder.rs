//! Search query builder.
//!
//! Turns raw query-string parameters plus a per-resource [`SearchParamTable`]
//! into a count statement and a paginated data statement. Both statements
//! share one WHERE clause and one argument list; the data statement only adds
//! `LIMIT`/`OFFSET` placeholders after the predicate arguments.

use std::collections::HashMap;

use crate::error::SearchError;
use crate::pagination::Pagination;
use crate::parameters::{SearchModifier, SearchParamTable};
use crate::predicate::{self, RawParam};
use crate::sql::{
    Arguments, BuiltQuery, SqlValue, validate_identifier, validate_order_by, validate_table_name,
};

/// Upper bound on bound values produced by one request.
pub const MAX_BOUND_VALUES: usize = 100;

#[derive(Debug, Clone)]
pub struct SearchQueryBuilder {
    table: String,
    columns: Vec<String>,
    predicates: Vec<String>,
    args: Vec<SqlValue>,
    order_by: Option<String>,
}

impl SearchQueryBuilder {
    /// Creates a builder over `table` projecting `columns`.
    pub fn new<I, S>(table: impl Into<String>, columns: I) -> Result<Self, SearchError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let table = table.into();
        validate_table_name(&table)?;
        let columns: Vec<String> = columns.into_iter().map(Into::into).collect();
        if columns.is_empty() {
            return Err(SearchError::InvalidIdentifier(format!(
                "no columns selected from {table}"
            )));
        }
        for column in &columns {
            validate_identifier(column)?;
        }
        Ok(Self {
            table,
            columns,
            predicates: Vec::new(),
            args: Vec::new(),
            order_by: None,
        })
    }

    /// Compiles every raw parameter that has a declared configuration.
    ///
    /// Parameters are processed in declaration order of `config`, so the
    /// placeholder numbering does not depend on hash-map iteration order.
    /// Names without a configuration entry are ignored. On error nothing is
    /// added to the builder.
    pub fn apply_params(
        &mut self,
        raw: &HashMap<String, String>,
        config: &SearchParamTable,
    ) -> Result<&mut Self, SearchError> {
        let mut selected = Vec::new();
        for (key, value) in raw {
            let (name, modifier) = match key.split_once(':') {
                Some((name, modifier)) => (name, Some(modifier)),
                None => (key.as_str(), None),
            };
            let (Some(position), Some(param_config)) = (config.position(name), config.get(name))
            else {
                tracing::debug!(param = %key, "ignoring unsupported search parameter");
                continue;
            };
            let modifier = match modifier {
                None => None,
                Some(raw_modifier) => {
                    let parsed = SearchModifier::parse(raw_modifier)
                        .filter(|m| m.applicable_to(param_config.param_type))
                        .ok_or_else(|| SearchError::InvalidModifier {
                            param: name.to_string(),
                            modifier: raw_modifier.to_string(),
                        })?;
                    Some(parsed)
                }
            };
            validate_identifier(&param_config.column)?;
            selected.push((position, key.as_str(), RawParam { name, modifier, value }, param_config));
        }
        selected.sort_by(|a, b| (a.0, a.1).cmp(&(b.0, b.1)));

        let mut args = Arguments::starting_after(self.args.clone());
        let mut predicates = Vec::new();
        for (_, _, param, param_config) in selected {
            if let Some(sql) = predicate::compile(param, param_config, &mut args)? {
                predicates.push(sql);
            }
        }
        let args = args.into_values();
        if args.len() > MAX_BOUND_VALUES {
            return Err(SearchError::QueryTooComplex(format!(
                "{} values exceed the limit of {MAX_BOUND_VALUES}",
                args.len()
            )));
        }

        self.predicates.extend(predicates);
        self.args = args;
        Ok(self)
    }

    /// Sets the static ordering clause, e.g. `"created_at DESC, id"`.
    pub fn order_by(&mut self, clause: impl Into<String>) -> Result<&mut Self, SearchError> {
        let clause = clause.into();
        validate_order_by(&clause)?;
        self.order_by = Some(clause);
        Ok(self)
    }

    pub fn predicates(&self) -> &[String] {
        &self.predicates
    }

    fn where_clause(&self) -> String {
        if self.predicates.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.predicates.join(" AND "))
        }
    }

    pub fn count_sql(&self) -> String {
        format!("SELECT COUNT(*) FROM {}{}", self.table, self.where_clause())
    }

    pub fn count_args(&self) -> Vec<SqlValue> {
        self.args.clone()
    }

    /// The paginated data statement; its last two placeholders are limit and offset.
    pub fn data_sql(&self) -> String {
        let mut sql = format!(
            "SELECT {} FROM {}{}",
            self.columns.join(", "),
            self.table,
            self.where_clause()
        );
        if let Some(order_by) = &self.order_by {
            sql.push_str(" ORDER BY ");
            sql.push_str(order_by);
        }
        let next = self.args.len() + 1;
        sql.push_str(&format!(" LIMIT ${next} OFFSET ${}", next + 1));
        sql
    }

    pub fn data_args(&self, limit: u32, offset: u32) -> Vec<SqlValue> {
        let mut args = self.args.clone();
        args.push(SqlValue::Integer(i64::from(limit)));
        args.push(SqlValue::Integer(i64::from(offset)));
        args
    }

    /// Produces both statements for one page.
    pub fn compile(&self, pagination: Pagination) -> CompiledSearch {
        CompiledSearch {
            count: BuiltQuery {
                sql: self.count_sql(),
                params: self.count_args(),
            },
            data: BuiltQuery {
                sql: self.data_sql(),
                params: self.data_args(pagination.limit, pagination.offset),
            },
            pagination,
        }
    }
}

/// Count and data statements of one search request.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledSearch {
    pub count: BuiltQuery,
    pub data: BuiltQuery,
    pub pagination: Pagination,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parameters::SearchParamType;

    fn raw(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn basic_config() -> SearchParamTable {
        SearchParamTable::new()
            .with("code", SearchParamType::Token, "code")
            .with("name", SearchParamType::String, "name")
            .with("subject", SearchParamType::Reference, "subject_ref")
            .with("created", SearchParamType::Date, "created_at")
            .with("priority", SearchParamType::Number, "priority")
    }

    fn builder() -> SearchQueryBuilder {
        SearchQueryBuilder::new("t", ["id", "name", "created_at"]).unwrap()
    }

    #[test]
    fn test_string_param_compiles_to_ilike() {
        let mut b = builder();
        b.apply_params(&raw(&[("name", "acme")]), &basic_config()).unwrap();
        assert!(b.count_sql().contains("name ILIKE $1"));
        assert_eq!(b.count_args(), vec![SqlValue::Text("%acme%".into())]);
    }

    #[test]
    fn test_unsafe_column_is_rejected() {
        let config = SearchParamTable::new()
            .with("code", SearchParamType::Token, "code")
            .with("evil", SearchParamType::Token, "code; DROP TABLE t");
        let mut b = builder();
        b.apply_params(&raw(&[("code", "x")]), &config).unwrap();

        let err = b.apply_params(&raw(&[("evil", "x")]), &config).unwrap_err();
        assert!(matches!(err, SearchError::InvalidIdentifier(_)));
        assert_eq!(b.predicates(), ["code = $1"]);
        assert_eq!(b.count_args(), vec![SqlValue::Text("x".into())]);
    }

    #[test]
    fn test_unknown_param_is_ignored() {
        let mut b = builder();
        b.apply_params(&raw(&[("foo", "bar")]), &basic_config()).unwrap();
        assert!(b.predicates().is_empty());
        assert!(b.count_args().is_empty());
        assert_eq!(b.count_sql(), "SELECT COUNT(*) FROM t");
    }

    #[test]
    fn test_count_and_data_share_predicates() {
        let mut b = builder();
        b.apply_params(
            &raw(&[("name", "acme"), ("code", "x"), ("created", "ge2024-01-01"), ("foo", "1")]),
            &basic_config(),
        )
        .unwrap();
        b.order_by("created_at DESC").unwrap();

        let where_clause = " WHERE code = $1 AND name ILIKE $2 AND created_at >= $3";
        assert_eq!(b.count_sql(), format!("SELECT COUNT(*) FROM t{where_clause}"));
        assert_eq!(
            b.data_sql(),
            format!(
                "SELECT id, name, created_at FROM t{where_clause} ORDER BY created_at DESC LIMIT $4 OFFSET $5"
            )
        );

        let count_args = b.count_args();
        let data_args = b.data_args(10, 20);
        assert_eq!(data_args[..count_args.len()], count_args[..]);
        assert_eq!(
            data_args[count_args.len()..],
            [SqlValue::Integer(10), SqlValue::Integer(20)]
        );
    }

    #[test]
    fn test_parameter_order_follows_configuration() {
        let params = raw(&[("priority", "3"), ("subject", "Patient/1"), ("code", "a")]);
        let mut first = builder();
        first.apply_params(&params, &basic_config()).unwrap();
        let mut second = builder();
        second.apply_params(&params, &basic_config()).unwrap();

        assert_eq!(
            first.predicates(),
            ["code = $1", "subject_ref = $2", "priority = $3"]
        );
        assert_eq!(first.count_sql(), second.count_sql());
        assert_eq!(first.count_args(), second.count_args());
    }

    #[test]
    fn test_modifiers() {
        let mut b = builder();
        b.apply_params(
            &raw(&[("name:exact", "Acme"), ("created:missing", "true")]),
            &basic_config(),
        )
        .unwrap();
        assert_eq!(b.predicates(), ["name = $1", "created_at IS NULL"]);
        assert_eq!(b.count_args(), vec![SqlValue::Text("Acme".into())]);
    }

    #[test]
    fn test_invalid_modifier_rejected() {
        let mut b = builder();
        let err = b
            .apply_params(&raw(&[("code:exact", "a")]), &basic_config())
            .unwrap_err();
        assert_eq!(
            err,
            SearchError::InvalidModifier {
                param: "code".into(),
                modifier: "exact".into()
            }
        );

        let err = b
            .apply_params(&raw(&[("name:sounds-like", "a")]), &basic_config())
            .unwrap_err();
        assert!(matches!(err, SearchError::InvalidModifier { .. }));
    }

    #[test]
    fn test_failed_apply_leaves_builder_untouched() {
        let mut b = builder();
        b.apply_params(&raw(&[("code", "a")]), &basic_config()).unwrap();
        let err = b
            .apply_params(&raw(&[("name", "x"), ("priority", "high")]), &basic_config())
            .unwrap_err();
        assert!(matches!(err, SearchError::InvalidValue { ref param, .. } if param == "priority"));
        assert_eq!(b.predicates(), ["code = $1"]);
        assert_eq!(b.count_args().len(), 1);
    }

    #[test]
    fn test_repeated_apply_continues_numbering() {
        let mut b = builder();
        b.apply_params(&raw(&[("code", "a")]), &basic_config()).unwrap();
        b.apply_params(&raw(&[("name", "b")]), &basic_config()).unwrap();
        assert_eq!(b.predicates(), ["code = $1", "name ILIKE $2"]);
        assert!(b.data_sql().ends_with("LIMIT $3 OFFSET $4"));
    }

    #[test]
    fn test_too_many_values() {
        let many = vec!["x"; MAX_BOUND_VALUES + 1].join(",");
        let mut b = builder();
        let err = b
            .apply_params(&raw(&[("code", many.as_str())]), &basic_config())
            .unwrap_err();
        assert!(matches!(err, SearchError::QueryTooComplex(_)));
        assert!(b.predicates().is_empty());
    }

    #[test]
    fn test_invalid_identifiers_rejected() {
        assert!(SearchQueryBuilder::new("t; DROP TABLE t", ["id"]).is_err());
        assert!(SearchQueryBuilder::new("t", ["id", "name--"]).is_err());
        assert!(SearchQueryBuilder::new("t", Vec::<String>::new()).is_err());
        assert!(builder().order_by("name; DELETE").is_err());
    }

    #[test]
    fn test_compile_without_predicates() {
        let compiled = builder().compile(Pagination::new(5, 0));
        assert_eq!(compiled.count.sql, "SELECT COUNT(*) FROM t");
        assert!(compiled.count.params.is_empty());
        assert_eq!(
            compiled.data.sql,
            "SELECT id, name, created_at FROM t LIMIT $1 OFFSET $2"
        );
        assert_eq!(
            compiled.data.params,
            vec![SqlValue::Integer(5), SqlValue::Integer(0)]
        );
    }
}
