//! Runs compiled search statements on PostgreSQL.

use async_trait::async_trait;
use serde_json::Value;
use sqlx_core::arguments::Arguments;
use sqlx_core::query_scalar::query_scalar_with;
use sqlx_postgres::{PgArguments, PgPool, Postgres};
use tracing::instrument;

use octofhir_search::{BuiltQuery, SearchError, SearchExecutor, SqlValue};

use crate::error::search_error;

#[derive(Debug, Clone)]
pub struct PostgresSearchExecutor {
    pool: PgPool,
}

impl PostgresSearchExecutor {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Encodes bound values in placeholder order.
fn arguments(params: &[SqlValue]) -> Result<PgArguments, SearchError> {
    let mut args = PgArguments::default();
    for param in params {
        let added = match param {
            SqlValue::Text(s) => args.add(s.clone()),
            SqlValue::Integer(i) => args.add(*i),
            SqlValue::Float(f) => args.add(*f),
            SqlValue::Date(d) => args.add(*d),
            SqlValue::Timestamp(ts) => args.add(*ts),
        };
        added.map_err(|e| SearchError::Execution(format!("Failed to bind {param}: {e}")))?;
    }
    Ok(args)
}

/// Wraps a data statement so each row comes back as one JSON object.
fn as_json_rows(sql: &str) -> String {
    format!("SELECT row_to_json(page)::jsonb FROM ({sql}) AS page")
}

#[async_trait]
impl SearchExecutor for PostgresSearchExecutor {
    #[instrument(skip(self, query), fields(sql = %query.sql))]
    async fn count(&self, query: &BuiltQuery) -> Result<u64, SearchError> {
        let total: i64 = query_scalar_with::<Postgres, i64, _>(&query.sql, arguments(&query.params)?)
            .fetch_one(&self.pool)
            .await
            .map_err(search_error)?;
        u64::try_from(total).map_err(|_| SearchError::Execution(format!("negative count {total}")))
    }

    #[instrument(skip(self, query), fields(sql = %query.sql))]
    async fn fetch(&self, query: &BuiltQuery) -> Result<Vec<Value>, SearchError> {
        let sql = as_json_rows(&query.sql);
        query_scalar_with::<Postgres, Value, _>(&sql, arguments(&query.params)?)
            .fetch_all(&self.pool)
            .await
            .map_err(search_error)
    }
}
