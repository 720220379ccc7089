use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::builder::CompiledSearch;
use crate::error::SearchError;
use crate::sql::BuiltQuery;

/// Runs compiled search statements against a database.
#[async_trait]
pub trait SearchExecutor: Send + Sync {
    /// Runs a `SELECT COUNT(*)` statement.
    async fn count(&self, query: &BuiltQuery) -> Result<u64, SearchError>;

    /// Runs a data statement and returns each row as a JSON object keyed by column.
    async fn fetch(&self, query: &BuiltQuery) -> Result<Vec<Value>, SearchError>;
}

/// One page of search results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchPage {
    pub total: u64,
    pub rows: Vec<Value>,
    pub limit: u32,
    pub offset: u32,
}

impl SearchPage {
    /// Whether more rows exist after this page.
    pub fn has_more(&self) -> bool {
        u64::from(self.offset) + (self.rows.len() as u64) < self.total
    }
}

/// Runs the count statement and then the data statement of `search`.
pub async fn execute(
    executor: &dyn SearchExecutor,
    search: &CompiledSearch,
) -> Result<SearchPage, SearchError> {
    let total = executor.count(&search.count).await?;
    let rows = executor.fetch(&search.data).await?;
    tracing::debug!(total, returned = rows.len(), "search executed");
    Ok(SearchPage {
        total,
        rows,
        limit: search.pagination.limit,
        offset: search.pagination.offset,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::SearchQueryBuilder;
    use crate::pagination::Pagination;
    use crate::sql::SqlValue;
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingExecutor {
        seen: Mutex<Vec<BuiltQuery>>,
    }

    #[async_trait]
    impl SearchExecutor for RecordingExecutor {
        async fn count(&self, query: &BuiltQuery) -> Result<u64, SearchError> {
            self.seen.lock().unwrap().push(query.clone());
            Ok(3)
        }

        async fn fetch(&self, query: &BuiltQuery) -> Result<Vec<Value>, SearchError> {
            self.seen.lock().unwrap().push(query.clone());
            Ok(vec![json!({"id": "a"}), json!({"id": "b"})])
        }
    }

    #[tokio::test]
    async fn test_execute_runs_count_then_data() {
        let executor = RecordingExecutor::default();
        let search = SearchQueryBuilder::new("t", ["id"])
            .unwrap()
            .compile(Pagination::new(2, 0));

        let page = execute(&executor, &search).await.unwrap();
        assert_eq!(page.total, 3);
        assert_eq!(page.rows.len(), 2);
        assert!(page.has_more());

        let seen = executor.seen.lock().unwrap();
        assert_eq!(seen[0], search.count);
        assert_eq!(seen[1].params, vec![SqlValue::Integer(2), SqlValue::Integer(0)]);
    }

    #[test]
    fn test_last_page_has_no_more() {
        let page = SearchPage {
            total: 3,
            rows: vec![json!({})],
            limit: 2,
            offset: 2,
        };
        assert!(!page.has_more());
    }
}
