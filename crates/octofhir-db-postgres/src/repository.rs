//! PostgreSQL [`ResourceRepository`] over the `resource_current` table.
//!
//! Like the tracker, every write has an `*_in` variant taking a
//! `&mut PgConnection`, so the content row and the tracked mutation can be
//! committed in one transaction.

use async_trait::async_trait;
use serde_json::Value;
use sqlx_core::query::query;
use sqlx_core::query_as::query_as;
use sqlx_core::query_scalar::query_scalar;
use sqlx_postgres::{PgConnection, PgPool};
use time::OffsetDateTime;
use tracing::{debug, instrument};

use octofhir_storage::{ResourceRepository, StorageError, StoredResource};

use crate::error::{PG_UNIQUE_VIOLATION, has_pg_error_code, storage_error};

#[derive(Debug, Clone)]
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    #[instrument(skip(conn, resource), fields(resource_type = %resource.resource_type, id = %resource.id))]
    pub async fn insert_in(
        conn: &mut PgConnection,
        resource: &StoredResource,
    ) -> Result<(), StorageError> {
        let inserted = query(
            "INSERT INTO resource_current (resource_type, resource_id, version_id, resource, last_updated)
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(&resource.resource_type)
        .bind(&resource.id)
        .bind(db_version(resource.version_id)?)
        .bind(&resource.resource)
        .bind(resource.last_updated)
        .execute(&mut *conn)
        .await;

        match inserted {
            Ok(_) => Ok(()),
            Err(err) if has_pg_error_code(&err, PG_UNIQUE_VIOLATION) => Err(
                StorageError::already_exists(&resource.resource_type, &resource.id),
            ),
            Err(err) => Err(storage_error(err)),
        }
    }

    /// Overwrites the content row unless it already holds the incoming
    /// version or a later one.
    #[instrument(skip(conn, resource), fields(resource_type = %resource.resource_type, id = %resource.id))]
    pub async fn replace_in(
        conn: &mut PgConnection,
        resource: &StoredResource,
    ) -> Result<(), StorageError> {
        let incoming = db_version(resource.version_id)?;
        let replaced = query(
            "UPDATE resource_current
             SET version_id = $3, resource = $4, last_updated = $5
             WHERE resource_type = $1 AND resource_id = $2
               AND ($3::bigint IS NULL OR version_id IS NULL OR version_id < $3)",
        )
        .bind(&resource.resource_type)
        .bind(&resource.id)
        .bind(incoming)
        .bind(&resource.resource)
        .bind(resource.last_updated)
        .execute(&mut *conn)
        .await
        .map_err(storage_error)?;

        if replaced.rows_affected() > 0 {
            return Ok(());
        }

        let stored: Option<Option<i64>> = query_scalar(
            "SELECT version_id FROM resource_current
             WHERE resource_type = $1 AND resource_id = $2",
        )
        .bind(&resource.resource_type)
        .bind(&resource.id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(storage_error)?;

        match (stored, resource.version_id) {
            (None, _) => Err(StorageError::not_found(&resource.resource_type, &resource.id)),
            (Some(current), incoming) => {
                let current = current.and_then(|v| u64::try_from(v).ok()).unwrap_or_default();
                debug!(current, incoming = ?incoming, "stored content is newer, replace skipped");
                Err(StorageError::version_conflict(
                    incoming.unwrap_or_default().saturating_sub(1),
                    current,
                ))
            }
        }
    }

    #[instrument(skip(conn))]
    pub async fn remove_in(
        conn: &mut PgConnection,
        resource_type: &str,
        id: &str,
    ) -> Result<(), StorageError> {
        let removed = query(
            "DELETE FROM resource_current WHERE resource_type = $1 AND resource_id = $2",
        )
        .bind(resource_type)
        .bind(id)
        .execute(&mut *conn)
        .await
        .map_err(storage_error)?;

        if removed.rows_affected() == 0 {
            return Err(StorageError::not_found(resource_type, id));
        }
        Ok(())
    }
}

fn db_version(version: Option<u64>) -> Result<Option<i64>, StorageError> {
    version
        .map(|v| {
            i64::try_from(v)
                .map_err(|_| StorageError::invalid_resource(format!("Version {v} is out of range")))
        })
        .transpose()
}

type ContentRow = (Option<i64>, Value, OffsetDateTime);

#[async_trait]
impl ResourceRepository for PostgresRepository {
    async fn insert(&self, resource: StoredResource) -> Result<(), StorageError> {
        let mut conn = self.pool.acquire().await.map_err(storage_error)?;
        Self::insert_in(&mut *conn, &resource).await
    }

    #[instrument(skip(self))]
    async fn fetch(
        &self,
        resource_type: &str,
        id: &str,
    ) -> Result<Option<StoredResource>, StorageError> {
        let row: Option<ContentRow> = query_as(
            "SELECT version_id, resource, last_updated FROM resource_current
             WHERE resource_type = $1 AND resource_id = $2",
        )
        .bind(resource_type)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_error)?;

        row.map(|(version_id, resource, last_updated)| {
            let version_id = version_id
                .map(|v| {
                    u64::try_from(v).map_err(|_| {
                        StorageError::internal(format!("Stored version {v} is negative"))
                    })
                })
                .transpose()?;
            Ok(StoredResource {
                last_updated,
                ..StoredResource::new(resource_type, id, version_id, resource)
            })
        })
        .transpose()
    }

    async fn replace(&self, resource: StoredResource) -> Result<(), StorageError> {
        let mut conn = self.pool.acquire().await.map_err(storage_error)?;
        Self::replace_in(&mut *conn, &resource).await
    }

    async fn remove(&self, resource_type: &str, id: &str) -> Result<(), StorageError> {
        let mut conn = self.pool.acquire().await.map_err(storage_error)?;
        Self::remove_in(&mut *conn, resource_type, id).await
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_db_version() {
        assert_eq!(db_version(None).unwrap(), None);
        assert_eq!(db_version(Some(4)).unwrap(), Some(4));
        assert!(db_version(Some(u64::MAX)).is_err());
    }
}
