//! Resource service: the record lifecycle of one resource type.
//!
//! Every mutation is recorded by the version tracker first and then written
//! to the repository with the version the tracker reported. These are two
//! separate writes; a repository failure after a tracked mutation leaves a
//! history entry without matching content. Repositories only replace older
//! content, so concurrent updates reaching the repository out of order keep
//! the newest version.

use std::collections::HashMap;
use std::sync::Arc;

use octofhir_api::ApiError;
use octofhir_core::{FhirDateTime, generate_id, validate_id};
use octofhir_db_memory::{InMemoryRepository, InMemoryVersionTracker};
use octofhir_db_postgres::PostgresBackend;
use octofhir_patch::{PatchFormat, apply_patch};
use octofhir_search::{SearchExecutor, SearchPage, execute};
use octofhir_storage::{
    DynRepository, DynVersionTracker, HistoryAction, HistoryEntry, HistoryParams,
    NoopVersionTracker, StoredResource,
};
use serde_json::{Map, Value};
use time::OffsetDateTime;

use crate::config::{AppConfig, ResourceSettings, SearchSettings};

/// Create, read, update, patch, delete, history and search for one resource type.
#[derive(Clone)]
pub struct ResourceService {
    resource_type: String,
    settings: ResourceSettings,
    search_settings: SearchSettings,
    tracker: DynVersionTracker,
    repository: DynRepository,
    executor: Option<Arc<dyn SearchExecutor>>,
}

impl ResourceService {
    /// A service without version tracking until [`with_tracker`](Self::with_tracker) is called.
    pub fn new(
        resource_type: impl Into<String>,
        settings: ResourceSettings,
        repository: DynRepository,
    ) -> Self {
        Self {
            resource_type: resource_type.into(),
            settings,
            search_settings: SearchSettings::default(),
            tracker: Arc::new(NoopVersionTracker),
            repository,
            executor: None,
        }
    }

    /// Builds a service backed by the in-memory tracker and repository.
    ///
    /// Versioning is enabled when both the global switch and the resource's
    /// `versioned` flag are on.
    pub fn in_memory(config: &AppConfig, resource_type: &str) -> Result<Self, ApiError> {
        Self::configured(
            config,
            resource_type,
            Arc::new(InMemoryRepository::new()),
            Arc::new(InMemoryVersionTracker::new()),
        )
    }

    /// Builds a service on a shared PostgreSQL backend.
    pub fn postgres(
        config: &AppConfig,
        resource_type: &str,
        backend: &PostgresBackend,
    ) -> Result<Self, ApiError> {
        let service = Self::configured(
            config,
            resource_type,
            Arc::new(backend.repository.clone()),
            Arc::new(backend.tracker.clone()),
        )?;
        Ok(service.with_executor(Arc::new(backend.executor.clone())))
    }

    fn configured(
        config: &AppConfig,
        resource_type: &str,
        repository: DynRepository,
        tracker: DynVersionTracker,
    ) -> Result<Self, ApiError> {
        let settings = config.resource(resource_type).cloned().ok_or_else(|| {
            ApiError::not_found(format!("Resource type '{resource_type}' is not configured"))
        })?;
        let service =
            Self::new(resource_type, settings, repository).with_search_settings(config.search);
        if config.storage.versioning {
            Ok(service.with_tracker(tracker))
        } else {
            Ok(service)
        }
    }

    /// Uses `tracker` for version tracking, unless the resource is configured as unversioned.
    #[must_use]
    pub fn with_tracker(mut self, tracker: DynVersionTracker) -> Self {
        if self.settings.versioned {
            self.tracker = tracker;
        } else {
            tracing::debug!(
                resource_type = %self.resource_type,
                backend = tracker.backend_name(),
                "versioning disabled for resource type, tracker ignored"
            );
        }
        self
    }

    #[must_use]
    pub fn with_executor(mut self, executor: Arc<dyn SearchExecutor>) -> Self {
        self.executor = Some(executor);
        self
    }

    #[must_use]
    pub fn with_search_settings(mut self, search_settings: SearchSettings) -> Self {
        self.search_settings = search_settings;
        self
    }

    pub fn resource_type(&self) -> &str {
        &self.resource_type
    }

    pub fn is_versioned(&self) -> bool {
        self.tracker.is_enabled()
    }

    /// Creates a resource, assigning an id if the body has none.
    #[tracing::instrument(skip_all, fields(resource_type = %self.resource_type))]
    pub async fn create(&self, mut resource: Value) -> Result<StoredResource, ApiError> {
        self.check_resource_type(&resource)?;
        let id = match resource.get("id").and_then(Value::as_str) {
            Some(id) => id.to_string(),
            None => generate_id(),
        };
        self.check_id(&id)?;
        set_member(&mut resource, "id", Value::String(id.clone()))?;

        let now = OffsetDateTime::now_utc();
        let predicted = self.is_versioned().then_some(1);
        stamp_meta(&mut resource, predicted, now)?;

        let outcome = self
            .tracker
            .record_create(&self.resource_type, &id, &resource)
            .await?;
        let stored = stored(resource, outcome.version_id(), now)?;
        self.repository.insert(stored.clone()).await?;
        tracing::debug!(id = %id, version = ?stored.version_id, "resource created");
        Ok(stored)
    }

    /// Reads the current content. A deleted resource is `Gone`.
    #[tracing::instrument(skip(self), fields(resource_type = %self.resource_type))]
    pub async fn read(&self, id: &str) -> Result<StoredResource, ApiError> {
        self.check_id(id)?;
        match self.repository.fetch(&self.resource_type, id).await? {
            Some(stored) => Ok(stored),
            None => Err(self.missing(id).await?),
        }
    }

    /// Replaces a resource. With `if_match` the write only happens if the
    /// current version still equals it (412 otherwise).
    #[tracing::instrument(skip(self, resource), fields(resource_type = %self.resource_type))]
    pub async fn update(
        &self,
        id: &str,
        mut resource: Value,
        if_match: Option<u64>,
    ) -> Result<StoredResource, ApiError> {
        self.check_resource_type(&resource)?;
        match resource.get("id").and_then(Value::as_str) {
            Some(body_id) if body_id == id => {}
            Some(body_id) => {
                return Err(ApiError::bad_request(format!(
                    "Resource id '{body_id}' does not match '{id}'"
                )));
            }
            None => set_member(&mut resource, "id", Value::String(id.to_string()))?,
        }
        let current = self.read(id).await?;
        self.write_update(current, resource, if_match).await
    }

    /// Applies a JSON Patch or JSON Merge Patch and persists the full patched document.
    #[tracing::instrument(skip(self, body), fields(resource_type = %self.resource_type))]
    pub async fn patch(
        &self,
        id: &str,
        content_type: &str,
        body: &[u8],
        if_match: Option<u64>,
    ) -> Result<StoredResource, ApiError> {
        PatchFormat::from_content_type(content_type)?;
        let current = self.read(id).await?;
        let patched = apply_patch(&current.resource, content_type, body)?;
        self.write_update(current, patched, if_match).await
    }

    /// Deletes a resource, recording its last content in the history.
    #[tracing::instrument(skip(self), fields(resource_type = %self.resource_type))]
    pub async fn delete(&self, id: &str, if_match: Option<u64>) -> Result<(), ApiError> {
        let current = self.read(id).await?;
        let expected = if_match.or(current.version_id).unwrap_or_default();
        let recorded = self
            .tracker
            .record_delete(&self.resource_type, id, expected)
            .await;
        let outcome = match (recorded, if_match) {
            (Ok(outcome), _) => outcome,
            (Err(err), Some(_)) => return Err(ApiError::from_conditional(err)),
            (Err(err), None) => return Err(err.into()),
        };
        self.repository.remove(&self.resource_type, id).await?;
        tracing::debug!(id = %id, version = ?outcome.version_id(), "resource deleted");
        Ok(())
    }

    /// History of one resource, oldest first.
    pub async fn history(
        &self,
        id: &str,
        params: &HistoryParams,
    ) -> Result<Vec<HistoryEntry>, ApiError> {
        self.check_id(id)?;
        let entries = self.tracker.history(&self.resource_type, id, params).await?;
        if entries.is_empty() {
            let known = !self
                .tracker
                .history(&self.resource_type, id, &HistoryParams::new())
                .await?
                .is_empty()
                || self.repository.fetch(&self.resource_type, id).await?.is_some();
            if !known {
                return Err(ApiError::not_found(format!(
                    "{}/{id} not found",
                    self.resource_type
                )));
            }
        }
        Ok(entries)
    }

    /// Reads one exact version. The version written by a delete is `Gone`.
    pub async fn vread(&self, id: &str, version_id: u64) -> Result<HistoryEntry, ApiError> {
        self.check_id(id)?;
        let entry = self
            .tracker
            .version(&self.resource_type, id, version_id)
            .await?;
        if entry.action == HistoryAction::Delete {
            return Err(ApiError::gone(format!(
                "{}/{id}/_history/{version_id} was deleted",
                self.resource_type
            )));
        }
        Ok(entry)
    }

    /// Runs a search from raw query parameters.
    pub async fn search(&self, raw: &HashMap<String, String>) -> Result<SearchPage, ApiError> {
        let compiled = self.settings.compile_search(raw, self.search_settings)?;
        let executor = self.executor.as_deref().ok_or_else(|| {
            ApiError::internal(format!(
                "No search executor configured for {}",
                self.resource_type
            ))
        })?;
        Ok(execute(executor, &compiled).await?)
    }

    async fn write_update(
        &self,
        current: StoredResource,
        mut resource: Value,
        if_match: Option<u64>,
    ) -> Result<StoredResource, ApiError> {
        let id = current.id.as_str();
        let expected = if_match.or(current.version_id).unwrap_or_default();
        let now = OffsetDateTime::now_utc();
        let predicted = self.is_versioned().then_some(expected + 1);
        stamp_meta(&mut resource, predicted, now)?;

        let recorded = self
            .tracker
            .record_update(&self.resource_type, id, expected, &resource)
            .await;
        let outcome = match (recorded, if_match) {
            (Ok(outcome), _) => outcome,
            (Err(err), Some(_)) => return Err(ApiError::from_conditional(err)),
            (Err(err), None) => return Err(err.into()),
        };
        let stored = stored(resource, outcome.version_id(), now)?;
        match self.repository.replace(stored.clone()).await {
            Ok(()) => {
                tracing::debug!(id = %id, version = ?stored.version_id, "resource updated");
            }
            // A later tracked version reached the repository first.
            Err(err) if err.is_version_conflict() => {
                tracing::debug!(id = %id, version = ?stored.version_id, "resource update superseded");
            }
            Err(err) => return Err(err.into()),
        }
        Ok(stored)
    }

    /// Error for a resource the repository does not hold.
    async fn missing(&self, id: &str) -> Result<ApiError, ApiError> {
        let entries = self
            .tracker
            .history(&self.resource_type, id, &HistoryParams::new())
            .await?;
        let deleted = entries
            .last()
            .is_some_and(|entry| entry.action == HistoryAction::Delete);
        Ok(if deleted {
            ApiError::gone(format!("{}/{id} was deleted", self.resource_type))
        } else {
            ApiError::not_found(format!("{}/{id} not found", self.resource_type))
        })
    }

    fn check_resource_type(&self, resource: &Value) -> Result<(), ApiError> {
        match resource.get("resourceType").and_then(Value::as_str) {
            Some(rt) if rt == self.resource_type => Ok(()),
            Some(rt) => Err(ApiError::bad_request(format!(
                "Expected resourceType '{}', got '{rt}'",
                self.resource_type
            ))),
            None => Err(ApiError::bad_request("Missing resourceType")),
        }
    }

    fn check_id(&self, id: &str) -> Result<(), ApiError> {
        validate_id(id).map_err(|e| ApiError::bad_request(format!("Invalid id '{id}': {e}")))
    }
}

fn set_member(resource: &mut Value, key: &str, value: Value) -> Result<(), ApiError> {
    resource
        .as_object_mut()
        .ok_or_else(|| ApiError::bad_request("Resource must be a JSON object"))?
        .insert(key.to_string(), value);
    Ok(())
}

/// Writes `meta.versionId` and `meta.lastUpdated`; without a version the
/// `versionId` member is removed.
fn stamp_meta(
    resource: &mut Value,
    version_id: Option<u64>,
    last_updated: OffsetDateTime,
) -> Result<(), ApiError> {
    let object = resource
        .as_object_mut()
        .ok_or_else(|| ApiError::bad_request("Resource must be a JSON object"))?;
    let meta = object
        .entry("meta")
        .or_insert_with(|| Value::Object(Map::new()))
        .as_object_mut()
        .ok_or_else(|| ApiError::bad_request("meta must be a JSON object"))?;
    match version_id {
        Some(version) => {
            meta.insert("versionId".into(), Value::String(version.to_string()));
        }
        None => {
            meta.remove("versionId");
        }
    }
    meta.insert(
        "lastUpdated".into(),
        Value::String(FhirDateTime::new(last_updated).to_string()),
    );
    Ok(())
}

fn stored(
    resource: Value,
    version_id: Option<u64>,
    last_updated: OffsetDateTime,
) -> Result<StoredResource, ApiError> {
    let mut stored = StoredResource::from_document(resource, version_id)?;
    stored.last_updated = last_updated;
    Ok(stored)
}
