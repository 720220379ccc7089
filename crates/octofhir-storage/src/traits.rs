//! Traits implemented by storage backends.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::StorageError;
use crate::types::{HistoryEntry, HistoryParams, StoredResource, TrackOutcome};

/// Records every mutation of a FHIR resource as an append-only history entry
/// and owns the resource's monotonically increasing version counter.
///
/// Updates and deletes use compare-and-swap semantics: the caller passes the
/// version it last saw and the write only happens if it is still current.
/// Implementations must be thread-safe (`Send + Sync`).
///
/// # Example
///
/// ```ignore
/// use octofhir_storage::{VersionTracker, StorageError};
///
/// async fn bump(tracker: &dyn VersionTracker, body: &Value) -> Result<Option<u64>, StorageError> {
///     let outcome = tracker.record_update("Basic", "b1", 1, body).await?;
///     Ok(outcome.version_id())
/// }
/// ```
#[async_trait]
pub trait VersionTracker: Send + Sync {
    /// Starts tracking a new resource at version 1 and writes a `create` entry.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::AlreadyExists` if the resource already has history.
    /// Returns `StorageError::Persistence` if the write fails.
    async fn record_create(
        &self,
        resource_type: &str,
        id: &str,
        resource: &Value,
    ) -> Result<TrackOutcome, StorageError>;

    /// Advances the version of an existing resource if it still equals
    /// `expected_version` and writes an `update` entry.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::VersionConflict` if the stored version differs.
    /// Nothing is written in that case.
    /// Returns `StorageError::NotFound` or `StorageError::Deleted` if the
    /// resource is not live.
    async fn record_update(
        &self,
        resource_type: &str,
        id: &str,
        expected_version: u64,
        resource: &Value,
    ) -> Result<TrackOutcome, StorageError>;

    /// Marks the resource deleted under the same compare-and-swap discipline.
    /// The `delete` entry carries the last known snapshot of the resource.
    ///
    /// # Errors
    ///
    /// Same as [`VersionTracker::record_update`].
    async fn record_delete(
        &self,
        resource_type: &str,
        id: &str,
        expected_version: u64,
    ) -> Result<TrackOutcome, StorageError>;

    /// Returns the history of a resource ordered by version ascending.
    ///
    /// An unknown resource has an empty history.
    async fn history(
        &self,
        resource_type: &str,
        id: &str,
        params: &HistoryParams,
    ) -> Result<Vec<HistoryEntry>, StorageError>;

    /// Returns the history entry for one exact version.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if that version was never written.
    async fn version(
        &self,
        resource_type: &str,
        id: &str,
        version_id: u64,
    ) -> Result<HistoryEntry, StorageError>;

    /// Returns whether this tracker actually records anything.
    fn is_enabled(&self) -> bool {
        true
    }

    /// Returns the name of this backend for logging.
    fn backend_name(&self) -> &'static str;
}

/// Plain persistence of current resource content.
///
/// Repositories never choose versions themselves; they store whatever the
/// version tracker reported (or nothing when versioning is disabled).
#[async_trait]
pub trait ResourceRepository: Send + Sync {
    /// Stores a new resource.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::AlreadyExists` if the key is taken.
    async fn insert(&self, resource: StoredResource) -> Result<(), StorageError>;

    /// Reads the current content of a resource.
    async fn fetch(
        &self,
        resource_type: &str,
        id: &str,
    ) -> Result<Option<StoredResource>, StorageError>;

    /// Replaces the content of an existing resource. Versioned content only
    /// replaces an older version, so writes landing out of order never roll
    /// the resource back.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the resource does not exist.
    /// Returns `StorageError::VersionConflict` if the stored content is
    /// already at the incoming version or later.
    async fn replace(&self, resource: StoredResource) -> Result<(), StorageError>;

    /// Removes a resource.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the resource does not exist.
    async fn remove(&self, resource_type: &str, id: &str) -> Result<(), StorageError>;

    /// Returns the name of this backend for logging.
    fn backend_name(&self) -> &'static str;
}
