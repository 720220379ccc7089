//! Data types shared by version trackers and repositories.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;

use crate::error::StorageError;

/// A FHIR resource as held by a repository.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredResource {
    /// The FHIR resource type (e.g., "Basic", "Goal").
    pub resource_type: String,
    /// The resource ID.
    pub id: String,
    /// Version reported by the version tracker; `None` when versioning is disabled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_id: Option<u64>,
    /// The full resource content as JSON.
    pub resource: Value,
    /// When this version was written.
    #[serde(with = "time::serde::rfc3339")]
    pub last_updated: OffsetDateTime,
}

impl StoredResource {
    /// Creates a new `StoredResource` stamped with the current time.
    #[must_use]
    pub fn new(
        resource_type: impl Into<String>,
        id: impl Into<String>,
        version_id: Option<u64>,
        resource: Value,
    ) -> Self {
        Self {
            resource_type: resource_type.into(),
            id: id.into(),
            version_id,
            resource,
            last_updated: OffsetDateTime::now_utc(),
        }
    }

    /// Builds a `StoredResource` from a canonical FHIR document, reading
    /// `resourceType` and `id` out of it.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::InvalidResource` if either field is missing or
    /// the id is not a valid FHIR id.
    pub fn from_document(resource: Value, version_id: Option<u64>) -> Result<Self, StorageError> {
        let resource_type = resource
            .get("resourceType")
            .and_then(Value::as_str)
            .ok_or_else(|| StorageError::invalid_resource("Missing resourceType"))?
            .to_string();
        let id = resource
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| StorageError::invalid_resource("Missing id"))?
            .to_string();
        octofhir_core::validate_id(&id)
            .map_err(|e| StorageError::invalid_resource(format!("Invalid id '{id}': {e}")))?;
        Ok(Self::new(resource_type, id, version_id, resource))
    }

    /// Returns the `Type/id` key of this resource.
    #[must_use]
    pub fn key(&self) -> String {
        format!("{}/{}", self.resource_type, self.id)
    }
}

/// One append-only record of a tracked mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    /// The FHIR resource type.
    pub resource_type: String,
    /// The FHIR id of the resource.
    pub resource_id: String,
    /// Version written by this mutation; unique per resource.
    pub version_id: u64,
    /// What kind of mutation produced this entry.
    pub action: HistoryAction,
    /// Snapshot of the resource. For deletes this is the last known content.
    pub resource: Value,
    /// When the entry was recorded.
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

impl HistoryEntry {
    /// Creates a history entry stamped with the current time.
    #[must_use]
    pub fn new(
        resource_type: impl Into<String>,
        resource_id: impl Into<String>,
        version_id: u64,
        action: HistoryAction,
        resource: Value,
    ) -> Self {
        Self {
            resource_type: resource_type.into(),
            resource_id: resource_id.into(),
            version_id,
            action,
            resource,
            timestamp: OffsetDateTime::now_utc(),
        }
    }
}

/// The kind of mutation a history entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryAction {
    /// Resource was created.
    Create,
    /// Resource was updated.
    Update,
    /// Resource was deleted.
    Delete,
}

impl HistoryAction {
    /// Returns the lowercase name stored in the history log.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

impl std::fmt::Display for HistoryAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for HistoryAction {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "create" => Ok(Self::Create),
            "update" => Ok(Self::Update),
            "delete" => Ok(Self::Delete),
            other => Err(StorageError::internal(format!(
                "Unknown history action '{other}'"
            ))),
        }
    }
}

/// Result of a tracked mutation.
#[derive(Debug, Clone, PartialEq)]
pub enum TrackOutcome {
    /// The mutation was recorded under a new version.
    Tracked(HistoryEntry),
    /// Versioning is disabled; nothing was recorded.
    Untracked,
}

impl TrackOutcome {
    /// Version written by the mutation, if it was tracked.
    #[must_use]
    pub fn version_id(&self) -> Option<u64> {
        match self {
            Self::Tracked(entry) => Some(entry.version_id),
            Self::Untracked => None,
        }
    }

    /// The recorded history entry, if any.
    #[must_use]
    pub fn entry(&self) -> Option<&HistoryEntry> {
        match self {
            Self::Tracked(entry) => Some(entry),
            Self::Untracked => None,
        }
    }
}

/// Parameters for history reads.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HistoryParams {
    /// Only include entries recorded at or after this instant.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[serde(with = "time::serde::rfc3339::option")]
    pub since: Option<OffsetDateTime>,
    /// Maximum number of entries to return.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<u32>,
    /// Number of entries to skip.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<u32>,
}

impl HistoryParams {
    /// Creates parameters that return the full history.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Only include entries recorded at or after `since`.
    #[must_use]
    pub fn since(mut self, since: OffsetDateTime) -> Self {
        self.since = Some(since);
        self
    }

    /// Limits the number of returned entries.
    #[must_use]
    pub fn count(mut self, count: u32) -> Self {
        self.count = Some(count);
        self
    }

    /// Skips the first `offset` entries.
    #[must_use]
    pub fn offset(mut self, offset: u32) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Applies these parameters to entries already sorted by version ascending.
    #[must_use]
    pub fn apply(&self, entries: Vec<HistoryEntry>) -> Vec<HistoryEntry> {
        let skip = self.offset.unwrap_or(0) as usize;
        let take = self.count.map_or(usize::MAX, |c| c as usize);
        entries
            .into_iter()
            .filter(|e| self.since.is_none_or(|since| e.timestamp >= since))
            .skip(skip)
            .take(take)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_stored_resource_from_document() {
        let stored =
            StoredResource::from_document(json!({"resourceType": "Basic", "id": "b1"}), Some(3))
                .unwrap();
        assert_eq!(stored.resource_type, "Basic");
        assert_eq!(stored.id, "b1");
        assert_eq!(stored.version_id, Some(3));
        assert_eq!(stored.key(), "Basic/b1");
    }

    #[test]
    fn test_stored_resource_from_document_rejects_bad_input() {
        assert!(StoredResource::from_document(json!({"id": "b1"}), None).is_err());
        assert!(StoredResource::from_document(json!({"resourceType": "Basic"}), None).is_err());
        let err =
            StoredResource::from_document(json!({"resourceType": "Basic", "id": "a b"}), None)
                .unwrap_err();
        assert!(matches!(err, StorageError::InvalidResource { .. }));
    }

    #[test]
    fn test_history_entry_serialization() {
        let entry = HistoryEntry::new("Goal", "g1", 2, HistoryAction::Update, json!({"a": 1}));
        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["resourceType"], "Goal");
        assert_eq!(value["resourceId"], "g1");
        assert_eq!(value["versionId"], 2);
        assert_eq!(value["action"], "update");

        let back: HistoryEntry = serde_json::from_value(value).unwrap();
        assert_eq!(back, entry);
    }

    #[test]
    fn test_history_action_parse() {
        assert_eq!("delete".parse::<HistoryAction>().unwrap(), HistoryAction::Delete);
        assert_eq!(HistoryAction::Create.to_string(), "create");
        assert!("purge".parse::<HistoryAction>().is_err());
    }

    #[test]
    fn test_track_outcome() {
        let entry = HistoryEntry::new("Basic", "1", 1, HistoryAction::Create, json!({}));
        let outcome = TrackOutcome::Tracked(entry.clone());
        assert_eq!(outcome.version_id(), Some(1));
        assert_eq!(outcome.entry(), Some(&entry));
        assert_eq!(TrackOutcome::Untracked.version_id(), None);
    }

    #[test]
    fn test_history_params_apply() {
        let entries: Vec<_> = (1..=5)
            .map(|v| HistoryEntry::new("Basic", "1", v, HistoryAction::Update, json!({})))
            .collect();

        let page = HistoryParams::new().offset(1).count(2).apply(entries.clone());
        let versions: Vec<u64> = page.iter().map(|e| e.version_id).collect();
        assert_eq!(versions, vec![2, 3]);

        let future = OffsetDateTime::now_utc() + time::Duration::hours(1);
        assert!(HistoryParams::new().since(future).apply(entries).is_empty());
    }
}
