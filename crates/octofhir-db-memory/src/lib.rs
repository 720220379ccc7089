//! In-memory storage backend for OctoFHIR records.
//!
//! Provides [`InMemoryVersionTracker`] and [`InMemoryRepository`], both built
//! on papaya's lock-free `HashMap`. Intended for tests and embedded use.
//!
//! # Example
//!
//! ```ignore
//! use octofhir_db_memory::InMemoryVersionTracker;
//! use octofhir_storage::VersionTracker;
//!
//! let tracker = InMemoryVersionTracker::new();
//! let created = tracker.record_create("Basic", "b1", &body).await?;
//! assert_eq!(created.version_id(), Some(1));
//! ```

pub mod repository;
pub mod tracker;

pub use repository::InMemoryRepository;
pub use tracker::InMemoryVersionTracker;

/// Storage key in the form `ResourceType/id`.
pub type StorageKey = String;

pub(crate) fn make_storage_key(resource_type: &str, id: &str) -> StorageKey {
    format!("{resource_type}/{id}")
}
