//! Versioned FHIR records.
//!
//! Wires the version tracker, the patch engine and the search query builder
//! into a [`ResourceService`] per resource type, configured from
//! [`config::AppConfig`].

pub mod config;
pub mod observability;
pub mod service;

pub use config::{AppConfig, ResourceSettings, SearchSettings, StorageConfig};
pub use service::ResourceService;
