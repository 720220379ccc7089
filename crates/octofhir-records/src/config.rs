use indexmap::IndexMap;
use octofhir_db_postgres::PostgresConfig;
use octofhir_search::{
    CompiledSearch, Pagination, SearchError, SearchParamTable, SearchQueryBuilder,
    validate_identifier, validate_table_name,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub search: SearchSettings,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Per resource type: table, columns and declared search parameters.
    #[serde(default)]
    pub resources: IndexMap<String, ResourceSettings>,
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), String> {
        // Search validations
        if self.search.default_count == 0 {
            return Err("search.default_count must be > 0".into());
        }
        if self.search.max_count == 0 {
            return Err("search.max_count must be > 0".into());
        }
        if self.search.default_count > self.search.max_count {
            return Err("search.default_count must be <= search.max_count".into());
        }
        // Logging validation
        let lvl = self.logging.level.to_ascii_lowercase();
        let valid_levels = ["trace", "debug", "info", "warn", "error", "off"];
        if !valid_levels.contains(&lvl.as_str()) {
            return Err(format!("logging.level must be one of {valid_levels:?}"));
        }
        // Storage validation
        if let Some(ref pg) = self.storage.postgres {
            if pg.url.is_empty() {
                return Err("storage.postgres.url must not be empty".into());
            }
            if pg.pool_size == 0 {
                return Err("storage.postgres.pool_size must be > 0".into());
            }
        }
        // Resource validations
        for (resource_type, resource) in &self.resources {
            octofhir_core::validate_id(resource_type)
                .map_err(|e| format!("resources.{resource_type}: invalid resource type: {e}"))?;
            resource
                .validate()
                .map_err(|e| format!("resources.{resource_type}: {e}"))?;
        }
        Ok(())
    }

    /// Settings of a resource type. Environment sources lowercase keys, so an
    /// exact match is preferred over a case-insensitive one.
    pub fn resource(&self, resource_type: &str) -> Option<&ResourceSettings> {
        self.resources.get(resource_type).or_else(|| {
            self.resources
                .iter()
                .find(|(name, _)| name.eq_ignore_ascii_case(resource_type))
                .map(|(_, settings)| settings)
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Global switch for version tracking; per-resource `versioned` still applies.
    #[serde(default = "default_versioning")]
    pub versioning: bool,
    /// PostgreSQL connection; when absent, everything is kept in memory.
    #[serde(default)]
    pub postgres: Option<PostgresConfig>,
}
fn default_versioning() -> bool {
    true
}
impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            versioning: default_versioning(),
            postgres: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SearchSettings {
    #[serde(default = "default_search_default")]
    pub default_count: u32,
    #[serde(default = "default_search_max")]
    pub max_count: u32,
}
fn default_search_default() -> u32 {
    10
}
fn default_search_max() -> u32 {
    100
}
impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            default_count: default_search_default(),
            max_count: default_search_max(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}
fn default_log_level() -> String {
    "info".into()
}
impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Static description of one resource type.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResourceSettings {
    pub table: String,
    pub columns: Vec<String>,
    #[serde(default)]
    pub order_by: Option<String>,
    #[serde(default = "default_versioned")]
    pub versioned: bool,
    #[serde(default)]
    pub search_params: SearchParamTable,
}
fn default_versioned() -> bool {
    true
}

impl ResourceSettings {
    pub fn new(table: impl Into<String>, columns: Vec<String>) -> Self {
        Self {
            table: table.into(),
            columns,
            order_by: None,
            versioned: default_versioned(),
            search_params: SearchParamTable::new(),
        }
    }

    #[must_use]
    pub fn with_order_by(mut self, clause: impl Into<String>) -> Self {
        self.order_by = Some(clause.into());
        self
    }

    #[must_use]
    pub fn with_search_params(mut self, search_params: SearchParamTable) -> Self {
        self.search_params = search_params;
        self
    }

    #[must_use]
    pub fn with_versioned(mut self, versioned: bool) -> Self {
        self.versioned = versioned;
        self
    }

    pub fn validate(&self) -> Result<(), SearchError> {
        validate_table_name(&self.table)?;
        if self.columns.is_empty() {
            return Err(SearchError::InvalidIdentifier(format!(
                "no columns configured for {}",
                self.table
            )));
        }
        for column in &self.columns {
            validate_identifier(column)?;
        }
        if let Some(clause) = &self.order_by {
            octofhir_search::sql::validate_order_by(clause)?;
        }
        self.search_params.validate()
    }

    /// Compiles raw query parameters into count and data statements.
    pub fn compile_search(
        &self,
        raw: &HashMap<String, String>,
        settings: SearchSettings,
    ) -> Result<CompiledSearch, SearchError> {
        let pagination = Pagination::from_params(raw, settings.default_count, settings.max_count)?;
        let mut builder = SearchQueryBuilder::new(&self.table, &self.columns)?;
        builder.apply_params(raw, &self.search_params)?;
        if let Some(clause) = &self.order_by {
            builder.order_by(clause)?;
        }
        Ok(builder.compile(pagination))
    }
}

pub mod loader {
    use super::AppConfig;
    use config::{Config, Environment, File};
    use std::path::{Path, PathBuf};

    pub fn load_config(path: Option<&str>) -> Result<AppConfig, String> {
        let mut builder = Config::builder();
        match path {
            Some(p) => {
                let pathbuf = PathBuf::from(p);
                if !pathbuf.exists() {
                    return Err(format!("config file not found: {p}"));
                }
                builder = builder.add_source(File::from(pathbuf));
            }
            None => {
                // Try default root-level file
                let default_path = PathBuf::from("octofhir-records.toml");
                if default_path.exists() {
                    builder = builder.add_source(File::from(default_path));
                }
            }
        }
        // Environment variable overrides, e.g., OCTOFHIR__SEARCH__MAX_COUNT=50
        builder = builder.add_source(
            Environment::with_prefix("OCTOFHIR")
                .try_parsing(true)
                .separator("__"),
        );
        let cfg = builder
            .build()
            .map_err(|e| format!("config build error: {e}"))?;
        let merged: AppConfig = cfg
            .try_deserialize()
            .map_err(|e| format!("config deserialize error: {e}"))?;
        merged.validate()?;
        Ok(merged)
    }

    pub fn load_config_with_default_path<P: AsRef<Path>>(
        path: Option<P>,
    ) -> Result<AppConfig, String> {
        let p = path
            .as_ref()
            .map(|p| p.as_ref().to_string_lossy().to_string());
        load_config(p.as_deref())
    }
}
