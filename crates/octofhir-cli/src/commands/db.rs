use std::str::FromStr;

use anyhow::{Context, Result, anyhow, bail};
use octofhir_core::FhirDateTime;
use octofhir_db_postgres::{PostgresConfig, PostgresVersionTracker, create_pool, migrations};
use octofhir_records::AppConfig;
use octofhir_storage::{HistoryParams, VersionTracker};

use crate::cli::{DatabaseArgs, HistoryArgs, OutputFormat};
use crate::output::{print_success, print_value};

/// The `--database-url` flag wins over `storage.postgres.url`; pool settings come from the file.
pub fn postgres_config(config: &AppConfig, args: &DatabaseArgs) -> Result<PostgresConfig> {
    match (&args.database_url, &config.storage.postgres) {
        (Some(url), Some(pg)) => Ok(PostgresConfig {
            url: url.clone(),
            ..pg.clone()
        }),
        (Some(url), None) => Ok(PostgresConfig::new(url.clone())),
        (None, Some(pg)) => Ok(pg.clone()),
        (None, None) => bail!(
            "no database configured: pass --database-url or set storage.postgres.url"
        ),
    }
}

/// Splits `Type/id`.
pub fn parse_reference(reference: &str) -> Result<(&str, &str)> {
    let (resource_type, id) = reference
        .split_once('/')
        .ok_or_else(|| anyhow!("reference '{reference}' must have the form Type/id"))?;
    octofhir_core::validate_id(id).with_context(|| format!("invalid id in '{reference}'"))?;
    if resource_type.is_empty() {
        bail!("reference '{reference}' has an empty resource type");
    }
    Ok((resource_type, id))
}

pub fn history_params(args: &HistoryArgs) -> Result<HistoryParams> {
    let mut params = HistoryParams::new();
    if let Some(since) = &args.since {
        let since = FhirDateTime::from_str(since).context("--since must be an RFC 3339 instant")?;
        params = params.since(since.into_inner());
    }
    if let Some(count) = args.count {
        params = params.count(count);
    }
    if let Some(offset) = args.offset {
        params = params.offset(offset);
    }
    Ok(params)
}

pub async fn migrate(config: &AppConfig, args: &DatabaseArgs) -> Result<()> {
    let pg = postgres_config(config, args)?;
    let pool = create_pool(&pg).await?;
    migrations::run(&pool).await?;
    let versions = migrations::versions();
    tracing::info!(count = versions.len(), "migrations applied");
    print_success(&format!("Schema up to date ({} migrations)", versions.len()));
    Ok(())
}

pub async fn history(config: &AppConfig, args: &HistoryArgs, format: OutputFormat) -> Result<()> {
    let (resource_type, id) = parse_reference(&args.reference)?;
    let params = history_params(args)?;
    let pg = postgres_config(config, &args.database)?;
    let tracker = PostgresVersionTracker::connect(&pg).await?;
    let entries = tracker.history(resource_type, id, &params).await?;
    if entries.is_empty() {
        bail!("no history for {resource_type}/{id}");
    }
    print_value(&serde_json::to_value(&entries)?, format);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn history_args(since: Option<&str>) -> HistoryArgs {
        HistoryArgs {
            reference: "Basic/b1".into(),
            since: since.map(str::to_string),
            count: Some(2),
            offset: None,
            database: DatabaseArgs { database_url: None },
        }
    }

    #[test]
    fn database_url_flag_overrides_config() {
        let mut config = AppConfig::default();
        let args = DatabaseArgs {
            database_url: Some("postgres://cli/db".into()),
        };
        assert_eq!(postgres_config(&config, &args).unwrap().url, "postgres://cli/db");

        config.storage.postgres = Some(PostgresConfig::new("postgres://file/db").with_pool_size(3));
        let merged = postgres_config(&config, &args).unwrap();
        assert_eq!(merged.url, "postgres://cli/db");
        assert_eq!(merged.pool_size, 3);

        let none = DatabaseArgs { database_url: None };
        assert_eq!(postgres_config(&config, &none).unwrap().url, "postgres://file/db");
        assert!(postgres_config(&AppConfig::default(), &none).is_err());
    }

    #[test]
    fn references_are_validated() {
        assert_eq!(parse_reference("Basic/b1").unwrap(), ("Basic", "b1"));
        assert!(parse_reference("Basic").is_err());
        assert!(parse_reference("/b1").is_err());
        assert!(parse_reference("Basic/b 1").is_err());
    }

    #[test]
    fn history_params_from_flags() {
        let params = history_params(&history_args(Some("2024-01-01T00:00:00Z"))).unwrap();
        assert_eq!(params.count, Some(2));
        assert!(params.since.is_some());
        assert!(history_params(&history_args(Some("yesterday"))).is_err());
    }
}
