use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "octofhir-records")]
#[command(about = "OctoFHIR records: patch documents, inspect search SQL, manage the version store")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file (defaults to ./octofhir-records.toml when present)
    #[arg(short, long, global = true, env = "OCTOFHIR_CONFIG")]
    pub config: Option<String>,

    /// Output format
    #[arg(short, long, global = true)]
    pub format: Option<OutputFormat>,

    /// Log level (overrides logging.level from the configuration)
    #[arg(long, global = true)]
    pub log_level: Option<String>,
}

#[derive(Clone, Copy, ValueEnum, Default)]
pub enum OutputFormat {
    #[default]
    Json,
    Yaml,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Apply a JSON Patch or JSON Merge Patch file to a resource file
    Patch(PatchArgs),
    /// Print the SQL a search compiles to for a configured resource type
    SearchSql(SearchSqlArgs),
    /// Run the embedded PostgreSQL migrations
    Migrate(DatabaseArgs),
    /// Print the version history of a resource from PostgreSQL
    History(HistoryArgs),
    /// Validate the configuration and print it with defaults filled in
    CheckConfig,
}

#[derive(clap::Args)]
pub struct PatchArgs {
    /// Path to the resource JSON file
    pub resource: String,
    /// Path to the patch document
    pub patch: String,
    /// Patch media type; guessed from the patch document when omitted
    #[arg(long)]
    pub content_type: Option<String>,
}

#[derive(clap::Args)]
pub struct SearchSqlArgs {
    /// Resource type (e.g. Basic)
    pub resource_type: String,
    /// Search parameters as key=value pairs (e.g. code=active created=ge2024-01)
    pub params: Vec<String>,
}

#[derive(clap::Args)]
pub struct DatabaseArgs {
    /// PostgreSQL URL (overrides storage.postgres.url)
    #[arg(long, env = "OCTOFHIR_DATABASE_URL")]
    pub database_url: Option<String>,
}

#[derive(clap::Args)]
pub struct HistoryArgs {
    /// Resource reference (e.g. Basic/123)
    pub reference: String,
    /// Only entries recorded at or after this instant (RFC 3339)
    #[arg(long)]
    pub since: Option<String>,
    /// Maximum number of entries
    #[arg(long)]
    pub count: Option<u32>,
    /// Number of entries to skip
    #[arg(long)]
    pub offset: Option<u32>,
    #[command(flatten)]
    pub database: DatabaseArgs,
}
