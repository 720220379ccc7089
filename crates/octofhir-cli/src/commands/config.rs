use anyhow::{Context, Result};
use octofhir_records::AppConfig;

use crate::output::print_success;

/// Prints the validated configuration as TOML, defaults included.
pub fn check(config: &AppConfig) -> Result<()> {
    let rendered = toml::to_string_pretty(config).context("cannot render configuration")?;
    println!("{rendered}");
    print_success(&format!(
        "Configuration valid ({} resource types)",
        config.resources.len()
    ));
    Ok(())
}
