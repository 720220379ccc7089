use std::collections::HashMap;

use anyhow::{Result, anyhow, bail};
use octofhir_records::AppConfig;
use octofhir_search::{BuiltQuery, CompiledSearch};
use serde_json::{Value, json};

use crate::cli::{OutputFormat, SearchSqlArgs};
use crate::output::{print_heading, print_value};

/// Turns `key=value` arguments into raw query parameters. A repeated key keeps its last value.
pub fn parse_params(raw_params: &[String]) -> Result<HashMap<String, String>> {
    let mut params = HashMap::new();
    for raw in raw_params {
        let Some((key, value)) = raw.split_once('=') else {
            bail!("search parameter '{raw}' must have the form key=value");
        };
        if key.is_empty() {
            bail!("search parameter '{raw}' has an empty name");
        }
        params.insert(key.to_string(), value.to_string());
    }
    Ok(params)
}

pub fn compile(config: &AppConfig, args: &SearchSqlArgs) -> Result<CompiledSearch> {
    let settings = config
        .resource(&args.resource_type)
        .ok_or_else(|| anyhow!("resource type '{}' is not configured", args.resource_type))?;
    let raw = parse_params(&args.params)?;
    Ok(settings.compile_search(&raw, config.search)?)
}

fn statement_json(query: &BuiltQuery) -> Value {
    json!({
        "sql": query.sql,
        "params": query.params.iter().map(|p| p.to_string()).collect::<Vec<_>>(),
    })
}

fn print_statement(title: &str, query: &BuiltQuery) {
    print_heading(title);
    println!("{}", query.sql);
    for (i, param) in query.params.iter().enumerate() {
        println!("  ${} = {param}", i + 1);
    }
}

pub fn run(config: &AppConfig, args: &SearchSqlArgs, format: Option<OutputFormat>) -> Result<()> {
    let compiled = compile(config, args)?;
    match format {
        Some(format) => print_value(
            &json!({
                "count": statement_json(&compiled.count),
                "data": statement_json(&compiled.data),
                "limit": compiled.pagination.limit,
                "offset": compiled.pagination.offset,
            }),
            format,
        ),
        None => {
            print_statement("count", &compiled.count);
            print_statement("data", &compiled.data);
        }
    }
    Ok(())
}
