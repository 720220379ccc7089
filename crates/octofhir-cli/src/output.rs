use crate::cli::OutputFormat;
use colored::Colorize;
use serde_json::Value;

pub fn print_value(value: &Value, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let pretty = serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string());
            println!("{pretty}");
        }
        OutputFormat::Yaml => {
            println!("{}", format_yaml(value, 0));
        }
    }
}

pub fn print_heading(title: &str) {
    println!("{}", title.cyan().bold());
}

pub fn print_success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

pub fn print_error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

/// YAML-like rendering of a JSON value, without a YAML dependency.
fn format_yaml(value: &Value, indent: usize) -> String {
    let prefix = " ".repeat(indent);
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) if s.contains('\n') => format!(
            "|\n{}{}",
            " ".repeat(indent + 2),
            s.replace('\n', &format!("\n{}", " ".repeat(indent + 2)))
        ),
        Value::String(s) => format!("\"{}\"", s.replace('"', "\\\"")),
        Value::Array(items) if items.is_empty() => "[]".to_string(),
        Value::Array(items) => {
            let lines: Vec<String> = items
                .iter()
                .map(|v| format!("{prefix}- {}", format_yaml(v, indent + 2).trim_start()))
                .collect();
            format!("\n{}", lines.join("\n"))
        }
        Value::Object(members) if members.is_empty() => "{}".to_string(),
        Value::Object(members) => {
            let lines: Vec<String> = members
                .iter()
                .map(|(k, v)| {
                    let rendered = format_yaml(v, indent + 2);
                    if rendered.starts_with('\n') {
                        format!("{prefix}{k}:{rendered}")
                    } else {
                        format!("{prefix}{k}: {rendered}")
                    }
                })
                .collect();
            if indent == 0 {
                lines.join("\n")
            } else {
                format!("\n{}", lines.join("\n"))
            }
        }
    }
}
