//! Rendering command results as JSON, YAML, or tables

use anyhow::Result;
use comfy_table::Table;
use serde::Serialize;
use serde_json::Value;

use crate::cli;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Json,
    Yaml,
    Table,
}

impl OutputFormat {
    /// Resolve the global `-o` flag, using `auto_format` for `auto`
    pub fn resolve(format: cli::OutputFormat, auto_format: OutputFormat) -> Self {
        match format {
            cli::OutputFormat::Auto => auto_format,
            cli::OutputFormat::Json => OutputFormat::Json,
            cli::OutputFormat::Yaml => OutputFormat::Yaml,
            cli::OutputFormat::Table => OutputFormat::Table,
        }
    }
}

pub fn print_output<T: Serialize>(data: T, format: OutputFormat) -> Result<()> {
    let json_value = serde_json::to_value(data)?;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&json_value)?);
        }
        OutputFormat::Yaml => {
            print!("{}", serde_yaml::to_string(&json_value)?);
        }
        OutputFormat::Table => {
            println!("{}", render_table(&json_value));
        }
    }

    Ok(())
}

fn render_table(value: &Value) -> String {
    match value {
        Value::Array(arr) if !arr.is_empty() => {
            let mut table = Table::new();

            if let Value::Object(first) = &arr[0] {
                let headers: Vec<String> = first.keys().cloned().collect();
                table.set_header(&headers);

                for item in arr {
                    if let Value::Object(obj) = item {
                        let row: Vec<String> = headers
                            .iter()
                            .map(|h| format_value(obj.get(h).unwrap_or(&Value::Null)))
                            .collect();
                        table.add_row(row);
                    }
                }
            } else {
                table.set_header(vec!["Value"]);
                for item in arr {
                    table.add_row(vec![format_value(item)]);
                }
            }

            table.to_string()
        }
        Value::Object(obj) => {
            let mut table = Table::new();
            table.set_header(vec!["Key", "Value"]);

            for (key, val) in obj {
                table.add_row(vec![key.clone(), format_value(val)]);
            }

            table.to_string()
        }
        _ => format_value(value),
    }
}

fn format_value(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        Value::Array(arr) => format!("[{} items]", arr.len()),
        Value::Object(obj) => format!("{{{} fields}}", obj.len()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_auto_uses_command_default() {
        assert_eq!(
            OutputFormat::resolve(cli::OutputFormat::Auto, OutputFormat::Table),
            OutputFormat::Table
        );
        assert_eq!(
            OutputFormat::resolve(cli::OutputFormat::Yaml, OutputFormat::Table),
            OutputFormat::Yaml
        );
    }

    #[test]
    fn test_nested_values_are_summarized() {
        assert_eq!(format_value(&json!([1, 2, 3])), "[3 items]");
        assert_eq!(format_value(&json!({"a": 1})), "{1 fields}");
        assert_eq!(format_value(&json!("plain")), "plain");
    }

    #[test]
    fn test_table_has_row_per_object() {
        let rendered = render_table(&json!([
            {"name": "prod", "auth": "api_key"},
            {"name": "staging", "auth": "oauth"}
        ]));
        assert!(rendered.contains("prod"));
        assert!(rendered.contains("staging"));
        assert!(rendered.contains("oauth"));
    }
}
