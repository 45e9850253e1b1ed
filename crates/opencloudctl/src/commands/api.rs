//! Raw API access commands for direct REST endpoint calls

use anyhow::Context;
use opencloudctl_core::Query;
use serde_json::Value;
use tracing::debug;

use crate::cli::{self, HttpMethod};
use crate::connection::ConnectionManager;
use crate::error::Result as CliResult;
use crate::output::{OutputFormat, print_output};

/// Parameters for API command execution
pub struct ApiCommandParams<'a> {
    pub profile_name: Option<&'a str>,
    pub method: HttpMethod,
    pub path: &'a str,
    pub data: Option<&'a str>,
    pub query: &'a [(String, String)],
    pub output_format: cli::OutputFormat,
}

/// Handle raw API commands
pub async fn handle_api_command(
    conn_mgr: &ConnectionManager,
    params: ApiCommandParams<'_>,
) -> CliResult<()> {
    let client = conn_mgr.create_client(params.profile_name)?;

    let path = normalize_path(params.path);
    let body = params.data.map(parse_body).transpose()?;
    let query: Query = params.query.iter().cloned().collect();
    debug!("{} {} ({} query parameters)", params.method, path, query.len());

    let response = client
        .request(
            params.method.into(),
            &path,
            body.as_ref(),
            (!query.is_empty()).then_some(&query),
        )
        .await?;

    let result: Value = match response.decode::<Value>() {
        Ok(value) => value,
        // Not JSON; show it as text rather than failing a call that succeeded
        Err(_) => Value::String(String::from_utf8_lossy(response.body()).into_owned()),
    };

    print_output(
        result,
        OutputFormat::resolve(params.output_format, OutputFormat::Json),
    )?;
    Ok(())
}

/// Ensure the path starts with '/'
fn normalize_path(path: &str) -> String {
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{}", path)
    }
}

/// Parse `--data` as a JSON string or `@file`
fn parse_body(data: &str) -> anyhow::Result<Value> {
    if let Some(file_path) = data.strip_prefix('@') {
        let content = std::fs::read_to_string(file_path)
            .with_context(|| format!("Failed to read file: {}", file_path))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse JSON from file: {}", file_path))
    } else {
        serde_json::from_str(data).context("Failed to parse JSON from data parameter")
    }
}
