//! Luau execution command implementations
//!
//! `--wait` drives the core [`TaskTracker`] and shows its progress events on
//! a spinner.

use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use opencloudctl_core::luau::{
    CreateTaskRequest, LogPageOptions, LuauExecutionHandler, LuauExecutionTask, TaskLogs,
    TaskPath, TaskState, TaskTracker, WaitOptions,
};
use opencloudctl_core::{OpenCloudClient, ProgressEvent};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::cli::{self, LuauCommands, WaitArgs};
use crate::connection::ConnectionManager;
use crate::error::{CliError, Result as CliResult};
use crate::output::{OutputFormat, print_output};

/// Handle Luau execution commands
pub async fn handle_luau_command(
    luau_cmd: &LuauCommands,
    conn_mgr: &ConnectionManager,
    profile_name: Option<&str>,
    output_format: cli::OutputFormat,
) -> CliResult<()> {
    let client = conn_mgr.create_client(profile_name)?;

    match luau_cmd {
        LuauCommands::Run {
            universe,
            place,
            place_version,
            script,
            file,
            script_timeout,
            binary_input,
            binary_output,
            wait,
        } => {
            let source = match (script, file) {
                (Some(script), _) => Some(script.clone()),
                (None, Some(path)) => Some(read_script(path)?),
                (None, None) => None,
            };
            let mut request = source
                .map(CreateTaskRequest::script)
                .unwrap_or_default();
            if let Some(secs) = script_timeout {
                request = request.with_timeout(Duration::from_secs(*secs));
            }
            if binary_output.is_some() {
                request = request.with_binary_output();
            }

            let handler = LuauExecutionHandler::new(client.clone());
            if let Some(path) = binary_input {
                let input_path = upload_binary_input(&handler, universe, path).await?;
                request = request.with_binary_input(input_path);
            }

            let task = handler
                .create_task(universe, place, place_version.as_deref(), &request)
                .await?;
            info!("Created task {}", task.path);

            if !wait.wait {
                return print_task(&task, output_format);
            }

            let finished = wait_for_task(&client, &task.task_path()?, wait).await?;
            if let Some(path) = binary_output {
                save_binary_output(&client, &finished, path).await?;
            }
            finish(&finished, output_format)
        }
        LuauCommands::Task { path, wait } => {
            let task_path = TaskPath::parse(path)?;
            if wait.wait {
                let finished = wait_for_task(&client, &task_path, wait).await?;
                finish(&finished, output_format)
            } else {
                let task = LuauExecutionHandler::new(client)
                    .get_task(&task_path)
                    .await?;
                print_task(&task, output_format)
            }
        }
        LuauCommands::Logs {
            path,
            max_page_size,
            page_token,
            all,
        } => {
            let task_path = TaskPath::parse(path)?;
            let handler = LuauExecutionHandler::new(client);
            let mut options = LogPageOptions {
                max_page_size: *max_page_size,
                page_token: page_token.clone(),
            };

            let mut logs = handler.list_task_logs(&task_path, &options).await?;
            let mut seen_tokens = HashSet::new();
            while *all && let Some(token) = logs.next_page().map(str::to_string) {
                if !seen_tokens.insert(token.clone()) {
                    warn!("Server repeated page token '{}', stopping", token);
                    logs.next_page_token.clear();
                    break;
                }
                debug!("Fetching next log page");
                options.page_token = Some(token);
                let page = handler.list_task_logs(&task_path, &options).await?;
                logs.luau_execution_session_task_logs
                    .extend(page.luau_execution_session_task_logs);
                logs.next_page_token = page.next_page_token;
            }

            print_logs(&logs, output_format)
        }
    }
}

fn read_script(path: &Path) -> CliResult<String> {
    std::fs::read_to_string(path).map_err(|e| CliError::FileError {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}

/// Reserve a binary input slot, upload the file, and return the input's path
async fn upload_binary_input(
    handler: &LuauExecutionHandler,
    universe: &str,
    path: &Path,
) -> CliResult<String> {
    let data = std::fs::read(path).map_err(|e| CliError::FileError {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    let input = handler
        .create_binary_input(universe, data.len() as u64)
        .await?;
    info!("Uploading {} bytes to {}", data.len(), input.path);
    let input_path = input.path.clone();
    handler.upload_binary_input(&input, data).await?;
    Ok(input_path)
}

async fn save_binary_output(
    client: &OpenCloudClient,
    task: &LuauExecutionTask,
    path: &Path,
) -> CliResult<()> {
    match task.binary_output(client).await? {
        Some(bytes) => {
            std::fs::write(path, &bytes).map_err(|e| CliError::FileError {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;
            info!("Wrote {} bytes of binary output", bytes.len());
        }
        None => warn!("Task {} produced no binary output", task.path),
    }
    Ok(())
}

/// Wait for a task with a spinner showing its state
async fn wait_for_task(
    client: &OpenCloudClient,
    path: &TaskPath,
    wait: &WaitArgs,
) -> CliResult<LuauExecutionTask> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg} [{elapsed_precise}]")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(format!("Waiting for task {}", path));
    pb.enable_steady_tick(Duration::from_millis(120));

    let pb_clone = pb.clone();
    let mut options = WaitOptions::default()
        .with_interval(Duration::from_secs(wait.interval))
        .with_progress(Box::new(move |event: ProgressEvent| match event {
            ProgressEvent::Started { task_path } => {
                pb_clone.set_message(format!("Task {} started", task_path));
            }
            ProgressEvent::Polling { state, elapsed, .. } => {
                pb_clone.set_message(format!(
                    "{} ({:.0}s)",
                    format_task_state(state),
                    elapsed.as_secs_f64()
                ));
            }
            ProgressEvent::Completed { .. } => {
                pb_clone.finish_with_message(format_task_state(TaskState::Complete));
            }
            ProgressEvent::Failed { error, .. } => {
                pb_clone.finish_with_message(format!("Failed: {}", error));
            }
        }));
    if let Some(secs) = wait.timeout {
        options = options.with_timeout(Duration::from_secs(secs));
    }

    let result = TaskTracker::new(client.clone())
        .wait_for_task(path, options)
        .wait()
        .await;
    pb.finish_and_clear();
    Ok(result?)
}

/// Print a waited-on task and fail if it did not complete
fn finish(task: &LuauExecutionTask, output_format: cli::OutputFormat) -> CliResult<()> {
    print_task(task, output_format)?;
    match task.failure_reason() {
        Some(message) => Err(CliError::TaskFailed { message }),
        None => Ok(()),
    }
}

/// Format task state for display with status icons
fn format_task_state(state: TaskState) -> String {
    match state {
        TaskState::Complete => format!("\u{2713} {}", state),
        TaskState::Failed => format!("\u{2717} {}", state),
        TaskState::Cancelled => format!("\u{2298} {}", state),
        TaskState::Processing => format!("\u{21bb} {}", state),
        _ => state.to_string(),
    }
}

fn print_task(task: &LuauExecutionTask, output_format: cli::OutputFormat) -> CliResult<()> {
    match OutputFormat::resolve(output_format, OutputFormat::Table) {
        OutputFormat::Table => {
            println!("Task:  {}", task.path);
            println!("State: {}", format_task_state(task.state));
            if let Some(error) = &task.error {
                println!("Error: {}", error);
            }
            for (i, value) in task.results().iter().enumerate() {
                println!("  [{}] {}", i + 1, format_result(value));
            }
        }
        format => print_output(task, format)?,
    }
    Ok(())
}

/// Strings print bare; everything else as compact JSON
fn format_result(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn print_logs(logs: &TaskLogs, output_format: cli::OutputFormat) -> CliResult<()> {
    match OutputFormat::resolve(output_format, OutputFormat::Table) {
        OutputFormat::Table => {
            for message in logs.messages() {
                println!("{}", message);
            }
            if let Some(token) = logs.next_page() {
                eprintln!("More logs available: --page-token {}", token);
            }
        }
        format => print_output(logs, format)?,
    }
    Ok(())
}
