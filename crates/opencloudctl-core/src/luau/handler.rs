//! Luau execution endpoints
//!
//! Tasks are created against a place (optionally pinned to a version),
//! then fetched by the path the API hands back until they finish.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::task::{LuauExecutionTask, TaskPath};
use crate::client::{OpenCloudClient, Query};
use crate::error::{CoreError, Result};

/// Body for creating a task
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub script: Option<String>,
    /// Protobuf duration string, e.g. `"300s"`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,
    /// Path of a binary input created with [`LuauExecutionHandler::create_binary_input`]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub binary_input: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enable_binary_output: Option<bool>,
}

impl CreateTaskRequest {
    pub fn script(source: impl Into<String>) -> Self {
        Self {
            script: Some(source.into()),
            ..Self::default()
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(format!("{}s", timeout.as_secs()));
        self
    }

    pub fn with_binary_input(mut self, path: impl Into<String>) -> Self {
        self.binary_input = Some(path.into());
        self
    }

    pub fn with_binary_output(mut self) -> Self {
        self.enable_binary_output = Some(true);
        self
    }

    pub fn validate(&self) -> Result<()> {
        let has_script = self.script.as_deref().is_some_and(|s| !s.trim().is_empty());
        if !has_script && self.binary_input.is_none() {
            return Err(CoreError::Validation(
                "a task needs a script or a binary input".to_string(),
            ));
        }
        Ok(())
    }
}

/// A reserved upload slot for task binary input
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BinaryInput {
    pub path: String,
    pub size: u64,
    pub upload_uri: String,
}

#[derive(Serialize)]
struct CreateBinaryInput {
    size: u64,
}

/// One chunk of a task's log output
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskLogChunk {
    pub path: String,
    pub messages: Vec<String>,
}

/// One page of log chunks
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TaskLogs {
    pub luau_execution_session_task_logs: Vec<TaskLogChunk>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub next_page_token: String,
}

impl TaskLogs {
    /// All messages on this page, in order
    pub fn messages(&self) -> impl Iterator<Item = &str> {
        self.luau_execution_session_task_logs
            .iter()
            .flat_map(|chunk| chunk.messages.iter().map(String::as_str))
    }

    pub fn next_page(&self) -> Option<&str> {
        (!self.next_page_token.is_empty()).then_some(self.next_page_token.as_str())
    }
}

/// Paging options for [`LuauExecutionHandler::list_task_logs`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogPageOptions {
    pub max_page_size: Option<u32>,
    pub page_token: Option<String>,
}

impl LogPageOptions {
    fn to_query(&self) -> Query {
        let mut query = Query::new();
        if let Some(size) = self.max_page_size {
            query.insert("maxPageSize".to_string(), size.to_string());
        }
        if let Some(token) = &self.page_token {
            query.insert("pageToken".to_string(), token.clone());
        }
        query
    }
}

/// Luau execution session task operations
#[derive(Debug, Clone)]
pub struct LuauExecutionHandler {
    client: OpenCloudClient,
}

impl LuauExecutionHandler {
    pub fn new(client: OpenCloudClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &OpenCloudClient {
        &self.client
    }

    /// Start running a script in a place
    #[instrument(skip(self, request))]
    pub async fn create_task(
        &self,
        universe_id: &str,
        place_id: &str,
        version_id: Option<&str>,
        request: &CreateTaskRequest,
    ) -> Result<LuauExecutionTask> {
        request.validate()?;

        let mut path = format!("/cloud/v2/universes/{universe_id}/places/{place_id}");
        if let Some(version) = version_id {
            path.push_str(&format!("/versions/{version}"));
        }
        path.push_str("/luau-execution-session-tasks");

        let task: LuauExecutionTask = self.client.post(&path, request).await?;
        debug!(task_path = %task.path, state = %task.state, "created Luau task");
        Ok(task)
    }

    /// Current snapshot of a task
    pub async fn get_task(&self, path: &TaskPath) -> Result<LuauExecutionTask> {
        self.client.get(&path.resource_path()).await
    }

    /// One page of a task's log chunks
    pub async fn list_task_logs(
        &self,
        path: &TaskPath,
        options: &LogPageOptions,
    ) -> Result<TaskLogs> {
        self.client
            .get_with_query(&path.logs_path(), Some(&options.to_query()))
            .await
    }

    /// Reserve an upload slot of `size` bytes for task binary input
    #[instrument(skip(self))]
    pub async fn create_binary_input(&self, universe_id: &str, size: u64) -> Result<BinaryInput> {
        let path =
            format!("/cloud/v2/universes/{universe_id}/luau-execution-session-task-binary-inputs");
        self.client.post(&path, &CreateBinaryInput { size }).await
    }

    /// Upload the bytes for a reserved binary input
    ///
    /// The upload URI is pre-signed; no credential is sent with it.
    pub async fn upload_binary_input(&self, input: &BinaryInput, data: Vec<u8>) -> Result<()> {
        if input.upload_uri.is_empty() {
            return Err(CoreError::Validation(format!(
                "binary input '{}' has no upload URI",
                input.path
            )));
        }
        if data.len() as u64 != input.size {
            return Err(CoreError::Validation(format!(
                "binary input '{}' expects {} bytes, got {}",
                input.path,
                input.size,
                data.len()
            )));
        }

        self.client.upload_binary(&input.upload_uri, data).await?;
        Ok(())
    }
}
