//! Luau execution task model and task path parsing

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::client::OpenCloudClient;
use crate::error::{CoreError, Result};

/// Lifecycle state of a Luau execution task
///
/// Moves forward only: `Queued → Processing → {Cancelled | Complete | Failed}`.
/// Wire values this crate does not know decode to `Unspecified`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "&'static str")]
pub enum TaskState {
    #[default]
    Unspecified,
    Queued,
    Processing,
    Cancelled,
    Complete,
    Failed,
}

impl TaskState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskState::Unspecified => "STATE_UNSPECIFIED",
            TaskState::Queued => "QUEUED",
            TaskState::Processing => "PROCESSING",
            TaskState::Cancelled => "CANCELLED",
            TaskState::Complete => "COMPLETE",
            TaskState::Failed => "FAILED",
        }
    }

    /// `Complete`, `Failed` and `Cancelled` never transition further
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskState::Complete | TaskState::Failed | TaskState::Cancelled
        )
    }

    /// Position in the forward-only lifecycle
    pub fn rank(&self) -> u8 {
        match self {
            TaskState::Unspecified => 0,
            TaskState::Queued => 1,
            TaskState::Processing => 2,
            TaskState::Cancelled | TaskState::Complete | TaskState::Failed => 3,
        }
    }
}

impl From<String> for TaskState {
    fn from(value: String) -> Self {
        match value.as_str() {
            "QUEUED" => TaskState::Queued,
            "PROCESSING" => TaskState::Processing,
            "CANCELLED" => TaskState::Cancelled,
            "COMPLETE" => TaskState::Complete,
            "FAILED" => TaskState::Failed,
            _ => TaskState::Unspecified,
        }
    }
}

impl From<TaskState> for &'static str {
    fn from(state: TaskState) -> Self {
        state.as_str()
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a task ended in `FAILED`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "&'static str")]
pub enum TaskErrorCode {
    #[default]
    Unspecified,
    ScriptError,
    DeadlineExceeded,
    OutputSizeLimitExceeded,
    InternalError,
}

impl TaskErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskErrorCode::Unspecified => "ERROR_CODE_UNSPECIFIED",
            TaskErrorCode::ScriptError => "SCRIPT_ERROR",
            TaskErrorCode::DeadlineExceeded => "DEADLINE_EXCEEDED",
            TaskErrorCode::OutputSizeLimitExceeded => "OUTPUT_SIZE_LIMIT_EXCEEDED",
            TaskErrorCode::InternalError => "INTERNAL_ERROR",
        }
    }
}

impl From<String> for TaskErrorCode {
    fn from(value: String) -> Self {
        match value.as_str() {
            "SCRIPT_ERROR" => TaskErrorCode::ScriptError,
            "DEADLINE_EXCEEDED" => TaskErrorCode::DeadlineExceeded,
            "OUTPUT_SIZE_LIMIT_EXCEEDED" => TaskErrorCode::OutputSizeLimitExceeded,
            "INTERNAL_ERROR" => TaskErrorCode::InternalError,
            _ => TaskErrorCode::Unspecified,
        }
    }
}

impl From<TaskErrorCode> for &'static str {
    fn from(code: TaskErrorCode) -> Self {
        code.as_str()
    }
}

impl fmt::Display for TaskErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskError {
    pub code: TaskErrorCode,
    pub message: String,
}

impl fmt::Display for TaskError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

/// Values returned by the script, in order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskOutput {
    pub results: Vec<Value>,
}

/// A Luau execution session task
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LuauExecutionTask {
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub create_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub update_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    pub state: TaskState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub script: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,
    /// Only set when `state` is `FAILED`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<TaskError>,
    /// Only set when `state` is `COMPLETE`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<TaskOutput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub binary_input: Option<String>,
    pub enable_binary_output: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub binary_output_uri: Option<String>,
}

impl LuauExecutionTask {
    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Identifiers encoded in `path`
    pub fn task_path(&self) -> Result<TaskPath> {
        TaskPath::parse(&self.path)
    }

    /// Script return values, empty unless the task completed
    pub fn results(&self) -> &[Value] {
        self.output
            .as_ref()
            .map(|output| output.results.as_slice())
            .unwrap_or_default()
    }

    /// Human-readable reason for a FAILED or CANCELLED task
    pub fn failure_reason(&self) -> Option<String> {
        match self.state {
            TaskState::Failed => Some(
                self.error
                    .as_ref()
                    .map(ToString::to_string)
                    .unwrap_or_else(|| "task failed without error detail".to_string()),
            ),
            TaskState::Cancelled => Some("task was cancelled".to_string()),
            _ => None,
        }
    }

    /// Download the binary output
    ///
    /// Returns `Ok(None)` unless binary output was enabled and a URI is
    /// present. The URI is pre-signed, so no credential is sent.
    pub async fn binary_output(&self, client: &OpenCloudClient) -> Result<Option<Vec<u8>>> {
        match self.binary_output_uri.as_deref() {
            Some(uri) if self.enable_binary_output && !uri.is_empty() => {
                client.fetch_unauthenticated(uri).await.map(Some)
            }
            _ => Ok(None),
        }
    }
}

fn task_path_pattern() -> &'static Regex {
    static TASK_PATH_RE: OnceLock<Regex> = OnceLock::new();
    TASK_PATH_RE.get_or_init(|| {
        Regex::new(concat!(
            r"(?:^|/)universes/(?P<universe_id>\d+)/places/(?P<place_id>\d+)/",
            r"(?:versions/(?P<version_id>\d+)/)?",
            r"(?:luau-execution-sessions/(?P<session_id>[^/]+)/tasks/(?P<session_task_id>[^/]+)",
            r"|luau-execution-session-tasks/(?P<task_id>[^/]+)",
            r"|luau-execution-tasks/(?P<flat_task_id>[^/]+))",
            r"/?$",
        ))
        .expect("task path pattern is valid")
    })
}

/// Identifiers parsed from a task's resource path
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TaskPath {
    pub universe_id: String,
    pub place_id: String,
    pub version_id: Option<String>,
    pub session_id: Option<String>,
    pub task_id: String,
}

impl TaskPath {
    /// Parse a session-scoped or flat task path
    ///
    /// A leading `/cloud/v2/` or full URL prefix is tolerated.
    pub fn parse(path: &str) -> Result<Self> {
        let caps = task_path_pattern()
            .captures(path)
            .ok_or_else(|| CoreError::Validation(format!("not a Luau task path: '{path}'")))?;

        let group = |name: &str| caps.name(name).map(|m| m.as_str().to_string());
        let task_id = group("session_task_id")
            .or_else(|| group("task_id"))
            .or_else(|| group("flat_task_id"))
            .unwrap_or_default();

        Ok(Self {
            universe_id: group("universe_id").unwrap_or_default(),
            place_id: group("place_id").unwrap_or_default(),
            version_id: group("version_id"),
            session_id: group("session_id"),
            task_id,
        })
    }

    /// The place the task runs in, optionally pinned to a version
    pub fn place_path(&self) -> String {
        let mut path = format!(
            "/cloud/v2/universes/{}/places/{}",
            self.universe_id, self.place_id
        );
        if let Some(version) = &self.version_id {
            path.push_str(&format!("/versions/{version}"));
        }
        path
    }

    /// API path used to fetch this task
    pub fn resource_path(&self) -> String {
        let mut path = self.place_path();
        match &self.session_id {
            Some(session) => {
                path.push_str(&format!(
                    "/luau-execution-sessions/{session}/tasks/{}",
                    self.task_id
                ));
            }
            None => path.push_str(&format!("/luau-execution-tasks/{}", self.task_id)),
        }
        path
    }

    /// API path listing this task's log chunks
    pub fn logs_path(&self) -> String {
        format!("{}/logs", self.resource_path())
    }
}

impl FromStr for TaskPath {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for TaskPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.resource_path())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_terminal_states() {
        for state in [TaskState::Complete, TaskState::Failed, TaskState::Cancelled] {
            assert!(state.is_terminal(), "{state} should be terminal");
        }
        for state in [
            TaskState::Queued,
            TaskState::Processing,
            TaskState::Unspecified,
        ] {
            assert!(!state.is_terminal(), "{state} should not be terminal");
        }
    }

    #[test]
    fn test_state_ranks_move_forward() {
        assert!(TaskState::Queued.rank() < TaskState::Processing.rank());
        assert!(TaskState::Processing.rank() < TaskState::Complete.rank());
        assert_eq!(TaskState::Failed.rank(), TaskState::Cancelled.rank());
    }

    #[test]
    fn test_state_wire_names() {
        let state: TaskState = serde_json::from_value(json!("PROCESSING")).unwrap();
        assert_eq!(state, TaskState::Processing);
        assert_eq!(
            serde_json::to_value(TaskState::Unspecified).unwrap(),
            json!("STATE_UNSPECIFIED")
        );

        let unknown: TaskState = serde_json::from_value(json!("PAUSED")).unwrap();
        assert_eq!(unknown, TaskState::Unspecified);
    }

    #[test]
    fn test_task_decodes_from_api_shape() {
        let task: LuauExecutionTask = serde_json::from_value(json!({
            "path": "universes/1/places/2/luau-execution-sessions/S1/tasks/T1",
            "createTime": "2025-01-01T00:00:00Z",
            "updateTime": "2025-01-01T00:00:05Z",
            "user": "users/42",
            "state": "FAILED",
            "script": "error('boom')",
            "timeout": "300s",
            "error": { "code": "SCRIPT_ERROR", "message": "boom" },
            "enableBinaryOutput": false
        }))
        .unwrap();

        assert_eq!(task.state, TaskState::Failed);
        assert_eq!(task.user.as_deref(), Some("users/42"));
        let error = task.error.as_ref().unwrap();
        assert_eq!(error.code, TaskErrorCode::ScriptError);
        assert_eq!(error.message, "boom");
        assert_eq!(
            task.failure_reason().as_deref(),
            Some("SCRIPT_ERROR: boom")
        );
        assert!(task.results().is_empty());
    }

    #[test]
    fn test_task_results() {
        let task: LuauExecutionTask = serde_json::from_value(json!({
            "path": "universes/1/places/2/luau-execution-session-tasks/T1",
            "state": "COMPLETE",
            "output": { "results": [1, "two", { "three": 3 }] }
        }))
        .unwrap();

        assert_eq!(task.results(), &[json!(1), json!("two"), json!({"three": 3})]);
        assert_eq!(task.failure_reason(), None);
    }

    #[test]
    fn test_parse_session_scoped_path() {
        let path = TaskPath::parse("universes/1/places/2/luau-execution-sessions/S1/tasks/T1").unwrap();
        assert_eq!(
            path,
            TaskPath {
                universe_id: "1".into(),
                place_id: "2".into(),
                version_id: None,
                session_id: Some("S1".into()),
                task_id: "T1".into(),
            }
        );
    }

    #[test]
    fn test_parse_versioned_flat_path() {
        let path =
            TaskPath::parse("universes/1/places/2/versions/15/luau-execution-session-tasks/T1")
                .unwrap();
        assert_eq!(path.version_id.as_deref(), Some("15"));
        assert_eq!(path.session_id, None);
        assert_eq!(path.task_id, "T1");
    }

    #[test]
    fn test_parse_get_shape_and_prefixes() {
        let path = TaskPath::parse(
            "/cloud/v2/universes/10/places/20/versions/3/luau-execution-tasks/abc-def",
        )
        .unwrap();
        assert_eq!(path.universe_id, "10");
        assert_eq!(path.place_id, "20");
        assert_eq!(path.version_id.as_deref(), Some("3"));
        assert_eq!(path.task_id, "abc-def");
    }

    #[test]
    fn test_parse_rejects_other_paths() {
        for bad in [
            "",
            "universes/1",
            "universes/1/places/2/instances/root",
            "universes/x/places/2/luau-execution-session-tasks/T1",
            "xxuniverses/1/places/2/luau-execution-session-tasks/T1",
            "/cloud/v2/myuniverses/1/places/2/luau-execution-session-tasks/T1",
            "universes/1/places/2/versions/V1/luau-execution-session-tasks/T1",
        ] {
            assert!(
                matches!(TaskPath::parse(bad), Err(CoreError::Validation(_))),
                "{bad:?} should not parse"
            );
        }
    }

    #[test]
    fn test_resource_paths() {
        let session = TaskPath::parse("universes/1/places/2/luau-execution-sessions/S1/tasks/T1").unwrap();
        assert_eq!(
            session.resource_path(),
            "/cloud/v2/universes/1/places/2/luau-execution-sessions/S1/tasks/T1"
        );

        let flat: TaskPath = "universes/1/places/2/versions/7/luau-execution-session-tasks/T9"
            .parse()
            .unwrap();
        assert_eq!(
            flat.resource_path(),
            "/cloud/v2/universes/1/places/2/versions/7/luau-execution-tasks/T9"
        );
        assert_eq!(
            flat.logs_path(),
            "/cloud/v2/universes/1/places/2/versions/7/luau-execution-tasks/T9/logs"
        );
    }

    #[tokio::test]
    async fn test_binary_output_skipped_when_disabled() {
        let client = OpenCloudClient::builder().api_key("k").build().unwrap();
        let task = LuauExecutionTask {
            enable_binary_output: false,
            binary_output_uri: Some("https://example.invalid/out".into()),
            ..Default::default()
        };
        assert_eq!(task.binary_output(&client).await.unwrap(), None);

        let task = LuauExecutionTask {
            enable_binary_output: true,
            binary_output_uri: Some(String::new()),
            ..Default::default()
        };
        assert_eq!(task.binary_output(&client).await.unwrap(), None);
    }
}
