//! Integration tests for the typed client against a mock Open Cloud server

use opencloudctl_core::luau::{
    BinaryInput, CreateTaskRequest, LogPageOptions, LuauExecutionHandler, TaskPath, TaskState,
};
use opencloudctl_core::universes::{PlaceUpdate, UniverseHandler, UniverseMessage};
use opencloudctl_core::{CoreError, Discard, OpenCloudClient, Query};
use reqwest::Method;
use serde::Deserialize;
use serde_json::{Value, json};
use wiremock::matchers::{body_bytes, body_json, header, header_exists, method, path, query_param};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

fn api_key_client(server: &MockServer) -> OpenCloudClient {
    OpenCloudClient::builder()
        .api_key("test-key")
        .base_url(server.uri())
        .build()
        .unwrap()
}

fn oauth_client(server: &MockServer) -> OpenCloudClient {
    OpenCloudClient::builder()
        .oauth_token("test-token")
        .base_url(server.uri())
        .build()
        .unwrap()
}

#[derive(Debug, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct UniverseSummary {
    path: String,
    display_name: String,
    voice_chat_enabled: bool,
}

// ============================================================================
// Authentication
// ============================================================================

#[tokio::test]
async fn test_api_key_header_sent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/cloud/v2/universes/1"))
        .and(header("x-api-key", "test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"path": "universes/1"})))
        .expect(1)
        .mount(&server)
        .await;

    let client = api_key_client(&server);
    let universe: UniverseSummary = client.get("/cloud/v2/universes/1").await.unwrap();
    assert_eq!(universe.path, "universes/1");

    let requests = server.received_requests().await.unwrap();
    assert!(requests[0].headers.get("authorization").is_none());
}

#[tokio::test]
async fn test_oauth_header_sent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/cloud/v2/universes/1"))
        .and(header("authorization", "Bearer test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let client = oauth_client(&server);
    let _: Value = client.get("/cloud/v2/universes/1").await.unwrap();

    let requests = server.received_requests().await.unwrap();
    assert!(requests[0].headers.get("x-api-key").is_none());
}

// ============================================================================
// Responses
// ============================================================================

#[tokio::test]
async fn test_non_success_returns_exact_status_and_bytes() {
    let server = MockServer::start().await;
    let error_body = br#"{"code":"NOT_FOUND","message":"universe not found"}"#;
    Mock::given(method("GET"))
        .and(path("/cloud/v2/universes/404"))
        .respond_with(ResponseTemplate::new(404).set_body_bytes(error_body.to_vec()))
        .mount(&server)
        .await;

    let client = api_key_client(&server);
    let err = client
        .request(Method::GET, "/cloud/v2/universes/404", None::<&()>, None)
        .await
        .unwrap_err();

    assert!(err.is_not_found());
    match err {
        CoreError::Http(fault) => {
            assert_eq!(fault.status, 404);
            assert_eq!(fault.status_text, "404 Not Found");
            assert_eq!(fault.body, error_body.to_vec());
            let payload: Value = fault.json().unwrap();
            assert_eq!(payload["code"], "NOT_FOUND");
        }
        other => panic!("expected Http error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_non_json_error_body_is_still_an_http_fault() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(502).set_body_string("<html>bad gateway</html>"))
        .mount(&server)
        .await;

    let client = api_key_client(&server);
    let err = client
        .get::<UniverseSummary>("/cloud/v2/universes/1")
        .await
        .unwrap_err();

    assert!(err.is_server_error());
    assert!(err.is_retryable());
    match err {
        CoreError::Http(fault) => assert_eq!(fault.body_text(), "<html>bad gateway</html>"),
        other => panic!("expected Http error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_success_decodes_every_field() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/cloud/v2/universes/7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "path": "universes/7",
            "displayName": "Obby <Deluxe> & Friends",
            "voiceChatEnabled": true,
            "ignoredField": [1, 2, 3]
        })))
        .mount(&server)
        .await;

    let client = api_key_client(&server);
    let universe: UniverseSummary = client.get("/cloud/v2/universes/7").await.unwrap();
    assert_eq!(
        universe,
        UniverseSummary {
            path: "universes/7".into(),
            display_name: "Obby <Deluxe> & Friends".into(),
            voice_chat_enabled: true,
        }
    );
}

#[tokio::test]
async fn test_empty_success_body_decodes_to_default() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/cloud/v2/thing"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let client = api_key_client(&server);
    let decoded: UniverseSummary = client.delete("/cloud/v2/thing").await.unwrap();
    assert_eq!(decoded, UniverseSummary::default());
}

#[tokio::test]
async fn test_success_with_wrong_shape_is_decode_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let client = api_key_client(&server);
    let response = client
        .request(Method::GET, "/cloud/v2/universes/1", None::<&()>, None)
        .await
        .unwrap();

    // Raw bytes stay available after a failed decode
    assert!(matches!(
        response.decode::<UniverseSummary>(),
        Err(CoreError::Decode { .. })
    ));
    assert_eq!(response.body(), b"not json");
}

// ============================================================================
// Requests
// ============================================================================

#[tokio::test]
async fn test_json_body_is_not_html_escaped() {
    let server = MockServer::start().await;
    let script = "local a = 1 < 2 and 3 > 2; print('<b>&</b>')";
    Mock::given(method("POST"))
        .and(path("/cloud/v2/echo"))
        .and(header("content-type", "application/json"))
        .and(body_bytes(
            serde_json::to_vec(&json!({ "script": script })).unwrap(),
        ))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let client = api_key_client(&server);
    let _: Discard = client
        .post("/cloud/v2/echo", &json!({ "script": script }))
        .await
        .unwrap();

    let requests = server.received_requests().await.unwrap();
    let sent = String::from_utf8(requests[0].body.clone()).unwrap();
    assert!(sent.contains("1 < 2 and 3 > 2"));
    assert!(sent.contains("<b>&</b>"));
}

#[tokio::test]
async fn test_query_is_sorted_and_skips_empty_values() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/cloud/v2/list"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&server)
        .await;

    let client = api_key_client(&server);
    let mut query = Query::new();
    query.insert("pageToken".into(), "abc def".into());
    query.insert("filter".into(), String::new());
    query.insert("maxPageSize".into(), "25".into());

    let _: Value = client
        .get_with_query("/cloud/v2/list", Some(&query))
        .await
        .unwrap();

    let requests = server.received_requests().await.unwrap();
    assert_eq!(
        requests[0].url.query(),
        Some("maxPageSize=25&pageToken=abc+def")
    );
}

// ============================================================================
// Luau execution
// ============================================================================

#[tokio::test]
async fn test_create_task_posts_to_versioned_place() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(
            "/cloud/v2/universes/1/places/2/versions/3/luau-execution-session-tasks",
        ))
        .and(body_json(json!({ "script": "return 42", "timeout": "60s" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "path": "universes/1/places/2/versions/3/luau-execution-sessions/S1/tasks/T1",
            "state": "QUEUED",
            "script": "return 42"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let handler = LuauExecutionHandler::new(api_key_client(&server));
    let request =
        CreateTaskRequest::script("return 42").with_timeout(std::time::Duration::from_secs(60));
    let task = handler
        .create_task("1", "2", Some("3"), &request)
        .await
        .unwrap();

    assert_eq!(task.state, TaskState::Queued);
    let parsed = task.task_path().unwrap();
    assert_eq!(parsed.session_id.as_deref(), Some("S1"));
    assert_eq!(parsed.version_id.as_deref(), Some("3"));
}

#[tokio::test]
async fn test_create_task_validation_happens_before_network() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let handler = LuauExecutionHandler::new(api_key_client(&server));
    let err = handler
        .create_task("1", "2", None, &CreateTaskRequest::default())
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Validation(_)));
}

#[tokio::test]
async fn test_list_task_logs_pages() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(
            "/cloud/v2/universes/1/places/2/luau-execution-sessions/S1/tasks/T1/logs",
        ))
        .and(query_param("maxPageSize", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "luauExecutionSessionTaskLogs": [
                { "path": "universes/1/places/2/luau-execution-sessions/S1/tasks/T1/logs/1",
                  "messages": ["hello", "world"] }
            ],
            "nextPageToken": "page-2"
        })))
        .mount(&server)
        .await;

    let handler = LuauExecutionHandler::new(api_key_client(&server));
    let path = TaskPath::parse("universes/1/places/2/luau-execution-sessions/S1/tasks/T1").unwrap();
    let logs = handler
        .list_task_logs(
            &path,
            &LogPageOptions {
                max_page_size: Some(2),
                page_token: None,
            },
        )
        .await
        .unwrap();

    assert_eq!(logs.messages().collect::<Vec<_>>(), ["hello", "world"]);
    assert_eq!(logs.next_page(), Some("page-2"));
}

#[tokio::test]
async fn test_binary_input_create_and_unauthenticated_upload() {
    let server = MockServer::start().await;
    let upload_uri = format!("{}/upload/slot-1", server.uri());

    Mock::given(method("POST"))
        .and(path(
            "/cloud/v2/universes/1/luau-execution-session-task-binary-inputs",
        ))
        .and(body_json(json!({ "size": 5 })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "path": "universes/1/luau-execution-session-task-binary-inputs/b1",
            "size": 5,
            "uploadUri": upload_uri
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("PUT"))
        .and(path("/upload/slot-1"))
        .and(header("content-type", "application/octet-stream"))
        .and(header("content-length", "5"))
        .and(body_bytes(b"hello".to_vec()))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let handler = LuauExecutionHandler::new(api_key_client(&server));
    let input: BinaryInput = handler.create_binary_input("1", 5).await.unwrap();
    assert_eq!(input.size, 5);

    handler
        .upload_binary_input(&input, b"hello".to_vec())
        .await
        .unwrap();

    let requests = server.received_requests().await.unwrap();
    let upload = requests
        .iter()
        .find(|r| r.method.as_str() == "PUT")
        .unwrap();
    assert!(upload.headers.get("x-api-key").is_none());
}

#[tokio::test]
async fn test_binary_output_fetched_without_credentials() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/output/blob"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0u8, 1, 2, 255]))
        .expect(1)
        .mount(&server)
        .await;

    let client = api_key_client(&server);
    let task: opencloudctl_core::luau::LuauExecutionTask = serde_json::from_value(json!({
        "path": "universes/1/places/2/luau-execution-session-tasks/T1",
        "state": "COMPLETE",
        "enableBinaryOutput": true,
        "binaryOutputUri": format!("{}/output/blob", server.uri())
    }))
    .unwrap();

    let bytes = task.binary_output(&client).await.unwrap();
    assert_eq!(bytes, Some(vec![0u8, 1, 2, 255]));

    let requests: Vec<Request> = server.received_requests().await.unwrap();
    assert!(requests[0].headers.get("x-api-key").is_none());
}

// ============================================================================
// Universes and places
// ============================================================================

#[tokio::test]
async fn test_update_place_patches_only_set_fields() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/cloud/v2/universes/1/places/2"))
        .and(body_json(json!({ "serverSize": 50 })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "path": "universes/1/places/2",
            "serverSize": 50
        })))
        .expect(1)
        .mount(&server)
        .await;

    let handler = UniverseHandler::new(api_key_client(&server));
    let place = handler
        .update_place("1", "2", &PlaceUpdate::default().server_size(50))
        .await
        .unwrap();
    assert_eq!(place.server_size, 50);
}

#[tokio::test]
async fn test_invalid_payloads_never_reach_the_server() {
    let server = MockServer::start().await;
    Mock::given(wiremock::matchers::any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let handler = UniverseHandler::new(api_key_client(&server));

    let err = handler
        .update_place("1", "2", &PlaceUpdate::default().server_size(201))
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Validation(_)));

    let err = handler
        .publish_message("1", &UniverseMessage::new("", "hi"))
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Validation(_)));
}

#[tokio::test]
async fn test_publish_message_and_restart_accept_any_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/cloud/v2/universes/1:publishMessage"))
        .and(body_json(json!({ "topic": "news", "message": "hi" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/cloud/v2/universes/1:restartServers"))
        .and(header_exists("x-api-key"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let handler = UniverseHandler::new(api_key_client(&server));
    handler
        .publish_message("1", &UniverseMessage::new("news", "hi"))
        .await
        .unwrap();
    handler.restart_servers("1").await.unwrap();
}
