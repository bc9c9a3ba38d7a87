//! Integration tests for the workflow engine client against a mock server.

use agentflow::config::KestraConfig;
use agentflow::kestra::{ExecutionPhase, KestraClient, KestraError};
use agentflow::Config;
use futures::StreamExt;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer) -> KestraClient {
    KestraClient::new(&KestraConfig {
        base_url: server.uri(),
        api_key: Some("engine-token".to_string()),
    })
}

#[tokio::test]
async fn upsert_flow_puts_plain_text_with_bearer_token() {
    let server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path("/api/v1/flows/agents/agent-a1"))
        .and(header("content-type", "text/plain"))
        .and(header("authorization", "Bearer engine-token"))
        .and(body_string_contains("id: agent-a1"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    client_for(&server)
        .upsert_flow("agents", "agent-a1", "id: agent-a1\nnamespace: agents\n")
        .await
        .unwrap();
}

#[tokio::test]
async fn upsert_twice_hits_the_same_identity() {
    let server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path("/api/v1/flows/agents/agent-a1"))
        .respond_with(ResponseTemplate::new(200))
        .expect(2)
        .mount(&server)
        .await;

    let client = client_for(&server);
    client.upsert_flow("agents", "agent-a1", "id: agent-a1\n").await.unwrap();
    client.upsert_flow("agents", "agent-a1", "id: agent-a1\n").await.unwrap();
}

#[tokio::test]
async fn execute_returns_the_execution_id() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v1/executions/agents/agent-a1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "exec-42"})))
        .mount(&server)
        .await;

    let execution = client_for(&server)
        .execute("agents", "agent-a1", &json!({"user_input": "hello"}))
        .await
        .unwrap();

    assert_eq!(execution.id, "exec-42");
}

#[tokio::test]
async fn get_execution_reports_in_flight_engine_states() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/executions/exec-42"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "exec-42",
            "namespace": "agents",
            "flowId": "agent-a1",
            "state": {
                "current": "PAUSED",
                "histories": [
                    {"state": "CREATED", "date": "2026-08-30T10:00:00Z"},
                    {"state": "RUNNING", "date": "2026-08-30T10:00:01Z"}
                ]
            },
            "taskRunList": []
        })))
        .mount(&server)
        .await;

    let execution = client_for(&server).get_execution("exec-42").await.unwrap();

    assert_eq!(execution.id, "exec-42");
    assert_eq!(execution.flow_id, "agent-a1");
    assert_eq!(execution.state.current, ExecutionPhase::Paused);
    assert!(!execution.state.current.is_terminal());
    assert_eq!(execution.state.histories.len(), 2);
}

#[tokio::test]
async fn engine_errors_carry_the_remote_payload() {
    let server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path("/api/v1/flows/agents/agent-bad"))
        .respond_with(
            ResponseTemplate::new(422)
                .set_body_json(json!({"message": "Invalid flow", "details": {"line": 3}})),
        )
        .mount(&server)
        .await;

    let err = client_for(&server)
        .upsert_flow("agents", "agent-bad", "nonsense")
        .await
        .unwrap_err();

    match err {
        KestraError::Api { status, message, payload } => {
            assert_eq!(status, 422);
            assert_eq!(message, "Invalid flow");
            assert_eq!(payload.unwrap()["details"]["line"], 3);
        }
        other => panic!("expected Api error, got: {}", other),
    }
}

#[tokio::test]
async fn stream_logs_yields_the_body() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/executions/exec-42/logs"))
        .respond_with(ResponseTemplate::new(200).set_body_string("line one\nline two\n"))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let stream = client.stream_logs("exec-42", CancellationToken::new());
    let chunks: Vec<String> = stream.map(|c| c.unwrap()).collect().await;

    assert_eq!(chunks.concat(), "line one\nline two\n");
}

#[tokio::test]
async fn cancelled_log_stream_stops_reading() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/executions/exec-42/logs"))
        .respond_with(ResponseTemplate::new(200).set_body_string("never consumed"))
        .mount(&server)
        .await;

    let cancel = CancellationToken::new();
    cancel.cancel();

    let client = client_for(&server);
    let chunks: Vec<_> = client.stream_logs("exec-42", cancel).collect().await;
    assert!(chunks.is_empty());
}

#[tokio::test]
async fn kill_posts_to_the_kill_endpoint() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v1/executions/exec-42/kill"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    client_for(&server).kill("exec-42").await.unwrap();
}

#[tokio::test]
async fn delete_flow_uses_delete() {
    let server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path("/api/v1/flows/agents/agent-a1"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    client_for(&server).delete_flow("agents", "agent-a1").await.unwrap();
}

#[tokio::test]
async fn test_connection_reflects_engine_health() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/flows"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    assert!(client_for(&server).test_connection().await);

    let config = Config::new("or-test-key".to_string(), "http://127.0.0.1:1".to_string());
    let unreachable = KestraClient::new(&config.kestra);
    assert!(!unreachable.test_connection().await);
}
