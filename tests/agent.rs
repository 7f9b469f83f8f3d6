//! Contract tests for the HTTP agent gateway against a mock server.

use std::collections::BTreeMap;
use std::time::Duration;

use httpmock::prelude::*;
use serde_json::json;
use url::Url;

use sentinel::application::agents::{AgentError, AgentGateway, AgentMessage, AgentTask};
use sentinel::config::AgentSettings;
use sentinel::infra::agent::HttpAgentGateway;

fn settings(endpoint: &str) -> AgentSettings {
    AgentSettings {
        endpoint: Url::parse(endpoint).unwrap(),
        api_key: Some("test-key".into()),
        diff_api_key: Some("diff-key".into()),
        user_id: "sentinel@example.test".into(),
        extractor_agent_id: Some("agent-extract".into()),
        mapper_agent_id: Some("agent-map".into()),
        gap_agent_id: Some("agent-gap".into()),
        diff_agent_id: Some("agent-diff".into()),
        timeout: Duration::from_secs(5),
    }
}

#[tokio::test]
async fn sends_session_scoped_message_with_api_key() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST)
            .path("/v3/inference/chat/")
            .header("x-api-key", "test-key")
            .json_body(json!({
                "user_id": "sentinel@example.test",
                "agent_id": "agent-extract",
                "session_id": "cust-1",
                "message": "document text",
            }));
        then.status(200)
            .json_body(json!({"response": "{\"rules\": []}"}));
    });

    let gateway =
        HttpAgentGateway::new(settings(&server.url("/v3/inference/chat/"))).unwrap();
    let reply = gateway
        .send(AgentMessage::new(
            AgentTask::RulesExtractor,
            "cust-1",
            "document text",
        ))
        .await
        .unwrap();

    mock.assert();
    assert_eq!(reply["response"], "{\"rules\": []}");
}

#[tokio::test]
async fn forwards_prompt_variables() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST).path("/v3/inference/chat/").json_body(json!({
            "user_id": "sentinel@example.test",
            "agent_id": "agent-gap",
            "session_id": "cust-1",
            "message": "{}",
            "system_prompt_variables": {"fidessa_catalog": "{\"Sector\":\"Energy\"}"},
        }));
        then.status(200).json_body(json!({"mapped_rules": []}));
    });

    let gateway =
        HttpAgentGateway::new(settings(&server.url("/v3/inference/chat/"))).unwrap();
    let message = AgentMessage::new(AgentTask::GapAnalysis, "cust-1", "{}")
        .with_prompt_variables(BTreeMap::from([(
            "fidessa_catalog".to_owned(),
            "{\"Sector\":\"Energy\"}".to_owned(),
        )]));
    gateway.send(message).await.unwrap();

    mock.assert();
}

#[tokio::test]
async fn diff_task_uses_its_own_key() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST)
            .path("/v3/inference/chat/")
            .header("x-api-key", "diff-key");
        then.status(200).json_body(json!({"comparisons": []}));
    });

    let gateway =
        HttpAgentGateway::new(settings(&server.url("/v3/inference/chat/"))).unwrap();
    gateway
        .send(AgentMessage::new(AgentTask::RulesDiff, "cust-1", "{}"))
        .await
        .unwrap();

    mock.assert();
}

#[tokio::test]
async fn upstream_errors_surface_with_status() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/v3/inference/chat/");
        then.status(503).body("upstream overloaded");
    });

    let gateway =
        HttpAgentGateway::new(settings(&server.url("/v3/inference/chat/"))).unwrap();
    let err = gateway
        .send(AgentMessage::new(AgentTask::RulesToColumn, "cust-1", "{}"))
        .await
        .unwrap_err();

    match err {
        AgentError::UpstreamStatus { status, body } => {
            assert_eq!(status, 503);
            assert_eq!(body, "upstream overloaded");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn non_json_replies_are_invalid() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/v3/inference/chat/");
        then.status(200).body("definitely not json");
    });

    let gateway =
        HttpAgentGateway::new(settings(&server.url("/v3/inference/chat/"))).unwrap();
    let err = gateway
        .send(AgentMessage::new(AgentTask::RulesExtractor, "cust-1", "{}"))
        .await
        .unwrap_err();

    assert!(matches!(err, AgentError::InvalidReply(_)));
}

#[tokio::test]
async fn unconfigured_tasks_never_reach_the_wire() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST).path("/v3/inference/chat/");
        then.status(200).json_body(json!({}));
    });

    let mut bare = settings(&server.url("/v3/inference/chat/"));
    bare.mapper_agent_id = None;
    let gateway = HttpAgentGateway::new(bare).unwrap();

    assert!(!gateway.is_configured(AgentTask::RulesToColumn));
    let err = gateway
        .send(AgentMessage::new(AgentTask::RulesToColumn, "cust-1", "{}"))
        .await
        .unwrap_err();
    assert!(matches!(err, AgentError::NotConfigured { .. }));
    mock.assert_hits(0);
}
