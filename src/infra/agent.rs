//! HTTP adapter for the external agent service.
//!
//! One POST per call: the agent id, session id and message travel in the
//! JSON body, the API key in an `x-api-key` header. The reply is whatever
//! JSON the service produced; unwrapping `response`-wrapped payloads is
//! the caller's concern.

use std::collections::BTreeMap;
use std::time::Instant;

use async_trait::async_trait;
use metrics::{counter, histogram};
use serde::Serialize;
use serde_json::Value as JsonValue;
use tracing::debug;

use crate::application::agents::{AgentError, AgentGateway, AgentMessage, AgentTask};
use crate::config::AgentSettings;

const API_KEY_HEADER: &str = "x-api-key";

#[derive(Debug, Serialize)]
struct AgentRequestBody<'a> {
    user_id: &'a str,
    agent_id: &'a str,
    session_id: &'a str,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_prompt_variables: Option<&'a BTreeMap<String, String>>,
}

pub struct HttpAgentGateway {
    client: reqwest::Client,
    settings: AgentSettings,
}

impl HttpAgentGateway {
    pub fn new(settings: AgentSettings) -> Result<Self, AgentError> {
        let client = reqwest::Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|err| AgentError::Transport(err.to_string()))?;
        Ok(Self { client, settings })
    }

    fn agent_id(&self, task: AgentTask) -> Option<&str> {
        match task {
            AgentTask::RulesExtractor => self.settings.extractor_agent_id.as_deref(),
            AgentTask::RulesToColumn => self.settings.mapper_agent_id.as_deref(),
            AgentTask::GapAnalysis => self.settings.gap_agent_id.as_deref(),
            AgentTask::RulesDiff => self.settings.diff_agent_id.as_deref(),
        }
    }

    fn api_key(&self, task: AgentTask) -> Option<&str> {
        match task {
            // The diff agent may run under its own key.
            AgentTask::RulesDiff => self
                .settings
                .diff_api_key
                .as_deref()
                .or(self.settings.api_key.as_deref()),
            _ => self.settings.api_key.as_deref(),
        }
    }
}

#[async_trait]
impl AgentGateway for HttpAgentGateway {
    fn is_configured(&self, task: AgentTask) -> bool {
        self.agent_id(task).is_some() && self.api_key(task).is_some()
    }

    async fn send(&self, message: AgentMessage) -> Result<JsonValue, AgentError> {
        let task = message.task.as_str();
        let agent_id = self.agent_id(message.task).ok_or(AgentError::NotConfigured {
            task: message.task.as_str(),
        })?;
        let api_key = self.api_key(message.task).ok_or(AgentError::NotConfigured {
            task: message.task.as_str(),
        })?;

        let body = AgentRequestBody {
            user_id: &self.settings.user_id,
            agent_id,
            session_id: &message.session_id,
            message: &message.message,
            system_prompt_variables: message.prompt_variables.as_ref(),
        };

        debug!(
            target = "sentinel::agent",
            task,
            session_id = %message.session_id,
            message_bytes = message.message.len(),
            "calling agent service"
        );

        counter!("sentinel_agent_call_total", "task" => task).increment(1);
        let started = Instant::now();

        let result = self
            .client
            .post(self.settings.endpoint.clone())
            .header(API_KEY_HEADER, api_key)
            .json(&body)
            .send()
            .await;

        histogram!("sentinel_agent_call_ms", "task" => task)
            .record(started.elapsed().as_millis() as f64);

        let response = result.map_err(|err| {
            counter!("sentinel_agent_call_error_total", "task" => task).increment(1);
            AgentError::Transport(err.to_string())
        })?;

        let status = response.status();
        if !status.is_success() {
            counter!("sentinel_agent_call_error_total", "task" => task).increment(1);
            let body = response.text().await.unwrap_or_default();
            return Err(AgentError::UpstreamStatus {
                status: status.as_u16(),
                body,
            });
        }

        response.json().await.map_err(|err| {
            counter!("sentinel_agent_call_error_total", "task" => task).increment(1);
            AgentError::InvalidReply(err.to_string())
        })
    }
}
