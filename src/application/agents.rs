//! Port to the external LLM agent service.
//!
//! The agent service is an opaque collaborator: Sentinel sends a
//! session-scoped message to a named agent and receives JSON back. Which
//! HTTP endpoint, credentials and agent ids are involved is the
//! infrastructure adapter's concern.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use thiserror::Error;

/// The workflow task an agent call serves. Each task resolves to its own
/// configured agent id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentTask {
    RulesExtractor,
    RulesToColumn,
    GapAnalysis,
    RulesDiff,
}

impl AgentTask {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::RulesExtractor => "rules_extractor",
            Self::RulesToColumn => "rules_to_column",
            Self::GapAnalysis => "gap_analysis",
            Self::RulesDiff => "rules_diff",
        }
    }
}

/// A session-scoped message to one agent.
#[derive(Debug, Clone)]
pub struct AgentMessage {
    pub task: AgentTask,
    /// The customer id; scopes agent memory per customer.
    pub session_id: String,
    pub message: String,
    /// Extra variables substituted into the agent's system prompt.
    pub prompt_variables: Option<BTreeMap<String, String>>,
}

impl AgentMessage {
    pub fn new(task: AgentTask, session_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            task,
            session_id: session_id.into(),
            message: message.into(),
            prompt_variables: None,
        }
    }

    pub fn with_prompt_variables(mut self, variables: BTreeMap<String, String>) -> Self {
        self.prompt_variables = Some(variables);
        self
    }
}

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("agent task `{task}` is not configured")]
    NotConfigured { task: &'static str },
    #[error("agent request failed: {0}")]
    Transport(String),
    #[error("agent returned status {status}: {body}")]
    UpstreamStatus { status: u16, body: String },
    #[error("agent reply was not valid JSON: {0}")]
    InvalidReply(String),
}

/// Gateway to the agent service. Implemented over HTTP in production and
/// by scripted fakes in tests.
#[async_trait]
pub trait AgentGateway: Send + Sync {
    /// Whether the given task has an agent configured.
    fn is_configured(&self, task: AgentTask) -> bool;

    /// Send one message and return the raw JSON reply.
    async fn send(&self, message: AgentMessage) -> Result<JsonValue, AgentError>;
}
