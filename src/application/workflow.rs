//! The constraint workflow: extract clauses from an uploaded guidelines
//! document, map them onto the rule schema, and gap-check the mapping
//! against the reference catalog. Each step forwards to its agent and
//! persists what came back.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value as JsonValue;
use thiserror::Error;
use tracing::{error, info};
use uuid::Uuid;

use crate::application::agents::{AgentError, AgentGateway, AgentMessage, AgentTask};
use crate::application::projects::{ProjectError, ProjectService};
use crate::application::repos::{DocumentsRepo, NewGuidelineDocument};
use crate::domain::projects::{
    GapFinding, MappedRule, ProjectRecord, RawRuleSection, Ruleset, RulesetData,
};
use crate::util::json::{self, JsonParseError};

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("{0}")]
    Validation(&'static str),
    #[error(transparent)]
    Project(#[from] ProjectError),
    #[error(transparent)]
    Agent(#[from] AgentError),
    #[error("failed to parse agent response")]
    UnparseableReply {
        #[source]
        source: JsonParseError,
        raw: String,
    },
}

#[derive(Debug, Clone)]
pub struct ExtractCommand {
    pub project_id: Uuid,
    pub customer_id: String,
    pub document_text: String,
    pub filename: Option<String>,
}

#[derive(Debug, Clone)]
pub struct MapRulesCommand {
    pub project_id: Uuid,
    pub customer_id: String,
    pub rules_extractor_response: JsonValue,
}

#[derive(Debug, Clone)]
pub struct GapAnalysisCommand {
    pub project_id: Uuid,
    pub customer_id: String,
    pub rules_to_column_response: JsonValue,
    pub fidessa_catalog: Option<BTreeMap<String, String>>,
}

#[derive(Clone)]
pub struct ConstraintWorkflowService {
    projects: ProjectService,
    documents: Arc<dyn DocumentsRepo>,
    agent: Arc<dyn AgentGateway>,
}

impl ConstraintWorkflowService {
    pub fn new(
        projects: ProjectService,
        documents: Arc<dyn DocumentsRepo>,
        agent: Arc<dyn AgentGateway>,
    ) -> Self {
        Self {
            projects,
            documents,
            agent,
        }
    }

    /// Verify the project exists and matches the customer the request
    /// claims to act for.
    async fn checked_project(
        &self,
        project_id: Uuid,
        customer_id: &str,
    ) -> Result<ProjectRecord, WorkflowError> {
        let project = self.projects.get(project_id).await?;
        if !project.belongs_to(customer_id) {
            return Err(WorkflowError::Validation(
                "customer_id does not match the project",
            ));
        }
        Ok(project)
    }

    /// Store the uploaded document, run the extraction agent over its
    /// text and return the extracted rule sections.
    pub async fn extract(
        &self,
        command: ExtractCommand,
    ) -> Result<Vec<RawRuleSection>, WorkflowError> {
        if command.customer_id.trim().is_empty() {
            return Err(WorkflowError::Validation("customer_id is required"));
        }
        if command.document_text.trim().is_empty() {
            return Err(WorkflowError::Validation("document_text is required"));
        }

        let project = self
            .checked_project(command.project_id, &command.customer_id)
            .await?;

        let document = self
            .documents
            .insert_document(NewGuidelineDocument {
                project_id: project.id,
                filename: command
                    .filename
                    .filter(|name| !name.trim().is_empty())
                    .unwrap_or_else(|| "guidelines.txt".to_owned()),
                body: command.document_text.clone(),
            })
            .await
            .map_err(ProjectError::from)?;

        info!(
            target = "sentinel::workflow",
            project_id = %project.id,
            document_id = %document.id,
            filename = %document.filename,
            "guidelines document stored"
        );

        let reply = self
            .agent
            .send(AgentMessage::new(
                AgentTask::RulesExtractor,
                &command.customer_id,
                command.document_text,
            ))
            .await?;

        let payload = unwrap_reply(reply, "rules extractor reply")?;
        let sections = parse_sections(&payload);

        if let Err(err) = self
            .documents
            .set_document_extraction(document.id, &sections)
            .await
        {
            error!(
                target = "sentinel::workflow",
                document_id = %document.id,
                error = %err,
                "failed to save extraction on the document"
            );
        }

        Ok(sections)
    }

    /// Run the mapping agent over the extractor output and append the
    /// result as a new ruleset version.
    pub async fn map_rules(
        &self,
        command: MapRulesCommand,
    ) -> Result<(Ruleset, Vec<MappedRule>), WorkflowError> {
        if command.customer_id.trim().is_empty() {
            return Err(WorkflowError::Validation("customer_id is required"));
        }
        if command.rules_extractor_response.is_null() {
            return Err(WorkflowError::Validation(
                "rules_extractor_response is required",
            ));
        }

        self.checked_project(command.project_id, &command.customer_id)
            .await?;

        let message = value_as_message(&command.rules_extractor_response);
        let reply = self
            .agent
            .send(AgentMessage::new(
                AgentTask::RulesToColumn,
                &command.customer_id,
                message,
            ))
            .await?;

        let payload = unwrap_reply(reply, "rules-to-column reply")?;
        let mapped_rules = parse_mapped_rules(&payload);

        let extractor_value = parsed_request_value(&command.rules_extractor_response);
        let raw_rules = extractor_value
            .as_ref()
            .map(parse_sections)
            .unwrap_or_default();

        let ruleset = self
            .projects
            .append_ruleset(
                &command.customer_id,
                RulesetData {
                    raw_rules,
                    mapped_rules: mapped_rules.clone(),
                    gap_analysis: Vec::new(),
                },
            )
            .await?;

        Ok((ruleset, mapped_rules))
    }

    /// Run the gap-analysis agent over the mapping output. The catalog
    /// summary travels as an agent prompt variable: the request's own
    /// catalog wins, then the project's selected company. Findings attach
    /// to the latest ruleset version; a save failure is logged but never
    /// fails the request.
    pub async fn gap_analysis(
        &self,
        command: GapAnalysisCommand,
    ) -> Result<Vec<GapFinding>, WorkflowError> {
        if command.customer_id.trim().is_empty() {
            return Err(WorkflowError::Validation("customer_id is required"));
        }
        if command.rules_to_column_response.is_null() {
            return Err(WorkflowError::Validation(
                "rules_to_column_response is required",
            ));
        }

        let project = self
            .checked_project(command.project_id, &command.customer_id)
            .await?;

        let catalog = command.fidessa_catalog.or_else(|| {
            project
                .selected_company
                .as_ref()
                .map(|company| company.fidessa_catalog.clone())
        });

        let mut message = AgentMessage::new(
            AgentTask::GapAnalysis,
            &command.customer_id,
            value_as_message(&command.rules_to_column_response),
        );
        if let Some(catalog) = catalog {
            let rendered = serde_json::to_string(&catalog)
                .map_err(|err| AgentError::InvalidReply(err.to_string()))?;
            message = message
                .with_prompt_variables(BTreeMap::from([("fidessa_catalog".to_owned(), rendered)]));
        }

        let reply = self.agent.send(message).await?;
        let payload = unwrap_reply(reply, "gap analysis reply")?;
        let findings = parse_gap_findings(&payload);

        if let Err(err) = self
            .projects
            .attach_gap_analysis(&command.customer_id, findings.clone())
            .await
        {
            error!(
                target = "sentinel::workflow",
                customer_id = %command.customer_id,
                error = %err,
                "failed to save gap analysis"
            );
        }

        Ok(findings)
    }
}

/// Stringify a request-supplied value for the agent message: strings pass
/// through untouched, anything else serializes to JSON text.
fn value_as_message(value: &JsonValue) -> String {
    match value {
        JsonValue::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// Request payloads may arrive pre-parsed or as JSON text; normalize to a
/// value for section extraction.
fn parsed_request_value(value: &JsonValue) -> Option<JsonValue> {
    match value {
        JsonValue::String(text) => json::parse(text, None).ok(),
        other => Some(other.clone()),
    }
}

/// Unwrap an agent reply: replies wrapping their payload in a `response`
/// string field are sanitized and parsed; anything else passes through.
pub fn unwrap_reply(reply: JsonValue, context: &str) -> Result<JsonValue, WorkflowError> {
    match reply.get("response").and_then(JsonValue::as_str) {
        Some(wrapped) => json::parse(wrapped, Some(context)).map_err(|source| {
            WorkflowError::UnparseableReply {
                source,
                raw: wrapped.to_owned(),
            }
        }),
        None => Ok(reply),
    }
}

/// Pull rule sections out of an extractor payload. Accepts a bare array
/// of sections or an object carrying them under `rules` / `raw_rules`.
pub fn parse_sections(payload: &JsonValue) -> Vec<RawRuleSection> {
    let candidate = if payload.is_array() {
        payload
    } else if let Some(rules) = payload.get("rules") {
        rules
    } else if let Some(rules) = payload.get("raw_rules") {
        rules
    } else {
        return Vec::new();
    };

    serde_json::from_value(candidate.clone()).unwrap_or_default()
}

fn parse_mapped_rules(payload: &JsonValue) -> Vec<MappedRule> {
    payload
        .get("mapped_rules")
        .cloned()
        .and_then(|value| serde_json::from_value(value).ok())
        .unwrap_or_default()
}

fn parse_gap_findings(payload: &JsonValue) -> Vec<GapFinding> {
    payload
        .get("mapped_rules")
        .cloned()
        .and_then(|value| serde_json::from_value(value).ok())
        .unwrap_or_default()
}
